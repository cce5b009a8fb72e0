use async_trait::async_trait;
use nl2sql::generator::{FAILED_SQL, FAILED_WARNING};
use nl2sql::llm::{CompletionClient, CompletionRequest};
use nl2sql::prompt::SQL_SYSTEM_PROMPT;
use nl2sql::response_parser::FALLBACK_EXPLANATION;
use nl2sql::safety::{DANGEROUS_OPERATION_WARNING, MISSING_LIMIT_WARNING};
use nl2sql::{
    ColumnModel, Nl2SqlError, OperationKind, QueryGenerator, RelationshipModel, Result,
    SchemaModel, TableModel,
};
use std::sync::{Arc, Mutex};

/// Replies with a fixed completion and records every request it sees.
struct ScriptedClient {
    reply: String,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.reply.clone())
    }
}

struct FailingClient;

#[async_trait]
impl CompletionClient for FailingClient {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        Err(Nl2SqlError::Llm("LLM API error (503 Service Unavailable): overloaded".to_string()))
    }
}

fn shop_schema() -> SchemaModel {
    SchemaModel::new(
        vec![
            TableModel::new(
                "customers",
                vec![
                    ColumnModel::new("id", "integer", false).primary_key(),
                    ColumnModel::new("name", "character varying", false),
                ],
                Some(2_500),
            ),
            TableModel::new(
                "orders",
                vec![
                    ColumnModel::new("id", "integer", false).primary_key(),
                    ColumnModel::new("customer_id", "integer", false).references("customers", "id"),
                    ColumnModel::new("total", "numeric", true),
                ],
                Some(50_000),
            ),
        ],
        vec![RelationshipModel {
            from_table: "orders".to_string(),
            from_column: "customer_id".to_string(),
            to_table: "customers".to_string(),
            to_column: "id".to_string(),
        }],
    )
}

#[tokio::test]
async fn test_fenced_completion_end_to_end() {
    let client = Arc::new(ScriptedClient::new(
        "Sure!\n```json\n{\"sql\": \"SELECT c.name, SUM(o.total) AS spend FROM customers c JOIN orders o ON o.customer_id = c.id GROUP BY c.name ORDER BY spend DESC LIMIT 10\", \"explanation\": \"Top 10 customers by spend\", \"query_type\": \"select\"}\n```",
    ));
    let generator = QueryGenerator::new(client.clone());

    let query = generator.generate("Who are our top 10 customers?", &shop_schema()).await;

    assert_eq!(query.operation_kind, OperationKind::Read);
    assert_eq!(query.explanation, "Top 10 customers by spend");
    assert_eq!(query.estimated_rows, Some(10));
    // No WHERE on a 50k-row table; LIMIT present.
    assert_eq!(
        query.warnings,
        vec!["Query on large table 'orders' without WHERE clause".to_string()]
    );

    let requests = client.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].system.as_deref(), Some(SQL_SYSTEM_PROMPT));
    assert!(requests[0].prompt.contains("Table: orders (50000 rows)"));
    assert!(requests[0].prompt.contains("  - customer_id: integer NOT NULL (FK -> customers.id)"));
    assert!(requests[0].prompt.contains("orders.customer_id -> customers.id"));
    assert!(requests[0].prompt.contains("Who are our top 10 customers?"));
}

#[tokio::test]
async fn test_unstructured_completion_uses_fallback() {
    let client = Arc::new(ScriptedClient::new(
        "I think this works:\n\nselect * from customers where name like 'A%'\n\nLet me know!",
    ));
    let generator = QueryGenerator::new(client);

    let query = generator.generate("customers starting with A", &shop_schema()).await;

    assert_eq!(query.sql, "select * from customers where name like 'A%'");
    assert_eq!(query.explanation, FALLBACK_EXPLANATION);
    assert_eq!(query.operation_kind, OperationKind::Read);
    assert_eq!(query.estimated_rows, Some(100));
    assert_eq!(query.warnings, vec![MISSING_LIMIT_WARNING.to_string()]);
}

#[tokio::test]
async fn test_mutating_statement_is_flagged() {
    let client = Arc::new(ScriptedClient::new(
        r#"{"sql": "DELETE FROM orders", "explanation": "Removes all orders", "query_type": "delete"}"#,
    ));
    let generator = QueryGenerator::new(client);

    let query = generator.generate("wipe the orders", &shop_schema()).await;

    assert_eq!(query.operation_kind, OperationKind::Delete);
    assert!(query.warnings.contains(&DANGEROUS_OPERATION_WARNING.to_string()));
    assert!(query
        .warnings
        .contains(&"Query on large table 'orders' without WHERE clause".to_string()));
    assert_eq!(query.estimated_rows, Some(1000));
}

#[tokio::test]
async fn test_failing_client_never_raises() {
    let generator = QueryGenerator::new(Arc::new(FailingClient));

    let query = generator.generate("anything at all", &shop_schema()).await;

    assert_eq!(query.sql, FAILED_SQL);
    assert_eq!(query.operation_kind, OperationKind::Unrecognized);
    assert!(query.explanation.starts_with("Failed to generate SQL:"));
    assert!(query.explanation.contains("overloaded"));
    assert_eq!(query.warnings, vec![FAILED_WARNING.to_string()]);
    assert!(query.is_failure());
}

#[tokio::test]
async fn test_concurrent_calls_are_independent() {
    let generator = Arc::new(QueryGenerator::new(Arc::new(ScriptedClient::new(
        r#"{"sql": "SELECT * FROM customers LIMIT 5", "explanation": "Five customers", "query_type": "select"}"#,
    ))));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let generator = generator.clone();
            tokio::spawn(async move {
                generator
                    .generate(&format!("question {}", i), &shop_schema())
                    .await
            })
        })
        .collect();

    for handle in handles {
        let query = handle.await.unwrap();
        assert_eq!(query.sql, "SELECT * FROM customers LIMIT 5");
        assert_eq!(query.estimated_rows, Some(5));
        assert!(query.warnings.is_empty());
    }
}

#[tokio::test]
async fn test_generated_query_serializes_to_wire_shape() {
    let generator = QueryGenerator::new(Arc::new(ScriptedClient::new(
        r#"{"sql": "SELECT id FROM customers WHERE id = 1 LIMIT 1", "explanation": "One customer", "query_type": "select"}"#,
    )));
    let query = generator.generate("customer one", &shop_schema()).await;

    let value = serde_json::to_value(&query).unwrap();
    assert_eq!(value["sql"], "SELECT id FROM customers WHERE id = 1 LIMIT 1");
    assert_eq!(value["query_type"], "select");
    assert_eq!(value["estimated_rows"], 1);
    assert_eq!(value["safety_warnings"], serde_json::json!([]));
}
