//! Query generation facade.
//!
//! Composes prompt rendering, the completion call, response parsing,
//! classification, safety analysis and sizing. A failed completion never
//! escapes: it becomes a placeholder [`GeneratedQuery`] the caller can still
//! serialize.

use crate::classifier::OperationKind;
use crate::estimator::CardinalityEstimator;
use crate::llm::{CompletionClient, CompletionRequest};
use crate::prompt::{PromptBuilder, SQL_SYSTEM_PROMPT};
use crate::response_parser::ResponseParser;
use crate::safety::SafetyAnalyzer;
use crate::schema::SchemaModel;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

pub const FAILED_SQL: &str = "-- Error generating SQL";
pub const FAILED_WARNING: &str = "Error in query generation";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuery {
    pub sql: String,
    pub explanation: String,
    #[serde(rename = "query_type")]
    pub operation_kind: OperationKind,
    pub estimated_rows: Option<u64>,
    #[serde(rename = "safety_warnings")]
    pub warnings: Vec<String>,
}

impl GeneratedQuery {
    fn failed(reason: impl std::fmt::Display) -> Self {
        Self {
            sql: FAILED_SQL.to_string(),
            explanation: format!("Failed to generate SQL: {}", reason),
            operation_kind: OperationKind::Unrecognized,
            estimated_rows: None,
            warnings: vec![FAILED_WARNING.to_string()],
        }
    }

    pub fn is_failure(&self) -> bool {
        self.sql == FAILED_SQL
    }
}

pub struct QueryGenerator {
    client: Arc<dyn CompletionClient>,
    analyzer: SafetyAnalyzer,
}

impl QueryGenerator {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            analyzer: SafetyAnalyzer::default(),
        }
    }

    pub fn client(&self) -> &Arc<dyn CompletionClient> {
        &self.client
    }

    pub async fn generate(&self, natural_language: &str, schema: &SchemaModel) -> GeneratedQuery {
        info!("Generating SQL for: {}", natural_language);

        let request = CompletionRequest::new(PromptBuilder::build(schema, natural_language))
            .with_system(SQL_SYSTEM_PROMPT)
            .with_temperature(0.1)
            .with_max_tokens(1000);

        let raw = match self.client.complete(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("SQL generation failed: {}", e);
                return GeneratedQuery::failed(e);
            }
        };

        let parsed = ResponseParser::parse(&raw);
        let operation_kind = OperationKind::classify(&parsed.sql);
        let warnings = self.analyzer.analyze(&parsed.sql, schema);
        let estimated_rows = CardinalityEstimator::estimate(&parsed.sql, schema);

        info!(
            "Generated {} query (~{} rows, {} warning(s))",
            operation_kind,
            estimated_rows,
            warnings.len()
        );

        GeneratedQuery {
            sql: parsed.sql,
            explanation: parsed.explanation,
            operation_kind,
            estimated_rows: Some(estimated_rows),
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Nl2SqlError, Result};
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl CompletionClient for Canned {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Down;

    #[async_trait]
    impl CompletionClient for Down {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            Err(Nl2SqlError::Llm("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_generate_assembles_result() {
        let generator = QueryGenerator::new(Arc::new(Canned(
            r#"{"sql": "SELECT name FROM users WHERE active LIMIT 20", "explanation": "Active user names", "query_type": "select"}"#,
        )));
        let query = generator.generate("active users", &SchemaModel::default()).await;
        assert_eq!(query.operation_kind, OperationKind::Read);
        assert_eq!(query.estimated_rows, Some(20));
        assert_eq!(query.explanation, "Active user names");
        assert!(query.warnings.is_empty());
        assert!(!query.is_failure());
    }

    #[tokio::test]
    async fn test_generate_degrades_on_client_failure() {
        let generator = QueryGenerator::new(Arc::new(Down));
        let query = generator.generate("anything", &SchemaModel::default()).await;
        assert_eq!(query.sql, FAILED_SQL);
        assert_eq!(query.operation_kind, OperationKind::Unrecognized);
        assert!(query.explanation.contains("connection refused"));
        assert_eq!(query.warnings, vec![FAILED_WARNING.to_string()]);
        assert_eq!(query.estimated_rows, None);
    }

    #[test]
    fn test_serialized_shape() {
        let query = GeneratedQuery::failed("boom");
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(value["query_type"], "unknown");
        assert_eq!(value["safety_warnings"][0], FAILED_WARNING);
        assert!(value["estimated_rows"].is_null());
    }
}
