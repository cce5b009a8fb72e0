//! Prompt rendering for SQL generation.

use crate::schema::{ColumnModel, SchemaModel, TableModel};

/// System message sent alongside every generation prompt.
pub const SQL_SYSTEM_PROMPT: &str = "You are a PostgreSQL expert. Generate safe SELECT queries only. Return JSON with sql, explanation, and query_type fields.";

pub struct PromptBuilder;

impl PromptBuilder {
    /// Render the schema and request into a single generation prompt.
    pub fn build(schema: &SchemaModel, natural_language: &str) -> String {
        let schema_text = Self::format_schema(schema);

        format!(
            r#"
Convert this natural language request to a PostgreSQL SELECT query.

DATABASE SCHEMA:
{}

NATURAL LANGUAGE REQUEST:
{}

RULES:
- Generate ONLY SELECT statements
- Use proper PostgreSQL syntax
- Include proper JOINs when needed
- Limit results to 100 rows max
- Use table aliases for readability
- Return valid JSON with these fields:
  - sql: the generated SQL query
  - explanation: human-readable explanation of what the query does
  - query_type: "select"

RESPONSE FORMAT:
```json
{{
  "sql": "SELECT ...",
  "explanation": "This query...",
  "query_type": "select"
}}
```
"#,
            schema_text, natural_language
        )
    }

    pub fn format_schema(schema: &SchemaModel) -> String {
        let mut lines = Vec::new();

        for table in &schema.tables {
            lines.push(Self::format_table_header(table));
            for col in &table.columns {
                lines.push(Self::format_column(col));
            }
        }

        if !schema.relationships.is_empty() {
            lines.push("\nRelationships:".to_string());
            for rel in &schema.relationships {
                lines.push(format!(
                    "  - {}.{} -> {}.{}",
                    rel.from_table, rel.from_column, rel.to_table, rel.to_column
                ));
            }
        }

        lines.join("\n")
    }

    fn format_table_header(table: &TableModel) -> String {
        format!("\nTable: {} ({} rows)", table.name, table.row_count.unwrap_or(0))
    }

    fn format_column(col: &ColumnModel) -> String {
        let nullable = if col.is_nullable { "NULL" } else { "NOT NULL" };
        let pk_marker = if col.is_primary_key { " (PK)" } else { "" };
        let fk_marker = if col.is_foreign_key {
            format!(
                " (FK -> {}.{})",
                col.foreign_table.as_deref().unwrap_or_default(),
                col.foreign_column.as_deref().unwrap_or_default()
            )
        } else {
            String::new()
        };

        format!(
            "  - {}: {} {}{}{}",
            col.name, col.data_type, nullable, pk_marker, fk_marker
        )
    }
}
