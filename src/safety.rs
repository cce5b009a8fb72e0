//! Safety warnings for generated SQL.
//!
//! Every rule runs independently over the upper-cased statement text; table
//! references are plain substring tests, so a table name contained in another
//! identifier still matches and an aliased or subqueried reference can slip
//! through.

use crate::schema::SchemaModel;
use tracing::debug;

pub const DANGEROUS_KEYWORDS: &[&str] = &["DROP", "DELETE", "UPDATE", "INSERT", "TRUNCATE"];

pub const DANGEROUS_OPERATION_WARNING: &str = "Query contains potentially dangerous operations";
pub const MISSING_LIMIT_WARNING: &str = "Consider adding LIMIT clause for better performance";

/// Row count above which an unfiltered scan is flagged.
pub const LARGE_TABLE_ROWS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct SafetyAnalyzer {
    large_table_rows: u64,
}

impl Default for SafetyAnalyzer {
    fn default() -> Self {
        Self {
            large_table_rows: LARGE_TABLE_ROWS,
        }
    }
}

impl SafetyAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_large_table_rows(large_table_rows: u64) -> Self {
        Self { large_table_rows }
    }

    pub fn analyze(&self, sql: &str, schema: &SchemaModel) -> Vec<String> {
        let sql_upper = sql.to_uppercase();
        let mut warnings = Vec::new();

        if DANGEROUS_KEYWORDS.iter().any(|kw| sql_upper.contains(kw)) {
            warnings.push(DANGEROUS_OPERATION_WARNING.to_string());
        }

        if !sql_upper.contains("WHERE") {
            for table in schema.large_tables(self.large_table_rows) {
                if sql_upper.contains(&table.name.to_uppercase()) {
                    warnings.push(format!(
                        "Query on large table '{}' without WHERE clause",
                        table.name
                    ));
                }
            }
        }

        if sql_upper.contains("SELECT") && !sql_upper.contains("LIMIT") {
            warnings.push(MISSING_LIMIT_WARNING.to_string());
        }

        if !warnings.is_empty() {
            debug!("Safety analysis produced {} warning(s)", warnings.len());
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TableModel;

    fn schema_with(tables: &[(&str, Option<u64>)]) -> SchemaModel {
        SchemaModel::new(
            tables
                .iter()
                .map(|(name, rows)| TableModel::new(*name, vec![], *rows))
                .collect(),
            vec![],
        )
    }

    #[test]
    fn test_dangerous_operation_regardless_of_schema() {
        let analyzer = SafetyAnalyzer::new();
        for schema in [SchemaModel::default(), schema_with(&[("users", Some(1_000_000))])] {
            let warnings = analyzer.analyze("DROP TABLE users", &schema);
            assert!(warnings.iter().any(|w| w.contains("dangerous")));
        }
    }

    #[test]
    fn test_safe_query_has_no_warnings() {
        let schema = schema_with(&[("users", Some(1_000_000))]);
        let warnings = SafetyAnalyzer::new().analyze("SELECT * FROM users WHERE id=1 LIMIT 10", &schema);
        assert!(warnings.is_empty(), "{:?}", warnings);
    }

    #[test]
    fn test_large_table_without_filter() {
        let schema = schema_with(&[("orders", Some(50_000))]);
        let warnings = SafetyAnalyzer::new().analyze("SELECT * FROM orders", &schema);
        assert_eq!(
            warnings,
            vec![
                "Query on large table 'orders' without WHERE clause".to_string(),
                MISSING_LIMIT_WARNING.to_string(),
            ]
        );
    }

    #[test]
    fn test_one_warning_per_large_table() {
        let schema = schema_with(&[("orders", Some(50_000)), ("users", Some(20_000)), ("tags", Some(5))]);
        let warnings = SafetyAnalyzer::new()
            .analyze("select * from orders o join users u on o.user_id = u.id join tags t on true limit 5", &schema);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("'orders'"));
        assert!(warnings[1].contains("'users'"));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let schema = schema_with(&[("users", Some(10_000))]);
        let warnings = SafetyAnalyzer::new().analyze("SELECT * FROM users LIMIT 1", &schema);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_substring_match_is_kept() {
        // "user" is contained in "users_archive"; the heuristic flags it anyway.
        let schema = schema_with(&[("user", Some(99_999))]);
        let warnings = SafetyAnalyzer::new().analyze("SELECT * FROM users_archive LIMIT 1", &schema);
        assert_eq!(warnings, vec!["Query on large table 'user' without WHERE clause".to_string()]);
    }

    #[test]
    fn test_rules_do_not_short_circuit() {
        let schema = schema_with(&[("accounts", Some(80_000))]);
        let warnings = SafetyAnalyzer::new()
            .analyze("SELECT * FROM accounts; DELETE FROM accounts", &schema);
        assert_eq!(warnings.len(), 3);
    }

    #[test]
    fn test_custom_threshold() {
        let schema = schema_with(&[("users", Some(500))]);
        let warnings = SafetyAnalyzer::with_large_table_rows(100)
            .analyze("SELECT * FROM users LIMIT 1", &schema);
        assert_eq!(warnings.len(), 1);
    }
}
