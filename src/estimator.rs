//! Rough result-size hint for generated SQL.
//!
//! A UI sizing aid, not a planner estimate: only the statement text is
//! inspected and the first matching rule wins.

use crate::schema::SchemaModel;
use lazy_static::lazy_static;
use regex::Regex;

pub const MAX_ESTIMATE: u64 = 1000;
pub const FILTERED_ESTIMATE: u64 = 100;
pub const JOINED_ESTIMATE: u64 = 500;

lazy_static! {
    static ref LIMIT_CLAUSE: Regex = Regex::new(r"LIMIT\s+(\d+)").unwrap();
}

pub struct CardinalityEstimator;

impl CardinalityEstimator {
    pub fn estimate(sql: &str, _schema: &SchemaModel) -> u64 {
        let sql_upper = sql.to_uppercase();

        if let Some(captures) = LIMIT_CLAUSE.captures(&sql_upper) {
            // Digit runs too long for u64 are still bounds; clamp them.
            let limit = captures[1].parse::<u64>().unwrap_or(u64::MAX);
            return limit.min(MAX_ESTIMATE);
        }

        if sql_upper.contains("WHERE") {
            return FILTERED_ESTIMATE;
        }

        if sql_upper.contains("JOIN") {
            return JOINED_ESTIMATE;
        }

        MAX_ESTIMATE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate(sql: &str) -> u64 {
        CardinalityEstimator::estimate(sql, &SchemaModel::default())
    }

    #[test]
    fn test_explicit_limit() {
        assert_eq!(estimate("SELECT * FROM users LIMIT 50"), 50);
        assert_eq!(estimate("select * from users limit 7"), 7);
    }

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(estimate("SELECT * FROM users LIMIT 5000"), 1000);
        assert_eq!(estimate("SELECT * FROM users LIMIT 99999999999999999999999"), 1000);
    }

    #[test]
    fn test_limit_wins_over_where_and_join() {
        assert_eq!(
            estimate("SELECT * FROM a JOIN b ON a.id=b.id WHERE a.x = 1 LIMIT 3"),
            3
        );
    }

    #[test]
    fn test_where_clause() {
        assert_eq!(estimate("SELECT * FROM users WHERE active=true"), 100);
    }

    #[test]
    fn test_join_clause() {
        assert_eq!(estimate("SELECT * FROM a JOIN b ON a.id=b.id"), 500);
    }

    #[test]
    fn test_default() {
        assert_eq!(estimate("SELECT * FROM users"), 1000);
        assert_eq!(estimate(""), 1000);
    }
}
