//! Statement classification by leading keyword.
//!
//! Advisory only: feeds the safety and sizing heuristics, never used as an
//! access-control decision.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    #[serde(rename = "select")]
    Read,
    #[serde(rename = "insert")]
    Insert,
    #[serde(rename = "update")]
    Update,
    #[serde(rename = "delete")]
    Delete,
    #[serde(rename = "unknown")]
    Unrecognized,
}

const PREFIXES: &[(&str, OperationKind)] = &[
    ("SELECT", OperationKind::Read),
    ("INSERT", OperationKind::Insert),
    ("UPDATE", OperationKind::Update),
    ("DELETE", OperationKind::Delete),
];

impl OperationKind {
    pub fn classify(sql: &str) -> Self {
        let sql_upper = sql.trim().to_uppercase();
        PREFIXES
            .iter()
            .find(|(prefix, _)| sql_upper.starts_with(prefix))
            .map(|(_, kind)| *kind)
            .unwrap_or(OperationKind::Unrecognized)
    }

    pub fn is_read(&self) -> bool {
        matches!(self, OperationKind::Read)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Read => "select",
            OperationKind::Insert => "insert",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Unrecognized => "unknown",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
