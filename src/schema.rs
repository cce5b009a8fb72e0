//! Database schema model handed to the generation pipeline.
//!
//! Produced by a schema provider (see [`crate::db::schema_provider`]) and
//! consumed read-only. Table names referenced by relationships and foreign
//! keys are trusted, not validated.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaModel {
    pub tables: Vec<TableModel>,
    #[serde(default)]
    pub relationships: Vec<RelationshipModel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableModel {
    pub name: String,
    pub columns: Vec<ColumnModel>,
    #[serde(default)]
    pub row_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnModel {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_foreign_key: bool,
    #[serde(default)]
    pub foreign_table: Option<String>,
    #[serde(default)]
    pub foreign_column: Option<String>,
}

/// Foreign-key edge, flattened out of the column models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipModel {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

impl SchemaModel {
    pub fn new(tables: Vec<TableModel>, relationships: Vec<RelationshipModel>) -> Self {
        Self {
            tables,
            relationships,
        }
    }

    pub fn get_table(&self, name: &str) -> Option<&TableModel> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Tables whose known row count is strictly above `threshold`.
    pub fn large_tables(&self, threshold: u64) -> impl Iterator<Item = &TableModel> {
        self.tables
            .iter()
            .filter(move |t| t.row_count.unwrap_or(0) > threshold)
    }
}

impl TableModel {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnModel>, row_count: Option<u64>) -> Self {
        Self {
            name: name.into(),
            columns,
            row_count,
        }
    }

    /// Relationships implied by this table's foreign-key columns.
    pub fn relationships(&self) -> Vec<RelationshipModel> {
        self.columns
            .iter()
            .filter(|c| c.is_foreign_key)
            .filter_map(|c| match (&c.foreign_table, &c.foreign_column) {
                (Some(table), Some(column)) => Some(RelationshipModel {
                    from_table: self.name.clone(),
                    from_column: c.name.clone(),
                    to_table: table.clone(),
                    to_column: column.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

impl ColumnModel {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, is_nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable,
            is_primary_key: false,
            is_foreign_key: false,
            foreign_table: None,
            foreign_column: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.is_foreign_key = true;
        self.foreign_table = Some(table.into());
        self.foreign_column = Some(column.into());
        self
    }
}
