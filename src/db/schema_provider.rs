//! Schema introspection over `information_schema`.

use crate::error::Result;
use crate::schema::{ColumnModel, RelationshipModel, SchemaModel, TableModel};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};

#[async_trait]
pub trait SchemaProvider: Send + Sync {
    async fn load_schema(&self) -> Result<SchemaModel>;
}

const TABLES_SQL: &str = r#"
    SELECT table_name::text AS table_name
    FROM information_schema.tables
    WHERE table_schema = 'public'
      AND table_type = 'BASE TABLE'
    ORDER BY table_name
"#;

const COLUMNS_SQL: &str = r#"
    SELECT
        c.column_name::text AS column_name,
        c.data_type::text AS data_type,
        (c.is_nullable = 'YES') AS is_nullable,
        (pk.column_name IS NOT NULL) AS is_primary_key,
        (fk.column_name IS NOT NULL) AS is_foreign_key,
        fk.foreign_table_name::text AS foreign_table_name,
        fk.foreign_column_name::text AS foreign_column_name
    FROM information_schema.columns c
    LEFT JOIN (
        SELECT ku.column_name
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage ku
            ON tc.constraint_name = ku.constraint_name
        WHERE tc.table_name = $1
          AND tc.constraint_type = 'PRIMARY KEY'
    ) pk ON c.column_name = pk.column_name
    LEFT JOIN (
        SELECT
            kcu.column_name,
            ccu.table_name AS foreign_table_name,
            ccu.column_name AS foreign_column_name
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
            ON tc.constraint_name = kcu.constraint_name
        JOIN information_schema.constraint_column_usage ccu
            ON ccu.constraint_name = tc.constraint_name
        WHERE tc.table_name = $1
          AND tc.constraint_type = 'FOREIGN KEY'
    ) fk ON c.column_name = fk.column_name
    WHERE c.table_schema = 'public'
      AND c.table_name = $1
    ORDER BY c.ordinal_position
"#;

pub struct PgSchemaProvider {
    pool: PgPool,
}

impl PgSchemaProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_table_names(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(TABLES_SQL).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<String> { Ok(row.try_get("table_name")?) })
            .collect()
    }

    async fn load_columns(&self, table_name: &str) -> Result<Vec<ColumnModel>> {
        let rows = sqlx::query(COLUMNS_SQL)
            .bind(table_name)
            .fetch_all(&self.pool)
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            columns.push(ColumnModel {
                name: row.try_get("column_name")?,
                data_type: row.try_get("data_type")?,
                is_nullable: row.try_get("is_nullable")?,
                is_primary_key: row.try_get("is_primary_key")?,
                is_foreign_key: row.try_get("is_foreign_key")?,
                foreign_table: row.try_get("foreign_table_name")?,
                foreign_column: row.try_get("foreign_column_name")?,
            });
        }
        Ok(columns)
    }

    /// Exact count; 0 when the count cannot be taken.
    async fn count_rows(&self, table_name: &str) -> u64 {
        let sql = format!(
            "SELECT COUNT(*) FROM \"{}\"",
            table_name.replace('"', "\"\"")
        );
        match sqlx::query_scalar::<_, i64>(&sql).fetch_one(&self.pool).await {
            Ok(count) => count.max(0) as u64,
            Err(e) => {
                warn!("Could not count rows in '{}': {}", table_name, e);
                0
            }
        }
    }
}

#[async_trait]
impl SchemaProvider for PgSchemaProvider {
    async fn load_schema(&self) -> Result<SchemaModel> {
        let table_names = self.load_table_names().await?;
        let mut tables = Vec::with_capacity(table_names.len());
        let mut relationships: Vec<RelationshipModel> = Vec::new();

        for name in table_names {
            let columns = self.load_columns(&name).await?;
            let row_count = self.count_rows(&name).await;
            let table = TableModel::new(name, columns, Some(row_count));
            debug!(
                "Introspected table '{}' ({} columns, {} rows)",
                table.name,
                table.columns.len(),
                row_count
            );
            relationships.extend(table.relationships());
            tables.push(table);
        }

        info!(
            "Loaded schema with {} tables and {} relationships",
            tables.len(),
            relationships.len()
        );
        Ok(SchemaModel::new(tables, relationships))
    }
}
