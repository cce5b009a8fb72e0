//! Guarded statement execution.
//!
//! Statements run inside a transaction with `SET LOCAL statement_timeout` that
//! is always rolled back, so neither the timeout nor any write made by the
//! statement outlives the call. At most `max_result_rows` rows are kept; one
//! extra row is read to detect truncation.

use crate::config::ExecutionLimits;
use crate::error::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::postgres::{PgColumn, PgRow};
use sqlx::{Column, Either, Executor, PgPool, Row, TypeInfo, ValueRef};
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryExecution {
    pub success: bool,
    pub data: Vec<Map<String, Value>>,
    pub columns: Vec<String>,
    pub row_count: u64,
    /// Seconds.
    pub execution_time: f64,
    pub error: Option<String>,
    pub was_limited: bool,
}

impl QueryExecution {
    pub fn failed(error: impl std::fmt::Display, execution_time: f64) -> Self {
        Self {
            success: false,
            execution_time,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run `sql`; failures are reported inside the returned value.
    async fn execute(&self, sql: &str) -> QueryExecution;
}

pub struct PgQueryExecutor {
    pool: PgPool,
    limits: ExecutionLimits,
}

impl PgQueryExecutor {
    pub fn new(pool: PgPool, limits: ExecutionLimits) -> Self {
        Self { pool, limits }
    }

    async fn run(&self, sql: &str) -> Result<QueryExecution> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!(
            "SET LOCAL statement_timeout = {}",
            self.limits.query_timeout.as_millis()
        ))
        .execute(&mut *tx)
        .await?;

        let mut rows = CappedRows::new(self.limits.max_result_rows);
        let mut columns = Vec::new();
        let mut rows_affected = 0u64;
        {
            let mut stream = sqlx::raw_sql(sql).fetch_many(&mut *tx);
            while let Some(item) = stream.try_next().await? {
                match item {
                    Either::Left(done) => rows_affected += done.rows_affected(),
                    Either::Right(row) => {
                        if columns.is_empty() {
                            columns = column_names(row.columns());
                        }
                        if !rows.push(row_to_json(&row)) {
                            break;
                        }
                    }
                }
            }
        }

        if rows.seen() == 0 {
            // No row to read names from; ask the server for the result shape.
            match (&mut *tx).describe(sql).await {
                Ok(described) => columns = column_names(described.columns()),
                Err(e) => debug!("Could not describe result columns: {}", e),
            }
        }

        // Never keep side effects of the submitted statement.
        tx.rollback().await?;

        let row_count = if rows.seen() > 0 {
            rows.len() as u64
        } else {
            rows_affected
        };
        let (data, was_limited) = rows.finish();

        Ok(QueryExecution {
            success: true,
            data,
            columns,
            row_count,
            execution_time: 0.0,
            error: None,
            was_limited,
        })
    }
}

#[async_trait]
impl QueryExecutor for PgQueryExecutor {
    async fn execute(&self, sql: &str) -> QueryExecution {
        let start = Instant::now();
        match self.run(sql).await {
            Ok(mut execution) => {
                execution.execution_time = start.elapsed().as_secs_f64();
                info!(
                    "Query returned {} rows in {:.3}s (limited: {})",
                    execution.row_count, execution.execution_time, execution.was_limited
                );
                execution
            }
            Err(e) => {
                warn!("Query execution failed: {}", e);
                QueryExecution::failed(e, start.elapsed().as_secs_f64())
            }
        }
    }
}

/// Keeps at most `max` rows; an offered row past the cap marks the result limited.
#[derive(Debug)]
struct CappedRows<T> {
    max: usize,
    kept: Vec<T>,
    seen: usize,
    was_limited: bool,
}

impl<T> CappedRows<T> {
    fn new(max: usize) -> Self {
        Self {
            max,
            kept: Vec::new(),
            seen: 0,
            was_limited: false,
        }
    }

    /// Returns false once the cap is exceeded and reading should stop.
    fn push(&mut self, row: T) -> bool {
        self.seen += 1;
        if self.kept.len() >= self.max {
            self.was_limited = true;
            return false;
        }
        self.kept.push(row);
        true
    }

    fn seen(&self) -> usize {
        self.seen
    }

    fn len(&self) -> usize {
        self.kept.len()
    }

    fn finish(self) -> (Vec<T>, bool) {
        (self.kept, self.was_limited)
    }
}

fn column_names(columns: &[PgColumn]) -> Vec<String> {
    columns.iter().map(|c| c.name().to_string()).collect()
}

fn row_to_json(row: &PgRow) -> Map<String, Value> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| (column.name().to_string(), column_value(row, idx)))
        .collect()
}

fn column_value(row: &PgRow, idx: usize) -> Value {
    let type_name = row.columns()[idx].type_info().name().to_string();
    let decoded = match type_name.as_str() {
        "BOOL" => row.try_get::<Option<bool>, _>(idx).map(|v| json!(v)),
        "INT2" => row.try_get::<Option<i16>, _>(idx).map(|v| json!(v)),
        "INT4" => row.try_get::<Option<i32>, _>(idx).map(|v| json!(v)),
        "INT8" => row.try_get::<Option<i64>, _>(idx).map(|v| json!(v)),
        "FLOAT4" => row.try_get::<Option<f32>, _>(idx).map(|v| json!(v)),
        "FLOAT8" => row.try_get::<Option<f64>, _>(idx).map(|v| json!(v)),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
            row.try_get::<Option<String>, _>(idx).map(|v| json!(v))
        }
        "UUID" => row.try_get::<Option<uuid::Uuid>, _>(idx).map(|v| json!(v)),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(idx)
            .map(|v| json!(v)),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)
            .map(|v| json!(v)),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
            .map(|v| json!(v)),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(idx).map(|v| json!(v)),
        _ => return raw_text(row, idx),
    };
    decoded.unwrap_or_else(|_| raw_text(row, idx))
}

/// Text rendering for types without a typed decoder (numeric, intervals, ...).
fn raw_text(row: &PgRow, idx: usize) -> Value {
    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => Value::Null,
        Ok(raw) => raw
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .unwrap_or(Value::Null),
        Err(_) => Value::Null,
    }
}
