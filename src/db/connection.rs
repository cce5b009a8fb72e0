//! Database connection management using sqlx

use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::Connection;
use std::time::Duration;
use tracing::{info, warn};

pub type DbPool = PgPool;

/// Initialize a connection pool and check it answers.
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;

    Ok(pool)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionReport {
    pub status: ConnectionStatus,
    pub message: String,
    pub database_name: Option<String>,
}

impl ConnectionReport {
    pub fn is_success(&self) -> bool {
        self.status == ConnectionStatus::Success
    }

    pub fn failed(reason: impl std::fmt::Display) -> Self {
        Self {
            status: ConnectionStatus::Error,
            message: format!("Connection failed: {}", reason),
            database_name: None,
        }
    }
}

/// Open a one-off connection and report the database name; failures are
/// reported in the result, never returned.
pub async fn test_connection(database_url: &str) -> ConnectionReport {
    let mut conn = match PgConnection::connect(database_url).await {
        Ok(conn) => conn,
        Err(e) => {
            warn!("Connection test failed: {}", e);
            return ConnectionReport::failed(e);
        }
    };

    let name = sqlx::query_scalar::<_, String>("SELECT current_database()::text")
        .fetch_one(&mut conn)
        .await;
    let _ = conn.close().await;

    match name {
        Ok(database_name) => {
            info!("Connected to database '{}'", database_name);
            ConnectionReport {
                status: ConnectionStatus::Success,
                message: "Connection successful".to_string(),
                database_name: Some(database_name),
            }
        }
        Err(e) => ConnectionReport::failed(e),
    }
}
