//! Runtime configuration from the environment (and `.env`).

use crate::error::{Nl2SqlError, Result};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ExecutionLimits {
    /// Server-side `statement_timeout`.
    pub query_timeout: Duration,
    pub max_result_rows: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(30),
            max_result_rows: 1000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub database_url: String,
    pub limits: ExecutionLimits,
    pub server_addr: String,
}

impl Config {
    /// Load `.env` if present, then read the process environment.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            llm: LlmConfig {
                api_key: get("OPENAI_API_KEY", ""),
                model: get("OPENAI_MODEL", DEFAULT_MODEL),
                base_url: get("OPENAI_BASE_URL", DEFAULT_BASE_URL),
                timeout: Duration::from_secs(parse_var(&lookup, "LLM_TIMEOUT", 60)?),
            },
            database_url: get("DATABASE_URL", ""),
            limits: ExecutionLimits {
                query_timeout: Duration::from_secs(parse_var(&lookup, "MAX_QUERY_TIMEOUT", 30)?),
                max_result_rows: parse_var(&lookup, "MAX_RESULT_ROWS", 1000)?,
            },
            server_addr: get("SERVER_ADDR", DEFAULT_SERVER_ADDR),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.llm.api_key.is_empty() {
            return Err(Nl2SqlError::Config(
                "OPENAI_API_KEY environment variable is required".to_string(),
            ));
        }
        if self.database_url.is_empty() {
            return Err(Nl2SqlError::Config(
                "DATABASE_URL environment variable is required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn llm_configured(&self) -> bool {
        !self.llm.api_key.is_empty()
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Nl2SqlError::Config(format!("Invalid {} '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}
