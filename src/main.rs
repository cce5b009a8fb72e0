use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use nl2sql::config::Config;
use nl2sql::db::{init_pool, PgQueryExecutor, PgSchemaProvider, QueryExecutor, SchemaProvider};
use nl2sql::llm::LlmClient;
use nl2sql::suggestions::suggest_questions;
use nl2sql::QueryGenerator;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nl2sql")]
#[command(about = "Turn natural-language questions into reviewed PostgreSQL queries")]
struct Args {
    /// PostgreSQL connection URL (or set DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// OpenAI API key (or set OPENAI_API_KEY env var)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Completion model (or set OPENAI_MODEL env var)
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the introspected schema
    Schema,
    /// Generate SQL for a question
    Generate {
        /// The question in natural language
        question: String,
        /// Run the generated statement when it is a read
        #[arg(long)]
        execute: bool,
    },
    /// Run a SQL statement with the configured timeout and row cap
    Execute {
        sql: String,
    },
    /// Suggest business questions for the schema
    Suggest,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = Config::load()?;
    if let Some(url) = args.database_url {
        config.database_url = url;
    }
    if let Some(key) = args.api_key {
        config.llm.api_key = key;
    }
    if let Some(model) = args.model {
        config.llm.model = model;
    }

    if config.database_url.is_empty() {
        bail!("DATABASE_URL is required (flag --database-url or env var)");
    }

    let pool = init_pool(&config.database_url, 5).await?;
    info!("Connected to database");

    match args.command {
        Command::Schema => {
            let schema = PgSchemaProvider::new(pool).load_schema().await?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Command::Generate { question, execute } => {
            config.validate()?;
            let schema = PgSchemaProvider::new(pool.clone()).load_schema().await?;
            let client = LlmClient::from_config(&config.llm);
            info!("Generating with model {}", client.model());
            let generator = QueryGenerator::new(Arc::new(client));
            let query = generator.generate(&question, &schema).await;
            println!("{}", serde_json::to_string_pretty(&query)?);

            if execute {
                if query.operation_kind.is_read() {
                    let executor = PgQueryExecutor::new(pool, config.limits.clone());
                    let execution = executor.execute(&query.sql).await;
                    println!("{}", serde_json::to_string_pretty(&execution)?);
                } else {
                    warn!("Skipping execution of {} statement", query.operation_kind);
                }
            }
        }
        Command::Execute { sql } => {
            let executor = PgQueryExecutor::new(pool, config.limits.clone());
            let execution = executor.execute(&sql).await;
            println!("{}", serde_json::to_string_pretty(&execution)?);
        }
        Command::Suggest => {
            config.validate()?;
            let schema = PgSchemaProvider::new(pool).load_schema().await?;
            let client = LlmClient::from_config(&config.llm);
            for question in suggest_questions(&client, &schema).await {
                println!("- {}", question);
            }
        }
    }

    Ok(())
}
