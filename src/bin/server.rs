//! HTTP server for the NL2SQL API
//! Simple HTTP server using tokio and basic HTTP handling

use nl2sql::config::Config;
use nl2sql::db::{
    init_pool, test_connection, DbPool, PgQueryExecutor, PgSchemaProvider, QueryExecutor,
    SchemaProvider,
};
use nl2sql::llm::LlmClient;
use nl2sql::suggestions::suggest_questions;
use nl2sql::QueryGenerator;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const MAX_REQUEST_BYTES: usize = 1_000_000;

struct AppState {
    config: Config,
    generator: QueryGenerator,
}

#[derive(Deserialize)]
struct ConnectionRequest {
    database_url: String,
}

#[derive(Deserialize)]
struct QueryRequest {
    natural_language: String,
    database_url: String,
}

#[derive(Deserialize)]
struct ExecuteRequest {
    sql: String,
    database_url: String,
}

#[derive(Debug)]
struct ApiError {
    status: u16,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl std::fmt::Display) -> Self {
        Self {
            status: 400,
            detail: detail.to_string(),
        }
    }

    fn internal(detail: impl std::fmt::Display) -> Self {
        Self {
            status: 500,
            detail: detail.to_string(),
        }
    }
}

type ApiResult = Result<String, ApiError>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;
    if config.llm_configured() {
        info!("OpenAI API key found, SQL generation enabled");
    } else {
        warn!("OpenAI API key not found, /api/generate-query will be rejected");
    }

    let generator = QueryGenerator::new(Arc::new(LlmClient::from_config(&config.llm)));
    let addr = config.server_addr.clone();
    let state = Arc::new(AppState { config, generator });

    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    loop {
        let (stream, peer) = listener.accept().await?;
        debug!("New connection from: {}", peer);
        tokio::spawn(handle_connection(stream, state.clone()));
    }
}

async fn handle_connection(mut stream: TcpStream, state: Arc<AppState>) {
    let mut buffer = Vec::new();
    let mut temp_buf = [0; 8192];

    let read_result = timeout(Duration::from_secs(5), async {
        loop {
            let n = stream.read(&mut temp_buf).await?;
            if n == 0 {
                break;
            }
            buffer.extend_from_slice(&temp_buf[..n]);
            if request_complete(&buffer) || buffer.len() > MAX_REQUEST_BYTES {
                break;
            }
        }
        Ok::<(), std::io::Error>(())
    })
    .await;

    match read_result {
        Err(_) => {
            warn!("Request read timeout");
            return;
        }
        Ok(Err(e)) => {
            error!("Failed to read from stream: {}", e);
            return;
        }
        Ok(Ok(())) => {}
    }

    if buffer.is_empty() {
        return;
    }

    let response = match String::from_utf8(buffer) {
        Ok(request) if body_too_large(&request) => {
            warn!("Rejecting request body over {} bytes", MAX_REQUEST_BYTES);
            create_response(400, "Bad Request", r#"{"detail":"request body too large"}"#)
        }
        Ok(request) => handle_request(&state, &request).await,
        Err(e) => {
            warn!("Failed to parse request as UTF-8: {}", e);
            create_response(400, "Bad Request", r#"{"detail":"request is not valid UTF-8"}"#)
        }
    };

    if let Err(e) = stream.write_all(response.as_bytes()).await {
        error!("Failed to write response: {}", e);
    }
}

/// Headers received and, when a Content-Length is given, the full body too.
fn request_complete(buffer: &[u8]) -> bool {
    let Ok(s) = std::str::from_utf8(buffer) else {
        return false;
    };
    match s.find("\r\n\r\n") {
        Some(headers_end) => match extract_content_length(s) {
            Some(len) if len <= MAX_REQUEST_BYTES => headers_end
                .checked_add(4 + len)
                .map_or(true, |total| buffer.len() >= total),
            // No length, or one too large to wait for.
            _ => true,
        },
        None => false,
    }
}

fn body_too_large(request: &str) -> bool {
    extract_content_length(request).map_or(false, |len| len > MAX_REQUEST_BYTES)
}

fn extract_content_length(request: &str) -> Option<usize> {
    for line in request.lines() {
        if line.is_empty() {
            break;
        }
        if line.to_lowercase().starts_with("content-length:") {
            if let Some(value) = line.split(':').nth(1) {
                return value.trim().parse().ok();
            }
        }
    }
    None
}

/// Split a raw request into method, normalized path and body.
fn parse_request(request: &str) -> Option<(&str, String, &str)> {
    let request_line = request.lines().next()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?;
    let full_path = parts.next()?;

    let path_str = full_path.split('?').next().unwrap_or(full_path);
    let mut path = path_str.trim_end_matches('/').to_string();
    if path.is_empty() {
        path = "/".to_string();
    }

    let body = request
        .find("\r\n\r\n")
        .map(|idx| &request[idx + 4..])
        .unwrap_or("");

    Some((method, path, body))
}

async fn handle_request(state: &AppState, request: &str) -> String {
    let Some((method, path, body)) = parse_request(request) else {
        return create_response(400, "Bad Request", "{}");
    };

    debug!("Request: {} {}", method, path);

    let result = match (method, path.as_str()) {
        ("OPTIONS", _) => return create_response(204, "No Content", ""),
        ("GET", "/") => Ok(r#"{"message":"Natural Language SQL Tool API"}"#.to_string()),
        ("GET", "/api/health") => health(state),
        ("POST", "/api/connect") => connect(body).await,
        ("POST", "/api/schema") => schema(body).await,
        ("POST", "/api/generate-query") => generate_query(state, body).await,
        ("POST", "/api/execute-query") => execute_query(state, body).await,
        ("POST", "/api/suggestions") => suggestions(state, body).await,
        _ => Err(ApiError {
            status: 404,
            detail: format!("No route for {} {}", method, path),
        }),
    };

    match result {
        Ok(json) => create_response(200, "OK", &json),
        Err(e) => {
            if e.status >= 500 {
                error!("{} {} failed: {}", method, path, e.detail);
            }
            let body = serde_json::json!({ "detail": e.detail }).to_string();
            create_response(e.status, status_text(e.status), &body)
        }
    }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))
}

fn to_json<T: serde::Serialize>(value: &T) -> ApiResult {
    serde_json::to_string(value).map_err(ApiError::internal)
}

/// Check the connection first, then open a small pool for the request.
async fn connect_checked(database_url: &str) -> Result<DbPool, ApiError> {
    let report = test_connection(database_url).await;
    if !report.is_success() {
        return Err(ApiError::bad_request(report.message));
    }
    init_pool(database_url, 2).await.map_err(ApiError::internal)
}

fn health(state: &AppState) -> ApiResult {
    to_json(&serde_json::json!({
        "status": "healthy",
        "openai_configured": state.config.llm_configured(),
        "max_query_timeout": state.config.limits.query_timeout.as_secs(),
        "max_result_rows": state.config.limits.max_result_rows,
    }))
}

async fn connect(body: &str) -> ApiResult {
    let req: ConnectionRequest = parse_body(body)?;
    to_json(&test_connection(&req.database_url).await)
}

async fn schema(body: &str) -> ApiResult {
    let req: ConnectionRequest = parse_body(body)?;
    let pool = connect_checked(&req.database_url).await?;
    let schema = PgSchemaProvider::new(pool.clone()).load_schema().await;
    pool.close().await;
    to_json(&schema.map_err(ApiError::internal)?)
}

async fn generate_query(state: &AppState, body: &str) -> ApiResult {
    let req: QueryRequest = parse_body(body)?;
    if !state.config.llm_configured() {
        return Err(ApiError::bad_request("OpenAI API key not configured"));
    }

    let pool = connect_checked(&req.database_url).await?;
    let schema = PgSchemaProvider::new(pool.clone()).load_schema().await;
    pool.close().await;
    let schema = schema.map_err(ApiError::internal)?;

    to_json(&state.generator.generate(&req.natural_language, &schema).await)
}

async fn execute_query(state: &AppState, body: &str) -> ApiResult {
    let req: ExecuteRequest = parse_body(body)?;
    let pool = connect_checked(&req.database_url).await?;
    let executor = PgQueryExecutor::new(pool.clone(), state.config.limits.clone());
    let execution = executor.execute(&req.sql).await;
    pool.close().await;
    to_json(&execution)
}

async fn suggestions(state: &AppState, body: &str) -> ApiResult {
    let req: ConnectionRequest = parse_body(body)?;
    let pool = connect_checked(&req.database_url).await?;
    let schema = PgSchemaProvider::new(pool.clone()).load_schema().await;
    pool.close().await;
    let schema = schema.map_err(ApiError::internal)?;

    let questions = suggest_questions(state.generator.client().as_ref(), &schema).await;
    to_json(&serde_json::json!({ "questions": questions }))
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        _ => "Internal Server Error",
    }
}

fn create_response(status: u16, status_text: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Content-Length: {}\r\n\
         \r\n\
         {}",
        status,
        status_text,
        body.len(),
        body
    )
}
