//! Business questions suggested from a schema.

use crate::llm::{CompletionClient, CompletionRequest};
use crate::schema::SchemaModel;
use tracing::{error, info};

pub const MAX_SUGGESTIONS: usize = 8;

pub const FALLBACK_QUESTIONS: &[&str] = &[
    "Who are our top customers?",
    "What are our best-selling products?",
    "How is our revenue trending?",
    "Which users are most active?",
];

fn build_prompt(schema: &SchemaModel) -> String {
    let schema_summary = schema
        .tables
        .iter()
        .map(|t| {
            let columns: Vec<&str> = t.columns.iter().map(|c| c.name.as_str()).collect();
            format!("Table '{}' with columns: {}", t.name, columns.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Based on this database schema, suggest {} practical business questions that a non-technical user might want to ask.

Database Schema:
{}

Generate questions that are:
- Business-focused (not technical)
- Actionable for decision-making
- Varied in complexity
- Natural language (no SQL terms)

Format as a simple list, one question per line.
Examples:
- "Who are our top 10 customers by revenue?"
- "What products are selling best this month?"
- "Which marketing campaigns drove the most sales?""#,
        MAX_SUGGESTIONS, schema_summary
    )
}

/// Split a bulleted completion into at most [`MAX_SUGGESTIONS`] questions.
pub fn parse_suggestions(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            line.trim_start_matches(|c: char| c == '-' || c == '*' || c == ' ')
                .trim()
                .trim_matches('"')
                .to_string()
        })
        .filter(|q| !q.is_empty())
        .take(MAX_SUGGESTIONS)
        .collect()
}

/// Never fails: a client error yields [`FALLBACK_QUESTIONS`].
pub async fn suggest_questions(client: &dyn CompletionClient, schema: &SchemaModel) -> Vec<String> {
    let request = CompletionRequest::new(build_prompt(schema))
        .with_temperature(0.7)
        .with_max_tokens(500);

    match client.complete(&request).await {
        Ok(text) => {
            let questions = parse_suggestions(&text);
            info!("Generated {} suggested questions", questions.len());
            questions
        }
        Err(e) => {
            error!("Error generating suggestions: {}", e);
            FALLBACK_QUESTIONS.iter().map(|q| q.to_string()).collect()
        }
    }
}
