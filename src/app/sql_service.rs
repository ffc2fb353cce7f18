//! The text-to-SQL request pipeline.
//!
//! A request goes through validation, prompt construction, generation and extraction.
//! Readiness (both the schema and the model being installed) is checked by the caller
//! before a [`SqlService`] exists at all.

use crate::domain::generation::{GenerationError, GenerationOptions, TextGenerator};
use crate::domain::prompt::{build_prompt, extract_sql};
use crate::domain::schema::SchemaText;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

pub const DEFAULT_MAX_QUESTION_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service not ready: model or schema is still loading")]
    NotReady,

    #[error("invalid question: {0}")]
    InvalidQuestion(String),

    #[error("model produced no SQL")]
    NoSqlProduced,

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSql {
    pub sql: String,
    pub question: String,
}

/// Accepts 1 to `max_chars` characters. Whitespace counts.
pub fn validate_question(question: &str, max_chars: usize) -> Result<(), ServiceError> {
    if question.is_empty() {
        return Err(ServiceError::InvalidQuestion(
            "question must not be empty".to_string(),
        ));
    }
    let len = question.chars().count();
    if len > max_chars {
        return Err(ServiceError::InvalidQuestion(format!(
            "question is {} characters long; the limit is {}",
            len, max_chars
        )));
    }
    Ok(())
}

/// Borrowed view over the initialized resources, built per request.
#[derive(Clone)]
pub struct SqlService {
    generator: Arc<dyn TextGenerator>,
    schema: Arc<SchemaText>,
    options: GenerationOptions,
    max_question_chars: usize,
}

impl SqlService {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        schema: Arc<SchemaText>,
        options: GenerationOptions,
        max_question_chars: usize,
    ) -> Self {
        Self {
            generator,
            schema,
            options,
            max_question_chars,
        }
    }

    /// Turns a natural-language question into SQL text. The SQL is returned as produced by the
    /// model; it is never parsed or executed.
    pub async fn generate_sql(&self, question: &str) -> Result<GeneratedSql, ServiceError> {
        validate_question(question, self.max_question_chars)?;

        let prompt = build_prompt(&self.schema, question);

        let start = Instant::now();
        let output = self.generator.generate(&prompt, &self.options).await?;
        tracing::info!(
            model_id = self.generator.model_id(),
            elapsed = ?start.elapsed(),
            output_chars = output.len(),
            "generation completed"
        );

        let sql = extract_sql(&output).ok_or(ServiceError::NoSqlProduced)?;

        Ok(GeneratedSql {
            sql: sql.to_string(),
            question: question.to_string(),
        })
    }
}
