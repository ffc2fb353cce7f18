use crate::app::sql_service::{ServiceError, SqlService};
use crate::domain::generation::{GenerationOptions, TextGenerator};
use crate::domain::schema::SchemaText;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use utoipa::ToSchema;

/// Shared state handed to every handler.
///
/// Schema and model are installed exactly once during startup; until both are present the
/// service answers `/generate_sql` with 503.
#[derive(Clone)]
pub struct AppState {
    schema: Arc<OnceCell<Arc<SchemaText>>>,
    generator: Arc<OnceCell<Arc<dyn TextGenerator>>>,
    pub options: GenerationOptions,
    pub max_question_chars: usize,
}

impl AppState {
    pub fn new(options: GenerationOptions, max_question_chars: usize) -> Self {
        Self {
            schema: Arc::new(OnceCell::new()),
            generator: Arc::new(OnceCell::new()),
            options,
            max_question_chars,
        }
    }

    /// Returns false if a schema was already installed (the first one is kept).
    pub fn install_schema(&self, schema: SchemaText) -> bool {
        self.schema.set(Arc::new(schema)).is_ok()
    }

    /// Returns false if a model was already installed (the first one is kept).
    pub fn install_generator(&self, generator: Arc<dyn TextGenerator>) -> bool {
        self.generator.set(generator).is_ok()
    }

    pub fn schema_loaded(&self) -> bool {
        self.schema.initialized()
    }

    pub fn model_loaded(&self) -> bool {
        self.generator.initialized()
    }

    pub fn schema(&self) -> Option<Arc<SchemaText>> {
        self.schema.get().cloned()
    }

    /// Request pipeline over the installed resources, or `NotReady`.
    pub fn sql_service(&self) -> Result<SqlService, ServiceError> {
        match (self.generator.get(), self.schema.get()) {
            (Some(generator), Some(schema)) => Ok(SqlService::new(
                Arc::clone(generator),
                Arc::clone(schema),
                self.options.clone(),
                self.max_question_chars,
            )),
            _ => Err(ServiceError::NotReady),
        }
    }
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct GenerateSqlRequest {
    /// Natural-language question, 1 to 500 characters by default.
    pub question: String,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct GenerateSqlResponse {
    /// SQL text as produced by the model. Not validated or executed.
    pub sql: String,
    /// The question exactly as received.
    pub question: String,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub schema_loaded: bool,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct SchemaResponse {
    /// Table names in file order.
    pub tables: Vec<String>,
    /// Extracted `CREATE TABLE` statements as embedded in prompts.
    pub schema: String,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

pub fn json_422(err: JsonRejection, expected: &str) -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiResponse::error(format!(
            "Invalid JSON body: {} (expected: {})",
            err.body_text(),
            expected
        ))),
    )
}
