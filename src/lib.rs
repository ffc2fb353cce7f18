pub mod app;
pub mod domain;
pub mod infra;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::sql_service::{GeneratedSql, ServiceError, SqlService};
pub use domain::generation::{
    CandleLlama, GenerationError, GenerationOptions, ModelLoadError, TextGenerator,
};
pub use domain::prompt::{build_prompt, extract_sql, SQL_MARKER};
pub use domain::schema::{load_schema, SchemaError, SchemaText};
pub use infra::config::Settings;
