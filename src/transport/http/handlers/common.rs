use crate::app::sql_service::ServiceError;
use crate::transport::http::types::ApiResponse;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::any::Any;

/// Maps a pipeline error to a status and a message that is safe to return to clients.
///
/// Generation errors are logged in full here; only a generic message leaves the process.
pub fn service_error_response(err: ServiceError) -> (StatusCode, Json<ApiResponse>) {
    match err {
        ServiceError::NotReady => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::error("Service not ready")),
        ),
        ServiceError::InvalidQuestion(reason) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::error(reason)),
        ),
        ServiceError::NoSqlProduced => {
            tracing::warn!("model output contained no SQL");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ApiResponse::error("Model did not produce a SQL query")),
            )
        }
        ServiceError::Generation(e) => {
            tracing::error!(error = %e, "sql generation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("SQL generation failed")),
            )
        }
    }
}

/// Last-resort handler for panics inside request handling. The panic hook has already printed
/// the location (and backtrace, with `RUST_BACKTRACE=1`).
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic = detail, "request handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::error("Internal server error")),
    )
        .into_response()
}
