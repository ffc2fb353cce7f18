use crate::app::sql_service::ServiceError;
use crate::transport::http::handlers::common::service_error_response;
use crate::transport::http::types::{AppState, SchemaResponse};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

#[utoipa::path(
    get,
    path = "/schema",
    responses(
        (status = 200, description = "Schema embedded in every prompt", body = SchemaResponse),
        (status = 503, description = "Schema not loaded yet", body = ApiResponse)
    )
)]
pub async fn get_schema_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.schema() {
        Some(schema) => (
            StatusCode::OK,
            Json(SchemaResponse {
                tables: schema.table_names(),
                schema: schema.as_str().to_string(),
            }),
        )
            .into_response(),
        None => service_error_response(ServiceError::NotReady).into_response(),
    }
}
