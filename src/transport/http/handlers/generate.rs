use crate::transport::http::handlers::common::service_error_response;
use crate::transport::http::types::{
    json_422, AppState, GenerateSqlRequest, GenerateSqlResponse,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::Instrument;

#[utoipa::path(
    post,
    path = "/generate_sql",
    request_body = GenerateSqlRequest,
    responses(
        (status = 200, description = "SQL generated", body = GenerateSqlResponse),
        (status = 422, description = "Invalid question, malformed body, or no SQL produced", body = ApiResponse),
        (status = 500, description = "Generation failed", body = ApiResponse),
        (status = 503, description = "Model or schema still loading", body = ApiResponse)
    )
)]
pub async fn generate_sql_handler(
    State(state): State<AppState>,
    payload: Result<Json<GenerateSqlRequest>, JsonRejection>,
) -> impl IntoResponse {
    let service = match state.sql_service() {
        Ok(s) => s,
        Err(e) => return service_error_response(e).into_response(),
    };

    let request = match payload {
        Ok(Json(r)) => r,
        Err(e) => return json_422(e, r#"{"question": string}"#).into_response(),
    };

    let span = tracing::info_span!(
        "generate_sql",
        question_chars = request.question.chars().count()
    );

    match service.generate_sql(&request.question).instrument(span).await {
        Ok(generated) => (
            StatusCode::OK,
            Json(GenerateSqlResponse {
                sql: generated.sql,
                question: generated.question,
            }),
        )
            .into_response(),
        Err(e) => service_error_response(e).into_response(),
    }
}
