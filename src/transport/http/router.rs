use crate::transport::http::handlers::common::panic_response;
use crate::transport::http::handlers::{generate, health, schema};
use crate::transport::http::types::{
    ApiResponse, AppState, GenerateSqlRequest, GenerateSqlResponse, HealthResponse, SchemaResponse,
};
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        generate::generate_sql_handler,
        schema::get_schema_handler
    ),
    components(schemas(
        GenerateSqlRequest,
        GenerateSqlResponse,
        HealthResponse,
        SchemaResponse,
        ApiResponse
    ))
)]
pub struct ApiDoc;

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .route("/generate_sql", post(generate::generate_sql_handler))
        .route("/schema", get(schema::get_schema_handler))
        .with_state(app_state)
}

/// Router plus docs, CORS (any origin/method/header, no credentials), request tracing and
/// panic recovery.
pub fn create_app(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    create_router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
