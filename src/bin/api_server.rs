// src/bin/api_server.rs

use sqlcoder_service::app::lifecycle;
use sqlcoder_service::infra::telemetry;
use sqlcoder_service::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    telemetry::init_tracing("sqlcoder-api");

    let settings = Settings::from_env()?;
    tracing::info!(
        model_id = %settings.model.model_id,
        schema_path = %settings.schema_path.display(),
        bind_addr = %settings.bind_addr,
        max_new_tokens = settings.max_new_tokens,
        "starting sqlcoder API"
    );

    lifecycle::run(settings).await?;

    tracing::info!("graceful shutdown complete");
    Ok(())
}
