//! Process lifecycle: initialize resources, serve, release.
//!
//! The schema is loaded before the listener is bound, so a bad schema path never yields a
//! listening process. The model loads on a blocking worker while the listener is already up:
//! `/health` answers during warm-up and `/generate_sql` returns 503 until the model is
//! installed. A model load failure stops the server and is returned as the startup error.

use crate::domain::generation::{CandleLlama, GenerationOptions, ModelLoadError, TextGenerator};
use crate::domain::schema::load_schema;
use crate::infra::config::Settings;
use crate::transport::http::{create_app, AppState};
use anyhow::Context;
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Runs the service until Ctrl+C or a fatal initialization error.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let state = AppState::new(
        GenerationOptions {
            max_new_tokens: settings.max_new_tokens,
            ..Default::default()
        },
        settings.max_question_chars,
    );

    let schema = load_schema(&settings.schema_path)
        .with_context(|| format!("failed to load schema from {}", settings.schema_path.display()))?;
    tracing::info!(
        path = %settings.schema_path.display(),
        tables = schema.table_names().len(),
        "schema loaded"
    );
    state.install_schema(schema);

    let listener = TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;
    tracing::info!("API server listening on http://{}", listener.local_addr()?);
    tracing::info!("Swagger UI available at /swagger-ui");

    let model_settings = settings.model.clone();
    serve(
        listener,
        state,
        move || {
            CandleLlama::load(&model_settings).map(|m| Arc::new(m) as Arc<dyn TextGenerator>)
        },
        shutdown_signal(),
    )
    .await
}

/// Serves `state` on `listener` while `load_model` runs on the blocking pool.
///
/// Returns once `shutdown` resolves (after in-flight requests finish) or as soon as the model
/// fails to load.
pub async fn serve<L, S>(
    listener: TcpListener,
    state: AppState,
    load_model: L,
    shutdown: S,
) -> anyhow::Result<()>
where
    L: FnOnce() -> Result<Arc<dyn TextGenerator>, ModelLoadError> + Send + 'static,
    S: Future<Output = ()> + Send + 'static,
{
    let _resources = Resources {
        state: Some(state.clone()),
    };

    let server = axum::serve(listener, create_app(state.clone()))
        .with_graceful_shutdown(shutdown)
        .into_future();
    tokio::pin!(server);

    let loader = tokio::task::spawn_blocking(load_model);
    let install = async {
        let generator = match loader.await {
            Ok(Ok(generator)) => generator,
            Ok(Err(e)) => return Err(anyhow::Error::new(e).context("failed to load model")),
            Err(e) => return Err(anyhow::anyhow!("model loader did not complete: {}", e)),
        };
        tracing::info!(model_id = generator.model_id(), "model ready, accepting generation requests");
        state.install_generator(generator);
        Ok(())
    };

    tokio::select! {
        result = &mut server => {
            tracing::info!("server stopped before the model finished loading");
            result?;
            return Ok(());
        }
        loaded = install => {
            if let Err(e) = loaded {
                tracing::error!("initialization failed, shutting down: {:#}", e);
                return Err(e);
            }
        }
    }

    server.await?;
    Ok(())
}

/// The lifecycle's own handle on the shared resources. Dropped on every exit path; the model
/// and schema are freed once the last in-flight request lets go of them.
struct Resources {
    state: Option<AppState>,
}

impl Drop for Resources {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            let model_loaded = state.model_loaded();
            drop(state);
            tracing::info!(model_loaded, "released model and schema handles");
        }
    }
}

async fn shutdown_signal() {
    wait_for_signal(tokio::signal::ctrl_c()).await
}

/// Resolves when `signal` fires. A signal that cannot be registered never resolves.
async fn wait_for_signal<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C, graceful shutdown disabled");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received (Ctrl+C)");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_fires_shutdown() {
        let fired = tokio::time::timeout(Duration::from_secs(1), wait_for_signal(async { Ok(()) }))
            .await;
        assert!(fired.is_ok());
    }

    #[tokio::test]
    async fn test_unregistered_signal_keeps_serving() {
        let failed = async { Err(std::io::Error::other("signal handler unavailable")) };
        let fired = tokio::time::timeout(Duration::from_millis(100), wait_for_signal(failed)).await;
        assert!(fired.is_err());
    }
}
