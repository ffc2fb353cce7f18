//! Startup/shutdown behavior of `lifecycle::serve` with stub model loaders.

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlcoder_service::app::lifecycle;
use sqlcoder_service::transport::http::AppState;
use sqlcoder_service::domain::generation::{DTypeChoice, DeviceChoice, ModelSettings};
use sqlcoder_service::{
    GenerationError, GenerationOptions, ModelLoadError, SchemaText, Settings, TextGenerator,
};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

struct EchoGenerator;

#[async_trait]
impl TextGenerator for EchoGenerator {
    fn model_id(&self) -> &str {
        "echo"
    }

    async fn generate(
        &self,
        _prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        Ok("SELECT 1;".to_string())
    }
}

fn state_with_schema() -> AppState {
    let state = AppState::new(GenerationOptions::default(), 500);
    state.install_schema(SchemaText::new("CREATE TABLE t (id int);\n"));
    state
}

async fn bind() -> (tokio::net::TcpListener, String) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    (listener, base_url)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_schema_aborts_before_binding() {
    // Occupy a port; reaching the bind step would fail with a different error.
    let (taken, _) = bind().await;
    let settings = Settings {
        model: ModelSettings {
            model_id: "/nonexistent/model".to_string(),
            revision: "main".to_string(),
            cache_dir: None,
            hf_token: None,
            device: DeviceChoice::Cpu,
            dtype: DTypeChoice::Auto,
        },
        schema_path: "/nonexistent/schema.sql".into(),
        bind_addr: taken.local_addr().unwrap().to_string(),
        max_new_tokens: 8,
        max_question_chars: 500,
    };

    let result = tokio::time::timeout(Duration::from_secs(10), lifecycle::run(settings))
        .await
        .expect("run did not return");
    let message = format!("{:#}", result.unwrap_err());
    assert!(message.contains("failed to load schema"), "{}", message);
    assert!(!message.contains("failed to bind"), "{}", message);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_model_load_failure_aborts_serving() {
    let (listener, _) = bind().await;
    let result = lifecycle::serve(
        listener,
        state_with_schema(),
        || {
            Err(ModelLoadError::MissingEos(
                "defog/sqlcoder-7b-2".to_string(),
            ))
        },
        std::future::pending(),
    )
    .await;

    let err = result.unwrap_err();
    assert!(format!("{:#}", err).contains("failed to load model"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_warm_up_then_ready_then_graceful_shutdown() {
    let (listener, base_url) = bind().await;
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let state = state_with_schema();
    let server = tokio::spawn(lifecycle::serve(
        listener,
        state.clone(),
        move || {
            // Hold the "load" until the test has observed the warm-up state.
            release_rx.recv_timeout(Duration::from_secs(10)).ok();
            Ok(Arc::new(EchoGenerator) as Arc<dyn TextGenerator>)
        },
        async {
            shutdown_rx.await.ok();
        },
    ));

    let client = reqwest::Client::new();

    // Warm-up: health answers, generation is refused.
    let health: Value = client
        .get(format!("{}/health", base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["model_loaded"], json!(false));
    assert_eq!(health["schema_loaded"], json!(true));

    let resp = client
        .post(format!("{}/generate_sql", base_url))
        .json(&json!({ "question": "anything" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 503);

    release_tx.send(()).unwrap();

    let mut ready = false;
    for _ in 0..50 {
        if state.model_loaded() {
            ready = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(ready, "model was never installed");

    let body: Value = client
        .post(format!("{}/generate_sql", base_url))
        .json(&json!({ "question": "anything" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "sql": "SELECT 1;", "question": "anything" }));

    drop(client);
    shutdown_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .expect("server did not shut down")
        .unwrap();
    assert!(result.is_ok());
}
