use sqlcoder_service::app::sql_service::SqlService;
use sqlcoder_service::domain::generation::TextGenerator;
use sqlcoder_service::infra::hub::resolve_model_files;
use sqlcoder_service::infra::telemetry;
use sqlcoder_service::{load_schema, CandleLlama, GenerationOptions, Settings};
use std::sync::Arc;

const DEFAULT_QUESTION: &str = "How many films are in each category?";

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin preflight -- [--load-model] [--question <text>]\n\
         \n\
         Checks configuration, extracts the schema and resolves (downloading if needed) the\n\
         model files. With --load-model the weights are loaded and one question is answered.\n\
         \n\
         Reads env vars (all optional):\n\
           SQLCODER_MODEL_ID, SQLCODER_MODEL_REVISION, SQLCODER_CACHE_DIR, HF_TOKEN,\n\
           SQLCODER_DEVICE, SQLCODER_DTYPE, SCHEMA_PATH, MAX_NEW_TOKENS, MAX_QUESTION_CHARS\n"
    );
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    telemetry::init_tracing("preflight");

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage_and_exit();
    }
    let load_model = args.iter().any(|a| a == "--load-model");
    let question = match args.iter().position(|a| a == "--question") {
        Some(i) => match args.get(i + 1) {
            Some(q) => q.clone(),
            None => usage_and_exit(),
        },
        None => DEFAULT_QUESTION.to_string(),
    };

    let settings = Settings::from_env()?;
    println!("> Preflight:");
    println!("  SQLCODER_MODEL_ID={}", settings.model.model_id);
    println!("  SQLCODER_MODEL_REVISION={}", settings.model.revision);
    println!("  SQLCODER_DEVICE={:?}", settings.model.device);
    println!("  SQLCODER_DTYPE={:?}", settings.model.dtype);
    println!("  SCHEMA_PATH={}", settings.schema_path.display());
    println!("  MAX_NEW_TOKENS={}", settings.max_new_tokens);
    println!("  MAX_QUESTION_CHARS={}", settings.max_question_chars);

    let schema = load_schema(&settings.schema_path)?;
    let tables = schema.table_names();
    if tables.is_empty() {
        eprintln!("  Warning: schema file contains no CREATE TABLE statements.");
    } else {
        println!("  Schema: {} tables ({})", tables.len(), tables.join(", "));
    }

    let model_settings = settings.model.clone();
    let files = tokio::task::spawn_blocking(move || resolve_model_files(&model_settings)).await??;
    println!("  Model config: {}", files.config.display());
    println!("  Tokenizer: {}", files.tokenizer.display());
    println!("  Weight files: {}", files.weights.len());

    if !load_model {
        println!("> Preflight OK (weights not loaded; pass --load-model to run a generation).");
        return Ok(());
    }

    let model_id = settings.model.model_id.clone();
    let (device, dtype) = (settings.model.device, settings.model.dtype);
    let model = tokio::task::spawn_blocking(move || {
        CandleLlama::from_files(&model_id, &files, device, dtype)
    })
    .await??;
    let generator: Arc<dyn TextGenerator> = Arc::new(model);

    let service = SqlService::new(
        generator,
        Arc::new(schema),
        GenerationOptions {
            max_new_tokens: settings.max_new_tokens,
            ..Default::default()
        },
        settings.max_question_chars,
    );
    println!("  Question: {}", question);
    let generated = service.generate_sql(&question).await?;
    println!("  SQL:\n{}", generated.sql);

    println!("> Preflight OK.");
    Ok(())
}
