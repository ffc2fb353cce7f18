//! Text generation behind a single async trait.
//!
//! The HTTP layer only ever sees [`TextGenerator`]; the candle-backed Llama implementation
//! lives in [`candle`] and tests plug in stubs.

use async_trait::async_trait;
use thiserror::Error;

pub mod candle;

pub use self::candle::{CandleLlama, DTypeChoice, DeviceChoice, ModelSettings};

/// Default cap on newly generated tokens.
pub const DEFAULT_MAX_NEW_TOKENS: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub max_new_tokens: usize,
    /// `false` means greedy decoding.
    pub do_sample: bool,
    /// Prepend the prompt to the returned text.
    pub return_full_text: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            do_sample: false,
            return_full_text: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to tokenize prompt: {0}")]
    Tokenize(String),

    #[error("failed to decode generated tokens: {0}")]
    Decode(String),

    #[error("prompt has {prompt_tokens} tokens; with {max_new_tokens} new tokens it exceeds the model context of {context}")]
    PromptTooLong {
        prompt_tokens: usize,
        max_new_tokens: usize,
        context: usize,
    },

    #[error("model forward pass failed: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("generation worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("failed to resolve model files for {model_id}: {source}")]
    Hub {
        model_id: String,
        #[source]
        source: hf_hub::api::sync::ApiError,
    },

    #[error("io error while loading model: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid model json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to load tokenizer: {0}")]
    Tokenizer(String),

    #[error("weight map in {0} is missing or malformed")]
    WeightMap(String),

    #[error("no end-of-sequence token defined for {0}")]
    MissingEos(String),

    #[error("failed to initialize model: {0}")]
    Candle(#[from] candle_core::Error),
}

/// A loaded model able to continue a prompt.
///
/// Implementations are shared across concurrent requests without extra locking.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Identifier of the underlying model (hub id or local path).
    fn model_id(&self) -> &str;

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError>;
}
