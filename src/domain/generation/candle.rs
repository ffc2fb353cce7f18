//! Llama-family causal LM (sqlcoder and friends) running on candle.

use super::{GenerationError, GenerationOptions, ModelLoadError, TextGenerator};
use crate::infra::hub::{resolve_model_files, ModelFiles};
use async_trait::async_trait;
use candle_core::utils::{cuda_is_available, metal_is_available};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::llama::{Cache, Config, Llama, LlamaConfig, LlamaEosToks};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tokenizers::{PaddingParams, Tokenizer};

const SAMPLING_SEED: u64 = 299_792_458;
const SAMPLING_TEMPERATURE: f64 = 0.7;

/// Where and how to load the model.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    /// Hub repository id, or a local directory holding the same files.
    pub model_id: String,
    pub revision: String,
    pub cache_dir: Option<PathBuf>,
    pub hf_token: Option<String>,
    pub device: DeviceChoice,
    pub dtype: DTypeChoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceChoice {
    /// CUDA, then Metal, then CPU.
    Auto,
    Cpu,
}

impl FromStr for DeviceChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(DeviceChoice::Auto),
            "cpu" => Ok(DeviceChoice::Cpu),
            other => Err(format!("unknown device '{}' (expected auto or cpu)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DTypeChoice {
    /// The checkpoint's `torch_dtype` on accelerators, f32 on CPU.
    Auto,
    F32,
    F16,
    BF16,
}

impl FromStr for DTypeChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(DTypeChoice::Auto),
            "f32" | "float32" => Ok(DTypeChoice::F32),
            "f16" | "float16" => Ok(DTypeChoice::F16),
            "bf16" | "bfloat16" => Ok(DTypeChoice::BF16),
            other => Err(format!(
                "unknown dtype '{}' (expected auto, f32, f16 or bf16)",
                other
            )),
        }
    }
}

#[derive(Deserialize)]
struct DTypeHint {
    torch_dtype: Option<String>,
}

pub fn select_device(choice: DeviceChoice) -> candle_core::Result<Device> {
    match choice {
        DeviceChoice::Cpu => Ok(Device::Cpu),
        DeviceChoice::Auto if cuda_is_available() => Device::new_cuda(0),
        DeviceChoice::Auto if metal_is_available() => Device::new_metal(0),
        DeviceChoice::Auto => {
            tracing::warn!("no accelerator available, running on CPU");
            Ok(Device::Cpu)
        }
    }
}

pub fn select_dtype(choice: DTypeChoice, device: &Device, torch_dtype: Option<&str>) -> DType {
    match choice {
        DTypeChoice::F32 => DType::F32,
        DTypeChoice::F16 => DType::F16,
        DTypeChoice::BF16 => DType::BF16,
        DTypeChoice::Auto if device.is_cpu() => DType::F32,
        DTypeChoice::Auto => match torch_dtype {
            Some("bfloat16") => DType::BF16,
            Some("float32") => DType::F32,
            _ => DType::F16,
        },
    }
}

struct LlamaInner {
    model_id: String,
    model: Llama,
    config: Config,
    tokenizer: Tokenizer,
    device: Device,
    dtype: DType,
    eos_tokens: Vec<u32>,
}

/// Shared handle over loaded weights and tokenizer.
///
/// Every call builds its own KV cache, so the weights are only ever read.
#[derive(Clone)]
pub struct CandleLlama {
    inner: Arc<LlamaInner>,
}

impl CandleLlama {
    /// Resolves the model files and loads tokenizer and weights. Blocking; may download.
    pub fn load(settings: &ModelSettings) -> Result<Self, ModelLoadError> {
        let start = Instant::now();
        let files = resolve_model_files(settings)?;
        tracing::info!(elapsed = ?start.elapsed(), "model files resolved");

        Self::from_files(&settings.model_id, &files, settings.device, settings.dtype)
    }

    pub fn from_files(
        model_id: &str,
        files: &ModelFiles,
        device: DeviceChoice,
        dtype: DTypeChoice,
    ) -> Result<Self, ModelLoadError> {
        let start = Instant::now();

        let raw_config = std::fs::read(&files.config)?;
        let llama_config: LlamaConfig = serde_json::from_slice(&raw_config)?;
        let hint: DTypeHint = serde_json::from_slice(&raw_config)?;

        let tokenizer_config: Option<JsonValue> = match &files.tokenizer_config {
            Some(path) => Some(serde_json::from_slice(&std::fs::read(path)?)?),
            None => None,
        };

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| ModelLoadError::Tokenizer(e.to_string()))?;

        let config = llama_config.into_config(false);
        let eos_tokens =
            resolve_eos_tokens(model_id, &config, tokenizer_config.as_ref(), &tokenizer)?;
        ensure_padding(&mut tokenizer, tokenizer_config.as_ref(), eos_tokens[0]);

        let device = select_device(device)?;
        let dtype = select_dtype(dtype, &device, hint.torch_dtype.as_deref());
        tracing::info!(device = ?device, dtype = ?dtype, "loading model weights");

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&files.weights, dtype, &device)? };
        let model = Llama::load(vb, &config)?;

        tracing::info!(model_id, elapsed = ?start.elapsed(), "model loaded");

        Ok(Self {
            inner: Arc::new(LlamaInner {
                model_id: model_id.to_string(),
                model,
                config,
                tokenizer,
                device,
                dtype,
                eos_tokens,
            }),
        })
    }
}

/// EOS ids from `config.json`, else the tokenizer config's `eos_token`, else `</s>`.
fn resolve_eos_tokens(
    model_id: &str,
    config: &Config,
    tokenizer_config: Option<&JsonValue>,
    tokenizer: &Tokenizer,
) -> Result<Vec<u32>, ModelLoadError> {
    match &config.eos_token_id {
        Some(LlamaEosToks::Single(id)) => return Ok(vec![*id]),
        Some(LlamaEosToks::Multiple(ids)) if !ids.is_empty() => return Ok(ids.clone()),
        _ => {}
    }

    special_token(tokenizer_config, "eos_token")
        .and_then(|t| tokenizer.token_to_id(&t))
        .or_else(|| tokenizer.token_to_id("</s>"))
        .map(|id| vec![id])
        .ok_or_else(|| ModelLoadError::MissingEos(model_id.to_string()))
}

/// Reads a special token that may be a bare string or an added-token object.
fn special_token(tokenizer_config: Option<&JsonValue>, key: &str) -> Option<String> {
    match tokenizer_config?.get(key)? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Object(obj) => obj.get("content")?.as_str().map(str::to_string),
        _ => None,
    }
}

/// Falls back to the EOS token for padding when neither the tokenizer nor its config define one.
fn ensure_padding(tokenizer: &mut Tokenizer, tokenizer_config: Option<&JsonValue>, eos_id: u32) {
    if tokenizer.get_padding().is_some() {
        return;
    }

    let configured = special_token(tokenizer_config, "pad_token")
        .and_then(|t| tokenizer.token_to_id(&t).map(|id| (id, t)));

    let (pad_id, pad_token) = match configured {
        Some(pad) => pad,
        None => {
            let token = tokenizer.id_to_token(eos_id).unwrap_or_default();
            tracing::debug!(pad_token = %token, "no pad token defined, using eos");
            (eos_id, token)
        }
    };

    tokenizer.with_padding(Some(PaddingParams {
        pad_id,
        pad_token,
        ..Default::default()
    }));
}

impl LlamaInner {
    fn generate_blocking(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| GenerationError::Tokenize(e.to_string()))?;
        let mut tokens = encoding.get_ids().to_vec();
        let prompt_tokens = tokens.len();

        let context = self.config.max_position_embeddings;
        if prompt_tokens + options.max_new_tokens > context {
            return Err(GenerationError::PromptTooLong {
                prompt_tokens,
                max_new_tokens: options.max_new_tokens,
                context,
            });
        }

        let sampling = if options.do_sample {
            Sampling::All {
                temperature: SAMPLING_TEMPERATURE,
            }
        } else {
            Sampling::ArgMax
        };
        let mut logits_processor = LogitsProcessor::from_sampling(SAMPLING_SEED, sampling);
        let mut cache = Cache::new(true, self.dtype, &self.config, &self.device)?;

        let mut generated: Vec<u32> = Vec::with_capacity(options.max_new_tokens);
        let mut index_pos = 0;
        for step in 0..options.max_new_tokens {
            // First step feeds the whole prompt, then one token at a time against the KV cache.
            let context_size = if step > 0 { 1 } else { tokens.len() };
            let ctxt = &tokens[tokens.len().saturating_sub(context_size)..];
            let input = Tensor::new(ctxt, &self.device)?.unsqueeze(0)?;
            let logits = self.model.forward(&input, index_pos, &mut cache)?;
            let logits = logits.squeeze(0)?;
            index_pos += ctxt.len();

            let next = logits_processor.sample(&logits)?;
            if self.eos_tokens.contains(&next) {
                break;
            }
            tokens.push(next);
            generated.push(next);
        }

        tracing::debug!(
            prompt_tokens,
            new_tokens = generated.len(),
            "generation finished"
        );

        // `tokens` holds the prompt followed by the continuation.
        let output = if options.return_full_text {
            &tokens[..]
        } else {
            &generated[..]
        };
        self.tokenizer
            .decode(output, true)
            .map_err(|e| GenerationError::Decode(e.to_string()))
    }
}

#[async_trait]
impl TextGenerator for CandleLlama {
    fn model_id(&self) -> &str {
        &self.inner.model_id
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        let inner = Arc::clone(&self.inner);
        let prompt = prompt.to_string();
        let options = options.clone();
        tokio::task::spawn_blocking(move || inner.generate_blocking(&prompt, &options))
            .await
            .map_err(|e| GenerationError::Worker(e.to_string()))?
    }
}
