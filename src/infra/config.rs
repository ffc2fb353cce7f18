//! Centralized configuration (environment variables + defaults).
//!
//! Every setting has a default so the service starts without any environment. Values that are
//! present but unparsable are errors rather than silently replaced.

use crate::app::sql_service::DEFAULT_MAX_QUESTION_CHARS;
use crate::domain::generation::{DTypeChoice, DeviceChoice, ModelSettings, DEFAULT_MAX_NEW_TOKENS};
use anyhow::Context;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_MODEL_ID: &str = "defog/sqlcoder-7b-2";
pub const DEFAULT_MODEL_REVISION: &str = "main";
pub const DEFAULT_SCHEMA_PATH: &str = "schema/pagila_schema.sql";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

#[derive(Debug, Clone)]
pub struct Settings {
    pub model: ModelSettings,
    pub schema_path: PathBuf,
    pub bind_addr: String,
    pub max_new_tokens: usize,
    pub max_question_chars: usize,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            model: ModelSettings {
                model_id: string_or("SQLCODER_MODEL_ID", DEFAULT_MODEL_ID),
                revision: string_or("SQLCODER_MODEL_REVISION", DEFAULT_MODEL_REVISION),
                cache_dir: optional("SQLCODER_CACHE_DIR").map(PathBuf::from),
                hf_token: optional("HF_TOKEN"),
                device: parse_or("SQLCODER_DEVICE", DeviceChoice::Auto)?,
                dtype: parse_or("SQLCODER_DTYPE", DTypeChoice::Auto)?,
            },
            schema_path: PathBuf::from(string_or("SCHEMA_PATH", DEFAULT_SCHEMA_PATH)),
            bind_addr: string_or("BIND_ADDR", DEFAULT_BIND_ADDR),
            max_new_tokens: positive_or("MAX_NEW_TOKENS", DEFAULT_MAX_NEW_TOKENS)?,
            max_question_chars: positive_or("MAX_QUESTION_CHARS", DEFAULT_MAX_QUESTION_CHARS)?,
        })
    }
}

/// Unset and empty are treated the same.
fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn string_or(key: &str, default: &str) -> String {
    optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} is invalid: {}", key, e)),
        None => Ok(default),
    }
}

fn positive_or(key: &str, default: usize) -> anyhow::Result<usize> {
    let value = match optional(key) {
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .with_context(|| format!("{} must be a positive integer, got '{}'", key, raw))?,
        None => default,
    };
    anyhow::ensure!(value > 0, "{} must be greater than zero", key);
    Ok(value)
}
