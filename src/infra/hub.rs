//! Resolution of model files from a local directory or the Hugging Face hub.

use crate::domain::generation::{ModelLoadError, ModelSettings};
use hf_hub::api::sync::{ApiBuilder, ApiRepo};
use hf_hub::{Repo, RepoType};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";
const WEIGHT_INDEX_FILE: &str = "model.safetensors.index.json";
const SINGLE_WEIGHT_FILE: &str = "model.safetensors";

/// Paths of everything needed to build the tokenizer and the model.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub tokenizer_config: Option<PathBuf>,
    pub weights: Vec<PathBuf>,
}

/// Resolves model files, downloading them into the hub cache when the identifier is not a
/// local directory.
pub fn resolve_model_files(settings: &ModelSettings) -> Result<ModelFiles, ModelLoadError> {
    let local = Path::new(&settings.model_id);
    if local.is_dir() {
        tracing::info!(path = %local.display(), "using local model directory");
        return resolve_local(local);
    }

    tracing::info!(
        model_id = %settings.model_id,
        revision = %settings.revision,
        "resolving model from hub"
    );

    let hub_err = |source: hf_hub::api::sync::ApiError| ModelLoadError::Hub {
        model_id: settings.model_id.clone(),
        source,
    };

    let mut builder = ApiBuilder::new().with_progress(false);
    if let Some(token) = &settings.hf_token {
        builder = builder.with_token(Some(token.clone()));
    }
    if let Some(dir) = &settings.cache_dir {
        builder = builder.with_cache_dir(dir.clone());
    }
    let api = builder.build().map_err(hub_err)?;
    let repo = api.repo(Repo::with_revision(
        settings.model_id.clone(),
        RepoType::Model,
        settings.revision.clone(),
    ));

    let config = repo.get(CONFIG_FILE).map_err(hub_err)?;
    let tokenizer = repo.get(TOKENIZER_FILE).map_err(hub_err)?;
    let tokenizer_config = repo.get(TOKENIZER_CONFIG_FILE).ok();
    let weights = hub_weights(&repo).map_err(|e| match e {
        WeightsError::Hub(source) => hub_err(source),
        WeightsError::Load(e) => e,
    })?;

    tracing::info!(files = weights.len(), "model weights available");

    Ok(ModelFiles {
        config,
        tokenizer,
        tokenizer_config,
        weights,
    })
}

enum WeightsError {
    Hub(hf_hub::api::sync::ApiError),
    Load(ModelLoadError),
}

fn hub_weights(repo: &ApiRepo) -> Result<Vec<PathBuf>, WeightsError> {
    match repo.get(WEIGHT_INDEX_FILE) {
        Ok(index_path) => {
            let names = read_weight_index(&index_path).map_err(WeightsError::Load)?;
            names
                .iter()
                .map(|name| repo.get(name).map_err(WeightsError::Hub))
                .collect()
        }
        Err(_) => {
            tracing::debug!("no weight index in repo, falling back to a single safetensors file");
            let single = repo.get(SINGLE_WEIGHT_FILE).map_err(WeightsError::Hub)?;
            Ok(vec![single])
        }
    }
}

fn resolve_local(dir: &Path) -> Result<ModelFiles, ModelLoadError> {
    let tokenizer_config = dir.join(TOKENIZER_CONFIG_FILE);
    let index = dir.join(WEIGHT_INDEX_FILE);

    let weights = if index.is_file() {
        read_weight_index(&index)?
            .into_iter()
            .map(|name| dir.join(name))
            .collect()
    } else {
        vec![dir.join(SINGLE_WEIGHT_FILE)]
    };

    let config = dir.join(CONFIG_FILE);
    let tokenizer = dir.join(TOKENIZER_FILE);

    for required in [&config, &tokenizer].into_iter().chain(weights.iter()) {
        if !required.is_file() {
            return Err(ModelLoadError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("missing model file {}", required.display()),
            )));
        }
    }

    Ok(ModelFiles {
        config,
        tokenizer,
        tokenizer_config: tokenizer_config.is_file().then_some(tokenizer_config),
        weights,
    })
}

fn read_weight_index(path: &Path) -> Result<Vec<String>, ModelLoadError> {
    let file = std::fs::File::open(path)?;
    let json: JsonValue = serde_json::from_reader(file)?;
    weight_files_from_index(&json)
        .ok_or_else(|| ModelLoadError::WeightMap(path.display().to_string()))
}

/// Distinct shard names referenced by a safetensors index, sorted.
pub fn weight_files_from_index(index: &JsonValue) -> Option<Vec<String>> {
    let weight_map = index.get("weight_map")?.as_object()?;
    let files: BTreeSet<&str> = weight_map.values().filter_map(|v| v.as_str()).collect();
    if files.is_empty() {
        return None;
    }
    Some(files.into_iter().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_weight_files_deduplicated_and_sorted() {
        let index = json!({
            "metadata": { "total_size": 1 },
            "weight_map": {
                "lm_head.weight": "model-00002-of-00002.safetensors",
                "model.embed_tokens.weight": "model-00001-of-00002.safetensors",
                "model.norm.weight": "model-00002-of-00002.safetensors"
            }
        });
        assert_eq!(
            weight_files_from_index(&index).unwrap(),
            vec![
                "model-00001-of-00002.safetensors",
                "model-00002-of-00002.safetensors"
            ]
        );
    }

    #[test]
    fn test_weight_map_missing() {
        assert!(weight_files_from_index(&json!({ "metadata": {} })).is_none());
        assert!(weight_files_from_index(&json!({ "weight_map": [] })).is_none());
        assert!(weight_files_from_index(&json!({ "weight_map": {} })).is_none());
    }

    #[test]
    fn test_local_directory_without_files_is_an_error() {
        let dir = std::env::temp_dir().join(format!("sqlcoder-empty-model-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let err = resolve_local(&dir).unwrap_err();
        assert!(matches!(err, ModelLoadError::Io(_)));
        std::fs::remove_dir_all(dir).ok();
    }
}
