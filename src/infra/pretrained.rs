// ============================================================
// Layer 6 — Pretrained Checkpoint Resolver
// ============================================================
// `--model-name` is either:
//   - a local directory with config.json, tokenizer.json and
//     (optionally) model.mpk, or
//   - a hub repository id ("owner/name"), downloaded into the
//     hub cache with hf-hub.
//
// Missing weights are not fatal: the model is initialised from
// config.json and a warning is logged.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::infra::checkpoint::{CONFIG_FILE, WEIGHTS_FILE};
use crate::infra::tokenizer_store::TOKENIZER_FILE;
use crate::ml::model::Seq2SeqConfig;

#[derive(Debug, Clone)]
pub struct PretrainedFiles {
    pub config:    PathBuf,
    pub tokenizer: PathBuf,
    pub weights:   Option<PathBuf>,
}

impl PretrainedFiles {
    pub fn load_config(&self) -> Result<Seq2SeqConfig> {
        let json = std::fs::read_to_string(&self.config)
            .with_context(|| format!("Cannot read '{}'", self.config.display()))?;
        let cfg: Seq2SeqConfig = serde_json::from_str(&json)
            .with_context(|| format!("'{}' is not a seq2seq model config", self.config.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Resolve `model_name` to local files, downloading when it is not a directory.
pub fn resolve(model_name: &str, token: Option<&str>) -> Result<PretrainedFiles> {
    let local = Path::new(model_name);
    if local.is_dir() {
        tracing::info!("Using local checkpoint '{}'", local.display());
        return from_dir(local);
    }
    download(model_name, token)
}

fn from_dir(dir: &Path) -> Result<PretrainedFiles> {
    let config    = dir.join(CONFIG_FILE);
    let tokenizer = dir.join(TOKENIZER_FILE);
    for required in [&config, &tokenizer] {
        if !required.is_file() {
            anyhow::bail!("Checkpoint '{}' has no '{}'", dir.display(), required.display());
        }
    }
    let weights = Some(dir.join(WEIGHTS_FILE)).filter(|p| p.is_file());
    Ok(PretrainedFiles { config, tokenizer, weights })
}

fn download(repo_id: &str, token: Option<&str>) -> Result<PretrainedFiles> {
    let (owner, name) = repo_id.split_once('/').unwrap_or(("", repo_id));
    if name.is_empty() || owner.contains('/') || name.contains('/') {
        anyhow::bail!("'{repo_id}' is neither a local directory nor a hub repository id");
    }

    tracing::info!("Downloading '{repo_id}' from the model hub");
    let api = hf_hub::api::sync::ApiBuilder::new()
        .with_token(token.map(str::to_string))
        .build()
        .context("Failed to initialise the hub client")?;
    let repo = api.model(repo_id.to_string());

    let config = repo
        .get(CONFIG_FILE)
        .with_context(|| format!("Cannot download {CONFIG_FILE} from '{repo_id}'"))?;
    let tokenizer = repo
        .get(TOKENIZER_FILE)
        .with_context(|| format!("Cannot download {TOKENIZER_FILE} from '{repo_id}'"))?;
    let weights = match repo.get(WEIGHTS_FILE) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!("No {WEIGHTS_FILE} in '{repo_id}' ({e})");
            None
        }
    };

    Ok(PretrainedFiles { config, tokenizer, weights })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_local_dir_without_weights() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{}").unwrap();
        fs::write(dir.path().join(TOKENIZER_FILE), "{}").unwrap();

        let files = resolve(dir.path().to_str().unwrap(), None).unwrap();
        assert!(files.weights.is_none());
        assert!(files.config.ends_with(CONFIG_FILE));
    }

    #[test]
    fn test_local_dir_missing_tokenizer_is_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{}").unwrap();
        assert!(resolve(dir.path().to_str().unwrap(), None).is_err());
    }

    #[test]
    fn test_rejects_non_repo_paths() {
        let err = resolve("/no/such/dir/anywhere", None).unwrap_err();
        assert!(err.to_string().contains("neither a local directory"));
    }

    #[test]
    fn test_load_config_validates() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"vocab_size": 8, "d_model": 6, "d_ff": 8, "num_heads": 4,
                "num_encoder_layers": 1, "num_decoder_layers": 1}"#,
        )
        .unwrap();
        fs::write(dir.path().join(TOKENIZER_FILE), "{}").unwrap();
        let files = resolve(dir.path().to_str().unwrap(), None).unwrap();
        assert!(files.load_config().is_err());
    }
}
