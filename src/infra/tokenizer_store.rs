// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Loads the pretrained checkpoint's tokenizer.json and writes it
// back out next to saved weights, so a checkpoint directory is
// self-contained.
//
// Training data arrives pre-tokenised; the tokenizer is only
// needed to decode generated ids for the metrics and to ship
// alongside the fine-tuned model.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

use crate::domain::traits::TokenDecoder;

pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// A tokenizer plus the pad id the model was configured with.
#[derive(Clone)]
pub struct TokenizerStore {
    tokenizer:    Tokenizer,
    pad_token_id: u32,
}

impl TokenizerStore {
    pub fn new(tokenizer: Tokenizer, pad_token_id: u32) -> Self {
        Self { tokenizer, pad_token_id }
    }

    pub fn load(path: &Path, pad_token_id: u32) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))?;
        tracing::info!(
            "Tokenizer loaded from '{}' ({} tokens)",
            path.display(),
            tokenizer.get_vocab_size(true)
        );
        Ok(Self::new(tokenizer, pad_token_id))
    }

    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    /// Write tokenizer.json into `dir`, creating it if needed.
    pub fn save_pretrained(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;
        let path = dir.join(TOKENIZER_FILE);
        self.tokenizer
            .save(&path, true)
            .map_err(|e| anyhow::anyhow!("Cannot write tokenizer to '{}': {e}", path.display()))?;
        tracing::debug!("Saved tokenizer to '{}'", path.display());
        Ok(path)
    }
}

impl TokenDecoder for TokenizerStore {
    fn decode_batch(&self, sequences: &[Vec<u32>]) -> Result<Vec<String>> {
        let refs: Vec<&[u32]> = sequences.iter().map(Vec::as_slice).collect();
        self.tokenizer
            .decode_batch(&refs, true)
            .map_err(|e| anyhow::anyhow!("Decode: {e}"))
    }

    fn pad_token_id(&self) -> u32 {
        self.pad_token_id
    }
}

/// Small word-level tokenizer used by tests across the crate.
#[cfg(test)]
pub(crate) fn test_tokenizer_json() -> String {
    let mut vocab = serde_json::json!({ "<pad>": 0, "</s>": 1, "<unk>": 2 });
    for id in 3..16 {
        vocab[format!("w{id}")] = serde_json::json!(id);
    }
    serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [
            {"id": 0, "content": "<pad>", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
            {"id": 1, "content": "</s>",  "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
            {"id": 2, "content": "<unk>", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
        ],
        "normalizer": null,
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": { "type": "WordLevel", "vocab": vocab, "unk_token": "<unk>" }
    })
    .to_string()
}
