// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder,
// and keeps the checkpoint directory under its size limit.
//
// A saved model directory (final model or checkpoint) holds:
//   model.mpk            ← weights (named MessagePack)
//   config.json          ← architecture, to rebuild the model
//   tokenizer.json       ← so the directory is self-contained
//   training_args.json   ← how it was trained
//
// Checkpoints additionally hold trainer_state.json and live at:
//   <output_dir>/
//     checkpoint-500/
//     checkpoint-1000/
//     ...
//
// Rotation deletes the oldest checkpoints beyond the limit but
// never the best one (see checkpoints_to_delete).
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::infra::tokenizer_store::TokenizerStore;
use crate::ml::model::{Seq2SeqConfig, Seq2SeqModel};
use crate::ml::state::TrainerState;
use crate::ml::training_args::TrainingArguments;

pub const WEIGHTS_FILE:       &str = "model.mpk";
pub const CONFIG_FILE:        &str = "config.json";
pub const TRAINING_ARGS_FILE: &str = "training_args.json";
pub const TRAINER_STATE_FILE: &str = "trainer_state.json";
pub const CHECKPOINT_PREFIX:  &str = "checkpoint-";

/// Recorder path for a weights file: the recorder appends `.mpk` itself.
fn record_stem(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_suffix(".mpk") {
        Some(stem) => PathBuf::from(stem),
        None => path.to_path_buf(),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Cannot write '{}'", path.display()))
}

/// Write weights, config, tokenizer and training args into `dir`.
pub fn save_pretrained<B: Backend>(
    dir:       &Path,
    model:     &Seq2SeqModel<B>,
    config:    &Seq2SeqConfig,
    tokenizer: &TokenizerStore,
    args:      &TrainingArguments,
) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Cannot create '{}'", dir.display()))?;

    let weights = dir.join(WEIGHTS_FILE);
    CompactRecorder::new()
        .record(model.clone().into_record(), record_stem(&weights))
        .with_context(|| format!("Failed to save weights to '{}'", weights.display()))?;

    write_json(&dir.join(CONFIG_FILE), config)?;
    write_json(&dir.join(TRAINING_ARGS_FILE), args)?;
    tokenizer.save_pretrained(dir)?;

    tracing::debug!("Saved model files to '{}'", dir.display());
    Ok(())
}

/// Restore weights from a `model.mpk` file into `model`.
/// The architecture must match the one the weights were saved from.
pub fn load_weights<B: Backend>(
    model:   Seq2SeqModel<B>,
    weights: &Path,
    device:  &B::Device,
) -> Result<Seq2SeqModel<B>> {
    let record = CompactRecorder::new()
        .load(record_stem(weights), device)
        .with_context(|| format!("Cannot load weights from '{}'", weights.display()))?;
    Ok(model.load_record(record))
}

/// Which checkpoints to delete so at most `limit` remain.
///
/// `sorted` is oldest first. A best checkpoint older than the last two is
/// moved just before the newest one so that both survive. With a limit of
/// 1 and a best that is not the newest, two are kept.
pub fn checkpoints_to_delete(mut sorted: Vec<PathBuf>, limit: usize, best: Option<&Path>) -> Vec<PathBuf> {
    let mut limit = limit;
    if let Some(best) = best {
        if let Some(idx) = sorted.iter().position(|p| p == best) {
            if idx + 2 < sorted.len() {
                let item = sorted.remove(idx);
                let at   = sorted.len() - 1;
                sorted.insert(at, item);
            }
            if limit == 1 && sorted.last().map(PathBuf::as_path) != Some(best) {
                limit = 2;
            }
        }
    }
    let excess = sorted.len().saturating_sub(limit);
    sorted.into_iter().take(excess).collect()
}

/// Manages `checkpoint-<step>` directories under the output directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save a full checkpoint for the current global step.
    pub fn save_checkpoint<B: Backend>(
        &self,
        model:     &Seq2SeqModel<B>,
        config:    &Seq2SeqConfig,
        tokenizer: &TokenizerStore,
        args:      &TrainingArguments,
        state:     &TrainerState,
    ) -> Result<PathBuf> {
        let path = self.dir.join(format!("{CHECKPOINT_PREFIX}{}", state.global_step));
        save_pretrained(&path, model, config, tokenizer, args)?;
        write_json(&path.join(TRAINER_STATE_FILE), state)?;
        tracing::info!("Saved checkpoint '{}'", path.display());
        Ok(path)
    }

    /// Checkpoint directories, oldest (lowest step) first.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let mut found: Vec<(usize, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot read '{}'", self.dir.display()))?
        {
            let path = entry?.path();
            let step = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix(CHECKPOINT_PREFIX))
                .and_then(|s| s.parse::<usize>().ok());
            if let (Some(step), true) = (step, path.is_dir()) {
                found.push((step, path));
            }
        }
        found.sort_by_key(|(step, _)| *step);
        Ok(found.into_iter().map(|(_, p)| p).collect())
    }

    /// Delete old checkpoints beyond `limit`, keeping `best`.
    pub fn rotate(&self, limit: Option<usize>, best: Option<&Path>) -> Result<Vec<PathBuf>> {
        let Some(limit) = limit else { return Ok(Vec::new()) };
        let doomed = checkpoints_to_delete(self.list()?, limit, best);
        for path in &doomed {
            tracing::info!("Deleting older checkpoint '{}' due to save_total_limit", path.display());
            fs::remove_dir_all(path)
                .with_context(|| format!("Cannot delete '{}'", path.display()))?;
        }
        Ok(doomed)
    }
}
