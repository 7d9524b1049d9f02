// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams between layers:
//   - ExampleSource   → where training examples come from
//   - TokenDecoder    → turns generated ids back into text
//   - MetricsCallback → scores generated text against labels
//
// The trainer only sees these traits, so the metric and the
// decoder can be swapped (or faked in tests) without touching
// the training loop.

use anyhow::Result;
use std::collections::BTreeMap;

use crate::domain::example::Seq2SeqExample;

// ─── ExampleSource ────────────────────────────────────────────────────────────
/// Any component that can produce a full set of examples.
///
/// Implementations:
///   - DiskDatasetLoader → reads a dataset directory from disk
pub trait ExampleSource {
    fn load_all(&self) -> Result<Vec<Seq2SeqExample>>;
}

// ─── TokenDecoder ─────────────────────────────────────────────────────────────
/// Decodes token id sequences into text, dropping special tokens.
pub trait TokenDecoder {
    fn decode_batch(&self, sequences: &[Vec<u32>]) -> Result<Vec<String>>;

    fn pad_token_id(&self) -> u32;
}

// ─── EvalPrediction ───────────────────────────────────────────────────────────
/// Generated ids and the reference labels for one evaluation pass.
/// Labels still carry the ignore index; predictions are padded
/// with the pad id.
#[derive(Debug, Clone, Default)]
pub struct EvalPrediction {
    pub predictions: Vec<Vec<i64>>,
    pub labels:      Vec<Vec<i64>>,
}

// ─── MetricsCallback ──────────────────────────────────────────────────────────
/// Computes named metrics for an evaluation pass.
/// Keys are reported by the trainer with an `eval_` prefix.
pub trait MetricsCallback {
    fn compute(&self, prediction: &EvalPrediction) -> Result<BTreeMap<String, f64>>;
}
