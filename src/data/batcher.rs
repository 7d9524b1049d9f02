// ============================================================
// Layer 4 — Seq2Seq Batcher (dynamic padding collator)
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<Seq2SeqExample>
// into tensors, padding each batch only to its own longest row.
//
// For a batch of N examples:
//   input_ids          [N, S]  padded with pad_token_id
//   attention_mask     [N, S]  padded with 0
//   labels             [N, T]  padded with IGNORE_INDEX (-100)
//   decoder_input_ids  [N, T]  labels shifted right by one:
//
//     labels:            [ 42  17   1 -100]
//     decoder_input_ids: [  0  42  17    1]
//                          ^ decoder_start_token_id
//
//   Any -100 that slides into decoder_input_ids becomes the
//   pad id, since it has to be a real embedding index.
//
// The padding itself is done on plain Vecs (collate) so it can
// be tested without a backend; the Batcher only builds tensors.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::example::{Seq2SeqExample, IGNORE_INDEX};

// ─── PaddedBatch ──────────────────────────────────────────────────────────────
/// Row-major padded batch on the host.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedBatch {
    pub batch_size:        usize,
    pub source_len:        usize,
    pub target_len:        usize,
    pub input_ids:         Vec<i64>,
    pub attention_mask:    Vec<i64>,
    pub labels:            Vec<i64>,
    pub decoder_input_ids: Vec<i64>,
}

impl PaddedBatch {
    /// Labels of row `i`, still carrying the ignore index.
    pub fn label_row(&self, i: usize) -> &[i64] {
        &self.labels[i * self.target_len..(i + 1) * self.target_len]
    }
}

/// Pad a list of examples into one rectangular batch.
pub fn collate(items: &[Seq2SeqExample], pad_token_id: u32, decoder_start_token_id: u32) -> PaddedBatch {
    let batch_size = items.len();
    let source_len = items.iter().map(|e| e.input_ids.len()).max().unwrap_or(0);
    let target_len = items.iter().map(|e| e.labels.len()).max().unwrap_or(0);
    let pad        = pad_token_id as i64;

    let mut input_ids         = Vec::with_capacity(batch_size * source_len);
    let mut attention_mask    = Vec::with_capacity(batch_size * source_len);
    let mut labels            = Vec::with_capacity(batch_size * target_len);
    let mut decoder_input_ids = Vec::with_capacity(batch_size * target_len);

    for ex in items {
        let fill = source_len - ex.input_ids.len();
        input_ids.extend(ex.input_ids.iter().map(|&t| t as i64));
        input_ids.extend(std::iter::repeat(pad).take(fill));
        attention_mask.extend(ex.mask().iter().map(|&m| m as i64));
        attention_mask.extend(std::iter::repeat(0).take(fill));

        let start = labels.len();
        labels.extend_from_slice(&ex.labels);
        labels.extend(std::iter::repeat(IGNORE_INDEX).take(target_len - ex.labels.len()));

        decoder_input_ids.push(decoder_start_token_id as i64);
        decoder_input_ids.extend(
            labels[start..start + target_len - 1]
                .iter()
                .map(|&l| if l == IGNORE_INDEX { pad } else { l }),
        );
    }

    PaddedBatch {
        batch_size,
        source_len,
        target_len,
        input_ids,
        attention_mask,
        labels,
        decoder_input_ids,
    }
}

// ─── Seq2SeqBatch ─────────────────────────────────────────────────────────────
/// A batch ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct Seq2SeqBatch<B: Backend> {
    /// [batch, source_len]
    pub input_ids: Tensor<B, 2, Int>,

    /// [batch, source_len] — 1 = real token, 0 = padding
    pub attention_mask: Tensor<B, 2, Int>,

    /// [batch, target_len] — IGNORE_INDEX on padding
    pub labels: Tensor<B, 2, Int>,

    /// [batch, target_len]
    pub decoder_input_ids: Tensor<B, 2, Int>,

    /// Host copy of the labels, one row per example, for metrics.
    pub label_rows: Vec<Vec<i64>>,
}

// ─── Seq2SeqBatcher ───────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct Seq2SeqBatcher<B: Backend> {
    device:                 B::Device,
    pad_token_id:           u32,
    decoder_start_token_id: u32,
}

impl<B: Backend> Seq2SeqBatcher<B> {
    pub fn new(device: B::Device, pad_token_id: u32, decoder_start_token_id: u32) -> Self {
        Self { device, pad_token_id, decoder_start_token_id }
    }
}

impl<B: Backend> Batcher<Seq2SeqExample, Seq2SeqBatch<B>> for Seq2SeqBatcher<B> {
    fn batch(&self, items: Vec<Seq2SeqExample>) -> Seq2SeqBatch<B> {
        let padded = collate(&items, self.pad_token_id, self.decoder_start_token_id);
        let [n, s, t] = [padded.batch_size, padded.source_len, padded.target_len];

        let label_rows = (0..n).map(|i| padded.label_row(i).to_vec()).collect();
        let int_tensor = |values: Vec<i64>, cols: usize| {
            Tensor::<B, 2, Int>::from_data(TensorData::new(values, [n, cols]), &self.device)
        };

        Seq2SeqBatch {
            input_ids:         int_tensor(padded.input_ids, s),
            attention_mask:    int_tensor(padded.attention_mask, s),
            labels:            int_tensor(padded.labels, t),
            decoder_input_ids: int_tensor(padded.decoder_input_ids, t),
            label_rows,
        }
    }
}
