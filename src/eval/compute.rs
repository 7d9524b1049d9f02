// ============================================================
// compute_metrics — ROUGE over generated summaries
// ============================================================
// Called by the trainer after every generating evaluation:
//
//   1. decode predictions (special tokens skipped)
//   2. labels: -100 → pad id, then decode
//   3. ROUGE (stemmed), each score ×100 rounded to 4 decimals
//   4. gen_len = mean number of non-pad tokens per prediction

use anyhow::Result;
use std::collections::BTreeMap;

use crate::domain::example::IGNORE_INDEX;
use crate::domain::traits::{EvalPrediction, MetricsCallback, TokenDecoder};
use crate::eval::rouge::RougeScorer;

pub struct RougeMetrics<D: TokenDecoder> {
    decoder: D,
    scorer:  RougeScorer,
}

impl<D: TokenDecoder> RougeMetrics<D> {
    pub fn new(decoder: D) -> Self {
        Self { decoder, scorer: RougeScorer::new(true) }
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Negative ids can only come from label padding; map them to the pad id
/// so the tokenizer never sees them.
fn to_token_ids(row: &[i64], pad: u32) -> Vec<u32> {
    row.iter()
        .map(|&t| if t == IGNORE_INDEX || t < 0 { pad } else { t as u32 })
        .collect()
}

impl<D: TokenDecoder> MetricsCallback for RougeMetrics<D> {
    fn compute(&self, prediction: &EvalPrediction) -> Result<BTreeMap<String, f64>> {
        let pad = self.decoder.pad_token_id();

        let pred_ids: Vec<Vec<u32>>  = prediction.predictions.iter().map(|r| to_token_ids(r, pad)).collect();
        let label_ids: Vec<Vec<u32>> = prediction.labels.iter().map(|r| to_token_ids(r, pad)).collect();

        let decoded_preds  = self.decoder.decode_batch(&pred_ids)?;
        let decoded_labels = self.decoder.decode_batch(&label_ids)?;

        let scores = self.scorer.score_corpus(&decoded_labels, &decoded_preds);
        let mut result = BTreeMap::from([
            ("rouge1".to_string(),    round4(scores.rouge1 * 100.0)),
            ("rouge2".to_string(),    round4(scores.rouge2 * 100.0)),
            ("rougeL".to_string(),    round4(scores.rouge_l * 100.0)),
            ("rougeLsum".to_string(), round4(scores.rouge_lsum * 100.0)),
        ]);

        let gen_len = if pred_ids.is_empty() {
            0.0
        } else {
            let total: usize = pred_ids
                .iter()
                .map(|row| row.iter().filter(|&&t| t != pad).count())
                .sum();
            total as f64 / pred_ids.len() as f64
        };
        result.insert("gen_len".to_string(), gen_len);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Maps id n to the word "wn"; 0 is pad, 1 is eos, both skipped.
    struct FakeDecoder;

    impl TokenDecoder for FakeDecoder {
        fn decode_batch(&self, sequences: &[Vec<u32>]) -> Result<Vec<String>> {
            Ok(sequences
                .iter()
                .map(|s| {
                    s.iter()
                        .filter(|&&t| t > 1)
                        .map(|t| format!("w{t}"))
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect())
        }

        fn pad_token_id(&self) -> u32 { 0 }
    }

    #[test]
    fn test_perfect_predictions() {
        let metrics = RougeMetrics::new(FakeDecoder);
        let pred = EvalPrediction {
            predictions: vec![vec![0, 5, 6, 7, 1], vec![0, 8, 1, 0, 0]],
            labels:      vec![vec![5, 6, 7, 1], vec![8, 1, IGNORE_INDEX, IGNORE_INDEX]],
        };
        let m = metrics.compute(&pred).unwrap();
        assert_eq!(m["rouge1"], 100.0);
        assert_eq!(m["rougeLsum"], 100.0);
        // non-pad tokens: 4 and 2 → mean 3
        assert_eq!(m["gen_len"], 3.0);
    }

    #[test]
    fn test_scores_are_percentages_rounded() {
        let metrics = RougeMetrics::new(FakeDecoder);
        let pred = EvalPrediction {
            predictions: vec![vec![0, 5, 9, 9, 1]],
            labels:      vec![vec![5, 6, 7, 1]],
        };
        let m = metrics.compute(&pred).unwrap();
        // P = 1/3, R = 1/3 → F = 33.3333
        assert_eq!(m["rouge1"], 33.3333);
        assert_eq!(m["rouge2"], 0.0);
    }

    #[test]
    fn test_ignore_index_maps_to_pad() {
        assert_eq!(to_token_ids(&[4, IGNORE_INDEX, 2], 9), vec![4, 9, 2]);
    }
}
