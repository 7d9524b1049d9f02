// ============================================================
// Layer 4 — Seq2Seq Dataset
// ============================================================
// In-memory examples behind Burn's Dataset trait, so the
// DataLoader can shuffle and batch them.
//
// check_fits runs once before training: every token id must be
// inside the model's vocabulary and every sequence must fit its
// position table.

use burn::data::dataset::Dataset;
use std::fmt;

use crate::domain::example::Seq2SeqExample;

pub struct Seq2SeqDataset {
    examples: Vec<Seq2SeqExample>,
}

impl Seq2SeqDataset {
    pub fn new(examples: Vec<Seq2SeqExample>) -> Self { Self { examples } }

    pub fn example_count(&self) -> usize { self.examples.len() }

    /// Column names present in the dataset.
    pub fn features(&self) -> Vec<&'static str> {
        let mut features = vec!["input_ids"];
        if self.examples.iter().any(|e| e.attention_mask.is_some()) {
            features.push("attention_mask");
        }
        features.push("labels");
        features
    }

    /// Reject ids the model cannot embed and sequences longer than
    /// its position table, before a tensor op panics on them.
    pub fn check_fits(&self, vocab_size: usize, max_positions: usize) -> anyhow::Result<()> {
        for (idx, ex) in self.examples.iter().enumerate() {
            if let Some(&id) = ex.input_ids.iter().find(|&&id| id as usize >= vocab_size) {
                anyhow::bail!("example {idx}: input id {id} is outside the vocabulary ({vocab_size})");
            }
            if let Some(&id) = ex.labels.iter().find(|&&l| l >= 0 && l as usize >= vocab_size) {
                anyhow::bail!("example {idx}: label id {id} is outside the vocabulary ({vocab_size})");
            }
            if ex.input_ids.len() > max_positions {
                anyhow::bail!(
                    "example {idx}: {} input tokens exceed max_position_embeddings ({max_positions})",
                    ex.input_ids.len()
                );
            }
            // decoder input is the labels shifted right by one, same length
            if ex.labels.len() > max_positions {
                anyhow::bail!(
                    "example {idx}: {} label tokens exceed max_position_embeddings ({max_positions})",
                    ex.labels.len()
                );
            }
        }
        Ok(())
    }
}

impl Dataset<Seq2SeqExample> for Seq2SeqDataset {
    fn get(&self, index: usize) -> Option<Seq2SeqExample> {
        self.examples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.examples.len()
    }
}

impl fmt::Display for Seq2SeqDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let features = self
            .features()
            .iter()
            .map(|c| format!("'{c}'"))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "Dataset({{ features: [{features}], num_rows: {} }})", self.examples.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_features_and_rows() {
        let ds = Seq2SeqDataset::new(vec![
            Seq2SeqExample::new(vec![3, 4], vec![5]),
            Seq2SeqExample::new(vec![6], vec![7]),
        ]);
        assert_eq!(
            ds.to_string(),
            "Dataset({ features: ['input_ids', 'labels'], num_rows: 2 })"
        );
    }

    #[test]
    fn test_check_fits_rejects_out_of_vocab() {
        let ds = Seq2SeqDataset::new(vec![Seq2SeqExample::new(vec![3, 40], vec![5])]);
        assert!(ds.check_fits(32, 16).is_err());
        assert!(ds.check_fits(64, 16).is_ok());
    }

    #[test]
    fn test_check_fits_rejects_long_sequences() {
        let ds = Seq2SeqDataset::new(vec![Seq2SeqExample::new(vec![3; 10], vec![5; 3])]);
        assert!(ds.check_fits(32, 8).is_err());
        assert!(ds.check_fits(32, 10).is_ok());
    }
}
