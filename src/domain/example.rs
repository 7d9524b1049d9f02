// ============================================================
// Layer 3 — Seq2Seq Example Domain Type
// ============================================================
// One pre-tokenised training example as it sits on disk:
//   - input_ids:      the source text (e.g. a clinical note)
//   - attention_mask: 1 for real tokens (optional on disk)
//   - labels:         the target text (e.g. its summary)
//
// Labels may already contain IGNORE_INDEX positions; those
// never contribute to the loss and are skipped when decoding.

use serde::{Deserialize, Serialize};

/// Label value that the loss and the metrics ignore.
pub const IGNORE_INDEX: i64 = -100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seq2SeqExample {
    pub input_ids: Vec<u32>,

    #[serde(default)]
    pub attention_mask: Option<Vec<u32>>,

    pub labels: Vec<i64>,
}

impl Seq2SeqExample {
    pub fn new(input_ids: Vec<u32>, labels: Vec<i64>) -> Self {
        Self { input_ids, attention_mask: None, labels }
    }

    /// Attention mask, defaulting to all ones when the column was absent.
    pub fn mask(&self) -> Vec<u32> {
        self.attention_mask
            .clone()
            .unwrap_or_else(|| vec![1; self.input_ids.len()])
    }

    /// Number of label positions that take part in the loss.
    pub fn target_len(&self) -> usize {
        self.labels.iter().filter(|&&l| l != IGNORE_INDEX).count()
    }

    /// Structural checks that do not depend on a model config.
    pub fn check(&self) -> Result<(), String> {
        if self.input_ids.is_empty() {
            return Err("input_ids is empty".to_string());
        }
        if self.labels.is_empty() {
            return Err("labels is empty".to_string());
        }
        if let Some(mask) = &self.attention_mask {
            if mask.len() != self.input_ids.len() {
                return Err(format!(
                    "attention_mask has {} entries but input_ids has {}",
                    mask.len(),
                    self.input_ids.len()
                ));
            }
            if mask.iter().all(|&m| m == 0) {
                return Err("attention_mask masks every input token".to_string());
            }
        }
        if let Some(bad) = self.labels.iter().find(|&&l| l < 0 && l != IGNORE_INDEX) {
            return Err(format!("label {bad} is negative and not {IGNORE_INDEX}"));
        }
        if self.target_len() == 0 {
            return Err(format!("every label is {IGNORE_INDEX}"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_defaults_to_ones() {
        let ex = Seq2SeqExample::new(vec![5, 6, 7], vec![8, 1]);
        assert_eq!(ex.mask(), vec![1, 1, 1]);
    }

    #[test]
    fn test_target_len_skips_ignored() {
        let ex = Seq2SeqExample::new(vec![5], vec![8, 9, IGNORE_INDEX, IGNORE_INDEX]);
        assert_eq!(ex.target_len(), 2);
    }

    #[test]
    fn test_check_rejects_bad_labels() {
        assert!(Seq2SeqExample::new(vec![5], vec![-3]).check().is_err());
        assert!(Seq2SeqExample::new(vec![5], vec![IGNORE_INDEX]).check().is_err());
        assert!(Seq2SeqExample::new(vec![], vec![4]).check().is_err());
        assert!(Seq2SeqExample::new(vec![5], vec![4, 1]).check().is_ok());
    }

    #[test]
    fn test_check_rejects_mask_length_mismatch() {
        let ex = Seq2SeqExample {
            input_ids:      vec![5, 6],
            attention_mask: Some(vec![1]),
            labels:         vec![4],
        };
        assert!(ex.check().is_err());
    }

    #[test]
    fn test_check_rejects_all_zero_mask() {
        let ex = Seq2SeqExample {
            input_ids:      vec![5, 6],
            attention_mask: Some(vec![0, 0]),
            labels:         vec![4],
        };
        assert!(ex.check().unwrap_err().contains("every input token"));

        let partial = Seq2SeqExample { attention_mask: Some(vec![1, 0]), ..ex };
        assert!(partial.check().is_ok());
    }
}
