// ============================================================
// Layer 5 — Trainer State
// ============================================================
// What the trainer knows about its own progress, saved as
// trainer_state.json inside every checkpoint:
//   global_step, epoch, max_steps
//   log_history            ← training-loss logs and evaluations
//   best_metric            ← score of the best checkpoint so far
//   best_model_checkpoint  ← its directory

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One row of the log history: either a training-loss log or an
/// evaluation. Metric names are the keys (`loss`, `eval_rouge1`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub step:    usize,
    pub epoch:   f64,
    #[serde(flatten)]
    pub values:  BTreeMap<String, f64>,
}

impl LogEntry {
    pub fn is_eval(&self) -> bool {
        self.values.keys().any(|k| k.starts_with("eval_"))
    }
}

/// Progress of a run, written as trainer_state.json into every checkpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainerState {
    pub global_step:           usize,
    pub epoch:                 f64,
    pub max_steps:             usize,
    pub log_history:           Vec<LogEntry>,
    pub best_metric:           Option<f64>,
    pub best_model_checkpoint: Option<PathBuf>,
}

impl TrainerState {
    pub fn log(&mut self, values: BTreeMap<String, f64>) {
        self.log_history.push(LogEntry {
            step:  self.global_step,
            epoch: (self.epoch * 10_000.0).round() / 10_000.0,
            values,
        });
    }

    /// Most recent evaluation, if any has run.
    pub fn last_eval(&self) -> Option<&LogEntry> {
        self.log_history.iter().rev().find(|e| e.is_eval())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_eval_skips_training_logs() {
        let mut state = TrainerState::default();
        state.log(BTreeMap::from([("eval_loss".to_string(), 2.0)]));
        state.global_step = 5;
        state.log(BTreeMap::from([("loss".to_string(), 1.5)]));
        let last = state.last_eval().unwrap();
        assert_eq!(last.step, 0);
        assert_eq!(last.values["eval_loss"], 2.0);
    }

    #[test]
    fn test_log_entry_flattens_values() {
        let entry = LogEntry {
            step:   3,
            epoch:  1.0,
            values: BTreeMap::from([("loss".to_string(), 0.5)]),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["loss"], 0.5);
        assert_eq!(json["step"], 3);
    }
}
