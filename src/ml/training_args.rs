// ============================================================
// Layer 5 — Training Arguments
// ============================================================
// Everything the trainer needs to know about one run.
// Serialised as training_args.json next to every checkpoint and
// the final model; the hub token never is.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::error::ConfigError;
use crate::domain::strategy::{HubStrategy, IntervalStrategy};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingArguments {
    /// Checkpoints land in `<output_dir>/checkpoint-<step>`
    pub output_dir:                  PathBuf,
    pub num_train_epochs:            usize,
    pub per_device_train_batch_size: usize,
    pub per_device_eval_batch_size:  usize,
    pub learning_rate:               f64,
    pub weight_decay:                f64,
    pub save_strategy:               IntervalStrategy,
    pub save_steps:                  usize,
    pub save_total_limit:            Option<usize>,
    pub evaluation_strategy:         IntervalStrategy,
    pub eval_steps:                  usize,
    pub logging_dir:                 PathBuf,
    pub logging_steps:               usize,
    pub predict_with_generate:       bool,
    /// None → the model config's `max_length`
    pub generation_max_length:       Option<usize>,
    pub load_best_model_at_end:      bool,
    pub metric_for_best_model:       String,
    pub greater_is_better:           bool,
    pub fp16:                        bool,
    pub seed:                        u64,
    pub push_to_hub:                 bool,
    pub hub_strategy:                Option<HubStrategy>,
    pub hub_model_id:                Option<String>,
    #[serde(skip)]
    pub hub_token:                   Option<String>,
}

impl Default for TrainingArguments {
    fn default() -> Self {
        Self {
            output_dir:                  PathBuf::from("/opt/ml/checkpoints"),
            num_train_epochs:            3,
            per_device_train_batch_size: 2,
            per_device_eval_batch_size:  8,
            learning_rate:               5e-5,
            weight_decay:                0.01,
            save_strategy:               IntervalStrategy::Epoch,
            save_steps:                  500,
            save_total_limit:            Some(3),
            evaluation_strategy:         IntervalStrategy::Epoch,
            eval_steps:                  500,
            logging_dir:                 PathBuf::from("logs"),
            logging_steps:               500,
            predict_with_generate:       true,
            generation_max_length:       None,
            load_best_model_at_end:      true,
            metric_for_best_model:       "loss".to_string(),
            greater_is_better:           false,
            fp16:                        false,
            seed:                        42,
            push_to_hub:                 false,
            hub_strategy:                None,
            hub_model_id:                None,
            hub_token:                   None,
        }
    }
}

impl TrainingArguments {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ConfigError::InvalidLearningRate(self.learning_rate));
        }
        for (name, value) in [
            ("train-batch-size", self.per_device_train_batch_size),
            ("eval-batch-size",  self.per_device_eval_batch_size),
            ("save-steps",       self.save_steps),
            ("eval-steps",       self.eval_steps),
            ("logging-steps",    self.logging_steps),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroValue { name });
            }
        }

        if self.load_best_model_at_end {
            if !self.evaluation_strategy.is_enabled() {
                return Err(ConfigError::NoEvaluationForBestModel);
            }
            if self.save_strategy != self.evaluation_strategy {
                return Err(ConfigError::StrategyMismatch {
                    save: self.save_strategy,
                    eval: self.evaluation_strategy,
                });
            }
            if self.save_strategy == IntervalStrategy::Steps && self.save_steps % self.eval_steps != 0 {
                return Err(ConfigError::StepsNotMultiple {
                    save_steps: self.save_steps,
                    eval_steps: self.eval_steps,
                });
            }
        }

        if self.push_to_hub {
            if self.hub_strategy.is_none() {
                return Err(ConfigError::MissingHubStrategy);
            }
            if self.hub_token.is_none() {
                return Err(ConfigError::MissingHubToken);
            }
        }
        Ok(())
    }

    /// Key the best-model comparison reads from the eval metrics.
    pub fn best_metric_key(&self) -> String {
        if self.metric_for_best_model.starts_with("eval_") {
            self.metric_for_best_model.clone()
        } else {
            format!("eval_{}", self.metric_for_best_model)
        }
    }

    pub fn is_better(&self, candidate: f64, best: Option<f64>) -> bool {
        match best {
            None => true,
            Some(best) if self.greater_is_better => candidate > best,
            Some(best) => candidate < best,
        }
    }
}

/// Linear decay from `base` at step 0 to zero at `total_steps`.
pub fn linear_lr(base: f64, step: usize, total_steps: usize) -> f64 {
    if total_steps == 0 {
        return base;
    }
    let remaining = total_steps.saturating_sub(step) as f64;
    base * remaining / total_steps as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(TrainingArguments::default().validate(), Ok(()));
    }

    #[test]
    fn test_push_requires_strategy_then_token() {
        let mut args = TrainingArguments { push_to_hub: true, ..Default::default() };
        assert_eq!(args.validate(), Err(ConfigError::MissingHubStrategy));
        args.hub_strategy = Some(HubStrategy::EverySave);
        assert_eq!(args.validate(), Err(ConfigError::MissingHubToken));
        args.hub_token = Some("hf_x".into());
        assert_eq!(args.validate(), Ok(()));
    }

    #[test]
    fn test_best_model_needs_matching_strategies() {
        let args = TrainingArguments {
            save_strategy: IntervalStrategy::Steps,
            ..Default::default()
        };
        assert!(matches!(args.validate(), Err(ConfigError::StrategyMismatch { .. })));

        let args = TrainingArguments {
            evaluation_strategy: IntervalStrategy::No,
            save_strategy:       IntervalStrategy::No,
            ..Default::default()
        };
        assert_eq!(args.validate(), Err(ConfigError::NoEvaluationForBestModel));
    }

    #[test]
    fn test_best_model_with_steps_needs_multiple() {
        let args = TrainingArguments {
            save_strategy:       IntervalStrategy::Steps,
            evaluation_strategy: IntervalStrategy::Steps,
            save_steps:          300,
            eval_steps:          200,
            ..Default::default()
        };
        assert!(matches!(args.validate(), Err(ConfigError::StepsNotMultiple { .. })));
    }

    #[test]
    fn test_strategies_unchecked_without_best_model() {
        let args = TrainingArguments {
            save_strategy:          IntervalStrategy::Steps,
            evaluation_strategy:    IntervalStrategy::No,
            load_best_model_at_end: false,
            ..Default::default()
        };
        assert_eq!(args.validate(), Ok(()));
    }

    #[test]
    fn test_rejects_bad_learning_rate() {
        let args = TrainingArguments { learning_rate: 0.0, ..Default::default() };
        assert_eq!(args.validate(), Err(ConfigError::InvalidLearningRate(0.0)));
    }

    #[test]
    fn test_best_metric_comparison() {
        let args = TrainingArguments::default();
        assert_eq!(args.best_metric_key(), "eval_loss");
        assert!(args.is_better(1.0, None));
        assert!(args.is_better(1.0, Some(2.0)));
        assert!(!args.is_better(3.0, Some(2.0)));
    }

    #[test]
    fn test_linear_lr_decays_to_zero() {
        assert_eq!(linear_lr(1e-4, 0, 10), 1e-4);
        assert!((linear_lr(1e-4, 5, 10) - 5e-5).abs() < 1e-12);
        assert_eq!(linear_lr(1e-4, 10, 10), 0.0);
        assert_eq!(linear_lr(1e-4, 12, 10), 0.0);
    }
}
