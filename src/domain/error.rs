// ============================================================
// Layer 3 — Configuration Errors
// ============================================================
// Everything that can be wrong with the arguments before any
// file is read or any request is sent.

use crate::domain::strategy::IntervalStrategy;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("--hub_strategy is required when pushing to Hub")]
    MissingHubStrategy,

    #[error("--hub_token is required when pushing to Hub")]
    MissingHubToken,

    #[error("invalid learning rate {0}: must be a finite number greater than zero")]
    InvalidLearningRate(f64),

    #[error("--{name} must be at least 1")]
    ZeroValue { name: &'static str },

    #[error(
        "--load-best-model-at-end requires the save and evaluation strategies to match, \
         but they are {save} and {eval}"
    )]
    StrategyMismatch {
        save: IntervalStrategy,
        eval: IntervalStrategy,
    },

    #[error("--load-best-model-at-end requires an evaluation strategy other than 'no'")]
    NoEvaluationForBestModel,

    #[error(
        "--load-best-model-at-end requires --save-steps ({save_steps}) to be a multiple of \
         --eval-steps ({eval_steps})"
    )]
    StepsNotMultiple {
        save_steps: usize,
        eval_steps: usize,
    },
}
