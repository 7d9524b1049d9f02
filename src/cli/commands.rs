// ============================================================
// Layer 1 — CLI Arguments
// ============================================================
// Training flags use dashes, hub flags use underscores, the way
// the hosting platform passes them. Directory flags fall back to
// the platform's SM_* environment variables.
//
// Boolean flags accept true/false/yes/no/1/0; a bare flag means
// true.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{builder::BoolishValueParser, ArgAction, Args};
use std::path::PathBuf;

use crate::application::train_use_case::{FineTuneConfig, HubConfig};
use crate::domain::strategy::{HubStrategy, IntervalStrategy};

/// Model, optimisation and directory arguments.
#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Pretrained checkpoint: local directory or hub repository id
    #[arg(long)]
    pub model_name: String,

    #[arg(long, default_value_t = 5e-5)]
    pub learning_rate: f64,

    /// Number of full passes through the training data
    #[arg(long, default_value_t = 3)]
    pub epochs: usize,

    #[arg(long, default_value_t = 2)]
    pub train_batch_size: usize,

    #[arg(long, default_value_t = 8)]
    pub eval_batch_size: usize,

    /// When to evaluate: no, steps or epoch
    #[arg(long, default_value_t = IntervalStrategy::Epoch)]
    pub evaluation_strategy: IntervalStrategy,

    /// When to save a checkpoint: no, steps or epoch
    #[arg(long, default_value_t = IntervalStrategy::Epoch)]
    pub save_strategy: IntervalStrategy,

    #[arg(long, default_value_t = 500)]
    pub save_steps: usize,

    /// Defaults to --logging-steps
    #[arg(long)]
    pub eval_steps: Option<usize>,

    #[arg(long, default_value_t = 500)]
    pub logging_steps: usize,

    #[arg(long, default_value_t = 0.01)]
    pub weight_decay: f64,

    /// Checkpoints kept on disk; 0 keeps all of them
    #[arg(long, default_value_t = 3)]
    pub save_total_limit: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Defaults to the model config's max_length
    #[arg(long)]
    pub generation_max_length: Option<usize>,

    #[arg(
        long,
        num_args = 0..=1,
        default_value_t = true,
        default_missing_value = "true",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
    )]
    pub load_best_model_at_end: bool,

    #[arg(long, default_value = "/opt/ml/checkpoints")]
    pub check_points_dir: PathBuf,

    #[arg(long, env = "SM_OUTPUT_DATA_DIR")]
    pub output_data_dir: PathBuf,

    #[arg(long, env = "SM_MODEL_DIR")]
    pub model_dir: PathBuf,

    #[arg(long, env = "SM_CHANNEL_TRAIN")]
    pub train_dir: PathBuf,

    #[arg(long, env = "SM_CHANNEL_VALID")]
    pub valid_dir: PathBuf,
}

/// Model hub publishing arguments.
#[derive(Args, Debug, Clone)]
pub struct HubArgs {
    /// Push checkpoints during training per --hub_strategy
    #[arg(
        long = "push_to_hub",
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
    )]
    pub push_to_hub: bool,

    /// Defaults to the model name with '/' replaced by '--'
    #[arg(long = "hub_model_id")]
    pub hub_model_id: Option<String>,

    /// end, every_save, checkpoint or all_checkpoints
    #[arg(long = "hub_strategy")]
    pub hub_strategy: Option<HubStrategy>,

    #[arg(long = "hub_token", env = "HF_TOKEN", hide_env_values = true)]
    pub hub_token: Option<String>,

    /// Push the final model and model card after training
    #[arg(
        long = "hub_push",
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
    )]
    pub hub_push: bool,
}

/// Convert CLI args into the application-layer config.
/// The application layer never sees clap types.
impl From<TrainArgs> for FineTuneConfig {
    fn from(a: TrainArgs) -> Self {
        FineTuneConfig {
            model_name:             a.model_name,
            learning_rate:          a.learning_rate,
            epochs:                 a.epochs,
            train_batch_size:       a.train_batch_size,
            eval_batch_size:        a.eval_batch_size,
            evaluation_strategy:    a.evaluation_strategy,
            save_strategy:          a.save_strategy,
            save_steps:             a.save_steps,
            eval_steps:             a.eval_steps,
            logging_steps:          a.logging_steps,
            weight_decay:           a.weight_decay,
            save_total_limit:       (a.save_total_limit > 0).then_some(a.save_total_limit),
            seed:                   a.seed,
            generation_max_length:  a.generation_max_length,
            load_best_model_at_end: a.load_best_model_at_end,
            check_points_dir:       a.check_points_dir,
            output_data_dir:        a.output_data_dir,
            model_dir:              a.model_dir,
            train_dir:              a.train_dir,
            valid_dir:              a.valid_dir,
        }
    }
}

impl From<HubArgs> for HubConfig {
    fn from(a: HubArgs) -> Self {
        HubConfig {
            push_to_hub:  a.push_to_hub,
            hub_model_id: a.hub_model_id,
            hub_strategy: a.hub_strategy,
            hub_token:    a.hub_token.filter(|t| !t.is_empty()),
            hub_push:     a.hub_push,
        }
    }
}
