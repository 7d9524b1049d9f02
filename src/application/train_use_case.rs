// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the fine-tuning pipeline in order:
//
//   Step 1: Validate arguments          (no I/O before this)
//   Step 2: Load train + valid datasets (Layer 4 - data)
//   Step 3: Resolve pretrained files    (Layer 6 - infra)
//   Step 4: Build model + tokenizer     (Layer 5 / 6)
//   Step 5: Connect to the hub          (Layer 6, only when pushing)
//   Step 6: Run the trainer             (Layer 5 - ml)
//   Step 7: Save the final model        (Layer 6 - infra)
//   Step 8: Final evaluation → eval_results.json
//   Step 9: Model card + hub push       (Layer 6, optional)
//
// Reference: Burn Book §5 (Training)

use anyhow::{Context, Result};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::PathBuf};

use crate::data::{dataset::Seq2SeqDataset, loader::DiskDatasetLoader};
use crate::domain::error::ConfigError;
use crate::domain::strategy::{HubStrategy, IntervalStrategy};
use crate::domain::traits::ExampleSource;
use crate::eval::compute::RougeMetrics;
use crate::infra::{
    checkpoint, hub::HubClient, model_card::ModelCard, pretrained, tokenizer_store::TokenizerStore,
};
use crate::ml::trainer::{Seq2SeqTrainer, TrainOutput};
use crate::ml::training_args::TrainingArguments;

pub const EVAL_RESULTS_FILE: &str = "eval_results.json";
pub const MODEL_CARD_FILE:   &str = "README.md";

type MyBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

// ─── Fine-tuning Configuration ───────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FineTuneConfig {
    pub model_name:             String,
    pub learning_rate:          f64,
    pub epochs:                 usize,
    pub train_batch_size:       usize,
    pub eval_batch_size:        usize,
    pub evaluation_strategy:    IntervalStrategy,
    pub save_strategy:          IntervalStrategy,
    pub save_steps:             usize,
    /// None → `logging_steps`
    pub eval_steps:             Option<usize>,
    pub logging_steps:          usize,
    pub weight_decay:           f64,
    pub save_total_limit:       Option<usize>,
    pub seed:                   u64,
    pub generation_max_length:  Option<usize>,
    pub load_best_model_at_end: bool,
    pub check_points_dir:       PathBuf,
    pub output_data_dir:        PathBuf,
    pub model_dir:              PathBuf,
    pub train_dir:              PathBuf,
    pub valid_dir:              PathBuf,
}

impl Default for FineTuneConfig {
    fn default() -> Self {
        let args = TrainingArguments::default();
        Self {
            model_name:             String::new(),
            learning_rate:          args.learning_rate,
            epochs:                 args.num_train_epochs,
            train_batch_size:       args.per_device_train_batch_size,
            eval_batch_size:        args.per_device_eval_batch_size,
            evaluation_strategy:    args.evaluation_strategy,
            save_strategy:          args.save_strategy,
            save_steps:             args.save_steps,
            eval_steps:             None,
            logging_steps:          args.logging_steps,
            weight_decay:           args.weight_decay,
            save_total_limit:       args.save_total_limit,
            seed:                   args.seed,
            generation_max_length:  None,
            load_best_model_at_end: args.load_best_model_at_end,
            check_points_dir:       args.output_dir,
            output_data_dir:        PathBuf::from("output"),
            model_dir:              PathBuf::from("model"),
            train_dir:              PathBuf::from("train"),
            valid_dir:              PathBuf::from("valid"),
        }
    }
}

/// Where and when to publish the model.
#[derive(Debug, Clone, Default)]
pub struct HubConfig {
    pub push_to_hub:  bool,
    pub hub_model_id: Option<String>,
    pub hub_strategy: Option<HubStrategy>,
    pub hub_token:    Option<String>,
    pub hub_push:     bool,
}

impl HubConfig {
    /// Repository id, defaulting to the base model name with `/` → `--`.
    pub fn model_id(&self, model_name: &str) -> String {
        self.hub_model_id
            .clone()
            .unwrap_or_else(|| model_name.replace('/', "--"))
    }

    pub fn wants_push(&self) -> bool {
        self.push_to_hub || self.hub_push
    }
}

impl FineTuneConfig {
    /// Trainer arguments for this run, with everything the pipeline fixes.
    pub fn training_args(&self, hub: &HubConfig) -> TrainingArguments {
        TrainingArguments {
            output_dir:                  self.check_points_dir.clone(),
            num_train_epochs:            self.epochs,
            per_device_train_batch_size: self.train_batch_size,
            per_device_eval_batch_size:  self.eval_batch_size,
            learning_rate:               self.learning_rate,
            weight_decay:                self.weight_decay,
            save_strategy:               self.save_strategy,
            save_steps:                  self.save_steps,
            save_total_limit:            self.save_total_limit,
            evaluation_strategy:         self.evaluation_strategy,
            eval_steps:                  self.eval_steps.unwrap_or(self.logging_steps),
            logging_dir:                 self.output_data_dir.join("logs"),
            logging_steps:               self.logging_steps,
            predict_with_generate:       true,
            generation_max_length:       self.generation_max_length,
            load_best_model_at_end:      self.load_best_model_at_end,
            metric_for_best_model:       "loss".to_string(),
            greater_is_better:           false,
            fp16:                        false,
            seed:                        self.seed,
            push_to_hub:                 hub.push_to_hub,
            hub_strategy:                hub.hub_strategy,
            hub_model_id:                Some(hub.model_id(&self.model_name)),
            hub_token:                   hub.hub_token.clone(),
        }
    }

    /// Validate without touching the filesystem or network.
    pub fn validate(&self, hub: &HubConfig) -> Result<TrainingArguments, ConfigError> {
        let args = self.training_args(hub);
        args.validate()?;
        if hub.hub_push && hub.hub_token.is_none() {
            return Err(ConfigError::MissingHubToken);
        }
        Ok(args)
    }
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct FineTuneReport {
    pub train:        TrainOutput,
    pub eval_metrics: BTreeMap<String, f64>,
    pub model_dir:    PathBuf,
    pub hub_url:      Option<String>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: FineTuneConfig,
    hub:    HubConfig,
}

impl TrainUseCase {
    pub fn new(config: FineTuneConfig, hub: HubConfig) -> Self {
        Self { config, hub }
    }

    /// Run the pipeline on the GPU backend.
    pub fn execute(&self) -> Result<FineTuneReport> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        self.execute_on::<MyBackend>(device)
    }

    pub fn execute_on<B: AutodiffBackend>(&self, device: B::Device) -> Result<FineTuneReport> {
        let cfg  = &self.config;
        let args = cfg.validate(&self.hub)?;

        // ── Step 2: datasets ─────────────────────────────────────────────────
        let train_dataset = Seq2SeqDataset::new(DiskDatasetLoader::new(&cfg.train_dir).load_all()?);
        let eval_dataset  = Seq2SeqDataset::new(DiskDatasetLoader::new(&cfg.valid_dir).load_all()?);
        tracing::info!("loaded train_dataset length is: {}", train_dataset.example_count());
        tracing::info!("loaded test_dataset length is: {}", eval_dataset.example_count());
        tracing::info!("{train_dataset}");
        tracing::info!("{eval_dataset}");

        // ── Step 3–4: pretrained model + tokenizer ───────────────────────────
        let files     = pretrained::resolve(&cfg.model_name, self.hub.hub_token.as_deref())?;
        let model_cfg = files.load_config()?;
        let tokenizer = TokenizerStore::load(&files.tokenizer, model_cfg.pad_token_id)?;
        if tokenizer.vocab_size() > model_cfg.vocab_size {
            tracing::warn!(
                "Tokenizer has {} tokens but the model embeds {}",
                tokenizer.vocab_size(),
                model_cfg.vocab_size
            );
        }

        let mut model = model_cfg.init::<B>(&device);
        match &files.weights {
            Some(weights) => {
                model = checkpoint::load_weights(model, weights, &device)?;
                tracing::info!("Loaded pretrained weights from '{}'", weights.display());
            }
            None => tracing::warn!(
                "'{}' has no {}; starting from randomly initialised weights",
                cfg.model_name,
                checkpoint::WEIGHTS_FILE
            ),
        }

        for (name, ds) in [("train", &train_dataset), ("valid", &eval_dataset)] {
            ds.check_fits(model_cfg.vocab_size, model_cfg.max_position_embeddings)
                .with_context(|| format!("{name} dataset does not fit '{}'", cfg.model_name))?;
        }
        let generation_length = args.generation_max_length.unwrap_or(model_cfg.max_length);
        if generation_length > model_cfg.max_position_embeddings {
            anyhow::bail!(
                "--generation-max-length {generation_length} exceeds max_position_embeddings ({}) of '{}'",
                model_cfg.max_position_embeddings,
                cfg.model_name
            );
        }

        // ── Step 5: hub repository for pushes during training ────────────────
        let hub = if args.push_to_hub { Some(self.connect_hub()?) } else { None };

        // ── Step 6: train ────────────────────────────────────────────────────
        let mut trainer = Seq2SeqTrainer::new(
            model,
            model_cfg,
            args,
            tokenizer.clone(),
            train_dataset,
            Some(eval_dataset),
            Some(Box::new(RougeMetrics::new(tokenizer))),
            hub,
            device,
        )?;
        let train = trainer.train()?;

        // ── Step 7: final model ──────────────────────────────────────────────
        trainer.save_model(&cfg.model_dir)?;

        // ── Step 8: final evaluation ─────────────────────────────────────────
        let eval_metrics = trainer.evaluate()?;
        write_eval_results(&cfg.output_data_dir, &eval_metrics)?;
        for (k, v) in &eval_metrics {
            println!("{k} = {v}");
        }

        // ── Step 9: publish ──────────────────────────────────────────────────
        let hub_url = self.push_to_hub(&trainer)?;

        Ok(FineTuneReport { train, eval_metrics, model_dir: cfg.model_dir.clone(), hub_url })
    }

    fn connect_hub(&self) -> Result<HubClient> {
        let token = self.hub.hub_token.as_deref().ok_or(ConfigError::MissingHubToken)?;
        let hub   = HubClient::connect(&self.hub.model_id(&self.config.model_name), token)?;
        let url   = hub.create_repo(false)?;
        tracing::info!("Hub repository '{}' ready: {url}", hub.repo_id());
        Ok(hub)
    }

    /// Write the model card and upload the final model directory.
    /// No-op unless `push_to_hub` or `hub_push` is set.
    pub fn push_to_hub<B: AutodiffBackend>(&self, trainer: &Seq2SeqTrainer<B>) -> Result<Option<String>> {
        if !self.hub.wants_push() {
            return Ok(None);
        }

        let repo_id = self.hub.model_id(&self.config.model_name);
        let card    = ModelCard::new(
            &repo_id,
            &self.config.model_name,
            trainer.args(),
            &trainer.state().log_history,
        );
        let card_path = self.config.model_dir.join(MODEL_CARD_FILE);
        fs::write(&card_path, card.to_markdown())
            .with_context(|| format!("Cannot write '{}'", card_path.display()))?;

        let hub = self.connect_hub()?;
        let n   = hub.upload_folder(&self.config.model_dir, None)?;
        tracing::info!("Pushed {n} files to {}", hub.repo_url());
        Ok(Some(hub.repo_url()))
    }
}

fn write_eval_results(dir: &std::path::Path, metrics: &BTreeMap<String, f64>) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Cannot create '{}'", dir.display()))?;
    let path = dir.join(EVAL_RESULTS_FILE);
    fs::write(&path, serde_json::to_string_pretty(metrics)?)
        .with_context(|| format!("Cannot write '{}'", path.display()))?;
    Ok(path)
}
