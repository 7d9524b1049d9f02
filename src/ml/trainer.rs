// ============================================================
// Layer 5 — Seq2Seq Trainer
// ============================================================
// Train + evaluate + checkpoint loop on Burn's DataLoader and AdamW.
//
// Per optimisation step:
//   forward_loss → backward → AdamW step at a linearly decayed lr
//   → log every `logging_steps`
//   → evaluate / save when a `steps` strategy fires
// Per epoch end:
//   → evaluate / save when an `epoch` strategy fires
//
// Evaluation runs on model.valid() (inner backend, dropout off),
// averages the loss, and when predicting with generate hands the
// greedy outputs to the metrics callback.
//
// Saving writes checkpoint-<step>, updates the best checkpoint
// from the last evaluation, rotates old checkpoints and pushes to
// the hub according to the hub strategy.
//
// Reference: Burn Book §5, Loshchilov & Hutter (2019) AdamW

use anyhow::{bail, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use crate::data::{batcher::Seq2SeqBatcher, dataset::Seq2SeqDataset};
use crate::domain::strategy::HubStrategy;
use crate::domain::traits::{EvalPrediction, MetricsCallback};
use crate::infra::{
    checkpoint::{self, CheckpointManager, CHECKPOINT_PREFIX, WEIGHTS_FILE},
    hub::{HubClient, HubError},
    metrics::{EvalRecord, MetricsLogger},
    tokenizer_store::TokenizerStore,
};
use crate::ml::generate::greedy_generate;
use crate::ml::model::{Seq2SeqConfig, Seq2SeqModel};
use crate::ml::state::TrainerState;
use crate::ml::training_args::{linear_lr, TrainingArguments};

/// Summary returned by `train`.
#[derive(Debug, Clone)]
pub struct TrainOutput {
    pub global_step:   usize,
    pub training_loss: f64,
    pub metrics:       BTreeMap<String, f64>,
}

pub struct Seq2SeqTrainer<B: AutodiffBackend> {
    model:           Seq2SeqModel<B>,
    config:          Seq2SeqConfig,
    args:            TrainingArguments,
    tokenizer:       TokenizerStore,
    train_dataset:   Arc<Seq2SeqDataset>,
    eval_dataset:    Option<Arc<Seq2SeqDataset>>,
    compute_metrics: Option<Box<dyn MetricsCallback>>,
    checkpoints:     CheckpointManager,
    logger:          MetricsLogger,
    hub:             Option<HubClient>,
    state:           TrainerState,
    device:          B::Device,
    /// Training loss accumulated since the last evaluation (sum, steps)
    loss_since_eval: (f64, usize),
}

impl<B: AutodiffBackend> Seq2SeqTrainer<B> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model:           Seq2SeqModel<B>,
        config:          Seq2SeqConfig,
        args:            TrainingArguments,
        tokenizer:       TokenizerStore,
        train_dataset:   Seq2SeqDataset,
        eval_dataset:    Option<Seq2SeqDataset>,
        compute_metrics: Option<Box<dyn MetricsCallback>>,
        hub:             Option<HubClient>,
        device:          B::Device,
    ) -> Result<Self> {
        if args.evaluation_strategy.is_enabled() && eval_dataset.is_none() {
            bail!("evaluation strategy '{}' needs an evaluation dataset", args.evaluation_strategy);
        }
        let generation_length = args.generation_max_length.unwrap_or(config.max_length);
        if args.predict_with_generate && generation_length > config.max_position_embeddings {
            bail!(
                "generation max length ({generation_length}) exceeds the model's \
                 max_position_embeddings ({})",
                config.max_position_embeddings
            );
        }
        let checkpoints = CheckpointManager::new(&args.output_dir)?;
        let logger      = MetricsLogger::new(&args.logging_dir)?;
        tracing::info!("Evaluation metrics go to '{}'", logger.csv_path().display());

        Ok(Self {
            model,
            config,
            args,
            tokenizer,
            train_dataset: Arc::new(train_dataset),
            eval_dataset: eval_dataset.map(Arc::new),
            compute_metrics,
            checkpoints,
            logger,
            hub,
            state: TrainerState::default(),
            device,
            loss_since_eval: (0.0, 0),
        })
    }

    pub fn state(&self) -> &TrainerState {
        &self.state
    }

    pub fn args(&self) -> &TrainingArguments {
        &self.args
    }

    pub fn train(&mut self) -> Result<TrainOutput> {
        let args = self.args.clone();
        B::seed(args.seed);

        let n_train         = self.train_dataset.example_count();
        let steps_per_epoch = n_train.div_ceil(args.per_device_train_batch_size);
        let max_steps       = steps_per_epoch * args.num_train_epochs;
        self.state.max_steps = max_steps;

        tracing::info!("***** Running training *****");
        tracing::info!("  Num examples = {n_train}");
        tracing::info!("  Num epochs = {}", args.num_train_epochs);
        tracing::info!("  Batch size = {}", args.per_device_train_batch_size);
        tracing::info!("  Total optimization steps = {max_steps}");

        let batcher = Seq2SeqBatcher::<B>::new(
            self.device.clone(),
            self.config.pad_token_id,
            self.config.decoder_start(),
        );
        let train_loader = DataLoaderBuilder::new(batcher)
            .batch_size(args.per_device_train_batch_size)
            .shuffle(args.seed)
            .num_workers(1)
            .build(self.train_dataset.clone());

        let mut optim = AdamWConfig::new()
            .with_weight_decay(args.weight_decay as f32)
            .init();

        let mut model       = self.model.clone();
        let started         = Instant::now();
        let mut loss_total  = 0.0f64;
        let mut since_log   = (0.0f64, 0usize);

        for epoch in 0..args.num_train_epochs {
            for (i, batch) in train_loader.iter().enumerate() {
                let lr = linear_lr(args.learning_rate, self.state.global_step, max_steps);

                let (loss, _) = model.forward_loss(&batch);
                let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(lr, model, grads);

                self.state.global_step += 1;
                self.state.epoch = epoch as f64 + (i + 1) as f64 / steps_per_epoch.max(1) as f64;
                loss_total += loss_val;
                since_log.0 += loss_val;
                since_log.1 += 1;
                self.loss_since_eval.0 += loss_val;
                self.loss_since_eval.1 += 1;

                if self.state.global_step % args.logging_steps == 0 {
                    let avg = since_log.0 / since_log.1 as f64;
                    tracing::info!(
                        "step {}/{} | loss={:.4} | lr={:.3e}",
                        self.state.global_step, max_steps, avg, lr
                    );
                    self.state.log(BTreeMap::from([
                        ("loss".to_string(), (avg * 10_000.0).round() / 10_000.0),
                        ("learning_rate".to_string(), lr),
                    ]));
                    since_log = (0.0, 0);
                }

                let gs = self.state.global_step;
                let eval_now = args.evaluation_strategy.fires_on_step(gs, args.eval_steps);
                let save_now = args.save_strategy.fires_on_step(gs, args.save_steps);
                self.evaluate_and_save(&model, eval_now, save_now)?;
            }

            self.state.epoch = (epoch + 1) as f64;
            let eval_now = args.evaluation_strategy.fires_on_epoch_end();
            let save_now = args.save_strategy.fires_on_epoch_end();
            let metrics  = self.evaluate_and_save(&model, eval_now, save_now)?;

            match metrics.as_ref().and_then(|m| m.get("eval_loss")) {
                Some(eval_loss) => println!(
                    "Epoch {:>3}/{} | step={} | eval_loss={:.4} | rouge1={:.2} | rougeL={:.2}",
                    epoch + 1,
                    args.num_train_epochs,
                    self.state.global_step,
                    eval_loss,
                    metrics.as_ref().and_then(|m| m.get("eval_rouge1")).copied().unwrap_or(f64::NAN),
                    metrics.as_ref().and_then(|m| m.get("eval_rougeL")).copied().unwrap_or(f64::NAN),
                ),
                None => println!(
                    "Epoch {:>3}/{} | step={}",
                    epoch + 1, args.num_train_epochs, self.state.global_step
                ),
            }
        }

        if args.load_best_model_at_end {
            if let Some(best) = self.state.best_model_checkpoint.clone() {
                tracing::info!(
                    "Loading best model from '{}' (score: {:?})",
                    best.display(),
                    self.state.best_metric
                );
                model = checkpoint::load_weights(model, &best.join(WEIGHTS_FILE), &self.device)?;
            }
        }
        self.model = model;

        let training_loss = if self.state.global_step > 0 {
            loss_total / self.state.global_step as f64
        } else {
            0.0
        };
        let runtime = started.elapsed().as_secs_f64();
        let metrics = BTreeMap::from([
            ("train_runtime".to_string(), runtime),
            ("train_loss".to_string(), training_loss),
            ("train_samples_per_second".to_string(), (n_train * args.num_train_epochs) as f64 / runtime.max(1e-9)),
            ("epoch".to_string(), self.state.epoch),
        ]);
        self.state.log(metrics.clone());

        tracing::info!("Training complete in {runtime:.1}s (train_loss={training_loss:.4})");
        Ok(TrainOutput { global_step: self.state.global_step, training_loss, metrics })
    }

    /// Evaluate the current (possibly best-reloaded) model.
    pub fn evaluate(&mut self) -> Result<BTreeMap<String, f64>> {
        let model = self.model.valid();
        self.evaluate_model(&model)
    }

    fn evaluate_and_save(
        &mut self,
        model:    &Seq2SeqModel<B>,
        eval_now: bool,
        save_now: bool,
    ) -> Result<Option<BTreeMap<String, f64>>> {
        let metrics = if eval_now {
            Some(self.evaluate_model(&model.valid())?)
        } else {
            None
        };
        if save_now {
            self.save_checkpoint(model)?;
        }
        Ok(metrics)
    }

    fn evaluate_model(&mut self, model: &Seq2SeqModel<B::InnerBackend>) -> Result<BTreeMap<String, f64>> {
        let Some(dataset) = self.eval_dataset.clone() else {
            bail!("no evaluation dataset");
        };
        let started = Instant::now();

        let batcher = Seq2SeqBatcher::<B::InnerBackend>::new(
            self.device.clone(),
            self.config.pad_token_id,
            self.config.decoder_start(),
        );
        let loader = DataLoaderBuilder::new(batcher)
            .batch_size(self.args.per_device_eval_batch_size)
            .num_workers(1)
            .build(dataset.clone());

        let max_length = self.args.generation_max_length.unwrap_or(self.config.max_length);
        let mut loss_sum   = 0.0f64;
        let mut batches    = 0usize;
        let mut prediction = EvalPrediction::default();

        for batch in loader.iter() {
            let (loss, _) = model.forward_loss(&batch);
            loss_sum += loss.into_scalar().elem::<f64>();
            batches  += 1;

            if self.args.predict_with_generate {
                let generated = greedy_generate(
                    model,
                    &self.config,
                    batch.input_ids.clone(),
                    batch.attention_mask.clone(),
                    max_length,
                )?;
                prediction.predictions.extend(generated);
                prediction.labels.extend(batch.label_rows);
            }
        }

        let mut metrics = BTreeMap::new();
        metrics.insert(
            "eval_loss".to_string(),
            if batches > 0 { loss_sum / batches as f64 } else { f64::NAN },
        );

        if self.args.predict_with_generate {
            if let Some(callback) = &self.compute_metrics {
                for (k, v) in callback.compute(&prediction)? {
                    metrics.insert(format!("eval_{k}"), v);
                }
            }
        }

        let runtime = started.elapsed().as_secs_f64();
        metrics.insert("eval_runtime".to_string(), runtime);
        metrics.insert(
            "eval_samples_per_second".to_string(),
            dataset.example_count() as f64 / runtime.max(1e-9),
        );

        let (sum, steps) = std::mem::take(&mut self.loss_since_eval);
        let record = EvalRecord {
            step:       self.state.global_step,
            epoch:      self.state.epoch,
            train_loss: (steps > 0).then(|| sum / steps as f64),
            metrics:    metrics.clone(),
        };
        if let Some(best) = self.state.best_metric {
            if record.is_improvement(best) {
                tracing::info!("eval_loss improved on {best:.4}");
            }
        }
        self.logger.log(&record)?;
        self.state.log(metrics.clone());

        tracing::info!("Evaluation at step {}: {:?}", self.state.global_step, metrics);
        Ok(metrics)
    }

    fn save_checkpoint(&mut self, model: &Seq2SeqModel<B>) -> Result<PathBuf> {
        let name = format!("{CHECKPOINT_PREFIX}{}", self.state.global_step);
        let path = self.checkpoints.dir().join(&name);

        // Best is judged on the most recent evaluation, before state is written.
        let key = self.args.best_metric_key();
        if let Some(score) = self.state.last_eval().and_then(|e| e.values.get(&key)).copied() {
            if self.args.is_better(score, self.state.best_metric) {
                self.state.best_metric = Some(score);
                self.state.best_model_checkpoint = Some(path.clone());
            }
        }

        let saved = self.checkpoints.save_checkpoint(
            model,
            &self.config,
            &self.tokenizer,
            &self.args,
            &self.state,
        )?;
        self.checkpoints
            .rotate(self.args.save_total_limit, self.state.best_model_checkpoint.as_deref())?;

        self.push_checkpoint(&saved, &name);
        Ok(saved)
    }

    /// Push on save according to the hub strategy. Failures are logged,
    /// not fatal: the checkpoint is already on disk.
    fn push_checkpoint(&self, path: &Path, name: &str) {
        if !self.args.push_to_hub {
            return;
        }
        let (Some(hub), Some(strategy)) = (&self.hub, self.args.hub_strategy) else {
            return;
        };
        if let Err(e) = push_saved_checkpoint(hub, strategy, path, name) {
            tracing::warn!("Hub push of '{name}' failed: {e}");
        }
    }

    /// Write the final model (weights, config, tokenizer, args) to `dir`.
    pub fn save_model(&self, dir: &Path) -> Result<()> {
        checkpoint::save_pretrained(dir, &self.model, &self.config, &self.tokenizer, &self.args)?;
        tracing::info!("Model saved to '{}'", dir.display());
        Ok(())
    }
}

/// Upload a freshly saved checkpoint as `strategy` asks: its files go to
/// the repository root, and for `checkpoint` / `all_checkpoints` also to
/// `last-checkpoint/` or `checkpoint-<step>/`. Returns the files sent.
pub(crate) fn push_saved_checkpoint(
    hub:      &HubClient,
    strategy: HubStrategy,
    path:     &Path,
    name:     &str,
) -> Result<usize, HubError> {
    if !strategy.pushes_on_save() {
        return Ok(0);
    }
    let mut sent = hub.upload_folder(path, None)?;
    if let Some(folder) = strategy.checkpoint_folder(name) {
        sent += hub.upload_folder(path, Some(&folder))?;
    }
    Ok(sent)
}
