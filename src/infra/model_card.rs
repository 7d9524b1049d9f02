// ============================================================
// Layer 6 — Model Card
// ============================================================
// README.md pushed with the model: YAML front matter the hub
// indexes, then the hyperparameters and a results table built
// from the evaluation log.

use std::collections::BTreeMap;
use std::path::Path;

use crate::infra::hub::split_repo_id;
use crate::ml::state::LogEntry;
use crate::ml::training_args::TrainingArguments;

pub struct ModelCard {
    pub model_name:  String,
    pub base_model:  String,
    pub hyperparams: Vec<(String, String)>,
    pub eval_log:    Vec<LogEntry>,
}

impl ModelCard {
    pub fn new(model_name: &str, base_model: &str, args: &TrainingArguments, history: &[LogEntry]) -> Self {
        let hyperparams = vec![
            ("learning_rate", args.learning_rate.to_string()),
            ("train_batch_size", args.per_device_train_batch_size.to_string()),
            ("eval_batch_size", args.per_device_eval_batch_size.to_string()),
            ("seed", args.seed.to_string()),
            ("optimizer", format!("AdamW with weight_decay={}", args.weight_decay)),
            ("lr_scheduler_type", "linear".to_string()),
            ("num_epochs", args.num_train_epochs.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            model_name:  model_name.to_string(),
            base_model:  base_model.to_string(),
            hyperparams,
            eval_log:    history.iter().filter(|e| e.is_eval()).cloned().collect(),
        }
    }

    /// Whether the base model names a hub repository rather than a local directory.
    fn base_is_repo_id(&self) -> bool {
        let base = self.base_model.as_str();
        !base.starts_with(['/', '.', '~'])
            && split_repo_id(base).is_ok()
            && !Path::new(base).exists()
    }

    /// Final (last) evaluation metrics, without the `eval_` prefix.
    fn final_metrics(&self) -> BTreeMap<String, f64> {
        self.eval_log
            .last()
            .map(|e| {
                e.values
                    .iter()
                    .map(|(k, v)| (k.trim_start_matches("eval_").to_string(), *v))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        let on_hub = self.base_is_repo_id();

        md.push_str("---\n");
        if on_hub {
            md.push_str(&format!("base_model: {}\n", self.base_model));
        }
        md.push_str("tags:\n- generated_from_trainer\n- summarization\n- medical\n");
        md.push_str("metrics:\n- rouge\n");
        md.push_str(&format!("model-index:\n- name: {}\n  results: []\n", self.model_name));
        md.push_str("---\n\n");

        md.push_str(&format!("# {}\n\n", self.model_name));
        let base = if on_hub {
            format!("[{0}](https://huggingface.co/{0})", self.base_model)
        } else {
            format!("`{}`", self.base_model)
        };
        md.push_str(&format!(
            "This model is a fine-tuned version of {base} on a medical summarization dataset.\n"
        ));

        let final_metrics = self.final_metrics();
        if !final_metrics.is_empty() {
            md.push_str("It achieves the following results on the evaluation set:\n");
            for (k, v) in &final_metrics {
                md.push_str(&format!("- {k}: {v:.4}\n"));
            }
        }

        md.push_str("\n## Training hyperparameters\n\n");
        for (k, v) in &self.hyperparams {
            md.push_str(&format!("- {k}: {v}\n"));
        }

        if let Some(first) = self.eval_log.first() {
            let columns: Vec<&String> = first.values.keys().collect();

            md.push_str("\n## Training results\n\n| Epoch | Step |");
            for c in &columns {
                md.push_str(&format!(" {} |", c.trim_start_matches("eval_")));
            }
            md.push_str("\n|-------|------|");
            for _ in &columns {
                md.push_str("----------|");
            }
            md.push('\n');

            for entry in &self.eval_log {
                md.push_str(&format!("| {:.1} | {} |", entry.epoch, entry.step));
                for c in &columns {
                    match entry.values.get(*c) {
                        Some(v) => md.push_str(&format!(" {v:.4} |")),
                        None => md.push_str(" - |"),
                    }
                }
                md.push('\n');
            }
        }

        md
    }
}
