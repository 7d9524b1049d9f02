// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Uses `clap` to parse
// the command line; all work is delegated to Layer 2.
//
// The hosting platform forwards every hyperparameter it was given,
// including ones this tool does not know. Unknown `--flags` are
// dropped with a warning before clap sees them (see
// retain_known_args).
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::collections::HashSet;
use std::ffi::OsString;

use commands::{HubArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "medsum-finetune",
    version,
    about = "Fine-tune a pretrained seq2seq model on medical summarization data."
)]
pub struct Cli {
    #[command(flatten)]
    pub train: TrainArgs,

    #[command(flatten)]
    pub hub: HubArgs,
}

impl Cli {
    /// Parse the process arguments, ignoring flags the tool does not define.
    pub fn parse_known() -> Self {
        let (args, dropped) = retain_known_args(std::env::args_os());
        for flag in dropped {
            tracing::warn!("Ignoring unknown argument '{flag}'");
        }
        Self::parse_from(args)
    }

    pub fn run(self) -> Result<()> {
        use crate::application::train_use_case::TrainUseCase;

        tracing::info!("Fine-tuning '{}'", self.train.model_name);

        let use_case = TrainUseCase::new(self.train.into(), self.hub.into());
        let report   = use_case.execute()?;

        println!(
            "Training complete ({} steps). Model saved to '{}'.",
            report.train.global_step,
            report.model_dir.display()
        );
        if let Some(url) = report.hub_url {
            println!("Model pushed to {url}");
        }
        Ok(())
    }
}

/// Split `args` (program name first) into the arguments clap should see and
/// the unknown `--flag`s that were removed. An unknown flag's value token,
/// if it has one, is dropped with it.
pub fn retain_known_args<I, T>(args: I) -> (Vec<OsString>, Vec<String>)
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let command = Cli::command();
    let mut known: HashSet<String> = command
        .get_arguments()
        .flat_map(|a| {
            a.get_long()
                .into_iter()
                .chain(a.get_all_aliases().unwrap_or_default())
                .map(str::to_string)
        })
        .collect();
    known.extend(["help".to_string(), "version".to_string()]);

    let mut kept    = Vec::new();
    let mut dropped = Vec::new();
    let mut iter    = args.into_iter().map(Into::into).peekable();

    if let Some(program) = iter.next() {
        kept.push(program);
    }

    while let Some(arg) = iter.next() {
        let text = arg.to_string_lossy().into_owned();
        let Some(long) = text.strip_prefix("--").filter(|l| !l.is_empty()) else {
            kept.push(arg);
            continue;
        };
        let (name, inline_value) = match long.split_once('=') {
            Some((name, _)) => (name, true),
            None => (long, false),
        };
        if known.contains(name) {
            kept.push(arg);
            continue;
        }

        if !inline_value {
            let takes_next = iter
                .peek()
                .map(|next| !next.to_string_lossy().starts_with("--"))
                .unwrap_or(false);
            if takes_next {
                iter.next();
            }
        }
        dropped.push(text);
    }

    (kept, dropped)
}
