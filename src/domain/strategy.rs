// ============================================================
// Layer 3 — Strategies
// ============================================================
// When the trainer evaluates / saves, and what it pushes to the
// hub while training. Both parse from the same strings the
// command line accepts ("epoch", "every_save", ...).

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Interval at which evaluation or checkpointing happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalStrategy {
    No,
    Steps,
    Epoch,
}

impl IntervalStrategy {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, IntervalStrategy::No)
    }

    /// True when a step-based interval fires at `global_step`.
    pub fn fires_on_step(&self, global_step: usize, every: usize) -> bool {
        matches!(self, IntervalStrategy::Steps) && every > 0 && global_step % every == 0
    }

    pub fn fires_on_epoch_end(&self) -> bool {
        matches!(self, IntervalStrategy::Epoch)
    }
}

impl FromStr for IntervalStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "no" | "none" => Ok(IntervalStrategy::No),
            "steps"       => Ok(IntervalStrategy::Steps),
            "epoch"       => Ok(IntervalStrategy::Epoch),
            other => Err(format!("unknown interval strategy '{other}' (expected no, steps or epoch)")),
        }
    }
}

impl fmt::Display for IntervalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntervalStrategy::No    => write!(f, "no"),
            IntervalStrategy::Steps => write!(f, "steps"),
            IntervalStrategy::Epoch => write!(f, "epoch"),
        }
    }
}

/// What gets pushed to the hub, and when, while training runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HubStrategy {
    /// Push only once, after training.
    End,
    /// Push the model files every time a checkpoint is saved.
    EverySave,
    /// Like `EverySave`, plus the latest checkpoint under `last-checkpoint/`.
    Checkpoint,
    /// Like `EverySave`, plus every checkpoint under its own folder.
    AllCheckpoints,
}

impl HubStrategy {
    /// Repository folder the checkpoint itself goes to, if any.
    pub fn checkpoint_folder(&self, checkpoint_name: &str) -> Option<String> {
        match self {
            HubStrategy::Checkpoint     => Some("last-checkpoint".to_string()),
            HubStrategy::AllCheckpoints => Some(checkpoint_name.to_string()),
            HubStrategy::End | HubStrategy::EverySave => None,
        }
    }

    pub fn pushes_on_save(&self) -> bool {
        !matches!(self, HubStrategy::End)
    }
}

impl FromStr for HubStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "end"             => Ok(HubStrategy::End),
            "every_save"      => Ok(HubStrategy::EverySave),
            "checkpoint"      => Ok(HubStrategy::Checkpoint),
            "all_checkpoints" => Ok(HubStrategy::AllCheckpoints),
            other => Err(format!(
                "unknown hub strategy '{other}' (expected end, every_save, checkpoint or all_checkpoints)"
            )),
        }
    }
}

impl fmt::Display for HubStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HubStrategy::End            => "end",
            HubStrategy::EverySave      => "every_save",
            HubStrategy::Checkpoint     => "checkpoint",
            HubStrategy::AllCheckpoints => "all_checkpoints",
        };
        f.write_str(s)
    }
}
