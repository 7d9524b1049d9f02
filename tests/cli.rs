use assert_cmd::Command;
use predicates::prelude::*;

/// The binary with every required directory given and no platform
/// environment leaking in. None of these paths exist: a test that gets
/// past validation would fail on them instead.
fn finetune() -> Command {
    let mut cmd = Command::cargo_bin("medsum-finetune").unwrap();
    for var in ["HF_TOKEN", "SM_OUTPUT_DATA_DIR", "SM_MODEL_DIR", "SM_CHANNEL_TRAIN", "SM_CHANNEL_VALID"] {
        cmd.env_remove(var);
    }
    cmd.args([
        "--model-name", "google/flan-t5-small",
        "--output-data-dir", "/nonexistent/output",
        "--model-dir", "/nonexistent/model",
        "--train-dir", "/nonexistent/train",
        "--valid-dir", "/nonexistent/valid",
        "--check-points-dir", "/nonexistent/checkpoints",
    ]);
    cmd
}

#[test]
fn push_to_hub_without_strategy_fails() {
    finetune()
        .args(["--push_to_hub", "true"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--hub_strategy is required when pushing to Hub"));
}

#[test]
fn push_to_hub_without_token_fails() {
    finetune()
        .args(["--push_to_hub", "--hub_strategy", "every_save"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--hub_token is required when pushing to Hub"));
}

#[test]
fn hub_push_without_token_fails() {
    finetune()
        .args(["--hub_push", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--hub_token is required when pushing to Hub"));
}

#[test]
fn unknown_arguments_are_ignored() {
    // Reaching the hub validation means the extra flags did not trip the parser.
    finetune()
        .args(["--sagemaker_program", "train.py", "--n_gpus=1", "--push_to_hub", "yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--hub_strategy is required when pushing to Hub"));
}

#[test]
fn invalid_learning_rate_is_rejected() {
    finetune()
        .args(["--learning-rate", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid learning rate"));
}

#[test]
fn mismatched_strategies_are_rejected_with_best_model() {
    finetune()
        .args(["--save-strategy", "steps"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--load-best-model-at-end"));
}

#[test]
fn unknown_strategy_value_is_a_usage_error() {
    finetune()
        .args(["--evaluation-strategy", "sometimes"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn model_name_is_required() {
    Command::cargo_bin("medsum-finetune")
        .unwrap()
        .env_remove("HF_TOKEN")
        .args(["--output-data-dir", "o", "--model-dir", "m", "--train-dir", "t", "--valid-dir", "v"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--model-name"));
}

#[test]
fn help_lists_hub_flags() {
    Command::cargo_bin("medsum-finetune")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--push_to_hub").and(predicate::str::contains("--hub_strategy")));
}
