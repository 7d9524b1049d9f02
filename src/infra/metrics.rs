// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per evaluation to <logging_dir>/metrics.csv
// so learning curves can be plotted after the run.
//
// Example:
//   step,epoch,train_loss,loss,rouge1,rouge2,rougeL,rougeLsum,gen_len,runtime
//   120,1.0000,3.124500,3.089200,21.420000,6.130000,18.900000,19.010000,31.500000,12.400000
//   240,2.0000,2.890100,2.854300,24.870000,8.220000,21.760000,21.800000,29.250000,11.900000
//
// Empty cells mean the metric was not computed (e.g. ROUGE when
// evaluation ran without generation).

use anyhow::{Context, Result};
use std::{
    collections::BTreeMap,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

const COLUMNS: [&str; 7] = [
    "eval_loss",
    "eval_rouge1",
    "eval_rouge2",
    "eval_rougeL",
    "eval_rougeLsum",
    "eval_gen_len",
    "eval_runtime",
];

/// One row of metrics for a single evaluation.
#[derive(Debug, Clone)]
pub struct EvalRecord {
    pub step:       usize,
    pub epoch:      f64,
    /// Mean training loss since the previous evaluation
    pub train_loss: Option<f64>,
    pub metrics:    BTreeMap<String, f64>,
}

impl EvalRecord {
    /// Returns true if this evaluation improved over the previous best eval_loss
    pub fn is_improvement(&self, best_eval_loss: f64) -> bool {
        self.metrics
            .get("eval_loss")
            .is_some_and(|&loss| loss < best_eval_loss)
    }

    fn to_csv_row(&self) -> String {
        let cell = |v: Option<f64>| v.map(|v| format!("{v:.6}")).unwrap_or_default();
        let mut row = vec![self.step.to_string(), format!("{:.4}", self.epoch), cell(self.train_loss)];
        row.extend(COLUMNS.iter().map(|c| cell(self.metrics.get(*c).copied())));
        row.join(",")
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create the logging directory and write the CSV header if the file is new.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create logging directory '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            let header: Vec<&str> = ["step", "epoch", "train_loss"]
                .into_iter()
                .chain(COLUMNS.iter().map(|c| c.trim_start_matches("eval_")))
                .collect();
            writeln!(f, "{}", header.join(","))?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, record: &EvalRecord) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;
        writeln!(f, "{}", record.to_csv_row())?;

        tracing::debug!("Logged evaluation at step {}", record.step);
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(loss: f64) -> EvalRecord {
        EvalRecord {
            step:       10,
            epoch:      1.0,
            train_loss: Some(2.5),
            metrics:    BTreeMap::from([
                ("eval_loss".to_string(), loss),
                ("eval_rouge1".to_string(), 30.5),
            ]),
        }
    }

    #[test]
    fn test_is_improvement() {
        let r = record(2.3);
        assert!(r.is_improvement(3.0));
        assert!(!r.is_improvement(2.0));
    }

    #[test]
    fn test_appends_rows_under_header() {
        let dir    = TempDir::new().unwrap();
        let logger = MetricsLogger::new(&dir.path().join("logs")).unwrap();
        logger.log(&record(2.3)).unwrap();
        logger.log(&record(2.1)).unwrap();

        let text  = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "step,epoch,train_loss,loss,rouge1,rouge2,rougeL,rougeLsum,gen_len,runtime"
        );
        assert_eq!(lines[1], "10,1.0000,2.500000,2.300000,30.500000,,,,,");
    }
}
