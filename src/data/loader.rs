// ============================================================
// Layer 4 — Dataset Loader
// ============================================================
// Loads a pre-tokenised dataset directory from disk.
//
// Directory layout:
//   train/
//     part-00000.jsonl   ← one JSON record per line
//     part-00001.jsonl
//     extra.json         ← or a JSON array of records
//
// Files are read in file-name order so shard order is stable.
// Each record needs `input_ids` and `labels`; `attention_mask`
// is optional and any other column (raw text, ids, ...) is
// ignored.
//
// A missing or empty dataset is a hard error.

use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::example::Seq2SeqExample;
use crate::domain::traits::ExampleSource;

/// Loads every example from a dataset directory.
pub struct DiskDatasetLoader {
    dir: PathBuf,
}

impl DiskDatasetLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Data files in the directory, sorted by name.
    fn data_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot read dataset directory '{}'", self.dir.display()))?
        {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            match path.extension().and_then(|e| e.to_str()) {
                Some("jsonl") | Some("json") => files.push(path),
                _ => tracing::debug!("Ignoring non-data file '{}'", path.display()),
            }
        }
        files.sort();
        Ok(files)
    }
}

impl ExampleSource for DiskDatasetLoader {
    fn load_all(&self) -> Result<Vec<Seq2SeqExample>> {
        if !self.dir.is_dir() {
            bail!("Dataset directory '{}' does not exist", self.dir.display());
        }

        let files = self.data_files()?;
        if files.is_empty() {
            bail!(
                "Dataset directory '{}' contains no .jsonl or .json files",
                self.dir.display()
            );
        }

        let mut examples = Vec::new();
        for file in &files {
            let before = examples.len();
            match file.extension().and_then(|e| e.to_str()) {
                Some("jsonl") => load_jsonl(file, &mut examples)?,
                _             => load_json_array(file, &mut examples)?,
            }
            tracing::debug!("Loaded {} examples from '{}'", examples.len() - before, file.display());
        }

        if examples.is_empty() {
            bail!("Dataset directory '{}' has no examples", self.dir.display());
        }
        Ok(examples)
    }
}

fn load_jsonl(path: &Path, out: &mut Vec<Seq2SeqExample>) -> Result<()> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;

    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let example: Seq2SeqExample = serde_json::from_str(line)
            .with_context(|| format!("Malformed record at {}:{}", path.display(), idx + 1))?;
        example
            .check()
            .map_err(|e| anyhow::anyhow!("Invalid record at {}:{}: {e}", path.display(), idx + 1))?;
        out.push(example);
    }
    Ok(())
}

fn load_json_array(path: &Path, out: &mut Vec<Seq2SeqExample>) -> Result<()> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    let records: Vec<Seq2SeqExample> = serde_json::from_str(&text)
        .with_context(|| format!("'{}' is not a JSON array of records", path.display()))?;

    for (idx, example) in records.into_iter().enumerate() {
        example
            .check()
            .map_err(|e| anyhow::anyhow!("Invalid record #{} in {}: {e}", idx, path.display()))?;
        out.push(example);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_loads_shards_in_name_order() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("b.jsonl"),
            r#"{"input_ids":[7,8],"labels":[9,1]}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("a.jsonl"),
            "{\"input_ids\":[3],\"labels\":[4,1],\"text\":\"ignored\"}\n\n{\"input_ids\":[5],\"attention_mask\":[1],\"labels\":[6]}\n",
        )
        .unwrap();
        fs::write(dir.path().join("dataset_info.txt"), "not data").unwrap();

        let examples = DiskDatasetLoader::new(dir.path()).load_all().unwrap();
        assert_eq!(examples.len(), 3);
        assert_eq!(examples[0].input_ids, vec![3]);
        assert_eq!(examples[1].attention_mask, Some(vec![1]));
        assert_eq!(examples[2].labels, vec![9, 1]);
    }

    #[test]
    fn test_loads_json_array() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("data.json"),
            r#"[{"input_ids":[3],"labels":[4]},{"input_ids":[5,6],"labels":[-100,7]}]"#,
        )
        .unwrap();
        let examples = DiskDatasetLoader::new(dir.path()).load_all().unwrap();
        assert_eq!(examples.len(), 2);
    }

    #[test]
    fn test_missing_directory_is_error() {
        let err = DiskDatasetLoader::new("/definitely/not/here").load_all().unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_directory_without_data_files_is_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("state.txt"), "{}").unwrap();
        assert!(DiskDatasetLoader::new(dir.path()).load_all().is_err());
    }

    #[test]
    fn test_bad_record_names_file_and_line() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("train.jsonl"),
            "{\"input_ids\":[3],\"labels\":[4]}\n{\"input_ids\":[],\"labels\":[4]}\n",
        )
        .unwrap();
        let err = DiskDatasetLoader::new(dir.path()).load_all().unwrap_err();
        assert!(err.to_string().contains("train.jsonl:2"), "{err}");
    }

    #[test]
    fn test_fully_masked_record_names_file_and_line() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("valid.jsonl"),
            "{\"input_ids\":[3,4],\"labels\":[4]}\n\n{\"input_ids\":[3,4],\"attention_mask\":[0,0],\"labels\":[4]}\n",
        )
        .unwrap();
        let err = DiskDatasetLoader::new(dir.path()).load_all().unwrap_err();
        assert!(err.to_string().contains("valid.jsonl:3"), "{err}");
        assert!(err.to_string().contains("attention_mask"), "{err}");
    }
}
