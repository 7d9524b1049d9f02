// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From a dataset directory on disk to padded tensor batches:
//
//   dataset dir (*.jsonl / *.json)
//       │
//       ▼
//   DiskDatasetLoader → reads and checks every record
//       │
//       ▼
//   Seq2SeqDataset    → implements Burn's Dataset trait
//       │
//       ▼
//   Seq2SeqBatcher    → pads per batch, shifts labels right
//       │
//       ▼
//   DataLoader        → feeds batches to the trainer
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads pre-tokenised dataset directories
pub mod loader;

/// Implements Burn's Dataset trait for seq2seq examples
pub mod dataset;

/// Dynamic padding collator (Burn Batcher)
pub mod batcher;
