// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem or the network:
//
//   checkpoint.rs      — weights + config + tokenizer per saved
//                        directory; checkpoint rotation
//   tokenizer_store.rs — load / save_pretrained / decode
//   pretrained.rs      — resolve --model-name to local files,
//                        downloading from the hub if needed
//   metrics.rs         — per-evaluation CSV under logging_dir
//   hub.rs             — model hub REST client
//   model_card.rs      — README.md for the pushed model
//
// Reference: Burn Book §5 (Checkpointing)

/// Model checkpoint saving, loading, and rotation
pub mod checkpoint;

/// Tokenizer loading, saving, and decoding
pub mod tokenizer_store;

/// Pretrained checkpoint resolution
pub mod pretrained;

/// Evaluation metrics CSV logger
pub mod metrics;

/// Model hub client
pub mod hub;

/// Model card generation
pub mod model_card;
