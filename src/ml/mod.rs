// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// The model, how it is trained, and how it generates.
//
//   model.rs          — encoder-decoder transformer with a shared
//                       token embedding and an LM head; computes
//                       the label-masked cross-entropy loss
//   generate.rs       — greedy decoding for predict-with-generate
//   training_args.rs  — every knob of one training run + checks
//   state.rs          — global step, log history, best checkpoint
//   trainer.rs        — train / evaluate / save loop
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need
//            Raffel et al. (2020) T5

/// Encoder-decoder transformer architecture
pub mod model;

/// Greedy autoregressive generation
pub mod generate;

/// Training run arguments and their validation
pub mod training_args;

/// Trainer state and log history
pub mod state;

/// Training loop with evaluation, checkpointing and hub pushes
pub mod trainer;
