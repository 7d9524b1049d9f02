// ============================================================
// Evaluation Metrics
// ============================================================
//   rouge.rs   — ROUGE-1/2/L/Lsum scorer with optional stemming
//   compute.rs — the metrics callback the trainer calls after
//                each generating evaluation

pub mod rouge;

pub mod compute;
