// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types shared by every other layer.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - Only plain structs, enums, and traits

// A pre-tokenised source/target example
pub mod example;

// Evaluation / save / hub-push strategies
pub mod strategy;

// Argument validation errors
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
