// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Core vocabulary type shared by data loading, the model and
// inference. No I/O frameworks, no tensors — plain Rust.

pub mod vocabulary;
