// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
//   checkpoint — best-only weight writer (atomic rename) + config files
//   sync       — cloud-aware checkpoint synchronizer
//   metrics    — epoch metrics, observer hook, CSV logger

pub mod checkpoint;
pub mod metrics;
pub mod sync;
