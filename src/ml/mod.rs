// ============================================================
// Layer 5 — ML Layer
// ============================================================
//   sampling  — order-preserving candidate gather + small softmax
//   model     — LanguageModel (training graph) and InferenceModel view
//   schedule  — step-decay learning rate
//   trainer   — epoch loop with Adam, observer hook and checkpoint sync
//   predictor — rebuild a trained model for inference

pub mod model;
pub mod predictor;
pub mod sampling;
pub mod schedule;
pub mod trainer;
