// ============================================================
// Layer 4 — Data Layer
// ============================================================
// Everything between raw files on disk and tensors on the device:
//
//   embeddings — pretrained "word f1 .. fD" table, vocabulary-aligned
//   corpus     — recursive text loader, word ids + aux features
//   dataset    — sliding-window Dataset over the token stream
//   batcher    — stacks samples into tensors and implements the
//                negative-sampling candidate-selection policy

pub mod batcher;
pub mod corpus;
pub mod dataset;
pub mod embeddings;
