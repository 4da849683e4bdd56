// ============================================================
// Layer 4 — Pretrained Embedding Loader
// ============================================================
// Parses a whitespace-delimited embedding text file (one
// "word f1 f2 .. fD" line per word, GloVe-style) into a dense
// table with one row per vocabulary slot.
//
// Row alignment:
//   row 0                → padding   (zero vector)
//   row id (1..=len)     → the word's pretrained vector
//   row len+1            → unknown   (zero vector)
//
// Words in the vocabulary but absent from the embedding file keep
// the zero fallback row. The table is frozen: the model never
// updates it during training.

use anyhow::{bail, Context, Result};
use burn::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::domain::vocabulary::Vocabulary;

/// A dense (total_slots, dim) matrix of pretrained word vectors,
/// stored row-major so it can be handed to the backend in one copy.
#[derive(Debug, Clone)]
pub struct EmbeddingTable {
    pub rows: usize,
    pub cols: usize,
    data: Vec<f32>,
}

impl EmbeddingTable {
    /// Load pretrained vectors for every vocabulary word found in `path`.
    pub fn load(vocab: &Vocabulary, dim: usize, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Cannot open embedding file '{}'", path.display()))?;

        let rows = vocab.total_slots();
        let mut data = vec![0.0f32; rows * dim];
        let mut found = 0usize;

        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line
                .with_context(|| format!("Read error in '{}' at line {}", path.display(), lineno + 1))?;
            let mut fields = line.split_whitespace();
            let Some(word) = fields.next() else { continue };

            // Skip words outside the (truncated) vocabulary without parsing floats
            if !vocab.contains(word) {
                continue;
            }
            let id = vocab.id_of(word) as usize;

            let row = &mut data[id * dim..(id + 1) * dim];
            let mut count = 0usize;
            for (i, field) in fields.enumerate() {
                if i >= dim {
                    bail!(
                        "Embedding file '{}' line {}: more than {} values for word '{}'",
                        path.display(), lineno + 1, dim, word
                    );
                }
                row[i] = field.parse::<f32>().with_context(|| {
                    format!("Embedding file '{}' line {}: bad float '{}'",
                        path.display(), lineno + 1, field)
                })?;
                count += 1;
            }
            if count != dim {
                bail!(
                    "Embedding file '{}' line {}: expected {} values for word '{}', got {}",
                    path.display(), lineno + 1, dim, word, count
                );
            }
            found += 1;
        }

        tracing::info!(
            "Loaded embeddings: {}/{} vocabulary words covered, dim={}",
            found, vocab.len(), dim
        );
        if found < vocab.len() {
            tracing::warn!(
                "{} vocabulary words have no pretrained vector (zero fallback)",
                vocab.len() - found
            );
        }

        Ok(Self { rows, cols: dim, data })
    }

    /// One row of the table, for tests and diagnostics
    pub fn row(&self, id: usize) -> &[f32] {
        &self.data[id * self.cols..(id + 1) * self.cols]
    }

    /// Copy the table onto a device as a (rows, cols) tensor.
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        Tensor::<B, 1>::from_floats(self.data.as_slice(), device)
            .reshape([self.rows, self.cols])
    }
}
