// ============================================================
// Layer 5 — Predictor
// ============================================================
// Rebuilds a trained model from its checkpoint and exposes the
// full-vocabulary inference view. The embedding table is a module
// constant (not in the record), so the same embedding file used
// for training must be supplied here.
//
// Generic over the backend: the sample use case runs it on WGPU,
// tests on NdArray.

use anyhow::{ensure, Result};
use burn::prelude::*;
use std::path::Path;

use crate::data::corpus::AUX_DIM;
use crate::data::embeddings::EmbeddingTable;
use crate::domain::vocabulary::Vocabulary;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::{InferenceModel, LanguageModelConfig};

pub struct Predictor<B: Backend> {
    inference: InferenceModel<B>,
    vocab: Vocabulary,
    device: B::Device,
}

impl<B: Backend> Predictor<B> {
    /// Build the architecture from `model_cfg`, restore trained
    /// weights from `weights_base` (path without the .mpk.gz
    /// extension) and derive the inference view.
    pub fn from_checkpoint(
        model_cfg: &LanguageModelConfig,
        weights_base: &Path,
        embeddings: &EmbeddingTable,
        vocab: Vocabulary,
        device: &B::Device,
    ) -> Result<Self> {
        let emb_tensor = embeddings.to_tensor::<B>(device);
        let model = model_cfg.init(emb_tensor, device)?;
        let model = CheckpointManager::load_weights(weights_base, model, device)?;
        tracing::info!("Model loaded from checkpoint '{}'", weights_base.display());

        Ok(Self {
            inference: model.inference_view(),
            vocab,
            device: device.clone(),
        })
    }

    pub fn output_width(&self) -> usize {
        self.inference.output_width()
    }

    /// Probabilities over the full vocabulary (plus the trailing
    /// aux predictions) for the next word after a seqlen window.
    ///
    /// `input_x`: seqlen token ids; `input_aux`: seqlen * AUX_DIM
    /// aux features, row-major.
    pub fn next_word_distribution(
        &self,
        input_x: &[u32],
        input_aux: &[f32],
    ) -> Result<Vec<f32>> {
        let seqlen = self.inference.seqlen();
        ensure!(
            input_x.len() == seqlen,
            "expected {} input tokens, got {}",
            seqlen, input_x.len()
        );
        ensure!(
            input_aux.len() == seqlen * AUX_DIM,
            "expected {} aux values, got {}",
            seqlen * AUX_DIM, input_aux.len()
        );

        let ids: Vec<i32> = input_x.iter().map(|&id| id as i32).collect();
        let x = Tensor::<B, 1, Int>::from_ints(ids.as_slice(), &self.device)
            .reshape([1, seqlen]);
        let aux = Tensor::<B, 1>::from_floats(input_aux, &self.device)
            .reshape([1, seqlen, AUX_DIM]);

        let out = self.inference.forward(x, aux);
        Ok(out.into_data().to_vec().map_err(|e| anyhow::anyhow!("{e:?}"))?)
    }

    /// The most probable next word, skipping the padding slot.
    /// Returns None when the argmax lands on the unknown slot.
    pub fn most_likely_word(&self, distribution: &[f32]) -> Option<&str> {
        let vocab_width = self.vocab.total_slots();
        let best = distribution[1..vocab_width]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i as u32 + 1)?;
        self.vocab.word_of(best)
    }
}
