// ============================================================
// Layer 2 — SampleUseCase
// ============================================================
// Loads a trained checkpoint, rebuilds the exact architecture from
// the persisted train_config.json and derives the full-vocabulary
// inference model.
//
// What it deliberately does NOT do: generate text. The decoding
// strategy (greedy, beam, interactive) is an open product decision;
// until it is made, this command validates the checkpoint, reports
// the inference model's shape and exits with an explicit
// "unimplemented" error instead of silently doing nothing.

use anyhow::{bail, Result};
use std::path::Path;

use crate::data::embeddings::EmbeddingTable;
use crate::domain::vocabulary::Vocabulary;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::predictor::Predictor;

pub struct SampleConfig {
    pub vocab_file: String,
    pub vocab_is_lowercase: bool,
    pub embedding_file: String,
    pub embedding_dim: usize,
    pub checkpoint_dir: String,
    pub model_file: String,
}

pub struct SampleUseCase {
    config: SampleConfig,
}

impl SampleUseCase {
    pub fn new(config: SampleConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;

        // Rebuild the same resources training used
        let train_cfg = CheckpointManager::load_config(&cfg.checkpoint_dir)?;
        let vocab =
            Vocabulary::load(&cfg.vocab_file, train_cfg.vocab_size, cfg.vocab_is_lowercase)?;
        let embeddings = EmbeddingTable::load(&vocab, cfg.embedding_dim, &cfg.embedding_file)?;

        let model_cfg = train_cfg.model_config(vocab.total_slots());
        let device = burn::backend::wgpu::WgpuDevice::default();
        let predictor = Predictor::<burn::backend::Wgpu>::from_checkpoint(
            &model_cfg,
            Path::new(&cfg.model_file),
            &embeddings,
            vocab,
            &device,
        )?;

        tracing::info!(
            "Inference model ready: output width {} ({} vocabulary slots + aux)",
            predictor.output_width(),
            model_cfg.vocab_slots
        );

        bail!(
            "the `sample` subcommand's decoding strategy is not implemented yet; \
             the checkpoint loaded and the inference model was built successfully"
        )
    }
}
