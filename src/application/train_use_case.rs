// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 0: Validate the configuration
//   Step 1: Load vocabulary            (Layer 3 - domain)
//   Step 2: Load pretrained embeddings (Layer 4 - data)
//   Step 3: Load + tokenize corpus     (Layer 4 - data)
//   Step 4: Build sliding-window set   (Layer 4 - data)
//   Step 5: Save config                (Layer 6 - infra)
//   Step 6: Wire checkpoint sync       (Layer 6 - infra)
//   Step 7: Run training loop          (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::corpus::{load_corpus, AUX_DIM};
use crate::data::dataset::SequenceDataset;
use crate::data::embeddings::EmbeddingTable;
use crate::domain::vocabulary::Vocabulary;
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::MetricsLogger;
use crate::infra::sync::{is_remote_target, CheckpointSynchronizer, UnimplementedRemoteStore};
use crate::ml::model::LanguageModelConfig;
use crate::ml::trainer::{run_training, TrainBackend};

// ─── Training Configuration ──────────────────────────────────────────────────
// All knobs for a training run. Serialisable so it can be saved to
// disk and reloaded by the sample use case to rebuild the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub vocab_file: String,
    pub vocab_is_lowercase: bool,
    pub embedding_file: String,
    pub embedding_dim: usize,
    pub seqlen: usize,
    pub vocab_size: usize,
    pub sample_size: usize,
    pub lstm_size: usize,
    pub dense_size: usize,
    pub dense_layers: usize,
    pub dropout_rate: f64,
    pub learning_rate_initial: f64,
    pub learning_rate_decay_rate: f64,
    pub learning_rate_decay_period: usize,
    pub batch_size: usize,
    pub checkpoint_dir: String,
    pub starting_model_file: Option<String>,
    pub training_data_dir: String,
    pub num_epochs: usize,
    pub starting_epoch: usize,
    pub epochs_per_dataset: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            vocab_file: "data/vocab.txt".to_string(),
            vocab_is_lowercase: true,
            embedding_file: "data/glove.6B.300d.txt".to_string(),
            embedding_dim: 300,
            seqlen: 64,
            vocab_size: 10000,
            sample_size: 10,
            lstm_size: 256,
            dense_size: 256,
            dense_layers: 5,
            dropout_rate: 0.1,
            learning_rate_initial: 0.01,
            learning_rate_decay_rate: 0.97,
            learning_rate_decay_period: 10,
            batch_size: 128,
            checkpoint_dir: "checkpoints".to_string(),
            starting_model_file: None,
            training_data_dir: "data/corpus".to_string(),
            num_epochs: 5,
            starting_epoch: 0,
            epochs_per_dataset: 32,
        }
    }
}

impl TrainConfig {
    /// Model architecture derived from the run configuration and
    /// the actual (possibly truncated) vocabulary size. The stack
    /// is two LSTM layers of the same width, matching the shape
    /// the checkpoints are named after.
    pub fn model_config(&self, vocab_slots: usize) -> LanguageModelConfig {
        LanguageModelConfig::new(
            vocab_slots,
            self.seqlen,
            self.embedding_dim,
            AUX_DIM,
            vec![self.lstm_size, self.lstm_size],
            self.dense_size,
            self.dense_layers,
            self.dropout_rate,
        )
    }

    /// Checkpoint file name encoding the shape-defining knobs, so
    /// checkpoints from different configurations never collide.
    /// No dots: the recorder appends the file extension itself.
    pub fn checkpoint_filename(&self) -> String {
        format!(
            "weights-lstm{}-batch{}-emb{}-sample{}-vocab{}",
            self.lstm_size, self.batch_size, self.embedding_dim,
            self.sample_size, self.vocab_size
        )
    }

    /// Full checkpoint target: `checkpoint_dir` joined with the
    /// file name, preserving a scheme:// prefix when present.
    pub fn checkpoint_target(&self) -> String {
        let filename = self.checkpoint_filename();
        if is_remote_target(&self.checkpoint_dir) {
            format!("{}/{}", self.checkpoint_dir.trim_end_matches('/'), filename)
        } else {
            Path::new(&self.checkpoint_dir)
                .join(filename)
                .to_string_lossy()
                .into_owned()
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;

        // ── Step 0: Validate the configuration ───────────────────────────────
        // Surface bad knob values as configuration errors before any
        // file is touched, instead of a panic deep in the batcher.
        ensure!(
            cfg.sample_size >= 1,
            "sample_size must be at least 1: the positive candidate always takes one slot"
        );
        ensure!(cfg.batch_size >= 1, "batch_size must be at least 1");

        // ── Step 1: Vocabulary ───────────────────────────────────────────────
        let vocab = Vocabulary::load(&cfg.vocab_file, cfg.vocab_size, cfg.vocab_is_lowercase)?;

        // ── Step 2: Pretrained embeddings, aligned to the vocabulary ────────
        let embeddings = EmbeddingTable::load(&vocab, cfg.embedding_dim, &cfg.embedding_file)?;

        // ── Step 3: Corpus, front-padded by one window ───────────────────────
        let corpus = load_corpus(&cfg.training_data_dir, &vocab, cfg.seqlen)?;

        // ── Step 4: Sliding-window dataset ───────────────────────────────────
        let dataset = SequenceDataset::new(corpus, cfg.seqlen);

        // ── Step 5: Persist the config for the sample use case ───────────────
        // For remote targets there is no local checkpoint dir to
        // write into; config and metrics go next to the staging
        // area instead.
        let local_dir: PathBuf = if is_remote_target(&cfg.checkpoint_dir) {
            let dir = std::env::temp_dir().join("word-seq-lm-run");
            tracing::warn!(
                "Remote checkpoint target: config and metrics are kept locally at '{}'",
                dir.display()
            );
            dir
        } else {
            PathBuf::from(&cfg.checkpoint_dir)
        };
        CheckpointManager::save_config(&local_dir, cfg)?;

        // ── Step 6: Checkpoint target + synchronizer ─────────────────────────
        let target = cfg.checkpoint_target();
        tracing::info!("Checkpoint target: {}", target);
        let sync = CheckpointSynchronizer::new(
            &target,
            true, // save-best-only, monitoring training loss
            Box::new(UnimplementedRemoteStore),
        )?;

        // ── Step 7: Train ────────────────────────────────────────────────────
        let model_cfg = cfg.model_config(vocab.total_slots());
        let mut observer = MetricsLogger::new(local_dir)?;
        let device = burn::backend::wgpu::WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        run_training::<TrainBackend>(
            cfg, model_cfg, dataset, &embeddings, sync, &mut observer, &device,
        )?;

        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sample_size_is_a_config_error_not_a_panic() {
        let mut cfg = TrainConfig::default();
        cfg.sample_size = 0;
        // Validation must reject the run before this path is touched
        cfg.vocab_file = "does-not-exist.txt".to_string();

        let err = TrainUseCase::new(cfg).execute().unwrap_err();
        assert!(err.to_string().contains("sample_size"));
    }

    #[test]
    fn checkpoint_target_preserves_remote_scheme() {
        let mut cfg = TrainConfig::default();
        cfg.checkpoint_dir = "gs://bucket/models/".to_string();
        let target = cfg.checkpoint_target();
        assert!(target.starts_with("gs://bucket/models/weights-lstm256"));
        assert!(!target.contains("//weights"));
    }

    #[test]
    fn checkpoint_filename_has_no_dots() {
        let cfg = TrainConfig::default();
        assert!(!cfg.checkpoint_filename().contains('.'));
    }

    #[test]
    fn model_config_uses_actual_vocab_slots() {
        let cfg = TrainConfig::default();
        let model_cfg = cfg.model_config(1234);
        assert_eq!(model_cfg.vocab_slots, 1234);
        assert_eq!(model_cfg.lstm_sizes, vec![256, 256]);
        assert_eq!(model_cfg.aux_dim, AUX_DIM);
    }
}
