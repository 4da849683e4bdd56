// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Single-threaded, synchronous epoch loop using Burn's DataLoader
// and Adam. One step = one SequenceBatch: forward, candidate loss,
// backward, parameter update. Nothing overlaps; the only pauses
// are batch reads, checkpoint writes and (cloud mode) uploads.
//
// Epoch length is decoupled from the dataset: one "epoch" is
// floor(epochs_per_dataset * |dataset| / batch_size) steps, so the
// learning-rate decay period stays meaningful on small corpora.
//
// The learning rate is fixed within an epoch and recomputed from
// the step-decay schedule at each epoch boundary using the
// absolute epoch number (resume-aware).
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{ensure, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    data::dataset::Dataset,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::batcher::SequenceBatcher;
use crate::data::dataset::SequenceDataset;
use crate::data::embeddings::EmbeddingTable;
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::{EpochMetrics, TrainingObserver};
use crate::infra::sync::CheckpointSynchronizer;
use crate::ml::model::LanguageModelConfig;
use crate::ml::schedule::step_decay;

/// Backend the CLI trains on. The loop itself is backend-generic
/// so tests can drive it on NdArray.
pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

pub fn run_training<B: AutodiffBackend>(
    cfg: &TrainConfig,
    model_cfg: LanguageModelConfig,
    dataset: SequenceDataset,
    embeddings: &EmbeddingTable,
    mut sync: CheckpointSynchronizer,
    observer: &mut dyn TrainingObserver,
    device: &B::Device,
) -> Result<()> {
    // The epoch loop spends its step budget one batch at a time; an
    // empty dataset never yields a batch, so it must be rejected
    // here rather than spin forever waiting for the first step.
    let dataset_len = dataset.len();
    ensure!(
        dataset_len > 0,
        "training data yields no {}-token windows, nothing to train on",
        cfg.seqlen
    );

    // ── Build model (shape validation happens here, not mid-train) ────────────
    let emb_tensor = embeddings.to_tensor::<B>(device);
    let mut model = model_cfg.init(emb_tensor, device)?;
    tracing::info!(
        "Model ready: lstm {:?}, dense {}x{}, vocab slots {}",
        model_cfg.lstm_sizes, model_cfg.dense_layers, model_cfg.dense_size,
        model_cfg.vocab_slots
    );

    // ── Optionally resume from an earlier checkpoint ──────────────────────────
    if let Some(path) = &cfg.starting_model_file {
        model = CheckpointManager::load_weights(path, model, device)?;
        tracing::info!("Resumed weights from '{}'", path);
    }

    // ── Adam optimiser ────────────────────────────────────────────────────────
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let optim_cfg = AdamConfig::new().with_epsilon(1e-8);
    let mut optim = optim_cfg.init();

    // ── Data loader with the negative-sampling batcher ────────────────────────
    let batcher = SequenceBatcher::<B>::new(
        device.clone(),
        cfg.sample_size,
        model_cfg.vocab_slots,
    );
    let loader = DataLoaderBuilder::new(batcher)
        .batch_size(cfg.batch_size)
        .shuffle(42)
        .num_workers(1)
        .build(dataset);

    let steps_per_epoch =
        ((cfg.epochs_per_dataset * dataset_len) / cfg.batch_size).max(1);
    tracing::info!(
        "{} samples, {} steps per epoch, batch size {}",
        dataset_len, steps_per_epoch, cfg.batch_size
    );

    if cfg.starting_epoch >= cfg.num_epochs {
        tracing::warn!(
            "starting_epoch {} >= num_epochs {}, nothing to train",
            cfg.starting_epoch, cfg.num_epochs
        );
        return Ok(());
    }

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in cfg.starting_epoch..cfg.num_epochs {
        let lr = step_decay(
            cfg.learning_rate_initial,
            cfg.learning_rate_decay_rate,
            cfg.learning_rate_decay_period,
            epoch,
        );

        let mut loss_sum = 0.0f64;
        let mut steps = 0usize;

        // The loader shuffles per pass; loop passes until the
        // epoch's step budget is spent.
        'epoch: loop {
            for batch in loader.iter() {
                if steps >= steps_per_epoch {
                    break 'epoch;
                }

                let loss = model.forward_loss(batch);
                let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
                loss_sum += loss_val;
                steps += 1;

                // Backward pass + Adam update
                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optim.step(lr, model, grads);
            }
        }

        let avg_loss = if steps > 0 { loss_sum / steps as f64 } else { f64::NAN };
        tracing::info!(
            "Epoch {:>3}/{} | loss={:.4} | lr={:.6}",
            epoch, cfg.num_epochs, avg_loss, lr
        );

        observer.on_epoch_end(&EpochMetrics::new(epoch, avg_loss, lr))?;
        sync.after_epoch(&model, epoch, avg_loss)?;
    }

    tracing::info!("Training complete!");
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::corpus::{Corpus, AUX_DIM};
    use crate::domain::vocabulary::Vocabulary;
    use crate::infra::sync::UnimplementedRemoteStore;
    use std::io::Write;

    type TestBackend = burn::backend::Autodiff<burn::backend::NdArray>;

    struct NullObserver;

    impl TrainingObserver for NullObserver {
        fn on_epoch_end(&mut self, _m: &EpochMetrics) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn empty_dataset_is_rejected_instead_of_spinning() {
        let dir = tempfile::tempdir().unwrap();

        let mut cfg = TrainConfig::default();
        cfg.seqlen = 4;
        cfg.num_epochs = 1;

        // Whitespace-only training files tokenize to nothing, so the
        // front-padded corpus carries no real tokens and the sliding
        // window produces zero samples.
        let corpus = Corpus {
            token_ids: vec![0; cfg.seqlen],
            aux: vec![0.0; cfg.seqlen * AUX_DIM],
        };
        let dataset = SequenceDataset::new(corpus, cfg.seqlen);

        let vocab = {
            let mut f = tempfile::NamedTempFile::new().unwrap();
            f.write_all(b"the 3\ncat 2\nsat 1\n").unwrap();
            Vocabulary::load(f.path(), 100, true).unwrap()
        };
        let emb_file = tempfile::NamedTempFile::new().unwrap();
        let embeddings = EmbeddingTable::load(&vocab, 3, emb_file.path()).unwrap();

        let model_cfg = LanguageModelConfig::new(
            vocab.total_slots(), cfg.seqlen, 3, AUX_DIM, vec![4], 4, 1, 0.0,
        );
        let sync = CheckpointSynchronizer::new(
            dir.path().join("weights").to_str().unwrap(),
            true,
            Box::new(UnimplementedRemoteStore),
        )
        .unwrap();

        let device = Default::default();
        let err = run_training::<TestBackend>(
            &cfg, model_cfg, dataset, &embeddings, sync, &mut NullObserver, &device,
        )
        .unwrap_err();
        assert!(err.to_string().contains("nothing to train on"));
    }
}
