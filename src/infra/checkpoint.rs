// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// The underlying checkpoint writer the synchronizer wraps.
// Saves model weights with Burn's CompactRecorder.
//
// What gets saved:
//   1. {base}.mpk.gz       — all trainable parameters
//   2. latest_epoch.json   — which epoch was last written
//   3. train_config.json   — run configuration (written separately
//                            by the train use case so inference can
//                            rebuild the exact architecture)
//
// The frozen embedding table is a module constant and is NOT part
// of the record; inference reloads it from the embedding file.
//
// Write policy mirrors a best-only checkpoint callback: when
// best_only is set, an epoch is persisted only if its training
// loss improves on the best seen so far.
//
// Atomicity: the recorder writes to a "-tmp" sibling which is then
// renamed over the final path, so a reader of the final path never
// observes a half-written file. The base filename must not contain
// dots — the recorder sets the file extension.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{HalfPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::LanguageModel;

pub struct CheckpointManager {
    /// Weight file path without extension (the recorder appends .mpk.gz)
    base: PathBuf,

    /// Persist only epochs that improve on the best loss seen so far
    best_only: bool,
    best_loss: Option<f64>,
}

impl CheckpointManager {
    pub fn new(base: PathBuf, best_only: bool) -> Self {
        if let Some(parent) = base.parent() {
            fs::create_dir_all(parent).ok();
        }
        Self { base, best_only, best_loss: None }
    }

    /// Final weight file path, as seen by readers and the synchronizer
    pub fn weights_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.mpk.gz", self.base.display()))
    }

    /// Save model weights for an epoch. Returns whether a write
    /// actually happened (false when best_only skips the epoch).
    pub fn save_model<B: AutodiffBackend>(
        &mut self,
        model: &LanguageModel<B>,
        epoch: usize,
        loss: f64,
    ) -> Result<bool> {
        if self.best_only {
            if let Some(best) = self.best_loss {
                if loss >= best {
                    tracing::debug!(
                        "Epoch {}: loss {:.6} did not improve on {:.6}, skipping checkpoint",
                        epoch, loss, best
                    );
                    return Ok(false);
                }
            }
        }

        // Record to a temp sibling, then rename over the final path
        let tmp_base = PathBuf::from(format!("{}-tmp", self.base.display()));
        NamedMpkGzFileRecorder::<HalfPrecisionSettings>::new()
            .record(model.clone().into_record(), tmp_base.clone())
            .with_context(|| {
                format!("Failed to save checkpoint to '{}'", tmp_base.display())
            })?;

        let tmp_file = PathBuf::from(format!("{}.mpk.gz", tmp_base.display()));
        let final_file = self.weights_path();
        fs::rename(&tmp_file, &final_file).with_context(|| {
            format!(
                "Failed to move checkpoint '{}' into place at '{}'",
                tmp_file.display(), final_file.display()
            )
        })?;

        // Update the latest epoch pointer next to the weight file
        if let Some(dir) = final_file.parent() {
            let latest_path = dir.join("latest_epoch.json");
            fs::write(&latest_path, serde_json::to_string(&epoch)?)
                .with_context(|| "Failed to write latest_epoch.json")?;
        }

        self.best_loss = Some(loss);
        tracing::info!(
            "Saved checkpoint for epoch {} (loss {:.6}) to '{}'",
            epoch, loss, final_file.display()
        );
        Ok(true)
    }

    /// Restore weights from a checkpoint file (path without the
    /// .mpk.gz extension) into a freshly-built model. The model
    /// must have the architecture the checkpoint was saved with.
    pub fn load_weights<B: Backend>(
        base: impl AsRef<Path>,
        model: LanguageModel<B>,
        device: &B::Device,
    ) -> Result<LanguageModel<B>> {
        let base = base.as_ref();
        let record = NamedMpkGzFileRecorder::<HalfPrecisionSettings>::new()
            .load(base.to_path_buf(), device)
            .with_context(|| {
                format!(
                    "Cannot load checkpoint '{}'. Have you trained the model first?",
                    base.display()
                )
            })?;
        Ok(model.load_record(record))
    }

    /// Save the run configuration so `sample` can rebuild the
    /// exact model architecture later.
    pub fn save_config(dir: impl AsRef<Path>, cfg: &TrainConfig) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).ok();
        let path = dir.join("train_config.json");
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(dir: impl AsRef<Path>) -> Result<TrainConfig> {
        let path = dir.as_ref().join("train_config.json");
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Make sure you have run 'train' before 'sample'.",
                path.display()
            )
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::LanguageModelConfig;
    use burn::tensor::Distribution;

    type TestAutodiff = burn::backend::Autodiff<burn::backend::NdArray>;

    fn tiny_model(
        device: &<TestAutodiff as Backend>::Device,
    ) -> LanguageModel<TestAutodiff> {
        let cfg = LanguageModelConfig::new(5, 2, 3, 2, vec![4], 4, 1, 0.0);
        let emb = Tensor::random([5, 3], Distribution::Default, device);
        cfg.init(emb, device).unwrap()
    }

    #[test]
    fn best_only_skips_non_improving_epochs() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let model = tiny_model(&device);
        let mut mgr = CheckpointManager::new(dir.path().join("weights"), true);

        assert!(mgr.save_model(&model, 0, 2.0).unwrap());
        assert!(!mgr.save_model(&model, 1, 2.5).unwrap()); // worse
        assert!(mgr.save_model(&model, 2, 1.5).unwrap()); // better

        assert!(mgr.weights_path().exists());
        let latest: usize = serde_json::from_str(
            &fs::read_to_string(dir.path().join("latest_epoch.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(latest, 2);
    }

    #[test]
    fn every_epoch_writes_without_best_only() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let model = tiny_model(&device);
        let mut mgr = CheckpointManager::new(dir.path().join("weights"), false);

        assert!(mgr.save_model(&model, 0, 2.0).unwrap());
        assert!(mgr.save_model(&model, 1, 3.0).unwrap());
    }

    #[test]
    fn no_tmp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let model = tiny_model(&device);
        let mut mgr = CheckpointManager::new(dir.path().join("weights"), false);
        mgr.save_model(&model, 0, 1.0).unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("-tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig::default();
        CheckpointManager::save_config(dir.path(), &cfg).unwrap();
        let loaded = CheckpointManager::load_config(dir.path()).unwrap();
        assert_eq!(loaded.seqlen, cfg.seqlen);
        assert_eq!(loaded.sample_size, cfg.sample_size);
    }
}
