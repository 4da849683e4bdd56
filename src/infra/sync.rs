// ============================================================
// Layer 6 — Checkpoint Synchronizer
// ============================================================
// Makes checkpoint persistence work when the logical target is a
// remote location, without touching the underlying writer.
//
// State machine:
//   LOCAL — the target is a plain filesystem path. The writer
//           writes there directly; nothing else happens.
//   CLOUD — the target carries a scheme:// prefix. At construction
//           the target is rewritten to a private local staging
//           path; the writer only ever sees the staging path.
//           After each epoch's (possibly skipped) write, the
//           staging file's identity signature is re-probed and an
//           upload fires exactly when the signature changed.
//
// The identity signature is filesystem metadata (size + mtime),
// not a content hash: O(1) to compute, at the cost of a possible
// false negative when a write lands within the same mtime tick
// with an identical size. That limitation is accepted and
// documented here, not silently worked around.
//
// A missing staging file is the expected "absent" state before the
// first successful write, never an error.
//
// Upload failures fail the epoch: they are logged and propagated,
// never swallowed. The default RemoteStore has no cloud binding
// and says so loudly — wire a real store to actually upload.
//
// This is composition, not inheritance: the synchronizer owns the
// writer and exposes one after_epoch entry point, and all of its
// state lives in explicit fields so the machine is testable in
// isolation.

use anyhow::{Context, Result};
use burn::tensor::backend::AutodiffBackend;
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::SystemTime,
};

use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::LanguageModel;

// ─── Identity signature ───────────────────────────────────────────────────────
/// Cheap proxy for "has this file's content likely changed":
/// size + modification time, not a digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSignature {
    pub len: u64,
    pub modified: SystemTime,
}

/// Probe a file's identity signature. A missing file is the
/// "absent" state (None), not an error; any other I/O failure is.
pub fn probe_signature(path: &Path) -> Result<Option<FileSignature>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(FileSignature {
            len: meta.len(),
            modified: meta
                .modified()
                .with_context(|| format!("No mtime for '{}'", path.display()))?,
        })),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => {
            Err(e).with_context(|| format!("Cannot stat staging file '{}'", path.display()))
        }
    }
}

// ─── Remote store seam ────────────────────────────────────────────────────────
/// Uploads one local file to a scheme://-prefixed remote target.
/// The synchronizer only calls this when the staging file changed.
pub trait RemoteStore {
    fn upload(&self, local: &Path, remote_target: &str) -> Result<()>;
}

/// Placeholder store: fails loudly instead of pretending to
/// upload. The staged checkpoint is kept, so nothing is lost.
pub struct UnimplementedRemoteStore;

impl RemoteStore for UnimplementedRemoteStore {
    fn upload(&self, local: &Path, remote_target: &str) -> Result<()> {
        anyhow::bail!(
            "remote checkpoint upload to '{}' is not implemented; \
             the staged checkpoint is kept at '{}'",
            remote_target,
            local.display()
        )
    }
}

// ─── Synchronizer ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Local,
    Cloud,
}

/// Any scheme://-prefixed target is remote; everything else is a
/// plain filesystem path.
pub fn is_remote_target(target: &str) -> bool {
    target.contains("://")
}

pub struct CheckpointSynchronizer {
    mode: SyncMode,
    writer: CheckpointManager,
    /// The file the writer actually produces (staging in CLOUD
    /// mode, the target itself in LOCAL mode)
    staging_file: PathBuf,
    remote_target: Option<String>,
    last_signature: Option<FileSignature>,
    store: Box<dyn RemoteStore>,
}

impl CheckpointSynchronizer {
    /// `target` is the checkpoint file path without extension,
    /// either local ("checkpoints/weights-...") or remote
    /// ("gs://bucket/dir/weights-...").
    pub fn new(target: &str, best_only: bool, store: Box<dyn RemoteStore>) -> Result<Self> {
        if !is_remote_target(target) {
            let writer = CheckpointManager::new(PathBuf::from(target), best_only);
            let staging_file = writer.weights_path();
            return Ok(Self {
                mode: SyncMode::Local,
                writer,
                staging_file,
                remote_target: None,
                last_signature: None,
                store,
            });
        }

        let filename = target.rsplit('/').next().unwrap_or("weights");
        let staging_base = std::env::temp_dir().join(format!("word-seq-lm-{filename}"));
        let writer = CheckpointManager::new(staging_base, best_only);
        let staging_file = writer.weights_path();

        // Capture the pre-training signature so a stale staging
        // file from an earlier run does not count as a change.
        let last_signature = probe_signature(&staging_file)?;

        tracing::info!(
            "Cloud checkpoint target '{}', staging at '{}'",
            target, staging_file.display()
        );

        Ok(Self {
            mode: SyncMode::Cloud,
            writer,
            staging_file,
            // The recorder appends its extension to the staged file;
            // mirror that on the remote side.
            remote_target: Some(format!("{target}.mpk.gz")),
            last_signature,
            store,
        })
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Epoch-boundary entry point: delegate to the writer's normal
    /// save policy, then (CLOUD only) upload iff the staging file's
    /// identity signature changed since last observed.
    pub fn after_epoch<B: AutodiffBackend>(
        &mut self,
        model: &LanguageModel<B>,
        epoch: usize,
        loss: f64,
    ) -> Result<()> {
        self.writer.save_model(model, epoch, loss)?;

        if self.mode == SyncMode::Local {
            return Ok(());
        }
        self.sync_staging()
    }

    /// Re-probe the staging file and upload exactly once if it
    /// changed (absent → present counts as a change).
    fn sync_staging(&mut self) -> Result<()> {
        let Some(signature) = probe_signature(&self.staging_file)? else {
            // Nothing written yet (e.g. best-only skipped every
            // epoch so far) — still the absent state.
            tracing::debug!("Staging file absent, nothing to upload");
            return Ok(());
        };

        if self.last_signature == Some(signature) {
            tracing::debug!("Staging file unchanged, skipping upload");
            return Ok(());
        }

        self.last_signature = Some(signature);
        let target = self
            .remote_target
            .as_deref()
            .expect("cloud mode always has a remote target");

        tracing::info!("Staging file changed, uploading to '{}'", target);
        if let Err(e) = self.store.upload(&self.staging_file, target) {
            tracing::error!("Checkpoint upload to '{}' failed: {:#}", target, e);
            return Err(e.context("checkpoint upload failed"));
        }
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records every upload instead of talking to a network.
    struct RecordingStore {
        uploads: Arc<Mutex<Vec<String>>>,
    }

    impl RemoteStore for RecordingStore {
        fn upload(&self, _local: &Path, remote_target: &str) -> Result<()> {
            self.uploads.lock().unwrap().push(remote_target.to_string());
            Ok(())
        }
    }

    fn cloud_sync(staging_base: PathBuf) -> (CheckpointSynchronizer, Arc<Mutex<Vec<String>>>) {
        let uploads = Arc::new(Mutex::new(Vec::new()));
        let writer = CheckpointManager::new(staging_base, false);
        let staging_file = writer.weights_path();
        let last_signature = probe_signature(&staging_file).unwrap();
        let sync = CheckpointSynchronizer {
            mode: SyncMode::Cloud,
            writer,
            staging_file,
            remote_target: Some("gs://bucket/weights.mpk.gz".into()),
            last_signature,
            store: Box::new(RecordingStore { uploads: uploads.clone() }),
        };
        (sync, uploads)
    }

    #[test]
    fn detects_remote_targets_by_scheme_prefix() {
        assert!(is_remote_target("gs://bucket/dir/weights"));
        assert!(is_remote_target("s3://bucket/weights"));
        assert!(!is_remote_target("checkpoints/weights"));
        assert!(!is_remote_target("/absolute/path/weights"));
    }

    #[test]
    fn local_mode_stages_at_the_target_itself() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("weights");
        let sync = CheckpointSynchronizer::new(
            target.to_str().unwrap(),
            true,
            Box::new(UnimplementedRemoteStore),
        )
        .unwrap();

        assert_eq!(sync.mode(), SyncMode::Local);
        assert!(sync.remote_target.is_none());
        assert_eq!(sync.staging_file, dir.path().join("weights.mpk.gz"));
    }

    #[test]
    fn absent_staging_file_probes_as_none_and_uploads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (mut sync, uploads) = cloud_sync(dir.path().join("weights"));

        assert!(sync.last_signature.is_none());
        sync.sync_staging().unwrap();
        assert!(uploads.lock().unwrap().is_empty());
        assert!(sync.last_signature.is_none());
    }

    #[test]
    fn uploads_once_per_observed_change() {
        let dir = tempfile::tempdir().unwrap();
        let (mut sync, uploads) = cloud_sync(dir.path().join("weights"));
        let staging = sync.staging_file.clone();

        // absent → present: one upload
        fs::write(&staging, b"epoch-0-weights").unwrap();
        sync.sync_staging().unwrap();
        assert_eq!(uploads.lock().unwrap().len(), 1);

        // unchanged metadata: no upload
        sync.sync_staging().unwrap();
        assert_eq!(uploads.lock().unwrap().len(), 1);

        // size change: exactly one more upload
        fs::write(&staging, b"epoch-1-weights-now-longer").unwrap();
        sync.sync_staging().unwrap();
        assert_eq!(uploads.lock().unwrap().len(), 2);
    }

    #[test]
    fn upload_errors_propagate() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CheckpointManager::new(dir.path().join("weights"), false);
        let staging_file = writer.weights_path();
        let mut sync = CheckpointSynchronizer {
            mode: SyncMode::Cloud,
            writer,
            staging_file: staging_file.clone(),
            remote_target: Some("gs://bucket/weights.mpk.gz".into()),
            last_signature: None,
            store: Box::new(UnimplementedRemoteStore),
        };

        fs::write(&staging_file, b"weights").unwrap();
        let err = sync.sync_staging().unwrap_err();
        assert!(err.to_string().contains("upload"));
    }
}
