// ============================================================
// Layer 6 — Metrics and Observability Hook
// ============================================================
// The trainer reports one EpochMetrics record per epoch through
// the TrainingObserver trait instead of printing — the orchestrator
// decides where metrics go. The shipped observer appends to a CSV
// file (easy to plot learning curves from) and echoes through
// tracing.
//
// Example CSV output:
//   epoch,loss,lr
//   0,5.124500,0.010000
//   1,4.890100,0.010000
//
// Reference: Rust Book §9 (Error Handling), §12 (I/O)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Absolute epoch number (resume-aware)
    pub epoch: usize,

    /// Average training loss over the epoch's steps
    pub loss: f64,

    /// Learning rate the epoch was trained with
    pub lr: f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, loss: f64, lr: f64) -> Self {
        Self { epoch, loss, lr }
    }

    /// True if this epoch improved on the previous best loss
    pub fn is_improvement(&self, best_loss: f64) -> bool {
        self.loss < best_loss
    }
}

/// Receives one callback per epoch. Implementations must not
/// assume consecutive epoch numbers (resumed runs start later).
pub trait TrainingObserver {
    fn on_epoch_end(&mut self, metrics: &EpochMetrics) -> Result<()>;
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create the CSV (with header) if it doesn't exist yet, so a
    /// resumed run appends to the same file.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir: PathBuf = dir.into();
        fs::create_dir_all(&dir)?;
        let csv_path = dir.join("metrics.csv");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "epoch,loss,lr")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

impl TrainingObserver for MetricsLogger {
    fn on_epoch_end(&mut self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(f, "{},{:.6},{:.6}", m.epoch, m.loss, m.lr)?;

        tracing::debug!(
            "Logged epoch {} metrics: loss={:.4}, lr={:.6}",
            m.epoch, m.loss, m.lr
        );
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics::new(2, 2.3, 0.01);
        assert!(m.is_improvement(3.0));
        assert!(!m.is_improvement(2.0));
    }

    #[test]
    fn csv_appends_across_logger_instances() {
        let dir = tempfile::tempdir().unwrap();

        let mut logger = MetricsLogger::new(dir.path()).unwrap();
        logger.on_epoch_end(&EpochMetrics::new(0, 5.0, 0.01)).unwrap();

        // a resumed run reopens the same file
        let mut logger = MetricsLogger::new(dir.path()).unwrap();
        logger.on_epoch_end(&EpochMetrics::new(1, 4.0, 0.01)).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "epoch,loss,lr");
        assert!(lines[1].starts_with("0,5.0"));
        assert!(lines[2].starts_with("1,4.0"));
        assert_eq!(lines.len(), 3);
    }
}
