//! Delayed, fire-and-forget backup snapshots.
//!
//! History writers call [`BackupScheduler::schedule`] after each new record.
//! A supervised worker waits a short delay, coalesces whatever else was queued
//! meanwhile, and asks the [`BackupHook`] for one snapshot.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub const DEFAULT_BACKUP_DELAY: Duration = Duration::from_secs(2);
const QUEUE_DEPTH: usize = 16;

/// Whatever actually produces a backup. Its outcome is only logged.
#[async_trait]
pub trait BackupHook: Send + Sync {
    async fn snapshot(&self) -> Result<(), String>;
}

/// Hook that only records the request in the log.
pub struct LogBackupHook;

#[async_trait]
impl BackupHook for LogBackupHook {
    async fn snapshot(&self) -> Result<(), String> {
        info!("backup snapshot requested (no backup target configured)");
        Ok(())
    }
}

/// Copies the history file into a backup directory.
pub struct FileCopyBackupHook {
    pub source: PathBuf,
    pub target_dir: PathBuf,
}

#[async_trait]
impl BackupHook for FileCopyBackupHook {
    async fn snapshot(&self) -> Result<(), String> {
        let file_name = self
            .source
            .file_name()
            .ok_or_else(|| format!("no file name in {}", self.source.display()))?;
        tokio::fs::create_dir_all(&self.target_dir)
            .await
            .map_err(|e| format!("mkdir {}: {}", self.target_dir.display(), e))?;
        let target = self.target_dir.join(file_name);
        tokio::fs::copy(&self.source, &target)
            .await
            .map_err(|e| format!("copy to {}: {}", target.display(), e))?;
        info!("Backed up {} to {}", self.source.display(), target.display());
        Ok(())
    }
}

/// Cheap handle used to request snapshots.
#[derive(Clone)]
pub struct BackupScheduler {
    tx: mpsc::Sender<()>,
}

impl BackupScheduler {
    /// Spawn the backup worker. It stops when `shutdown` is cancelled or every
    /// scheduler handle has been dropped.
    pub fn spawn(
        hook: Arc<dyn BackupHook>,
        delay: Duration,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let task = tokio::spawn(run_worker(hook, delay, rx, shutdown));
        (Self { tx }, task)
    }

    /// Request a snapshot. Never blocks and never fails the caller.
    pub fn schedule(&self) {
        if let Err(e) = self.tx.try_send(()) {
            debug!("backup request dropped: {}", e);
        }
    }
}

async fn run_worker(
    hook: Arc<dyn BackupHook>,
    delay: Duration,
    mut rx: mpsc::Receiver<()>,
    shutdown: CancellationToken,
) {
    loop {
        let request = tokio::select! {
            _ = shutdown.cancelled() => break,
            request = rx.recv() => request,
        };
        if request.is_none() {
            break;
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        while rx.try_recv().is_ok() {}

        if let Err(e) = hook.snapshot().await {
            error!("Backup snapshot failed: {}", e);
        }
    }
    debug!("backup worker stopped");
}
