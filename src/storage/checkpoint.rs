// src/storage/checkpoint.rs

//! Checkpoint persistence for scrape progress.
//!
//! One JSON file per filter signature:
//!
//! ```text
//! {state_dir}/
//! ├── checkpoint-<signature>.json    # durable ScrapeProgress
//! └── checkpoint-<signature>.lock    # PID marker while a job runs
//! ```
//!
//! Writes are atomic (write temp, then rename) so an interrupted process
//! never leaves a checkpoint that fails to load. The lock file stops a
//! second instance from running the same filter signature concurrently;
//! locks older than one hour are considered stale leftovers of a crash.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::ScrapeProgress;

/// Locks older than this are treated as crash leftovers.
const LOCK_STALE_SECS: i64 = 3600;

/// Filesystem-backed checkpoint store.
#[derive(Clone)]
pub struct CheckpointStore {
    root_dir: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    started_at: DateTime<Utc>,
}

impl CheckpointStore {
    /// Create a store rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Path of the checkpoint file for a filter signature.
    pub fn checkpoint_path(&self, signature: &str) -> PathBuf {
        self.root_dir.join(format!("checkpoint-{signature}.json"))
    }

    fn lock_path(&self, signature: &str) -> PathBuf {
        self.root_dir.join(format!("checkpoint-{signature}.lock"))
    }

    /// Load prior progress for a signature, if a checkpoint exists.
    ///
    /// A checkpoint that exists but cannot be parsed is a fatal condition:
    /// silently restarting would re-fetch everything the broken file held.
    pub async fn load(&self, signature: &str) -> Result<Option<ScrapeProgress>> {
        let path = self.checkpoint_path(signature);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::checkpoint(path.display(), e)),
        };

        let progress: ScrapeProgress = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::checkpoint(path.display(), format!("corrupted: {e}")))?;

        if progress.signature != signature {
            return Err(AppError::checkpoint(
                path.display(),
                format!(
                    "signature mismatch: file says {}, expected {signature}",
                    progress.signature
                ),
            ));
        }
        Ok(Some(progress))
    }

    /// Persist progress atomically and stamp the checkpoint time.
    pub async fn save(&self, progress: &mut ScrapeProgress) -> Result<()> {
        progress.checkpointed_at = Some(Utc::now());
        let path = self.checkpoint_path(&progress.signature);
        let bytes = serde_json::to_vec_pretty(progress)?;
        self.write_atomic(&path, &bytes)
            .await
            .map_err(|e| AppError::checkpoint(path.display(), e))
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Claim exclusive ownership of a filter signature.
    ///
    /// Fails with [`AppError::JobLocked`] when a fresh lock exists; stale
    /// locks are replaced.
    pub async fn acquire_lock(&self, signature: &str) -> Result<JobLock> {
        let path = self.lock_path(signature);
        tokio::fs::create_dir_all(&self.root_dir)
            .await
            .map_err(|e| AppError::checkpoint(self.root_dir.display(), e))?;

        if let Ok(bytes) = tokio::fs::read(&path).await {
            if let Ok(info) = serde_json::from_slice::<LockInfo>(&bytes) {
                let age = Utc::now() - info.started_at;
                if age.num_seconds() < LOCK_STALE_SECS {
                    return Err(AppError::JobLocked {
                        path: path.display().to_string(),
                        pid: info.pid,
                    });
                }
                log::warn!(
                    "Replacing stale lock at {} (pid {}, {}s old)",
                    path.display(),
                    info.pid,
                    age.num_seconds()
                );
            }
            let _ = tokio::fs::remove_file(&path).await;
        }

        let info = LockInfo {
            pid: std::process::id(),
            started_at: Utc::now(),
        };
        let bytes = serde_json::to_vec(&info)?;

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| AppError::checkpoint(path.display(), e))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| AppError::checkpoint(path.display(), e))?;

        Ok(JobLock { path })
    }
}

/// Held for the duration of one job run; delete-on-release.
#[derive(Debug)]
pub struct JobLock {
    path: PathBuf,
}

impl JobLock {
    /// Release the lock, removing the marker file.
    pub async fn release(self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::checkpoint(self.path.display(), e)),
        }
    }
}
