//! Per-request working directories and their asynchronous deletion.
//!
//! A [`WorkDir`] is created for every execute/zip/upload request. When it is
//! released (explicitly or on drop) its path is queued on the [`Reaper`],
//! whose single background task removes directories in FIFO order. The
//! request path never deletes anything inline.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::Result;

const WORKDIR_PREFIX: &str = "projectDir";

// ---------------------------------------------------------------------------
// Reaper
// ---------------------------------------------------------------------------

/// Handle to the directory-deletion queue. Cheap to clone.
#[derive(Clone)]
pub struct Reaper {
    tx: mpsc::UnboundedSender<PathBuf>,
    enqueued: Arc<AtomicU64>,
    deleted: Arc<AtomicU64>,
}

impl Reaper {
    /// Start the deletion worker on the current Tokio runtime.
    ///
    /// The worker runs until every `Reaper` handle has been dropped.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();
        let deleted = Arc::new(AtomicU64::new(0));
        let deleted_task = deleted.clone();

        tokio::spawn(async move {
            while let Some(path) = rx.recv().await {
                info!(path = %path.display(), "deleting working directory");
                match tokio::fs::remove_dir_all(&path).await {
                    Ok(()) => {
                        deleted_task.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        debug!(path = %path.display(), "working directory already gone");
                        deleted_task.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        error!(path = %path.display(), error = %e, "error while deleting working directory");
                    }
                }
            }
            debug!("reaper stopped");
        });

        Self {
            tx,
            enqueued: Arc::new(AtomicU64::new(0)),
            deleted,
        }
    }

    /// Number of directories queued for deletion so far.
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Number of directories removed so far, including ones that were
    /// already gone when their turn came.
    pub fn deleted(&self) -> u64 {
        self.deleted.load(Ordering::Relaxed)
    }

    fn enqueue(&self, path: PathBuf) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.tx.send(path) {
            warn!(path = %e.0.display(), "reaper is gone, working directory left on disk");
        }
    }
}

// ---------------------------------------------------------------------------
// WorkDir
// ---------------------------------------------------------------------------

/// An exclusively owned temporary directory, queued for deletion exactly once.
pub struct WorkDir {
    path: PathBuf,
    reaper: Reaper,
    released: bool,
}

impl WorkDir {
    /// Create a fresh, uniquely named directory under the system temp dir.
    pub fn acquire(reaper: &Reaper) -> Result<Self> {
        Self::acquire_in(reaper, &std::env::temp_dir())
    }

    /// Create a fresh, uniquely named directory under `parent`, creating
    /// `parent` first if needed.
    pub fn acquire_in(reaper: &Reaper, parent: &Path) -> Result<Self> {
        std::fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new()
            .prefix(WORKDIR_PREFIX)
            .tempdir_in(parent)?;
        let path = dir.keep();
        debug!(path = %path.display(), "working directory acquired");
        Ok(Self {
            path,
            reaper: reaper.clone(),
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue the directory for deletion. Dropping has the same effect.
    pub fn release(mut self) {
        self.enqueue_once();
    }

    fn enqueue_once(&mut self) {
        if !self.released {
            self.released = true;
            self.reaper.enqueue(std::mem::take(&mut self.path));
        }
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        self.enqueue_once();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn wait_until_deleted(reaper: &Reaper, expected: u64) {
        for _ in 0..200 {
            if reaper.deleted() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("reaper deleted {} of {expected} directories", reaper.deleted());
    }

    #[tokio::test]
    async fn release_deletes_directory_in_background() {
        let reaper = Reaper::spawn();
        let dir = WorkDir::acquire(&reaper).unwrap();
        let path = dir.path().to_path_buf();
        std::fs::write(path.join("file.txt"), b"x").unwrap();
        std::fs::create_dir_all(path.join("nested/deeper")).unwrap();
        assert!(path.is_dir());

        dir.release();
        assert_eq!(reaper.enqueued(), 1);
        wait_until_deleted(&reaper, 1).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn drop_enqueues_exactly_once() {
        let reaper = Reaper::spawn();
        {
            let _dir = WorkDir::acquire(&reaper).unwrap();
        }
        assert_eq!(reaper.enqueued(), 1);
        wait_until_deleted(&reaper, 1).await;
        assert_eq!(reaper.enqueued(), 1);
    }

    #[tokio::test]
    async fn directories_are_unique() {
        let reaper = Reaper::spawn();
        let a = WorkDir::acquire(&reaper).unwrap();
        let b = WorkDir::acquire(&reaper).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(WORKDIR_PREFIX));
    }

    #[tokio::test]
    async fn missing_directory_does_not_stop_worker() {
        let reaper = Reaper::spawn();
        let first = WorkDir::acquire(&reaper).unwrap();
        std::fs::remove_dir_all(first.path()).unwrap();
        first.release();

        let second = WorkDir::acquire(&reaper).unwrap();
        let second_path = second.path().to_path_buf();
        second.release();

        wait_until_deleted(&reaper, 2).await;
        assert!(!second_path.exists());
        assert_eq!(reaper.enqueued(), 2);
    }

    #[tokio::test]
    async fn vanished_directory_counts_as_deleted() {
        let reaper = Reaper::spawn();
        let dir = WorkDir::acquire(&reaper).unwrap();
        std::fs::remove_dir_all(dir.path()).unwrap();
        dir.release();

        wait_until_deleted(&reaper, 1).await;
        assert_eq!(reaper.deleted(), reaper.enqueued());
    }

    #[tokio::test]
    async fn acquire_in_creates_under_parent() {
        let reaper = Reaper::spawn();
        let root = tempfile::TempDir::new().unwrap();
        let parent = root.path().join("forge-root");

        let dir = WorkDir::acquire_in(&reaper, &parent).unwrap();
        assert!(dir.path().starts_with(&parent));
        assert!(dir.path().is_dir());

        let path = dir.path().to_path_buf();
        drop(dir);
        wait_until_deleted(&reaper, 1).await;
        assert!(!path.exists());
        assert!(parent.is_dir());
    }
}
