//! Per-job local working directory.
//!
//! A [`StagingArea`] owns a directory unique to one job and a manifest of
//! every file the job creates in it. Teardown deletes exactly the manifest
//! entries and then the (now empty) directory; nothing is removed by name
//! matching. If the orchestrator never reaches teardown, `Drop` does it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};
use uuid::Uuid;

use super::error::PipelineError;
use super::model::CleanupFailure;

pub struct StagingArea {
    root: PathBuf,
    manifest: Mutex<Vec<PathBuf>>,
    torn_down: AtomicBool,
}

impl StagingArea {
    /// Create `{work_root}/job-{job_id}`. Fails if the directory exists.
    pub async fn create(work_root: &Path, job_id: Uuid) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(work_root).await?;
        let root = work_root.join(format!("job-{job_id}"));
        tokio::fs::create_dir(&root).await?;
        debug!("staging area created at {}", root.display());

        Ok(Self {
            root,
            manifest: Mutex::new(Vec::new()),
            torn_down: AtomicBool::new(false),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, Vec<PathBuf>> {
        // A panicking registrant cannot leave the list half-updated.
        self.manifest.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Local path for the downloaded source, already registered.
    pub fn acquire(&self, extension: &str) -> PathBuf {
        let path = self.root.join(format!("source.{extension}"));
        self.register(path.clone());
        path
    }

    pub fn register(&self, path: PathBuf) {
        let mut entries = self.entries();
        if !entries.contains(&path) {
            entries.push(path);
        }
    }

    pub fn is_registered(&self, path: &Path) -> bool {
        self.entries().iter().any(|p| p == path)
    }

    pub fn manifest(&self) -> Vec<PathBuf> {
        self.entries().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Delete one registered file now and drop it from the manifest.
    ///
    /// On failure the entry stays registered so teardown retries it.
    pub async fn release(&self, path: &Path) -> Result<(), CleanupFailure> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(CleanupFailure {
                    path: path.to_path_buf(),
                    error: e.to_string(),
                });
            }
        }
        self.entries().retain(|p| p != path);
        Ok(())
    }

    /// Delete every registered path, then the directory itself.
    ///
    /// Best effort: individual failures are logged and returned, never raised.
    pub async fn teardown(&self) -> Vec<CleanupFailure> {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return Vec::new();
        }

        let paths = std::mem::take(&mut *self.entries());
        let mut failures = Vec::new();

        for path in paths {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("removed {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    let err = PipelineError::CleanupFailure {
                        path: path.clone(),
                        cause: e,
                    };
                    warn!("🧹 {}", err);
                    failures.push(CleanupFailure {
                        path,
                        error: err.to_string(),
                    });
                }
            }
        }

        if let Err(e) = tokio::fs::remove_dir(&self.root).await {
            if e.kind() != ErrorKind::NotFound {
                warn!("🧹 failed to remove staging dir {}: {}", self.root.display(), e);
                failures.push(CleanupFailure {
                    path: self.root.clone(),
                    error: e.to_string(),
                });
            }
        }

        failures
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }

        warn!("staging area {} dropped before teardown", self.root.display());
        let paths = std::mem::take(&mut *self.entries());
        for path in paths {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != ErrorKind::NotFound {
                    warn!("🧹 failed to remove {}: {}", path.display(), e);
                }
            }
        }
        let _ = std::fs::remove_dir(&self.root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn creates_unique_dir_per_job() {
        let work = tempfile::tempdir().unwrap();
        let a = StagingArea::create(work.path(), Uuid::new_v4()).await.unwrap();
        let b = StagingArea::create(work.path(), Uuid::new_v4()).await.unwrap();

        assert_ne!(a.root(), b.root());
        assert!(a.root().starts_with(work.path()));
        assert!(a.root().is_dir());
    }

    #[tokio::test]
    async fn same_job_id_cannot_share_a_dir() {
        let work = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();
        let _first = StagingArea::create(work.path(), id).await.unwrap();
        assert!(StagingArea::create(work.path(), id).await.is_err());
    }

    #[tokio::test]
    async fn acquire_registers_source_path() {
        let work = tempfile::tempdir().unwrap();
        let staging = StagingArea::create(work.path(), Uuid::new_v4()).await.unwrap();

        let source = staging.acquire("mp4");
        assert_eq!(source, staging.root().join("source.mp4"));
        assert!(staging.is_registered(&source));
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let work = tempfile::tempdir().unwrap();
        let staging = StagingArea::create(work.path(), Uuid::new_v4()).await.unwrap();
        let path = staging.root().join("a.ts");

        staging.register(path.clone());
        staging.register(path.clone());
        assert_eq!(staging.manifest(), vec![path]);
    }

    #[tokio::test]
    async fn teardown_removes_registered_files_and_dir() {
        let work = tempfile::tempdir().unwrap();
        let staging = StagingArea::create(work.path(), Uuid::new_v4()).await.unwrap();
        for name in ["a.ts", "b.ts", "a.m3u8"] {
            let path = staging.root().join(name);
            fs::write(&path, name).unwrap();
            staging.register(path);
        }
        // Registered but never written: not an error.
        staging.register(staging.root().join("never.ts"));

        let failures = staging.teardown().await;

        assert!(failures.is_empty(), "{failures:?}");
        assert!(staging.is_empty());
        assert!(!staging.root().exists());
        assert_eq!(fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn teardown_leaves_unregistered_files() {
        let work = tempfile::tempdir().unwrap();
        let staging = StagingArea::create(work.path(), Uuid::new_v4()).await.unwrap();
        let stray = staging.root().join("stray.ts");
        fs::write(&stray, b"x").unwrap();

        let failures = staging.teardown().await;

        // The directory cannot be removed while the stray file is in it.
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, staging.root());
        assert!(stray.exists());
    }

    #[tokio::test]
    async fn release_deletes_immediately() {
        let work = tempfile::tempdir().unwrap();
        let staging = StagingArea::create(work.path(), Uuid::new_v4()).await.unwrap();
        let path = staging.root().join("seg.ts");
        fs::write(&path, b"x").unwrap();
        staging.register(path.clone());

        staging.release(&path).await.unwrap();

        assert!(!path.exists());
        assert!(!staging.is_registered(&path));
        staging.teardown().await;
    }

    #[tokio::test]
    async fn drop_without_teardown_still_cleans_up() {
        let work = tempfile::tempdir().unwrap();
        let root;
        {
            let staging = StagingArea::create(work.path(), Uuid::new_v4()).await.unwrap();
            let path = staging.acquire("mp4");
            fs::write(&path, b"source").unwrap();
            root = staging.root().to_path_buf();
        }
        assert!(!root.exists());
    }
}
