use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use aws_sdk_s3::primitives::ByteStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::PipelineError;
use super::model::PublishResult;
use super::staging::StagingArea;
use crate::infrastructure::storage::{BlobStore, StorageError};

const RETRY_DELAY: Duration = Duration::from_millis(250);

/// Content type for a publishable artifact, `None` for anything else.
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ts") => Some("video/mp2t"),
        Some("m3u8") => Some("application/x-mpegURL"),
        _ => None,
    }
}

pub struct ArtifactPublisher {
    store: Arc<dyn BlobStore>,
    staging: Arc<StagingArea>,
    attempts: u32,
}

impl ArtifactPublisher {
    pub fn new(store: Arc<dyn BlobStore>, staging: Arc<StagingArea>, attempts: u32) -> Self {
        Self {
            store,
            staging,
            attempts: attempts.max(1),
        }
    }

    /// Upload `artifacts` in order, deleting each local copy as soon as its
    /// upload succeeds. A failed file is recorded and the batch continues.
    /// Stops before the next file once `cancel` fires.
    pub async fn publish<F>(
        &self,
        artifacts: &[PathBuf],
        remote_key_of: F,
        cancel: &CancellationToken,
    ) -> Vec<PublishResult>
    where
        F: Fn(&Path) -> String,
    {
        info!("⬆️ Uploading {} artifacts", artifacts.len());
        let mut results = Vec::with_capacity(artifacts.len());

        for (index, path) in artifacts.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!("publish cancelled with {} artifacts left", artifacts.len() - index);
                break;
            }

            let Some(content_type) = content_type_for(path) else {
                debug!("skipping non-HLS artifact {}", path.display());
                continue;
            };

            let remote_key = remote_key_of(path);
            let (attempts, outcome) = self.upload_with_retry(path, &remote_key, content_type).await;

            let error = match outcome {
                Ok(()) => {
                    if let Err(failure) = self.staging.release(path).await {
                        warn!("🧹 uploaded but could not delete {}: {}", path.display(), failure.error);
                    }
                    None
                }
                Err(cause) => {
                    let err = PipelineError::PublishFailure {
                        file: path.clone(),
                        cause,
                    };
                    warn!("❌ {}", err);
                    Some(err.to_string())
                }
            };

            results.push(PublishResult {
                path: path.clone(),
                remote_key,
                ok: error.is_none(),
                attempts,
                error,
            });
        }

        let failed = results.iter().filter(|r| !r.ok).count();
        info!(
            "⬆️ Uploaded {} artifacts, {} failed",
            results.len() - failed,
            failed
        );
        results
    }

    async fn upload_with_retry(
        &self,
        path: &Path,
        remote_key: &str,
        content_type: &str,
    ) -> (u32, Result<(), StorageError>) {
        let mut attempt = 1;
        loop {
            let outcome = self.upload(path, remote_key, content_type).await;
            match outcome {
                Err(e) if attempt < self.attempts => {
                    warn!(
                        "upload of {} failed (attempt {}/{}): {}. Retrying.",
                        remote_key, attempt, self.attempts, e
                    );
                    tokio::time::sleep(RETRY_DELAY * attempt).await;
                    attempt += 1;
                }
                other => return (attempt, other),
            }
        }
    }

    async fn upload(
        &self,
        path: &Path,
        remote_key: &str,
        content_type: &str,
    ) -> Result<(), StorageError> {
        // Streamed from disk, a fresh stream per attempt.
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::Body(format!("{}: {}", path.display(), e)))?;
        self.store.put(remote_key, body, content_type).await
    }
}
