//! Drives one job through download, encode, compose, publish and cleanup.
//!
//! Stage failures are split in two: per-item failures (one rendition, one
//! upload) are collected into the [`JobResult`]; fatal ones skip the
//! remaining stages. Either way the staging area is torn down before
//! `run_job` returns.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::encode::EncodeWorker;
use super::error::PipelineError;
use super::model::{
    CleanupFailure, Job, JobFailure, JobResult, JobStage, JobStatus, PublishResult,
    VariantArtifact, VariantResult, file_name_of,
};
use super::playlist;
use super::publish::ArtifactPublisher;
use super::staging::StagingArea;
use crate::config::settings::AppConfig;
use crate::infrastructure::encoder::{Encoder, EncoderError};
use crate::infrastructure::storage::BlobStore;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub hls_folder: String,
    pub work_dir: PathBuf,
    pub max_concurrent_encodes: usize,
    pub upload_attempts: u32,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            hls_folder: config.hls_folder.clone(),
            work_dir: config.work_dir.clone(),
            max_concurrent_encodes: config.max_concurrent_encodes,
            upload_attempts: config.upload_attempts,
        }
    }
}

/// Per-item outcomes gathered while the job runs.
#[derive(Default)]
struct JobReport {
    variant_results: Vec<VariantResult>,
    publish_results: Vec<PublishResult>,
    master_playlist_key: Option<String>,
}

type StageError = (JobStage, PipelineError);

pub struct PipelineOrchestrator {
    store: Arc<dyn BlobStore>,
    encoder: Arc<dyn Encoder>,
    config: PipelineConfig,
}

impl PipelineOrchestrator {
    pub fn new(store: Arc<dyn BlobStore>, encoder: Arc<dyn Encoder>, config: PipelineConfig) -> Self {
        Self {
            store,
            encoder,
            config,
        }
    }

    /// `{hls_folder}/{asset_name}/{file_name}`
    pub fn remote_key(&self, job: &Job, file_name: &str) -> String {
        let folder = self.config.hls_folder.trim_end_matches('/');
        if folder.is_empty() {
            format!("{}/{}", job.asset_name, file_name)
        } else {
            format!("{}/{}/{}", folder, job.asset_name, file_name)
        }
    }

    pub async fn run_job(&self, job: &Job, cancel: &CancellationToken) -> JobResult {
        let started = Instant::now();
        let mut report = JobReport::default();
        info!(job_id = %job.id, asset = %job.asset_name, "🎥 Job starting ({})", JobStage::Init);

        let (outcome, cleanup_failures) =
            match StagingArea::create(&self.config.work_dir, job.id).await {
                Ok(staging) => {
                    let staging = Arc::new(staging);
                    let outcome = self.drive(job, &staging, cancel, &mut report).await;

                    info!(job_id = %job.id, "🧹 Cleaning up ({})", JobStage::CleaningUp);
                    let cleanup_failures = staging.teardown().await;
                    (outcome, cleanup_failures)
                }
                Err(e) => (Err((JobStage::Init, PipelineError::Staging(e))), Vec::new()),
            };

        let result = Self::finish(job, outcome, report, cleanup_failures, started);
        match result.status {
            JobStatus::Failed => error!(
                job_id = %job.id,
                "❌ Job {} after {:?}: {}",
                JobStage::Failed,
                started.elapsed(),
                result.failure.as_ref().map(|f| f.message.as_str()).unwrap_or("unknown")
            ),
            status => info!(
                job_id = %job.id,
                "✅ Job {} ({:?}) in {:?}",
                JobStage::Done,
                status,
                started.elapsed()
            ),
        }
        result
    }

    async fn drive(
        &self,
        job: &Job,
        staging: &Arc<StagingArea>,
        cancel: &CancellationToken,
        report: &mut JobReport,
    ) -> Result<(), StageError> {
        info!(job_id = %job.id, "⬇️ Downloading {} ({})", job.source_key, JobStage::Downloading);
        let downloaded = tokio::select! {
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            downloaded = self.download(job, staging) => downloaded,
        };
        let source = downloaded.map_err(|e| (JobStage::Downloading, e))?;

        info!(
            job_id = %job.id,
            "🎞️ Encoding {} renditions ({})",
            job.ladder.len(),
            JobStage::Encoding
        );
        let variants = self
            .encode_all(job, staging, &source, cancel, report)
            .await
            .map_err(|e| (JobStage::Encoding, e))?;

        info!(job_id = %job.id, "📝 Composing master playlist ({})", JobStage::Composing);
        let master = playlist::compose(&job.asset_name, &variants)
            .map_err(|e| (JobStage::Composing, e))?;
        let master_path = staging.root().join(&master.file_name);
        staging.register(master_path.clone());
        tokio::fs::write(&master_path, master.render())
            .await
            .map_err(|e| (JobStage::Composing, PipelineError::Staging(e)))?;

        info!(job_id = %job.id, "⬆️ Publishing ({})", JobStage::Publishing);
        // Segments before their playlist, the master last.
        let mut artifacts = Vec::new();
        for variant in &variants {
            artifacts.extend(variant.segment_paths.iter().cloned());
            artifacts.push(variant.playlist_path.clone());
        }
        artifacts.push(master_path.clone());

        let publisher = ArtifactPublisher::new(
            self.store.clone(),
            staging.clone(),
            self.config.upload_attempts,
        );
        report.publish_results = publisher
            .publish(&artifacts, |path| self.remote_key(job, &file_name_of(path)), cancel)
            .await;
        report.master_playlist_key = report
            .publish_results
            .iter()
            .find(|r| r.ok && r.path == master_path)
            .map(|r| r.remote_key.clone());

        if cancel.is_cancelled() {
            return Err((JobStage::Publishing, PipelineError::Cancelled));
        }
        Ok(())
    }

    async fn download(&self, job: &Job, staging: &StagingArea) -> Result<PathBuf, PipelineError> {
        let download_error = |message: String| PipelineError::DownloadFailure {
            key: job.source_key.clone(),
            message,
        };

        let path = staging.acquire(job.source_extension());
        let body = self
            .store
            .get(&job.source_key)
            .await
            .map_err(|e| download_error(e.to_string()))?;

        let mut reader = body.into_async_read();
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| download_error(e.to_string()))?;
        let bytes = tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| download_error(e.to_string()))?;
        file.flush().await.map_err(|e| download_error(e.to_string()))?;

        info!("⬇️ Downloaded {} bytes to {}", bytes, path.display());
        Ok(path)
    }

    /// Encode every rendition, at most `max_concurrent_encodes` at a time.
    /// Successful variants come back in ladder order whatever order the
    /// encodes finish in.
    async fn encode_all(
        &self,
        job: &Job,
        staging: &Arc<StagingArea>,
        source: &Path,
        cancel: &CancellationToken,
        report: &mut JobReport,
    ) -> Result<Vec<VariantArtifact>, PipelineError> {
        let renditions = job.ladder.renditions();
        let worker = Arc::new(EncodeWorker::new(
            self.encoder.clone(),
            staging.clone(),
            &job.asset_name,
            &job.ladder.video_codec,
            &job.ladder.audio_codec,
        ));
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_encodes.max(1)));

        let mut tasks = JoinSet::new();
        for (index, rendition) in renditions.iter().cloned().enumerate() {
            let worker = worker.clone();
            let semaphore = semaphore.clone();
            let source = source.to_path_buf();
            let segment_duration = job.segment_duration;
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (index, worker.encode(&source, &rendition, segment_duration).await)
            });
        }

        let mut outcomes: Vec<Option<Result<VariantArtifact, PipelineError>>> =
            renditions.iter().map(|_| None).collect();
        let mut cancelled = false;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                joined = tasks.join_next() => Some(joined),
            };

            match next {
                None => {
                    warn!(job_id = %job.id, "encoding cancelled, stopping in-flight encodes");
                    tasks.shutdown().await;
                    cancelled = true;
                    break;
                }
                Some(None) => break,
                Some(Some(Ok((index, outcome)))) => outcomes[index] = Some(outcome),
                Some(Some(Err(join_error))) => {
                    error!(job_id = %job.id, "encode task failed to complete: {}", join_error);
                }
            }
        }

        let mut variants = Vec::new();
        for (rendition, outcome) in renditions.iter().zip(outcomes) {
            let outcome = match outcome {
                Some(outcome) => outcome,
                None => {
                    // Aborted or panicked before reporting back.
                    worker.register_leftovers(rendition).await;
                    let reason = if cancelled { "job cancelled" } else { "task did not complete" };
                    Err(PipelineError::EncodeFailure {
                        rendition: rendition.label.clone(),
                        cause: EncoderError::Aborted(reason.to_string()),
                    })
                }
            };

            match outcome {
                Ok(artifact) => {
                    report.variant_results.push(VariantResult::succeeded(&artifact));
                    variants.push(artifact);
                }
                Err(e) => report
                    .variant_results
                    .push(VariantResult::failed(&rendition.label, &e)),
            }
        }

        if cancelled {
            return Err(PipelineError::Cancelled);
        }
        if variants.is_empty() {
            return Err(PipelineError::AllRenditionsFailed {
                attempted: renditions.len(),
            });
        }
        Ok(variants)
    }

    fn finish(
        job: &Job,
        outcome: Result<(), StageError>,
        report: JobReport,
        cleanup_failures: Vec<CleanupFailure>,
        started: Instant,
    ) -> JobResult {
        let failure = outcome
            .err()
            .map(|(stage, error)| JobFailure::new(stage, &error));

        let any_item_failed = report.variant_results.iter().any(|v| !v.ok)
            || report.publish_results.iter().any(|p| !p.ok);

        let status = if failure.is_some() {
            JobStatus::Failed
        } else if any_item_failed {
            JobStatus::PartialSuccess
        } else {
            JobStatus::Success
        };

        JobResult {
            job_id: job.id,
            asset_name: job.asset_name.clone(),
            status,
            failure,
            variant_results: report.variant_results,
            publish_results: report.publish_results,
            master_playlist_key: report.master_playlist_key,
            cleanup_failures,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}
