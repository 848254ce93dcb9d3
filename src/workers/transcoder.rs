use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::modules::transcode::{Job, JobResult, JobStatus, PipelineConfig, PipelineOrchestrator};
use crate::state::AppState;

/// Transcode `{mp4_folder}/{source_file}` with the configured ladder and
/// publish the result under `{hls_folder}/{asset}/`.
pub async fn run_transcode_job(
    state: &AppState,
    source_file: &str,
    cancel: &CancellationToken,
) -> JobResult {
    info!("🎥 Starting transcode job for {}", source_file);

    let job = Job::for_source_file(
        &state.config.mp4_folder,
        source_file,
        state.config.ladder.clone(),
        state.config.segment_duration,
    );

    let orchestrator = PipelineOrchestrator::new(
        state.storage.clone(),
        state.encoder.clone(),
        PipelineConfig::from(&state.config),
    );

    let result = orchestrator.run_job(&job, cancel).await;

    match result.status {
        JobStatus::Success => info!(
            "✅ {} published {} files in {} ms",
            job.asset_name,
            result.uploaded(),
            result.elapsed_ms
        ),
        JobStatus::PartialSuccess => warn!(
            "⚠️ {} partially published: {} files uploaded, {} renditions failed, {} uploads failed",
            job.asset_name,
            result.uploaded(),
            result.variant_results.iter().filter(|v| !v.ok).count(),
            result.publish_results.iter().filter(|p| !p.ok).count()
        ),
        JobStatus::Failed => error!("❌ Failed to process {}", source_file),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ladder::RenditionLadder;
    use crate::config::settings::AppConfig;
    use crate::infrastructure::encoder::fake::FakeEncoder;
    use crate::infrastructure::storage::memory::MemoryBlobStore;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    fn config(work_dir: &Path) -> AppConfig {
        AppConfig {
            bucket_name: "videos".to_string(),
            bucket_region: "us-east-1".to_string(),
            access_key_id: "test".to_string(),
            secret_access_key: "test".to_string(),
            endpoint: None,
            mp4_folder: "uploads".to_string(),
            hls_folder: "streams".to_string(),
            source_file: "sample.mp4".to_string(),
            work_dir: work_dir.to_path_buf(),
            ladder: RenditionLadder::default(),
            segment_duration: 6,
            max_concurrent_encodes: 2,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            encode_timeout: Duration::from_secs(60),
            upload_attempts: 1,
        }
    }

    #[tokio::test]
    async fn runs_job_with_configured_folders() {
        let work = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryBlobStore::new());
        store.insert("uploads/trailer.mov", &b"source"[..]);
        let state = AppState::new(config(work.path()), store.clone(), Arc::new(FakeEncoder::new(2)));

        let result = run_transcode_job(&state, "trailer.mov", &CancellationToken::new()).await;

        assert_eq!(result.status, JobStatus::Success);
        assert_eq!(result.asset_name, "trailer_mov");
        assert_eq!(
            result.master_playlist_key.as_deref(),
            Some("streams/trailer_mov/trailer_mov_master.m3u8")
        );
        assert!(
            store
                .put_log()
                .iter()
                .all(|k| k.starts_with("streams/trailer_mov/"))
        );
    }
}
