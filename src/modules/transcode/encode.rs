use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use super::error::PipelineError;
use super::model::VariantArtifact;
use super::staging::StagingArea;
use crate::config::ladder::Rendition;
use crate::infrastructure::encoder::{EncodeRequest, Encoder, EncoderError};

pub fn playlist_file_name(asset_base_name: &str, label: &str) -> String {
    format!("{asset_base_name}_{label}.m3u8")
}

pub fn segment_file_name(asset_base_name: &str, label: &str, index: usize) -> String {
    format!("{asset_base_name}_{label}_{index:03}.ts")
}

fn segment_pattern(asset_base_name: &str, label: &str) -> String {
    format!("{asset_base_name}_{label}_%03d.ts")
}

/// Encodes single renditions of one job's source into its staging area.
pub struct EncodeWorker {
    encoder: Arc<dyn Encoder>,
    staging: Arc<StagingArea>,
    asset_base_name: String,
    video_codec: String,
    audio_codec: String,
}

impl EncodeWorker {
    pub fn new(
        encoder: Arc<dyn Encoder>,
        staging: Arc<StagingArea>,
        asset_base_name: &str,
        video_codec: &str,
        audio_codec: &str,
    ) -> Self {
        Self {
            encoder,
            staging,
            asset_base_name: asset_base_name.to_string(),
            video_codec: video_codec.to_string(),
            audio_codec: audio_codec.to_string(),
        }
    }

    fn playlist_path(&self, rendition: &Rendition) -> PathBuf {
        self.staging
            .root()
            .join(playlist_file_name(&self.asset_base_name, &rendition.label))
    }

    fn request_for(
        &self,
        source: &Path,
        rendition: &Rendition,
        segment_duration: u32,
    ) -> EncodeRequest {
        let output_dir = self.staging.root().to_path_buf();
        EncodeRequest {
            input: source.to_path_buf(),
            segment_pattern: output_dir.join(segment_pattern(&self.asset_base_name, &rendition.label)),
            playlist_path: self.playlist_path(rendition),
            output_dir,
            resolution: rendition.resolution,
            video_codec: self.video_codec.clone(),
            video_bitrate: rendition.video_bitrate.clone(),
            audio_codec: self.audio_codec.clone(),
            audio_bitrate: rendition.audio_bitrate.clone(),
            segment_duration,
        }
    }

    /// Encode `source` into one rendition cut into `segment_duration`-second
    /// segments.
    pub async fn encode(
        &self,
        source: &Path,
        rendition: &Rendition,
        segment_duration: u32,
    ) -> Result<VariantArtifact, PipelineError> {
        let started = Instant::now();
        info!("🎞️ HLS conversion starting for {}", rendition.label);

        let request = self.request_for(source, rendition, segment_duration);
        let outcome = match self.encoder.encode(&request).await {
            Ok(()) => self.collect_outputs(rendition).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(artifact) => {
                self.staging.register(artifact.playlist_path.clone());
                for segment in &artifact.segment_paths {
                    self.staging.register(segment.clone());
                }
                info!(
                    "🎞️ HLS conversion done for {} ({} segments, {:?})",
                    rendition.label,
                    artifact.segment_paths.len(),
                    started.elapsed()
                );
                Ok(artifact)
            }
            Err(cause) => {
                warn!("❌ HLS conversion failed for {}: {}", rendition.label, cause);
                self.register_leftovers(rendition).await;
                Err(PipelineError::EncodeFailure {
                    rendition: rendition.label.clone(),
                    cause,
                })
            }
        }
    }

    /// Read the variant playlist the encoder wrote and check every segment
    /// it lists is on disk.
    async fn collect_outputs(&self, rendition: &Rendition) -> Result<VariantArtifact, EncoderError> {
        let playlist_path = self.playlist_path(rendition);
        let body = tokio::fs::read_to_string(&playlist_path).await.map_err(|e| {
            EncoderError::MissingOutput(format!("{}: {}", playlist_path.display(), e))
        })?;

        let mut segment_paths = Vec::new();
        for uri in body.lines().map(str::trim) {
            if uri.is_empty() || uri.starts_with('#') {
                continue;
            }
            let name = Path::new(uri).file_name().ok_or_else(|| {
                EncoderError::MissingOutput(format!("unusable segment uri '{uri}'"))
            })?;
            let path = self.staging.root().join(name);
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                // Whatever did get written is still picked up as leftovers.
                return Err(EncoderError::MissingOutput(format!(
                    "segment {} listed but not written",
                    path.display()
                )));
            }
            segment_paths.push(path);
        }

        if segment_paths.is_empty() {
            return Err(EncoderError::MissingOutput(format!(
                "{} lists no segments",
                playlist_path.display()
            )));
        }

        Ok(VariantArtifact {
            rendition: rendition.clone(),
            playlist_path,
            segment_paths,
        })
    }

    /// Register whatever a failed or aborted encode left behind, probing the
    /// deterministic output names only.
    pub async fn register_leftovers(&self, rendition: &Rendition) {
        let playlist = self.playlist_path(rendition);
        let mut candidates = vec![playlist.clone(), playlist.with_extension("m3u8.tmp")];

        let mut index = 0;
        loop {
            let segment = self.staging.root().join(segment_file_name(
                &self.asset_base_name,
                &rendition.label,
                index,
            ));
            if !tokio::fs::try_exists(&segment).await.unwrap_or(false) {
                break;
            }
            candidates.push(segment);
            index += 1;
        }

        for path in candidates {
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                self.staging.register(path);
            }
        }
    }
}
