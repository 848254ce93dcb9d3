use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use uuid::Uuid;

use super::error::{FailureKind, PipelineError};
use crate::config::ladder::{Rendition, RenditionLadder};

/// Replace every character that is unsafe in a path or key fragment with `_`.
///
/// `sample.mp4` becomes `sample_mp4`.
pub fn sanitize_asset_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        "asset".to_string()
    } else {
        sanitized
    }
}

/// One transcoding request. Immutable once built.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub source_key: String,
    pub asset_name: String,
    pub ladder: RenditionLadder,
    pub segment_duration: u32,
}

impl Job {
    pub fn new(
        source_key: &str,
        asset_name: &str,
        ladder: RenditionLadder,
        segment_duration: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_key: source_key.to_string(),
            asset_name: sanitize_asset_name(asset_name),
            ladder,
            segment_duration: segment_duration.max(1),
        }
    }

    /// Job for `{mp4_folder}/{file_name}`, named after the file.
    pub fn for_source_file(
        mp4_folder: &str,
        file_name: &str,
        ladder: RenditionLadder,
        segment_duration: u32,
    ) -> Self {
        let folder = mp4_folder.trim_end_matches('/');
        let source_key = if folder.is_empty() {
            file_name.to_string()
        } else {
            format!("{folder}/{file_name}")
        };
        Self::new(&source_key, file_name, ladder, segment_duration)
    }

    /// Extension of the source object, used for the staged copy.
    pub fn source_extension(&self) -> &str {
        Path::new(&self.source_key)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
    }
}

/// Output of one successful rendition encode.
#[derive(Debug, Clone)]
pub struct VariantArtifact {
    pub rendition: Rendition,
    pub playlist_path: PathBuf,
    /// Segments in temporal order.
    pub segment_paths: Vec<PathBuf>,
}

impl VariantArtifact {
    pub fn playlist_file_name(&self) -> String {
        file_name_of(&self.playlist_path)
    }
}

pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Init,
    Downloading,
    Encoding,
    Composing,
    Publishing,
    CleaningUp,
    Done,
    Failed,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStage::Init => "init",
            JobStage::Downloading => "downloading",
            JobStage::Encoding => "encoding",
            JobStage::Composing => "composing",
            JobStage::Publishing => "publishing",
            JobStage::CleaningUp => "cleaning_up",
            JobStage::Done => "done",
            JobStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    PartialSuccess,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct VariantResult {
    pub label: String,
    pub ok: bool,
    pub playlist: Option<String>,
    pub segment_count: usize,
    pub error: Option<String>,
}

impl VariantResult {
    pub fn succeeded(artifact: &VariantArtifact) -> Self {
        Self {
            label: artifact.rendition.label.clone(),
            ok: true,
            playlist: Some(artifact.playlist_file_name()),
            segment_count: artifact.segment_paths.len(),
            error: None,
        }
    }

    pub fn failed(label: &str, error: &PipelineError) -> Self {
        Self {
            label: label.to_string(),
            ok: false,
            playlist: None,
            segment_count: 0,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishResult {
    pub path: PathBuf,
    pub remote_key: String,
    pub ok: bool,
    pub attempts: u32,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Fatal error that ended a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub stage: JobStage,
    pub message: String,
}

impl JobFailure {
    pub fn new(stage: JobStage, error: &PipelineError) -> Self {
        Self {
            kind: error.kind(),
            stage,
            message: error.to_string(),
        }
    }
}

/// Outcome of one job, item by item.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub job_id: Uuid,
    pub asset_name: String,
    pub status: JobStatus,
    pub failure: Option<JobFailure>,
    pub variant_results: Vec<VariantResult>,
    pub publish_results: Vec<PublishResult>,
    pub master_playlist_key: Option<String>,
    pub cleanup_failures: Vec<CleanupFailure>,
    pub elapsed_ms: u64,
}

impl JobResult {
    pub fn uploaded(&self) -> usize {
        self.publish_results.iter().filter(|r| r.ok).count()
    }
}
