use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::infrastructure::encoder::EncoderError;
use crate::infrastructure::storage::StorageError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to download source {key}: {message}")]
    DownloadFailure { key: String, message: String },
    #[error("rendition {rendition} failed: {cause}")]
    EncodeFailure {
        rendition: String,
        #[source]
        cause: EncoderError,
    },
    #[error("all {attempted} renditions failed to encode")]
    AllRenditionsFailed { attempted: usize },
    #[error("no encoded variants to build a master playlist from")]
    EmptyLadderResult,
    #[error("failed to publish {}: {cause}", .file.display())]
    PublishFailure {
        file: PathBuf,
        #[source]
        cause: StorageError,
    },
    #[error("failed to remove {}: {cause}", .path.display())]
    CleanupFailure {
        path: PathBuf,
        #[source]
        cause: std::io::Error,
    },
    #[error("staging area error: {0}")]
    Staging(#[from] std::io::Error),
    #[error("job cancelled")]
    Cancelled,
}

/// Serializable tag for a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    DownloadFailure,
    EncodeFailure,
    AllRenditionsFailed,
    EmptyLadderResult,
    PublishFailure,
    CleanupFailure,
    Staging,
    Cancelled,
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::DownloadFailure { .. } => FailureKind::DownloadFailure,
            PipelineError::EncodeFailure { .. } => FailureKind::EncodeFailure,
            PipelineError::AllRenditionsFailed { .. } => FailureKind::AllRenditionsFailed,
            PipelineError::EmptyLadderResult => FailureKind::EmptyLadderResult,
            PipelineError::PublishFailure { .. } => FailureKind::PublishFailure,
            PipelineError::CleanupFailure { .. } => FailureKind::CleanupFailure,
            PipelineError::Staging(_) => FailureKind::Staging,
            PipelineError::Cancelled => FailureKind::Cancelled,
        }
    }
}
