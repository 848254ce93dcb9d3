//! Encoding-capability boundary.
//!
//! An [`Encoder`] turns one input file into one HLS rendition on disk: a
//! variant playlist plus indexed `.ts` segments named after
//! [`EncodeRequest::segment_pattern`]. What happens inside (codec math,
//! process management) is the implementation's business.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ladder::Resolution;

#[cfg(test)]
pub mod fake;
pub mod ffmpeg;

#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },
    #[error("encoder exited with {status}: {stderr}")]
    ExitStatus { status: String, stderr: String },
    #[error("encoder timed out after {0:?}")]
    Timeout(Duration),
    #[error("encoder I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoder produced no usable output: {0}")]
    MissingOutput(String),
    #[error("encode task aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub resolution: Resolution,
    pub video_codec: String,
    pub video_bitrate: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub segment_duration: u32,
    /// Segment path with a `%03d` placeholder for the zero-based index.
    pub segment_pattern: PathBuf,
    pub playlist_path: PathBuf,
}

#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(&self, request: &EncodeRequest) -> Result<(), EncoderError>;
}
