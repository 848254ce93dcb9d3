use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::config::env::{self, EnvKey};
use crate::config::ladder::{LadderError, RenditionLadder};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid ladder: {0}")]
    Ladder(#[from] LadderError),
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bucket_name: String,
    pub bucket_region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint: Option<String>,
    pub mp4_folder: String,
    pub hls_folder: String,
    pub source_file: String,
    pub work_dir: PathBuf,
    pub ladder: RenditionLadder,
    pub segment_duration: u32,
    pub max_concurrent_encodes: usize,
    pub ffmpeg_path: PathBuf,
    pub encode_timeout: Duration,
    pub upload_attempts: u32,
}

fn required(key: EnvKey) -> Result<String, ConfigError> {
    let name = key.as_str();
    env::get(key).map_err(|_| ConfigError::MissingVar(name))
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let ladder = match env::get_opt(EnvKey::LadderPath) {
            Some(path) => RenditionLadder::from_file(Path::new(&path))?,
            None => RenditionLadder::default(),
        };

        let default_workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Ok(Self {
            bucket_name: required(EnvKey::BucketName)?,
            bucket_region: env::get_or(EnvKey::BucketRegion, "us-east-1"),
            access_key_id: required(EnvKey::AccessKeyId)?,
            secret_access_key: required(EnvKey::SecretAccessKey)?,
            endpoint: env::get_opt(EnvKey::Endpoint),
            mp4_folder: env::get_or(EnvKey::Mp4Folder, "mp4"),
            hls_folder: env::get_or(EnvKey::HlsFolder, "hls"),
            source_file: env::get_or(EnvKey::SourceFile, "sample.mp4"),
            work_dir: env::get_opt(EnvKey::WorkDir)
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            ladder,
            segment_duration: env::get_parsed(EnvKey::SegmentDuration, 10u32).max(1),
            max_concurrent_encodes: env::get_parsed(EnvKey::MaxConcurrentEncodes, default_workers)
                .max(1),
            ffmpeg_path: PathBuf::from(env::get_or(EnvKey::FfmpegPath, "ffmpeg")),
            encode_timeout: Duration::from_secs(env::get_parsed(EnvKey::EncodeTimeoutSecs, 3600)),
            upload_attempts: env::get_parsed(EnvKey::UploadAttempts, 2u32).max(1),
        })
    }
}
