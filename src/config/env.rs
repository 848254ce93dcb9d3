use std::env;
use std::str::FromStr;

pub enum EnvKey {
    BucketName,
    BucketRegion,
    AccessKeyId,
    SecretAccessKey,
    Endpoint,
    Mp4Folder,
    HlsFolder,
    SourceFile,
    WorkDir,
    LadderPath,
    SegmentDuration,
    MaxConcurrentEncodes,
    FfmpegPath,
    EncodeTimeoutSecs,
    UploadAttempts,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::BucketName => "BUCKET_NAME",
            EnvKey::BucketRegion => "S3_BUCKET_REGION",
            EnvKey::AccessKeyId => "ACCESS_KEY_ID",
            EnvKey::SecretAccessKey => "SECRET_ACCESS_KEY",
            EnvKey::Endpoint => "S3_ENDPOINT",
            EnvKey::Mp4Folder => "MP4_FOLDER",
            EnvKey::HlsFolder => "HLS_FOLDER",
            EnvKey::SourceFile => "SOURCE_FILE",
            EnvKey::WorkDir => "WORK_DIR",
            EnvKey::LadderPath => "LADDER_PATH",
            EnvKey::SegmentDuration => "SEGMENT_DURATION",
            EnvKey::MaxConcurrentEncodes => "MAX_CONCURRENT_ENCODES",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::EncodeTimeoutSecs => "ENCODE_TIMEOUT_SECS",
            EnvKey::UploadAttempts => "UPLOAD_ATTEMPTS",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_opt(key: EnvKey) -> Option<String> {
    env::var(key.as_str()).ok().filter(|v| !v.trim().is_empty())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
