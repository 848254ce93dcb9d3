use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{EncodeRequest, Encoder, EncoderError};

/// Lines of ffmpeg stderr kept in error messages.
const STDERR_TAIL_LINES: usize = 20;

/// Runs the `ffmpeg` CLI to produce a VOD HLS rendition.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: PathBuf,
    timeout: Duration,
}

impl FfmpegEncoder {
    pub fn new(program: PathBuf, timeout: Duration) -> Self {
        Self { program, timeout }
    }

    /// Command line for one rendition. `-hls_list_size 0` keeps every
    /// segment in the playlist so the output is a full VOD list.
    pub fn build_args(request: &EncodeRequest) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();
        args.extend(["-y", "-nostdin", "-i"].map(String::from));
        args.push(request.input.to_string_lossy().into_owned());
        args.extend([
            "-c:v".to_string(),
            request.video_codec.clone(),
            "-b:v".to_string(),
            request.video_bitrate.clone(),
            "-c:a".to_string(),
            request.audio_codec.clone(),
            "-b:a".to_string(),
            request.audio_bitrate.clone(),
            "-vf".to_string(),
            format!("scale={}", request.resolution),
            "-f".to_string(),
            "hls".to_string(),
            "-hls_time".to_string(),
            request.segment_duration.to_string(),
            "-hls_list_size".to_string(),
            "0".to_string(),
            "-hls_playlist_type".to_string(),
            "vod".to_string(),
            "-start_number".to_string(),
            "0".to_string(),
            "-hls_segment_filename".to_string(),
            request.segment_pattern.to_string_lossy().into_owned(),
        ]);
        args.push(request.playlist_path.to_string_lossy().into_owned());
        args
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode(&self, request: &EncodeRequest) -> Result<(), EncoderError> {
        let args = Self::build_args(request);
        debug!("{} {}", self.program.display(), args.join(" "));

        let child = Command::new(&self.program)
            .args(&args)
            .current_dir(&request.output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            // Dropping the future (timeout, cancellation) kills ffmpeg.
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EncoderError::Spawn {
                program: self.program.display().to_string(),
                message: e.to_string(),
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| EncoderError::Timeout(self.timeout))??;

        if !output.status.success() {
            return Err(EncoderError::ExitStatus {
                status: output.status.to_string(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ladder::Resolution;
    use std::path::Path;

    fn request(dir: &Path) -> EncodeRequest {
        EncodeRequest {
            input: dir.join("source.mp4"),
            output_dir: dir.to_path_buf(),
            resolution: Resolution::new(854, 480),
            video_codec: "h264".to_string(),
            video_bitrate: "1000k".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
            segment_duration: 10,
            segment_pattern: dir.join("sample_mp4_854x480_%03d.ts"),
            playlist_path: dir.join("sample_mp4_854x480.m3u8"),
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn args_carry_rendition_targets() {
        let dir = tempfile::tempdir().unwrap();
        let args = FfmpegEncoder::build_args(&request(dir.path()));

        assert_eq!(value_after(&args, "-c:v"), Some("h264"));
        assert_eq!(value_after(&args, "-b:v"), Some("1000k"));
        assert_eq!(value_after(&args, "-c:a"), Some("aac"));
        assert_eq!(value_after(&args, "-b:a"), Some("128k"));
        assert_eq!(value_after(&args, "-vf"), Some("scale=854x480"));
        assert_eq!(value_after(&args, "-hls_time"), Some("10"));
        assert_eq!(value_after(&args, "-hls_list_size"), Some("0"));
        assert_eq!(value_after(&args, "-start_number"), Some("0"));
        assert!(
            value_after(&args, "-hls_segment_filename")
                .unwrap()
                .ends_with("sample_mp4_854x480_%03d.ts")
        );
        assert!(args.last().unwrap().ends_with("sample_mp4_854x480.m3u8"));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = FfmpegEncoder::new(
            PathBuf::from("nonexistent_encoder_xyz_12345"),
            Duration::from_secs(5),
        );

        let err = encoder.encode(&request(dir.path())).await.unwrap_err();
        assert!(matches!(err, EncoderError::Spawn { .. }), "unexpected: {err}");
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let stderr: String = (0..50).map(|i| format!("line {i}\n")).collect();
        let tail = stderr_tail(stderr.as_bytes());
        assert!(tail.starts_with("line 30"));
        assert!(tail.ends_with("line 49"));
    }
}
