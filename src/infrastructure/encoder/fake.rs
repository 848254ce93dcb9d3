//! Scripted [`Encoder`] for pipeline tests: writes a small playlist and
//! dummy segments instead of running ffmpeg.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{EncodeRequest, Encoder, EncoderError};

pub struct FakeEncoder {
    segments: usize,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    completed: Mutex<Vec<String>>,
}

pub fn segment_path(request: &EncodeRequest, index: usize) -> PathBuf {
    let pattern = request.segment_pattern.to_string_lossy();
    PathBuf::from(pattern.replace("%03d", &format!("{index:03}")))
}

impl FakeEncoder {
    pub fn new(segments: usize) -> Self {
        Self {
            segments,
            failing: HashSet::new(),
            delays: HashMap::new(),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            completed: Mutex::new(Vec::new()),
        }
    }

    /// Renditions at `resolution` write one segment, then fail.
    pub fn failing(mut self, resolution: &str) -> Self {
        self.failing.insert(resolution.to_string());
        self
    }

    pub fn delayed(mut self, resolution: &str, delay: Duration) -> Self {
        self.delays.insert(resolution.to_string(), delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most encodes ever running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Resolutions in the order their encodes finished.
    pub fn completion_order(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Encoder for FakeEncoder {
    async fn encode(&self, request: &EncodeRequest) -> Result<(), EncoderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        let outcome = self.write_rendition(request).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

impl FakeEncoder {
    async fn write_rendition(&self, request: &EncodeRequest) -> Result<(), EncoderError> {
        let resolution = request.resolution.to_string();

        if let Some(delay) = self.delays.get(&resolution) {
            tokio::time::sleep(*delay).await;
        }

        if self.failing.contains(&resolution) {
            tokio::fs::write(segment_path(request, 0), b"partial").await?;
            self.completed.lock().unwrap().push(resolution);
            return Err(EncoderError::ExitStatus {
                status: "exit status: 1".to_string(),
                stderr: "Conversion failed!".to_string(),
            });
        }

        let mut playlist = format!(
            "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:{}\n#EXT-X-MEDIA-SEQUENCE:0\n#EXT-X-PLAYLIST-TYPE:VOD\n",
            request.segment_duration
        );
        for index in 0..self.segments {
            let path = segment_path(request, index);
            tokio::fs::write(&path, format!("segment {index} of {resolution}")).await?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            playlist.push_str(&format!("#EXTINF:{}.000000,\n{name}\n", request.segment_duration));
        }
        playlist.push_str("#EXT-X-ENDLIST\n");
        tokio::fs::write(&request.playlist_path, playlist).await?;

        self.completed.lock().unwrap().push(resolution);
        Ok(())
    }
}
