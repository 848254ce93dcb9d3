//! Rendition ladder: the fixed set of target renditions a job produces.
//!
//! The ladder is plain configuration. It is either the built-in three-rung
//! ladder or a JSON file pointed to by `LADDER_PATH`.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LadderError {
    #[error("invalid resolution '{0}', expected WxH")]
    InvalidResolution(String),
    #[error("ladder has no renditions")]
    Empty,
    #[error("duplicate rendition label '{0}'")]
    DuplicateLabel(String),
    #[error("rendition label '{0}' contains characters unsafe for a key")]
    UnsafeLabel(String),
    #[error("failed to read ladder file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse ladder: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Frame size in pixels, written as `WxH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = LadderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LadderError::InvalidResolution(s.to_string());
        let (w, h) = s.trim().split_once('x').ok_or_else(invalid)?;
        let width: u32 = w.parse().map_err(|_| invalid())?;
        let height: u32 = h.parse().map_err(|_| invalid())?;

        // libx264 rejects odd dimensions
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(invalid());
        }

        Ok(Self { width, height })
    }
}

impl TryFrom<String> for Resolution {
    type Error = LadderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.to_string()
    }
}

/// One rung of the ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rendition {
    pub label: String,
    pub resolution: Resolution,
    pub video_bitrate: String,
    pub audio_bitrate: String,
    /// Static `BANDWIDTH` value for the master playlist, in bits per second.
    pub bandwidth_estimate: u64,
}

impl Rendition {
    pub fn new(
        resolution: Resolution,
        video_bitrate: &str,
        audio_bitrate: &str,
        bandwidth_estimate: u64,
    ) -> Self {
        Self {
            label: resolution.to_string(),
            resolution,
            video_bitrate: video_bitrate.to_string(),
            audio_bitrate: audio_bitrate.to_string(),
            bandwidth_estimate,
        }
    }
}

/// On-disk shape of a ladder entry.
#[derive(Debug, Deserialize)]
struct RenditionEntry {
    #[serde(default)]
    label: Option<String>,
    resolution: Resolution,
    video_bitrate: String,
    audio_bitrate: String,
    bandwidth: u64,
}

impl From<RenditionEntry> for Rendition {
    fn from(entry: RenditionEntry) -> Self {
        Self {
            label: entry.label.unwrap_or_else(|| entry.resolution.to_string()),
            resolution: entry.resolution,
            video_bitrate: entry.video_bitrate,
            audio_bitrate: entry.audio_bitrate,
            bandwidth_estimate: entry.bandwidth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenditionLadder {
    renditions: Vec<Rendition>,
    pub video_codec: String,
    pub audio_codec: String,
}

impl RenditionLadder {
    pub fn new(renditions: Vec<Rendition>) -> Result<Self, LadderError> {
        if renditions.is_empty() {
            return Err(LadderError::Empty);
        }

        let mut seen = HashSet::new();
        for rendition in &renditions {
            let safe = rendition
                .label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            if rendition.label.is_empty() || !safe {
                return Err(LadderError::UnsafeLabel(rendition.label.clone()));
            }
            if !seen.insert(rendition.label.as_str()) {
                return Err(LadderError::DuplicateLabel(rendition.label.clone()));
            }
        }

        Ok(Self {
            renditions,
            video_codec: "h264".to_string(),
            audio_codec: "aac".to_string(),
        })
    }

    pub fn from_json(json: &str) -> Result<Self, LadderError> {
        let entries: Vec<RenditionEntry> = serde_json::from_str(json)?;
        Self::new(entries.into_iter().map(Rendition::from).collect())
    }

    pub fn from_file(path: &Path) -> Result<Self, LadderError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn renditions(&self) -> &[Rendition] {
        &self.renditions
    }

    pub fn len(&self) -> usize {
        self.renditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renditions.is_empty()
    }
}

impl Default for RenditionLadder {
    fn default() -> Self {
        Self {
            renditions: vec![
                Rendition::new(Resolution::new(320, 180), "500k", "64k", 676_800),
                Rendition::new(Resolution::new(854, 480), "1000k", "128k", 1_353_600),
                Rendition::new(Resolution::new(1280, 720), "2500k", "192k", 3_230_400),
            ],
            video_codec: "h264".to_string(),
            audio_codec: "aac".to_string(),
        }
    }
}
