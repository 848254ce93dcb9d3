//! Single-job HLS packager: pulls a source video from object storage,
//! encodes a fixed rendition ladder with ffmpeg, writes a master playlist
//! and publishes everything back under one asset prefix.

pub mod config;
pub mod infrastructure;
pub mod modules;
pub mod state;
pub mod workers;
