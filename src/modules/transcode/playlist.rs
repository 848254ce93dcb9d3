//! Master playlist composition. Pure: no I/O.

use super::error::PipelineError;
use super::model::VariantArtifact;

pub fn master_file_name(asset_base_name: &str) -> String {
    format!("{asset_base_name}_master.m3u8")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterEntry {
    /// Bits per second.
    pub bandwidth: u64,
    pub resolution: String,
    /// Variant playlist file name, relative to the master.
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterPlaylist {
    pub file_name: String,
    pub entries: Vec<MasterEntry>,
}

impl MasterPlaylist {
    pub fn render(&self) -> String {
        let mut out = String::from("#EXTM3U\n");
        for entry in &self.entries {
            out.push_str(&format!(
                "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}\n{}\n",
                entry.bandwidth, entry.resolution, entry.uri
            ));
        }
        out
    }
}

/// Build the master playlist. Entries keep the order of `variants`, which
/// the caller passes in ladder order.
pub fn compose(
    asset_base_name: &str,
    variants: &[VariantArtifact],
) -> Result<MasterPlaylist, PipelineError> {
    if variants.is_empty() {
        return Err(PipelineError::EmptyLadderResult);
    }

    let entries = variants
        .iter()
        .map(|variant| MasterEntry {
            bandwidth: variant.rendition.bandwidth_estimate,
            resolution: variant.rendition.resolution.to_string(),
            uri: variant.playlist_file_name(),
        })
        .collect();

    Ok(MasterPlaylist {
        file_name: master_file_name(asset_base_name),
        entries,
    })
}
