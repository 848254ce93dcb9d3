//! HLS transcoding pipeline: one source object in, an ABR rendition set
//! plus master playlist out.

pub mod encode;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod playlist;
pub mod publish;
pub mod staging;

pub use model::{Job, JobResult, JobStatus};
pub use orchestrator::{PipelineConfig, PipelineOrchestrator};
