//! Per-frame detection pipeline.
//!
//! This module wires together binarization, quad candidate extraction,
//! normalization, template identification and pose estimation.

mod error;
mod params;
mod pipeline;
mod result;

pub use error::DetectError;
pub use params::{MonitorStage, PatternDetectorParams};
pub use pipeline::PatternDetector;
pub use result::{DetectedPattern, PipelineOutput};
