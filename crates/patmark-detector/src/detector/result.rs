use nalgebra::Point2;
use patmark_core::{GrayImage, Pose};
use serde::{Deserialize, Serialize};

/// An identified marker in one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    /// Template id.
    pub id: u32,
    /// Stored rotation `0..=3` that matched.
    pub orientation: u8,
    /// Correlation score of the match.
    pub confidence: f64,
    /// Image corners of the template's top-left, top-right, bottom-right and
    /// bottom-left corners, refined to sub-pixel precision.
    pub vertices: [Point2<f32>; 4],
    /// Marker-to-camera transform, when the extrinsics solver produced one.
    #[serde(default)]
    pub pose: Option<Pose>,
    /// Physical side length used for the pose.
    pub size: f64,
}

/// Result of [`PatternDetector::run`](crate::PatternDetector::run).
#[derive(Clone, Debug)]
pub enum PipelineOutput {
    Patterns(Vec<DetectedPattern>),
    Binary(GrayImage),
    /// One patch per candidate, in candidate order.
    Normalized(Vec<GrayImage>),
}
