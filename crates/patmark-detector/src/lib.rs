//! Square fiducial pattern detection.
//!
//! Pipeline per frame:
//! - binarization (fixed or Gaussian-adaptive inverse threshold, optional
//!   erosion and dilation),
//! - contour tracing and convex-quadrilateral filtering with a deterministic
//!   corner order and sub-pixel refined corners,
//! - perspective normalization of each candidate to a square patch,
//! - identification against a `patmark_library::TemplateLibrary`,
//! - pose estimation through an [`patmark_core::ExtrinsicsSolver`].
//!
//! All images are frame-local; a [`PatternDetector`] only holds its
//! configuration.

mod binarize;
mod candidate;
mod detector;
mod frame;
mod io;
mod normalize;
mod polygon;
mod subpix;

pub use binarize::{binarize, threshold_gray, BinarizationConfig, Binarized, ThresholdMode};
pub use candidate::{extract_candidates, BoundingBox, Candidate, CandidateParams};
pub use detector::{
    DetectError, DetectedPattern, MonitorStage, PatternDetector, PatternDetectorParams,
    PipelineOutput,
};
pub use frame::{Frame, PixelFormat};
pub use io::{ConfigIoError, PatternDetectConfig, PatternDetectReport};
pub use normalize::{normalize, NormalizeError};
pub use subpix::{refine_corners, SubPixParams};
