//! Square fiducial pattern detection.
//!
//! `patmark` finds dark square markers in video frames, identifies each one
//! against a library of known template images (in any of four 90°
//! orientations) and estimates the marker pose from the camera model.
//!
//! ## Quickstart
//!
//! ```no_run
//! use patmark::core::{CameraIntrinsics, CameraModel, RadialTangentialDistortion};
//! use patmark::detector::{PatternDetector, PatternDetectorParams};
//! use patmark::library::PatchLayout;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let frame = image::ImageReader::open("frame.png")?.decode()?;
//!     let template = image::ImageReader::open("marker_7.png")?.decode()?.to_luma8();
//!
//!     let params = PatternDetectorParams::default();
//!     let library = patmark::detect::library_from_images(params.layout, [(7, &template)])?;
//!     let detector = PatternDetector::new(params)?;
//!     let camera = CameraModel::new(
//!         CameraIntrinsics { fx: 800.0, fy: 800.0, cx: 320.0, cy: 240.0 },
//!         RadialTangentialDistortion::default(),
//!     );
//!
//!     for p in patmark::detect::detect_patterns_dynamic(&frame, &detector, &camera, &library)? {
//!         println!("pattern {} rot {} conf {:.2}", p.id, p.orientation, p.confidence);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## API map
//! - [`core`]: gray images, homographies, camera model and the planar pose solver.
//! - [`library`]: patch layouts, the template library and the correlation matcher.
//! - [`detector`]: binarization, quad candidates, normalization and the orchestrator.
//! - `detect` (feature `image`): one-call helpers over `image` buffers.

pub use patmark_core as core;
pub use patmark_detector as detector;
pub use patmark_library as library;

pub use patmark_core::{CameraModel, Pose};
pub use patmark_detector::{DetectedPattern, PatternDetector, PatternDetectorParams};
pub use patmark_library::{PatchLayout, TemplateLibrary};

#[cfg(feature = "image")]
pub mod detect;
