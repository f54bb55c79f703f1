//! Core types and utilities for square pattern detection.
//!
//! This crate is intentionally small and purely geometric. It knows nothing
//! about contours, templates or matching: it provides the grayscale image
//! types, bilinear sampling, 4-point homographies with perspective warping,
//! the camera model and a planar extrinsics solver.

mod camera;
mod homography;
mod image;
mod logger;
mod pose;

pub use camera::{CameraIntrinsics, CameraModel, RadialTangentialDistortion};
pub use homography::{homography_from_4pt, warp_perspective_gray, Homography};
pub use image::{sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView};
pub use pose::{marker_object_points, ExtrinsicsSolver, PlanarPoseSolver, Pose};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
