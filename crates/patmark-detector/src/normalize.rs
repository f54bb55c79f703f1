//! Perspective rectification of a candidate to the canonical square patch.

use nalgebra::Point2;
use patmark_core::{homography_from_4pt, warp_perspective_gray, GrayImage, GrayImageView};

use crate::BoundingBox;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("corners do not admit a homography")]
    DegenerateQuad,
    #[error("bounding box has zero area")]
    EmptyBoundingBox,
    #[error("pattern size {0} is too small")]
    InvalidPatternSize(usize),
}

/// Warp the quadrilateral `corners` (image pixels, ordered top-left,
/// top-right, bottom-right, bottom-left) into a `size × size` patch.
///
/// The gray image is cropped to `bbox` first; corner `k` lands on pixel
/// centre `(0,0)`, `(size-1,0)`, `(size-1,size-1)` or `(0,size-1)`. Pixels
/// that map outside the crop read as zero.
pub fn normalize(
    gray: &GrayImageView<'_>,
    corners: &[Point2<f32>; 4],
    bbox: &BoundingBox,
    size: usize,
) -> Result<GrayImage, NormalizeError> {
    if size < 2 {
        return Err(NormalizeError::InvalidPatternSize(size));
    }
    if bbox.width == 0 || bbox.height == 0 {
        return Err(NormalizeError::EmptyBoundingBox);
    }

    let crop = GrayImage::crop(gray, bbox.x, bbox.y, bbox.width, bbox.height);
    let (ox, oy) = (bbox.x as f32, bbox.y as f32);
    let local = corners.map(|p| Point2::new(p.x - ox, p.y - oy));

    let s = (size - 1) as f32;
    let square = [
        Point2::new(0.0, 0.0),
        Point2::new(s, 0.0),
        Point2::new(s, s),
        Point2::new(0.0, s),
    ];

    let h_crop_from_patch =
        homography_from_4pt(&square, &local).ok_or(NormalizeError::DegenerateQuad)?;
    Ok(warp_perspective_gray(
        &crop.view(),
        &h_crop_from_patch,
        size,
        size,
    ))
}
