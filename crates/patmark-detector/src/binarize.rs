//! Frame binarization: grayscale conversion, inverse thresholding and
//! optional morphology.
//!
//! Foreground (255) marks pixels darker than the threshold, so dark markers on
//! a light background become white blobs for contour tracing.

use image::{ImageBuffer, Luma};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{dilate, erode};
use patmark_core::GrayImage;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{DetectError, Frame};

/// Thresholding policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    /// Debug bypass: the "binary" image is the grayscale frame itself.
    /// Color frames come out converted, since the binary image is
    /// single-channel. No erosion or dilation is applied.
    None,
    /// Global inverse threshold at `fixed_threshold`.
    Fixed,
    /// Inverse threshold against a Gaussian-weighted local mean.
    #[default]
    Adaptive,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinarizationConfig {
    pub mode: ThresholdMode,
    /// Pixels at or below this value become foreground in `Fixed` mode.
    pub fixed_threshold: u8,
    /// Odd neighbourhood size of the adaptive local mean. Even values are
    /// bumped to the next odd one, values below 3 are raised to 3.
    pub adaptive_block_size: u32,
    /// Constant subtracted from the local mean in `Adaptive` mode.
    pub adaptive_offset: f32,
    /// Apply a 3×3 erosion after thresholding.
    pub erode: bool,
    /// Apply a 3×3 dilation after thresholding (and after erosion).
    pub dilate: bool,
}

impl Default for BinarizationConfig {
    fn default() -> Self {
        Self {
            mode: ThresholdMode::Adaptive,
            fixed_threshold: 40,
            adaptive_block_size: 45,
            adaptive_offset: 5.0,
            erode: false,
            dilate: true,
        }
    }
}

impl BinarizationConfig {
    /// Block size actually used by the adaptive threshold.
    pub fn effective_block_size(&self) -> u32 {
        self.adaptive_block_size.max(3) | 1
    }
}

/// Frame-local images produced by [`binarize`].
#[derive(Clone, Debug)]
pub struct Binarized {
    pub gray: GrayImage,
    pub binary: GrayImage,
}

/// Convert `frame` to grayscale and threshold it according to `cfg`.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "debug",
        skip_all,
        fields(w = frame.width, h = frame.height, mode = ?cfg.mode)
    )
)]
pub fn binarize(frame: &Frame<'_>, cfg: &BinarizationConfig) -> Result<Binarized, DetectError> {
    let gray = frame.to_gray()?;
    let binary = threshold_gray(&gray, cfg);
    Ok(Binarized { gray, binary })
}

/// Threshold an already-gray image according to `cfg`.
pub fn threshold_gray(gray: &GrayImage, cfg: &BinarizationConfig) -> GrayImage {
    let mut buf = match cfg.mode {
        ThresholdMode::None => return gray.clone(),
        ThresholdMode::Fixed => fixed_threshold_inv(gray, cfg.fixed_threshold),
        ThresholdMode::Adaptive => {
            adaptive_threshold_inv(gray, cfg.effective_block_size(), cfg.adaptive_offset)
        }
    };

    if cfg.erode {
        buf = erode(&buf, Norm::LInf, 1);
    }
    if cfg.dilate {
        buf = dilate(&buf, Norm::LInf, 1);
    }
    from_luma(&buf)
}

fn fixed_threshold_inv(gray: &GrayImage, t: u8) -> ImageBuffer<Luma<u8>, Vec<u8>> {
    ImageBuffer::from_fn(gray.width as u32, gray.height as u32, |x, y| {
        let v = gray.get(x as usize, y as usize);
        Luma([if v <= t { 255 } else { 0 }])
    })
}

/// Gaussian sigma matching a `block × block` kernel.
#[inline]
fn block_sigma(block: u32) -> f32 {
    0.3 * ((block as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

fn adaptive_threshold_inv(
    gray: &GrayImage,
    block: u32,
    offset: f32,
) -> ImageBuffer<Luma<u8>, Vec<u8>> {
    let (w, h) = (gray.width as u32, gray.height as u32);
    let src: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(w, h, |x, y| Luma([gray.get(x as usize, y as usize) as f32]));
    let mean = gaussian_blur_f32(&src, block_sigma(block));

    ImageBuffer::from_fn(w, h, |x, y| {
        let v = src.get_pixel(x, y)[0];
        let m = mean.get_pixel(x, y)[0];
        Luma([if v <= m - offset { 255 } else { 0 }])
    })
}

/// Copy an `image` buffer into the detector's gray image type.
pub(crate) fn from_luma(img: &ImageBuffer<Luma<u8>, Vec<u8>>) -> GrayImage {
    GrayImage {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw().clone(),
    }
}

/// Copy a gray image into an `image` buffer for `imageproc`.
pub(crate) fn to_luma(img: &GrayImage) -> ImageBuffer<Luma<u8>, Vec<u8>> {
    ImageBuffer::from_fn(img.width as u32, img.height as u32, |x, y| {
        Luma([img.get(x as usize, y as usize)])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dark_square(w: usize, h: usize, x0: usize, y0: usize, side: usize) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            if (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y) {
                20
            } else {
                220
            }
        })
    }

    fn cfg(mode: ThresholdMode) -> BinarizationConfig {
        BinarizationConfig {
            mode,
            erode: false,
            dilate: false,
            ..BinarizationConfig::default()
        }
    }

    #[test]
    fn fixed_threshold_is_inverse_and_inclusive() {
        let gray = GrayImage::from_fn(4, 1, |x, _| [39u8, 40, 41, 200][x]);
        let bin = threshold_gray(&gray, &cfg(ThresholdMode::Fixed));
        assert_eq!(bin.data, vec![255, 255, 0, 0]);
    }

    #[test]
    fn none_mode_returns_gray() {
        let gray = dark_square(20, 20, 5, 5, 6);
        let mut c = cfg(ThresholdMode::None);
        c.dilate = true;
        assert_eq!(threshold_gray(&gray, &c), gray);
    }

    #[test]
    fn none_mode_on_color_frame_gives_single_channel_gray() {
        let gray = dark_square(8, 6, 2, 2, 3);
        let bgr: Vec<u8> = gray.data.iter().flat_map(|&v| [v, v, v]).collect();
        let frame = Frame::new(8, 6, crate::PixelFormat::Bgr8, &bgr);
        let out = binarize(&frame, &cfg(ThresholdMode::None)).unwrap();
        assert_eq!(out.binary.data.len(), 8 * 6);
        assert_eq!(out.binary, out.gray);
        assert_eq!(out.binary, gray);
    }

    #[test]
    fn adaptive_marks_dark_square_only() {
        let gray = dark_square(60, 60, 20, 20, 20);
        let bin = threshold_gray(&gray, &cfg(ThresholdMode::Adaptive));
        assert_eq!(bin.get(30, 30), 255);
        assert_eq!(bin.get(21, 21), 255);
        assert_eq!(bin.get(5, 5), 0);
        assert_eq!(bin.get(50, 30), 0);
    }

    #[test]
    fn erode_runs_before_dilate() {
        // A single foreground pixel is removed by erosion and cannot be
        // restored by the subsequent dilation.
        let gray = GrayImage::from_fn(9, 9, |x, y| if x == 4 && y == 4 { 0 } else { 255 });
        let c = BinarizationConfig {
            mode: ThresholdMode::Fixed,
            erode: true,
            dilate: true,
            ..BinarizationConfig::default()
        };
        let bin = threshold_gray(&gray, &c);
        assert!(bin.data.iter().all(|&v| v == 0));

        let c = BinarizationConfig { erode: false, ..c };
        let bin = threshold_gray(&gray, &c);
        assert_eq!(bin.data.iter().filter(|&&v| v == 255).count(), 9);
    }

    #[test]
    fn even_block_sizes_become_odd() {
        let mut c = BinarizationConfig::default();
        c.adaptive_block_size = 10;
        assert_eq!(c.effective_block_size(), 11);
        c.adaptive_block_size = 0;
        assert_eq!(c.effective_block_size(), 3);
    }

    #[test]
    fn binarize_reports_bad_frames() {
        let frame = Frame::gray(3, 3, &[0u8; 8]);
        assert!(binarize(&frame, &BinarizationConfig::default()).is_err());
    }
}
