//! Borrowed input frames and grayscale conversion.

use patmark_core::GrayImage;
use serde::{Deserialize, Serialize};

use crate::DetectError;

/// Interleaved 8-bit pixel layouts accepted by the detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Gray8,
    /// Three channels, blue first.
    Bgr8,
    Rgba8,
}

impl PixelFormat {
    #[inline]
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Bgr8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// One video frame, row-major with no row padding.
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
    pub data: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn new(width: usize, height: usize, format: PixelFormat, data: &'a [u8]) -> Self {
        Self {
            width,
            height,
            format,
            data,
        }
    }

    pub fn gray(width: usize, height: usize, data: &'a [u8]) -> Self {
        Self::new(width, height, PixelFormat::Gray8, data)
    }

    /// Check that the frame has a non-zero area and a buffer of the right
    /// length for its format.
    pub fn validate(&self) -> Result<(), DetectError> {
        if self.width == 0 || self.height == 0 {
            return Err(DetectError::EmptyFrame {
                width: self.width,
                height: self.height,
            });
        }
        let expected = self.width * self.height * self.format.channels();
        if self.data.len() != expected {
            return Err(DetectError::InvalidFrameBuffer {
                expected,
                got: self.data.len(),
            });
        }
        Ok(())
    }

    /// Single-channel copy of the frame.
    ///
    /// Gray frames are copied unchanged; color frames use the Rec.601 luma
    /// weights `0.299 R + 0.587 G + 0.114 B`.
    pub fn to_gray(&self) -> Result<GrayImage, DetectError> {
        self.validate()?;
        let data = match self.format {
            PixelFormat::Gray8 => self.data.to_vec(),
            PixelFormat::Bgr8 => self
                .data
                .chunks_exact(3)
                .map(|px| luma(px[2], px[1], px[0]))
                .collect(),
            PixelFormat::Rgba8 => self
                .data
                .chunks_exact(4)
                .map(|px| luma(px[0], px[1], px[2]))
                .collect(),
        };
        Ok(GrayImage {
            width: self.width,
            height: self.height,
            data,
        })
    }
}

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32)
        .round()
        .clamp(0.0, 255.0) as u8
}
