//! Stored templates and 90° rotation helpers.

use patmark_core::GrayImageView;

use crate::{LibraryError, PatchLayout};

/// One rotation of a template's evaluation region with cached statistics.
#[derive(Clone, Debug, PartialEq)]
pub struct RotatedTemplate {
    /// Row-major pixels of the evaluation region.
    pub pixels: Vec<u8>,
    /// Mean intensity of `pixels`.
    pub mean: f64,
    /// Sum of squared intensities of `pixels`.
    pub norm_sq: f64,
}

impl RotatedTemplate {
    fn new(pixels: Vec<u8>) -> Self {
        let n = pixels.len().max(1) as f64;
        let sum: f64 = pixels.iter().map(|&v| v as f64).sum();
        let norm_sq: f64 = pixels.iter().map(|&v| (v as f64) * (v as f64)).sum();
        Self {
            pixels,
            mean: sum / n,
            norm_sq,
        }
    }
}

/// One known marker: an id and its four 90°-successive rotations.
///
/// Rotation `r` is the base pattern turned `r × 90°` clockwise as displayed
/// (y down), so when a candidate matches rotation `r` the base pattern's
/// top-left corner sits at normalized-patch corner `r` (TL, TR, BR, BL).
#[derive(Clone, Debug, PartialEq)]
pub struct TemplateEntry {
    id: u32,
    side: usize,
    rotations: [RotatedTemplate; 4],
}

impl TemplateEntry {
    /// Build an entry from a full `layout.size × layout.size` base pattern.
    ///
    /// The evaluation region is cropped according to `layout` before the
    /// rotations and their statistics are computed.
    pub fn new(
        id: u32,
        base: &GrayImageView<'_>,
        layout: &PatchLayout,
    ) -> Result<Self, LibraryError> {
        layout.validate()?;
        if base.width != layout.size || base.height != layout.size {
            return Err(LibraryError::TemplateSizeMismatch {
                expected: layout.size,
                width: base.width,
                height: base.height,
            });
        }
        if base.data.len() != base.width * base.height {
            return Err(LibraryError::InvalidBuffer {
                expected: base.width * base.height,
                got: base.data.len(),
            });
        }

        let region = layout.crop_evaluation(base);
        let side = layout.evaluation_region().width;

        Ok(Self {
            id,
            side,
            rotations: [0u8, 1, 2, 3]
                .map(|r| RotatedTemplate::new(rotate_square(&region, side, r))),
        })
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Side length of the stored evaluation region.
    #[inline]
    pub fn side(&self) -> usize {
        self.side
    }

    /// Stored rotation `rot & 3`.
    #[inline]
    pub fn rotation(&self, rot: u8) -> &RotatedTemplate {
        &self.rotations[(rot & 3) as usize]
    }

    #[inline]
    pub fn rotations(&self) -> &[RotatedTemplate; 4] {
        &self.rotations
    }
}

/// Rotate a row-major `n × n` block clockwise by `rot × 90°` (as displayed,
/// y down).
pub fn rotate_square(src: &[u8], n: usize, rot: u8) -> Vec<u8> {
    debug_assert_eq!(src.len(), n * n);
    let rot = rot & 3;
    if rot == 0 {
        return src.to_vec();
    }

    let mut out = vec![0u8; n * n];
    for y in 0..n {
        for x in 0..n {
            let (sx, sy) = match rot {
                1 => (y, n - 1 - x),
                2 => (n - 1 - x, n - 1 - y),
                _ => (n - 1 - y, x),
            };
            out[y * n + x] = src[sy * n + sx];
        }
    }
    out
}
