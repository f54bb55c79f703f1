//! Geometry of the normalized patch: side length and the exterior/interior
//! split used for the border check and for correlation.

use patmark_core::GrayImageView;
use serde::{Deserialize, Serialize};

use crate::LibraryError;

/// Marker convention the library was built for.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarkerStyle {
    /// Dark border of `border_fraction × size` on every side framing a coded
    /// interior. Candidates whose border is not darker than their interior
    /// are rejected before correlation, and only the interior is correlated.
    Bordered { border_fraction: f32 },
    /// No border convention: the whole patch is correlated.
    Plain,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        MarkerStyle::Bordered {
            border_fraction: 0.25,
        }
    }
}

/// Axis-aligned block inside the patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Region {
    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }
}

/// Normalized patch geometry shared by the template library and the detector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchLayout {
    /// Side length of the normalized square patch in pixels.
    pub size: usize,
    pub style: MarkerStyle,
}

impl Default for PatchLayout {
    fn default() -> Self {
        Self {
            size: 64,
            style: MarkerStyle::default(),
        }
    }
}

impl PatchLayout {
    pub fn bordered(size: usize) -> Self {
        Self {
            size,
            style: MarkerStyle::default(),
        }
    }

    pub fn plain(size: usize) -> Self {
        Self {
            size,
            style: MarkerStyle::Plain,
        }
    }

    #[inline]
    pub fn is_bordered(&self) -> bool {
        matches!(self.style, MarkerStyle::Bordered { .. })
    }

    /// Border width in pixels (zero for [`MarkerStyle::Plain`]).
    pub fn border_px(&self) -> usize {
        match self.style {
            MarkerStyle::Bordered { border_fraction } => {
                (self.size as f32 * border_fraction).floor().max(0.0) as usize
            }
            MarkerStyle::Plain => 0,
        }
    }

    /// Region compared against templates: the interior block for bordered
    /// markers, the whole patch otherwise.
    pub fn evaluation_region(&self) -> Region {
        let b = self.border_px();
        let side = self.size.saturating_sub(2 * b);
        Region {
            x: b,
            y: b,
            width: side,
            height: side,
        }
    }

    pub fn validate(&self) -> Result<(), LibraryError> {
        if self.size < 4 {
            return Err(LibraryError::InvalidPatternSize(self.size));
        }
        if let MarkerStyle::Bordered { border_fraction } = self.style {
            if !(border_fraction > 0.0 && border_fraction < 0.5) || self.border_px() == 0 {
                return Err(LibraryError::InvalidBorderFraction(border_fraction));
            }
        }
        if self.evaluation_region().is_empty() {
            return Err(LibraryError::InvalidPatternSize(self.size));
        }
        Ok(())
    }

    /// Copy the evaluation region of a `size × size` patch, row-major.
    pub fn crop_evaluation(&self, patch: &GrayImageView<'_>) -> Vec<u8> {
        let r = self.evaluation_region();
        let mut out = Vec::with_capacity(r.len());
        for y in r.y..r.y + r.height {
            let row = &patch.data[y * patch.width..(y + 1) * patch.width];
            out.extend_from_slice(&row[r.x..r.x + r.width]);
        }
        out
    }
}

/// Mean and variance of a set of pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RegionStats {
    pub count: usize,
    pub mean: f64,
    pub variance: f64,
}

impl RegionStats {
    pub fn from_pixels(pixels: impl IntoIterator<Item = u8>) -> Self {
        let mut count = 0usize;
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        for v in pixels {
            let v = v as f64;
            count += 1;
            sum += v;
            sum_sq += v * v;
        }
        if count == 0 {
            return Self::default();
        }
        let n = count as f64;
        let mean = sum / n;
        Self {
            count,
            mean,
            variance: (sum_sq / n - mean * mean).max(0.0),
        }
    }
}

/// Statistics of the exterior ring and of the evaluation region.
///
/// `exterior` is `None` for plain markers, which have no ring.
pub fn patch_region_stats(
    patch: &GrayImageView<'_>,
    layout: &PatchLayout,
) -> (Option<RegionStats>, RegionStats) {
    let inner = layout.evaluation_region();
    let pixels = (0..patch.height).flat_map(|y| (0..patch.width).map(move |x| (x, y)));

    let interior = RegionStats::from_pixels(
        pixels
            .clone()
            .filter(|&(x, y)| inner.contains(x, y))
            .map(|(x, y)| patch.data[y * patch.width + x]),
    );
    let exterior = layout.is_bordered().then(|| {
        RegionStats::from_pixels(
            pixels
                .filter(|&(x, y)| !inner.contains(x, y))
                .map(|(x, y)| patch.data[y * patch.width + x]),
        )
    });
    (exterior, interior)
}
