//! Correlation matching of a normalized patch against the template library.

use patmark_core::GrayImageView;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{patch_region_stats, TemplateLibrary};

/// Similarity score used when comparing a patch to a template rotation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correlation {
    /// Zero-mean normalized cross-correlation.
    #[default]
    Centered,
    /// Normalized dot product without mean removal.
    Uncentered,
}

/// Matcher configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchParams {
    /// A match is accepted only when its score is strictly greater.
    pub confidence_threshold: f64,
    pub correlation: Correlation,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.35,
            correlation: Correlation::Centered,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("template library is empty")]
    EmptyLibrary,
    #[error("patch holds {got} pixels, expected {expected}")]
    PatchSizeMismatch { expected: usize, got: usize },
}

/// Best (template, rotation) pair found for a patch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateMatch {
    pub id: u32,
    /// Index `0..=3` of the stored rotation that scored best.
    pub rotation: u8,
    pub score: f64,
}

/// Decision taken for one patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    Accepted,
    /// Best score did not exceed the confidence threshold.
    LowConfidence,
    /// Bordered layout and the border is not darker than the interior.
    BorderRejected,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// `None` when no template was compared or no score was finite.
    pub best: Option<TemplateMatch>,
    pub outcome: MatchOutcome,
}

impl MatchResult {
    #[inline]
    pub fn is_accepted(&self) -> bool {
        self.outcome == MatchOutcome::Accepted
    }

    /// The best match, if it was accepted.
    pub fn accepted(&self) -> Option<TemplateMatch> {
        if self.is_accepted() {
            self.best
        } else {
            None
        }
    }
}

/// Brute-force matcher over every template and rotation.
///
/// Cost is `O(templates × 4 × region area)` per patch, which is fine for the
/// handful of candidates that survive geometric filtering.
#[derive(Clone, Copy, Debug, Default)]
pub struct Matcher {
    params: MatchParams,
}

impl Matcher {
    pub fn new(params: MatchParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &MatchParams {
        &self.params
    }

    /// Identify a `layout.size × layout.size` patch.
    ///
    /// Ties keep the first (template, rotation) pair in id order.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "trace", skip_all, fields(templates = library.len()))
    )]
    pub fn identify(
        &self,
        patch: &GrayImageView<'_>,
        library: &TemplateLibrary,
    ) -> Result<MatchResult, MatchError> {
        if library.is_empty() {
            return Err(MatchError::EmptyLibrary);
        }

        let layout = library.layout();
        let expected = layout.size * layout.size;
        if patch.width != layout.size || patch.height != layout.size || patch.data.len() != expected
        {
            return Err(MatchError::PatchSizeMismatch {
                expected,
                got: patch.data.len(),
            });
        }

        let (exterior, interior) = patch_region_stats(patch, layout);
        if let Some(ext) = exterior {
            if ext.mean >= interior.mean {
                log::trace!(
                    "border rejected: exterior mean {:.1} >= interior mean {:.1}",
                    ext.mean,
                    interior.mean
                );
                return Ok(MatchResult {
                    best: None,
                    outcome: MatchOutcome::BorderRejected,
                });
            }
        }

        let inter = layout.crop_evaluation(patch);
        let n = inter.len() as f64;
        let mean_i = interior.mean;
        let norm_src: f64 = inter.iter().map(|&v| (v as f64) * (v as f64)).sum();

        let mut best: Option<TemplateMatch> = None;
        let mut best_score = f64::NEG_INFINITY;

        for entry in library.iter() {
            for (rot, tmpl) in entry.rotations().iter().enumerate() {
                let dot: f64 = inter
                    .iter()
                    .zip(&tmpl.pixels)
                    .map(|(&a, &b)| a as f64 * b as f64)
                    .sum();

                let score = match self.params.correlation {
                    Correlation::Centered => {
                        let num = dot - n * mean_i * tmpl.mean;
                        let den = (norm_src - n * mean_i * mean_i)
                            * (tmpl.norm_sq - n * tmpl.mean * tmpl.mean);
                        num / den.sqrt()
                    }
                    Correlation::Uncentered => dot / (norm_src * tmpl.norm_sq).sqrt(),
                };

                // Flat patches or templates give 0/0; they never win.
                if !score.is_finite() {
                    continue;
                }
                if score > best_score {
                    best_score = score;
                    best = Some(TemplateMatch {
                        id: entry.id(),
                        rotation: rot as u8,
                        score,
                    });
                }
            }
        }

        let outcome = match best {
            Some(m) if m.score > self.params.confidence_threshold => MatchOutcome::Accepted,
            _ => MatchOutcome::LowConfidence,
        };
        if outcome == MatchOutcome::LowConfidence {
            log::trace!("low confidence: best {:?}", best);
        }

        Ok(MatchResult { best, outcome })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PatchLayout;
    use approx::assert_relative_eq;
    use patmark_core::GrayImage;

    const SIZE: usize = 16;

    fn gradient_base() -> GrayImage {
        GrayImage::from_fn(SIZE, SIZE, |x, y| (20 + 12 * x + 2 * y) as u8)
    }

    fn blocks_base() -> GrayImage {
        GrayImage::from_fn(SIZE, SIZE, |x, y| {
            if (x / 4 + y / 2) % 3 == 0 {
                30
            } else {
                220
            }
        })
    }

    fn library(layout: PatchLayout) -> TemplateLibrary {
        let mut lib = TemplateLibrary::new(layout).expect("layout");
        lib.add_pattern(1, &gradient_base().view()).expect("add 1");
        lib.add_pattern(2, &blocks_base().view()).expect("add 2");
        lib
    }

    /// Dark-bordered patch whose interior is rotation `rot` of template `id`.
    fn patch_for(lib: &TemplateLibrary, id: u32, rot: u8) -> GrayImage {
        let layout = lib.layout();
        let region = layout.evaluation_region();
        let pixels = &lib.get(id).expect("entry").rotation(rot).pixels;
        GrayImage::from_fn(layout.size, layout.size, |x, y| {
            if region.contains(x, y) {
                pixels[(y - region.y) * region.width + (x - region.x)]
            } else {
                5
            }
        })
    }

    #[test]
    fn each_rotation_matches_itself() {
        let lib = library(PatchLayout::bordered(SIZE));
        let matcher = Matcher::default();

        for id in [1, 2] {
            for rot in 0..4u8 {
                let patch = patch_for(&lib, id, rot);
                let res = matcher.identify(&patch.view(), &lib).expect("identify");
                let m = res.accepted().expect("accepted");
                assert_eq!(m.id, id);
                assert_eq!(m.rotation, rot);
                assert_relative_eq!(m.score, 1.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn identify_is_deterministic() {
        let lib = library(PatchLayout::bordered(SIZE));
        let matcher = Matcher::default();
        let mut patch = patch_for(&lib, 2, 3);
        patch.set(6, 7, 90);
        let a = matcher.identify(&patch.view(), &lib).expect("identify");
        let b = matcher.identify(&patch.view(), &lib).expect("identify");
        assert_eq!(a, b);
    }

    #[test]
    fn score_equal_to_threshold_is_rejected() {
        let lib = library(PatchLayout::bordered(SIZE));
        let mut patch = patch_for(&lib, 1, 2);
        patch.set(5, 5, 250);
        patch.set(9, 6, 0);

        let probe = Matcher::new(MatchParams {
            confidence_threshold: -1.0,
            ..MatchParams::default()
        });
        let score = probe
            .identify(&patch.view(), &lib)
            .expect("identify")
            .best
            .expect("best")
            .score;

        let at = Matcher::new(MatchParams {
            confidence_threshold: score,
            ..MatchParams::default()
        });
        let res = at.identify(&patch.view(), &lib).expect("identify");
        assert_eq!(res.outcome, MatchOutcome::LowConfidence);
        assert!(res.accepted().is_none());

        let below = Matcher::new(MatchParams {
            confidence_threshold: score - 1e-9,
            ..MatchParams::default()
        });
        let res = below.identify(&patch.view(), &lib).expect("identify");
        assert!(res.is_accepted());
    }

    #[test]
    fn empty_library_is_an_error() {
        let lib = TemplateLibrary::new(PatchLayout::bordered(SIZE)).expect("layout");
        let patch = GrayImage::new(SIZE, SIZE);
        assert_eq!(
            Matcher::default().identify(&patch.view(), &lib),
            Err(MatchError::EmptyLibrary)
        );
    }

    #[test]
    fn wrong_patch_size_is_an_error() {
        let lib = library(PatchLayout::bordered(SIZE));
        let patch = GrayImage::new(SIZE - 1, SIZE);
        assert!(matches!(
            Matcher::default().identify(&patch.view(), &lib),
            Err(MatchError::PatchSizeMismatch { .. })
        ));
    }

    #[test]
    fn bright_border_is_rejected_before_correlation() {
        let lib = library(PatchLayout::bordered(SIZE));
        let region = lib.layout().evaluation_region();
        let patch = GrayImage::from_fn(SIZE, SIZE, |x, y| {
            if region.contains(x, y) {
                100
            } else {
                200
            }
        });
        let res = Matcher::default()
            .identify(&patch.view(), &lib)
            .expect("identify");
        assert_eq!(res.outcome, MatchOutcome::BorderRejected);
        assert!(res.best.is_none());

        let flat = GrayImage::from_fn(SIZE, SIZE, |_, _| 128);
        let res = Matcher::default()
            .identify(&flat.view(), &lib)
            .expect("identify");
        assert_eq!(res.outcome, MatchOutcome::BorderRejected);
    }

    #[test]
    fn plain_layout_with_uncentered_score() {
        let lib = library(PatchLayout::plain(SIZE));
        let matcher = Matcher::new(MatchParams {
            confidence_threshold: 0.9,
            correlation: Correlation::Uncentered,
        });
        let patch = blocks_base();
        let res = matcher.identify(&patch.view(), &lib).expect("identify");
        let m = res.accepted().expect("accepted");
        assert_eq!((m.id, m.rotation), (2, 0));
        assert_relative_eq!(m.score, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn flat_interior_never_matches() {
        let lib = library(PatchLayout::bordered(SIZE));
        let region = lib.layout().evaluation_region();
        let patch = GrayImage::from_fn(SIZE, SIZE, |x, y| {
            if region.contains(x, y) {
                150
            } else {
                10
            }
        });
        let res = Matcher::default()
            .identify(&patch.view(), &lib)
            .expect("identify");
        assert_eq!(res.outcome, MatchOutcome::LowConfidence);
        assert!(res.best.is_none());
    }
}
