use patmark_library::{Correlation, MatchParams, PatchLayout};
use serde::{Deserialize, Serialize};

use crate::{BinarizationConfig, CandidateParams};

/// Intermediate image routed to the output instead of running the full
/// pipeline. Debug aid only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorStage {
    #[default]
    Off,
    /// Stop after binarization and return the binary image.
    Binary,
    /// Stop after normalization and return every candidate patch.
    Normalized,
}

/// Configuration for the pattern detector. Set once per detector instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternDetectorParams {
    pub binarization: BinarizationConfig,
    pub candidates: CandidateParams,
    /// Normalized patch size and marker convention. Must equal the layout of
    /// the template library passed to `detect`.
    pub layout: PatchLayout,
    /// A match is accepted only when its score is strictly greater.
    pub confidence_threshold: f64,
    pub correlation: Correlation,
    /// Physical side length of the markers, in the unit poses are wanted in.
    pub marker_size: f64,
    pub monitor: MonitorStage,
}

impl Default for PatternDetectorParams {
    fn default() -> Self {
        Self {
            binarization: BinarizationConfig::default(),
            candidates: CandidateParams::default(),
            layout: PatchLayout::default(),
            confidence_threshold: 0.35,
            correlation: Correlation::Centered,
            marker_size: 1.0,
            monitor: MonitorStage::Off,
        }
    }
}

impl PatternDetectorParams {
    pub(crate) fn match_params(&self) -> MatchParams {
        MatchParams {
            confidence_threshold: self.confidence_threshold,
            correlation: self.correlation,
        }
    }
}
