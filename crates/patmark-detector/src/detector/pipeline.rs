use patmark_core::{CameraModel, ExtrinsicsSolver, GrayImage, PlanarPoseSolver};
use patmark_library::{Matcher, TemplateLibrary};

#[cfg(feature = "tracing")]
use tracing::instrument;

use super::{DetectError, DetectedPattern, MonitorStage, PatternDetectorParams, PipelineOutput};
use crate::{binarize, extract_candidates, normalize, Candidate, Frame, NormalizeError};

/// Contour-based square pattern detector.
///
/// Holds only immutable configuration: every image buffer is allocated per
/// call, so one detector can process frames from several threads while
/// sharing a [`TemplateLibrary`] by reference.
pub struct PatternDetector {
    params: PatternDetectorParams,
    matcher: Matcher,
    solver: Box<dyn ExtrinsicsSolver + Send + Sync>,
}

impl PatternDetector {
    /// Create a detector using the [`PlanarPoseSolver`] for extrinsics.
    pub fn new(params: PatternDetectorParams) -> Result<Self, DetectError> {
        params.layout.validate()?;
        let matcher = Matcher::new(params.match_params());
        Ok(Self {
            params,
            matcher,
            solver: Box::new(PlanarPoseSolver),
        })
    }

    /// Replace the extrinsics solver.
    pub fn with_solver(mut self, solver: impl ExtrinsicsSolver + Send + Sync + 'static) -> Self {
        self.solver = Box::new(solver);
        self
    }

    #[inline]
    pub fn params(&self) -> &PatternDetectorParams {
        &self.params
    }

    /// Detect and identify every pattern in `frame`.
    ///
    /// Patterns are returned in candidate discovery order. An empty library
    /// yields no patterns. The monitor stage is ignored; see [`Self::run`].
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip_all,
            fields(w = frame.width, h = frame.height, templates = library.len())
        )
    )]
    pub fn detect(
        &self,
        frame: &Frame<'_>,
        camera: &CameraModel,
        library: &TemplateLibrary,
    ) -> Result<Vec<DetectedPattern>, DetectError> {
        frame.validate()?;
        self.check_layout(library)?;
        if library.is_empty() {
            log::warn!("template library is empty, no pattern can be identified");
            return Ok(Vec::new());
        }

        let bin = binarize(frame, &self.params.binarization)?;
        let candidates = extract_candidates(&bin.binary, &bin.gray.view(), &self.params.candidates);
        self.identify_all(&bin.gray, &candidates, camera, library)
    }

    /// Run the pipeline up to the configured monitor stage.
    pub fn run(
        &self,
        frame: &Frame<'_>,
        camera: &CameraModel,
        library: &TemplateLibrary,
    ) -> Result<PipelineOutput, DetectError> {
        match self.params.monitor {
            MonitorStage::Off => self
                .detect(frame, camera, library)
                .map(PipelineOutput::Patterns),
            MonitorStage::Binary => {
                let bin = binarize(frame, &self.params.binarization)?;
                Ok(PipelineOutput::Binary(bin.binary))
            }
            MonitorStage::Normalized => {
                let bin = binarize(frame, &self.params.binarization)?;
                let candidates =
                    extract_candidates(&bin.binary, &bin.gray.view(), &self.params.candidates);
                let mut patches = Vec::with_capacity(candidates.len());
                for c in &candidates {
                    if let Some(patch) = self.normalize_candidate(&bin.gray, c)? {
                        patches.push(patch);
                    }
                }
                Ok(PipelineOutput::Normalized(patches))
            }
        }
    }

    fn check_layout(&self, library: &TemplateLibrary) -> Result<(), DetectError> {
        if library.layout() != &self.params.layout {
            return Err(DetectError::LayoutMismatch {
                detector: self.params.layout,
                library: *library.layout(),
            });
        }
        Ok(())
    }

    /// `None` when refinement left the corners without a valid homography.
    fn normalize_candidate(
        &self,
        gray: &GrayImage,
        candidate: &Candidate,
    ) -> Result<Option<GrayImage>, DetectError> {
        match normalize(
            &gray.view(),
            &candidate.corners(),
            &candidate.bbox,
            self.params.layout.size,
        ) {
            Ok(patch) => Ok(Some(patch)),
            Err(NormalizeError::DegenerateQuad) => {
                log::trace!("candidate at {:?} is degenerate", candidate.bbox);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn identify_all(
        &self,
        gray: &GrayImage,
        candidates: &[Candidate],
        camera: &CameraModel,
        library: &TemplateLibrary,
    ) -> Result<Vec<DetectedPattern>, DetectError> {
        let mut out = Vec::new();

        for candidate in candidates {
            let Some(patch) = self.normalize_candidate(gray, candidate)? else {
                continue;
            };
            let result = self.matcher.identify(&patch.view(), library)?;
            let Some(m) = result.accepted() else {
                log::trace!(
                    "candidate at {:?} dropped: {:?} (best {:?})",
                    candidate.bbox,
                    result.outcome,
                    result.best
                );
                continue;
            };

            let vertices = candidate.oriented_corners(m.rotation);
            let pose = self.solver.solve(&vertices, self.params.marker_size, camera);
            if pose.is_none() {
                log::debug!("pattern {} identified but no pose was found", m.id);
            }

            out.push(DetectedPattern {
                id: m.id,
                orientation: m.rotation,
                confidence: m.score,
                vertices,
                pose,
                size: self.params.marker_size,
            });
        }

        log::debug!(
            "{} candidates, {} patterns identified",
            candidates.len(),
            out.len()
        );
        Ok(out)
    }
}
