use patmark_library::{LibraryError, MatchError, PatchLayout};

use crate::NormalizeError;

/// Errors returned by the pattern detector.
///
/// Candidates that fail a geometric, border or confidence check are dropped
/// silently; only caller contract violations surface here.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("frame has zero area ({width}x{height})")]
    EmptyFrame { width: usize, height: usize },
    #[error("frame buffer holds {got} bytes, expected {expected}")]
    InvalidFrameBuffer { expected: usize, got: usize },
    #[error("detector layout {detector:?} does not match library layout {library:?}")]
    LayoutMismatch {
        detector: PatchLayout,
        library: PatchLayout,
    },
    #[error(transparent)]
    Layout(#[from] LibraryError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Match(#[from] MatchError),
}
