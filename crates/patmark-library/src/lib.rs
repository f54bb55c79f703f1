//! Template library and identification for square fiducial patterns.
//!
//! This crate focuses on:
//! - the geometry of the normalized patch (`PatchLayout`, bordered or plain),
//! - building templates with their four 90° rotations and cached statistics,
//! - identifying a normalized patch by correlation against every stored
//!   rotation.
//!
//! It does **not** find candidates in a frame. It expects a patch already
//! rectified to `layout.size × layout.size` (for example by
//! `patmark-detector`).

mod layout;
mod library;
mod matcher;
mod template;

pub use layout::{patch_region_stats, MarkerStyle, PatchLayout, Region, RegionStats};
pub use library::{LibraryError, TemplateLibrary};
pub use matcher::{
    Correlation, MatchError, MatchOutcome, MatchParams, MatchResult, Matcher, TemplateMatch,
};
pub use template::{rotate_square, RotatedTemplate, TemplateEntry};
