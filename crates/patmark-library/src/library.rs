//! Id-keyed template store.

use std::collections::BTreeMap;

use patmark_core::GrayImageView;

use crate::{PatchLayout, TemplateEntry};

/// Errors raised while building a template library.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LibraryError {
    #[error("pattern size {0} is too small for the marker layout")]
    InvalidPatternSize(usize),
    #[error("border fraction {0} must lie strictly between 0 and 0.5")]
    InvalidBorderFraction(f32),
    #[error("template image is {width}x{height}, expected {expected}x{expected}")]
    TemplateSizeMismatch {
        expected: usize,
        width: usize,
        height: usize,
    },
    #[error("template buffer holds {got} bytes, expected {expected}")]
    InvalidBuffer { expected: usize, got: usize },
    #[error("template region side {got} does not match the library layout ({expected})")]
    LayoutMismatch { expected: usize, got: usize },
    #[error("duplicate template id {0}")]
    DuplicateId(u32),
}

/// Immutable-by-convention set of known markers.
///
/// Entries iterate in ascending id order. Detection only ever borrows the
/// library, so one instance (or an `Arc` of it) can serve many frames.
#[derive(Clone, Debug)]
pub struct TemplateLibrary {
    layout: PatchLayout,
    entries: BTreeMap<u32, TemplateEntry>,
}

impl TemplateLibrary {
    pub fn new(layout: PatchLayout) -> Result<Self, LibraryError> {
        layout.validate()?;
        Ok(Self {
            layout,
            entries: BTreeMap::new(),
        })
    }

    #[inline]
    pub fn layout(&self) -> &PatchLayout {
        &self.layout
    }

    /// Add a prebuilt entry. Fails on a duplicate id or a region size that
    /// does not fit this library's layout.
    pub fn insert(&mut self, entry: TemplateEntry) -> Result<(), LibraryError> {
        let expected = self.layout.evaluation_region().width;
        if entry.side() != expected {
            return Err(LibraryError::LayoutMismatch {
                expected,
                got: entry.side(),
            });
        }
        if self.entries.contains_key(&entry.id()) {
            return Err(LibraryError::DuplicateId(entry.id()));
        }
        self.entries.insert(entry.id(), entry);
        Ok(())
    }

    /// Build an entry from a full-size base pattern and add it.
    pub fn add_pattern(&mut self, id: u32, base: &GrayImageView<'_>) -> Result<(), LibraryError> {
        let entry = TemplateEntry::new(id, base, &self.layout)?;
        self.insert(entry)
    }

    pub fn get(&self, id: u32) -> Option<&TemplateEntry> {
        self.entries.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TemplateEntry> {
        self.entries.values()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
