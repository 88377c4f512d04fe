//! Document views.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::binding::FieldIndex;
use crate::dom::Document;
use crate::record::RecordId;

/// Which live rendering a view is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewRole {
    /// The single-record preview.
    Preview,
    /// The hidden copy handed to the rasterizer.
    Export,
    /// One cell of the preview grid.
    Grid(usize),
}

impl fmt::Display for ViewRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preview => write!(f, "preview"),
            Self::Export => write!(f, "export"),
            Self::Grid(cell) => write!(f, "grid[{}]", cell),
        }
    }
}

/// How records are laid out on screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    Single,
    Grid,
}

/// A live rendering of template ⊕ record ⊕ overrides.
///
/// A view is *ready* once it holds a document and no document swap is in
/// flight. While a swap is pending the old document (if any) is unusable.
#[derive(Debug, Clone)]
pub struct View {
    pub(crate) role: ViewRole,
    pub(crate) doc: Option<Document>,
    pub(crate) index: FieldIndex,
    pub(crate) pending: Option<Document>,
    pub(crate) showing: Option<RecordId>,
}

impl View {
    pub(crate) fn new(role: ViewRole) -> Self {
        Self {
            role,
            doc: None,
            index: FieldIndex::default(),
            pending: None,
            showing: None,
        }
    }

    pub fn role(&self) -> ViewRole {
        self.role
    }

    /// The record this view renders.
    pub fn showing(&self) -> Option<RecordId> {
        self.showing
    }

    pub fn is_ready(&self) -> bool {
        self.doc.is_some() && self.pending.is_none()
    }

    /// True while a new document is waiting for its load event.
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn document(&self) -> Option<&Document> {
        self.doc.as_ref().filter(|_| self.pending.is_none())
    }

    pub fn index(&self) -> &FieldIndex {
        &self.index
    }

    /// Document and index, when ready.
    pub(crate) fn parts_mut(&mut self) -> Option<(&mut Document, &mut FieldIndex)> {
        match (&mut self.doc, &self.pending) {
            (Some(doc), None) => Some((doc, &mut self.index)),
            _ => None,
        }
    }

    /// Attach a freshly rendered document.
    pub(crate) fn attach(&mut self, doc: Document, index: FieldIndex) {
        self.doc = Some(doc);
        self.index = index;
    }

    /// Drop the document (view shows nothing).
    pub(crate) fn detach(&mut self) {
        self.doc = None;
        self.index = FieldIndex::default();
    }
}
