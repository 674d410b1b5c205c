//! Element declarations on page types

use serde::{Deserialize, Serialize};

/// What an element declaration resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// A single element
    #[default]
    Element,
    /// A collection of elements
    Elements,
    /// Root element of a page section
    Section,
    /// Root elements of repeated sections
    Sections,
}

impl ElementKind {
    /// Whether the declaration names a collection
    #[must_use]
    pub const fn is_collection(self) -> bool {
        matches!(self, Self::Elements | Self::Sections)
    }
}

/// A named element declared on a page type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDeclaration {
    /// Accessor name
    pub name: String,
    /// CSS selector
    pub selector: String,
    /// Declaration kind
    #[serde(default)]
    pub kind: ElementKind,
}

impl ElementDeclaration {
    /// Create a declaration
    #[must_use]
    pub fn new(name: impl Into<String>, selector: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            name: name.into(),
            selector: selector.into(),
            kind,
        }
    }
}
