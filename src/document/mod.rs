//! Structured markdown documents.
//!
//! A document is typed data first and markdown second: the kind table maps
//! headers to fields, `parse` recovers the data from text, and `build`
//! renders it back out. Rendering normalizes whitespace and ordering, so
//! one parse/build cycle canonicalizes a document and further cycles are
//! byte-stable.

pub mod build;
pub mod kind;
pub mod normalize;
pub mod parse;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use build::build;
pub use kind::{DocumentKind, FieldSpec, HeaderPath, KINDS};
pub use normalize::{is_kebab_case, normalize, resolve, NameResolution};
pub use parse::{detect_kind, parse};

/// Rendered for empty list fields and recognized (and dropped) on parse.
pub const NONE_IDENTIFIED: &str = "None identified";
/// Alternate sentinel accepted on parse.
pub const NONE_PROVIDED: &str = "None provided";

/// Why a piece of markdown could not be parsed as a document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Document has no title line")]
    MissingTitle,

    #[error("Title line {line:?} does not match any document kind")]
    UnknownKind { line: String },

    #[error("Expected a title starting with {expected:?}, found {found:?}")]
    TitleMismatch { expected: String, found: String },

    #[error("Title {title:?} is not lowercase-kebab-case")]
    TitleNotKebab { title: String },
}

/// Review lifecycle of a document, independent of any session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    InReview,
    Approved,
    Archived,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InReview => "in_review",
            Self::Approved => "approved",
            Self::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "in_review" => Some(Self::InReview),
            "approved" => Some(Self::Approved),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Value of one declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Items(Vec<String>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Items(_) => None,
        }
    }

    pub fn as_items(&self) -> Option<&[String]> {
        match self {
            Self::Items(items) => Some(items),
            Self::Text(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Items(items) => items.is_empty(),
        }
    }
}

/// One structured document, decoupled from its markdown form.
///
/// `fields` holds every field the kind declares, including empty ones.
/// `additional_sections` carries unmapped `##` sections verbatim so a
/// parse/build round trip loses nothing it did not understand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub kind: String,
    pub title: String,
    pub fields: BTreeMap<String, FieldValue>,
    pub additional_sections: BTreeMap<String, String>,
    pub status: DocumentStatus,
    pub iteration: u32,
    pub version: u32,
}

impl Document {
    /// Fresh document with every declared field at its empty default.
    pub fn new(kind: &DocumentKind, title: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        for spec in kind.fields {
            let value = if spec.list {
                FieldValue::Items(Vec::new())
            } else {
                FieldValue::Text(String::new())
            };
            fields.insert(spec.name.to_string(), value);
        }
        Self {
            kind: kind.id.to_string(),
            title: title.into(),
            fields,
            additional_sections: BTreeMap::new(),
            status: DocumentStatus::Draft,
            iteration: 0,
            version: 1,
        }
    }

    /// Catalogue key derived from the title.
    pub fn name(&self) -> String {
        normalize(&self.title)
    }

    pub fn field_text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(FieldValue::as_text)
    }

    pub fn field_items(&self, name: &str) -> Option<&[String]> {
        self.fields.get(name).and_then(FieldValue::as_items)
    }
}
