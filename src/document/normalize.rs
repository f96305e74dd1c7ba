//! Catalogue name normalization and partial-name resolution.
//!
//! Every document is keyed by the normalized form of its title, so lookups
//! accept whatever casing and spacing the caller has on hand.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static KEBAB_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("Invalid regex pattern"));

/// Collapse a display name to its catalogue key.
///
/// Lowercases, turns runs of whitespace, underscores, and hyphens into a
/// single hyphen, and drops everything outside `[a-z0-9-]`. The result is
/// idempotent: normalizing a normalized name returns it unchanged.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_separator = false;
    for ch in raw.chars() {
        let ch = ch.to_ascii_lowercase();
        if ch.is_whitespace() || ch == '_' || ch == '-' {
            pending_separator = true;
        } else if ch.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('-');
            }
            pending_separator = false;
            out.push(ch);
        }
        // every other character is dropped without acting as a separator
    }
    out
}

/// Whether a name is already in lowercase-kebab-case form.
pub fn is_kebab_case(name: &str) -> bool {
    KEBAB_RE.is_match(name)
}

/// Outcome of resolving a partial name against a catalogue.
///
/// `canonical` is set exactly when the partial resolved unambiguously;
/// `matches` always lists every candidate so ambiguity can be surfaced to
/// the caller instead of silently picking one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameResolution {
    pub canonical: Option<String>,
    pub matches: Vec<String>,
}

impl NameResolution {
    fn unresolved(matches: Vec<String>) -> Self {
        Self {
            canonical: None,
            matches,
        }
    }

    fn exact(name: String) -> Self {
        Self {
            canonical: Some(name.clone()),
            matches: vec![name],
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        self.canonical.is_none() && self.matches.len() > 1
    }
}

/// Resolve a partial name against a set of normalized catalogue keys.
///
/// An exact match on the normalized partial wins outright, even when it is
/// also a substring of longer keys. Otherwise every key containing the
/// partial as a substring is a candidate; a single candidate resolves, any
/// other count leaves `canonical` unset.
pub fn resolve<'a, I>(keys: I, partial: &str) -> NameResolution
where
    I: IntoIterator<Item = &'a str>,
{
    let needle = normalize(partial);
    let mut matches = Vec::new();
    for key in keys {
        if key == needle {
            return NameResolution::exact(key.to_string());
        }
        if key.contains(needle.as_str()) {
            matches.push(key.to_string());
        }
    }
    matches.sort();
    if matches.len() == 1 {
        NameResolution {
            canonical: Some(matches[0].clone()),
            matches,
        }
    } else {
        NameResolution::unresolved(matches)
    }
}
