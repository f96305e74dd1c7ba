//! Session and document storage.
//!
//! Two backends implement one contract: [`MemoryStore`] for tests and
//! short-lived embedding, [`SqliteStore`] for state that outlives the
//! process. Semantics that both must share, like frozen-field enforcement
//! and revision counting, live here as free functions so the backends
//! cannot drift apart.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{kind, normalize, Document, NameResolution};
use crate::error::{Error, Result};
use crate::session::{Action, Feedback, FeedbackDraft, SessionId, SessionState};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Key of a document in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentKey {
    pub collection: String,
    pub name: String,
}

impl DocumentKey {
    pub fn new(collection: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.name)
    }
}

/// Storage contract shared by every backend.
///
/// All operations are atomic: multi-step writes either apply entirely or
/// not at all, and per-session operations are linearizable. Backends
/// surface failures through the crate error taxonomy so callers never
/// branch on backend-specific errors.
#[async_trait]
pub trait RefinementStore: Send + Sync {
    /// Insert a new session owned by `owner`.
    ///
    /// Evicts the oldest sessions past the configured capacity in the same
    /// atomic step, along with everything that hangs off them.
    async fn add_session(&self, session: SessionState, owner: &str) -> Result<()>;

    async fn get_session(&self, id: &SessionId) -> Result<SessionState>;

    /// Sessions belonging to `owner`, oldest first.
    async fn list_sessions(&self, owner: &str) -> Result<Vec<SessionState>>;

    /// Validate a draft, stamp it with the next round number, and append
    /// it to the bounded feedback history.
    async fn record_feedback(&self, id: &SessionId, draft: FeedbackDraft) -> Result<Feedback>;

    /// Run the decision engine against the latest recorded feedback.
    ///
    /// Counts as an assessment round: appends to the score history, bumps
    /// the iteration, and moves the session status to match the action.
    async fn decide_next_action(&self, id: &SessionId) -> Result<Action>;

    /// Put a waiting session back into active refinement.
    async fn reset_session(&self, id: &SessionId) -> Result<SessionState>;

    /// Insert or update a document, keyed by its normalized title.
    ///
    /// Returns the catalogue name. Updates keep frozen fields from the
    /// stored revision and bump the revision counters.
    async fn store_document(&self, collection: &str, document: Document) -> Result<String>;

    async fn get_document(&self, collection: &str, name: &str) -> Result<Document>;

    /// Normalized names in a collection, sorted.
    async fn list_documents(&self, collection: &str) -> Result<Vec<String>>;

    /// Resolve a partial name against the collection's catalogue.
    async fn resolve_name(&self, collection: &str, partial: &str) -> Result<NameResolution>;

    /// Remove a document. Returns whether anything was removed.
    async fn delete_document(&self, collection: &str, name: &str) -> Result<bool>;

    /// Point a session at a document, replacing any existing link.
    async fn link_session(&self, id: &SessionId, collection: &str, name: &str) -> Result<()>;

    async fn get_link(&self, id: &SessionId) -> Result<Option<DocumentKey>>;

    /// Drop a session's link. Returns the removed key, if any.
    async fn unlink_session(&self, id: &SessionId) -> Result<Option<DocumentKey>>;
}

/// Validate a collection plus title pair and derive the catalogue key.
pub(crate) fn catalogue_key(collection: &str, title: &str) -> Result<String> {
    if collection.trim().is_empty() {
        return Err(Error::validation("collection must not be empty"));
    }
    let name = normalize(title);
    if name.is_empty() {
        return Err(Error::validation(format!(
            "title {title:?} normalizes to an empty name"
        )));
    }
    Ok(name)
}

/// Validate a collection plus caller-supplied name and normalize it.
pub(crate) fn lookup_key(collection: &str, name: &str) -> Result<String> {
    if collection.trim().is_empty() {
        return Err(Error::validation("collection must not be empty"));
    }
    let normalized = normalize(name);
    if normalized.is_empty() {
        return Err(Error::validation(format!(
            "name {name:?} normalizes to an empty key"
        )));
    }
    Ok(normalized)
}

/// Stamp a fresh insert. Whatever the parsed metadata claimed, a new
/// catalogue entry starts its revision history from the beginning.
pub(crate) fn prepare_insert(document: &mut Document) {
    document.iteration = 0;
    document.version = 1;
}

/// Reconcile an incoming revision with the stored document.
///
/// The stored kind is authoritative, frozen fields are carried over from
/// the stored revision, and both revision counters advance.
pub(crate) fn apply_update(prior: &Document, incoming: &mut Document) -> Result<()> {
    if incoming.kind != prior.kind {
        return Err(Error::validation(format!(
            "document {:?} already exists with kind {}, not {}",
            prior.title, prior.kind, incoming.kind
        )));
    }
    let kind = kind::lookup(&prior.kind)
        .ok_or_else(|| Error::invariant(format!("stored document has unknown kind {:?}", prior.kind)))?;
    for spec in kind.fields.iter().filter(|f| f.frozen) {
        match prior.fields.get(spec.name) {
            Some(value) => {
                incoming.fields.insert(spec.name.to_string(), value.clone());
            }
            None => {
                incoming.fields.remove(spec.name);
            }
        }
    }
    incoming.iteration = prior.iteration + 1;
    incoming.version = prior.version + 1;
    Ok(())
}
