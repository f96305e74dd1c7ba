//! Session coordinator: the crate's front door.
//!
//! The coordinator owns a store and speaks markdown at the edges. Documents
//! go in and come out as text; sessions, feedback, and decisions are typed.
//! It adds no policy of its own beyond input validation, so the same flows
//! behave identically over either backend.

use std::sync::Arc;

use tracing::info;

use crate::document::{build, detect_kind, kind, normalize, parse, Document, NameResolution};
use crate::error::{Error, Result};
use crate::session::{Action, Feedback, FeedbackDraft, SessionId, SessionState, SessionStatus};
use crate::store::{DocumentKey, RefinementStore};

/// Identity handed back from session initialization.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    pub status: SessionStatus,
}

/// Coordinates refinement sessions and the document catalogue over one
/// backend.
pub struct SessionCoordinator {
    store: Arc<dyn RefinementStore>,
}

impl SessionCoordinator {
    pub fn new(store: Arc<dyn RefinementStore>) -> Self {
        Self { store }
    }

    /// Start a session refining a document of the given kind, scoped to an
    /// owning project.
    pub async fn initialize_session(&self, kind_id: &str, owner: &str) -> Result<SessionHandle> {
        let kind = kind::lookup(kind_id)
            .ok_or_else(|| Error::validation(format!("unknown document kind {kind_id:?}")))?;
        if owner.trim().is_empty() {
            return Err(Error::validation("owner must not be empty"));
        }
        let session = SessionState::new(kind.id);
        let handle = SessionHandle {
            id: session.id.clone(),
            status: session.status,
        };
        self.store.add_session(session, owner).await?;
        info!("Initialized {} session {} for {owner}", kind.id, handle.id);
        Ok(handle)
    }

    pub async fn session_status(&self, id: &SessionId) -> Result<SessionState> {
        self.store.get_session(id).await
    }

    /// Sessions belonging to an owner, oldest first.
    pub async fn list_sessions(&self, owner: &str) -> Result<Vec<SessionState>> {
        self.store.list_sessions(owner).await
    }

    /// Record one reviewer's feedback; the store stamps the round number.
    pub async fn record_feedback(&self, id: &SessionId, draft: FeedbackDraft) -> Result<Feedback> {
        self.store.record_feedback(id, draft).await
    }

    /// Assess the latest feedback and advance the session.
    pub async fn decide_next_action(&self, id: &SessionId) -> Result<Action> {
        self.store.decide_next_action(id).await
    }

    /// Put a waiting session back into active refinement.
    pub async fn reset_session(&self, id: &SessionId) -> Result<SessionState> {
        self.store.reset_session(id).await
    }

    /// Parse markdown, detecting its kind from the title line, and store
    /// it. Returns the catalogue name.
    pub async fn store_document(&self, collection: &str, markdown: &str) -> Result<String> {
        let kind = detect_kind(markdown)?;
        let document = parse(markdown, kind)?;
        self.store.store_document(collection, document).await
    }

    /// Canonical markdown of a stored document.
    pub async fn document_markdown(&self, collection: &str, name: &str) -> Result<String> {
        let document = self.store.get_document(collection, name).await?;
        render(&document)
    }

    /// Replace an existing document with a new revision of the same
    /// identity.
    ///
    /// The document must already exist and the markdown's title must
    /// normalize to the same catalogue name; frozen fields and revision
    /// counters are handled by the store.
    pub async fn update_document(
        &self,
        collection: &str,
        name: &str,
        markdown: &str,
    ) -> Result<String> {
        let existing = self.store.get_document(collection, name).await?;
        let kind = kind::lookup(&existing.kind).ok_or_else(|| {
            Error::invariant(format!("stored document has unknown kind {:?}", existing.kind))
        })?;
        let incoming = parse(markdown, kind)?;
        let target = existing.name();
        if normalize(&incoming.title) != target {
            return Err(Error::validation(format!(
                "document title {:?} does not address {target:?}",
                incoming.title
            )));
        }
        self.store.store_document(collection, incoming).await
    }

    /// Resolve a partial name against a collection.
    pub async fn resolve_name(&self, collection: &str, partial: &str) -> Result<NameResolution> {
        self.store.resolve_name(collection, partial).await
    }

    /// Remove a document. Returns whether anything was removed.
    pub async fn delete_document(&self, collection: &str, name: &str) -> Result<bool> {
        self.store.delete_document(collection, name).await
    }

    /// Normalized names in a collection, sorted.
    pub async fn list_documents(&self, collection: &str) -> Result<Vec<String>> {
        self.store.list_documents(collection).await
    }

    /// Point a session at the document it is refining.
    pub async fn link_session(
        &self,
        id: &SessionId,
        collection: &str,
        name: &str,
    ) -> Result<()> {
        self.store.link_session(id, collection, name).await
    }

    pub async fn session_link(&self, id: &SessionId) -> Result<Option<DocumentKey>> {
        self.store.get_link(id).await
    }

    /// Canonical markdown of the document a session is linked to.
    pub async fn linked_document_markdown(&self, id: &SessionId) -> Result<String> {
        let key = self
            .store
            .get_link(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("session {id} has no linked document")))?;
        let document = self.store.get_document(&key.collection, &key.name).await?;
        render(&document)
    }

    /// Drop a session's link. Returns the removed key, if any.
    pub async fn unlink_session(&self, id: &SessionId) -> Result<Option<DocumentKey>> {
        self.store.unlink_session(id).await
    }
}

fn render(document: &Document) -> Result<String> {
    let kind = kind::lookup(&document.kind).ok_or_else(|| {
        Error::invariant(format!("stored document has unknown kind {:?}", document.kind))
    })?;
    Ok(build(kind, document))
}
