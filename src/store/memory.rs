//! In-memory store backend.
//!
//! Per-session state sits behind its own lock so sessions never contend
//! with each other; the outer table locks only guard membership. Nothing
//! here survives a restart, which is exactly what tests and short-lived
//! embeddings want.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::config::CoordinatorConfig;
use crate::document::{resolve, Document, NameResolution};
use crate::error::{Error, Result};
use crate::session::{
    decide, Action, Feedback, FeedbackDraft, SessionId, SessionState, SessionStatus,
};

use super::{
    apply_update, catalogue_key, lookup_key, prepare_insert, DocumentKey, RefinementStore,
};

/// Volatile backend holding sessions and documents in process memory.
pub struct MemoryStore {
    config: CoordinatorConfig,
    sessions: RwLock<SessionTable>,
    documents: RwLock<HashMap<String, BTreeMap<String, Document>>>,
}

#[derive(Default)]
struct SessionTable {
    slots: HashMap<SessionId, Arc<Mutex<SessionSlot>>>,
    /// Insertion order, oldest first.
    order: VecDeque<SessionId>,
}

struct SessionSlot {
    owner: String,
    state: SessionState,
    link: Option<DocumentKey>,
}

impl MemoryStore {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(SessionTable::default()),
            documents: RwLock::new(HashMap::new()),
        }
    }

    async fn slot(&self, id: &SessionId) -> Result<Arc<Mutex<SessionSlot>>> {
        let table = self.sessions.read().await;
        table
            .slots
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("session {id}")))
    }
}

#[async_trait]
impl RefinementStore for MemoryStore {
    async fn add_session(&self, session: SessionState, owner: &str) -> Result<()> {
        let mut table = self.sessions.write().await;
        if table.slots.contains_key(&session.id) {
            return Err(Error::already_exists(format!("session {}", session.id)));
        }
        debug!("Adding session {} for owner {owner}", session.id);
        let id = session.id.clone();
        table.order.push_back(id.clone());
        table.slots.insert(
            id,
            Arc::new(Mutex::new(SessionSlot {
                owner: owner.to_string(),
                state: session,
                link: None,
            })),
        );
        while table.order.len() > self.config.session_capacity {
            if let Some(evicted) = table.order.pop_front() {
                table.slots.remove(&evicted);
                debug!("Evicted session {evicted} past capacity");
            }
        }
        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> Result<SessionState> {
        let slot = self.slot(id).await?;
        let slot = slot.lock().await;
        Ok(slot.state.clone())
    }

    async fn list_sessions(&self, owner: &str) -> Result<Vec<SessionState>> {
        let table = self.sessions.read().await;
        let mut out = Vec::new();
        for id in &table.order {
            if let Some(slot) = table.slots.get(id) {
                let slot = slot.lock().await;
                if slot.owner == owner {
                    out.push(slot.state.clone());
                }
            }
        }
        Ok(out)
    }

    async fn record_feedback(&self, id: &SessionId, draft: FeedbackDraft) -> Result<Feedback> {
        draft.validate()?;
        let slot = self.slot(id).await?;
        let mut slot = slot.lock().await;
        let feedback = draft.into_feedback(slot.state.id.clone(), slot.state.iteration + 1);
        slot.state
            .push_feedback(feedback.clone(), self.config.feedback_history_limit);
        slot.state.touch();
        debug!("Recorded feedback for {id} at round {}", feedback.iteration);
        Ok(feedback)
    }

    async fn decide_next_action(&self, id: &SessionId) -> Result<Action> {
        let slot = self.slot(id).await?;
        let mut slot = slot.lock().await;
        let score = slot
            .state
            .latest_feedback()
            .map(|f| f.overall_score)
            .ok_or_else(|| Error::invariant(format!("session {id} has no feedback to assess")))?;
        let policy = self.config.policy_for(&slot.state.kind);
        let action = decide(
            &policy,
            &mut slot.state,
            score,
            self.config.score_history_limit,
        );
        debug!("Session {id} round {}: {action}", slot.state.iteration);
        Ok(action)
    }

    async fn reset_session(&self, id: &SessionId) -> Result<SessionState> {
        let slot = self.slot(id).await?;
        let mut slot = slot.lock().await;
        slot.state.status = SessionStatus::InProgress;
        slot.state.touch();
        debug!("Reset session {id} to in_progress");
        Ok(slot.state.clone())
    }

    async fn store_document(&self, collection: &str, document: Document) -> Result<String> {
        let mut document = document;
        let name = catalogue_key(collection, &document.title)?;
        let mut documents = self.documents.write().await;
        let entry = documents.entry(collection.to_string()).or_default();
        match entry.get(&name) {
            Some(prior) => apply_update(prior, &mut document)?,
            None => prepare_insert(&mut document),
        }
        debug!("Storing document {collection}/{name} v{}", document.version);
        entry.insert(name.clone(), document);
        Ok(name)
    }

    async fn get_document(&self, collection: &str, name: &str) -> Result<Document> {
        let name = lookup_key(collection, name)?;
        let documents = self.documents.read().await;
        documents
            .get(collection)
            .and_then(|c| c.get(&name))
            .cloned()
            .ok_or_else(|| Error::not_found(format!("document {collection}/{name}")))
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<String>> {
        let documents = self.documents.read().await;
        Ok(documents
            .get(collection)
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn resolve_name(&self, collection: &str, partial: &str) -> Result<NameResolution> {
        let documents = self.documents.read().await;
        let resolution = match documents.get(collection) {
            Some(c) => resolve(c.keys().map(String::as_str), partial),
            None => resolve([], partial),
        };
        Ok(resolution)
    }

    async fn delete_document(&self, collection: &str, name: &str) -> Result<bool> {
        let name = lookup_key(collection, name)?;
        let mut documents = self.documents.write().await;
        let removed = documents
            .get_mut(collection)
            .map(|c| c.remove(&name).is_some())
            .unwrap_or(false);
        if removed {
            debug!("Deleted document {collection}/{name}");
        }
        Ok(removed)
    }

    async fn link_session(&self, id: &SessionId, collection: &str, name: &str) -> Result<()> {
        let name = lookup_key(collection, name)?;
        {
            let documents = self.documents.read().await;
            let exists = documents
                .get(collection)
                .map(|c| c.contains_key(&name))
                .unwrap_or(false);
            if !exists {
                return Err(Error::not_found(format!("document {collection}/{name}")));
            }
        }
        let slot = self.slot(id).await?;
        let mut slot = slot.lock().await;
        slot.link = Some(DocumentKey::new(collection, name));
        slot.state.touch();
        Ok(())
    }

    async fn get_link(&self, id: &SessionId) -> Result<Option<DocumentKey>> {
        let slot = self.slot(id).await?;
        let slot = slot.lock().await;
        Ok(slot.link.clone())
    }

    async fn unlink_session(&self, id: &SessionId) -> Result<Option<DocumentKey>> {
        let slot = self.slot(id).await?;
        let mut slot = slot.lock().await;
        let removed = slot.link.take();
        slot.state.touch();
        Ok(removed)
    }
}
