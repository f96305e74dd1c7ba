//! SQLite store backend.
//!
//! One file, WAL journaling, foreign keys on. Every write runs inside a
//! transaction whose first statement is an UPDATE, so concurrent writers
//! serialize on the database write lock instead of deadlocking; a writer
//! that cannot get the lock within the busy timeout, or any operation that
//! outlives the configured operation timeout, surfaces as a retryable
//! `Unavailable`. Table CHECK constraints back up the in-process
//! validation of score and revision ranges.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;

use crate::config::CoordinatorConfig;
use crate::document::{resolve, Document, DocumentStatus, NameResolution};
use crate::error::{Error, Result};
use crate::session::{
    decide, Action, Feedback, FeedbackDraft, SessionId, SessionState, SessionStatus,
};

use super::{
    apply_update, catalogue_key, lookup_key, prepare_insert, DocumentKey, RefinementStore,
};

const SCHEMA: &str = r#"
-- Refinement sessions
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    owner TEXT NOT NULL,
    kind TEXT NOT NULL,
    status TEXT NOT NULL,
    current_score INTEGER CHECK (current_score BETWEEN 0 AND 100),
    score_history TEXT NOT NULL DEFAULT '[]', -- JSON array
    iteration INTEGER NOT NULL DEFAULT 0 CHECK (iteration >= 0),
    feedback_history TEXT NOT NULL DEFAULT '[]', -- JSON array
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Insertion order of sessions, drives capacity eviction
CREATE TABLE IF NOT EXISTS session_index (
    position INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL UNIQUE REFERENCES sessions(id) ON DELETE CASCADE
);

-- Document catalogue
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    title TEXT NOT NULL,
    fields TEXT NOT NULL DEFAULT '{}', -- JSON object
    additional_sections TEXT NOT NULL DEFAULT '{}', -- JSON object
    status TEXT NOT NULL,
    iteration INTEGER NOT NULL DEFAULT 0 CHECK (iteration >= 0),
    version INTEGER NOT NULL DEFAULT 1 CHECK (version >= 1),
    PRIMARY KEY (collection, name)
);

-- Session to document links
CREATE TABLE IF NOT EXISTS session_documents (
    session_id TEXT PRIMARY KEY REFERENCES sessions(id) ON DELETE CASCADE,
    collection TEXT NOT NULL,
    name TEXT NOT NULL
);

-- Create indexes
CREATE INDEX IF NOT EXISTS idx_sessions_owner ON sessions(owner);
"#;

/// Durable backend over a single SQLite database file.
pub struct SqliteStore {
    pool: SqlitePool,
    config: CoordinatorConfig,
    op_timeout: Duration,
}

impl SqliteStore {
    /// Open (creating if needed) the database named by the configuration
    /// and bring the schema up to date.
    pub async fn open(config: &CoordinatorConfig) -> Result<Self> {
        let path = &config.database.path;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::unavailable(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(config.database.busy_timeout_ms));
        let pool = SqlitePoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| {
                Error::unavailable(format!("cannot open database {}: {e}", path.display()))
            })?;

        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| sql_err("initialize schema", e))?;

        debug!("Opened refinement store at {}", path.display());
        Ok(Self {
            pool,
            config: config.clone(),
            op_timeout: Duration::from_millis(config.database.operation_timeout_ms),
        })
    }

    /// Bound an operation by the configured timeout.
    async fn timed<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::unavailable(format!(
                "{op} timed out after {:?}",
                self.op_timeout
            ))),
        }
    }

    /// First statement of every session write: serializes writers and
    /// doubles as the existence check.
    async fn probe_session<'t>(
        tx: &mut sqlx::Transaction<'t, sqlx::Sqlite>,
        op: &'static str,
        id: &SessionId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let probed = sqlx::query("UPDATE sessions SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(id.as_str())
            .execute(&mut **tx)
            .await
            .map_err(|e| sql_err(op, e))?;
        if probed.rows_affected() == 0 {
            return Err(Error::not_found(format!("session {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl RefinementStore for SqliteStore {
    async fn add_session(&self, session: SessionState, owner: &str) -> Result<()> {
        let owner = owner.to_string();
        self.timed("add_session", async {
            let score_history = to_json(&session.score_history)?;
            let feedback_history = to_json(&session.feedback_history)?;
            let capacity = self.config.session_capacity as i64;

            let mut tx = self.pool.begin().await.map_err(|e| sql_err("add_session", e))?;
            sqlx::query(
                "INSERT INTO sessions (id, owner, kind, status, current_score, score_history,
                                       iteration, feedback_history, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(session.id.as_str())
            .bind(&owner)
            .bind(&session.kind)
            .bind(session.status.as_str())
            .bind(session.current_score.map(i64::from))
            .bind(&score_history)
            .bind(i64::from(session.iteration))
            .bind(&feedback_history)
            .bind(session.created_at)
            .bind(session.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::already_exists(format!("session {}", session.id))
                } else {
                    sql_err("add_session", e)
                }
            })?;

            sqlx::query("INSERT INTO session_index (session_id) VALUES (?)")
                .bind(session.id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| sql_err("add_session", e))?;

            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM session_index")
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| sql_err("add_session", e))?;
            if count > capacity {
                let victims: Vec<String> = sqlx::query_scalar(
                    "SELECT session_id FROM session_index ORDER BY position ASC LIMIT ?",
                )
                .bind(count - capacity)
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| sql_err("add_session", e))?;
                for victim in victims {
                    // Cascades clean up session_index and session_documents.
                    sqlx::query("DELETE FROM sessions WHERE id = ?")
                        .bind(&victim)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| sql_err("add_session", e))?;
                    debug!("Evicted session {victim} past capacity");
                }
            }

            tx.commit().await.map_err(|e| sql_err("add_session", e))?;
            debug!("Added session {} for owner {owner}", session.id);
            Ok(())
        })
        .await
    }

    async fn get_session(&self, id: &SessionId) -> Result<SessionState> {
        self.timed("get_session", async {
            let row = sqlx::query(
                "SELECT id, kind, status, current_score, score_history, iteration,
                        feedback_history, created_at, updated_at
                 FROM sessions WHERE id = ?",
            )
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| sql_err("get_session", e))?;
            match row {
                Some(row) => row_to_session(&row),
                None => Err(Error::not_found(format!("session {id}"))),
            }
        })
        .await
    }

    async fn list_sessions(&self, owner: &str) -> Result<Vec<SessionState>> {
        let owner = owner.to_string();
        self.timed("list_sessions", async {
            let rows = sqlx::query(
                "SELECT s.id, s.kind, s.status, s.current_score, s.score_history, s.iteration,
                        s.feedback_history, s.created_at, s.updated_at
                 FROM sessions s
                 JOIN session_index i ON i.session_id = s.id
                 WHERE s.owner = ?
                 ORDER BY i.position ASC",
            )
            .bind(&owner)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| sql_err("list_sessions", e))?;
            rows.iter().map(row_to_session).collect()
        })
        .await
    }

    async fn record_feedback(&self, id: &SessionId, draft: FeedbackDraft) -> Result<Feedback> {
        draft.validate()?;
        self.timed("record_feedback", async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| sql_err("record_feedback", e))?;
            Self::probe_session(&mut tx, "record_feedback", id, Utc::now()).await?;

            let row = sqlx::query(
                "SELECT id, kind, status, current_score, score_history, iteration,
                        feedback_history, created_at, updated_at
                 FROM sessions WHERE id = ?",
            )
            .bind(id.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| sql_err("record_feedback", e))?;
            let mut session = row_to_session(&row)?;

            let feedback = draft.into_feedback(session.id.clone(), session.iteration + 1);
            session.push_feedback(feedback.clone(), self.config.feedback_history_limit);
            session.touch();

            sqlx::query("UPDATE sessions SET feedback_history = ?, updated_at = ? WHERE id = ?")
                .bind(to_json(&session.feedback_history)?)
                .bind(session.updated_at)
                .bind(id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| sql_err("record_feedback", e))?;

            tx.commit()
                .await
                .map_err(|e| sql_err("record_feedback", e))?;
            debug!("Recorded feedback for {id} at round {}", feedback.iteration);
            Ok(feedback)
        })
        .await
    }

    async fn decide_next_action(&self, id: &SessionId) -> Result<Action> {
        self.timed("decide_next_action", async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| sql_err("decide_next_action", e))?;
            Self::probe_session(&mut tx, "decide_next_action", id, Utc::now()).await?;

            let row = sqlx::query(
                "SELECT id, kind, status, current_score, score_history, iteration,
                        feedback_history, created_at, updated_at
                 FROM sessions WHERE id = ?",
            )
            .bind(id.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| sql_err("decide_next_action", e))?;
            let mut session = row_to_session(&row)?;

            let score = session
                .latest_feedback()
                .map(|f| f.overall_score)
                .ok_or_else(|| {
                    Error::invariant(format!("session {id} has no feedback to assess"))
                })?;
            let policy = self.config.policy_for(&session.kind);
            let action = decide(
                &policy,
                &mut session,
                score,
                self.config.score_history_limit,
            );

            sqlx::query(
                "UPDATE sessions
                 SET status = ?, current_score = ?, score_history = ?, iteration = ?, updated_at = ?
                 WHERE id = ?",
            )
            .bind(session.status.as_str())
            .bind(session.current_score.map(i64::from))
            .bind(to_json(&session.score_history)?)
            .bind(i64::from(session.iteration))
            .bind(session.updated_at)
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| sql_err("decide_next_action", e))?;

            tx.commit()
                .await
                .map_err(|e| sql_err("decide_next_action", e))?;
            debug!("Session {id} round {}: {action}", session.iteration);
            Ok(action)
        })
        .await
    }

    async fn reset_session(&self, id: &SessionId) -> Result<SessionState> {
        self.timed("reset_session", async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| sql_err("reset_session", e))?;
            let result = sqlx::query("UPDATE sessions SET status = ?, updated_at = ? WHERE id = ?")
                .bind(SessionStatus::InProgress.as_str())
                .bind(Utc::now())
                .bind(id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| sql_err("reset_session", e))?;
            if result.rows_affected() == 0 {
                return Err(Error::not_found(format!("session {id}")));
            }
            let row = sqlx::query(
                "SELECT id, kind, status, current_score, score_history, iteration,
                        feedback_history, created_at, updated_at
                 FROM sessions WHERE id = ?",
            )
            .bind(id.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| sql_err("reset_session", e))?;
            let session = row_to_session(&row)?;
            tx.commit().await.map_err(|e| sql_err("reset_session", e))?;
            debug!("Reset session {id} to in_progress");
            Ok(session)
        })
        .await
    }

    async fn store_document(&self, collection: &str, document: Document) -> Result<String> {
        let mut document = document;
        let collection = collection.to_string();
        let name = catalogue_key(&collection, &document.title)?;
        self.timed("store_document", async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| sql_err("store_document", e))?;
            // Write-first: serializes concurrent upserts of the same key
            // and doubles as the existence check.
            let probed = sqlx::query(
                "UPDATE documents SET version = version WHERE collection = ? AND name = ?",
            )
            .bind(&collection)
            .bind(&name)
            .execute(&mut *tx)
            .await
            .map_err(|e| sql_err("store_document", e))?;

            if probed.rows_affected() == 0 {
                prepare_insert(&mut document);
                sqlx::query(
                    "INSERT INTO documents (collection, name, kind, title, fields,
                                            additional_sections, status, iteration, version)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&collection)
                .bind(&name)
                .bind(&document.kind)
                .bind(&document.title)
                .bind(to_json(&document.fields)?)
                .bind(to_json(&document.additional_sections)?)
                .bind(document.status.as_str())
                .bind(i64::from(document.iteration))
                .bind(i64::from(document.version))
                .execute(&mut *tx)
                .await
                .map_err(|e| sql_err("store_document", e))?;
            } else {
                let row = sqlx::query(
                    "SELECT kind, title, fields, additional_sections, status, iteration, version
                     FROM documents WHERE collection = ? AND name = ?",
                )
                .bind(&collection)
                .bind(&name)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| sql_err("store_document", e))?;
                let prior = row_to_document(&row)?;
                apply_update(&prior, &mut document)?;
                sqlx::query(
                    "UPDATE documents
                     SET kind = ?, title = ?, fields = ?, additional_sections = ?,
                         status = ?, iteration = ?, version = ?
                     WHERE collection = ? AND name = ?",
                )
                .bind(&document.kind)
                .bind(&document.title)
                .bind(to_json(&document.fields)?)
                .bind(to_json(&document.additional_sections)?)
                .bind(document.status.as_str())
                .bind(i64::from(document.iteration))
                .bind(i64::from(document.version))
                .bind(&collection)
                .bind(&name)
                .execute(&mut *tx)
                .await
                .map_err(|e| sql_err("store_document", e))?;
            }

            tx.commit()
                .await
                .map_err(|e| sql_err("store_document", e))?;
            debug!("Stored document {collection}/{name} v{}", document.version);
            Ok(name)
        })
        .await
    }

    async fn get_document(&self, collection: &str, name: &str) -> Result<Document> {
        let collection = collection.to_string();
        let name = lookup_key(&collection, name)?;
        self.timed("get_document", async {
            let row = sqlx::query(
                "SELECT kind, title, fields, additional_sections, status, iteration, version
                 FROM documents WHERE collection = ? AND name = ?",
            )
            .bind(&collection)
            .bind(&name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| sql_err("get_document", e))?;
            match row {
                Some(row) => row_to_document(&row),
                None => Err(Error::not_found(format!("document {collection}/{name}"))),
            }
        })
        .await
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<String>> {
        let collection = collection.to_string();
        self.timed("list_documents", async {
            sqlx::query_scalar("SELECT name FROM documents WHERE collection = ? ORDER BY name")
                .bind(&collection)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| sql_err("list_documents", e))
        })
        .await
    }

    async fn resolve_name(&self, collection: &str, partial: &str) -> Result<NameResolution> {
        let collection = collection.to_string();
        let partial = partial.to_string();
        self.timed("resolve_name", async {
            let names: Vec<String> =
                sqlx::query_scalar("SELECT name FROM documents WHERE collection = ? ORDER BY name")
                    .bind(&collection)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| sql_err("resolve_name", e))?;
            Ok(resolve(names.iter().map(String::as_str), &partial))
        })
        .await
    }

    async fn delete_document(&self, collection: &str, name: &str) -> Result<bool> {
        let collection = collection.to_string();
        let name = lookup_key(&collection, name)?;
        self.timed("delete_document", async {
            let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND name = ?")
                .bind(&collection)
                .bind(&name)
                .execute(&self.pool)
                .await
                .map_err(|e| sql_err("delete_document", e))?;
            let removed = result.rows_affected() > 0;
            if removed {
                debug!("Deleted document {collection}/{name}");
            }
            Ok(removed)
        })
        .await
    }

    async fn link_session(&self, id: &SessionId, collection: &str, name: &str) -> Result<()> {
        let collection = collection.to_string();
        let name = lookup_key(&collection, name)?;
        self.timed("link_session", async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| sql_err("link_session", e))?;
            Self::probe_session(&mut tx, "link_session", id, Utc::now()).await?;

            let exists =
                sqlx::query("SELECT 1 FROM documents WHERE collection = ? AND name = ?")
                    .bind(&collection)
                    .bind(&name)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| sql_err("link_session", e))?;
            if exists.is_none() {
                return Err(Error::not_found(format!("document {collection}/{name}")));
            }

            sqlx::query(
                "INSERT INTO session_documents (session_id, collection, name)
                 VALUES (?, ?, ?)
                 ON CONFLICT(session_id) DO UPDATE
                 SET collection = excluded.collection, name = excluded.name",
            )
            .bind(id.as_str())
            .bind(&collection)
            .bind(&name)
            .execute(&mut *tx)
            .await
            .map_err(|e| sql_err("link_session", e))?;

            tx.commit().await.map_err(|e| sql_err("link_session", e))?;
            debug!("Linked {id} to document {collection}/{name}");
            Ok(())
        })
        .await
    }

    async fn get_link(&self, id: &SessionId) -> Result<Option<DocumentKey>> {
        self.timed("get_link", async {
            let session = sqlx::query("SELECT 1 FROM sessions WHERE id = ?")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| sql_err("get_link", e))?;
            if session.is_none() {
                return Err(Error::not_found(format!("session {id}")));
            }
            let row =
                sqlx::query("SELECT collection, name FROM session_documents WHERE session_id = ?")
                    .bind(id.as_str())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| sql_err("get_link", e))?;
            row.map(|row| -> Result<DocumentKey> {
                Ok(DocumentKey::new(
                    row.try_get::<String, _>("collection")
                        .map_err(|e| sql_err("get_link", e))?,
                    row.try_get::<String, _>("name")
                        .map_err(|e| sql_err("get_link", e))?,
                ))
            })
            .transpose()
        })
        .await
    }

    async fn unlink_session(&self, id: &SessionId) -> Result<Option<DocumentKey>> {
        self.timed("unlink_session", async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| sql_err("unlink_session", e))?;
            Self::probe_session(&mut tx, "unlink_session", id, Utc::now()).await?;

            let row = sqlx::query(
                "DELETE FROM session_documents WHERE session_id = ? RETURNING collection, name",
            )
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| sql_err("unlink_session", e))?;
            let removed = row
                .map(|row| -> Result<DocumentKey> {
                    Ok(DocumentKey::new(
                        row.try_get::<String, _>("collection")
                            .map_err(|e| sql_err("unlink_session", e))?,
                        row.try_get::<String, _>("name")
                            .map_err(|e| sql_err("unlink_session", e))?,
                    ))
                })
                .transpose()?;

            tx.commit()
                .await
                .map_err(|e| sql_err("unlink_session", e))?;
            Ok(removed)
        })
        .await
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::invariant(format!("encode state: {e}")))
}

fn from_json<T: serde::de::DeserializeOwned>(what: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| Error::invariant(format!("corrupt {what}: {e}")))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Database(db)
            if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation)
    )
}

/// Map sqlx failures onto the crate taxonomy.
fn sql_err(op: &str, e: sqlx::Error) -> Error {
    use sqlx::error::ErrorKind;
    match &e {
        sqlx::Error::Database(db) => match db.kind() {
            ErrorKind::UniqueViolation => Error::already_exists(format!("{op}: {}", db.message())),
            ErrorKind::CheckViolation | ErrorKind::NotNullViolation => {
                Error::validation(format!("{op}: {}", db.message()))
            }
            ErrorKind::ForeignKeyViolation => {
                Error::invariant(format!("{op}: {}", db.message()))
            }
            _ => Error::unavailable(format!("{op}: {e}")),
        },
        sqlx::Error::RowNotFound => Error::not_found(op.to_string()),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            Error::invariant(format!("{op}: {e}"))
        }
        _ => Error::unavailable(format!("{op}: {e}")),
    }
}

fn row_to_session(row: &SqliteRow) -> Result<SessionState> {
    let decode = |e: sqlx::Error| sql_err("decode session row", e);

    let status_raw: String = row.try_get("status").map_err(decode)?;
    let status = SessionStatus::parse(&status_raw)
        .ok_or_else(|| Error::invariant(format!("unknown session status {status_raw:?}")))?;
    let current_score: Option<i64> = row.try_get("current_score").map_err(decode)?;
    let current_score = current_score
        .map(u32::try_from)
        .transpose()
        .map_err(|_| Error::invariant("current_score out of range"))?;
    let iteration: i64 = row.try_get("iteration").map_err(decode)?;
    let iteration =
        u32::try_from(iteration).map_err(|_| Error::invariant("iteration out of range"))?;
    let score_history_raw: String = row.try_get("score_history").map_err(decode)?;
    let feedback_history_raw: String = row.try_get("feedback_history").map_err(decode)?;

    Ok(SessionState {
        id: SessionId::from_string(row.try_get::<String, _>("id").map_err(decode)?),
        kind: row.try_get("kind").map_err(decode)?,
        status,
        current_score,
        score_history: from_json("score history", &score_history_raw)?,
        iteration,
        feedback_history: from_json("feedback history", &feedback_history_raw)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

fn row_to_document(row: &SqliteRow) -> Result<Document> {
    let decode = |e: sqlx::Error| sql_err("decode document row", e);

    let status_raw: String = row.try_get("status").map_err(decode)?;
    let status = DocumentStatus::parse(&status_raw)
        .ok_or_else(|| Error::invariant(format!("unknown document status {status_raw:?}")))?;
    let iteration: i64 = row.try_get("iteration").map_err(decode)?;
    let version: i64 = row.try_get("version").map_err(decode)?;
    let fields_raw: String = row.try_get("fields").map_err(decode)?;
    let additional_raw: String = row.try_get("additional_sections").map_err(decode)?;

    Ok(Document {
        kind: row.try_get("kind").map_err(decode)?,
        title: row.try_get("title").map_err(decode)?,
        fields: from_json("document fields", &fields_raw)?,
        additional_sections: from_json("additional sections", &additional_raw)?,
        status,
        iteration: u32::try_from(iteration)
            .map_err(|_| Error::invariant("document iteration out of range"))?,
        version: u32::try_from(version)
            .map_err(|_| Error::invariant("document version out of range"))?,
    })
}
