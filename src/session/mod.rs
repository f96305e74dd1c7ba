//! Refinement session state.
//!
//! A session tracks one artifact through repeated review rounds: bounded
//! score and feedback histories, an iteration counter, and a status that
//! only the decision engine (or an explicit reset) may change.

pub mod decision;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub use decision::{decide, is_stagnant, Action, RefinementPolicy};

use crate::error::{Error, Result};

/// Default cap on retained score history entries.
pub const DEFAULT_SCORE_HISTORY_LIMIT: usize = 25;
/// Default cap on retained feedback entries.
pub const DEFAULT_FEEDBACK_HISTORY_LIMIT: usize = 10;

/// Unique identifier for a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new session ID
    pub fn new() -> Self {
        Self(format!("session-{}", Uuid::new_v4()))
    }

    /// Create from an existing string
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created, no review round has run yet.
    Initialized,
    /// Explicitly resumed after waiting on user input.
    InProgress,
    /// Last decision asked for another refinement round.
    Refine,
    /// Last decision handed control to a human.
    UserInput,
    /// Quality bar reached.
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::InProgress => "in_progress",
            Self::Refine => "refine",
            Self::UserInput => "user_input",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "initialized" => Some(Self::Initialized),
            "in_progress" => Some(Self::InProgress),
            "refine" => Some(Self::Refine),
            "user_input" => Some(Self::UserInput),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One recorded review of the session's artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub session_id: SessionId,
    pub reviewer: String,
    /// Review round this feedback belongs to, stamped by the store.
    pub iteration: u32,
    pub overall_score: u32,
    pub summary: String,
    pub detail: String,
    pub key_issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied feedback before the store stamps identity and round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackDraft {
    pub reviewer: String,
    pub overall_score: u32,
    pub summary: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub key_issues: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl FeedbackDraft {
    /// Reject drafts the store must never accept.
    pub fn validate(&self) -> Result<()> {
        if self.overall_score > 100 {
            return Err(Error::validation(format!(
                "overall_score {} is outside 0..=100",
                self.overall_score
            )));
        }
        if self.reviewer.trim().is_empty() {
            return Err(Error::validation("feedback reviewer must not be empty"));
        }
        Ok(())
    }

    /// Stamp the draft into a full feedback record.
    pub fn into_feedback(self, session_id: SessionId, iteration: u32) -> Feedback {
        Feedback {
            session_id,
            reviewer: self.reviewer,
            iteration,
            overall_score: self.overall_score,
            summary: self.summary,
            detail: self.detail,
            key_issues: self.key_issues,
            recommendations: self.recommendations,
            created_at: Utc::now(),
        }
    }
}

/// Full state of one refinement session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub id: SessionId,
    /// Document kind under refinement.
    pub kind: String,
    pub status: SessionStatus,
    /// Score from the most recent assessment, if any.
    pub current_score: Option<u32>,
    /// Oldest first, bounded by the configured limit.
    pub score_history: Vec<u32>,
    /// Count of completed assessment rounds.
    pub iteration: u32,
    /// Oldest first, bounded by the configured limit.
    pub feedback_history: Vec<Feedback>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(kind: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            kind: kind.into(),
            status: SessionStatus::Initialized,
            current_score: None,
            score_history: Vec::new(),
            iteration: 0,
            feedback_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn latest_feedback(&self) -> Option<&Feedback> {
        self.feedback_history.last()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Append a score, evicting from the front past the limit.
    pub(crate) fn push_score(&mut self, score: u32, limit: usize) {
        self.score_history.push(score);
        while self.score_history.len() > limit {
            self.score_history.remove(0);
        }
    }

    /// Append feedback, evicting from the front past the limit.
    pub(crate) fn push_feedback(&mut self, feedback: Feedback, limit: usize) {
        self.feedback_history.push(feedback);
        while self.feedback_history.len() > limit {
            self.feedback_history.remove(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_is_unique_and_prefixed() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("session-"));
        assert_eq!(SessionId::from_string("session-x").as_str(), "session-x");
    }

    #[test]
    fn test_new_session_starts_initialized_at_round_zero() {
        let session = SessionState::new("phase");
        assert_eq!(session.status, SessionStatus::Initialized);
        assert_eq!(session.iteration, 0);
        assert_eq!(session.current_score, None);
        assert!(session.score_history.is_empty());
        assert!(session.feedback_history.is_empty());
    }

    #[test]
    fn test_push_score_evicts_oldest_past_limit() {
        let mut session = SessionState::new("phase");
        for score in [10, 20, 30, 40, 50] {
            session.push_score(score, 3);
        }
        assert_eq!(session.score_history, vec![30, 40, 50]);
    }

    #[test]
    fn test_push_feedback_evicts_oldest_past_limit() {
        let mut session = SessionState::new("phase");
        for round in 1..=4u32 {
            let fb = FeedbackDraft {
                reviewer: format!("reviewer-{round}"),
                overall_score: 50,
                summary: "fine".to_string(),
                ..Default::default()
            }
            .into_feedback(session.id.clone(), round);
            session.push_feedback(fb, 2);
        }
        let reviewers: Vec<_> = session
            .feedback_history
            .iter()
            .map(|f| f.reviewer.as_str())
            .collect();
        assert_eq!(reviewers, vec!["reviewer-3", "reviewer-4"]);
    }

    #[test]
    fn test_draft_validation() {
        let mut draft = FeedbackDraft {
            reviewer: "quality-bot".to_string(),
            overall_score: 100,
            ..Default::default()
        };
        assert!(draft.validate().is_ok());
        draft.overall_score = 101;
        assert!(matches!(draft.validate(), Err(Error::Validation(_))));
        draft.overall_score = 0;
        draft.reviewer = "  ".to_string();
        assert!(matches!(draft.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            SessionStatus::Initialized,
            SessionStatus::InProgress,
            SessionStatus::Refine,
            SessionStatus::UserInput,
            SessionStatus::Completed,
        ] {
            assert_eq!(SessionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SessionStatus::parse("paused"), None);
    }
}
