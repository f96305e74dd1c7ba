//! # Whetstone
//!
//! Iterative quality-refinement sessions over structured markdown documents.
//!
//! A session tracks one artifact through review rounds: feedback comes in,
//! a pure decision engine scores it against a per-kind policy, and the
//! session either refines again, completes, or hands control to a human.
//! Documents round-trip between typed fields and canonical markdown, and
//! everything persists through one store contract with an in-memory and a
//! SQLite backend.
//!
//! ## Modules
//!
//! - `config` - Runtime configuration with TOML file and env overrides
//! - `document` - Document kinds, markdown parse/build, name normalization
//! - `error` - Error taxonomy shared by every layer
//! - `service` - The session coordinator, the crate's front door
//! - `session` - Session state and the refinement decision engine
//! - `store` - Backend contract plus the memory and SQLite stores
pub mod config;
pub mod document;
pub mod error;
pub mod service;
pub mod session;
pub mod store;

pub use config::CoordinatorConfig;
pub use error::{Error, Result};
pub use service::{SessionCoordinator, SessionHandle};
pub use session::{Action, FeedbackDraft, RefinementPolicy, SessionId, SessionStatus};
pub use store::{MemoryStore, RefinementStore, SqliteStore};
