//! Runtime configuration.
//!
//! Everything has a working default; a TOML file named by the
//! `WHETSTONE_CONFIG` environment variable (or handed to `from_path`)
//! overrides the parts it mentions. Configuration for an embedded library
//! stays deliberately small: capacity, history caps, database tuning, and
//! per-kind policy overrides.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::document::kind;
use crate::error::{Error, Result};
use crate::session::{
    RefinementPolicy, DEFAULT_FEEDBACK_HISTORY_LIMIT, DEFAULT_SCORE_HISTORY_LIMIT,
};

/// Environment variable naming the config file to load.
pub const CONFIG_ENV: &str = "WHETSTONE_CONFIG";

/// Default cap on concurrently retained sessions.
pub const DEFAULT_SESSION_CAPACITY: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Oldest sessions are evicted once this many are retained.
    pub session_capacity: usize,
    /// Per-session cap on retained scores.
    pub score_history_limit: usize,
    /// Per-session cap on retained feedback records.
    pub feedback_history_limit: usize,
    pub database: DatabaseConfig,
    /// Per-kind overrides of the built-in refinement policies.
    pub kinds: BTreeMap<String, RefinementPolicy>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            session_capacity: DEFAULT_SESSION_CAPACITY,
            score_history_limit: DEFAULT_SCORE_HISTORY_LIMIT,
            feedback_history_limit: DEFAULT_FEEDBACK_HISTORY_LIMIT,
            database: DatabaseConfig::default(),
            kinds: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file, created on first open.
    pub path: PathBuf,
    pub max_connections: u32,
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout_ms: u64,
    /// Outer bound on any single store operation.
    pub operation_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("whetstone.db"),
            max_connections: 5,
            busy_timeout_ms: 5_000,
            operation_timeout_ms: 5_000,
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::validation(format!("cannot read config {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&text).map_err(|e| {
            Error::validation(format!("cannot parse config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the file named by `WHETSTONE_CONFIG`, or defaults when the
    /// variable is unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_path(path),
            Err(std::env::VarError::NotPresent) => Ok(Self::default()),
            Err(e) => Err(Error::validation(format!("{CONFIG_ENV}: {e}"))),
        }
    }

    /// Reject configurations the stores must never run with.
    pub fn validate(&self) -> Result<()> {
        if self.session_capacity == 0 {
            return Err(Error::validation("session_capacity must be at least 1"));
        }
        // Stagnation judges the trailing two entries, so anything shorter
        // would make every session look stagnant.
        if self.score_history_limit < 2 {
            return Err(Error::validation("score_history_limit must be at least 2"));
        }
        if self.feedback_history_limit == 0 {
            return Err(Error::validation("feedback_history_limit must be at least 1"));
        }
        for (kind_id, policy) in &self.kinds {
            if policy.score_threshold > 100 {
                return Err(Error::validation(format!(
                    "kind {kind_id}: score_threshold {} is outside 0..=100",
                    policy.score_threshold
                )));
            }
            if policy.max_iterations == 0 {
                return Err(Error::validation(format!(
                    "kind {kind_id}: max_iterations must be at least 1"
                )));
            }
        }
        Ok(())
    }

    /// Effective policy for a kind: override first, then the kind's
    /// built-in default.
    pub fn policy_for(&self, kind_id: &str) -> RefinementPolicy {
        if let Some(policy) = self.kinds.get(kind_id) {
            return *policy;
        }
        kind::lookup(kind_id)
            .map(|k| k.policy)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.session_capacity, 10);
        assert_eq!(config.score_history_limit, 25);
        assert_eq!(config.feedback_history_limit, 10);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.database.operation_timeout_ms, 5_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_overrides_only_named_fields() {
        let config: CoordinatorConfig = toml::from_str(
            r#"
            session_capacity = 4

            [database]
            busy_timeout_ms = 250

            [kinds.phase]
            score_threshold = 95
            max_iterations = 3
            improvement_threshold = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.session_capacity, 4);
        assert_eq!(config.database.busy_timeout_ms, 250);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.score_history_limit, 25);
        assert_eq!(config.policy_for("phase").score_threshold, 95);
    }

    #[test]
    fn test_policy_for_falls_back_to_kind_default() {
        let config = CoordinatorConfig::default();
        let phase = kind::lookup("phase").unwrap();
        assert_eq!(config.policy_for("phase"), phase.policy);
        // Unknown kind ids still produce a usable policy.
        assert_eq!(config.policy_for("mystery"), RefinementPolicy::default());
    }

    #[test]
    fn test_validate_rejects_degenerate_limits() {
        let config = CoordinatorConfig {
            session_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CoordinatorConfig {
            score_history_limit: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CoordinatorConfig {
            kinds: BTreeMap::from([(
                "phase".to_string(),
                RefinementPolicy {
                    score_threshold: 101,
                    max_iterations: 3,
                    improvement_threshold: 5,
                },
            )]),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_path_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whetstone.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "session_capacity = 7").unwrap();
        drop(file);

        let config = CoordinatorConfig::from_path(&path).unwrap();
        assert_eq!(config.session_capacity, 7);

        let missing = CoordinatorConfig::from_path(dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(Error::Validation(_))));
    }
}
