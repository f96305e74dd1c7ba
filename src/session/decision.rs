//! Pure decision engine for refinement sessions.
//!
//! Given a policy, the session so far, and the latest assessment score,
//! `decide` picks the next action and applies the bookkeeping that goes
//! with an assessment round. It touches no storage, which keeps both
//! backends on identical semantics and makes the rules directly testable.

use serde::{Deserialize, Serialize};

use super::{SessionState, SessionStatus};

/// Thresholds governing when a session keeps refining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementPolicy {
    /// Scores at or above this complete the session.
    pub score_threshold: u32,
    /// Assessment rounds at or beyond this hand control to a human.
    pub max_iterations: u32,
    /// Minimum per-round improvement that still counts as progress.
    pub improvement_threshold: u32,
}

impl Default for RefinementPolicy {
    fn default() -> Self {
        Self {
            score_threshold: 85,
            max_iterations: 8,
            improvement_threshold: 5,
        }
    }
}

/// Next step for a session after an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Quality bar met, stop refining.
    Complete,
    /// Run another refinement round.
    Refine,
    /// Automated refinement is not paying off, ask a human.
    UserInput,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Refine => "refine",
            Self::UserInput => "user_input",
        }
    }

    /// Session status this action leaves behind.
    pub fn status(&self) -> SessionStatus {
        match self {
            Self::Complete => SessionStatus::Completed,
            Self::Refine => SessionStatus::Refine,
            Self::UserInput => SessionStatus::UserInput,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether the trailing two history entries both improved by less than the
/// threshold.
///
/// Each entry's improvement is the delta from its predecessor, zero for the
/// first entry ever recorded. An improvement exactly equal to the threshold
/// still counts as progress. Fewer than two entries is never stagnation.
pub fn is_stagnant(score_history: &[u32], improvement_threshold: u32) -> bool {
    if score_history.len() < 2 {
        return false;
    }
    let start = score_history.len() - 2;
    (start..score_history.len()).all(|i| {
        let delta = if i == 0 {
            0
        } else {
            i64::from(score_history[i]) - i64::from(score_history[i - 1])
        };
        delta < i64::from(improvement_threshold)
    })
}

/// Record an assessment and pick the next action.
///
/// Appends the score, bumps the iteration counter, and sets the session
/// status from the chosen action. Rules apply in order: threshold reached,
/// iteration cap hit, stagnation, otherwise refine. The caller has already
/// validated the score range.
pub fn decide(
    policy: &RefinementPolicy,
    session: &mut SessionState,
    score: u32,
    score_history_limit: usize,
) -> Action {
    session.push_score(score, score_history_limit);
    session.current_score = Some(score);
    session.iteration += 1;

    let action = if score >= policy.score_threshold {
        Action::Complete
    } else if session.iteration >= policy.max_iterations {
        Action::UserInput
    } else if is_stagnant(&session.score_history, policy.improvement_threshold) {
        Action::UserInput
    } else {
        Action::Refine
    };

    session.status = action.status();
    session.touch();
    action
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(threshold: u32, max_iterations: u32, improvement: u32) -> RefinementPolicy {
        RefinementPolicy {
            score_threshold: threshold,
            max_iterations,
            improvement_threshold: improvement,
        }
    }

    fn run(policy: &RefinementPolicy, scores: &[u32]) -> (Vec<Action>, SessionState) {
        let mut session = SessionState::new("phase");
        let actions = scores
            .iter()
            .map(|&s| decide(policy, &mut session, s, 25))
            .collect();
        (actions, session)
    }

    #[test]
    fn test_score_at_threshold_completes() {
        let (actions, session) = run(&policy(85, 8, 5), &[85]);
        assert_eq!(actions, vec![Action::Complete]);
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.iteration, 1);
        assert_eq!(session.current_score, Some(85));
    }

    #[test]
    fn test_score_below_threshold_refines() {
        let (actions, session) = run(&policy(85, 8, 5), &[84]);
        assert_eq!(actions, vec![Action::Refine]);
        assert_eq!(session.status, SessionStatus::Refine);
    }

    #[test]
    fn test_threshold_beats_iteration_cap() {
        // Third round hits the cap, but the score clears the bar first.
        let (actions, _) = run(&policy(85, 3, 5), &[50, 60, 90]);
        assert_eq!(
            actions,
            vec![Action::Refine, Action::Refine, Action::Complete]
        );
    }

    #[test]
    fn test_iteration_cap_hands_to_user() {
        let (actions, session) = run(&policy(85, 3, 5), &[10, 70, 75]);
        assert_eq!(
            actions,
            vec![Action::Refine, Action::Refine, Action::UserInput]
        );
        assert_eq!(session.iteration, 3);
        assert_eq!(session.status, SessionStatus::UserInput);
    }

    #[test]
    fn test_single_entry_is_never_stagnant() {
        assert!(!is_stagnant(&[3], 5));
        assert!(!is_stagnant(&[], 5));
    }

    #[test]
    fn test_two_low_first_entries_stagnate_via_zero_delta() {
        // First entry has improvement zero, second improved by 3: both
        // below a threshold of 5.
        assert!(is_stagnant(&[3, 6], 5));
        let (actions, _) = run(&policy(85, 8, 5), &[3, 6]);
        assert_eq!(actions, vec![Action::Refine, Action::UserInput]);
    }

    #[test]
    fn test_improvement_equal_to_threshold_is_progress() {
        assert!(!is_stagnant(&[60, 70, 75], 5));
        let (actions, _) = run(&policy(85, 8, 5), &[60, 70, 75]);
        assert_eq!(actions, vec![Action::Refine, Action::Refine, Action::Refine]);
    }

    #[test]
    fn test_improvement_one_below_threshold_twice_stagnates() {
        assert!(is_stagnant(&[60, 64, 68], 5));
    }

    #[test]
    fn test_regression_then_strong_recovery_is_progress() {
        assert!(!is_stagnant(&[70, 65, 75], 5));
    }

    #[test]
    fn test_two_weak_rounds_stagnate() {
        assert!(is_stagnant(&[60, 70, 73, 76], 5));
        let (actions, _) = run(&policy(85, 8, 5), &[60, 70, 73, 76]);
        assert_eq!(
            actions,
            vec![
                Action::Refine,
                Action::Refine,
                Action::Refine,
                Action::UserInput
            ]
        );
    }

    #[test]
    fn test_regression_counts_toward_stagnation() {
        assert!(is_stagnant(&[60, 70, 65, 66], 5));
    }

    #[test]
    fn test_one_strong_round_in_window_resets_stagnation() {
        assert!(!is_stagnant(&[60, 61, 62, 70], 5));
    }

    #[test]
    fn test_stagnation_sees_only_retained_history() {
        // With a limit of 2 the engine judges the evicted-down window.
        let p = policy(95, 50, 5);
        let mut session = SessionState::new("phase");
        for score in [10, 40, 70] {
            decide(&p, &mut session, score, 2);
        }
        assert_eq!(session.score_history, vec![40, 70]);
        assert_eq!(decide(&p, &mut session, 72, 2), Action::UserInput);
    }

    #[test]
    fn test_iteration_counts_every_assessment() {
        let (_, session) = run(&policy(99, 100, 1), &[10, 20, 30, 40]);
        assert_eq!(session.iteration, 4);
        assert_eq!(session.score_history, vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_zero_score_is_valid_input() {
        let (actions, session) = run(&policy(85, 8, 5), &[0]);
        assert_eq!(actions, vec![Action::Refine]);
        assert_eq!(session.current_score, Some(0));
    }
}
