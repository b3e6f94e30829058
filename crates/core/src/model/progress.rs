use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{LearnerId, SkillId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProgressError {
    #[error("invalid skill status: {0}")]
    InvalidStatus(String),
}

//
// ─── SKILL STATUS ──────────────────────────────────────────────────────────────
//

/// Mastery stage of a learner on one skill.
///
/// `Unseen` is the implicit state of a skill with no progress row; stored rows
/// carry `Learning` or `Practicing`. Once the consecutive-correct streak
/// reaches the practicing threshold the status sticks at `Practicing`; a
/// later miss resets the streak but never demotes the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkillStatus {
    Unseen,
    Learning,
    Practicing,
}

impl SkillStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SkillStatus::Unseen => "Unseen",
            SkillStatus::Learning => "Learning",
            SkillStatus::Practicing => "Practicing",
        }
    }

    /// Parses the storage representation back into a status.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::InvalidStatus` for unrecognized input.
    pub fn parse(s: &str) -> Result<Self, ProgressError> {
        match s {
            "Unseen" => Ok(SkillStatus::Unseen),
            "Learning" => Ok(SkillStatus::Learning),
            "Practicing" => Ok(SkillStatus::Practicing),
            other => Err(ProgressError::InvalidStatus(other.to_string())),
        }
    }
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

/// Per-(learner, skill) mastery state: exactly one row per pair.
///
/// Holds only the current streak and status. Cumulative answered/correct
/// counts live in the event log, which is the sole source for aggregates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub learner_id: LearnerId,
    pub skill_id: SkillId,
    pub status: SkillStatus,
    pub streak_correct: u32,
    pub last_seen: DateTime<Utc>,
}

impl Progress {
    /// The state assumed for a skill the learner has never answered.
    #[must_use]
    pub fn fresh(learner_id: LearnerId, skill_id: SkillId, now: DateTime<Utc>) -> Self {
        Self {
            learner_id,
            skill_id,
            status: SkillStatus::Learning,
            streak_correct: 0,
            last_seen: now,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn status_parse_roundtrip() {
        for status in [
            SkillStatus::Unseen,
            SkillStatus::Learning,
            SkillStatus::Practicing,
        ] {
            assert_eq!(SkillStatus::parse(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn status_parse_rejects_unknown() {
        let err = SkillStatus::parse("Mastered").unwrap_err();
        assert!(matches!(err, ProgressError::InvalidStatus(_)));
    }

    #[test]
    fn fresh_progress_starts_learning_with_zero_streak() {
        let p = Progress::fresh(LearnerId::new(1), SkillId::new(2), fixed_now());
        assert_eq!(p.status, SkillStatus::Learning);
        assert_eq!(p.streak_correct, 0);
    }
}
