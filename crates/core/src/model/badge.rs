use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::LearnerId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BadgeError {
    #[error("unknown badge code: {0}")]
    UnknownCode(String),
}

//
// ─── BADGE CODE ────────────────────────────────────────────────────────────────
//

/// Stable identifier of an unlockable badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BadgeCode {
    First5,
    Streak3,
    Master1,
}

impl BadgeCode {
    /// All badge codes, in seed order.
    pub const ALL: [BadgeCode; 3] = [BadgeCode::First5, BadgeCode::Streak3, BadgeCode::Master1];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BadgeCode::First5 => "FIRST_5",
            BadgeCode::Streak3 => "STREAK_3",
            BadgeCode::Master1 => "MASTER_1",
        }
    }

    /// Parses the storage representation back into a code.
    ///
    /// # Errors
    ///
    /// Returns `BadgeError::UnknownCode` for unrecognized input.
    pub fn parse(s: &str) -> Result<Self, BadgeError> {
        match s {
            "FIRST_5" => Ok(BadgeCode::First5),
            "STREAK_3" => Ok(BadgeCode::Streak3),
            "MASTER_1" => Ok(BadgeCode::Master1),
            other => Err(BadgeError::UnknownCode(other.to_string())),
        }
    }
}

//
// ─── BADGE DEFINITIONS ─────────────────────────────────────────────────────────
//

/// A badge definition: process-wide immutable seed data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    pub code: BadgeCode,
    pub name: &'static str,
    pub description: &'static str,
}

impl Badge {
    /// The full badge catalog, seeded into storage at startup.
    #[must_use]
    pub fn catalog() -> [Badge; 3] {
        [
            Badge {
                code: BadgeCode::First5,
                name: "Getting Started",
                description: "Answered 5 questions",
            },
            Badge {
                code: BadgeCode::Streak3,
                name: "On a Roll",
                description: "3 correct answers in a row on one skill",
            },
            Badge {
                code: BadgeCode::Master1,
                name: "First Mastery",
                description: "Reached Practicing on a skill",
            },
        ]
    }

    /// Looks up the definition for a code.
    #[must_use]
    pub fn definition(code: BadgeCode) -> Badge {
        let [first5, streak3, master1] = Self::catalog();
        match code {
            BadgeCode::First5 => first5,
            BadgeCode::Streak3 => streak3,
            BadgeCode::Master1 => master1,
        }
    }
}

/// A badge a learner has earned. At most one per (learner, code).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnerBadge {
    pub learner_id: LearnerId,
    pub code: BadgeCode,
    pub earned_at: DateTime<Utc>,
}

//
// ─── AWARD RULES ───────────────────────────────────────────────────────────────
//

/// Cumulative state a badge rule is evaluated against, measured after the
/// answer it follows has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterySnapshot {
    /// Total `answer` events for the learner, including the current one.
    pub answered_total: u64,
    /// Streak on the just-updated skill.
    pub streak_correct: u32,
    /// Progress rows at `Practicing` for the learner.
    pub practicing_count: u64,
}

/// Evaluates every badge rule against the snapshot.
///
/// Returns the codes whose rules are satisfied. Whether a code is *newly*
/// earned is the awarder's concern: granting is check-then-insert-if-absent,
/// so re-evaluating a satisfied rule is a no-op, not an error.
#[must_use]
pub fn qualified(snapshot: MasterySnapshot) -> Vec<BadgeCode> {
    let mut earned = Vec::new();
    if snapshot.answered_total >= 5 {
        earned.push(BadgeCode::First5);
    }
    if snapshot.streak_correct >= 3 {
        earned.push(BadgeCode::Streak3);
    }
    if snapshot.practicing_count >= 1 {
        earned.push(BadgeCode::Master1);
    }
    earned
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_parse_roundtrip() {
        for code in BadgeCode::ALL {
            assert_eq!(BadgeCode::parse(code.as_str()).unwrap(), code);
        }
        assert!(BadgeCode::parse("FIRST_50").is_err());
    }

    #[test]
    fn catalog_covers_every_code() {
        let catalog = Badge::catalog();
        for code in BadgeCode::ALL {
            assert!(catalog.iter().any(|b| b.code == code));
        }
    }

    #[test]
    fn nothing_qualifies_on_a_fresh_learner() {
        let earned = qualified(MasterySnapshot {
            answered_total: 1,
            streak_correct: 1,
            practicing_count: 0,
        });
        assert!(earned.is_empty());
    }

    #[test]
    fn first_5_needs_exactly_five_answers() {
        let below = qualified(MasterySnapshot {
            answered_total: 4,
            streak_correct: 0,
            practicing_count: 0,
        });
        assert!(below.is_empty());

        let at = qualified(MasterySnapshot {
            answered_total: 5,
            streak_correct: 0,
            practicing_count: 0,
        });
        assert_eq!(at, vec![BadgeCode::First5]);
    }

    #[test]
    fn streak_and_mastery_rules_fire_together() {
        // A 3rd consecutive correct answer both completes the streak and
        // flips the skill to Practicing.
        let earned = qualified(MasterySnapshot {
            answered_total: 3,
            streak_correct: 3,
            practicing_count: 1,
        });
        assert_eq!(earned, vec![BadgeCode::Streak3, BadgeCode::Master1]);
    }
}
