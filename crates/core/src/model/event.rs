use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{LearnerId, SkillId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("invalid event kind: {0}")]
    InvalidKind(String),
}

//
// ─── EVENT KIND ────────────────────────────────────────────────────────────────
//

/// What an event records: an answered question or a content report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Answer,
    Report,
}

impl EventKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Answer => "answer",
            EventKind::Report => "report",
        }
    }

    /// Parses the storage representation back into a kind.
    ///
    /// # Errors
    ///
    /// Returns `EventError::InvalidKind` for unrecognized input.
    pub fn parse(s: &str) -> Result<Self, EventError> {
        match s {
            "answer" => Ok(EventKind::Answer),
            "report" => Ok(EventKind::Report),
            other => Err(EventError::InvalidKind(other.to_string())),
        }
    }
}

//
// ─── PAYLOADS ──────────────────────────────────────────────────────────────────
//

/// JSON payload of an `answer` event.
///
/// `correct` is what aggregate stats count; question and feedback are kept
/// for later inspection but nothing reads them back today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerPayload {
    pub correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl AnswerPayload {
    #[must_use]
    pub fn graded(correct: bool) -> Self {
        Self {
            correct,
            question: None,
            feedback: None,
        }
    }
}

/// JSON payload of a `report` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub reason: String,
}

//
// ─── EVENT ─────────────────────────────────────────────────────────────────────
//

/// One append-only fact about a learner and a skill.
///
/// Immutable once written; the event log is the sole source for historical
/// aggregates (total answered, total correct).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: i64,
    pub learner_id: LearnerId,
    pub skill_id: SkillId,
    pub kind: EventKind,
    pub data: String,
    pub created_at: DateTime<Utc>,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
