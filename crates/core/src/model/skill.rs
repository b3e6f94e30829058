use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::SkillId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SkillError {
    #[error("topic cannot be empty")]
    EmptyTopic,

    #[error("subtopic cannot be empty")]
    EmptySubtopic,

    #[error("unknown subject: {0}")]
    UnknownSubject(String),
}

//
// ─── SUBJECT ───────────────────────────────────────────────────────────────────
//

/// The fixed set of subjects the tutor teaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Subject {
    Math,
    Science,
    Literacy,
}

impl Subject {
    /// All subjects, in catalog order.
    pub const ALL: [Subject; 3] = [Subject::Math, Subject::Science, Subject::Literacy];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Subject::Math => "Math",
            Subject::Science => "Science",
            Subject::Literacy => "Literacy",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subject {
    type Err = SkillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "math" => Ok(Subject::Math),
            "science" => Ok(Subject::Science),
            "literacy" => Ok(Subject::Literacy),
            other => Err(SkillError::UnknownSubject(other.to_string())),
        }
    }
}

impl TryFrom<String> for Subject {
    type Error = SkillError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Subject> for String {
    fn from(value: Subject) -> Self {
        value.as_str().to_string()
    }
}

//
// ─── SKILL ─────────────────────────────────────────────────────────────────────
//

/// The atomic teachable unit: a subtopic inside a topic inside a subject.
///
/// The `(subject, topic, subtopic)` triple is unique across the catalog;
/// storage enforces this with a uniqueness constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    id: SkillId,
    subject: Subject,
    topic: String,
    subtopic: String,
}

impl Skill {
    /// Creates a new Skill.
    ///
    /// # Errors
    ///
    /// Returns `SkillError` if topic or subtopic is empty or whitespace-only.
    pub fn new(
        id: SkillId,
        subject: Subject,
        topic: impl Into<String>,
        subtopic: impl Into<String>,
    ) -> Result<Self, SkillError> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(SkillError::EmptyTopic);
        }
        let subtopic = subtopic.into();
        if subtopic.trim().is_empty() {
            return Err(SkillError::EmptySubtopic);
        }

        Ok(Self {
            id,
            subject,
            topic: topic.trim().to_owned(),
            subtopic: subtopic.trim().to_owned(),
        })
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> SkillId {
        self.id
    }

    #[must_use]
    pub fn subject(&self) -> Subject {
        self.subject
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn subtopic(&self) -> &str {
        &self.subtopic
    }
}

/// The starter skill seeded for a subject with an empty catalog.
#[must_use]
pub fn default_skill_for(subject: Subject) -> (&'static str, &'static str) {
    match subject {
        Subject::Math => ("Arithmetic", "Add and subtract small numbers"),
        Subject::Science => ("Nature", "Living and non-living things"),
        Subject::Literacy => ("Reading", "Short vowel sounds"),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
