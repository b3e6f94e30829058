use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::LearnerId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LearnerError {
    #[error("learner name cannot be empty")]
    EmptyName,

    #[error("learner language cannot be empty")]
    EmptyLang,
}

//
// ─── LEARNER ───────────────────────────────────────────────────────────────────
//

/// A person using the tutor.
///
/// There is no authentication; the `(name, lang)` pair identifies a learner
/// and storage keeps it unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Learner {
    id: LearnerId,
    name: String,
    lang: String,
    created_at: DateTime<Utc>,
}

impl Learner {
    /// Creates a new Learner.
    ///
    /// # Errors
    ///
    /// Returns `LearnerError` if name or language is empty or whitespace-only.
    pub fn new(
        id: LearnerId,
        name: impl Into<String>,
        lang: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, LearnerError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(LearnerError::EmptyName);
        }
        let lang = lang.into();
        if lang.trim().is_empty() {
            return Err(LearnerError::EmptyLang);
        }

        Ok(Self {
            id,
            name: name.trim().to_owned(),
            lang: lang.trim().to_owned(),
            created_at,
        })
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> LearnerId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn lang(&self) -> &str {
        &self.lang
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
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
    fn learner_new_rejects_empty_name() {
        let err = Learner::new(LearnerId::new(1), "   ", "English", fixed_now()).unwrap_err();
        assert_eq!(err, LearnerError::EmptyName);
    }

    #[test]
    fn learner_new_rejects_empty_lang() {
        let err = Learner::new(LearnerId::new(1), "Ava", "", fixed_now()).unwrap_err();
        assert_eq!(err, LearnerError::EmptyLang);
    }

    #[test]
    fn learner_trims_fields() {
        let learner = Learner::new(LearnerId::new(3), " Ava ", " English ", fixed_now()).unwrap();
        assert_eq!(learner.name(), "Ava");
        assert_eq!(learner.lang(), "English");
        assert_eq!(learner.id(), LearnerId::new(3));
    }
}
