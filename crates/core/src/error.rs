use thiserror::Error;

use crate::model::{BadgeError, EventError, LearnerError, ProgressError, SkillError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Skill(#[from] SkillError),
    #[error(transparent)]
    Learner(#[from] LearnerError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Event(#[from] EventError),
    #[error(transparent)]
    Badge(#[from] BadgeError),
}
