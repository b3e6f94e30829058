//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use tutor_core::model::SkillError;

/// Errors emitted by the oracle client.
///
/// These cover transport only. An oracle reply that arrives but cannot be
/// parsed is *not* an error; it is recovered into fallback defaults so a
/// lesson never dead-ends on a malformed model reply.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OracleError {
    #[error("oracle unavailable: request timed out")]
    Timeout,
    #[error("oracle returned an empty response")]
    EmptyResponse,
    #[error("oracle request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `AdaptiveEngine`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error("no skills available for subject {0}")]
    NoSkills(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by curriculum pack import/export.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CurriculumError {
    #[error("invalid curriculum pack: {0}")]
    InvalidPack(String),
    #[error(transparent)]
    Skill(#[from] SkillError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
