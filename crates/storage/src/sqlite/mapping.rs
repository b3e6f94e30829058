use sqlx::Row;

use tutor_core::model::{
    BadgeCode, Learner, LearnerId, Progress, Skill, SkillId, SkillStatus, Subject,
};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn learner_id_from_i64(v: i64) -> Result<LearnerId, StorageError> {
    Ok(LearnerId::new(i64_to_u64("learner_id", v)?))
}

pub(crate) fn skill_id_from_i64(v: i64) -> Result<SkillId, StorageError> {
    Ok(SkillId::new(i64_to_u64("skill_id", v)?))
}

/// Maps a database error to `DuplicateSkill`/`Conflict` on unique violations,
/// `Connection` otherwise.
pub(crate) fn map_unique_violation(e: sqlx::Error, conflict: StorageError) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => conflict,
        _ => StorageError::Connection(e.to_string()),
    }
}

pub(crate) fn map_skill_row(row: &sqlx::sqlite::SqliteRow) -> Result<Skill, StorageError> {
    let subject: Subject = row
        .try_get::<String, _>("subject")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;

    Skill::new(
        skill_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        subject,
        row.try_get::<String, _>("topic").map_err(ser)?,
        row.try_get::<String, _>("subtopic").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_learner_row(row: &sqlx::sqlite::SqliteRow) -> Result<Learner, StorageError> {
    Learner::new(
        learner_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get::<String, _>("lang").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_progress_row(row: &sqlx::sqlite::SqliteRow) -> Result<Progress, StorageError> {
    let status_str: String = row.try_get("status").map_err(ser)?;
    let status = SkillStatus::parse(&status_str).map_err(ser)?;

    let streak_i64: i64 = row.try_get("streak_correct").map_err(ser)?;
    let streak_correct = u32::try_from(streak_i64)
        .map_err(|_| StorageError::Serialization(format!("invalid streak_correct: {streak_i64}")))?;

    Ok(Progress {
        learner_id: learner_id_from_i64(row.try_get::<i64, _>("learner_id").map_err(ser)?)?,
        skill_id: skill_id_from_i64(row.try_get::<i64, _>("skill_id").map_err(ser)?)?,
        status,
        streak_correct,
        last_seen: row.try_get("last_seen").map_err(ser)?,
    })
}

pub(crate) fn badge_code_from_str(s: &str) -> Result<BadgeCode, StorageError> {
    BadgeCode::parse(s).map_err(ser)
}
