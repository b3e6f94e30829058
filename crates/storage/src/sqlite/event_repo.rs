use chrono::{DateTime, Utc};

use tutor_core::model::{EventKind, LearnerId, SkillId};

use super::{SqliteRepository, mapping::id_i64};
use crate::repository::{AnswerCounts, EventRepository, StorageError};

#[async_trait::async_trait]
impl EventRepository for SqliteRepository {
    async fn append_event(
        &self,
        learner_id: LearnerId,
        skill_id: SkillId,
        kind: EventKind,
        data: &str,
        at: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO events (learner_id, skill_id, kind, data, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(id_i64("skill_id", skill_id.value())?)
        .bind(kind.as_str())
        .bind(data)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(res.last_insert_rowid())
    }

    async fn answer_counts(&self, learner_id: LearnerId) -> Result<AnswerCounts, StorageError> {
        let (answered, correct): (i64, i64) = sqlx::query_as(
            r"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE json_extract(data, '$.correct'))
            FROM events
            WHERE learner_id = ?1 AND kind = 'answer'
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(AnswerCounts {
            answered: u64::try_from(answered)
                .map_err(|_| StorageError::Serialization("negative count".into()))?,
            correct: u64::try_from(correct)
                .map_err(|_| StorageError::Serialization("negative count".into()))?,
        })
    }
}
