use chrono::{DateTime, Utc};

use tutor_core::model::{
    AnswerPayload, BadgeCode, EventKind, MasterySnapshot, Progress, qualified,
};

use super::{SqliteRepository, mapping::{id_i64, ser}};
use crate::repository::{AnswerPersistence, StorageError};

#[async_trait::async_trait]
impl AnswerPersistence for SqliteRepository {
    async fn record_answer(
        &self,
        progress: &Progress,
        payload: &AnswerPayload,
        at: DateTime<Utc>,
    ) -> Result<Vec<BadgeCode>, StorageError> {
        let learner_id = id_i64("learner_id", progress.learner_id.value())?;
        let skill_id = id_i64("skill_id", progress.skill_id.value())?;
        let data = serde_json::to_string(payload).map_err(ser)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query(
            r"
            INSERT INTO progress (learner_id, skill_id, status, streak_correct, last_seen)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(learner_id, skill_id) DO UPDATE SET
                status = excluded.status,
                streak_correct = excluded.streak_correct,
                last_seen = excluded.last_seen
            ",
        )
        .bind(learner_id)
        .bind(skill_id)
        .bind(progress.status.as_str())
        .bind(i64::from(progress.streak_correct))
        .bind(progress.last_seen)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query(
            r"
            INSERT INTO events (learner_id, skill_id, kind, data, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(learner_id)
        .bind(skill_id)
        .bind(EventKind::Answer.as_str())
        .bind(&data)
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        // Badge rules read the counts inside the same transaction so a failed
        // award rolls the progress/event writes back with it.
        let answered_total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM events WHERE learner_id = ?1 AND kind = 'answer'",
        )
        .bind(learner_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let practicing_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM progress WHERE learner_id = ?1 AND status = 'Practicing'",
        )
        .bind(learner_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let snapshot = MasterySnapshot {
            answered_total: u64::try_from(answered_total)
                .map_err(|_| StorageError::Serialization("negative count".into()))?,
            streak_correct: progress.streak_correct,
            practicing_count: u64::try_from(practicing_count)
                .map_err(|_| StorageError::Serialization("negative count".into()))?,
        };

        let mut newly_earned = Vec::new();
        for code in qualified(snapshot) {
            let res = sqlx::query(
                r"
                INSERT INTO learner_badges (learner_id, code, earned_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(learner_id, code) DO NOTHING
                ",
            )
            .bind(learner_id)
            .bind(code.as_str())
            .bind(at)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

            if res.rows_affected() == 1 {
                newly_earned.push(code);
            }
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(newly_earned)
    }
}
