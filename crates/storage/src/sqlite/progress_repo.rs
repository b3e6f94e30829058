use tutor_core::model::{LearnerId, Progress, SkillId, SkillStatus};

use super::{
    SqliteRepository,
    mapping::{id_i64, map_progress_row},
};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        learner_id: LearnerId,
        skill_id: SkillId,
    ) -> Result<Option<Progress>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT learner_id, skill_id, status, streak_correct, last_seen
            FROM progress
            WHERE learner_id = ?1 AND skill_id = ?2
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(id_i64("skill_id", skill_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn progress_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<Progress>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT learner_id, skill_id, status, streak_correct, last_seen
            FROM progress
            WHERE learner_id = ?1
            ORDER BY skill_id ASC
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_progress_row(&row)?);
        }
        Ok(out)
    }

    async fn practicing_count(&self, learner_id: LearnerId) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM progress
            WHERE learner_id = ?1 AND status = ?2
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(SkillStatus::Practicing.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        u64::try_from(count).map_err(|_| StorageError::Serialization("negative count".into()))
    }
}
