use chrono::{DateTime, Utc};

use tutor_core::model::{Learner, LearnerId};

use super::{
    SqliteRepository,
    mapping::{id_i64, map_learner_row, ser},
};
use crate::repository::{LearnerRepository, StorageError};

#[async_trait::async_trait]
impl LearnerRepository for SqliteRepository {
    async fn ensure_learner(
        &self,
        name: &str,
        lang: &str,
        now: DateTime<Utc>,
    ) -> Result<Learner, StorageError> {
        let name = name.trim();
        let lang = lang.trim();
        if name.is_empty() || lang.is_empty() {
            return Err(ser("learner name and lang must be non-empty"));
        }

        // Insert-if-absent then read back: idempotent under concurrent calls
        // thanks to UNIQUE(name, lang).
        sqlx::query(
            r"
            INSERT INTO learners (name, lang, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(name, lang) DO NOTHING
            ",
        )
        .bind(name)
        .bind(lang)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let row = sqlx::query(
            r"
            SELECT id, name, lang, created_at
            FROM learners
            WHERE name = ?1 AND lang = ?2
            ",
        )
        .bind(name)
        .bind(lang)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        map_learner_row(&row)
    }

    async fn get_learner(&self, id: LearnerId) -> Result<Learner, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, name, lang, created_at
            FROM learners
            WHERE id = ?1
            ",
        )
        .bind(id_i64("learner_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        map_learner_row(&row)
    }
}
