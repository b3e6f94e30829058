use chrono::{DateTime, Utc};
use sqlx::Row;

use tutor_core::model::{Badge, BadgeCode, LearnerBadge, LearnerId};

use super::{
    SqliteRepository,
    mapping::{badge_code_from_str, id_i64, learner_id_from_i64, ser},
};
use crate::repository::{BadgeRepository, StorageError};

#[async_trait::async_trait]
impl BadgeRepository for SqliteRepository {
    async fn ensure_badges_seed(&self) -> Result<(), StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        for badge in Badge::catalog() {
            sqlx::query(
                r"
                INSERT INTO badges (code, name, description)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(code) DO NOTHING
                ",
            )
            .bind(badge.code.as_str())
            .bind(badge.name)
            .bind(badge.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    async fn award_if_absent(
        &self,
        learner_id: LearnerId,
        code: BadgeCode,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO learner_badges (learner_id, code, earned_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(learner_id, code) DO NOTHING
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(code.as_str())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(res.rows_affected() == 1)
    }

    async fn badges_for(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<(LearnerBadge, Badge)>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT lb.learner_id, lb.code, lb.earned_at
            FROM learner_badges lb
            JOIN badges b ON b.code = lb.code
            WHERE lb.learner_id = ?1
            ORDER BY lb.code ASC
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut earned = Vec::with_capacity(rows.len());
        for row in rows {
            let code = badge_code_from_str(row.try_get::<String, _>("code").map_err(ser)?.as_str())?;
            earned.push((
                LearnerBadge {
                    learner_id: learner_id_from_i64(
                        row.try_get::<i64, _>("learner_id").map_err(ser)?,
                    )?,
                    code,
                    earned_at: row.try_get("earned_at").map_err(ser)?,
                },
                Badge::definition(code),
            ));
        }
        Ok(earned)
    }
}
