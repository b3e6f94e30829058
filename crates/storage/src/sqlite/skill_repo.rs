use tutor_core::model::{Skill, SkillId, Subject, default_skill_for};

use super::{
    SqliteRepository,
    mapping::{id_i64, map_skill_row, map_unique_violation, ser},
};
use crate::repository::{SkillRepository, StorageError};

#[async_trait::async_trait]
impl SkillRepository for SqliteRepository {
    async fn insert_skill(
        &self,
        subject: Subject,
        topic: &str,
        subtopic: &str,
    ) -> Result<Skill, StorageError> {
        let topic = topic.trim();
        let subtopic = subtopic.trim();
        if topic.is_empty() || subtopic.is_empty() {
            return Err(ser("topic and subtopic must be non-empty"));
        }

        let res = sqlx::query(
            r"
            INSERT INTO skills (subject, topic, subtopic)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(subject.as_str())
        .bind(topic)
        .bind(subtopic)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, StorageError::DuplicateSkill))?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("negative rowid".into()))?;
        Skill::new(SkillId::new(id), subject, topic, subtopic).map_err(ser)
    }

    async fn skill_exists(
        &self,
        subject: Subject,
        topic: &str,
        subtopic: &str,
    ) -> Result<bool, StorageError> {
        let row = sqlx::query(
            r"
            SELECT 1 FROM skills
            WHERE subject = ?1 AND topic = ?2 AND subtopic = ?3
            ",
        )
        .bind(subject.as_str())
        .bind(topic.trim())
        .bind(subtopic.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(row.is_some())
    }

    async fn delete_skill(&self, id: SkillId) -> Result<(), StorageError> {
        // progress and events cascade via foreign keys
        let res = sqlx::query("DELETE FROM skills WHERE id = ?1")
            .bind(id_i64("skill_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn list_skills(&self, subject: Subject) -> Result<Vec<Skill>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, subject, topic, subtopic
            FROM skills
            WHERE subject = ?1
            ORDER BY topic ASC, subtopic ASC
            ",
        )
        .bind(subject.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut skills = Vec::with_capacity(rows.len());
        for row in rows {
            skills.push(map_skill_row(&row)?);
        }
        Ok(skills)
    }

    async fn seed_defaults_if_empty(&self, subject: Subject) -> Result<Vec<Skill>, StorageError> {
        let (topic, subtopic) = default_skill_for(subject);

        // ON CONFLICT DO NOTHING makes concurrent seeding safe; the WHERE NOT
        // EXISTS guard keeps the seed from reappearing after someone deleted
        // it deliberately while other skills remain.
        sqlx::query(
            r"
            INSERT INTO skills (subject, topic, subtopic)
            SELECT ?1, ?2, ?3
            WHERE NOT EXISTS (SELECT 1 FROM skills WHERE subject = ?1)
            ON CONFLICT(subject, topic, subtopic) DO NOTHING
            ",
        )
        .bind(subject.as_str())
        .bind(topic)
        .bind(subtopic)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        self.list_skills(subject).await
    }
}
