use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use tutor_core::model::{
    AnswerPayload, Badge, BadgeCode, Event, EventKind, Learner, LearnerBadge, LearnerId,
    MasterySnapshot, Progress, Skill, SkillId, SkillStatus, Subject, default_skill_for, qualified,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("skill already exists for this (subject, topic, subtopic)")]
    DuplicateSkill,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Answered/correct totals derived from the event log.
///
/// Progress rows only hold the current streak and status; these counts come
/// from counting `answer` events, the sole source for historical aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnswerCounts {
    pub answered: u64,
    pub correct: u64,
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

#[async_trait]
pub trait LearnerRepository: Send + Sync {
    /// Find the learner identified by `(name, lang)` or create one.
    ///
    /// Idempotent: calling twice with the same pair returns the same learner.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the learner cannot be stored or the name/lang
    /// fail validation.
    async fn ensure_learner(
        &self,
        name: &str,
        lang: &str,
        now: DateTime<Utc>,
    ) -> Result<Learner, StorageError>;

    /// Fetch a learner by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_learner(&self, id: LearnerId) -> Result<Learner, StorageError>;
}

#[async_trait]
pub trait SkillRepository: Send + Sync {
    /// Insert a new skill.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::DuplicateSkill` if the `(subject, topic, subtopic)`
    /// triple already exists.
    async fn insert_skill(
        &self,
        subject: Subject,
        topic: &str,
        subtopic: &str,
    ) -> Result<Skill, StorageError>;

    /// Whether a skill with this exact triple exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn skill_exists(
        &self,
        subject: Subject,
        topic: &str,
        subtopic: &str,
    ) -> Result<bool, StorageError>;

    /// Delete a skill. Cascades to the skill's progress rows and events.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the skill does not exist.
    async fn delete_skill(&self, id: SkillId) -> Result<(), StorageError>;

    /// All skills for a subject, ordered by `(topic, subtopic)` ascending,
    /// case-sensitive. The ordering keeps reports and exports deterministic.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn list_skills(&self, subject: Subject) -> Result<Vec<Skill>, StorageError>;

    /// If the subject has no skills, seed its default starter skill, then
    /// return the (now non-empty) skill list. Never double-seeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn seed_defaults_if_empty(&self, subject: Subject) -> Result<Vec<Skill>, StorageError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the progress row for a `(learner, skill)` pair, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn get_progress(
        &self,
        learner_id: LearnerId,
        skill_id: SkillId,
    ) -> Result<Option<Progress>, StorageError>;

    /// All progress rows for a learner.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn progress_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<Progress>, StorageError>;

    /// Count of the learner's progress rows at `Practicing`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn practicing_count(&self, learner_id: LearnerId) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Append one event to the log. Events are immutable once written.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the event cannot be stored.
    async fn append_event(
        &self,
        learner_id: LearnerId,
        skill_id: SkillId,
        kind: EventKind,
        data: &str,
        at: DateTime<Utc>,
    ) -> Result<i64, StorageError>;

    /// Answered/correct totals for a learner, from `answer` events.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn answer_counts(&self, learner_id: LearnerId) -> Result<AnswerCounts, StorageError>;
}

#[async_trait]
pub trait BadgeRepository: Send + Sync {
    /// Insert the badge catalog if it is not present. Idempotent across
    /// restarts.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn ensure_badges_seed(&self) -> Result<(), StorageError>;

    /// Award a badge unless the learner already holds it.
    ///
    /// Returns `true` only when the badge was newly granted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn award_if_absent(
        &self,
        learner_id: LearnerId,
        code: BadgeCode,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// All badges the learner has earned, joined with their definitions, in
    /// catalog order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn badges_for(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<(LearnerBadge, Badge)>, StorageError>;
}

/// The single-transaction unit for one judged answer.
///
/// Upserts the progress row, appends the `answer` event, evaluates badge rules
/// against in-transaction counts, and awards newly qualified badges. A failure
/// anywhere rolls back all of it, leaving no partial progress/event/badge
/// state.
#[async_trait]
pub trait AnswerPersistence: Send + Sync {
    /// Apply one answer. `progress` is the already-transitioned row to store.
    ///
    /// Returns the badge codes newly granted by this answer (possibly empty).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any write fails; nothing is persisted then.
    async fn record_answer(
        &self,
        progress: &Progress,
        payload: &AnswerPayload,
        at: DateTime<Utc>,
    ) -> Result<Vec<BadgeCode>, StorageError>;
}

//
// ─── IN-MEMORY IMPLEMENTATION ──────────────────────────────────────────────────
//

#[derive(Default)]
struct InMemoryState {
    learners: HashMap<LearnerId, Learner>,
    next_learner_id: u64,
    skills: HashMap<SkillId, Skill>,
    next_skill_id: u64,
    progress: HashMap<(LearnerId, SkillId), Progress>,
    events: Vec<Event>,
    next_event_id: i64,
    badges_seeded: bool,
    learner_badges: HashMap<(LearnerId, BadgeCode), LearnerBadge>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn insert_skill_locked(
    state: &mut InMemoryState,
    subject: Subject,
    topic: &str,
    subtopic: &str,
) -> Result<Skill, StorageError> {
    let duplicate = state.skills.values().any(|s| {
        s.subject() == subject && s.topic() == topic.trim() && s.subtopic() == subtopic.trim()
    });
    if duplicate {
        return Err(StorageError::DuplicateSkill);
    }

    state.next_skill_id += 1;
    let skill = Skill::new(SkillId::new(state.next_skill_id), subject, topic, subtopic)
        .map_err(ser)?;
    state.skills.insert(skill.id(), skill.clone());
    Ok(skill)
}

fn list_skills_locked(state: &InMemoryState, subject: Subject) -> Vec<Skill> {
    let mut skills: Vec<Skill> = state
        .skills
        .values()
        .filter(|s| s.subject() == subject)
        .cloned()
        .collect();
    skills.sort_by(|a, b| {
        a.topic()
            .cmp(b.topic())
            .then_with(|| a.subtopic().cmp(b.subtopic()))
    });
    skills
}

fn answer_counts_locked(
    state: &InMemoryState,
    learner_id: LearnerId,
) -> Result<AnswerCounts, StorageError> {
    let mut counts = AnswerCounts::default();
    for event in &state.events {
        if event.learner_id != learner_id || event.kind != EventKind::Answer {
            continue;
        }
        counts.answered += 1;
        let payload: AnswerPayload = serde_json::from_str(&event.data).map_err(ser)?;
        if payload.correct {
            counts.correct += 1;
        }
    }
    Ok(counts)
}

fn practicing_count_locked(state: &InMemoryState, learner_id: LearnerId) -> u64 {
    state
        .progress
        .values()
        .filter(|p| p.learner_id == learner_id && p.status == SkillStatus::Practicing)
        .count() as u64
}

fn append_event_locked(
    state: &mut InMemoryState,
    learner_id: LearnerId,
    skill_id: SkillId,
    kind: EventKind,
    data: &str,
    at: DateTime<Utc>,
) -> i64 {
    state.next_event_id += 1;
    let id = state.next_event_id;
    state.events.push(Event {
        id,
        learner_id,
        skill_id,
        kind,
        data: data.to_owned(),
        created_at: at,
    });
    id
}

#[async_trait]
impl LearnerRepository for InMemoryRepository {
    async fn ensure_learner(
        &self,
        name: &str,
        lang: &str,
        now: DateTime<Utc>,
    ) -> Result<Learner, StorageError> {
        let mut state = self.lock()?;
        if let Some(existing) = state
            .learners
            .values()
            .find(|l| l.name() == name.trim() && l.lang() == lang.trim())
        {
            return Ok(existing.clone());
        }

        state.next_learner_id += 1;
        let learner =
            Learner::new(LearnerId::new(state.next_learner_id), name, lang, now).map_err(ser)?;
        state.learners.insert(learner.id(), learner.clone());
        Ok(learner)
    }

    async fn get_learner(&self, id: LearnerId) -> Result<Learner, StorageError> {
        let state = self.lock()?;
        state.learners.get(&id).cloned().ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl SkillRepository for InMemoryRepository {
    async fn insert_skill(
        &self,
        subject: Subject,
        topic: &str,
        subtopic: &str,
    ) -> Result<Skill, StorageError> {
        let mut state = self.lock()?;
        insert_skill_locked(&mut state, subject, topic, subtopic)
    }

    async fn skill_exists(
        &self,
        subject: Subject,
        topic: &str,
        subtopic: &str,
    ) -> Result<bool, StorageError> {
        let state = self.lock()?;
        Ok(state.skills.values().any(|s| {
            s.subject() == subject && s.topic() == topic.trim() && s.subtopic() == subtopic.trim()
        }))
    }

    async fn delete_skill(&self, id: SkillId) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if state.skills.remove(&id).is_none() {
            return Err(StorageError::NotFound);
        }
        // Cascade, matching the SQLite schema's ON DELETE CASCADE.
        state.progress.retain(|(_, skill_id), _| *skill_id != id);
        state.events.retain(|e| e.skill_id != id);
        Ok(())
    }

    async fn list_skills(&self, subject: Subject) -> Result<Vec<Skill>, StorageError> {
        let state = self.lock()?;
        Ok(list_skills_locked(&state, subject))
    }

    async fn seed_defaults_if_empty(&self, subject: Subject) -> Result<Vec<Skill>, StorageError> {
        let mut state = self.lock()?;
        if list_skills_locked(&state, subject).is_empty() {
            let (topic, subtopic) = default_skill_for(subject);
            insert_skill_locked(&mut state, subject, topic, subtopic)?;
        }
        Ok(list_skills_locked(&state, subject))
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        learner_id: LearnerId,
        skill_id: SkillId,
    ) -> Result<Option<Progress>, StorageError> {
        let state = self.lock()?;
        Ok(state.progress.get(&(learner_id, skill_id)).cloned())
    }

    async fn progress_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<Progress>, StorageError> {
        let state = self.lock()?;
        let mut rows: Vec<Progress> = state
            .progress
            .values()
            .filter(|p| p.learner_id == learner_id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.skill_id);
        Ok(rows)
    }

    async fn practicing_count(&self, learner_id: LearnerId) -> Result<u64, StorageError> {
        let state = self.lock()?;
        Ok(practicing_count_locked(&state, learner_id))
    }
}

#[async_trait]
impl EventRepository for InMemoryRepository {
    async fn append_event(
        &self,
        learner_id: LearnerId,
        skill_id: SkillId,
        kind: EventKind,
        data: &str,
        at: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let mut state = self.lock()?;
        Ok(append_event_locked(&mut state, learner_id, skill_id, kind, data, at))
    }

    async fn answer_counts(&self, learner_id: LearnerId) -> Result<AnswerCounts, StorageError> {
        let state = self.lock()?;
        answer_counts_locked(&state, learner_id)
    }
}

#[async_trait]
impl BadgeRepository for InMemoryRepository {
    async fn ensure_badges_seed(&self) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.badges_seeded = true;
        Ok(())
    }

    async fn award_if_absent(
        &self,
        learner_id: LearnerId,
        code: BadgeCode,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut state = self.lock()?;
        let key = (learner_id, code);
        if state.learner_badges.contains_key(&key) {
            return Ok(false);
        }
        state.learner_badges.insert(
            key,
            LearnerBadge {
                learner_id,
                code,
                earned_at: at,
            },
        );
        Ok(true)
    }

    async fn badges_for(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<(LearnerBadge, Badge)>, StorageError> {
        let state = self.lock()?;
        let mut earned = Vec::new();
        for code in BadgeCode::ALL {
            if let Some(badge) = state.learner_badges.get(&(learner_id, code)) {
                earned.push((badge.clone(), Badge::definition(code)));
            }
        }
        Ok(earned)
    }
}

#[async_trait]
impl AnswerPersistence for InMemoryRepository {
    async fn record_answer(
        &self,
        progress: &Progress,
        payload: &AnswerPayload,
        at: DateTime<Utc>,
    ) -> Result<Vec<BadgeCode>, StorageError> {
        let data = serde_json::to_string(payload).map_err(ser)?;

        let mut state = self.lock()?;
        state
            .progress
            .insert((progress.learner_id, progress.skill_id), progress.clone());
        append_event_locked(
            &mut state,
            progress.learner_id,
            progress.skill_id,
            EventKind::Answer,
            &data,
            at,
        );

        let snapshot = MasterySnapshot {
            answered_total: answer_counts_locked(&state, progress.learner_id)?.answered,
            streak_correct: progress.streak_correct,
            practicing_count: practicing_count_locked(&state, progress.learner_id),
        };

        let mut newly_earned = Vec::new();
        for code in qualified(snapshot) {
            let key = (progress.learner_id, code);
            if !state.learner_badges.contains_key(&key) {
                state.learner_badges.insert(
                    key,
                    LearnerBadge {
                        learner_id: progress.learner_id,
                        code,
                        earned_at: at,
                    },
                );
                newly_earned.push(code);
            }
        }
        Ok(newly_earned)
    }
}

//
// ─── STORAGE AGGREGATE ─────────────────────────────────────────────────────────
//

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub learners: Arc<dyn LearnerRepository>,
    pub skills: Arc<dyn SkillRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub events: Arc<dyn EventRepository>,
    pub badges: Arc<dyn BadgeRepository>,
    pub answers: Arc<dyn AnswerPersistence>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            learners: Arc::new(repo.clone()),
            skills: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            events: Arc::new(repo.clone()),
            badges: Arc::new(repo.clone()),
            answers: Arc::new(repo),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::time::fixed_now;

    #[tokio::test]
    async fn ensure_learner_is_idempotent() {
        let repo = InMemoryRepository::new();
        let first = repo
            .ensure_learner("Ava", "English", fixed_now())
            .await
            .unwrap();
        let second = repo
            .ensure_learner("Ava", "English", fixed_now())
            .await
            .unwrap();
        assert_eq!(first.id(), second.id());

        let other = repo
            .ensure_learner("Ava", "Spanish", fixed_now())
            .await
            .unwrap();
        assert_ne!(first.id(), other.id());
    }

    #[tokio::test]
    async fn duplicate_skill_is_rejected() {
        let repo = InMemoryRepository::new();
        repo.insert_skill(Subject::Math, "Arithmetic", "Counting")
            .await
            .unwrap();
        let err = repo
            .insert_skill(Subject::Math, "Arithmetic", "Counting")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateSkill));
    }

    #[tokio::test]
    async fn list_skills_orders_by_topic_then_subtopic() {
        let repo = InMemoryRepository::new();
        repo.insert_skill(Subject::Math, "Geometry", "Shapes")
            .await
            .unwrap();
        repo.insert_skill(Subject::Math, "Arithmetic", "Subtraction")
            .await
            .unwrap();
        repo.insert_skill(Subject::Math, "Arithmetic", "Addition")
            .await
            .unwrap();

        let skills = repo.list_skills(Subject::Math).await.unwrap();
        let pairs: Vec<(&str, &str)> = skills
            .iter()
            .map(|s| (s.topic(), s.subtopic()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("Arithmetic", "Addition"),
                ("Arithmetic", "Subtraction"),
                ("Geometry", "Shapes"),
            ]
        );
    }

    #[tokio::test]
    async fn seeding_never_double_seeds() {
        let repo = InMemoryRepository::new();
        let first = repo.seed_defaults_if_empty(Subject::Science).await.unwrap();
        assert_eq!(first.len(), 1);
        let second = repo.seed_defaults_if_empty(Subject::Science).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn delete_skill_cascades_to_progress_and_events() {
        let repo = InMemoryRepository::new();
        let skill = repo
            .insert_skill(Subject::Math, "Arithmetic", "Counting")
            .await
            .unwrap();
        let learner = LearnerId::new(1);

        let progress = Progress::fresh(learner, skill.id(), fixed_now());
        repo.record_answer(&progress, &AnswerPayload::graded(true), fixed_now())
            .await
            .unwrap();

        assert_eq!(repo.progress_for_learner(learner).await.unwrap().len(), 1);

        repo.delete_skill(skill.id()).await.unwrap();
        assert!(repo.get_progress(learner, skill.id()).await.unwrap().is_none());
        assert!(repo.progress_for_learner(learner).await.unwrap().is_empty());
        assert_eq!(repo.answer_counts(learner).await.unwrap().answered, 0);
    }

    #[tokio::test]
    async fn record_answer_counts_and_awards() {
        let repo = InMemoryRepository::new();
        let learner = LearnerId::new(1);
        let skill = SkillId::new(9);

        let mut progress = Progress::fresh(learner, skill, fixed_now());
        progress.streak_correct = 3;
        progress.status = SkillStatus::Practicing;

        let earned = repo
            .record_answer(&progress, &AnswerPayload::graded(true), fixed_now())
            .await
            .unwrap();
        assert_eq!(earned, vec![BadgeCode::Streak3, BadgeCode::Master1]);

        // Re-recording with the rules still satisfied grants nothing new.
        let earned = repo
            .record_answer(&progress, &AnswerPayload::graded(true), fixed_now())
            .await
            .unwrap();
        assert!(earned.is_empty());

        let counts = repo.answer_counts(learner).await.unwrap();
        assert_eq!(counts.answered, 2);
        assert_eq!(counts.correct, 2);
    }
}
