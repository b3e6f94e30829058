use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;

use storage::repository::{
    AnswerPersistence, BadgeRepository, EventRepository, ProgressRepository, SkillRepository,
    Storage,
};
use tutor_core::{
    Clock, mastery,
    model::{
        AnswerPayload, Badge, BadgeCode, EventKind, LearnerBadge, LearnerId, Progress,
        ReportPayload, Skill, SkillId, Subject,
    },
};

use crate::error::EngineError;

//
// ─── LEARNER STATS ─────────────────────────────────────────────────────────────
//

/// Learner-facing aggregate statistics.
///
/// Answered/correct come from the event log; the mastered count from progress
/// rows at Practicing. Computed fresh on every call, no caching, so the
/// numbers always reflect every prior `update_progress`.
#[derive(Debug, Clone)]
pub struct LearnerStats {
    pub answered: u64,
    pub correct: u64,
    pub mastered_count: u64,
    pub badges: Vec<(LearnerBadge, Badge)>,
}

impl LearnerStats {
    /// Fraction of answered questions judged correct, if any were answered.
    #[must_use]
    pub fn accuracy(&self) -> Option<f64> {
        if self.answered == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        Some(self.correct as f64 / self.answered as f64)
    }
}

//
// ─── ADAPTIVE ENGINE ───────────────────────────────────────────────────────────
//

/// Orchestrates skill selection, progress updates, badge awards, and stats.
///
/// All writes for one answer go through a single storage transaction
/// (`AnswerPersistence::record_answer`), so a failure never leaves a partial
/// progress/event/badge state behind.
pub struct AdaptiveEngine {
    clock: Clock,
    skills: Arc<dyn SkillRepository>,
    progress: Arc<dyn ProgressRepository>,
    events: Arc<dyn EventRepository>,
    badges: Arc<dyn BadgeRepository>,
    answers: Arc<dyn AnswerPersistence>,
}

impl AdaptiveEngine {
    #[must_use]
    pub fn new(storage: &Storage) -> Self {
        Self {
            clock: Clock::default_clock(),
            skills: Arc::clone(&storage.skills),
            progress: Arc::clone(&storage.progress),
            events: Arc::clone(&storage.events),
            badges: Arc::clone(&storage.badges),
            answers: Arc::clone(&storage.answers),
        }
    }

    /// Override the clock (usually for deterministic testing).
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Current time according to the engine's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Picks the next skill to practice: a uniform random draw over the
    /// subject's skills, seeding the default catalog first if the subject is
    /// empty.
    ///
    /// Selection deliberately ignores the learner and their mastery state:
    /// no weighting toward weak skills, no exclusion of practiced ones. The
    /// learner id is accepted only to keep the call shaped like the rest of
    /// the engine API.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NoSkills` if the subject still has no skills
    /// after seeding, or storage errors.
    pub async fn pick_next_skill(
        &self,
        _learner_id: LearnerId,
        subject: Subject,
    ) -> Result<Skill, EngineError> {
        let skills = self.skills.seed_defaults_if_empty(subject).await?;
        skills
            .choose(&mut rand::rng())
            .cloned()
            .ok_or_else(|| EngineError::NoSkills(subject.as_str().to_string()))
    }

    /// Applies one judged answer. The streak/status transition, answer event,
    /// and badge evaluation all land in one storage transaction.
    ///
    /// Returns the badge codes newly earned by this answer (possibly empty);
    /// a badge already held is never returned again.
    ///
    /// # Errors
    ///
    /// Returns storage errors; nothing is persisted then.
    pub async fn update_progress(
        &self,
        learner_id: LearnerId,
        skill: &Skill,
        correct: bool,
    ) -> Result<Vec<BadgeCode>, EngineError> {
        self.update_progress_with_context(learner_id, skill, correct, None, None)
            .await
    }

    /// Like [`update_progress`](Self::update_progress), also capturing the
    /// question and feedback in the answer event for later inspection.
    ///
    /// # Errors
    ///
    /// Returns storage errors; nothing is persisted then.
    pub async fn update_progress_with_context(
        &self,
        learner_id: LearnerId,
        skill: &Skill,
        correct: bool,
        question: Option<String>,
        feedback: Option<String>,
    ) -> Result<Vec<BadgeCode>, EngineError> {
        let now = self.now();
        let current = self
            .progress
            .get_progress(learner_id, skill.id())
            .await?
            .unwrap_or_else(|| Progress::fresh(learner_id, skill.id(), now));

        let (status, streak_correct) =
            mastery::apply_answer(current.status, current.streak_correct, correct);

        let updated = Progress {
            learner_id,
            skill_id: skill.id(),
            status,
            streak_correct,
            last_seen: now,
        };

        let payload = AnswerPayload {
            correct,
            question,
            feedback,
        };

        let earned = self.answers.record_answer(&updated, &payload, now).await?;
        Ok(earned)
    }

    /// Appends a `report` content-flag event for a skill.
    ///
    /// # Errors
    ///
    /// Returns storage errors.
    pub async fn record_report(
        &self,
        learner_id: LearnerId,
        skill_id: SkillId,
        reason: &str,
    ) -> Result<(), EngineError> {
        let payload = ReportPayload {
            reason: reason.to_string(),
        };
        let data = serde_json::to_string(&payload)
            .map_err(|e| storage::repository::StorageError::Serialization(e.to_string()))?;
        self.events
            .append_event(learner_id, skill_id, EventKind::Report, &data, self.now())
            .await?;
        Ok(())
    }

    /// Computes the learner's statistics. Pure read, no caching.
    ///
    /// # Errors
    ///
    /// Returns storage errors.
    pub async fn learner_stats(&self, learner_id: LearnerId) -> Result<LearnerStats, EngineError> {
        let counts = self.events.answer_counts(learner_id).await?;
        let mastered_count = self.progress.practicing_count(learner_id).await?;
        let badges = self.badges.badges_for(learner_id).await?;

        Ok(LearnerStats {
            answered: counts.answered,
            correct: counts.correct,
            mastered_count,
            badges,
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use storage::repository::LearnerRepository;
    use tutor_core::model::SkillStatus;
    use tutor_core::time::fixed_clock;

    async fn engine_with_storage() -> (AdaptiveEngine, Storage) {
        let storage = Storage::in_memory();
        storage.badges.ensure_badges_seed().await.unwrap();
        let engine = AdaptiveEngine::new(&storage).with_clock(fixed_clock());
        (engine, storage)
    }

    #[tokio::test]
    async fn pick_next_skill_seeds_empty_subject() {
        let (engine, storage) = engine_with_storage().await;
        let learner = LearnerId::new(1);

        let skill = engine
            .pick_next_skill(learner, Subject::Math)
            .await
            .unwrap();
        assert_eq!(skill.subject(), Subject::Math);

        // Seeding happened exactly once.
        let skills = storage.skills.list_skills(Subject::Math).await.unwrap();
        assert_eq!(skills.len(), 1);
    }

    #[tokio::test]
    async fn pick_next_skill_is_roughly_uniform() {
        let (engine, storage) = engine_with_storage().await;
        let learner = LearnerId::new(1);

        for i in 0..4 {
            storage
                .skills
                .insert_skill(Subject::Math, "Arithmetic", &format!("Skill {i}"))
                .await
                .unwrap();
        }

        // Mark one skill as Practicing: selection must not care.
        let skills = storage.skills.list_skills(Subject::Math).await.unwrap();
        for _ in 0..3 {
            engine
                .update_progress(learner, &skills[0], true)
                .await
                .unwrap();
        }

        let mut draws: HashMap<u64, u32> = HashMap::new();
        for _ in 0..2000 {
            let skill = engine
                .pick_next_skill(learner, Subject::Math)
                .await
                .unwrap();
            *draws.entry(skill.id().value()).or_default() += 1;
        }

        assert_eq!(draws.len(), 4);
        // Expected 500 each; a generous band still catches a skewed picker.
        for (_, count) in draws {
            assert!((300..=700).contains(&count), "draw count {count} out of band");
        }
    }

    #[tokio::test]
    async fn ava_masters_a_skill_and_keeps_it_after_a_miss() {
        let (engine, storage) = engine_with_storage().await;
        let ava = storage
            .learners
            .ensure_learner("Ava", "English", engine.now())
            .await
            .unwrap();
        let skill = storage
            .skills
            .insert_skill(Subject::Math, "Arithmetic", "Counting")
            .await
            .unwrap();

        let first = engine.update_progress(ava.id(), &skill, true).await.unwrap();
        assert!(first.is_empty());
        let second = engine.update_progress(ava.id(), &skill, true).await.unwrap();
        assert!(second.is_empty());

        let third = engine.update_progress(ava.id(), &skill, true).await.unwrap();
        assert_eq!(third, vec![BadgeCode::Streak3, BadgeCode::Master1]);

        let progress = storage
            .progress
            .get_progress(ava.id(), skill.id())
            .await
            .unwrap()
            .expect("progress row");
        assert_eq!(progress.status, SkillStatus::Practicing);
        assert_eq!(progress.streak_correct, 3);

        // A 4th, incorrect answer: streak resets, status stays Practicing.
        let fourth = engine.update_progress(ava.id(), &skill, false).await.unwrap();
        assert!(fourth.is_empty());

        let progress = storage
            .progress
            .get_progress(ava.id(), skill.id())
            .await
            .unwrap()
            .expect("progress row");
        assert_eq!(progress.status, SkillStatus::Practicing);
        assert_eq!(progress.streak_correct, 0);
    }

    #[tokio::test]
    async fn first_5_fires_exactly_on_the_fifth_answer() {
        let (engine, storage) = engine_with_storage().await;
        let learner = LearnerId::new(7);
        let skill = storage
            .skills
            .insert_skill(Subject::Science, "Nature", "Seasons")
            .await
            .unwrap();

        // Alternate wrong/right so no streak badge interferes.
        for i in 0..4 {
            let earned = engine
                .update_progress(learner, &skill, i % 2 == 0)
                .await
                .unwrap();
            assert!(
                !earned.contains(&BadgeCode::First5),
                "FIRST_5 fired early on answer {}",
                i + 1
            );
        }

        let fifth = engine.update_progress(learner, &skill, false).await.unwrap();
        assert!(fifth.contains(&BadgeCode::First5));

        let sixth = engine.update_progress(learner, &skill, false).await.unwrap();
        assert!(!sixth.contains(&BadgeCode::First5));
    }

    #[tokio::test]
    async fn stats_reflect_every_update() {
        let (engine, storage) = engine_with_storage().await;
        let learner = LearnerId::new(2);
        let skill = storage
            .skills
            .insert_skill(Subject::Literacy, "Reading", "Phonics")
            .await
            .unwrap();

        let outcomes = [true, false, true, true, false];
        for correct in outcomes {
            engine.update_progress(learner, &skill, correct).await.unwrap();
        }

        let stats = engine.learner_stats(learner).await.unwrap();
        assert_eq!(stats.answered, 5);
        assert_eq!(stats.correct, 3);
        assert_eq!(stats.mastered_count, 0);
        let accuracy = stats.accuracy().unwrap();
        assert!((accuracy - 0.6).abs() < f64::EPSILON);

        // FIRST_5 was earned on the fifth answer above.
        assert_eq!(stats.badges.len(), 1);
        assert_eq!(stats.badges[0].0.code, BadgeCode::First5);
    }

    #[tokio::test]
    async fn reports_do_not_count_as_answers() {
        let (engine, storage) = engine_with_storage().await;
        let learner = LearnerId::new(3);
        let skill = storage
            .skills
            .insert_skill(Subject::Math, "Arithmetic", "Counting")
            .await
            .unwrap();

        engine.update_progress(learner, &skill, true).await.unwrap();
        engine
            .record_report(learner, skill.id(), "confusing wording")
            .await
            .unwrap();

        let stats = engine.learner_stats(learner).await.unwrap();
        assert_eq!(stats.answered, 1);
        assert_eq!(stats.correct, 1);
    }
}
