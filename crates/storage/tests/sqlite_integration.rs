use tutor_core::mastery;
use tutor_core::model::{AnswerPayload, BadgeCode, Progress, SkillStatus, Subject};
use tutor_core::time::fixed_now;
use storage::repository::{
    AnswerPersistence, BadgeRepository, EventRepository, LearnerRepository, ProgressRepository,
    SkillRepository, StorageError,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo.ensure_badges_seed().await.expect("seed badges");
    repo
}

#[tokio::test]
async fn sqlite_roundtrips_learners_and_skills() {
    let repo = connect("memdb_roundtrip").await;

    let learner = repo
        .ensure_learner("Ava", "English", fixed_now())
        .await
        .unwrap();
    let again = repo
        .ensure_learner("Ava", "English", fixed_now())
        .await
        .unwrap();
    assert_eq!(learner.id(), again.id());

    let fetched = repo.get_learner(learner.id()).await.unwrap();
    assert_eq!(fetched.name(), "Ava");
    assert_eq!(fetched.lang(), "English");

    let skill = repo
        .insert_skill(Subject::Math, "Arithmetic", "Counting")
        .await
        .unwrap();
    assert!(repo
        .skill_exists(Subject::Math, "Arithmetic", "Counting")
        .await
        .unwrap());

    let err = repo
        .insert_skill(Subject::Math, "Arithmetic", "Counting")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::DuplicateSkill));

    let skills = repo.list_skills(Subject::Math).await.unwrap();
    assert_eq!(skills, vec![skill]);
}

#[tokio::test]
async fn sqlite_orders_skills_by_topic_then_subtopic() {
    let repo = connect("memdb_ordering").await;

    repo.insert_skill(Subject::Literacy, "Writing", "Sentences")
        .await
        .unwrap();
    repo.insert_skill(Subject::Literacy, "Reading", "Sight words")
        .await
        .unwrap();
    repo.insert_skill(Subject::Literacy, "Reading", "Phonics")
        .await
        .unwrap();

    let skills = repo.list_skills(Subject::Literacy).await.unwrap();
    let pairs: Vec<(&str, &str)> = skills.iter().map(|s| (s.topic(), s.subtopic())).collect();
    assert_eq!(
        pairs,
        vec![
            ("Reading", "Phonics"),
            ("Reading", "Sight words"),
            ("Writing", "Sentences"),
        ]
    );
}

#[tokio::test]
async fn sqlite_seeds_defaults_exactly_once() {
    let repo = connect("memdb_seed").await;

    let first = repo.seed_defaults_if_empty(Subject::Science).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].topic(), "Nature");

    let second = repo.seed_defaults_if_empty(Subject::Science).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn sqlite_record_answer_is_one_atomic_unit() {
    let repo = connect("memdb_answer").await;

    let learner = repo
        .ensure_learner("Ava", "English", fixed_now())
        .await
        .unwrap();
    let skill = repo
        .insert_skill(Subject::Math, "Arithmetic", "Counting")
        .await
        .unwrap();

    // Three correct answers in a row: Practicing on the third, with both the
    // streak and mastery badges granted at that point.
    let mut status = SkillStatus::Learning;
    let mut streak = 0;
    let mut last_earned = Vec::new();
    for _ in 0..3 {
        (status, streak) = mastery::apply_answer(status, streak, true);
        let progress = Progress {
            learner_id: learner.id(),
            skill_id: skill.id(),
            status,
            streak_correct: streak,
            last_seen: fixed_now(),
        };
        last_earned = repo
            .record_answer(&progress, &AnswerPayload::graded(true), fixed_now())
            .await
            .unwrap();
    }

    assert_eq!(last_earned, vec![BadgeCode::Streak3, BadgeCode::Master1]);

    let stored = repo
        .get_progress(learner.id(), skill.id())
        .await
        .unwrap()
        .expect("progress row");
    assert_eq!(stored.status, SkillStatus::Practicing);
    assert_eq!(stored.streak_correct, 3);

    let counts = repo.answer_counts(learner.id()).await.unwrap();
    assert_eq!(counts.answered, 3);
    assert_eq!(counts.correct, 3);
    assert_eq!(repo.practicing_count(learner.id()).await.unwrap(), 1);

    let rows = repo.progress_for_learner(learner.id()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].skill_id, skill.id());

    // A miss resets the streak but the status stays Practicing, and no badge
    // is granted twice.
    (status, streak) = mastery::apply_answer(status, streak, false);
    let progress = Progress {
        learner_id: learner.id(),
        skill_id: skill.id(),
        status,
        streak_correct: streak,
        last_seen: fixed_now(),
    };
    let earned = repo
        .record_answer(&progress, &AnswerPayload::graded(false), fixed_now())
        .await
        .unwrap();
    assert!(earned.is_empty());

    let stored = repo
        .get_progress(learner.id(), skill.id())
        .await
        .unwrap()
        .expect("progress row");
    assert_eq!(stored.status, SkillStatus::Practicing);
    assert_eq!(stored.streak_correct, 0);

    let counts = repo.answer_counts(learner.id()).await.unwrap();
    assert_eq!(counts.answered, 4);
    assert_eq!(counts.correct, 3);
}

#[tokio::test]
async fn sqlite_badge_seed_and_award_are_idempotent() {
    let repo = connect("memdb_badges").await;
    repo.ensure_badges_seed().await.unwrap();

    let learner = repo
        .ensure_learner("Ben", "English", fixed_now())
        .await
        .unwrap();

    assert!(repo
        .award_if_absent(learner.id(), BadgeCode::First5, fixed_now())
        .await
        .unwrap());
    assert!(!repo
        .award_if_absent(learner.id(), BadgeCode::First5, fixed_now())
        .await
        .unwrap());

    let badges = repo.badges_for(learner.id()).await.unwrap();
    assert_eq!(badges.len(), 1);
    assert_eq!(badges[0].0.code, BadgeCode::First5);
    assert_eq!(badges[0].1.name, "Getting Started");
}

#[tokio::test]
async fn sqlite_delete_skill_cascades() {
    let repo = connect("memdb_cascade").await;

    let learner = repo
        .ensure_learner("Ava", "English", fixed_now())
        .await
        .unwrap();
    let skill = repo
        .insert_skill(Subject::Math, "Arithmetic", "Counting")
        .await
        .unwrap();

    let progress = Progress::fresh(learner.id(), skill.id(), fixed_now());
    repo.record_answer(&progress, &AnswerPayload::graded(true), fixed_now())
        .await
        .unwrap();

    repo.delete_skill(skill.id()).await.unwrap();

    assert!(repo
        .get_progress(learner.id(), skill.id())
        .await
        .unwrap()
        .is_none());
    assert_eq!(repo.answer_counts(learner.id()).await.unwrap().answered, 0);

    let err = repo.delete_skill(skill.id()).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}
