//! In-memory lesson session state.
//!
//! Nothing here touches storage. The session tracks which phase the learner
//! is in (diagnostic placement, then the lesson proper) plus the quick-fire
//! game scoreboard; persistence of answers and badges stays with the engine.

use chrono::{DateTime, Duration, Utc};

use tutor_core::model::{LearnerId, Subject};

/// Number of placement questions asked before a level is assigned.
pub const DIAGNOSTIC_QUESTIONS: u32 = 3;

//
// ─── LEVEL ─────────────────────────────────────────────────────────────────────
//

/// Difficulty level assigned by the diagnostic and carried through prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Beginner => "Beginner",
            Level::Intermediate => "Intermediate",
            Level::Advanced => "Advanced",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── DIAGNOSTIC ────────────────────────────────────────────────────────────────
//

/// Running tally of the placement diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiagnosticState {
    asked: u32,
    score: u32,
}

impl DiagnosticState {
    /// Records one judged diagnostic answer.
    pub fn record(&mut self, correct: bool) {
        self.asked += 1;
        if correct {
            self.score += 1;
        }
    }

    #[must_use]
    pub fn asked(&self) -> u32 {
        self.asked
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.asked >= DIAGNOSTIC_QUESTIONS
    }

    /// The level this score places the learner at. Meaningful once
    /// [`is_complete`](Self::is_complete) is true.
    #[must_use]
    pub fn placement(&self) -> Level {
        match self.score {
            0 | 1 => Level::Beginner,
            2 => Level::Intermediate,
            _ => Level::Advanced,
        }
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Where the learner currently is in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Diagnostic(DiagnosticState),
    Lesson,
}

/// One learner's tutoring session: who, what subject, at what level, and
/// which phase they are in.
#[derive(Debug, Clone)]
pub struct LessonSession {
    learner_id: LearnerId,
    subject: Subject,
    lang: String,
    level: Level,
    phase: Phase,
}

impl LessonSession {
    /// Starts a fresh session at the diagnostic phase with the default level.
    #[must_use]
    pub fn new(learner_id: LearnerId, subject: Subject, lang: impl Into<String>) -> Self {
        Self {
            learner_id,
            subject,
            lang: lang.into(),
            level: Level::default(),
            phase: Phase::Diagnostic(DiagnosticState::default()),
        }
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn subject(&self) -> Subject {
        self.subject
    }

    #[must_use]
    pub fn lang(&self) -> &str {
        &self.lang
    }

    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Skips the diagnostic, pinning the session at the given level.
    pub fn place_at(&mut self, level: Level) {
        self.level = level;
        self.phase = Phase::Lesson;
    }

    /// Records one diagnostic answer. When this was the final diagnostic
    /// question, assigns the placement level, moves to the lesson phase, and
    /// returns the level.
    ///
    /// Has no effect outside the diagnostic phase.
    pub fn record_diagnostic(&mut self, correct: bool) -> Option<Level> {
        let Phase::Diagnostic(mut state) = self.phase else {
            return None;
        };
        state.record(correct);
        if state.is_complete() {
            self.level = state.placement();
            self.phase = Phase::Lesson;
            return Some(self.level);
        }
        self.phase = Phase::Diagnostic(state);
        None
    }
}

//
// ─── GAME ──────────────────────────────────────────────────────────────────────
//

/// Quick-fire game scoreboard: score and XP against a countdown.
///
/// XP never goes below zero; a wrong answer late in a bad run cannot push
/// the learner into debt.
#[derive(Debug, Clone)]
pub struct GameState {
    score: u32,
    xp: u32,
    started_at: DateTime<Utc>,
    duration: Duration,
}

impl GameState {
    #[must_use]
    pub fn new(started_at: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            score: 0,
            xp: 0,
            started_at,
            duration,
        }
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn xp(&self) -> u32 {
        self.xp
    }

    /// Applies one judged quiz answer: +1 score and +10 XP when correct,
    /// -3 XP (floored at zero) when wrong.
    pub fn apply(&mut self, correct: bool) {
        if correct {
            self.score += 1;
            self.xp += 10;
        } else {
            self.xp = self.xp.saturating_sub(3);
        }
    }

    /// Time left on the clock at `now`, zero once expired.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        let deadline = self.started_at + self.duration;
        (deadline - now).max(Duration::zero())
    }

    #[must_use]
    pub fn is_over(&self, now: DateTime<Utc>) -> bool {
        self.remaining(now) == Duration::zero()
    }
}
