mod badge;
mod event;
mod ids;
mod learner;
mod progress;
mod skill;

pub use ids::{LearnerId, ParseIdError, SkillId};

pub use badge::{Badge, BadgeCode, BadgeError, LearnerBadge, MasterySnapshot, qualified};
pub use event::{AnswerPayload, Event, EventError, EventKind, ReportPayload};
pub use learner::{Learner, LearnerError};
pub use progress::{Progress, ProgressError, SkillStatus};
pub use skill::{Skill, SkillError, Subject, default_skill_for};
