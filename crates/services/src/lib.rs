#![forbid(unsafe_code)]

pub mod curriculum;
pub mod engine;
pub mod error;
pub mod oracle;
pub mod safety;
pub mod session;

pub use tutor_core::Clock;

pub use curriculum::{CurriculumPack, PackSkill, export_pack, import_pack, load_pack};
pub use engine::{AdaptiveEngine, LearnerStats};
pub use error::{CurriculumError, EngineError, OracleError};
pub use oracle::{JudgeVerdict, OllamaOracle, Oracle, OracleConfig, VerdictParse};
pub use safety::{SafetyRejection, check_user_input};
pub use session::{DiagnosticState, GameState, LessonSession, Level, Phase};
