pub mod course;
mod ids;
pub mod progress;
pub mod quiz;

pub use course::{ContentKind, Course, CourseError, Module, Section, CHECKPOINT_INTERVAL};
pub use ids::{CourseId, ModuleId, QuestionId, QuizId, SectionId};
pub use progress::{completion_percent, CompletedSections, ProgressRecord, QuizResult};
pub use quiz::{Quiz, QuizAnswers, QuizError, QuizQuestion, QuizScore, PASSING_SCORE};
