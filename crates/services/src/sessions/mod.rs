mod autosave;
mod progress;
mod service;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use autosave::{NoteAutosave, PendingSave, SaveStatus, AUTOSAVE_QUIET_MS, SAVED_STATUS_HOLD_MS};
pub use progress::CourseProgress;
pub use service::{ActiveTab, LearningSession, QuizPrompt};
pub use view::SessionView;
pub use workflow::{LearningLoopService, MarkCompleteResult};
