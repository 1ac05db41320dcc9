#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod progress_service;
pub mod remote_gateway;
pub mod sessions;

pub use course_core::Clock;
pub use sessions as session;

pub use app_services::AppServices;
pub use error::{AppServicesError, GatewayError, ProgressServiceError, SessionError};
pub use progress_service::{ProgressService, QuizOutcome, WriteOutcome};
pub use remote_gateway::{ProgressGateway, RemoteConfig, RemoteProgressGateway};

pub use sessions::{
    ActiveTab, CourseProgress, LearningLoopService, LearningSession, MarkCompleteResult,
    NoteAutosave, SaveStatus, SessionView,
};
