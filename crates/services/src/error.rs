//! Shared error types for the services crate.

use thiserror::Error;

use course_core::model::{ModuleId, QuizError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `RemoteProgressGateway`.
///
/// These never reach the session layer: the reconciliation service logs
/// them and degrades to local-only persistence.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("remote progress API is not configured")]
    Disabled,
    #[error("remote progress API rejected the request")]
    Rejected,
    #[error("remote progress API returned status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `ProgressService`.
///
/// Only local-store failures appear here; remote failures degrade silently.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the learning session and its orchestrator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("checkpoint module {0} has no associated quiz")]
    MissingCheckpointQuiz(ModuleId),
    #[error("module is not part of this course")]
    UnknownModule,
    #[error("section is not part of this course")]
    UnknownSection,
    #[error("no quiz is currently open")]
    NoOpenQuiz,
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Progress(#[from] ProgressServiceError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
