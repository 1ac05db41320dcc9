use std::sync::Arc;

use course_core::Clock;
use storage::repository::Storage;

use crate::error::AppServicesError;
use crate::progress_service::ProgressService;
use crate::remote_gateway::RemoteProgressGateway;
use crate::sessions::LearningLoopService;

/// Assembles app-facing services over a storage backend and the
/// environment-configured remote gateway.
#[derive(Clone)]
pub struct AppServices {
    remote_enabled: bool,
    progress: Arc<ProgressService>,
    learning: Arc<LearningLoopService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::assemble(storage, clock))
    }

    /// Build services over an in-memory store, for tests and dry runs.
    #[must_use]
    pub fn new_in_memory(clock: Clock) -> Self {
        Self::assemble(Storage::in_memory(), clock)
    }

    fn assemble(storage: Storage, clock: Clock) -> Self {
        let gateway = RemoteProgressGateway::from_env();
        let remote_enabled = gateway.enabled();
        let progress = Arc::new(ProgressService::new(
            clock,
            Arc::clone(&storage.progress),
            Arc::new(gateway),
        ));
        let learning = Arc::new(LearningLoopService::new(clock, Arc::clone(&progress)));
        Self {
            remote_enabled,
            progress,
            learning,
        }
    }

    /// Whether a remote progress API is configured; when false the engine
    /// runs local-only.
    #[must_use]
    pub fn remote_enabled(&self) -> bool {
        self.remote_enabled
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn learning(&self) -> Arc<LearningLoopService> {
        Arc::clone(&self.learning)
    }
}
