use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::model::{CourseId, ProgressRecord};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by progress store adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Durable per-course persistence for `ProgressRecord`.
///
/// Constructor-injected into the services layer; there is no ambient global
/// store. Every write is a full-record overwrite keyed by course id, so
/// callers must read-modify-write when touching a single field.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Returns the stored record for a course, creating and persisting an
    /// empty one (stamped with `now`) when none exists. Idempotent: an
    /// existing record is returned unmodified.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be read or stored.
    async fn initialize(
        &self,
        course_id: CourseId,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError>;

    /// Fetches the record for a course, `None` when absent (or unreadable,
    /// see the SQLite adapter).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn read(&self, course_id: CourseId) -> Result<Option<ProgressRecord>, StorageError>;

    /// Overwrites the stored record for the record's course. Touches only
    /// that course's entry.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn write(&self, record: &ProgressRecord) -> Result<(), StorageError>;
}

/// In-memory store for tests and prototyping. Mirrors the SQLite contract.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    records: Arc<Mutex<HashMap<CourseId, ProgressRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn initialize(
        &self,
        course_id: CourseId,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let record = guard
            .entry(course_id)
            .or_insert_with(|| ProgressRecord::new(course_id, now));
        Ok(record.clone())
    }

    async fn read(&self, course_id: CourseId) -> Result<Option<ProgressRecord>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&course_id).cloned())
    }

    async fn write(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(record.course_id(), record.clone());
        Ok(())
    }
}

/// Aggregates the progress repository behind a trait object for backend
/// swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            progress: Arc::new(InMemoryRepository::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use course_core::model::SectionId;
    use course_core::time::fixed_now;

    #[tokio::test]
    async fn initialize_creates_then_returns_existing() {
        let repo = InMemoryRepository::new();
        let course = CourseId::new(1);

        let first = repo.initialize(course, fixed_now()).await.unwrap();
        assert_eq!(first.completed_count(), 0);

        // A second initialize must not reset progress made in between.
        let mut record = first.clone();
        record.mark_section_complete(SectionId::new(5), fixed_now());
        repo.write(&record).await.unwrap();

        let later = fixed_now() + Duration::hours(1);
        let again = repo.initialize(course, later).await.unwrap();
        assert_eq!(again, record);
    }

    #[tokio::test]
    async fn read_missing_course_is_none() {
        let repo = InMemoryRepository::new();
        assert!(repo.read(CourseId::new(42)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_is_scoped_per_course() {
        let repo = InMemoryRepository::new();
        let a = repo.initialize(CourseId::new(1), fixed_now()).await.unwrap();

        let mut b = ProgressRecord::new(CourseId::new(2), fixed_now());
        b.mark_section_complete(SectionId::new(9), fixed_now());
        repo.write(&b).await.unwrap();

        assert_eq!(repo.read(CourseId::new(1)).await.unwrap().unwrap(), a);
        assert_eq!(repo.read(CourseId::new(2)).await.unwrap().unwrap(), b);
    }

    #[test]
    fn storage_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<InMemoryRepository>();
    }
}
