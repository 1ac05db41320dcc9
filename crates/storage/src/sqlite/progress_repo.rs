use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use course_core::model::{CourseId, ProgressRecord};

use crate::repository::{ProgressRepository, StorageError};

use super::SqliteRepository;

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn initialize(
        &self,
        course_id: CourseId,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError> {
        if let Some(existing) = self.read(course_id).await? {
            return Ok(existing);
        }

        let record = ProgressRecord::new(course_id, now);
        self.write(&record).await?;
        Ok(record)
    }

    async fn read(&self, course_id: CourseId) -> Result<Option<ProgressRecord>, StorageError> {
        let row = sqlx::query("SELECT payload FROM progress_records WHERE course_id = ?1")
            .bind(course_id.to_string())
            .fetch_optional(self.pool())
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: String = row
            .try_get("payload")
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        // Unreadable payloads count as absent; the caller reinitializes.
        match serde_json::from_str::<ProgressRecord>(&payload) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                log::warn!("discarding malformed progress record for course {course_id}: {err}");
                Ok(None)
            }
        }
    }

    async fn write(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let payload = serde_json::to_string(record)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        sqlx::query(
            r"
            INSERT INTO progress_records (course_id, payload, last_updated)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(course_id) DO UPDATE SET
                payload = excluded.payload,
                last_updated = excluded.last_updated
            ",
        )
        .bind(record.course_id().to_string())
        .bind(payload)
        .bind(record.last_updated())
        .execute(self.pool())
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }
}
