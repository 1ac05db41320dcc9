use std::sync::Arc;

use course_core::model::{
    completion_percent, CompletedSections, CourseId, ProgressRecord, QuizAnswers, QuizId,
    QuizResult, SectionId,
};
use course_core::Clock;
use storage::repository::{ProgressRepository, StorageError};

use crate::error::ProgressServiceError;
use crate::remote_gateway::ProgressGateway;

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// Result of a write-through operation. `success` is true whenever either
/// store accepted the write; the message notes a degraded path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub success: bool,
    pub message: String,
}

/// Result of recording a quiz submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOutcome {
    pub success: bool,
    pub score: u8,
    pub passed: bool,
    pub message: String,
}

//
// ─── RECONCILIATION SERVICE ────────────────────────────────────────────────────
//

/// Single entry point combining the remote gateway and the local store.
///
/// Reads prefer the remote and fall back to local; writes go through both,
/// with the local write as the durability guarantee. Remote failures are
/// logged and degrade silently; they never surface as errors here.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    store: Arc<dyn ProgressRepository>,
    gateway: Arc<dyn ProgressGateway>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        store: Arc<dyn ProgressRepository>,
        gateway: Arc<dyn ProgressGateway>,
    ) -> Self {
        Self {
            clock,
            store,
            gateway,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Ensures a local record exists for the course.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on local-store failure.
    pub async fn initialize(&self, course: CourseId) -> Result<ProgressRecord, ProgressServiceError> {
        Ok(self.store.initialize(course, self.clock.now()).await?)
    }

    /// Canonical completion map for a course: remote when reachable (backed
    /// up locally), local otherwise. Remote wins on load, but the backup
    /// write preserves locally held quiz results and notes.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on local-store failure; remote
    /// failures only produce the local fallback.
    pub async fn course_progress(
        &self,
        course: CourseId,
    ) -> Result<CompletedSections, ProgressServiceError> {
        match self.gateway.fetch_progress(course).await {
            Ok(remote) => {
                log::debug!(
                    "remote progress read for course {course}: {} sections",
                    remote.len()
                );
                let now = self.clock.now();
                let mut record = match self.store.read(course).await? {
                    Some(record) => record,
                    None => ProgressRecord::new(course, now),
                };
                record.replace_completed_sections(remote.clone(), now);
                if let Err(err) = self.store.write(&record).await {
                    log::warn!("failed to back up remote progress for course {course}: {err}");
                }
                Ok(remote)
            }
            Err(err) => {
                log::warn!(
                    "remote progress read failed for course {course}, falling back to local: {err}"
                );
                Ok(self
                    .store
                    .read(course)
                    .await?
                    .map(|record| record.completed_sections().clone())
                    .unwrap_or_default())
            }
        }
    }

    /// Marks a section complete in both stores. Local success is sufficient
    /// for overall success.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` only when the local write fails with
    /// the remote also unavailable.
    pub async fn mark_section_complete(
        &self,
        course: CourseId,
        section: SectionId,
    ) -> Result<WriteOutcome, ProgressServiceError> {
        let remote_ok = match self.gateway.mark_complete(course, section).await {
            Ok(_) => true,
            Err(err) => {
                log::warn!("remote mark-complete failed for section {section}: {err}");
                false
            }
        };

        let local = self
            .update_record(course, |record, now| {
                record.mark_section_complete(section, now);
            })
            .await;

        Self::write_outcome(remote_ok, local, "section marked as complete")
    }

    /// Records a scored quiz submission in both stores. The pass flag is
    /// always derived locally, even when the remote confirmed.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` only when the local write fails with
    /// the remote also unavailable.
    pub async fn submit_quiz_results(
        &self,
        course: CourseId,
        quiz: QuizId,
        score: u8,
        answers: &QuizAnswers,
    ) -> Result<QuizOutcome, ProgressServiceError> {
        let remote_ok = match self.gateway.submit_quiz(course, quiz, score, answers).await {
            Ok(_) => true,
            Err(err) => {
                log::warn!("remote quiz submission failed for quiz {quiz}: {err}");
                false
            }
        };

        let result = QuizResult::from_score(score, self.clock.now());
        let local = self
            .update_record(course, |record, now| {
                record.record_quiz_result(quiz, result, now);
            })
            .await;

        let outcome = Self::write_outcome(remote_ok, local, "quiz submitted successfully")?;
        Ok(QuizOutcome {
            success: outcome.success,
            score: result.score,
            passed: result.passed,
            message: outcome.message,
        })
    }

    /// Stores section notes in both stores.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` only when the local write fails with
    /// the remote also unavailable.
    pub async fn save_notes(
        &self,
        course: CourseId,
        section: SectionId,
        text: &str,
    ) -> Result<WriteOutcome, ProgressServiceError> {
        let remote_ok = match self.gateway.save_notes(course, section, text).await {
            Ok(_) => true,
            Err(err) => {
                log::warn!("remote notes save failed for section {section}: {err}");
                false
            }
        };

        let local = self
            .update_record(course, |record, now| {
                record.set_note(section, text, now);
            })
            .await;

        Self::write_outcome(remote_ok, local, "notes saved successfully")
    }

    /// Notes for a section, from the local store only. Empty when absent.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on local-store failure.
    pub async fn notes(
        &self,
        course: CourseId,
        section: SectionId,
    ) -> Result<String, ProgressServiceError> {
        Ok(self
            .store
            .read(course)
            .await?
            .and_then(|record| record.note(section).map(str::to_owned))
            .unwrap_or_default())
    }

    /// Whether a quiz has been passed, from the local store only. This is
    /// authoritative for quiz gating.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on local-store failure.
    pub async fn has_passed_quiz(
        &self,
        course: CourseId,
        quiz: QuizId,
    ) -> Result<bool, ProgressServiceError> {
        Ok(self
            .store
            .read(course)
            .await?
            .is_some_and(|record| record.has_passed_quiz(quiz)))
    }

    /// Overall completion percentage from the local store, derived against
    /// the given section count.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` on local-store failure.
    pub async fn completion_percentage(
        &self,
        course: CourseId,
        total_sections: usize,
    ) -> Result<u8, ProgressServiceError> {
        let completed = self
            .store
            .read(course)
            .await?
            .map(|record| record.completed_count())
            .unwrap_or(0);
        Ok(completion_percent(completed, total_sections))
    }

    /// Read-modify-write of the full local record, creating one when absent,
    /// so near-simultaneous writes to different fields cannot clobber each
    /// other.
    async fn update_record(
        &self,
        course: CourseId,
        apply: impl FnOnce(&mut ProgressRecord, chrono::DateTime<chrono::Utc>),
    ) -> Result<(), StorageError> {
        let now = self.clock.now();
        let mut record = match self.store.read(course).await? {
            Some(record) => record,
            None => ProgressRecord::new(course, now),
        };
        apply(&mut record, now);
        self.store.write(&record).await
    }

    fn write_outcome(
        remote_ok: bool,
        local: Result<(), StorageError>,
        action: &str,
    ) -> Result<WriteOutcome, ProgressServiceError> {
        match (remote_ok, local) {
            (remote_ok, Ok(())) => Ok(WriteOutcome {
                success: true,
                message: if remote_ok {
                    action.to_string()
                } else {
                    format!("{action} (local only)")
                },
            }),
            (true, Err(err)) => {
                log::warn!("local backup write failed: {err}");
                Ok(WriteOutcome {
                    success: true,
                    message: format!("{action} (remote only)"),
                })
            }
            (false, Err(err)) => Err(err.into()),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
