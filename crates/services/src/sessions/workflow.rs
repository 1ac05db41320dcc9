use std::collections::BTreeMap;
use std::sync::Arc;

use course_core::model::{Course, ModuleId, Quiz, SectionId};
use course_core::Clock;

use super::progress::CourseProgress;
use super::service::LearningSession;
use crate::error::SessionError;
use crate::progress_service::{ProgressService, QuizOutcome, WriteOutcome};

/// Result of marking the current section complete.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkCompleteResult {
    pub outcome: WriteOutcome,
    pub progress: CourseProgress,
    pub quiz_opened: bool,
}

/// Orchestrates a learning session against the reconciliation service.
///
/// Owns the async edges of the session: loading progress on start, the
/// write-through calls for completions/quizzes/notes, and driving the
/// autosave debouncer via `tick`. The session itself stays pure.
#[derive(Clone)]
pub struct LearningLoopService {
    clock: Clock,
    progress: Arc<ProgressService>,
}

impl LearningLoopService {
    #[must_use]
    pub fn new(clock: Clock, progress: Arc<ProgressService>) -> Self {
        Self { clock, progress }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Starts a session: ensures a local record, loads the canonical
    /// completion map once, and positions the session at the first section
    /// with its notes loaded.
    ///
    /// Progress is loaded exactly once here; later mutations only flow
    /// outward, so a stale remote view can never roll back this session's
    /// completions.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` when the course structure is invalid for a
    /// session or the local store fails. These are fatal to the session.
    pub async fn start_session(
        &self,
        course: Course,
        checkpoint_quizzes: BTreeMap<ModuleId, Quiz>,
    ) -> Result<LearningSession, SessionError> {
        let course_id = course.id();
        self.progress.initialize(course_id).await?;
        let completed = self.progress.course_progress(course_id).await?;

        let mut session = LearningSession::new(course, checkpoint_quizzes, completed)?;
        let notes = self
            .progress
            .notes(course_id, session.current_section_id())
            .await?;
        session.load_notes(notes);
        Ok(session)
    }

    /// Selects a module, committing any pending note edit first, then loads
    /// the notes of the module's first section.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` for foreign module ids or store failures.
    pub async fn select_module(
        &self,
        session: &mut LearningSession,
        module: ModuleId,
    ) -> Result<(), SessionError> {
        self.flush_pending_notes(session).await?;
        let section = session.select_module(module)?;
        self.load_notes(session, section).await
    }

    /// Selects a section, committing any pending note edit first, then
    /// loads that section's notes.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` for foreign section ids or store failures.
    pub async fn select_section(
        &self,
        session: &mut LearningSession,
        section: SectionId,
    ) -> Result<(), SessionError> {
        self.flush_pending_notes(session).await?;
        let section = session.select_section(section)?;
        self.load_notes(session, section).await
    }

    /// Marks the current section complete through the reconciliation
    /// service, applies the optimistic in-memory update, and opens the
    /// checkpoint quiz when the section gates one that is still unpassed.
    ///
    /// Remote failure is non-fatal: the outcome message reports it while
    /// the applied state stands.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` when the local store fails with the remote
    /// also unavailable.
    pub async fn mark_current_complete(
        &self,
        session: &mut LearningSession,
    ) -> Result<MarkCompleteResult, SessionError> {
        let course_id = session.course().id();
        let section = session.current_section_id();

        let outcome = self
            .progress
            .mark_section_complete(course_id, section)
            .await?;
        session.apply_completion(section);

        let mut quiz_opened = false;
        if let Some((module, quiz)) = session.checkpoint_gate(section) {
            if !self.progress.has_passed_quiz(course_id, quiz).await? {
                session.open_quiz(module)?;
                quiz_opened = true;
            }
        }

        Ok(MarkCompleteResult {
            outcome,
            progress: session.progress(),
            quiz_opened,
        })
    }

    /// Scores and records the open quiz. The prompt stays open so the
    /// learner sees the result; `close_quiz` decides about advancing.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` when no quiz is open, the answer sheet is
    /// incomplete, or the local store fails with the remote unavailable.
    pub async fn submit_quiz(
        &self,
        session: &mut LearningSession,
    ) -> Result<QuizOutcome, SessionError> {
        let (quiz_id, score, answers) = session.score_quiz()?;
        let course_id = session.course().id();

        let outcome = self
            .progress
            .submit_quiz_results(course_id, quiz_id, score.score, &answers)
            .await?;
        session.record_quiz_outcome(score)?;
        Ok(outcome)
    }

    /// Closes the quiz prompt. After a passed submission this advances to
    /// the next module and loads its first section's notes; the advanced-to
    /// section id is returned.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` on store failure while loading notes.
    pub async fn close_quiz(
        &self,
        session: &mut LearningSession,
    ) -> Result<Option<SectionId>, SessionError> {
        self.flush_pending_notes(session).await?;
        let advanced = session.close_quiz();
        if let Some(section) = advanced {
            self.load_notes(session, section).await?;
        }
        Ok(advanced)
    }

    /// Applies a notes keystroke: the buffer updates immediately and the
    /// debounced save is (re)scheduled.
    pub fn edit_notes(&self, session: &mut LearningSession, text: impl Into<String>) {
        session.edit_notes(text.into(), self.clock.now());
    }

    /// Drives time-based behavior: reverts a held `Saved` indicator and
    /// fires at most one due autosave. The host event loop calls this;
    /// returns true when a save fired.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` when the autosave write fails in both stores.
    pub async fn tick(&self, session: &mut LearningSession) -> Result<bool, SessionError> {
        let now = self.clock.now();
        session.refresh_save_indicator(now);

        let Some(pending) = session.take_due_autosave(now) else {
            return Ok(false);
        };

        session.begin_saving();
        self.progress
            .save_notes(session.course().id(), pending.section_id, &pending.text)
            .await?;
        session.mark_saved(self.clock.now());
        Ok(true)
    }

    /// Saves the notes buffer immediately, cancelling any pending debounce.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` when the write fails in both stores.
    pub async fn save_notes_now(
        &self,
        session: &mut LearningSession,
    ) -> Result<WriteOutcome, SessionError> {
        session.cancel_autosave();
        session.begin_saving();

        let outcome = self
            .progress
            .save_notes(
                session.course().id(),
                session.current_section_id(),
                &session.notes_buffer().to_owned(),
            )
            .await?;
        session.mark_saved(self.clock.now());
        Ok(outcome)
    }

    /// Ends the session, committing any note edit still inside its quiet
    /// period.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` when the final write fails in both stores.
    pub async fn finish(&self, session: &mut LearningSession) -> Result<(), SessionError> {
        self.flush_pending_notes(session).await
    }

    async fn flush_pending_notes(
        &self,
        session: &mut LearningSession,
    ) -> Result<(), SessionError> {
        if let Some(pending) = session.flush_autosave() {
            session.begin_saving();
            self.progress
                .save_notes(session.course().id(), pending.section_id, &pending.text)
                .await?;
            session.mark_saved(self.clock.now());
        }
        Ok(())
    }

    async fn load_notes(
        &self,
        session: &mut LearningSession,
        section: SectionId,
    ) -> Result<(), SessionError> {
        let notes = self.progress.notes(session.course().id(), section).await?;
        session.load_notes(notes);
        Ok(())
    }
}
