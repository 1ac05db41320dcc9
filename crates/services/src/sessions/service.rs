use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use course_core::model::{
    CompletedSections, Course, Module, ModuleId, Quiz, QuizAnswers, QuizId, QuizScore, QuestionId,
    Section, SectionId,
};

use super::autosave::{NoteAutosave, PendingSave, SaveIndicator, SaveStatus};
use super::progress::CourseProgress;
use crate::error::SessionError;

//
// ─── VIEW STATE ────────────────────────────────────────────────────────────────
//

/// Which pane of the learning page is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveTab {
    #[default]
    Content,
    Notes,
}

/// An open checkpoint quiz with the learner's in-progress answers.
///
/// Dismissing the prompt before submitting discards the answers entirely.
#[derive(Debug, Clone)]
pub struct QuizPrompt {
    quiz: Quiz,
    module_order: u32,
    answers: QuizAnswers,
    result: Option<QuizScore>,
}

impl QuizPrompt {
    #[must_use]
    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    #[must_use]
    pub fn answers(&self) -> &QuizAnswers {
        &self.answers
    }

    #[must_use]
    pub fn result(&self) -> Option<QuizScore> {
        self.result
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory state machine for one learner working through one course.
///
/// Purely synchronous: all persistence and remote I/O is driven by
/// `LearningLoopService`, which feeds results back in. The completion map is
/// monotonic for the lifetime of the session; a stale remote read can never
/// roll back a completion applied here, because the orchestrator loads
/// remote state exactly once at session start.
pub struct LearningSession {
    course: Course,
    quizzes: BTreeMap<ModuleId, Quiz>,
    completed: CompletedSections,
    current_module: ModuleId,
    current_section: SectionId,
    active_tab: ActiveTab,
    quiz_prompt: Option<QuizPrompt>,
    notes_buffer: String,
    autosave: NoteAutosave,
    save_indicator: SaveIndicator,
}

impl LearningSession {
    /// Builds a session positioned at the first section of the first module.
    ///
    /// `checkpoint_quizzes` maps module ids to their gate quizzes.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::MissingCheckpointQuiz` when a checkpoint
    /// module has no associated quiz.
    pub fn new(
        course: Course,
        checkpoint_quizzes: BTreeMap<ModuleId, Quiz>,
        completed: CompletedSections,
    ) -> Result<Self, SessionError> {
        for module in course.modules() {
            if module.is_checkpoint() && !checkpoint_quizzes.contains_key(&module.id()) {
                return Err(SessionError::MissingCheckpointQuiz(module.id()));
            }
        }

        let first_module = course.first_module();
        let current_module = first_module.id();
        let current_section = first_module.first_section().id;

        Ok(Self {
            course,
            quizzes: checkpoint_quizzes,
            completed,
            current_module,
            current_section,
            active_tab: ActiveTab::default(),
            quiz_prompt: None,
            notes_buffer: String::new(),
            autosave: NoteAutosave::new(),
            save_indicator: SaveIndicator::default(),
        })
    }

    #[must_use]
    pub fn course(&self) -> &Course {
        &self.course
    }

    #[must_use]
    pub fn current_module_id(&self) -> ModuleId {
        self.current_module
    }

    #[must_use]
    pub fn current_section_id(&self) -> SectionId {
        self.current_section
    }

    /// The currently selected module.
    ///
    /// # Panics
    ///
    /// Never panics: selection always points into the course.
    #[must_use]
    pub fn current_module(&self) -> &Module {
        self.course
            .module(self.current_module)
            .expect("current module belongs to the course")
    }

    /// The currently selected section.
    ///
    /// # Panics
    ///
    /// Never panics: selection always points into the course.
    #[must_use]
    pub fn current_section(&self) -> &Section {
        self.current_module()
            .section(self.current_section)
            .expect("current section belongs to the current module")
    }

    #[must_use]
    pub fn active_tab(&self) -> ActiveTab {
        self.active_tab
    }

    pub fn set_active_tab(&mut self, tab: ActiveTab) {
        self.active_tab = tab;
    }

    //
    // ─── NAVIGATION ────────────────────────────────────────────────────────
    //

    /// Selects a module and its first section. Returns the newly current
    /// section so the caller can load its notes.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownModule` for foreign module ids.
    pub fn select_module(&mut self, module: ModuleId) -> Result<SectionId, SessionError> {
        let module = self.course.module(module).ok_or(SessionError::UnknownModule)?;
        self.current_module = module.id();
        self.current_section = module.first_section().id;
        Ok(self.current_section)
    }

    /// Selects a section (and its owning module). Returns the section id so
    /// the caller can load its notes.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownSection` for foreign section ids.
    pub fn select_section(&mut self, section: SectionId) -> Result<SectionId, SessionError> {
        let module = self
            .course
            .module_of_section(section)
            .ok_or(SessionError::UnknownSection)?;
        self.current_module = module.id();
        self.current_section = section;
        Ok(section)
    }

    //
    // ─── COMPLETION ────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn is_section_complete(&self, section: SectionId) -> bool {
        self.completed.get(&section).copied().unwrap_or(false)
    }

    /// Applies a confirmed completion to the in-memory map. Monotonic:
    /// completions only accumulate. Returns false when already complete.
    pub fn apply_completion(&mut self, section: SectionId) -> bool {
        let newly = !self.is_section_complete(section);
        self.completed.insert(section, true);
        newly
    }

    #[must_use]
    pub fn completed_sections(&self) -> &CompletedSections {
        &self.completed
    }

    /// Derived aggregate progress; recomputed on every call.
    #[must_use]
    pub fn progress(&self) -> CourseProgress {
        let completed = self.completed.values().filter(|&&done| done).count();
        CourseProgress::derive(completed, self.course.total_sections())
    }

    /// The quiz gated behind `section`, when it is the last section of a
    /// checkpoint module.
    #[must_use]
    pub fn checkpoint_gate(&self, section: SectionId) -> Option<(ModuleId, QuizId)> {
        let module = self.course.module_of_section(section)?;
        if module.is_checkpoint() && module.is_last_section(section) {
            self.quizzes
                .get(&module.id())
                .map(|quiz| (module.id(), quiz.id()))
        } else {
            None
        }
    }

    //
    // ─── QUIZ PROMPT ───────────────────────────────────────────────────────
    //

    /// Opens the quiz attached to `module` with a fresh answer sheet.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::MissingCheckpointQuiz` when the module has no
    /// quiz.
    pub fn open_quiz(&mut self, module: ModuleId) -> Result<(), SessionError> {
        let quiz = self
            .quizzes
            .get(&module)
            .cloned()
            .ok_or(SessionError::MissingCheckpointQuiz(module))?;
        let order = self
            .course
            .module(module)
            .ok_or(SessionError::UnknownModule)?
            .order();
        self.quiz_prompt = Some(QuizPrompt {
            quiz,
            module_order: order,
            answers: QuizAnswers::new(),
            result: None,
        });
        Ok(())
    }

    #[must_use]
    pub fn quiz_prompt(&self) -> Option<&QuizPrompt> {
        self.quiz_prompt.as_ref()
    }

    /// Records an answer on the open quiz.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoOpenQuiz` when no quiz is open.
    pub fn answer_question(
        &mut self,
        question: QuestionId,
        option: usize,
    ) -> Result<(), SessionError> {
        let prompt = self.quiz_prompt.as_mut().ok_or(SessionError::NoOpenQuiz)?;
        prompt.answers.select(question, option);
        Ok(())
    }

    /// True when every question of the open quiz has an answer. Submit
    /// stays disabled until this holds.
    #[must_use]
    pub fn quiz_answers_complete(&self) -> bool {
        self.quiz_prompt
            .as_ref()
            .is_some_and(|p| p.answers.is_complete_for(&p.quiz))
    }

    /// Scores the open quiz's answer sheet.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoOpenQuiz` when no quiz is open and
    /// propagates `QuizError::IncompleteAnswers` for partial sheets.
    pub fn score_quiz(&self) -> Result<(QuizId, QuizScore, QuizAnswers), SessionError> {
        let prompt = self.quiz_prompt.as_ref().ok_or(SessionError::NoOpenQuiz)?;
        let score = prompt.quiz.score(&prompt.answers)?;
        Ok((prompt.quiz.id(), score, prompt.answers.clone()))
    }

    /// Stores the submission outcome on the open prompt so closing it knows
    /// whether to advance.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoOpenQuiz` when no quiz is open.
    pub fn record_quiz_outcome(&mut self, score: QuizScore) -> Result<(), SessionError> {
        let prompt = self.quiz_prompt.as_mut().ok_or(SessionError::NoOpenQuiz)?;
        prompt.result = Some(score);
        Ok(())
    }

    /// Closes the quiz prompt, discarding unsubmitted answers. After a
    /// passed submission, advances selection to the first section of the
    /// next module and returns its id.
    pub fn close_quiz(&mut self) -> Option<SectionId> {
        let prompt = self.quiz_prompt.take()?;
        if !prompt.result.is_some_and(|r| r.passed) {
            return None;
        }
        let next = self.course.module_after(prompt.module_order)?;
        self.current_module = next.id();
        self.current_section = next.first_section().id;
        Some(self.current_section)
    }

    //
    // ─── NOTES ─────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn notes_buffer(&self) -> &str {
        &self.notes_buffer
    }

    /// Replaces the buffer with stored notes, without arming the autosave.
    pub fn load_notes(&mut self, text: String) {
        self.notes_buffer = text;
    }

    /// Applies a keystroke: the buffer updates immediately and the autosave
    /// timer restarts.
    pub fn edit_notes(&mut self, text: String, now: DateTime<Utc>) {
        self.notes_buffer = text.clone();
        self.autosave.record_edit(self.current_section, text, now);
    }

    pub(crate) fn take_due_autosave(&mut self, now: DateTime<Utc>) -> Option<PendingSave> {
        self.autosave.take_due(now)
    }

    pub(crate) fn flush_autosave(&mut self) -> Option<PendingSave> {
        self.autosave.flush()
    }

    pub(crate) fn cancel_autosave(&mut self) {
        self.autosave.cancel()
    }

    #[must_use]
    pub fn has_pending_autosave(&self) -> bool {
        self.autosave.is_pending()
    }

    #[must_use]
    pub fn save_status(&self) -> SaveStatus {
        self.save_indicator.status()
    }

    pub(crate) fn begin_saving(&mut self) {
        self.save_indicator.begin_saving();
    }

    pub(crate) fn mark_saved(&mut self, now: DateTime<Utc>) {
        self.save_indicator.mark_saved(now);
    }

    pub(crate) fn refresh_save_indicator(&mut self, now: DateTime<Utc>) {
        self.save_indicator.refresh(now);
    }
}

impl fmt::Debug for LearningSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LearningSession")
            .field("course_id", &self.course.id())
            .field("current_module", &self.current_module)
            .field("current_section", &self.current_section)
            .field("completed", &self.completed.len())
            .field("quiz_open", &self.quiz_prompt.is_some())
            .field("save_status", &self.save_indicator.status())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::{CourseId, QuizQuestion, Section};
    use course_core::time::fixed_now;

    fn section(id: u64) -> Section {
        Section::text(SectionId::new(id), format!("Section {id}"))
    }

    fn module(id: u64, order: u32, section_ids: &[u64]) -> Module {
        Module::new(
            ModuleId::new(id),
            format!("Module {id}"),
            order,
            section_ids.iter().map(|&s| section(s)).collect(),
        )
        .unwrap()
    }

    fn quiz(id: u64) -> Quiz {
        let questions = vec![
            QuizQuestion {
                id: QuestionId::new(1),
                prompt: "1 + 1?".into(),
                options: vec!["1".into(), "2".into()],
                correct_option: 1,
            },
            QuizQuestion {
                id: QuestionId::new(2),
                prompt: "2 + 2?".into(),
                options: vec!["4".into(), "5".into()],
                correct_option: 0,
            },
        ];
        Quiz::new(QuizId::new(id), "Checkpoint", questions).unwrap()
    }

    fn course() -> Course {
        Course::new(
            CourseId::new(1),
            "Rust Basics",
            vec![
                module(1, 1, &[10]),
                module(2, 2, &[20]),
                module(3, 3, &[30, 31]),
                module(4, 4, &[40]),
            ],
        )
        .unwrap()
    }

    fn quizzes() -> BTreeMap<ModuleId, Quiz> {
        BTreeMap::from([(ModuleId::new(3), quiz(100))])
    }

    fn session() -> LearningSession {
        LearningSession::new(course(), quizzes(), CompletedSections::new()).unwrap()
    }

    #[test]
    fn starts_at_first_module_and_section() {
        let session = session();
        assert_eq!(session.current_module_id(), ModuleId::new(1));
        assert_eq!(session.current_section_id(), SectionId::new(10));
        assert_eq!(session.active_tab(), ActiveTab::Content);
    }

    #[test]
    fn rejects_checkpoint_without_quiz() {
        let err =
            LearningSession::new(course(), BTreeMap::new(), CompletedSections::new()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::MissingCheckpointQuiz(id) if id == ModuleId::new(3)
        ));
    }

    #[test]
    fn select_module_lands_on_its_first_section() {
        let mut session = session();
        let section = session.select_module(ModuleId::new(3)).unwrap();
        assert_eq!(section, SectionId::new(30));
        assert!(matches!(
            session.select_module(ModuleId::new(99)),
            Err(SessionError::UnknownModule)
        ));
    }

    #[test]
    fn select_section_tracks_owning_module() {
        let mut session = session();
        session.select_section(SectionId::new(31)).unwrap();
        assert_eq!(session.current_module_id(), ModuleId::new(3));
        assert!(matches!(
            session.select_section(SectionId::new(999)),
            Err(SessionError::UnknownSection)
        ));
    }

    #[test]
    fn progress_is_recomputed_from_the_map() {
        let mut session = session();
        assert_eq!(session.progress().percent, 0);

        assert!(session.apply_completion(SectionId::new(10)));
        assert!(!session.apply_completion(SectionId::new(10)));
        let progress = session.progress();
        assert_eq!(progress.total_sections, 5);
        assert_eq!(progress.completed_sections, 1);
        assert_eq!(progress.percent, 20);
    }

    #[test]
    fn completion_never_reverts() {
        let mut session = session();
        session.apply_completion(SectionId::new(10));
        session.select_module(ModuleId::new(2)).unwrap();
        session.apply_completion(SectionId::new(20));
        assert!(session.is_section_complete(SectionId::new(10)));
        assert!(session.is_section_complete(SectionId::new(20)));
    }

    #[test]
    fn gate_only_on_last_section_of_checkpoint_module() {
        let session = session();
        assert!(session.checkpoint_gate(SectionId::new(30)).is_none());
        assert_eq!(
            session.checkpoint_gate(SectionId::new(31)),
            Some((ModuleId::new(3), QuizId::new(100)))
        );
        // Module 4 is not a checkpoint.
        assert!(session.checkpoint_gate(SectionId::new(40)).is_none());
    }

    #[test]
    fn quiz_flow_passes_and_advances() {
        let mut session = session();
        session.open_quiz(ModuleId::new(3)).unwrap();
        assert!(!session.quiz_answers_complete());

        session.answer_question(QuestionId::new(1), 1).unwrap();
        session.answer_question(QuestionId::new(2), 0).unwrap();
        assert!(session.quiz_answers_complete());

        let (quiz_id, score, _answers) = session.score_quiz().unwrap();
        assert_eq!(quiz_id, QuizId::new(100));
        assert_eq!(score.score, 100);
        assert!(score.passed);

        session.record_quiz_outcome(score).unwrap();
        let next = session.close_quiz().unwrap();
        assert_eq!(next, SectionId::new(40));
        assert_eq!(session.current_module_id(), ModuleId::new(4));
    }

    #[test]
    fn failed_quiz_does_not_advance() {
        let mut session = session();
        session.open_quiz(ModuleId::new(3)).unwrap();
        session.answer_question(QuestionId::new(1), 0).unwrap();
        session.answer_question(QuestionId::new(2), 1).unwrap();

        let (_, score, _) = session.score_quiz().unwrap();
        assert!(!score.passed);
        session.record_quiz_outcome(score).unwrap();
        assert!(session.close_quiz().is_none());
        assert_eq!(session.current_module_id(), ModuleId::new(1));
    }

    #[test]
    fn closing_without_submitting_discards_answers() {
        let mut session = session();
        session.open_quiz(ModuleId::new(3)).unwrap();
        session.answer_question(QuestionId::new(1), 1).unwrap();

        assert!(session.close_quiz().is_none());
        assert!(session.quiz_prompt().is_none());

        // Reopening starts from a blank sheet.
        session.open_quiz(ModuleId::new(3)).unwrap();
        assert_eq!(session.quiz_prompt().unwrap().answers().answered_count(), 0);
    }

    #[test]
    fn incomplete_submission_is_rejected() {
        let mut session = session();
        session.open_quiz(ModuleId::new(3)).unwrap();
        session.answer_question(QuestionId::new(1), 1).unwrap();

        let err = session.score_quiz().unwrap_err();
        assert!(matches!(err, SessionError::Quiz(_)));
    }

    #[test]
    fn note_edits_update_buffer_and_arm_autosave() {
        let mut session = session();
        session.load_notes("stored".into());
        assert_eq!(session.notes_buffer(), "stored");
        assert!(!session.has_pending_autosave());

        session.edit_notes("stored plus".into(), fixed_now());
        assert_eq!(session.notes_buffer(), "stored plus");
        assert!(session.has_pending_autosave());
    }
}
