use course_core::model::{CompletedSections, CourseId, ModuleId, SectionId};

use super::autosave::SaveStatus;
use super::service::{ActiveTab, LearningSession};

/// Immutable snapshot of session state for presentation components
/// (sidebars, tabs, progress bars). Rebuilt on demand; never authoritative.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub course_id: CourseId,
    pub course_title: String,
    pub current_module_id: ModuleId,
    pub current_section_id: SectionId,
    pub active_tab: ActiveTab,
    pub overall_progress: u8,
    pub completed_sections: CompletedSections,
    pub quiz_open: bool,
    pub save_status: SaveStatus,
    pub notes: String,
}

impl LearningSession {
    /// Snapshot of everything the presentation layer renders.
    #[must_use]
    pub fn view(&self) -> SessionView {
        SessionView {
            course_id: self.course().id(),
            course_title: self.course().title().to_owned(),
            current_module_id: self.current_module_id(),
            current_section_id: self.current_section_id(),
            active_tab: self.active_tab(),
            overall_progress: self.progress().percent,
            completed_sections: self.completed_sections().clone(),
            quiz_open: self.quiz_prompt().is_some(),
            save_status: self.save_status(),
            notes: self.notes_buffer().to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::{CompletedSections, Course, Module, Quiz, Section};
    use std::collections::BTreeMap;

    #[test]
    fn view_reflects_session_state() {
        let course = Course::new(
            CourseId::new(1),
            "Rust Basics",
            vec![
                Module::new(
                    ModuleId::new(1),
                    "Intro",
                    1,
                    vec![
                        Section::text(SectionId::new(10), "Hello"),
                        Section::text(SectionId::new(11), "Cargo"),
                    ],
                )
                .unwrap(),
            ],
        )
        .unwrap();

        let mut session =
            LearningSession::new(course, BTreeMap::<ModuleId, Quiz>::new(), CompletedSections::new())
                .unwrap();
        session.apply_completion(SectionId::new(10));
        session.load_notes("mem::swap".into());
        session.set_active_tab(ActiveTab::Notes);

        let view = session.view();
        assert_eq!(view.course_title, "Rust Basics");
        assert_eq!(view.active_tab, ActiveTab::Notes);
        assert_eq!(view.current_section_id, SectionId::new(10));
        assert_eq!(view.overall_progress, 50);
        assert!(!view.quiz_open);
        assert_eq!(view.save_status, SaveStatus::Idle);
        assert_eq!(view.notes, "mem::swap");
    }
}
