use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, ModuleId, SectionId};

/// Every n-th module (by `order`) is a checkpoint and gates a quiz.
pub const CHECKPOINT_INTERVAL: u32 = 3;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("course title cannot be empty")]
    EmptyTitle,

    #[error("course has no modules")]
    NoModules,

    #[error("module {0} has no sections")]
    EmptyModule(ModuleId),

    #[error("module order must be >= 1")]
    InvalidOrder,

    #[error("duplicate module order {0}")]
    DuplicateOrder(u32),
}

//
// ─── CONTENT ───────────────────────────────────────────────────────────────────
//

/// What a section delivers to the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Video,
    Pdf,
    Both,
    Text,
}

/// Smallest content unit within a module. Completion is tracked per section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub title: String,
    pub content: ContentKind,
    pub video_url: Option<String>,
    pub pdf_url: Option<String>,
}

impl Section {
    #[must_use]
    pub fn text(id: SectionId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            content: ContentKind::Text,
            video_url: None,
            pdf_url: None,
        }
    }
}

//
// ─── MODULE ────────────────────────────────────────────────────────────────────
//

/// Ordered group of sections. `order` is 1-based and unique within a course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    id: ModuleId,
    title: String,
    order: u32,
    sections: Vec<Section>,
}

impl Module {
    /// Creates a module, validating order and section presence.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::InvalidOrder` when `order` is zero and
    /// `CourseError::EmptyModule` when no sections are provided.
    pub fn new(
        id: ModuleId,
        title: impl Into<String>,
        order: u32,
        sections: Vec<Section>,
    ) -> Result<Self, CourseError> {
        if order == 0 {
            return Err(CourseError::InvalidOrder);
        }
        if sections.is_empty() {
            return Err(CourseError::EmptyModule(id));
        }
        Ok(Self {
            id,
            title: title.into(),
            order,
            sections,
        })
    }

    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Checkpoint modules gate a quiz once their last section is completed.
    #[must_use]
    pub fn is_checkpoint(&self) -> bool {
        self.order % CHECKPOINT_INTERVAL == 0
    }

    /// First section in module order. Modules are never empty.
    ///
    /// # Panics
    ///
    /// Never panics: `Module::new` rejects empty section lists.
    #[must_use]
    pub fn first_section(&self) -> &Section {
        &self.sections[0]
    }

    #[must_use]
    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// True when `id` is the final section of this module.
    #[must_use]
    pub fn is_last_section(&self, id: SectionId) -> bool {
        self.sections.last().is_some_and(|s| s.id == id)
    }
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

/// Read-only course structure supplied by the content provider.
///
/// Modules are kept sorted by `order` regardless of input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    id: CourseId,
    title: String,
    modules: Vec<Module>,
}

impl Course {
    /// Creates a course, validating title, module presence, and order
    /// uniqueness.
    ///
    /// # Errors
    ///
    /// Returns `CourseError` when the title is blank, no modules are given,
    /// or two modules share an `order`.
    pub fn new(
        id: CourseId,
        title: impl Into<String>,
        mut modules: Vec<Module>,
    ) -> Result<Self, CourseError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CourseError::EmptyTitle);
        }
        if modules.is_empty() {
            return Err(CourseError::NoModules);
        }

        modules.sort_by_key(Module::order);
        for pair in modules.windows(2) {
            if pair[0].order == pair[1].order {
                return Err(CourseError::DuplicateOrder(pair[0].order));
            }
        }

        Ok(Self { id, title, modules })
    }

    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// Sum of section counts across all modules.
    #[must_use]
    pub fn total_sections(&self) -> usize {
        self.modules.iter().map(|m| m.sections.len()).sum()
    }

    /// Module with the lowest `order`. Courses are never empty.
    ///
    /// # Panics
    ///
    /// Never panics: `Course::new` rejects empty module lists.
    #[must_use]
    pub fn first_module(&self) -> &Module {
        &self.modules[0]
    }

    #[must_use]
    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.iter().find(|m| m.id == id)
    }

    /// Module owning the given section, if any.
    #[must_use]
    pub fn module_of_section(&self, id: SectionId) -> Option<&Module> {
        self.modules.iter().find(|m| m.section(id).is_some())
    }

    /// Next module in structure order after the given `order`, if any.
    #[must_use]
    pub fn module_after(&self, order: u32) -> Option<&Module> {
        self.modules.iter().find(|m| m.order > order)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
