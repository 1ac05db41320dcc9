use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{CourseId, QuizId, SectionId};
use crate::model::quiz::PASSING_SCORE;

/// Canonical sparse completion map: a key is present only for completed
/// sections.
pub type CompletedSections = BTreeMap<SectionId, bool>;

//
// ─── QUIZ RESULT ───────────────────────────────────────────────────────────────
//

/// Recorded outcome of one quiz submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub score: u8,
    pub passed: bool,
    pub completed_at: DateTime<Utc>,
}

impl QuizResult {
    /// Builds a result from a 0-100 score, deriving the pass flag.
    ///
    /// The pass law holds by construction: `passed` iff
    /// `score >= PASSING_SCORE`.
    #[must_use]
    pub fn from_score(score: u8, completed_at: DateTime<Utc>) -> Self {
        Self {
            score,
            passed: score >= PASSING_SCORE,
            completed_at,
        }
    }
}

//
// ─── PROGRESS RECORD ───────────────────────────────────────────────────────────
//

/// Per-course, per-learner progress state. This serde shape is the persisted
/// layout, one record per course.
///
/// Section completion is monotonic: no mutator removes or falsifies an entry
/// in `completed_sections` once set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    course_id: CourseId,
    last_updated: DateTime<Utc>,
    #[serde(default)]
    completed_sections: CompletedSections,
    #[serde(default)]
    quiz_results: BTreeMap<QuizId, QuizResult>,
    #[serde(default)]
    notes: BTreeMap<SectionId, String>,
}

impl ProgressRecord {
    /// Empty record for a course, created on first visit.
    #[must_use]
    pub fn new(course_id: CourseId, now: DateTime<Utc>) -> Self {
        Self {
            course_id,
            last_updated: now,
            completed_sections: CompletedSections::new(),
            quiz_results: BTreeMap::new(),
            notes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    #[must_use]
    pub fn completed_sections(&self) -> &CompletedSections {
        &self.completed_sections
    }

    #[must_use]
    pub fn is_section_complete(&self, section: SectionId) -> bool {
        self.completed_sections
            .get(&section)
            .copied()
            .unwrap_or(false)
    }

    /// Number of sections currently marked complete.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed_sections.values().filter(|&&done| done).count()
    }

    /// Marks a section complete. Returns false when it already was.
    pub fn mark_section_complete(&mut self, section: SectionId, now: DateTime<Utc>) -> bool {
        let newly = !self.is_section_complete(section);
        self.completed_sections.insert(section, true);
        self.last_updated = now;
        newly
    }

    /// Replaces the completion map wholesale (remote wins on load), leaving
    /// quiz results and notes untouched.
    pub fn replace_completed_sections(&mut self, map: CompletedSections, now: DateTime<Utc>) {
        self.completed_sections = map;
        self.last_updated = now;
    }

    pub fn record_quiz_result(&mut self, quiz: QuizId, result: QuizResult, now: DateTime<Utc>) {
        self.quiz_results.insert(quiz, result);
        self.last_updated = now;
    }

    #[must_use]
    pub fn quiz_result(&self, quiz: QuizId) -> Option<&QuizResult> {
        self.quiz_results.get(&quiz)
    }

    #[must_use]
    pub fn has_passed_quiz(&self, quiz: QuizId) -> bool {
        self.quiz_results.get(&quiz).is_some_and(|r| r.passed)
    }

    pub fn set_note(&mut self, section: SectionId, text: impl Into<String>, now: DateTime<Utc>) {
        self.notes.insert(section, text.into());
        self.last_updated = now;
    }

    #[must_use]
    pub fn note(&self, section: SectionId) -> Option<&str> {
        self.notes.get(&section).map(String::as_str)
    }
}

/// Derived overall progress: `round(completed / total * 100)`, clamped to
/// 0-100. Zero when the course has no sections.
#[must_use]
pub fn completion_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let percent = ((completed as f64 / total as f64) * 100.0).round() as u64;
    percent.min(100) as u8
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
