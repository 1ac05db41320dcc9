use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{QuestionId, QuizId};

/// Minimum score (0-100) required to pass a quiz.
pub const PASSING_SCORE: u8 = 70;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz has no questions")]
    NoQuestions,

    #[error("question {0} needs at least two options")]
    TooFewOptions(QuestionId),

    #[error("question {0} marks a correct option that does not exist")]
    CorrectOptionOutOfRange(QuestionId),

    #[error("{missing} question(s) still unanswered")]
    IncompleteAnswers { missing: usize },
}

//
// ─── QUESTIONS ─────────────────────────────────────────────────────────────────
//

/// Single multiple-choice question. `correct_option` indexes into `options`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    pub id: QuestionId,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_option: usize,
}

/// Quiz attached to a checkpoint module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    id: QuizId,
    title: String,
    questions: Vec<QuizQuestion>,
}

impl Quiz {
    /// Creates a quiz, validating question presence and option ranges.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` when there are no questions, a question has fewer
    /// than two options, or a correct-option index is out of range.
    pub fn new(
        id: QuizId,
        title: impl Into<String>,
        questions: Vec<QuizQuestion>,
    ) -> Result<Self, QuizError> {
        if questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }
        for question in &questions {
            if question.options.len() < 2 {
                return Err(QuizError::TooFewOptions(question.id));
            }
            if question.correct_option >= question.options.len() {
                return Err(QuizError::CorrectOptionOutOfRange(question.id));
            }
        }
        Ok(Self {
            id,
            title: title.into(),
            questions,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    /// Scores a complete answer sheet by exact match against each question's
    /// correct option.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::IncompleteAnswers` when any question is
    /// unanswered; partial submissions are a caller error.
    pub fn score(&self, answers: &QuizAnswers) -> Result<QuizScore, QuizError> {
        let missing = self
            .questions
            .iter()
            .filter(|q| answers.selected(q.id).is_none())
            .count();
        if missing > 0 {
            return Err(QuizError::IncompleteAnswers { missing });
        }

        let total = self.questions.len();
        let correct = self
            .questions
            .iter()
            .filter(|q| answers.selected(q.id) == Some(q.correct_option))
            .count();

        Ok(QuizScore::from_counts(correct, total))
    }
}

//
// ─── ANSWERS ───────────────────────────────────────────────────────────────────
//

/// In-progress answer sheet: question id to selected option index.
///
/// Discarded wholesale when the learner dismisses the quiz without
/// submitting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuizAnswers(BTreeMap<QuestionId, usize>);

impl QuizAnswers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records (or replaces) the selected option for a question.
    pub fn select(&mut self, question: QuestionId, option: usize) {
        self.0.insert(question, option);
    }

    #[must_use]
    pub fn selected(&self, question: QuestionId) -> Option<usize> {
        self.0.get(&question).copied()
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.0.len()
    }

    /// True when every question of `quiz` has an answer.
    #[must_use]
    pub fn is_complete_for(&self, quiz: &Quiz) -> bool {
        quiz.questions()
            .iter()
            .all(|q| self.selected(q.id).is_some())
    }
}

//
// ─── SCORE ─────────────────────────────────────────────────────────────────────
//

/// Outcome of scoring one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizScore {
    pub score: u8,
    pub passed: bool,
    pub correct: usize,
    pub total: usize,
}

impl QuizScore {
    /// Derives the percentage score and pass flag from raw counts.
    ///
    /// `score = round(correct / total * 100)`; passing means
    /// `score >= PASSING_SCORE`. `total` is never zero for a valid quiz.
    #[must_use]
    pub fn from_counts(correct: usize, total: usize) -> Self {
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let score = if total == 0 {
            0
        } else {
            ((correct as f64 / total as f64) * 100.0).round() as u8
        };
        Self {
            score,
            passed: score >= PASSING_SCORE,
            correct,
            total,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: u64, correct: usize) -> QuizQuestion {
        QuizQuestion {
            id: QuestionId::new(id),
            prompt: format!("Question {id}?"),
            options: vec!["a".into(), "b".into(), "c".into()],
            correct_option: correct,
        }
    }

    fn quiz(correct_options: &[usize]) -> Quiz {
        let questions = correct_options
            .iter()
            .enumerate()
            .map(|(i, &c)| question(i as u64 + 1, c))
            .collect();
        Quiz::new(QuizId::new(1), "Checkpoint", questions).unwrap()
    }

    #[test]
    fn quiz_rejects_no_questions() {
        let err = Quiz::new(QuizId::new(1), "Empty", Vec::new()).unwrap_err();
        assert_eq!(err, QuizError::NoQuestions);
    }

    #[test]
    fn quiz_rejects_out_of_range_correct_option() {
        let err = Quiz::new(QuizId::new(1), "Bad", vec![question(1, 3)]).unwrap_err();
        assert_eq!(err, QuizError::CorrectOptionOutOfRange(QuestionId::new(1)));
    }

    #[test]
    fn quiz_rejects_single_option_question() {
        let mut q = question(1, 0);
        q.options.truncate(1);
        let err = Quiz::new(QuizId::new(1), "Bad", vec![q]).unwrap_err();
        assert_eq!(err, QuizError::TooFewOptions(QuestionId::new(1)));
    }

    #[test]
    fn scoring_requires_complete_answers() {
        let quiz = quiz(&[0, 1, 2]);
        let mut answers = QuizAnswers::new();
        answers.select(QuestionId::new(1), 0);

        let err = quiz.score(&answers).unwrap_err();
        assert_eq!(err, QuizError::IncompleteAnswers { missing: 2 });
        assert!(!answers.is_complete_for(&quiz));
    }

    #[test]
    fn two_of_three_scores_sixty_seven_and_fails() {
        let quiz = quiz(&[0, 1, 2]);
        let mut answers = QuizAnswers::new();
        answers.select(QuestionId::new(1), 0);
        answers.select(QuestionId::new(2), 1);
        answers.select(QuestionId::new(3), 0);

        let result = quiz.score(&answers).unwrap();
        assert_eq!(result.score, 67);
        assert!(!result.passed);
        assert_eq!(result.correct, 2);
    }

    #[test]
    fn all_correct_scores_hundred_and_passes() {
        let quiz = quiz(&[0, 1]);
        let mut answers = QuizAnswers::new();
        answers.select(QuestionId::new(1), 0);
        answers.select(QuestionId::new(2), 1);

        let result = quiz.score(&answers).unwrap();
        assert_eq!(result.score, 100);
        assert!(result.passed);
    }

    #[test]
    fn passing_boundary_is_seventy() {
        // 7 of 10 correct lands exactly on the threshold.
        let boundary = QuizScore::from_counts(7, 10);
        assert_eq!(boundary.score, 70);
        assert!(boundary.passed);

        let below = QuizScore::from_counts(69, 100);
        assert_eq!(below.score, 69);
        assert!(!below.passed);
    }

    #[test]
    fn reselecting_replaces_previous_answer() {
        let quiz = quiz(&[1]);
        let mut answers = QuizAnswers::new();
        answers.select(QuestionId::new(1), 0);
        answers.select(QuestionId::new(1), 1);

        assert_eq!(answers.answered_count(), 1);
        assert!(quiz.score(&answers).unwrap().passed);
    }
}
