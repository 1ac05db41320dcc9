use thiserror::Error;

use crate::model::course::CourseError;
use crate::model::quiz::QuizError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
}
