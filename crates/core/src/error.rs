use thiserror::Error;

use crate::model::{ParseIdError, ProgressRecordError, QuestionError, TopicError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Topic(#[from] TopicError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Progress(#[from] ProgressRecordError),
    #[error(transparent)]
    Id(#[from] ParseIdError),
}
