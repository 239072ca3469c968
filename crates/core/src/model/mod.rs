mod ids;
mod progress;
mod question;
mod topic;

pub use ids::{ParseIdError, QuestionId, TopicId, UserId};

pub use progress::{
    DecodedProgress, Mistake, ProgressMap, ProgressRecord, ProgressRecordError,
    decode_entries, decode_progress_map, encode_progress_map,
};
pub use question::{Question, QuestionBank, QuestionBankDraft, QuestionDraft, QuestionError};
pub use topic::{Catalog, CategoryFilter, Topic, TopicDraft, TopicError, TopicFilter};
