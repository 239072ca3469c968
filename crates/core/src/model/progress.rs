use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::ids::{QuestionId, TopicId};
use crate::time::Timestamp;

/// Upper bound on answer slots accepted from a stored document.
const MAX_ANSWER_SLOTS: usize = 10_000;

/// Authoritative progress per topic.
pub type ProgressMap = BTreeMap<TopicId, ProgressRecord>;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressRecordError {
    #[error("progress document is not an object")]
    NotAnObject,

    #[error("progress document has an invalid `{0}` field")]
    InvalidField(&'static str),

    #[error("score ({score}) exceeds completed questions ({completed})")]
    ScoreExceedsCompleted { score: u32, completed: u32 },

    #[error("invalid topic key: {0}")]
    InvalidKey(String),
}

//
// ─── MISTAKE ───────────────────────────────────────────────────────────────────
//

/// A question answered wrongly (or left unanswered) in a finished attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mistake {
    pub selected_answer: Option<u32>,
    pub correct_answer: u32,
    pub attempt: u32,
    pub timestamp: Timestamp,
}

impl Mistake {
    fn from_document(value: &Value) -> Result<Self, ProgressRecordError> {
        const FIELD: &str = "mistakes";
        let obj = value
            .as_object()
            .ok_or(ProgressRecordError::InvalidField(FIELD))?;

        Ok(Self {
            selected_answer: optional_u32(obj, "selectedAnswer")
                .map_err(|_| ProgressRecordError::InvalidField(FIELD))?,
            correct_answer: optional_u32(obj, "correctAnswer")
                .map_err(|_| ProgressRecordError::InvalidField(FIELD))?
                .ok_or(ProgressRecordError::InvalidField(FIELD))?,
            attempt: optional_u32(obj, "attempt")
                .map_err(|_| ProgressRecordError::InvalidField(FIELD))?
                .unwrap_or(1),
            timestamp: optional_timestamp(obj, "timestamp")
                .map_err(|_| ProgressRecordError::InvalidField(FIELD))?
                .unwrap_or(Timestamp::EPOCH),
        })
    }
}

//
// ─── PROGRESS RECORD ───────────────────────────────────────────────────────────
//

/// One user's progress on one topic.
///
/// Finished attempts carry `completed_at`; saves made when leaving a quiz
/// midway carry `last_saved` instead. `score <= completed_questions` always
/// holds for a constructed or decoded record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "Value")]
pub struct ProgressRecord {
    score: u32,
    completed_questions: u32,
    answers: Vec<Option<u32>>,
    mistakes: BTreeMap<QuestionId, Mistake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_saved: Option<Timestamp>,
}

impl ProgressRecord {
    /// Record for a submitted attempt over `total` questions.
    ///
    /// # Errors
    ///
    /// Returns `ProgressRecordError::ScoreExceedsCompleted` if `score > total`.
    pub fn completed(
        score: u32,
        total: u32,
        answers: Vec<Option<u32>>,
        mistakes: BTreeMap<QuestionId, Mistake>,
        completed_at: Timestamp,
    ) -> Result<Self, ProgressRecordError> {
        if score > total {
            return Err(ProgressRecordError::ScoreExceedsCompleted {
                score,
                completed: total,
            });
        }
        Ok(Self {
            score,
            completed_questions: total,
            answers,
            mistakes,
            completed_at: Some(completed_at),
            last_saved: None,
        })
    }

    /// Record for an attempt left midway; the score is only computed on submit.
    #[must_use]
    pub fn partial(completed_questions: u32, answers: Vec<Option<u32>>, saved_at: Timestamp) -> Self {
        Self {
            score: 0,
            completed_questions,
            answers,
            mistakes: BTreeMap::new(),
            completed_at: None,
            last_saved: Some(saved_at),
        }
    }

    /// Decode a stored document, coercing the shapes older writers produced.
    ///
    /// - missing `score` counts as 0, missing `completedQuestions` falls back to the score
    /// - `answers` may be an array with `null` holes or an object keyed by index
    /// - numbers may be integral floats
    ///
    /// # Errors
    ///
    /// Returns `ProgressRecordError` for non-object documents, fields of the
    /// wrong type, or a score above the completed count.
    pub fn from_document(value: &Value) -> Result<Self, ProgressRecordError> {
        let obj = value.as_object().ok_or(ProgressRecordError::NotAnObject)?;

        let score = optional_u32(obj, "score")
            .map_err(|_| ProgressRecordError::InvalidField("score"))?
            .unwrap_or(0);
        let completed_questions = optional_u32(obj, "completedQuestions")
            .map_err(|_| ProgressRecordError::InvalidField("completedQuestions"))?
            .unwrap_or(score);
        if score > completed_questions {
            return Err(ProgressRecordError::ScoreExceedsCompleted {
                score,
                completed: completed_questions,
            });
        }

        let answers = match obj.get("answers") {
            None | Some(Value::Null) => Vec::new(),
            Some(v) => decode_answers(v)?,
        };

        let mistakes = match obj.get("mistakes") {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(Value::Object(entries)) => entries
                .iter()
                .map(|(key, entry)| {
                    let id = QuestionId::new(key.as_str())
                        .map_err(|_| ProgressRecordError::InvalidField("mistakes"))?;
                    Ok((id, Mistake::from_document(entry)?))
                })
                .collect::<Result<BTreeMap<_, _>, ProgressRecordError>>()?,
            Some(_) => return Err(ProgressRecordError::InvalidField("mistakes")),
        };

        Ok(Self {
            score,
            completed_questions,
            answers,
            mistakes,
            completed_at: optional_timestamp(obj, "completedAt")
                .map_err(|_| ProgressRecordError::InvalidField("completedAt"))?,
            last_saved: optional_timestamp(obj, "lastSaved")
                .map_err(|_| ProgressRecordError::InvalidField("lastSaved"))?,
        })
    }

    /// Serialize into the document shape used by both stores.
    #[must_use]
    pub fn to_document(&self) -> Value {
        // Serializing plain integers, options and string-keyed maps cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn completed_questions(&self) -> u32 {
        self.completed_questions
    }

    #[must_use]
    pub fn answers(&self) -> &[Option<u32>] {
        &self.answers
    }

    #[must_use]
    pub fn mistakes(&self) -> &BTreeMap<QuestionId, Mistake> {
        &self.mistakes
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<Timestamp> {
        self.completed_at
    }

    #[must_use]
    pub fn last_saved(&self) -> Option<Timestamp> {
        self.last_saved
    }

    /// `completed_at`, with an in-progress save ranking as the epoch.
    #[must_use]
    pub fn freshness(&self) -> Timestamp {
        self.completed_at.unwrap_or(Timestamp::EPOCH)
    }

    #[must_use]
    pub fn is_complete_for(&self, total_questions: u32) -> bool {
        self.completed_questions == total_questions
    }
}

impl TryFrom<Value> for ProgressRecord {
    type Error = ProgressRecordError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_document(&value)
    }
}

//
// ─── MAP DECODING ──────────────────────────────────────────────────────────────
//

/// Result of decoding a `{ topicId: record }` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedProgress {
    pub records: ProgressMap,
    pub rejected: Vec<(String, ProgressRecordError)>,
}

/// Decode every entry of a `{ topicId: record }` object, keeping the valid ones.
///
/// # Errors
///
/// Returns `ProgressRecordError::NotAnObject` if the top-level value is not an
/// object (or null, which decodes as empty).
pub fn decode_progress_map(value: &Value) -> Result<DecodedProgress, ProgressRecordError> {
    match value {
        Value::Null => Ok(DecodedProgress::default()),
        Value::Object(entries) => Ok(decode_entries(
            entries.iter().map(|(k, v)| (k.as_str(), v)),
        )),
        _ => Err(ProgressRecordError::NotAnObject),
    }
}

/// Decode `(topic key, document)` pairs, keeping the valid ones.
pub fn decode_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a Value)>) -> DecodedProgress {
    let mut decoded = DecodedProgress::default();
    for (key, doc) in entries {
        let Ok(topic_id) = TopicId::new(key) else {
            decoded
                .rejected
                .push((key.to_owned(), ProgressRecordError::InvalidKey(key.to_owned())));
            continue;
        };
        match ProgressRecord::from_document(doc) {
            Ok(record) => {
                decoded.records.insert(topic_id, record);
            }
            Err(err) => decoded.rejected.push((key.to_owned(), err)),
        }
    }
    decoded
}

/// Serialize a progress map into its `{ topicId: record }` document.
#[must_use]
pub fn encode_progress_map(map: &ProgressMap) -> Value {
    let entries: Map<String, Value> = map
        .iter()
        .map(|(id, record)| (id.to_string(), record.to_document()))
        .collect();
    Value::Object(entries)
}

//
// ─── FIELD HELPERS ─────────────────────────────────────────────────────────────
//

struct BadField;

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn as_u64(value: &Value) -> Result<u64, BadField> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    match value.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
        _ => Err(BadField),
    }
}

fn as_u32(value: &Value) -> Result<u32, BadField> {
    u32::try_from(as_u64(value)?).map_err(|_| BadField)
}

fn optional_u32(obj: &Map<String, Value>, key: &str) -> Result<Option<u32>, BadField> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => as_u32(v).map(Some),
    }
}

fn optional_timestamp(obj: &Map<String, Value>, key: &str) -> Result<Option<Timestamp>, BadField> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => {
            let millis = i64::try_from(as_u64(v)?).map_err(|_| BadField)?;
            Ok(Some(Timestamp::from_millis(millis)))
        }
    }
}

fn decode_slot(value: &Value) -> Result<Option<u32>, ProgressRecordError> {
    match value {
        Value::Null => Ok(None),
        v => as_u32(v)
            .map(Some)
            .map_err(|_| ProgressRecordError::InvalidField("answers")),
    }
}

fn decode_answers(value: &Value) -> Result<Vec<Option<u32>>, ProgressRecordError> {
    const FIELD: &str = "answers";
    match value {
        Value::Array(items) => {
            if items.len() > MAX_ANSWER_SLOTS {
                return Err(ProgressRecordError::InvalidField(FIELD));
            }
            items.iter().map(decode_slot).collect()
        }
        // Sparse arrays come back from document stores as index-keyed objects.
        Value::Object(entries) => {
            let mut answers = Vec::new();
            for (key, slot) in entries {
                let index: usize = key
                    .parse()
                    .map_err(|_| ProgressRecordError::InvalidField(FIELD))?;
                if index >= MAX_ANSWER_SLOTS {
                    return Err(ProgressRecordError::InvalidField(FIELD));
                }
                if answers.len() <= index {
                    answers.resize(index + 1, None);
                }
                answers[index] = decode_slot(slot)?;
            }
            Ok(answers)
        }
        _ => Err(ProgressRecordError::InvalidField(FIELD)),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
