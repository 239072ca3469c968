use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Characters that cannot appear in a document key segment.
const FORBIDDEN_KEY_CHARS: [char; 6] = ['/', '.', '#', '$', '[', ']'];

/// Identifier of a topic in the catalog; also a key segment in remote paths.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TopicId(String);

/// Identifier of a question, unique within its topic.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawQuestionId", into = "String")]
pub struct QuestionId(String);

/// Opaque identity of a signed-in user.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl TopicId {
    /// Creates a `TopicId` after validating it is usable as a key segment.
    ///
    /// # Errors
    ///
    /// Returns `ParseIdError` if the value is blank or contains a path separator.
    pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
        key_segment(id.into(), "TopicId").map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl QuestionId {
    /// Creates a `QuestionId`. Question ids key the mistakes map of remote
    /// documents, so they follow the same rules as topic ids.
    ///
    /// # Errors
    ///
    /// Returns `ParseIdError` if the value is blank or contains a path separator.
    pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
        key_segment(id.into(), "QuestionId").map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl UserId {
    /// Creates a `UserId` after validating it is usable as a key segment.
    ///
    /// # Errors
    ///
    /// Returns `ParseIdError` if the value is blank or contains a path separator.
    pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
        key_segment(id.into(), "UserId").map(Self)
    }

    /// Generates a fresh random user id (used by local auth providers).
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn key_segment(id: String, kind: &'static str) -> Result<String, ParseIdError> {
    if id.trim().is_empty() || id.trim() != id || id.contains(FORBIDDEN_KEY_CHARS) {
        return Err(ParseIdError::new(kind));
    }
    Ok(id)
}

/// Question ids show up as both strings and integers in content files.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawQuestionId {
    Text(String),
    Number(u64),
}

impl TryFrom<RawQuestionId> for QuestionId {
    type Error = ParseIdError;

    fn try_from(raw: RawQuestionId) -> Result<Self, Self::Error> {
        match raw {
            RawQuestionId::Text(s) => Self::new(s),
            RawQuestionId::Number(n) => Self::new(n.to_string()),
        }
    }
}

// ─── Conversions ───────────────────────────────────────────────────────────────

impl TryFrom<String> for TopicId {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for UserId {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TopicId> for String {
    fn from(id: TopicId) -> Self {
        id.0
    }
}

impl From<QuestionId> for String {
    fn from(id: QuestionId) -> Self {
        id.0
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl fmt::Debug for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TopicId({})", self.0)
    }
}

impl fmt::Debug for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuestionId({})", self.0)
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

/// Error type for parsing an ID from a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl ParseIdError {
    fn new(kind: &'static str) -> Self {
        Self { kind }
    }
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} value", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for TopicId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl FromStr for QuestionId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl FromStr for UserId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
