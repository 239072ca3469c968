//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{ProgressRecordError, QuestionError, TopicId};
use storage::content::ContentError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by a `QuizSession` when an operation does not fit its state.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("operation `{operation}` is not allowed while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
    #[error("option {index} does not exist on the current question ({options} options)")]
    InvalidOption { index: u32, options: usize },
    #[error(transparent)]
    Progress(#[from] ProgressRecordError),
}

/// Static content could not be turned into something to show.
///
/// Always non-fatal: the caller renders `user_message` and keeps the catalog reachable.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DataLoadError {
    #[error("no topic selected")]
    NoTopicSelected,
    #[error("topic `{0}` is not in the catalog")]
    UnknownTopic(TopicId),
    #[error(transparent)]
    Content(#[from] ContentError),
}

impl DataLoadError {
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NoTopicSelected => "No topic selected. Please go back to the topic list.",
            Self::UnknownTopic(_) => {
                "This topic is not available. Please go back to the topic list."
            }
            Self::Content(ContentError::Question(QuestionError::Empty(_))) => {
                "There are no questions for this topic."
            }
            Self::Content(ContentError::UnknownTopic(_)) => "The question file was not found.",
            Self::Content(_) => "Could not load the questions. Please try again.",
        }
    }
}

/// Input rejected before it reaches the authentication provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("Please enter your name.")]
    EmptyName,
}

/// Provider failures, classified into a fixed vocabulary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthFailure {
    #[error("auth/email-already-in-use")]
    EmailAlreadyInUse,
    #[error("auth/invalid-email")]
    InvalidEmail,
    #[error("auth/weak-password")]
    WeakPassword,
    #[error("auth/user-not-found")]
    UserNotFound,
    #[error("auth/wrong-password")]
    WrongPassword,
    #[error("auth/network-request-failed")]
    NetworkRequestFailed,
    #[error("{0}")]
    Other(String),
}

impl AuthFailure {
    /// Classify a provider error code; unknown codes pass through as `Other`.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "auth/email-already-in-use" => Self::EmailAlreadyInUse,
            "auth/invalid-email" => Self::InvalidEmail,
            "auth/weak-password" => Self::WeakPassword,
            "auth/user-not-found" => Self::UserNotFound,
            "auth/wrong-password" => Self::WrongPassword,
            "auth/network-request-failed" => Self::NetworkRequestFailed,
            other => Self::Other(other.to_owned()),
        }
    }

    #[must_use]
    pub fn user_message(&self) -> &str {
        match self {
            Self::EmailAlreadyInUse => "This email is already in use.",
            Self::InvalidEmail => "Invalid email address.",
            Self::WeakPassword => "The password must be at least 6 characters.",
            Self::UserNotFound => "There is no user with this email.",
            Self::WrongPassword => "Wrong password.",
            Self::NetworkRequestFailed => "Network error. Please try again.",
            Self::Other(message) => message,
        }
    }
}

/// Errors emitted by `AccountService`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AccountError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Auth(#[from] AuthFailure),
}

impl AccountError {
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::Auth(e) => e.user_message().to_owned(),
        }
    }
}

/// Invalid configuration values.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid remote url `{url}`: {message}")]
    InvalidRemoteUrl { url: String, message: String },
    #[error("unsupported remote scheme `{0}` (expected sqlite, http or https)")]
    UnsupportedScheme(String),
    #[error("invalid user id: {0}")]
    InvalidUser(#[from] quiz_core::model::ParseIdError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Top-level failure taxonomy of the quiz platform.
///
/// Remote sync problems only ever show up here when a caller asks to see them;
/// the progress store itself degrades to local-only.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizError {
    #[error(transparent)]
    DataLoad(#[from] DataLoadError),
    #[error("remote sync failed: {0}")]
    RemoteSync(#[from] StorageError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Auth(#[from] AuthFailure),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<AccountError> for QuizError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation(e) => Self::Validation(e),
            AccountError::Auth(e) => Self::Auth(e),
        }
    }
}
