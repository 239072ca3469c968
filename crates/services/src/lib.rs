#![forbid(unsafe_code)]

pub mod app_services;
pub mod auth;
pub mod catalog_service;
pub mod config;
pub mod context;
pub mod error;
pub mod progress_service;
pub mod sessions;

pub use quiz_core::Clock;
pub use sessions as session;

pub use app_services::AppServices;
pub use auth::{Account, AccountService, AuthProvider, InMemoryAuthProvider, SignUpForm};
pub use catalog_service::{CatalogService, TopicAction, TopicCard};
pub use config::{AppConfig, RemoteTarget};
pub use context::UserContext;
pub use error::{
    AccountError, AppServicesError, AuthFailure, ConfigError, DataLoadError, QuizError,
    SessionError, ValidationError,
};
pub use progress_service::{LoadOutcome, ProgressStore, RemoteStatus, RemoteSync, RemoteWrite};
pub use sessions::{AttemptResult, QuizService, QuizSession, SessionProgress, SessionState};
