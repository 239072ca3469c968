#![forbid(unsafe_code)]

pub mod content;
pub mod file_cache;
pub mod repository;
pub mod rest;
pub mod sqlite;

pub use content::{ContentError, ContentSource, DirectoryContent, StaticContent};
pub use file_cache::FileCache;
pub use repository::{
    CURRENT_TOPIC_KEY, InMemoryRemoteStore, LocalCache, MemoryCache, PROGRESS_KEY,
    RemoteScoreStore, Storage, StorageError,
};
pub use rest::{RestConfig, RestRemoteStore};
pub use sqlite::{SqliteInitError, SqliteRepository};
