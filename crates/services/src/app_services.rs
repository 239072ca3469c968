use std::sync::Arc;

use quiz_core::model::UserId;
use storage::content::{ContentSource, DirectoryContent};
use storage::file_cache::FileCache;
use storage::repository::{LocalCache, RemoteScoreStore, Storage};
use storage::rest::{RestConfig, RestRemoteStore};
use storage::sqlite::SqliteRepository;

use crate::Clock;
use crate::auth::AccountService;
use crate::catalog_service::CatalogService;
use crate::config::{AppConfig, RemoteTarget};
use crate::context::UserContext;
use crate::error::{AppServicesError, DataLoadError};
use crate::progress_service::{LoadOutcome, ProgressStore, RemoteStatus};
use crate::sessions::QuizService;

/// Assembles app-facing services from configuration.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    context: UserContext,
    catalog: Arc<CatalogService>,
    quiz: Arc<QuizService>,
    remote_unavailable: Option<String>,
}

impl AppServices {
    /// Build services over the configured cache file, content directory and remote.
    ///
    /// A remote that cannot be opened is logged and left out; progress then
    /// stays on this device and `progress_store` reports the remote as failed.
    pub async fn from_config(config: &AppConfig, clock: Clock) -> Self {
        let cache: Arc<dyn LocalCache> = Arc::new(FileCache::open(&config.cache_path));
        let content: Arc<dyn ContentSource> = Arc::new(DirectoryContent::new(&config.content_dir));

        let mut storage = Storage::new(cache);
        let mut remote_unavailable = None;
        if let Some(target) = &config.remote {
            match open_remote(target).await {
                Ok(remote) => storage = storage.with_remote(remote),
                Err(err) => {
                    tracing::warn!(error = %err, "remote store unavailable, progress stays local");
                    remote_unavailable = Some(err.to_string());
                }
            }
        }
        if storage.remote.is_some() && config.user.is_none() {
            tracing::info!("remote configured but no user signed in, progress stays local");
        }

        let mut services = Self::new(storage, content, clock, config.user.clone());
        services.remote_unavailable = remote_unavailable;
        services
    }

    /// Wire services over already-built storage.
    #[must_use]
    pub fn new(
        storage: Storage,
        content: Arc<dyn ContentSource>,
        clock: Clock,
        user: Option<UserId>,
    ) -> Self {
        let context = UserContext::new(user, storage.remote.clone());
        let catalog = Arc::new(CatalogService::new(
            Arc::clone(&content),
            Arc::clone(&storage.cache),
        ));
        let quiz = Arc::new(QuizService::new(clock, content, Arc::clone(&storage.cache)));
        Self {
            storage,
            context,
            catalog,
            quiz,
            remote_unavailable: None,
        }
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn context(&self) -> &UserContext {
        &self.context
    }

    /// Sync progress as whoever is signed in to `accounts` from now on.
    ///
    /// Stores already handed out keep the user they were built with.
    pub fn follow_account(&mut self, accounts: &AccountService) {
        self.context = accounts.user_context(&self.context);
        tracing::debug!(user = ?self.context.user(), "progress context updated");
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<CatalogService> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn quiz(&self) -> Arc<QuizService> {
        Arc::clone(&self.quiz)
    }

    /// Load the catalog and reconcile progress for the current user.
    ///
    /// # Errors
    ///
    /// Returns `DataLoadError` if the catalog cannot be loaded. Remote problems,
    /// including a remote that could not be opened, are reported in the
    /// `LoadOutcome` instead.
    pub async fn progress_store(&self) -> Result<(ProgressStore, LoadOutcome), DataLoadError> {
        let catalog = self.catalog.load_catalog().await?;
        let mut store = ProgressStore::new(
            catalog,
            Arc::clone(&self.storage.cache),
            self.context.clone(),
        );
        let mut outcome = store.load().await;
        if let (RemoteStatus::Skipped, Some(err), Some(_)) = (
            &outcome.remote,
            &self.remote_unavailable,
            self.context.user(),
        ) {
            outcome.remote = RemoteStatus::Failed(err.clone());
        }
        Ok((store, outcome))
    }
}

async fn open_remote(target: &RemoteTarget) -> Result<Arc<dyn RemoteScoreStore>, AppServicesError> {
    match target {
        RemoteTarget::Sqlite(url) => {
            let repo = SqliteRepository::open(url).await?;
            tracing::info!(url = %url, "using sqlite remote store");
            Ok(Arc::new(repo))
        }
        RemoteTarget::Rest {
            base_url,
            auth_token,
        } => {
            let config = RestConfig::new(base_url.as_str()).with_auth_token(auth_token.clone());
            let store = RestRemoteStore::new(config)?;
            tracing::info!(url = %base_url, "using REST remote store");
            Ok(Arc::new(store))
        }
    }
}
