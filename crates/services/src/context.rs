use std::sync::Arc;

use quiz_core::model::UserId;
use storage::repository::RemoteScoreStore;

/// Who is signed in and where their remote scores live.
///
/// Remote sync only happens when both are present.
#[derive(Clone, Default)]
pub struct UserContext {
    user: Option<UserId>,
    remote: Option<Arc<dyn RemoteScoreStore>>,
}

impl UserContext {
    /// No user, no remote: progress stays in the local cache.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(user: Option<UserId>, remote: Option<Arc<dyn RemoteScoreStore>>) -> Self {
        Self { user, remote }
    }

    #[must_use]
    pub fn signed_in(user: UserId, remote: Arc<dyn RemoteScoreStore>) -> Self {
        Self::new(Some(user), Some(remote))
    }

    #[must_use]
    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn with_user(mut self, user: Option<UserId>) -> Self {
        self.user = user;
        self
    }

    pub(crate) fn remote(&self) -> Option<(&UserId, &Arc<dyn RemoteScoreStore>)> {
        Some((self.user.as_ref()?, self.remote.as_ref()?))
    }
}

impl std::fmt::Debug for UserContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserContext")
            .field("user", &self.user)
            .field("remote", &self.remote.is_some())
            .finish()
    }
}
