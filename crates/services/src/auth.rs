use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use quiz_core::model::UserId;

use crate::context::UserContext;
use crate::error::{AccountError, AuthFailure, ValidationError};

const MIN_PASSWORD_LEN: usize = 6;

/// A signed-in account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub user_id: UserId,
    pub email: String,
    pub display_name: Option<String>,
}

/// Sign-up input as typed into the form.
#[derive(Debug, Clone, Default)]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl SignUpForm {
    /// Checks the provider does not do itself.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyName` for a blank name.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(())
    }
}

/// External identity provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns an `AuthFailure` classified from the provider's answer.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Account, AuthFailure>;

    /// # Errors
    ///
    /// Returns an `AuthFailure` classified from the provider's answer.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Account, AuthFailure>;

    /// # Errors
    ///
    /// Returns an `AuthFailure` classified from the provider's answer.
    async fn sign_out(&self) -> Result<(), AuthFailure>;

    fn current_account(&self) -> Option<Account>;
}

//
// ─── IN-MEMORY PROVIDER ────────────────────────────────────────────────────────
//

struct StoredAccount {
    password: String,
    account: Account,
}

#[derive(Default)]
struct Accounts {
    by_email: HashMap<String, StoredAccount>,
    current: Option<Account>,
}

/// Provider keeping accounts in process memory, for development and tests.
#[derive(Clone, Default)]
pub struct InMemoryAuthProvider {
    inner: Arc<Mutex<Accounts>>,
}

impl InMemoryAuthProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_accounts<T>(
        &self,
        f: impl FnOnce(&mut Accounts) -> Result<T, AuthFailure>,
    ) -> Result<T, AuthFailure> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|e| AuthFailure::Other(e.to_string()))?;
        f(&mut guard)
    }
}

fn normalize_email(email: &str) -> Result<String, AuthFailure> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AuthFailure::InvalidEmail),
    }
}

#[async_trait]
impl AuthProvider for InMemoryAuthProvider {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Account, AuthFailure> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthFailure::WeakPassword);
        }
        self.with_accounts(|accounts| {
            if accounts.by_email.contains_key(&email) {
                return Err(AuthFailure::EmailAlreadyInUse);
            }
            let account = Account {
                user_id: UserId::generate(),
                email: email.clone(),
                display_name: Some(display_name.trim().to_owned()),
            };
            accounts.by_email.insert(
                email,
                StoredAccount {
                    password: password.to_owned(),
                    account: account.clone(),
                },
            );
            accounts.current = Some(account.clone());
            Ok(account)
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Account, AuthFailure> {
        let email = normalize_email(email)?;
        self.with_accounts(|accounts| {
            let stored = accounts
                .by_email
                .get(&email)
                .ok_or(AuthFailure::UserNotFound)?;
            if stored.password != password {
                return Err(AuthFailure::WrongPassword);
            }
            let account = stored.account.clone();
            accounts.current = Some(account.clone());
            Ok(account)
        })
    }

    async fn sign_out(&self) -> Result<(), AuthFailure> {
        self.with_accounts(|accounts| {
            accounts.current = None;
            Ok(())
        })
    }

    fn current_account(&self) -> Option<Account> {
        self.inner
            .lock()
            .ok()
            .and_then(|accounts| accounts.current.clone())
    }
}

//
// ─── ACCOUNT SERVICE ───────────────────────────────────────────────────────────
//

/// Sign-up, sign-in and sign-out on top of an `AuthProvider`.
///
/// A failed call leaves the signed-in account as it was.
#[derive(Clone)]
pub struct AccountService {
    provider: Arc<dyn AuthProvider>,
}

impl AccountService {
    #[must_use]
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self { provider }
    }

    /// Validate the form, then create the account.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Validation` before contacting the provider, or
    /// `AccountError::Auth` for provider failures.
    pub async fn sign_up(&self, form: &SignUpForm) -> Result<Account, AccountError> {
        form.validate()?;
        let account = self
            .provider
            .sign_up(&form.email, &form.password, &form.name)
            .await
            .inspect_err(|err| tracing::warn!(code = %err, "sign-up rejected"))?;
        tracing::info!(user = %account.user_id, "account created");
        Ok(account)
    }

    /// # Errors
    ///
    /// Returns `AccountError::Auth` for provider failures.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Account, AccountError> {
        let account = self
            .provider
            .sign_in(email, password)
            .await
            .inspect_err(|err| tracing::warn!(code = %err, "sign-in rejected"))?;
        tracing::info!(user = %account.user_id, "signed in");
        Ok(account)
    }

    /// # Errors
    ///
    /// Returns `AccountError::Auth` for provider failures.
    pub async fn sign_out(&self) -> Result<(), AccountError> {
        let user = self.provider.current_account().map(|a| a.user_id);
        self.provider.sign_out().await?;
        tracing::info!(user = ?user, "signed out");
        Ok(())
    }

    #[must_use]
    pub fn current_account(&self) -> Option<Account> {
        self.provider.current_account()
    }

    /// `context` with its user replaced by the current account, or cleared
    /// when nobody is signed in.
    #[must_use]
    pub fn user_context(&self, context: &UserContext) -> UserContext {
        context
            .clone()
            .with_user(self.current_account().map(|a| a.user_id))
    }
}
