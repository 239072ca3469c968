use std::env;
use std::path::PathBuf;

use quiz_core::model::UserId;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_CONTENT_DIR: &str = "data";
pub const DEFAULT_CACHE_PATH: &str = "quiz-cache.json";

/// Where remote score documents live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteTarget {
    /// `SQLite` document table, addressed by an sqlx connection URL.
    Sqlite(String),
    /// Realtime-database REST endpoint.
    Rest { base_url: Url, auth_token: Option<String> },
}

impl RemoteTarget {
    /// Classify a remote URL by scheme.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL does not parse or uses another scheme.
    pub fn parse(raw: &str, auth_token: Option<String>) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw.starts_with("sqlite:") {
            return Ok(Self::Sqlite(raw.to_owned()));
        }
        let url = Url::parse(raw).map_err(|e| ConfigError::InvalidRemoteUrl {
            url: raw.to_owned(),
            message: e.to_string(),
        })?;
        match url.scheme() {
            "http" | "https" => Ok(Self::Rest {
                base_url: url,
                auth_token: auth_token.filter(|t| !t.trim().is_empty()),
            }),
            other => Err(ConfigError::UnsupportedScheme(other.to_owned())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub content_dir: PathBuf,
    pub cache_path: PathBuf,
    pub remote: Option<RemoteTarget>,
    pub user: Option<UserId>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            content_dir: PathBuf::from(DEFAULT_CONTENT_DIR),
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            remote: None,
            user: None,
        }
    }
}

impl AppConfig {
    /// Read `QUIZ_*` variables, falling back to defaults for unset ones.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an invalid remote URL or user id.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an invalid remote URL or user id.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let remote = set("QUIZ_REMOTE_URL")
            .map(|url| RemoteTarget::parse(&url, set("QUIZ_REMOTE_TOKEN")))
            .transpose()?;
        let user = set("QUIZ_USER_ID").map(UserId::new).transpose()?;

        Ok(Self {
            content_dir: set("QUIZ_CONTENT_DIR").map_or(defaults.content_dir, PathBuf::from),
            cache_path: set("QUIZ_CACHE_PATH").map_or(defaults.cache_path, PathBuf::from),
            remote,
            user,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn remote_scheme_selects_adapter() {
        let config = AppConfig::from_lookup(lookup(&[
            ("QUIZ_REMOTE_URL", "https://quiz.example.test"),
            ("QUIZ_REMOTE_TOKEN", "secret"),
            ("QUIZ_USER_ID", "u1"),
        ]))
        .unwrap();
        assert!(matches!(
            config.remote,
            Some(RemoteTarget::Rest { auth_token: Some(ref t), .. }) if t == "secret"
        ));
        assert_eq!(config.user.unwrap().as_str(), "u1");

        let sqlite = RemoteTarget::parse("sqlite://scores.db", None).unwrap();
        assert_eq!(sqlite, RemoteTarget::Sqlite("sqlite://scores.db".into()));
    }

    #[test]
    fn bad_remote_values_are_rejected() {
        assert!(matches!(
            RemoteTarget::parse("ftp://example.test", None),
            Err(ConfigError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            RemoteTarget::parse("not a url", None),
            Err(ConfigError::InvalidRemoteUrl { .. })
        ));
        assert!(AppConfig::from_lookup(lookup(&[("QUIZ_USER_ID", "a/b")])).is_err());
    }
}
