//! Remote score store speaking the realtime-database REST dialect:
//! every path is addressable as `{base}/{path}.json`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use quiz_core::model::{TopicId, UserId};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;

use crate::repository::{RemoteScoreStore, StorageError, score_path, scores_prefix};

#[derive(Clone, Debug)]
pub struct RestConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub timeout: Duration,
}

impl RestConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
            timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.trim().is_empty());
        self
    }
}

#[derive(Clone)]
pub struct RestRemoteStore {
    client: Client,
    config: RestConfig,
}

impl RestRemoteStore {
    /// Build a store with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the HTTP client cannot be built.
    pub fn new(config: RestConfig) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn document_url(&self, path: &str) -> String {
        format!("{}/{path}.json", self.config.base_url.trim_end_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.auth_token {
            Some(token) => request.query(&[("auth", token)]),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StorageError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if !response.status().is_success() {
            return Err(StorageError::Status(response.status().as_u16()));
        }
        Ok(response)
    }

    async fn get_json(&self, path: &str) -> Result<Value, StorageError> {
        let response = self.send(self.client.get(self.document_url(path))).await;
        match response {
            Err(StorageError::Status(code)) if code == StatusCode::NOT_FOUND.as_u16() => {
                Ok(Value::Null)
            }
            Err(e) => Err(e),
            Ok(response) => response
                .json()
                .await
                .map_err(|e| StorageError::Serialization(e.to_string())),
        }
    }
}

#[async_trait]
impl RemoteScoreStore for RestRemoteStore {
    async fn read_score(
        &self,
        user: &UserId,
        topic: &TopicId,
    ) -> Result<Option<Value>, StorageError> {
        let doc = self.get_json(&score_path(user, topic)).await?;
        Ok((!doc.is_null()).then_some(doc))
    }

    async fn read_scores(&self, user: &UserId) -> Result<BTreeMap<String, Value>, StorageError> {
        collection_entries(self.get_json(&scores_prefix(user)).await?)
    }

    async fn write_score(
        &self,
        user: &UserId,
        topic: &TopicId,
        document: &Value,
    ) -> Result<(), StorageError> {
        let url = self.document_url(&score_path(user, topic));
        self.send(self.client.put(url).json(document)).await?;
        Ok(())
    }

    async fn delete_score(&self, user: &UserId, topic: &TopicId) -> Result<(), StorageError> {
        let url = self.document_url(&score_path(user, topic));
        self.send(self.client.delete(url)).await?;
        Ok(())
    }
}

/// Split a collection body into its children. An empty collection reads as `null`.
fn collection_entries(body: Value) -> Result<BTreeMap<String, Value>, StorageError> {
    match body {
        Value::Null => Ok(BTreeMap::new()),
        Value::Object(entries) => Ok(entries.into_iter().collect()),
        other => Err(StorageError::Serialization(format!(
            "expected an object of scores, got {other}"
        ))),
    }
}
