use std::collections::BTreeMap;

use chrono::Utc;
use quiz_core::model::{TopicId, UserId};
use serde_json::Value;
use sqlx::Row;

use super::SqliteRepository;
use crate::repository::{RemoteScoreStore, StorageError, score_path, scores_prefix};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn parse_body(path: &str, body: &str) -> Result<Value, StorageError> {
    serde_json::from_str(body).map_err(|e| StorageError::Serialization(format!("{path}: {e}")))
}

#[async_trait::async_trait]
impl RemoteScoreStore for SqliteRepository {
    async fn read_score(
        &self,
        user: &UserId,
        topic: &TopicId,
    ) -> Result<Option<Value>, StorageError> {
        let path = score_path(user, topic);
        let row = sqlx::query("SELECT body FROM documents WHERE path = ?1")
            .bind(&path)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.map(|row| {
            let body: String = row.try_get("body").map_err(ser)?;
            parse_body(&path, &body)
        })
        .transpose()
    }

    async fn read_scores(&self, user: &UserId) -> Result<BTreeMap<String, Value>, StorageError> {
        let prefix = format!("{}/", scores_prefix(user));
        let rows = sqlx::query(
            r"
                SELECT path, body
                FROM documents
                WHERE substr(path, 1, length(?1)) = ?1
                ORDER BY path
            ",
        )
        .bind(&prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut scores = BTreeMap::new();
        for row in rows {
            let path: String = row.try_get("path").map_err(ser)?;
            let Some(key) = path.strip_prefix(&prefix).filter(|k| !k.contains('/')) else {
                continue;
            };
            let body: String = row.try_get("body").map_err(ser)?;
            scores.insert(key.to_owned(), parse_body(&path, &body)?);
        }
        Ok(scores)
    }

    async fn write_score(
        &self,
        user: &UserId,
        topic: &TopicId,
        document: &Value,
    ) -> Result<(), StorageError> {
        let body = serde_json::to_string(document).map_err(ser)?;
        sqlx::query(
            r"
                INSERT INTO documents (path, body, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(path) DO UPDATE SET
                    body = excluded.body,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(score_path(user, topic))
        .bind(body)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn delete_score(&self, user: &UserId, topic: &TopicId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM documents WHERE path = ?1")
            .bind(score_path(user, topic))
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
