// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`ContextStore`] trait.

use std::time::Duration;

use async_trait::async_trait;
use casenote_config::model::StoreConfig;
use casenote_core::types::{ConversationId, HealthStatus, MessageId, SynthesisRecord};
use casenote_core::{Adapter, CasenoteError, ContextStore};
use chrono::Utc;
use tracing::debug;

use crate::database::{Database, map_tr_err};
use crate::queries::records;

/// SQLite-backed context store with a fixed retention window.
///
/// Expiry is enforced on read: `get` never returns a record older than the
/// retention window, whether or not the background purge has removed it yet.
pub struct SqliteContextStore {
    db: Database,
    retention: Duration,
}

impl SqliteContextStore {
    /// Opens the database named by `config` and applies migrations.
    pub async fn open(config: &StoreConfig) -> Result<Self, CasenoteError> {
        let db = Database::open(&config.database_path).await?;
        Ok(Self::new(db, Duration::from_secs(config.retention_secs)))
    }

    pub fn new(db: Database, retention: Duration) -> Self {
        Self { db, retention }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    fn cutoff_millis(&self) -> i64 {
        let retention = i64::try_from(self.retention.as_millis()).unwrap_or(i64::MAX);
        Utc::now().timestamp_millis().saturating_sub(retention)
    }
}

#[async_trait]
impl Adapter for SqliteContextStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn health_check(&self) -> Result<HealthStatus, CasenoteError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CasenoteError> {
        self.db.clone().close().await
    }
}

#[async_trait]
impl ContextStore for SqliteContextStore {
    async fn put(&self, record: &SynthesisRecord) -> Result<(), CasenoteError> {
        records::upsert_record(&self.db, record).await?;
        debug!(
            conversation_id = %record.conversation_id,
            message_id = %record.message_id,
            mode = %record.mode,
            "synthesis record stored"
        );
        Ok(())
    }

    async fn get(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<Option<SynthesisRecord>, CasenoteError> {
        records::get_record(&self.db, conversation_id, message_id, self.cutoff_millis()).await
    }

    async fn purge_expired(&self) -> Result<usize, CasenoteError> {
        records::delete_created_before(&self.db, self.cutoff_millis()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casenote_core::types::SynthesisMode;
    use tempfile::tempdir;

    async fn store(retention: Duration) -> (SqliteContextStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = StoreConfig {
            database_path: dir.path().join("store.db").to_string_lossy().into_owned(),
            retention_secs: retention.as_secs(),
            ..StoreConfig::default()
        };
        (SqliteContextStore::open(&config).await.unwrap(), dir)
    }

    fn record(message_id: &str, age: chrono::Duration) -> SynthesisRecord {
        SynthesisRecord {
            conversation_id: ConversationId::from("chat-1"),
            message_id: MessageId::from(message_id),
            source_media: vec![],
            response_text: "synthesis".into(),
            mode: SynthesisMode::Primary,
            created_at: Utc::now() - age,
        }
    }

    #[tokio::test]
    async fn fresh_record_is_retrievable() {
        let (store, _dir) = store(Duration::from_secs(1800)).await;
        store.put(&record("7", chrono::Duration::minutes(29))).await.unwrap();

        let found = store
            .get(&ConversationId::from("chat-1"), &MessageId::from("7"))
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn expired_record_is_invisible_before_purge() {
        let (store, _dir) = store(Duration::from_secs(1800)).await;
        store.put(&record("7", chrono::Duration::minutes(31))).await.unwrap();

        let found = store
            .get(&ConversationId::from("chat-1"), &MessageId::from("7"))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn purge_removes_expired_rows_only() {
        let (store, _dir) = store(Duration::from_secs(1800)).await;
        store.put(&record("old", chrono::Duration::minutes(45))).await.unwrap();
        store.put(&record("new", chrono::Duration::minutes(1))).await.unwrap();

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn health_check_reports_healthy() {
        let (store, _dir) = store(Duration::from_secs(60)).await;
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
    }
}
