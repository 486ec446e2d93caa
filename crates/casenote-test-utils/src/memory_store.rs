// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory context store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use casenote_core::CasenoteError;
use casenote_core::traits::{Adapter, ContextStore};
use casenote_core::types::{
    ConversationId, HealthStatus, MessageId, SynthesisRecord,
};

type Key = (ConversationId, MessageId);

/// A [`ContextStore`] backed by a map, with optional retention and a switch
/// that makes every call fail.
pub struct MemoryStore {
    records: Mutex<HashMap<Key, SynthesisRecord>>,
    retention: Option<Duration>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// A store that never expires records.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            retention: None,
            unavailable: AtomicBool::new(false),
        }
    }

    /// A store that hides records older than `retention`.
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            retention: Some(retention),
            ..Self::new()
        }
    }

    /// Makes every subsequent call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// All stored records, in no particular order.
    pub fn records(&self) -> Vec<SynthesisRecord> {
        self.records
            .lock()
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default()
    }

    fn check_available(&self) -> Result<(), CasenoteError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CasenoteError::Storage {
                source: "memory store marked unavailable".into(),
            });
        }
        Ok(())
    }

    fn is_expired(&self, record: &SynthesisRecord) -> bool {
        match self.retention.and_then(|r| chrono::Duration::from_std(r).ok()) {
            Some(retention) => Utc::now() - record.created_at >= retention,
            None => false,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Key, SynthesisRecord>>, CasenoteError> {
        self.records.lock().map_err(|_| CasenoteError::Storage {
            source: "memory store mutex poisoned".into(),
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for MemoryStore {
    fn name(&self) -> &str {
        "memory-store"
    }

    async fn health_check(&self) -> Result<HealthStatus, CasenoteError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Ok(HealthStatus::Unhealthy("marked unavailable".to_string()));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CasenoteError> {
        Ok(())
    }
}

#[async_trait]
impl ContextStore for MemoryStore {
    async fn put(&self, record: &SynthesisRecord) -> Result<(), CasenoteError> {
        self.check_available()?;
        self.lock()?.insert(
            (record.conversation_id.clone(), record.message_id.clone()),
            record.clone(),
        );
        Ok(())
    }

    async fn get(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<Option<SynthesisRecord>, CasenoteError> {
        self.check_available()?;
        let records = self.lock()?;
        Ok(records
            .get(&(conversation_id.clone(), message_id.clone()))
            .filter(|r| !self.is_expired(r))
            .cloned())
    }

    async fn purge_expired(&self) -> Result<usize, CasenoteError> {
        self.check_available()?;
        let mut records = self.lock()?;
        let before = records.len();
        records.retain(|_, r| !self.is_expired(r));
        Ok(before - records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casenote_core::types::SynthesisMode;

    fn record(message_id: &str, age: Duration) -> SynthesisRecord {
        SynthesisRecord {
            conversation_id: ConversationId::from("c"),
            message_id: MessageId::from(message_id),
            source_media: vec![],
            response_text: "text".into(),
            mode: SynthesisMode::Primary,
            created_at: Utc::now() - chrono::Duration::from_std(age).unwrap(),
        }
    }

    #[tokio::test]
    async fn put_then_get() {
        let store = MemoryStore::new();
        store.put(&record("m1", Duration::ZERO)).await.unwrap();
        let found = store
            .get(&ConversationId::from("c"), &MessageId::from("m1"))
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn retention_hides_and_purges_old_records() {
        let store = MemoryStore::with_retention(Duration::from_secs(60));
        store.put(&record("old", Duration::from_secs(120))).await.unwrap();
        store.put(&record("new", Duration::from_secs(1))).await.unwrap();

        let c = ConversationId::from("c");
        assert!(store.get(&c, &MessageId::from("old")).await.unwrap().is_none());
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn unavailable_store_errors() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(store
            .get(&ConversationId::from("c"), &MessageId::from("m"))
            .await
            .is_err());
    }
}
