// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Context store trait for persisted synthesis records.

use async_trait::async_trait;

use crate::error::CasenoteError;
use crate::traits::adapter::Adapter;
use crate::types::{ConversationId, MessageId, SynthesisRecord};

/// Durable, time-expiring log of prior synthesis outputs.
///
/// Records older than the store's retention window are never returned.
#[async_trait]
pub trait ContextStore: Adapter {
    /// Persists a record, replacing any record with the same key.
    async fn put(&self, record: &SynthesisRecord) -> Result<(), CasenoteError>;

    /// Looks up the record for a bot message, if it exists and has not expired.
    async fn get(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<Option<SynthesisRecord>, CasenoteError>;

    /// Physically removes expired records. Returns how many were removed.
    async fn purge_expired(&self) -> Result<usize, CasenoteError>;
}
