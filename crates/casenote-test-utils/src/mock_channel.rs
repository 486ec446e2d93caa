// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel adapter for deterministic testing.
//!
//! Inbound messages are injected, outbound messages are captured with the id
//! the channel assigned to them, and deletions are recorded.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use casenote_core::CasenoteError;
use casenote_core::traits::{Adapter, ChannelAdapter};
use casenote_core::types::{
    ChannelCapabilities, ConversationId, HealthStatus, InboundMessage, MessageId,
    OutboundMessage,
};

/// A mock messaging channel.
///
/// Sent messages get sequential ids `bot-1`, `bot-2`, ... so tests can reply
/// to them.
pub struct MockChannel {
    inbound: Arc<Mutex<VecDeque<InboundMessage>>>,
    notify: Arc<Notify>,
    sent: Arc<Mutex<Vec<(MessageId, OutboundMessage)>>>,
    deleted: Arc<Mutex<Vec<(ConversationId, MessageId)>>>,
    next_id: AtomicU64,
    max_message_length: usize,
    closed: AtomicBool,
    rejected_marker: Mutex<Option<String>>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            inbound: Arc::new(Mutex::new(VecDeque::new())),
            notify: Arc::new(Notify::new()),
            sent: Arc::new(Mutex::new(Vec::new())),
            deleted: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
            max_message_length: 4096,
            closed: AtomicBool::new(false),
            rejected_marker: Mutex::new(None),
        }
    }

    /// Overrides the reported maximum message length.
    pub fn with_max_message_length(mut self, max: usize) -> Self {
        self.max_message_length = max;
        self
    }

    /// Queue an inbound message for the next `receive()`.
    pub async fn inject_message(&self, msg: InboundMessage) {
        self.inbound.lock().await.push_back(msg);
        self.notify.notify_one();
    }

    /// Makes `receive()` fail with a "closed" error once the queue is empty.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Fails every later send whose content contains `marker`.
    ///
    /// Rejected messages are not recorded and consume no id.
    pub async fn reject_sends_containing(&self, marker: &str) {
        *self.rejected_marker.lock().await = Some(marker.to_string());
    }

    /// Contents of every sent message, in send order.
    pub async fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.iter().map(|(_, m)| m.clone()).collect()
    }

    /// Sent messages paired with their assigned ids.
    pub async fn sent_with_ids(&self) -> Vec<(MessageId, OutboundMessage)> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }

    /// Messages removed through `delete_message()`.
    pub async fn deleted(&self) -> Vec<(ConversationId, MessageId)> {
        self.deleted.lock().await.clone()
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
    }

    async fn health_check(&self) -> Result<HealthStatus, CasenoteError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CasenoteError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities {
            max_message_length: self.max_message_length,
            supports_delete: true,
        }
    }

    async fn connect(&mut self) -> Result<(), CasenoteError> {
        Ok(())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, CasenoteError> {
        if let Some(marker) = self.rejected_marker.lock().await.as_deref()
            && msg.content.contains(marker)
        {
            return Err(CasenoteError::Channel {
                message: "mock channel rejected the message".to_string(),
                source: None,
            });
        }
        let id = MessageId(format!(
            "bot-{}",
            self.next_id.fetch_add(1, Ordering::Relaxed)
        ));
        self.sent.lock().await.push((id.clone(), msg));
        Ok(id)
    }

    async fn receive(&self) -> Result<InboundMessage, CasenoteError> {
        loop {
            {
                let mut queue = self.inbound.lock().await;
                if let Some(msg) = queue.pop_front() {
                    return Ok(msg);
                }
            }
            if self.closed.load(Ordering::SeqCst) {
                return Err(CasenoteError::Channel {
                    message: "mock channel closed".to_string(),
                    source: None,
                });
            }
            self.notify.notified().await;
        }
    }

    async fn delete_message(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<(), CasenoteError> {
        self.deleted
            .lock()
            .await
            .push((conversation_id.clone(), message_id.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casenote_core::types::InboundContent;

    fn inbound(text: &str) -> InboundMessage {
        InboundMessage {
            id: MessageId::from("u-1"),
            conversation_id: ConversationId::from("c"),
            sender_id: Some("tester".to_string()),
            content: InboundContent::Text(text.to_string()),
            reply_to: None,
            timestamp: chrono::Utc::now(),
        }
    }

    fn outbound(text: &str) -> OutboundMessage {
        OutboundMessage {
            conversation_id: ConversationId::from("c"),
            content: text.to_string(),
            reply_to: None,
        }
    }

    #[tokio::test]
    async fn receive_returns_injected_in_order() {
        let channel = MockChannel::new();
        channel.inject_message(inbound("first")).await;
        channel.inject_message(inbound("second")).await;

        let a = channel.receive().await.unwrap();
        let b = channel.receive().await.unwrap();
        assert_eq!(a.content, InboundContent::Text("first".into()));
        assert_eq!(b.content, InboundContent::Text("second".into()));
    }

    #[tokio::test]
    async fn send_assigns_sequential_ids() {
        let channel = MockChannel::new();
        let first = channel.send(outbound("one")).await.unwrap();
        let second = channel.send(outbound("two")).await.unwrap();
        assert_eq!(first, MessageId::from("bot-1"));
        assert_eq!(second, MessageId::from("bot-2"));
        assert_eq!(channel.sent_count().await, 2);
    }

    #[tokio::test]
    async fn receive_waits_for_injection() {
        let channel = Arc::new(MockChannel::new());
        let injector = channel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            injector.inject_message(inbound("late")).await;
        });

        let msg = tokio::time::timeout(std::time::Duration::from_secs(2), channel.receive())
            .await
            .expect("receive timed out")
            .unwrap();
        assert_eq!(msg.content, InboundContent::Text("late".into()));
    }

    #[tokio::test]
    async fn closed_channel_errors_after_queue_drains() {
        let channel = MockChannel::new();
        channel.inject_message(inbound("last")).await;
        channel.close().await;

        assert!(channel.receive().await.is_ok());
        let err = channel.receive().await.unwrap_err();
        assert!(err.to_string().contains("closed"));
    }

    #[tokio::test]
    async fn deletions_are_recorded() {
        let channel = MockChannel::new();
        channel
            .delete_message(&ConversationId::from("c"), &MessageId::from("bot-9"))
            .await
            .unwrap();
        assert_eq!(channel.deleted().await.len(), 1);
    }
}
