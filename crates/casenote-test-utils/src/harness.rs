// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end intake tests.
//!
//! `TestHarness` wires an [`IntakeLoop`] to mock adapters and drives it one
//! inbound event at a time, waiting for spawned dispatches to settle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use casenote_agent::dispatcher::RequestDispatcher;
use casenote_agent::prompt::InstructionProfiles;
use casenote_agent::{IntakeLoop, IntakeSettings};
use casenote_core::CasenoteError;
use casenote_core::types::{
    ConversationId, InboundContent, InboundMessage, MediaKind, MessageId, OutboundMessage,
};

use crate::memory_store::MemoryStore;
use crate::mock_backend::ScriptedBackend;
use crate::mock_channel::MockChannel;
use crate::mock_media::{MockFetcher, MockSampler};

/// Instruction text the harness installs for the primary profile.
pub const PRIMARY_PROFILE: &str = "PRIMARY-PROFILE";
/// Instruction text the harness installs for the secondary profile.
pub const SECONDARY_PROFILE: &str = "SECONDARY-PROFILE";

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    backend: ScriptedBackend,
    fetcher: MockFetcher,
    sampler: MockSampler,
    store: MemoryStore,
    settings: IntakeSettings,
    max_message_length: usize,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            backend: ScriptedBackend::replying("SYNTHESIS"),
            fetcher: MockFetcher::new(),
            sampler: MockSampler::returning(vec![b"FRAME".to_vec()]),
            store: MemoryStore::new(),
            settings: IntakeSettings {
                acknowledge_items: false,
                ..IntakeSettings::default()
            },
            max_message_length: 4096,
        }
    }

    pub fn with_backend(mut self, backend: ScriptedBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Serves `bytes` for `locator`.
    pub fn with_file(mut self, locator: &str, bytes: Vec<u8>) -> Self {
        self.fetcher = self.fetcher.with(locator, bytes);
        self
    }

    pub fn with_sampler(mut self, sampler: MockSampler) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_store(mut self, store: MemoryStore) -> Self {
        self.store = store;
        self
    }

    /// Turns on per-item acknowledgements (off by default to keep transcripts short).
    pub fn with_acknowledgements(mut self) -> Self {
        self.settings.acknowledge_items = true;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.settings.idle_timeout = timeout;
        self
    }

    pub fn with_max_message_length(mut self, max: usize) -> Self {
        self.max_message_length = max;
        self
    }

    /// Must be called inside a Tokio runtime.
    pub fn build(self) -> TestHarness {
        let channel = Arc::new(MockChannel::new().with_max_message_length(self.max_message_length));
        let backend = Arc::new(self.backend);
        let store = Arc::new(self.store);
        let fetcher = Arc::new(self.fetcher);

        let dispatcher = RequestDispatcher::new(
            backend.clone(),
            fetcher.clone(),
            Arc::new(self.sampler.clone()),
            InstructionProfiles {
                primary: PRIMARY_PROFILE.to_string(),
                secondary: SECONDARY_PROFILE.to_string(),
            },
        );
        let intake = IntakeLoop::new(channel.clone(), store.clone(), dispatcher, self.settings);

        TestHarness {
            intake,
            channel,
            backend,
            store,
            fetcher,
            sampler: self.sampler,
            conversation_id: ConversationId::from("conversation-1"),
            next_id: AtomicU64::new(1),
        }
    }
}

/// A wired intake loop plus handles to every mock behind it.
pub struct TestHarness {
    pub intake: IntakeLoop,
    pub channel: Arc<MockChannel>,
    pub backend: Arc<ScriptedBackend>,
    pub store: Arc<MemoryStore>,
    pub fetcher: Arc<MockFetcher>,
    pub sampler: MockSampler,
    conversation_id: ConversationId,
    next_id: AtomicU64,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// The conversation every harness message belongs to.
    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// Sends a text message and waits for any dispatch it starts.
    pub async fn send_text(&mut self, text: &str) -> Result<MessageId, CasenoteError> {
        self.deliver(InboundContent::Text(text.to_string()), None).await
    }

    /// Sends a text reply to an earlier message.
    pub async fn reply_text(
        &mut self,
        text: &str,
        reply_to: &MessageId,
    ) -> Result<MessageId, CasenoteError> {
        self.deliver(
            InboundContent::Text(text.to_string()),
            Some(reply_to.clone()),
        )
        .await
    }

    /// Sends a media message.
    pub async fn send_media(
        &mut self,
        kind: MediaKind,
        locator: &str,
        mime_type: &str,
        caption: Option<&str>,
    ) -> Result<MessageId, CasenoteError> {
        self.deliver(
            InboundContent::Media {
                kind,
                locator: locator.to_string(),
                mime_type: mime_type.to_string(),
                caption: caption.map(str::to_string),
            },
            None,
        )
        .await
    }

    /// Sends arbitrary content, optionally as a reply.
    pub async fn deliver(
        &mut self,
        content: InboundContent,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, CasenoteError> {
        let id = MessageId(format!(
            "user-{}",
            self.next_id.fetch_add(1, Ordering::Relaxed)
        ));
        let inbound = InboundMessage {
            id: id.clone(),
            conversation_id: self.conversation_id.clone(),
            sender_id: Some("clinician".to_string()),
            content,
            reply_to,
            timestamp: chrono::Utc::now(),
        };
        self.intake.handle_inbound(inbound).await?;
        self.intake.settle().await;
        Ok(id)
    }

    /// Sent messages paired with their ids.
    pub async fn sent(&self) -> Vec<(MessageId, OutboundMessage)> {
        self.channel.sent_with_ids().await
    }

    /// The most recent bot message, if any.
    pub async fn last_sent(&self) -> Option<(MessageId, OutboundMessage)> {
        self.sent().await.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn harness_round_trip() {
        let mut harness = TestHarness::builder()
            .with_file("https://f/a", b"A".to_vec())
            .build();
        harness
            .send_media(MediaKind::Image, "https://f/a", "image/jpeg", None)
            .await
            .unwrap();
        harness.send_text(".").await.unwrap();

        assert_eq!(harness.backend.call_count(), 1);
        let (_, last) = harness.last_sent().await.unwrap();
        assert_eq!(last.content, "SYNTHESIS");
    }
}
