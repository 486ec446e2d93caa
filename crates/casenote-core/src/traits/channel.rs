// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait for the chat transport (Telegram, test doubles).

use async_trait::async_trait;

use crate::error::CasenoteError;
use crate::traits::adapter::Adapter;
use crate::types::{
    ChannelCapabilities, ConversationId, InboundMessage, MessageId, OutboundMessage,
};

/// Adapter for the bidirectional chat transport.
///
/// The transport delivers inbound events with already-resolved file links and
/// sends single outbound messages; splitting long text is the caller's job.
#[async_trait]
pub trait ChannelAdapter: Adapter {
    /// Returns the capabilities supported by this channel.
    fn capabilities(&self) -> ChannelCapabilities;

    /// Establishes a connection to the messaging platform.
    async fn connect(&mut self) -> Result<(), CasenoteError>;

    /// Sends one message and returns the identifier the platform assigned to it.
    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, CasenoteError>;

    /// Receives the next inbound message from the channel.
    async fn receive(&self) -> Result<InboundMessage, CasenoteError>;

    /// Deletes a previously sent message (used for interim "processing" notices).
    async fn delete_message(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<(), CasenoteError>;
}
