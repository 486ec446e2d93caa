// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the buffer, dispatcher, store, and transport adapters.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::CasenoteError;

/// Stable identifier of an isolated conversation (a chat id for Telegram).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Transport-assigned identifier of a single message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Kind of a buffered item.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Pdf,
    Audio,
    Video,
    Text,
}

/// A binary media reference waiting in a conversation buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    kind: MediaKind,
    locator: String,
    mime_type: String,
    caption: Option<String>,
}

impl MediaItem {
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Fetchable reference (URL). May embed transport credentials; never log it.
    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn caption(&self) -> Option<&str> {
        self.caption.as_deref()
    }
}

/// One pending piece of user input.
///
/// Binary kinds always carry a locator and a non-empty MIME type; text notes
/// carry only their literal content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferedItem {
    Media(MediaItem),
    Note(String),
}

impl BufferedItem {
    /// Builds a binary media item, rejecting the text kind and empty MIME types.
    pub fn media(
        kind: MediaKind,
        locator: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Result<Self, CasenoteError> {
        let locator = locator.into();
        let mime_type = mime_type.into();
        if kind == MediaKind::Text {
            return Err(CasenoteError::Internal(
                "text notes must be built with BufferedItem::note".into(),
            ));
        }
        if mime_type.trim().is_empty() {
            return Err(CasenoteError::Internal(format!(
                "{kind} item requires a MIME type"
            )));
        }
        if locator.trim().is_empty() {
            return Err(CasenoteError::Internal(format!(
                "{kind} item requires a locator"
            )));
        }
        Ok(Self::Media(MediaItem {
            kind,
            locator,
            mime_type,
            caption: None,
        }))
    }

    /// Builds a free-text note.
    pub fn note(text: impl Into<String>) -> Self {
        Self::Note(text.into())
    }

    /// Attaches a sender caption. No-op for text notes.
    pub fn with_caption(mut self, caption: Option<String>) -> Self {
        if let Self::Media(ref mut item) = self {
            item.caption = caption.filter(|c| !c.trim().is_empty());
        }
        self
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Media(item) => item.kind,
            Self::Note(_) => MediaKind::Text,
        }
    }

    /// Metadata-only description of this item for persisted records.
    pub fn summary(&self) -> SourceMedia {
        match self {
            Self::Media(item) => SourceMedia {
                kind: item.kind,
                mime_type: item.mime_type.clone(),
            },
            Self::Note(_) => SourceMedia {
                kind: MediaKind::Text,
                mime_type: "text/plain".to_string(),
            },
        }
    }
}

/// Operating mode that produced a synthesis. Follow-ups inherit it unchanged.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SynthesisMode {
    Primary,
    Secondary,
}

/// `{kind, mimeType}` pair describing one input of a synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMedia {
    pub kind: MediaKind,
    pub mime_type: String,
}

/// A persisted bot output, joined to threaded replies by `message_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisRecord {
    pub conversation_id: ConversationId,
    /// Identifier of the bot's own outbound message.
    pub message_id: MessageId,
    pub source_media: Vec<SourceMedia>,
    pub response_text: String,
    pub mode: SynthesisMode,
    pub created_at: DateTime<Utc>,
}

/// One AI-ready piece of request content.
#[derive(Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    InlineData { mime_type: String, data: Vec<u8> },
}

impl fmt::Debug for ContentPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::InlineData { mime_type, data } => f
                .debug_struct("InlineData")
                .field("mime_type", mime_type)
                .field("bytes", &data.len())
                .finish(),
        }
    }
}

/// A single request to the generative backend: an instruction profile plus content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Behavioral guidance text selecting the backend's operating persona.
    pub instruction: String,
    pub parts: Vec<ContentPart>,
}

/// Result of a backend call made through the credential pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    /// Zero-based position of the credential that answered.
    pub credential_index: usize,
    /// Failures recorded for earlier credentials, in pool order.
    pub failures: Vec<String>,
}

/// Content of an inbound transport event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundContent {
    /// Plain text (notes, trigger commands, follow-up replies).
    Text(String),
    /// A media message with a fetchable locator.
    Media {
        kind: MediaKind,
        locator: String,
        mime_type: String,
        caption: Option<String>,
    },
    /// Something the pipeline does not accept (e.g. a non-PDF document).
    Unsupported { description: String },
}

/// An inbound message received from a channel adapter.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: Option<String>,
    pub content: InboundContent,
    /// Identifier of the message this one replies to, if any.
    pub reply_to: Option<MessageId>,
    pub timestamp: DateTime<Utc>,
}

/// A single outbound text message. Callers split long text before sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub conversation_id: ConversationId,
    pub content: String,
    pub reply_to: Option<MessageId>,
}

/// Capabilities reported by a channel adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCapabilities {
    /// Longest single message, in UTF-16 code units.
    pub max_message_length: usize,
    pub supports_delete: bool,
}
