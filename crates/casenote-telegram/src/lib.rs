// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram transport adapter for Casenote.
//!
//! Implements [`ChannelAdapter`] for the Telegram Bot API via teloxide: long
//! polling for inbound messages, file link resolution for media, plain-text
//! replies threaded to the triggering message, and deletion of interim notices.

pub mod handler;
pub mod media;

use async_trait::async_trait;
use casenote_config::model::TelegramConfig;
use casenote_core::CasenoteError;
use casenote_core::traits::{Adapter, ChannelAdapter};
use casenote_core::types::{
    ChannelCapabilities, ConversationId, HealthStatus, InboundContent,
    InboundMessage, MessageId, OutboundMessage,
};
use teloxide::prelude::*;
use teloxide::types::{ChatId, ReplyParameters};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::handler::Extracted;

/// Telegram's per-message text limit, in UTF-16 code units.
pub const MAX_MESSAGE_LENGTH: usize = 4096;

/// Telegram channel adapter implementing [`ChannelAdapter`].
pub struct TelegramChannel {
    bot: Bot,
    inbound_rx: tokio::sync::Mutex<mpsc::Receiver<InboundMessage>>,
    inbound_tx: mpsc::Sender<InboundMessage>,
    polling_handle: Option<tokio::task::JoinHandle<()>>,
}

impl TelegramChannel {
    /// Creates a new Telegram channel adapter. Requires `config.bot_token`.
    pub fn new(config: &TelegramConfig) -> Result<Self, CasenoteError> {
        let token = config
            .bot_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                CasenoteError::Config("telegram.bot_token is required for Telegram adapter".into())
            })?;

        let bot = Bot::new(token);
        let (inbound_tx, inbound_rx) = mpsc::channel(100);

        Ok(Self {
            bot,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            inbound_tx,
            polling_handle: None,
        })
    }
}

/// Turns a raw message into inbound content, resolving file links.
///
/// A file that cannot be resolved (too large for the Bot API, revoked) is
/// reported as unsupported so the sender gets a notice instead of silence.
async fn to_content(bot: &Bot, msg: &Message) -> Option<InboundContent> {
    let content = match handler::extract(msg)? {
        Extracted::Text(text) => InboundContent::Text(text),
        Extracted::Unsupported(description) => InboundContent::Unsupported { description },
        Extracted::File {
            kind,
            file_id,
            mime_type,
            caption,
        } => match media::resolve_file_url(bot, &file_id).await {
            Ok(locator) => InboundContent::Media {
                kind,
                locator,
                mime_type,
                caption,
            },
            Err(e) => {
                warn!(chat_id = msg.chat.id.0, kind = %kind, error = %e, "file link resolution failed");
                InboundContent::Unsupported {
                    description: format!("this {kind} (the file could not be retrieved)"),
                }
            }
        },
    };
    Some(content)
}

fn parse_chat_id(conversation_id: &ConversationId) -> Result<ChatId, CasenoteError> {
    conversation_id
        .0
        .parse::<i64>()
        .map(ChatId)
        .map_err(|e| CasenoteError::Channel {
            message: format!("invalid chat id {conversation_id}: {e}"),
            source: None,
        })
}

fn parse_message_id(message_id: &MessageId) -> Result<teloxide::types::MessageId, CasenoteError> {
    message_id
        .0
        .parse::<i32>()
        .map(teloxide::types::MessageId)
        .map_err(|e| CasenoteError::Channel {
            message: format!("invalid message id {message_id}: {e}"),
            source: None,
        })
}

#[async_trait]
impl Adapter for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn health_check(&self) -> Result<HealthStatus, CasenoteError> {
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), CasenoteError> {
        debug!("Telegram channel shutting down");
        if let Some(handle) = &self.polling_handle {
            handle.abort();
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for TelegramChannel {
    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities {
            max_message_length: MAX_MESSAGE_LENGTH,
            supports_delete: true,
        }
    }

    async fn connect(&mut self) -> Result<(), CasenoteError> {
        if self.polling_handle.is_some() {
            return Ok(());
        }

        let bot = self.bot.clone();
        let tx = self.inbound_tx.clone();

        info!("starting Telegram long polling");

        let handle = tokio::spawn(async move {
            let handler = Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
                let tx = tx.clone();
                async move {
                    match to_content(&bot, &msg).await {
                        Some(content) => {
                            let inbound = handler::to_inbound_message(&msg, content);
                            if tx.send(inbound).await.is_err() {
                                warn!("inbound channel closed, dropping message");
                            }
                        }
                        None => debug!(msg_id = msg.id.0, "ignoring unsupported message type"),
                    }
                    respond(())
                }
            });

            Dispatcher::builder(bot, handler)
                .default_handler(|_| async {})
                .build()
                .dispatch()
                .await;
        });

        self.polling_handle = Some(handle);
        Ok(())
    }

    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, CasenoteError> {
        let chat_id = parse_chat_id(&msg.conversation_id)?;

        let mut request = self.bot.send_message(chat_id, msg.content);
        if let Some(reply_to) = &msg.reply_to {
            request = request.reply_parameters(
                ReplyParameters::new(parse_message_id(reply_to)?).allow_sending_without_reply(),
            );
        }

        let sent = request.await.map_err(|e| {
            metrics::counter!("casenote_telegram_send_failures_total").increment(1);
            CasenoteError::Channel {
                message: format!("failed to send message: {e}"),
                source: Some(Box::new(e)),
            }
        })?;

        Ok(MessageId(sent.id.0.to_string()))
    }

    async fn receive(&self) -> Result<InboundMessage, CasenoteError> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv().await.ok_or_else(|| CasenoteError::Channel {
            message: "Telegram inbound channel closed".into(),
            source: None,
        })
    }

    async fn delete_message(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<(), CasenoteError> {
        let chat_id = parse_chat_id(conversation_id)?;
        let message_id = parse_message_id(message_id)?;
        self.bot
            .delete_message(chat_id, message_id)
            .await
            .map_err(|e| CasenoteError::Channel {
                message: format!("failed to delete message: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(())
    }
}
