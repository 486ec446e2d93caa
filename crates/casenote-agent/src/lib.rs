// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation buffering, request dispatch, and the intake loop.
//!
//! The [`IntakeLoop`] is the orchestrator that:
//! - Receives events from a channel adapter
//! - Buffers media and notes per conversation
//! - Drains and dispatches a buffer when a trigger arrives
//! - Routes replies to earlier syntheses into follow-up dispatches
//! - Delivers results in transport-sized chunks and persists them

pub mod buffer;
pub mod classifier;
pub mod command;
pub mod delivery;
pub mod dispatcher;
pub mod prompt;
pub mod shutdown;

use std::sync::Arc;
use std::time::Duration;

use casenote_config::model::CasenoteConfig;
use casenote_core::error::CasenoteError;
use casenote_core::traits::{Adapter, ChannelAdapter, ContextStore};
use casenote_core::types::{
    BufferedItem, ConversationId, InboundContent, InboundMessage, MediaKind, MessageId,
    OutboundMessage, SynthesisRecord,
};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::buffer::{ConversationBuffer, Eviction};
use crate::command::{Command, Trigger};
use crate::dispatcher::{DispatchRequest, RequestDispatcher};

/// How long shutdown waits for in-flight dispatches.
const DISPATCH_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

const HELP_TEXT: &str = "Send photos, PDFs, voice notes, audio, video, or text notes. \
They are collected until you send a trigger:\n\
.  synthesize everything collected\n\
.N  same, sampling videos at N frames per second (e.g. .2 or .0.5)\n\
..  synthesize, then produce a second-stage summary\n\
..N  chained, with a sampling rate\n\
/status  show what is collected\n\
/clear  discard what is collected\n\
Reply to a synthesis to ask about it or correct it.";

/// Runtime knobs of the intake loop.
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeSettings {
    pub idle_timeout: Duration,
    pub acknowledge_items: bool,
    pub default_frame_rate: f32,
    pub max_frame_rate: f32,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self::from(&CasenoteConfig::default())
    }
}

impl From<&CasenoteConfig> for IntakeSettings {
    fn from(config: &CasenoteConfig) -> Self {
        Self {
            idle_timeout: Duration::from_secs(config.buffer.idle_timeout_secs),
            acknowledge_items: config.buffer.acknowledge_items,
            default_frame_rate: config.sampler.default_frame_rate,
            max_frame_rate: config.sampler.max_frame_rate,
        }
    }
}

/// Everything a spawned dispatch needs to deliver and persist its result.
#[derive(Clone)]
struct Delivery {
    channel: Arc<dyn ChannelAdapter>,
    store: Arc<dyn ContextStore>,
    dispatcher: Arc<RequestDispatcher>,
}

/// Wires transport events to the buffer, the dispatcher, and the store.
pub struct IntakeLoop {
    delivery: Delivery,
    buffer: ConversationBuffer,
    evictions: mpsc::UnboundedReceiver<Eviction>,
    dispatches: JoinSet<()>,
    settings: IntakeSettings,
}

impl IntakeLoop {
    pub fn new(
        channel: Arc<dyn ChannelAdapter>,
        store: Arc<dyn ContextStore>,
        dispatcher: RequestDispatcher,
        settings: IntakeSettings,
    ) -> Self {
        let (buffer, evictions) = ConversationBuffer::new(settings.idle_timeout);
        info!(
            channel = channel.name(),
            idle_timeout_secs = settings.idle_timeout.as_secs(),
            "intake loop initialized"
        );

        Self {
            delivery: Delivery {
                channel,
                store,
                dispatcher: Arc::new(dispatcher),
            },
            buffer,
            evictions,
            dispatches: JoinSet::new(),
            settings,
        }
    }

    /// Runs until the token is cancelled or the channel closes, then drains
    /// in-flight dispatches.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), CasenoteError> {
        info!("intake loop running");

        loop {
            tokio::select! {
                msg = self.delivery.channel.receive() => {
                    match msg {
                        Ok(inbound) => {
                            if let Err(e) = self.handle_inbound(inbound).await {
                                error!(error = %e, "failed to handle inbound message");
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "channel receive error");
                            if e.to_string().contains("closed") {
                                break;
                            }
                        }
                    }
                }
                Some(eviction) = self.evictions.recv() => {
                    self.notify_eviction(eviction).await;
                }
                Some(joined) = self.dispatches.join_next(), if !self.dispatches.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "dispatch task failed");
                    }
                }
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping intake loop");
                    break;
                }
            }
        }

        shutdown::drain_dispatches(&mut self.dispatches, DISPATCH_DRAIN_TIMEOUT).await;
        info!("intake loop stopped");
        Ok(())
    }

    /// Handles one inbound event.
    ///
    /// Buffer and store decisions happen before this returns; the backend
    /// round trip and delivery run on a spawned task (see [`Self::settle`]).
    pub async fn handle_inbound(&mut self, inbound: InboundMessage) -> Result<(), CasenoteError> {
        let conversation_id = inbound.conversation_id.clone();
        debug!(
            conversation_id = %conversation_id,
            message_id = %inbound.id,
            "handling inbound message"
        );

        match inbound.content {
            InboundContent::Text(text) => {
                self.handle_text(&conversation_id, inbound.id, inbound.reply_to, text)
                    .await
            }
            InboundContent::Media {
                kind,
                locator,
                mime_type,
                caption,
            } => {
                let item = BufferedItem::media(kind, locator, mime_type)?.with_caption(caption);
                self.buffer_item(&conversation_id, &inbound.id, item).await
            }
            InboundContent::Unsupported { description } => {
                debug!(conversation_id = %conversation_id, "rejecting unsupported content");
                self.reply(
                    &conversation_id,
                    Some(inbound.id),
                    format!(
                        "Not accepted: {description}. Send images, PDF documents, audio, \
                         video, or text."
                    ),
                )
                .await
            }
        }
    }

    /// Waits for every spawned dispatch to finish.
    pub async fn settle(&mut self) {
        while let Some(joined) = self.dispatches.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "dispatch task failed");
            }
        }
    }

    /// Delivers pending idle-timeout notices without blocking.
    pub async fn flush_evictions(&mut self) {
        while let Ok(eviction) = self.evictions.try_recv() {
            self.notify_eviction(eviction).await;
        }
    }

    /// The conversation buffer, for inspection.
    pub fn buffer(&self) -> &ConversationBuffer {
        &self.buffer
    }

    async fn handle_text(
        &mut self,
        conversation_id: &ConversationId,
        message_id: MessageId,
        reply_to: Option<MessageId>,
        text: String,
    ) -> Result<(), CasenoteError> {
        if let Some(command) = command::parse_command(&text) {
            return self.handle_command(conversation_id, message_id, command).await;
        }

        if let Some(replied) = reply_to
            && let Some(prior) = self.lookup(conversation_id, &replied).await
        {
            // Notes sent since the synthesis belong to this follow-up; media
            // keeps waiting for a trigger.
            let attachments = self.buffer.drain_notes(conversation_id);
            let request = DispatchRequest::FollowUp {
                prior,
                text,
                attachments,
                frame_rate: self.settings.default_frame_rate,
            };
            self.spawn_dispatch(conversation_id.clone(), message_id, request, 0)
                .await;
            return Ok(());
        }

        self.buffer_item(conversation_id, &message_id, BufferedItem::note(text))
            .await
    }

    async fn handle_command(
        &mut self,
        conversation_id: &ConversationId,
        message_id: MessageId,
        command: Command,
    ) -> Result<(), CasenoteError> {
        match command {
            Command::Trigger(trigger) => self.trigger(conversation_id, message_id, trigger).await,
            Command::Clear => {
                let discarded = self.buffer.drain(conversation_id).len();
                info!(conversation_id = %conversation_id, discarded, "buffer cleared on request");
                self.reply(
                    conversation_id,
                    Some(message_id),
                    format!("Cleared {}.", count_items(discarded)),
                )
                .await
            }
            Command::Status => {
                let kinds = self.buffer.kinds(conversation_id);
                let text = if kinds.is_empty() {
                    "Nothing buffered.".to_string()
                } else {
                    format!("{} pending: {}", count_items(kinds.len()), describe_kinds(&kinds))
                };
                self.reply(conversation_id, Some(message_id), text).await
            }
            Command::Help => {
                self.reply(conversation_id, Some(message_id), HELP_TEXT.to_string())
                    .await
            }
        }
    }

    async fn trigger(
        &mut self,
        conversation_id: &ConversationId,
        message_id: MessageId,
        trigger: Trigger,
    ) -> Result<(), CasenoteError> {
        let items = self.buffer.drain(conversation_id);
        if items.is_empty() {
            return self
                .reply(
                    conversation_id,
                    Some(message_id),
                    "Nothing buffered. Send media or notes first, then a trigger.".to_string(),
                )
                .await;
        }

        let frame_rate =
            trigger.effective_rate(self.settings.default_frame_rate, self.settings.max_frame_rate);
        let count = items.len();
        info!(
            conversation_id = %conversation_id,
            items = count,
            mode = ?trigger.mode,
            frame_rate,
            "trigger received"
        );

        let request = DispatchRequest::Fresh {
            items,
            mode: trigger.mode,
            frame_rate,
        };
        self.spawn_dispatch(conversation_id.clone(), message_id, request, count)
            .await;
        Ok(())
    }

    /// Store failures fail closed: they read as "no prior synthesis".
    async fn lookup(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Option<SynthesisRecord> {
        match self.delivery.store.get(conversation_id, message_id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(
                    conversation_id = %conversation_id,
                    error = %e,
                    "context lookup failed, treating reply as a note"
                );
                None
            }
        }
    }

    async fn buffer_item(
        &mut self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        item: BufferedItem,
    ) -> Result<(), CasenoteError> {
        let kind = item.kind();
        let pending = self.buffer.append(conversation_id, item);
        debug!(conversation_id = %conversation_id, %kind, pending, "item buffered");

        if self.settings.acknowledge_items {
            self.reply(
                conversation_id,
                Some(message_id.clone()),
                format!("Added {kind}. {} pending.", count_items(pending)),
            )
            .await?;
        }
        Ok(())
    }

    async fn spawn_dispatch(
        &mut self,
        conversation_id: ConversationId,
        trigger_id: MessageId,
        request: DispatchRequest,
        items: usize,
    ) {
        let notice = match items {
            0 => "Working on it...".to_string(),
            n => format!("Processing {}...", count_items(n)),
        };
        // The notice is cosmetic; a failed send must not block the dispatch.
        let notice_id = match self
            .delivery
            .channel
            .send(OutboundMessage {
                conversation_id: conversation_id.clone(),
                content: notice,
                reply_to: Some(trigger_id.clone()),
            })
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "failed to send processing notice");
                None
            }
        };

        let delivery = self.delivery.clone();
        self.dispatches.spawn(async move {
            delivery
                .run(conversation_id, trigger_id, notice_id, request)
                .await;
        });
    }

    async fn notify_eviction(&self, eviction: Eviction) {
        let text = format!(
            "Buffer cleared due to inactivity: {} discarded.",
            count_items(eviction.discarded)
        );
        if let Err(e) = self.reply(&eviction.conversation_id, None, text).await {
            warn!(error = %e, "failed to send inactivity notice");
        }
    }

    async fn reply(
        &self,
        conversation_id: &ConversationId,
        reply_to: Option<MessageId>,
        content: String,
    ) -> Result<(), CasenoteError> {
        self.delivery
            .channel
            .send(OutboundMessage {
                conversation_id: conversation_id.clone(),
                content,
                reply_to,
            })
            .await
            .map(|_| ())
    }
}

impl Delivery {
    /// Runs one dispatch and reports the result: chunks on success, exactly
    /// one explanatory reply on failure.
    async fn run(
        self,
        conversation_id: ConversationId,
        trigger_id: MessageId,
        notice_id: Option<MessageId>,
        request: DispatchRequest,
    ) {
        let result = self.dispatcher.process(request).await;

        if let Some(notice_id) = notice_id
            && self.channel.capabilities().supports_delete
            && let Err(e) = self.channel.delete_message(&conversation_id, &notice_id).await
        {
            debug!(error = %e, "failed to delete processing notice");
        }

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(conversation_id = %conversation_id, error = %e, "dispatch failed");
                let text = format!("Sorry, the request could not be completed: {e}");
                if let Err(e) = self
                    .send(&conversation_id, Some(trigger_id), text)
                    .await
                {
                    error!(error = %e, "failed to send failure notice");
                }
                return;
            }
        };

        let max_len = self.channel.capabilities().max_message_length;
        let chunks = delivery::split_message(&outcome.text, max_len);
        let chunks = if chunks.is_empty() {
            vec!["(The model returned an empty response.)".to_string()]
        } else {
            chunks
        };

        let mut delivered = 0;
        for chunk in chunks {
            let message_id = match self
                .send(&conversation_id, Some(trigger_id.clone()), chunk)
                .await
            {
                Ok(id) => id,
                Err(e) => {
                    error!(error = %e, "failed to deliver synthesis chunk");
                    break;
                }
            };
            delivered += 1;

            let record = SynthesisRecord {
                conversation_id: conversation_id.clone(),
                message_id,
                source_media: outcome.source_media.clone(),
                response_text: outcome.text.clone(),
                mode: outcome.mode,
                created_at: chrono::Utc::now(),
            };
            if let Err(e) = self.store.put(&record).await {
                warn!(error = %e, "failed to persist synthesis record");
            }
        }

        if delivered == 0 {
            let text = "Sorry, the response was generated but could not be delivered.".to_string();
            if let Err(e) = self.send(&conversation_id, Some(trigger_id), text).await {
                error!(error = %e, "failed to send delivery failure notice");
            }
            return;
        }

        info!(
            conversation_id = %conversation_id,
            kind = outcome.kind.as_str(),
            mode = %outcome.mode,
            chunks = delivered,
            calls = outcome.backend_calls,
            "synthesis delivered"
        );
    }

    async fn send(
        &self,
        conversation_id: &ConversationId,
        reply_to: Option<MessageId>,
        content: String,
    ) -> Result<MessageId, CasenoteError> {
        self.channel
            .send(OutboundMessage {
                conversation_id: conversation_id.clone(),
                content,
                reply_to,
            })
            .await
    }
}

fn count_items(n: usize) -> String {
    match n {
        1 => "1 item".to_string(),
        n => format!("{n} items"),
    }
}

fn describe_kinds(kinds: &[MediaKind]) -> String {
    kinds
        .iter()
        .map(MediaKind::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
