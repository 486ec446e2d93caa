// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-conversation buffering with a sliding idle timeout.
//!
//! Each conversation owns an ordered list of pending items and one armed
//! eviction timer. State is created on first append and destroyed on drain or
//! expiry. Mutation of a single conversation happens under its map shard lock,
//! so appends, drains, and timer expiry are serialized per conversation while
//! different conversations never contend on anything but the shard.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use casenote_core::types::{BufferedItem, ConversationId, MediaKind};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info};

/// Notification emitted when an idle timer clears a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    pub conversation_id: ConversationId,
    /// Number of items that were pending when the timer fired.
    pub discarded: usize,
}

struct ConversationState {
    pending: Vec<BufferedItem>,
    /// Identifies the timer armed by the most recent append.
    generation: u64,
    timer: AbortHandle,
}

/// In-memory registry of pending items keyed by conversation.
///
/// Must be used from within a Tokio runtime: every append spawns a timer task.
pub struct ConversationBuffer {
    conversations: Arc<DashMap<ConversationId, ConversationState>>,
    idle_timeout: Duration,
    generations: AtomicU64,
    evictions: mpsc::UnboundedSender<Eviction>,
}

impl ConversationBuffer {
    /// Creates an empty buffer and the receiving end of its eviction notices.
    pub fn new(idle_timeout: Duration) -> (Self, mpsc::UnboundedReceiver<Eviction>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let buffer = Self {
            conversations: Arc::new(DashMap::new()),
            idle_timeout,
            generations: AtomicU64::new(0),
            evictions: tx,
        };
        (buffer, rx)
    }

    /// Appends an item and re-arms the conversation's idle timer.
    ///
    /// Returns the number of items now pending.
    pub fn append(&self, conversation_id: &ConversationId, item: BufferedItem) -> usize {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;

        let mut entry = self
            .conversations
            .entry(conversation_id.clone())
            .or_insert_with(|| ConversationState {
                pending: Vec::new(),
                generation,
                timer: self.arm_timer(conversation_id.clone(), generation),
            });

        let state = entry.value_mut();
        if state.generation != generation {
            state.timer.abort();
            state.generation = generation;
            state.timer = self.arm_timer(conversation_id.clone(), generation);
        }
        state.pending.push(item);

        metrics::counter!("casenote_items_buffered_total").increment(1);
        state.pending.len()
    }

    /// Removes and returns everything pending for the conversation, in append order.
    ///
    /// Cancels the idle timer. Returns an empty list if nothing is pending.
    pub fn drain(&self, conversation_id: &ConversationId) -> Vec<BufferedItem> {
        match self.conversations.remove(conversation_id) {
            Some((_, state)) => {
                state.timer.abort();
                debug!(
                    conversation_id = %conversation_id,
                    items = state.pending.len(),
                    "buffer drained"
                );
                state.pending
            }
            None => Vec::new(),
        }
    }

    /// Removes and returns only the pending text notes, in append order.
    ///
    /// Media stays buffered with its timer untouched. A conversation left
    /// with nothing pending is destroyed like a full drain.
    pub fn drain_notes(&self, conversation_id: &ConversationId) -> Vec<BufferedItem> {
        let notes = match self.conversations.get_mut(conversation_id) {
            Some(mut state) => {
                let (notes, media): (Vec<_>, Vec<_>) = std::mem::take(&mut state.pending)
                    .into_iter()
                    .partition(|item| matches!(item, BufferedItem::Note(_)));
                state.pending = media;
                notes
            }
            None => return Vec::new(),
        };

        if let Some((_, state)) = self
            .conversations
            .remove_if(conversation_id, |_, s| s.pending.is_empty())
        {
            state.timer.abort();
        }
        if !notes.is_empty() {
            debug!(
                conversation_id = %conversation_id,
                notes = notes.len(),
                "notes drained for follow-up"
            );
        }
        notes
    }

    /// Number of items pending for the conversation.
    pub fn len(&self, conversation_id: &ConversationId) -> usize {
        self.conversations
            .get(conversation_id)
            .map_or(0, |state| state.pending.len())
    }

    /// Kinds of the pending items, in append order.
    pub fn kinds(&self, conversation_id: &ConversationId) -> Vec<MediaKind> {
        self.conversations
            .get(conversation_id)
            .map(|state| state.pending.iter().map(BufferedItem::kind).collect())
            .unwrap_or_default()
    }

    /// Number of conversations with pending items.
    pub fn active_conversations(&self) -> usize {
        self.conversations.len()
    }

    fn arm_timer(&self, conversation_id: ConversationId, generation: u64) -> AbortHandle {
        let conversations = Arc::clone(&self.conversations);
        let evictions = self.evictions.clone();
        let idle_timeout = self.idle_timeout;

        tokio::spawn(async move {
            tokio::time::sleep(idle_timeout).await;

            // A drain or a later append may have won the race; only the timer
            // armed by the latest append may evict.
            let Some((_, state)) =
                conversations.remove_if(&conversation_id, |_, s| s.generation == generation)
            else {
                return;
            };

            let discarded = state.pending.len();
            info!(
                conversation_id = %conversation_id,
                discarded,
                "buffer cleared due to inactivity"
            );
            metrics::counter!("casenote_buffer_evictions_total").increment(1);
            // The receiver may already be gone during shutdown.
            let _ = evictions.send(Eviction {
                conversation_id,
                discarded,
            });
        })
        .abort_handle()
    }
}

impl Drop for ConversationBuffer {
    fn drop(&mut self) {
        for state in self.conversations.iter() {
            state.timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tokio::time::Instant;

    const IDLE: Duration = Duration::from_secs(300);

    fn conv(id: &str) -> ConversationId {
        ConversationId::from(id)
    }

    fn note(text: &str) -> BufferedItem {
        BufferedItem::note(text)
    }

    #[tokio::test]
    async fn drain_returns_items_in_order_then_empty() {
        let (buffer, _rx) = ConversationBuffer::new(IDLE);
        let c = conv("1");
        buffer.append(&c, note("a"));
        buffer.append(&c, note("b"));
        assert_eq!(buffer.append(&c, note("c")), 3);

        assert_eq!(buffer.drain(&c), vec![note("a"), note("b"), note("c")]);
        assert!(buffer.drain(&c).is_empty());
        assert_eq!(buffer.active_conversations(), 0);
    }

    #[tokio::test]
    async fn append_after_drain_starts_fresh() {
        let (buffer, _rx) = ConversationBuffer::new(IDLE);
        let c = conv("1");
        buffer.append(&c, note("old"));
        buffer.drain(&c);
        buffer.append(&c, note("new"));
        assert_eq!(buffer.drain(&c), vec![note("new")]);
    }

    #[tokio::test]
    async fn conversations_are_isolated() {
        let (buffer, _rx) = ConversationBuffer::new(IDLE);
        buffer.append(&conv("1"), note("one"));
        buffer.append(&conv("2"), note("two"));

        assert_eq!(buffer.drain(&conv("1")), vec![note("one")]);
        assert_eq!(buffer.len(&conv("2")), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timeout_evicts_with_count() {
        let (buffer, mut rx) = ConversationBuffer::new(IDLE);
        let c = conv("7");
        buffer.append(&c, note("a"));
        buffer.append(&c, note("b"));

        let eviction = rx.recv().await.expect("eviction notice");
        assert_eq!(
            eviction,
            Eviction {
                conversation_id: c.clone(),
                discarded: 2
            }
        );
        assert!(buffer.drain(&c).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_a_sliding_window() {
        let (buffer, mut rx) = ConversationBuffer::new(IDLE);
        let c = conv("7");
        let start = Instant::now();

        buffer.append(&c, note("a"));
        tokio::time::sleep(Duration::from_secs(200)).await;
        buffer.append(&c, note("b"));
        tokio::time::sleep(Duration::from_secs(200)).await;
        // 400s after the first append, but only 200s after the last one.
        assert_eq!(buffer.len(&c), 2);
        assert!(rx.try_recv().is_err());

        let eviction = rx.recv().await.expect("eviction notice");
        assert_eq!(eviction.discarded, 2);
        assert!(start.elapsed() >= Duration::from_secs(500));
    }

    #[tokio::test(start_paused = true)]
    async fn drain_cancels_timer() {
        let (buffer, mut rx) = ConversationBuffer::new(IDLE);
        let c = conv("7");
        buffer.append(&c, note("a"));
        buffer.drain(&c);

        tokio::time::sleep(IDLE * 3).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timer_does_not_evict_new_buffer() {
        let (buffer, mut rx) = ConversationBuffer::new(IDLE);
        let c = conv("7");
        buffer.append(&c, note("a"));
        tokio::time::sleep(Duration::from_secs(299)).await;
        buffer.drain(&c);
        buffer.append(&c, note("b"));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(buffer.len(&c), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn kinds_follow_append_order() {
        let (buffer, _rx) = ConversationBuffer::new(IDLE);
        let c = conv("1");
        let image = BufferedItem::media(MediaKind::Image, "https://x/a.jpg", "image/jpeg").unwrap();
        buffer.append(&c, image);
        buffer.append(&c, note("n"));
        assert_eq!(buffer.kinds(&c), vec![MediaKind::Image, MediaKind::Text]);
    }

    #[tokio::test]
    async fn drain_notes_leaves_media_pending() {
        let (buffer, _rx) = ConversationBuffer::new(IDLE);
        let c = conv("1");
        let image = BufferedItem::media(MediaKind::Image, "https://x/a.jpg", "image/jpeg").unwrap();
        buffer.append(&c, note("first"));
        buffer.append(&c, image.clone());
        buffer.append(&c, note("second"));

        assert_eq!(buffer.drain_notes(&c), vec![note("first"), note("second")]);
        assert_eq!(buffer.drain(&c), vec![image]);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_notes_of_only_notes_cancels_timer() {
        let (buffer, mut rx) = ConversationBuffer::new(IDLE);
        let c = conv("1");
        buffer.append(&c, note("a"));

        assert_eq!(buffer.drain_notes(&c), vec![note("a")]);
        assert_eq!(buffer.active_conversations(), 0);
        assert!(buffer.drain_notes(&c).is_empty());

        tokio::time::sleep(IDLE * 2).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_are_drained_exactly_once() {
        const WRITERS: usize = 4;
        const PER_WRITER: usize = 250;

        let (buffer, _rx) = ConversationBuffer::new(IDLE);
        let buffer = Arc::new(buffer);
        let c = conv("shared");
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let drainer = {
            let buffer = Arc::clone(&buffer);
            let c = c.clone();
            let done = Arc::clone(&done);
            tokio::spawn(async move {
                let mut seen = Vec::new();
                while !done.load(Ordering::SeqCst) {
                    seen.extend(buffer.drain(&c));
                    tokio::task::yield_now().await;
                }
                seen
            })
        };

        let writers: Vec<_> = (0..WRITERS)
            .map(|w| {
                let buffer = Arc::clone(&buffer);
                let c = c.clone();
                tokio::spawn(async move {
                    for i in 0..PER_WRITER {
                        buffer.append(&c, note(&format!("{w}-{i}")));
                        if i % 16 == 0 {
                            tokio::task::yield_now().await;
                        }
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }
        done.store(true, Ordering::SeqCst);

        let mut seen = drainer.await.unwrap();
        seen.extend(buffer.drain(&c));

        assert_eq!(seen.len(), WRITERS * PER_WRITER);
        let texts: Vec<String> = seen
            .into_iter()
            .map(|item| match item {
                BufferedItem::Note(text) => text,
                other => panic!("unexpected item {other:?}"),
            })
            .collect();
        let unique: std::collections::HashSet<_> = texts.iter().collect();
        assert_eq!(unique.len(), texts.len());

        // Each writer's items come out in the order that writer appended them.
        for w in 0..WRITERS {
            let order: Vec<usize> = texts
                .iter()
                .filter_map(|t| t.strip_prefix(&format!("{w}-")))
                .map(|i| i.parse().unwrap())
                .collect();
            assert_eq!(order, (0..PER_WRITER).collect::<Vec<_>>());
        }
    }

    proptest! {
        #[test]
        fn drain_sees_exactly_prior_appends(
            batches in proptest::collection::vec(
                proptest::collection::vec("[a-z]{1,6}", 0..8),
                1..5,
            )
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            rt.block_on(async {
                let (buffer, _rx) = ConversationBuffer::new(IDLE);
                let c = conv("p");
                for batch in &batches {
                    for text in batch {
                        buffer.append(&c, note(text));
                    }
                    let expected: Vec<_> = batch.iter().map(|t| note(t)).collect();
                    prop_assert_eq!(buffer.drain(&c), expected);
                }
                prop_assert!(buffer.drain(&c).is_empty());
                Ok(())
            })?;
        }
    }
}
