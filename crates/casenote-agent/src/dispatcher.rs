// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request dispatch: item resolution, mode selection, and prompt submission.
//!
//! A single [`RequestDispatcher::process`] call runs exactly one of four
//! modes and yields exactly one result:
//!
//! - fresh-primary: resolved items under the primary profile.
//! - fresh-chained: the primary output fed to a second call under the
//!   secondary profile.
//! - follow-up-question / follow-up-correction: a reply to a prior record,
//!   run under the profile of the prior record's mode.

use std::sync::Arc;

use casenote_core::error::CasenoteError;
use casenote_core::traits::{FrameSource, GenerativeBackend, MediaFetcher};
use casenote_core::types::{
    BufferedItem, ContentPart, Generation, GenerationRequest, MediaItem, MediaKind, SourceMedia,
    SynthesisMode, SynthesisRecord,
};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::classifier::{self, FollowUpKind};
use crate::prompt::{self, InstructionProfiles, ManifestEntry};

/// How a fresh trigger is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshMode {
    /// One call under the primary profile.
    Primary,
    /// Primary call, then a secondary call over its output.
    Chained,
}

/// The branch a dispatch actually took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKind {
    FreshPrimary,
    FreshChained,
    FollowUpQuestion,
    FollowUpCorrection,
}

impl DispatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FreshPrimary => "fresh_primary",
            Self::FreshChained => "fresh_chained",
            Self::FollowUpQuestion => "follow_up_question",
            Self::FollowUpCorrection => "follow_up_correction",
        }
    }
}

/// Input to a single dispatch.
#[derive(Debug, Clone)]
pub enum DispatchRequest {
    /// Drained buffer contents plus the trigger's mode and sampling rate.
    Fresh {
        items: Vec<BufferedItem>,
        mode: FreshMode,
        frame_rate: f32,
    },
    /// A threaded reply to a prior synthesis.
    FollowUp {
        prior: SynthesisRecord,
        text: String,
        /// Items attached to the same turn. Only these are resolved.
        attachments: Vec<BufferedItem>,
        frame_rate: f32,
    },
}

/// Result of a dispatch, ready to be delivered and persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub text: String,
    /// Mode tag for the record: `secondary` for chained, inherited for follow-ups.
    pub mode: SynthesisMode,
    pub kind: DispatchKind,
    pub source_media: Vec<SourceMedia>,
    /// Number of backend calls made.
    pub backend_calls: usize,
}

/// A buffered item after download and expansion.
#[derive(Debug)]
enum ResolvedItem {
    Note(String),
    Attached {
        summary: SourceMedia,
        caption: Option<String>,
        parts: Vec<ContentPart>,
    },
}

/// Resolved items, still in submission order.
#[derive(Debug, Default)]
struct Resolution {
    parts: Vec<ContentPart>,
    manifest: Vec<ManifestEntry>,
    notes: Vec<String>,
    sources: Vec<SourceMedia>,
}

impl FromIterator<ResolvedItem> for Resolution {
    fn from_iter<I: IntoIterator<Item = ResolvedItem>>(iter: I) -> Self {
        let mut resolution = Resolution::default();
        for item in iter {
            match item {
                ResolvedItem::Note(text) => {
                    resolution.sources.push(SourceMedia {
                        kind: MediaKind::Text,
                        mime_type: "text/plain".to_string(),
                    });
                    resolution.manifest.push(ManifestEntry::Note(text.clone()));
                    resolution.notes.push(text);
                }
                ResolvedItem::Attached {
                    summary,
                    caption,
                    parts,
                } => {
                    resolution.manifest.push(ManifestEntry::Attached {
                        kind: summary.kind,
                        parts: parts.len(),
                        caption: caption.clone(),
                    });
                    if let Some(caption) = caption {
                        resolution.notes.push(caption);
                    }
                    resolution.sources.push(summary);
                    resolution.parts.extend(parts);
                }
            }
        }
        resolution
    }
}

/// Turns buffered items and prior context into backend requests.
pub struct RequestDispatcher {
    backend: Arc<dyn GenerativeBackend>,
    fetcher: Arc<dyn MediaFetcher>,
    sampler: Arc<dyn FrameSource>,
    profiles: InstructionProfiles,
}

impl RequestDispatcher {
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        fetcher: Arc<dyn MediaFetcher>,
        sampler: Arc<dyn FrameSource>,
        profiles: InstructionProfiles,
    ) -> Self {
        Self {
            backend,
            fetcher,
            sampler,
            profiles,
        }
    }

    /// Runs one dispatch to completion.
    ///
    /// Per-item resolution failures drop the item; only backend failures
    /// surface as errors.
    pub async fn process(&self, request: DispatchRequest) -> Result<DispatchOutcome, CasenoteError> {
        let result = match request {
            DispatchRequest::Fresh {
                items,
                mode,
                frame_rate,
            } => self.fresh(items, mode, frame_rate).await,
            DispatchRequest::FollowUp {
                prior,
                text,
                attachments,
                frame_rate,
            } => self.follow_up(prior, &text, attachments, frame_rate).await,
        };

        match &result {
            Ok(outcome) => {
                metrics::counter!("casenote_dispatch_total", "mode" => outcome.kind.as_str())
                    .increment(1);
            }
            Err(_) => metrics::counter!("casenote_dispatch_failures_total").increment(1),
        }
        result
    }

    async fn fresh(
        &self,
        items: Vec<BufferedItem>,
        mode: FreshMode,
        frame_rate: f32,
    ) -> Result<DispatchOutcome, CasenoteError> {
        let submitted = items.len();
        let resolution = self.resolve(items, frame_rate).await;
        info!(
            submitted,
            resolved = resolution.manifest.len(),
            parts = resolution.parts.len(),
            ?mode,
            "dispatching fresh synthesis"
        );

        let mut parts = resolution.parts;
        parts.push(ContentPart::Text(prompt::fresh_prompt(&resolution.manifest)));

        let primary = self
            .submit(GenerationRequest {
                instruction: self.profiles.primary.clone(),
                parts,
            })
            .await?;

        match mode {
            FreshMode::Primary => Ok(DispatchOutcome {
                text: primary.text,
                mode: SynthesisMode::Primary,
                kind: DispatchKind::FreshPrimary,
                source_media: resolution.sources,
                backend_calls: 1,
            }),
            FreshMode::Chained => {
                let secondary = self
                    .submit(GenerationRequest {
                        instruction: self.profiles.secondary.clone(),
                        parts: vec![ContentPart::Text(prompt::chained_prompt(&primary.text))],
                    })
                    .await?;
                Ok(DispatchOutcome {
                    text: secondary.text,
                    mode: SynthesisMode::Secondary,
                    kind: DispatchKind::FreshChained,
                    source_media: resolution.sources,
                    backend_calls: 2,
                })
            }
        }
    }

    async fn follow_up(
        &self,
        prior: SynthesisRecord,
        text: &str,
        attachments: Vec<BufferedItem>,
        frame_rate: f32,
    ) -> Result<DispatchOutcome, CasenoteError> {
        let follow_up = classifier::classify(text);
        let resolution = if attachments.is_empty() {
            Resolution::default()
        } else {
            self.resolve(attachments, frame_rate).await
        };

        info!(
            conversation_id = %prior.conversation_id,
            kind = %follow_up,
            mode = %prior.mode,
            attachments = resolution.manifest.len(),
            "dispatching follow-up"
        );

        let (prompt, kind) = match follow_up {
            FollowUpKind::Question => (
                prompt::question_prompt(&prior.response_text, &resolution.notes, text),
                DispatchKind::FollowUpQuestion,
            ),
            FollowUpKind::Correction => (
                prompt::correction_prompt(&prior.response_text, &resolution.notes, text),
                DispatchKind::FollowUpCorrection,
            ),
        };

        let mut parts = resolution.parts;
        parts.push(ContentPart::Text(prompt));

        let generation = self
            .submit(GenerationRequest {
                instruction: self.profiles.for_mode(prior.mode).to_string(),
                parts,
            })
            .await?;

        let mut source_media = prior.source_media;
        source_media.extend(resolution.sources);

        Ok(DispatchOutcome {
            text: generation.text,
            mode: prior.mode,
            kind,
            source_media,
            backend_calls: 1,
        })
    }

    async fn submit(&self, request: GenerationRequest) -> Result<Generation, CasenoteError> {
        let generation = self.backend.call(&request).await?;
        if !generation.failures.is_empty() {
            warn!(
                credential = generation.credential_index + 1,
                failures = generation.failures.len(),
                "request succeeded after credential fallback"
            );
        }
        Ok(generation)
    }

    /// Resolves every item concurrently, then reassembles in submission order.
    async fn resolve(&self, items: Vec<BufferedItem>, frame_rate: f32) -> Resolution {
        join_all(
            items
                .into_iter()
                .enumerate()
                .map(|(index, item)| self.resolve_item(index, item, frame_rate)),
        )
        .await
        .into_iter()
        .flatten()
        .collect()
    }

    async fn resolve_item(
        &self,
        index: usize,
        item: BufferedItem,
        frame_rate: f32,
    ) -> Option<ResolvedItem> {
        let media = match item {
            BufferedItem::Note(text) => return Some(ResolvedItem::Note(text)),
            BufferedItem::Media(media) => media,
        };

        match self.resolve_media(&media, frame_rate).await {
            Ok(parts) => {
                debug!(index, kind = %media.kind(), parts = parts.len(), "item resolved");
                Some(ResolvedItem::Attached {
                    summary: SourceMedia {
                        kind: media.kind(),
                        mime_type: media.mime_type().to_string(),
                    },
                    caption: media.caption().map(str::to_string),
                    parts,
                })
            }
            Err(e) => {
                warn!(index, kind = %media.kind(), error = %e, "dropping unresolvable item");
                None
            }
        }
    }

    async fn resolve_media(
        &self,
        media: &MediaItem,
        frame_rate: f32,
    ) -> Result<Vec<ContentPart>, CasenoteError> {
        let bytes = self.fetcher.fetch(media.locator()).await?;

        if media.kind() != MediaKind::Video {
            return Ok(vec![ContentPart::InlineData {
                mime_type: media.mime_type().to_string(),
                data: bytes,
            }]);
        }

        let frames = self.sampler.sample(&bytes, frame_rate).await?;
        Ok(frames
            .into_iter()
            .map(|data| ContentPart::InlineData {
                mime_type: "image/jpeg".to_string(),
                data,
            })
            .collect())
    }
}
