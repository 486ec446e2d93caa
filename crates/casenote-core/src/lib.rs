// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Casenote intake pipeline.
//!
//! This crate provides the error type, the shared data model, and the adapter
//! traits that the buffer, dispatcher, store, and transport crates meet at.

pub mod error;
pub mod traits;
pub mod types;

pub use error::CasenoteError;
pub use types::{
    BufferedItem, ContentPart, ConversationId, HealthStatus, MediaKind, MessageId,
    SynthesisMode, SynthesisRecord,
};

pub use traits::{
    Adapter, ChannelAdapter, ContextStore, FrameSource, GenerativeBackend, MediaFetcher,
    ProviderAdapter,
};
