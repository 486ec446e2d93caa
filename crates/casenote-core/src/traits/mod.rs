// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Adapters extend the [`Adapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod channel;
pub mod media;
pub mod provider;
pub mod store;

pub use adapter::Adapter;
pub use channel::ChannelAdapter;
pub use media::{FrameSource, MediaFetcher};
pub use provider::{GenerativeBackend, ProviderAdapter};
pub use store::ContextStore;
