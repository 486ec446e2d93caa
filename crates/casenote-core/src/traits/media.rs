// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media resolution traits: downloading locators and sampling video frames.

use async_trait::async_trait;

use crate::error::CasenoteError;

/// Downloads the bytes behind a buffered item's locator.
#[async_trait]
pub trait MediaFetcher: Send + Sync + 'static {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, CasenoteError>;
}

/// Turns a video into a bounded, chronologically ordered set of JPEG frames.
#[async_trait]
pub trait FrameSource: Send + Sync + 'static {
    /// Samples roughly `frame_rate` representative frames per second of video.
    ///
    /// Returns an error (never an empty success) when nothing could be decoded.
    async fn sample(&self, video: &[u8], frame_rate: f32) -> Result<Vec<Vec<u8>>, CasenoteError>;
}
