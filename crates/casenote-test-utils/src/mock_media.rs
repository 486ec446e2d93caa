// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canned media download and frame sampling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use casenote_core::CasenoteError;
use casenote_core::traits::{FrameSource, MediaFetcher};

/// A [`MediaFetcher`] serving bytes from a locator map.
///
/// Unknown locators fail like a 404.
#[derive(Default)]
pub struct MockFetcher {
    files: HashMap<String, Vec<u8>>,
    fetched: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `bytes` for `locator`.
    pub fn with(mut self, locator: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(locator.to_string(), bytes);
        self
    }

    /// Locators requested so far.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched
            .lock()
            .map(|f| f.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MediaFetcher for MockFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, CasenoteError> {
        if let Ok(mut fetched) = self.fetched.lock() {
            fetched.push(locator.to_string());
        }
        self.files
            .get(locator)
            .cloned()
            .ok_or_else(|| CasenoteError::Media {
                message: "download failed with status 404".to_string(),
                source: None,
            })
    }
}

/// A [`FrameSource`] returning fixed frames, or failing every call.
///
/// Clones share the recorded call log.
#[derive(Clone)]
pub struct MockSampler {
    frames: Option<Vec<Vec<u8>>>,
    rates: Arc<Mutex<Vec<f32>>>,
}

impl MockSampler {
    /// Returns `frames` for every video. An empty list fails like an
    /// undecodable video.
    pub fn returning(frames: Vec<Vec<u8>>) -> Self {
        Self {
            frames: Some(frames),
            rates: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fails every call.
    pub fn failing() -> Self {
        Self {
            frames: None,
            rates: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Frame rates requested so far.
    pub fn rates(&self) -> Vec<f32> {
        self.rates.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl FrameSource for MockSampler {
    async fn sample(&self, _video: &[u8], frame_rate: f32) -> Result<Vec<Vec<u8>>, CasenoteError> {
        if let Ok(mut rates) = self.rates.lock() {
            rates.push(frame_rate);
        }
        match &self.frames {
            Some(frames) if !frames.is_empty() => Ok(frames.clone()),
            _ => Err(CasenoteError::Sampling {
                message: "no frames could be decoded".to_string(),
                source: None,
            }),
        }
    }
}
