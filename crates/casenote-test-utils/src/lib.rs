// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Casenote integration tests.
//!
//! Mock adapters and a harness for fast, deterministic tests without Telegram,
//! Gemini, ffmpeg, or a database.
//!
//! # Components
//!
//! - [`MockChannel`] - channel with message injection and capture
//! - [`ScriptedBackend`] - generative backend replaying scripted outcomes
//! - [`ScriptedProvider`] - single-credential provider that rejects chosen keys
//! - [`MockFetcher`] / [`MockSampler`] - canned media download and frame sampling
//! - [`MemoryStore`] - in-memory context store with optional retention
//! - [`TestHarness`] - a wired [`casenote_agent::IntakeLoop`]

pub mod harness;
pub mod memory_store;
pub mod mock_backend;
pub mod mock_channel;
pub mod mock_media;

pub use harness::{PRIMARY_PROFILE, SECONDARY_PROFILE, TestHarness, TestHarnessBuilder};
pub use memory_store::MemoryStore;
pub use mock_backend::{ScriptedBackend, ScriptedProvider};
pub use mock_channel::MockChannel;
pub use mock_media::{MockFetcher, MockSampler};
