// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media resolution for Casenote: downloading buffered items and reducing
//! videos to a handful of representative still frames.

pub mod fetch;
pub mod sampler;
pub mod sharpness;

pub use fetch::HttpFetcher;
pub use sampler::FfmpegSampler;
