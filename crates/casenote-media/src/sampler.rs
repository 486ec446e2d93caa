// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ffmpeg-backed video frame sampling.
//!
//! Each invocation gets its own temporary directory holding the input video
//! and every decoded frame. The directory is removed whether sampling
//! succeeds, fails, or times out.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use casenote_config::model::SamplerConfig;
use casenote_core::CasenoteError;
use casenote_core::traits::FrameSource;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::sharpness::select_representatives;

const FRAME_PREFIX: &str = "frame_";
const FRAME_SUFFIX: &str = ".jpg";

/// Oversample-then-select frame sampler.
///
/// Decodes at `rate * batch_factor` frames per second, then keeps the sharpest
/// frame of every `batch_factor` consecutive frames.
#[derive(Debug, Clone)]
pub struct FfmpegSampler {
    ffmpeg: PathBuf,
    batch_factor: u32,
    timeout: Duration,
}

impl FfmpegSampler {
    pub fn new(config: &SamplerConfig) -> Self {
        Self {
            ffmpeg: PathBuf::from(&config.ffmpeg_path),
            batch_factor: config.batch_factor.max(1),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    async fn decode(&self, dir: &Path, video: &[u8], rate: f32) -> Result<Vec<Vec<u8>>, CasenoteError> {
        let input = dir.join("input");
        tokio::fs::write(&input, video)
            .await
            .map_err(|e| sampling_error("failed to write temporary video", e))?;

        let fps = rate * self.batch_factor as f32;
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-nostdin")
            .arg("-i")
            .arg(&input)
            .arg("-vf")
            .arg(format!("fps={fps}"))
            .arg("-q:v")
            .arg("2")
            .arg(dir.join(format!("{FRAME_PREFIX}%06d{FRAME_SUFFIX}")))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(fps, bytes = video.len(), "running ffmpeg");
        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result.map_err(|e| sampling_error("failed to run ffmpeg", e))?,
            Err(_) => {
                return Err(CasenoteError::Timeout {
                    duration: self.timeout,
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.lines().last().unwrap_or("no diagnostic output");
            return Err(CasenoteError::Sampling {
                message: format!("ffmpeg exited with {}: {detail}", output.status),
                source: None,
            });
        }

        read_frames(dir).await
    }
}

#[async_trait]
impl FrameSource for FfmpegSampler {
    async fn sample(&self, video: &[u8], frame_rate: f32) -> Result<Vec<Vec<u8>>, CasenoteError> {
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(CasenoteError::Sampling {
                message: format!("invalid frame rate {frame_rate}"),
                source: None,
            });
        }

        let dir = tempfile::Builder::new()
            .prefix("casenote-frames-")
            .tempdir()
            .map_err(|e| sampling_error("failed to create temporary directory", e))?;

        let decoded = self.decode(dir.path(), video, frame_rate).await;

        if let Err(e) = dir.close() {
            warn!(error = %e, "failed to remove sampling directory");
        }

        let frames = decoded?;
        if frames.is_empty() {
            return Err(CasenoteError::Sampling {
                message: "ffmpeg produced no frames".into(),
                source: None,
            });
        }

        let decoded_count = frames.len();
        let batch = self.batch_factor as usize;
        let selected = tokio::task::spawn_blocking(move || select_representatives(frames, batch))
            .await
            .map_err(|e| CasenoteError::Internal(format!("frame selection panicked: {e}")))?;

        debug!(decoded = decoded_count, selected = selected.len(), "video sampled");
        Ok(selected)
    }
}

/// Reads decoded frames in name (and therefore timestamp) order.
async fn read_frames(dir: &Path) -> Result<Vec<Vec<u8>>, CasenoteError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| sampling_error("failed to list decoded frames", e))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| sampling_error("failed to list decoded frames", e))?
    {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(FRAME_PREFIX) && name.ends_with(FRAME_SUFFIX) {
            paths.push(entry.path());
        }
    }
    paths.sort();

    let mut frames = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| sampling_error("failed to read decoded frame", e))?;
        frames.push(bytes);
    }
    Ok(frames)
}

fn sampling_error(message: &str, e: std::io::Error) -> CasenoteError {
    CasenoteError::Sampling {
        message: format!("{message}: {e}"),
        source: Some(Box::new(e)),
    }
}
