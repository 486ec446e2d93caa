// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Focus scoring for decoded frames.
//!
//! The score is the variance of a 3x3 Laplacian over the grayscale image: in
//! focus frames have strong edges and a wide spread of second derivatives,
//! blurred or motion-smeared frames do not.

use image::GrayImage;

/// Scores one encoded frame. Undecodable or degenerate frames score 0.
pub fn sharpness(frame: &[u8]) -> f64 {
    match image::load_from_memory(frame) {
        Ok(img) => laplacian_variance(&img.to_luma8()),
        Err(_) => 0.0,
    }
}

fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let px = |x: u32, y: u32| f64::from(gray.get_pixel(x, y)[0]);
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut n = 0.0;

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let lap = px(x - 1, y) + px(x + 1, y) + px(x, y - 1) + px(x, y + 1) - 4.0 * px(x, y);
            sum += lap;
            sum_sq += lap * lap;
            n += 1.0;
        }
    }

    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

/// Keeps the sharpest frame of every consecutive group of `batch` frames.
///
/// Output stays in input (chronological) order. Ties keep the earliest frame of
/// the group; a short trailing group still yields one frame.
pub fn select_representatives(frames: Vec<Vec<u8>>, batch: usize) -> Vec<Vec<u8>> {
    let batch = batch.max(1);
    if batch == 1 {
        return frames;
    }

    let mut selected = Vec::with_capacity(frames.len().div_ceil(batch));
    let mut frames = frames.into_iter().peekable();
    while frames.peek().is_some() {
        let mut best: Option<(f64, Vec<u8>)> = None;
        for frame in frames.by_ref().take(batch) {
            let score = sharpness(&frame);
            if best.as_ref().is_none_or(|(top, _)| score > *top) {
                best = Some((score, frame));
            }
        }
        if let Some((_, frame)) = best {
            selected.push(frame);
        }
    }
    selected
}
