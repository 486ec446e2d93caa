// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Splitting long outbound text into transport-sized chunks.
//!
//! Lengths are UTF-16 code units, the unit Telegram measures its limit in: a
//! character outside the Basic Multilingual Plane (most emoji) counts twice.

/// Splits `text` into ordered chunks of at most `max_units` UTF-16 code units.
///
/// Each cut prefers the last paragraph break, then line break, then space
/// inside the window, and falls back to a hard cut. Whitespace at a cut is
/// consumed. Empty input yields no chunks.
pub fn split_message(text: &str, max_units: usize) -> Vec<String> {
    let max_units = max_units.max(1);
    let mut chunks = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        let (chunk, remainder) = split_once(rest, max_units);
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        rest = remainder;
    }
    chunks
}

/// UTF-16 length of `text`.
pub fn utf16_len(text: &str) -> usize {
    text.chars().map(char::len_utf16).sum()
}

fn split_once(text: &str, max_units: usize) -> (&str, &str) {
    let Some(limit) = window_end(text, max_units) else {
        return (text, "");
    };
    let window = &text[..limit];

    let cut = window
        .rfind("\n\n")
        .map(|pos| (pos, 2))
        .or_else(|| window.rfind('\n').map(|pos| (pos, 1)))
        .or_else(|| window.rfind(' ').map(|pos| (pos, 1)))
        .filter(|(pos, _)| *pos > 0);

    match cut {
        Some((pos, width)) => (text[..pos].trim_end(), text[pos + width..].trim_start()),
        None => (window, &text[limit..]),
    }
}

/// Byte offset where a window of at most `max_units` code units ends, or
/// `None` if the whole text fits. The window always holds one character.
fn window_end(text: &str, max_units: usize) -> Option<usize> {
    let mut units = 0;
    for (offset, ch) in text.char_indices() {
        units += ch.len_utf16();
        if units > max_units {
            return Some(if offset == 0 { ch.len_utf8() } else { offset });
        }
    }
    None
}
