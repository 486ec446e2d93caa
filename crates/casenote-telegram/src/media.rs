// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File link resolution for Telegram media.
//!
//! Media is not downloaded here. The adapter resolves each file id to a
//! download URL and the dispatcher fetches it when the buffer is drained.

use casenote_core::CasenoteError;
use teloxide::prelude::*;
use teloxide::types::FileId;

/// Resolves `file_id` to a download URL via `getFile`.
///
/// The URL embeds the bot token; callers must not log it.
pub async fn resolve_file_url(bot: &Bot, file_id: &FileId) -> Result<String, CasenoteError> {
    let file = bot
        .get_file(file_id.clone())
        .await
        .map_err(|e| CasenoteError::Channel {
            message: format!("failed to get file info: {e}"),
            source: Some(Box::new(e)),
        })?;

    Ok(file_url(bot.api_url().as_str(), bot.token(), &file.path))
}

/// Builds the Bot API download URL for a resolved file path.
pub fn file_url(api_url: &str, token: &str, path: &str) -> String {
    format!(
        "{}/file/bot{}/{}",
        api_url.trim_end_matches('/'),
        token,
        path.trim_start_matches('/')
    )
}
