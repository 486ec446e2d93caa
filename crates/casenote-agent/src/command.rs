// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text-exact command grammar.
//!
//! `.` and `.N` trigger a primary synthesis, `..` and `..N` a chained one,
//! where `N` is a positive frames-per-second rate. Slash commands manage the
//! buffer. Anything else is ordinary text.

use crate::dispatcher::FreshMode;

/// A recognized command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Trigger(Trigger),
    Clear,
    Status,
    Help,
}

/// A dispatch trigger and its optional sampling rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trigger {
    pub mode: FreshMode,
    pub frame_rate: Option<f32>,
}

impl Trigger {
    /// The rate to sample videos at: the named rate or `default`, capped at `max`.
    pub fn effective_rate(&self, default: f32, max: f32) -> f32 {
        self.frame_rate.unwrap_or(default).min(max)
    }
}

/// Parses a text message, returning `None` for ordinary text.
pub fn parse_command(text: &str) -> Option<Command> {
    let text = text.trim();

    if let Some(name) = text.strip_prefix('/') {
        // Telegram appends `@botname` to commands in group chats.
        let name = name.split('@').next().unwrap_or(name);
        return match name {
            "clear" => Some(Command::Clear),
            "status" => Some(Command::Status),
            "start" | "help" => Some(Command::Help),
            _ => None,
        };
    }

    let (mode, rest) = if let Some(rest) = text.strip_prefix("..") {
        (FreshMode::Chained, rest)
    } else if let Some(rest) = text.strip_prefix('.') {
        (FreshMode::Primary, rest)
    } else {
        return None;
    };

    let frame_rate = if rest.is_empty() {
        None
    } else {
        Some(parse_rate(rest)?)
    };

    Some(Command::Trigger(Trigger { mode, frame_rate }))
}

/// Accepts plain decimal numbers only; rejects `inf`, exponents, and signs.
fn parse_rate(raw: &str) -> Option<f32> {
    if !raw.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    raw.parse::<f32>()
        .ok()
        .filter(|rate| rate.is_finite() && *rate > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger(mode: FreshMode, frame_rate: Option<f32>) -> Option<Command> {
        Some(Command::Trigger(Trigger { mode, frame_rate }))
    }

    #[test]
    fn bare_markers() {
        assert_eq!(parse_command("."), trigger(FreshMode::Primary, None));
        assert_eq!(parse_command(".."), trigger(FreshMode::Chained, None));
        assert_eq!(parse_command("  .\n"), trigger(FreshMode::Primary, None));
    }

    #[test]
    fn rate_variants() {
        assert_eq!(parse_command(".2"), trigger(FreshMode::Primary, Some(2.0)));
        assert_eq!(parse_command(".0.5"), trigger(FreshMode::Primary, Some(0.5)));
        assert_eq!(parse_command("..3"), trigger(FreshMode::Chained, Some(3.0)));
    }

    #[test]
    fn unrecognized_markers_are_text() {
        for text in ["...", ".x", ". 2", ".0", "..-1", ".inf", ".1e3", "hello", ".2 please"] {
            assert_eq!(parse_command(text), None, "{text:?}");
        }
    }

    #[test]
    fn slash_commands() {
        assert_eq!(parse_command("/clear"), Some(Command::Clear));
        assert_eq!(parse_command("/clear@casenote_bot"), Some(Command::Clear));
        assert_eq!(parse_command("/status"), Some(Command::Status));
        assert_eq!(parse_command("/start"), Some(Command::Help));
        assert_eq!(parse_command("/help"), Some(Command::Help));
        assert_eq!(parse_command("/unknown"), None);
    }

    #[test]
    fn effective_rate_defaults_and_clamps() {
        let bare = Trigger {
            mode: FreshMode::Primary,
            frame_rate: None,
        };
        assert_eq!(bare.effective_rate(1.0, 10.0), 1.0);

        let fast = Trigger {
            mode: FreshMode::Chained,
            frame_rate: Some(25.0),
        };
        assert_eq!(fast.effective_rate(1.0, 10.0), 10.0);
    }
}
