// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Question/correction heuristic for threaded follow-up replies.
//!
//! A lexical check only. Misclassification is tolerated: a question read as a
//! correction still yields a regenerated synthesis.

use std::fmt;

/// Leading words that mark a reply as a question.
const QUESTION_WORDS: &[&str] = &["what", "why", "how", "is", "does", "can", "explain"];

/// How a follow-up reply is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUpKind {
    /// Answer the question against the prior synthesis.
    Question,
    /// Regenerate the synthesis with the new information folded in.
    Correction,
}

impl fmt::Display for FollowUpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Question => write!(f, "question"),
            Self::Correction => write!(f, "correction"),
        }
    }
}

/// Returns `true` if the text ends with `?` or opens with a question word.
pub fn is_question(text: &str) -> bool {
    let text = text.trim();
    if text.ends_with('?') {
        return true;
    }

    text.split_whitespace()
        .next()
        .map(|token| {
            token
                .trim_end_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .is_some_and(|token| QUESTION_WORDS.contains(&token.as_str()))
}

/// Classifies a follow-up reply.
pub fn classify(text: &str) -> FollowUpKind {
    if is_question(text) {
        FollowUpKind::Question
    } else {
        FollowUpKind::Correction
    }
}
