// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instruction profiles and the per-mode prompt text.

use casenote_config::model::InstructionsConfig;
use casenote_core::error::CasenoteError;
use casenote_core::types::{MediaKind, SynthesisMode};
use tracing::debug;

/// The two behavioral guidance blocks sent alongside request content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionProfiles {
    pub primary: String,
    pub secondary: String,
}

impl InstructionProfiles {
    /// Resolves profiles from configuration, reading `*_file` paths when set.
    pub async fn load(config: &InstructionsConfig) -> Result<Self, CasenoteError> {
        let primary = match &config.primary_file {
            Some(path) => read_profile(path).await?,
            None => config.primary.clone(),
        };
        let secondary = match &config.secondary_file {
            Some(path) => read_profile(path).await?,
            None => config.secondary.clone(),
        };
        Ok(Self { primary, secondary })
    }

    /// The profile a given mode runs under.
    pub fn for_mode(&self, mode: SynthesisMode) -> &str {
        match mode {
            SynthesisMode::Primary => &self.primary,
            SynthesisMode::Secondary => &self.secondary,
        }
    }
}

impl From<&InstructionsConfig> for InstructionProfiles {
    /// Uses the inline texts only.
    fn from(config: &InstructionsConfig) -> Self {
        Self {
            primary: config.primary.clone(),
            secondary: config.secondary.clone(),
        }
    }
}

async fn read_profile(path: &str) -> Result<String, CasenoteError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CasenoteError::Config(format!("cannot read instruction file {path}: {e}")))?;
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(CasenoteError::Config(format!(
            "instruction file {path} is empty"
        )));
    }
    debug!(path, chars = text.len(), "loaded instruction profile");
    Ok(text)
}

/// One line of the submission manifest in a fresh prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestEntry {
    /// A binary item whose content is attached as inline data.
    Attached {
        kind: MediaKind,
        parts: usize,
        caption: Option<String>,
    },
    /// A free-text note.
    Note(String),
}

/// Prompt for a fresh synthesis over everything the submitter buffered.
pub fn fresh_prompt(manifest: &[ManifestEntry]) -> String {
    let mut prompt = String::from(
        "Produce a structured clinical synthesis from the material below. \
         Attachments are included in the same order as they are listed.\n",
    );

    if manifest.is_empty() {
        prompt.push_str("\nNo material could be retrieved for this request.\n");
        return prompt;
    }

    prompt.push_str("\nSubmitted material, in order:\n");
    for (index, entry) in manifest.iter().enumerate() {
        let n = index + 1;
        match entry {
            ManifestEntry::Attached {
                kind: MediaKind::Video,
                parts,
                caption,
            } => {
                prompt.push_str(&format!("{n}. video ({parts} still frames attached)"));
                push_caption(&mut prompt, caption.as_deref());
            }
            ManifestEntry::Attached { kind, caption, .. } => {
                prompt.push_str(&format!("{n}. {kind} (attached)"));
                push_caption(&mut prompt, caption.as_deref());
            }
            ManifestEntry::Note(text) => {
                prompt.push_str(&format!("{n}. note: {text}\n"));
            }
        }
    }
    prompt
}

fn push_caption(prompt: &mut String, caption: Option<&str>) {
    match caption {
        Some(caption) => prompt.push_str(&format!(" with caption: {caption}\n")),
        None => prompt.push('\n'),
    }
}

/// Prompt for the second stage of a chained synthesis. The first-stage output
/// is its only textual input.
pub fn chained_prompt(primary_output: &str) -> String {
    format!("Structured synthesis to work from:\n\n{primary_output}")
}

/// Prompt answering a question about a prior synthesis.
pub fn question_prompt(prior: &str, notes: &[String], question: &str) -> String {
    let mut prompt = format!("Previous synthesis:\n\n{prior}\n");
    push_notes(&mut prompt, notes);
    prompt.push_str(&format!(
        "\nQuestion: {question}\n\nAnswer the question using the previous synthesis \
         and any additional notes. Say so plainly if the material does not support an answer."
    ));
    prompt
}

/// Prompt regenerating a prior synthesis with new information folded in.
pub fn correction_prompt(prior: &str, notes: &[String], update: &str) -> String {
    let mut prompt = format!("Previous synthesis:\n\n{prior}\n");
    push_notes(&mut prompt, notes);
    prompt.push_str(&format!(
        "\nNew information: {update}\n\nProduce an updated synthesis in the same structure \
         that incorporates the new information and corrects anything it contradicts."
    ));
    prompt
}

fn push_notes(prompt: &mut String, notes: &[String]) {
    if notes.is_empty() {
        return;
    }
    prompt.push_str("\nAdditional notes:\n");
    for note in notes {
        prompt.push_str(&format!("- {note}\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_prompt_lists_material_in_order() {
        let prompt = fresh_prompt(&[
            ManifestEntry::Attached {
                kind: MediaKind::Image,
                parts: 1,
                caption: Some("left forearm".into()),
            },
            ManifestEntry::Note("history note".into()),
            ManifestEntry::Attached {
                kind: MediaKind::Video,
                parts: 4,
                caption: None,
            },
        ]);

        let image = prompt.find("1. image (attached) with caption: left forearm").unwrap();
        let note = prompt.find("2. note: history note").unwrap();
        let video = prompt.find("3. video (4 still frames attached)").unwrap();
        assert!(image < note && note < video);
    }

    #[test]
    fn fresh_prompt_without_material() {
        assert!(fresh_prompt(&[]).contains("No material could be retrieved"));
    }

    #[test]
    fn follow_up_prompts_carry_prior_and_reply() {
        let notes = vec!["BP 140/90".to_string()];
        let q = question_prompt("PRIOR", &notes, "Is this serious?");
        assert!(q.contains("PRIOR"));
        assert!(q.contains("- BP 140/90"));
        assert!(q.contains("Question: Is this serious?"));

        let c = correction_prompt("PRIOR", &[], "The patient also has diabetes");
        assert!(c.contains("New information: The patient also has diabetes"));
        assert!(!c.contains("Additional notes"));
    }

    #[test]
    fn profile_per_mode() {
        let profiles = InstructionProfiles {
            primary: "P".into(),
            secondary: "S".into(),
        };
        assert_eq!(profiles.for_mode(SynthesisMode::Primary), "P");
        assert_eq!(profiles.for_mode(SynthesisMode::Secondary), "S");
    }

    #[tokio::test]
    async fn file_overrides_inline_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secondary.md");
        std::fs::write(&path, "  From file.\n").unwrap();

        let config = InstructionsConfig {
            secondary_file: Some(path.display().to_string()),
            ..InstructionsConfig::default()
        };
        let profiles = InstructionProfiles::load(&config).await.unwrap();
        assert_eq!(profiles.secondary, "From file.");
        assert_eq!(profiles.primary, config.primary);
    }

    #[tokio::test]
    async fn missing_profile_file_is_a_config_error() {
        let config = InstructionsConfig {
            primary_file: Some("/nonexistent/casenote/primary.md".into()),
            ..InstructionsConfig::default()
        };
        let err = InstructionProfiles::load(&config).await.unwrap_err();
        assert!(matches!(err, CasenoteError::Config(_)));
    }
}
