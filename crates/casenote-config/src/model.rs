// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Casenote intake pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Deserializer, Serialize};

/// Top-level Casenote configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CasenoteConfig {
    /// Bot identity and logging.
    #[serde(default)]
    pub bot: BotConfig,

    /// Telegram transport settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Gemini backend and credential pool.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Per-conversation buffer behavior.
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Video frame sampling.
    #[serde(default)]
    pub sampler: SamplerConfig,

    /// Context store (SQLite) settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Instruction profiles sent alongside each request.
    #[serde(default)]
    pub instructions: InstructionsConfig,

    /// Liveness endpoint.
    #[serde(default)]
    pub health: HealthConfig,
}

/// Bot identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// Display name used in logs and the help text.
    #[serde(default = "default_bot_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_bot_name() -> String {
    "casenote".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telegram transport configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Telegram Bot API token. Required by `casenote serve`.
    #[serde(default)]
    pub bot_token: Option<String>,
}

/// Gemini backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeminiConfig {
    /// Ordered credential pool. Accepts a TOML array or a comma-separated string,
    /// so `CASENOTE_GEMINI_API_KEYS=k1,k2` works from the environment.
    #[serde(default, deserialize_with = "string_or_list")]
    pub api_keys: Vec<String>,

    /// Model identifier used for every request.
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// API base URL (overridable for testing).
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_request_timeout_secs() -> u64 {
    300
}

/// Conversation buffer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BufferConfig {
    /// Sliding idle window after which a buffer is cleared.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Reply with the pending count after each buffered item.
    #[serde(default = "default_acknowledge_items")]
    pub acknowledge_items: bool,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            acknowledge_items: default_acknowledge_items(),
        }
    }
}

fn default_idle_timeout_secs() -> u64 {
    300
}

fn default_acknowledge_items() -> bool {
    true
}

/// Video frame sampling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SamplerConfig {
    /// Path or name of the ffmpeg executable.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// Frames decoded per selected frame.
    #[serde(default = "default_batch_factor")]
    pub batch_factor: u32,

    /// Frames per second when a trigger names no rate.
    #[serde(default = "default_frame_rate")]
    pub default_frame_rate: f32,

    /// Upper bound applied to trigger rate variants.
    #[serde(default = "default_max_frame_rate")]
    pub max_frame_rate: f32,

    /// Wall-clock limit for a single ffmpeg run.
    #[serde(default = "default_sampler_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            batch_factor: default_batch_factor(),
            default_frame_rate: default_frame_rate(),
            max_frame_rate: default_max_frame_rate(),
            timeout_secs: default_sampler_timeout_secs(),
        }
    }
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_batch_factor() -> u32 {
    3
}

fn default_frame_rate() -> f32 {
    1.0
}

fn default_max_frame_rate() -> f32 {
    10.0
}

fn default_sampler_timeout_secs() -> u64 {
    120
}

/// Context store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Records older than this are no longer retrievable.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// Interval of the background purge of expired rows.
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            retention_secs: default_retention_secs(),
            purge_interval_secs: default_purge_interval_secs(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("casenote").join("casenote.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("casenote.db"))
        .to_string_lossy()
        .to_string()
}

fn default_retention_secs() -> u64 {
    1800
}

fn default_purge_interval_secs() -> u64 {
    300
}

/// Instruction profile configuration.
///
/// A `*_file` path takes precedence over the inline text when both are set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InstructionsConfig {
    #[serde(default = "default_primary_instruction")]
    pub primary: String,

    #[serde(default)]
    pub primary_file: Option<String>,

    #[serde(default = "default_secondary_instruction")]
    pub secondary: String,

    #[serde(default)]
    pub secondary_file: Option<String>,
}

impl Default for InstructionsConfig {
    fn default() -> Self {
        Self {
            primary: default_primary_instruction(),
            primary_file: None,
            secondary: default_secondary_instruction(),
            secondary_file: None,
        }
    }
}

fn default_primary_instruction() -> String {
    "You are a meticulous clinical documentation assistant. You receive the material a \
     clinician collected about one patient encounter: photographs, scanned documents, \
     audio recordings, video frames, and free-text notes, in the order they were \
     submitted. Produce a structured clinical synthesis with the sections: Presenting \
     Complaint, History, Findings, Assessment, Plan. Only state what the material \
     supports, mark uncertain readings explicitly, and never invent measurements."
        .to_string()
}

fn default_secondary_instruction() -> String {
    "You are a senior clinician reviewing a colleague's structured case synthesis. \
     Rewrite it as a concise handover note: a one-line summary, the key positive and \
     negative findings, a ranked differential diagnosis with brief reasoning, and the \
     next actions. Keep every fact traceable to the synthesis you were given."
        .to_string()
}

/// Health endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    #[serde(default = "default_health_enabled")]
    pub enabled: bool,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_health_port")]
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_health_enabled(),
            bind_address: default_bind_address(),
            port: default_health_port(),
        }
    }
}

fn default_health_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_health_port() -> u16 {
    8080
}

/// Accepts either a sequence of strings or one comma-separated string.
///
/// Blank entries are dropped and surrounding whitespace is trimmed; order is kept.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
    }

    let raw = match StringOrList::deserialize(deserializer)? {
        StringOrList::One(s) => s.split(',').map(str::to_string).collect::<Vec<_>>(),
        StringOrList::Many(v) => v,
    };

    Ok(raw
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect())
}
