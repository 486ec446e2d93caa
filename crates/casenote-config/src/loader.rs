// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./casenote.toml` > `~/.config/casenote/casenote.toml` >
//! `/etc/casenote/casenote.toml` with environment variable overrides via `CASENOTE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::CasenoteConfig;

/// Config sections addressable from the environment, in mapping order.
const ENV_SECTIONS: &[&str] = &[
    "bot",
    "telegram",
    "gemini",
    "buffer",
    "sampler",
    "store",
    "instructions",
    "health",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/casenote/casenote.toml` (system-wide)
/// 3. `~/.config/casenote/casenote.toml` (user XDG config)
/// 4. `./casenote.toml` (local directory)
/// 5. `CASENOTE_*` environment variables
pub fn load_config() -> Result<CasenoteConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from an inline TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<CasenoteConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CasenoteConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CasenoteConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CasenoteConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for the XDG hierarchy.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(CasenoteConfig::default()))
        .merge(Toml::file("/etc/casenote/casenote.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("casenote/casenote.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("casenote.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `CASENOTE_GEMINI_API_KEYS` must map to `gemini.api_keys`,
/// not `gemini.api.keys`.
fn env_provider() -> Env {
    Env::prefixed("CASENOTE_").map(|key| map_env_key(key.as_str()).into())
}

/// Maps a lowercased, prefix-stripped env key to its dotted config path.
fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_section_prefix_once() {
        assert_eq!(map_env_key("gemini_api_keys"), "gemini.api_keys");
        assert_eq!(map_env_key("buffer_idle_timeout_secs"), "buffer.idle_timeout_secs");
        assert_eq!(map_env_key("telegram_bot_token"), "telegram.bot_token");
    }

    #[test]
    fn unknown_section_is_left_alone() {
        assert_eq!(map_env_key("nonsense_key"), "nonsense_key");
    }

    #[test]
    fn comma_separated_keys_from_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("CASENOTE_GEMINI_API_KEYS", "k1, k2,,k3");
            let config: CasenoteConfig = Figment::new()
                .merge(Serialized::defaults(CasenoteConfig::default()))
                .merge(env_provider())
                .extract()?;
            assert_eq!(config.gemini.api_keys, vec!["k1", "k2", "k3"]);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_numeric_fields() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("CASENOTE_BUFFER_IDLE_TIMEOUT_SECS", "42");
            let config: CasenoteConfig = Figment::new()
                .merge(Serialized::defaults(CasenoteConfig::default()))
                .merge(env_provider())
                .extract()?;
            assert_eq!(config.buffer.idle_timeout_secs, 42);
            Ok(())
        });
    }
}
