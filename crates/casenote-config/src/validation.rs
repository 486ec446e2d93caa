// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde cannot express. All failures are
//! collected so a single run reports every problem.

use crate::diagnostic::ConfigError;
use crate::model::CasenoteConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &CasenoteConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.bot.log_level.to_ascii_lowercase().as_str()) {
        fail(format!(
            "bot.log_level `{}` must be one of: {}",
            config.bot.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.gemini.model.trim().is_empty() {
        fail("gemini.model must not be empty".to_string());
    }
    if config.gemini.request_timeout_secs == 0 {
        fail("gemini.request_timeout_secs must be greater than zero".to_string());
    }

    if config.buffer.idle_timeout_secs == 0 {
        fail("buffer.idle_timeout_secs must be greater than zero".to_string());
    }

    let sampler = &config.sampler;
    if sampler.batch_factor == 0 {
        fail("sampler.batch_factor must be at least 1".to_string());
    }
    if !(sampler.default_frame_rate.is_finite() && sampler.default_frame_rate > 0.0) {
        fail(format!(
            "sampler.default_frame_rate must be positive, got {}",
            sampler.default_frame_rate
        ));
    }
    if !(sampler.max_frame_rate.is_finite() && sampler.max_frame_rate > 0.0) {
        fail(format!(
            "sampler.max_frame_rate must be positive, got {}",
            sampler.max_frame_rate
        ));
    } else if sampler.default_frame_rate > sampler.max_frame_rate {
        fail(format!(
            "sampler.default_frame_rate ({}) exceeds sampler.max_frame_rate ({})",
            sampler.default_frame_rate, sampler.max_frame_rate
        ));
    }
    if sampler.ffmpeg_path.trim().is_empty() {
        fail("sampler.ffmpeg_path must not be empty".to_string());
    }
    if sampler.timeout_secs == 0 {
        fail("sampler.timeout_secs must be greater than zero".to_string());
    }

    if config.store.database_path.trim().is_empty() {
        fail("store.database_path must not be empty".to_string());
    }
    if config.store.retention_secs == 0 {
        fail("store.retention_secs must be greater than zero".to_string());
    }
    if config.store.purge_interval_secs == 0 {
        fail("store.purge_interval_secs must be greater than zero".to_string());
    }

    let addr = config.health.bind_address.trim();
    if addr.is_empty() {
        fail("health.bind_address must not be empty".to_string());
    } else {
        let is_ip = addr.parse::<std::net::IpAddr>().is_ok();
        let is_hostname = addr
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
        if !is_ip && !is_hostname {
            fail(format!(
                "health.bind_address `{addr}` is not a valid IP address or hostname"
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks that `serve` has the credentials it cannot run without.
///
/// Kept apart from [`validate_config`] so `check-config` works on a
/// credential-less file.
pub fn validate_serve_requirements(config: &CasenoteConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.gemini.api_keys.is_empty() {
        errors.push(ConfigError::MissingKey {
            key: "gemini.api_keys".to_string(),
        });
    }
    if config
        .telegram
        .bot_token
        .as_deref()
        .is_none_or(|t| t.trim().is_empty())
    {
        errors.push(ConfigError::MissingKey {
            key: "telegram.bot_token".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
