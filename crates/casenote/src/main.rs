// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Casenote - conversational clinical intake.
//!
//! This is the binary entry point.

mod health;
mod serve;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;

use casenote_config::{CasenoteConfig, ConfigError};
use clap::{Parser, Subcommand};

/// Casenote - collect case material in chat, synthesize it on demand.
#[derive(Parser, Debug)]
#[command(name = "casenote", version, about, long_about = None)]
struct Cli {
    /// Load this file instead of the standard configuration locations.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bot (Telegram transport, health endpoint, record purge).
    Serve,
    /// Load and validate configuration, then print a redacted summary.
    CheckConfig,
}

fn load(path: Option<&PathBuf>) -> Result<CasenoteConfig, Vec<ConfigError>> {
    match path {
        Some(path) => casenote_config::load_and_validate_path(path),
        None => casenote_config::load_and_validate(),
    }
}

/// Human-readable configuration summary. Secrets are reduced to counts.
fn summary(config: &CasenoteConfig) -> String {
    let token = if config.telegram.bot_token.as_deref().is_some_and(|t| !t.trim().is_empty()) {
        "set"
    } else {
        "missing"
    };
    let health = if config.health.enabled {
        format!("{}:{}", config.health.bind_address, config.health.port)
    } else {
        "disabled".to_string()
    };

    [
        format!("bot.name             {}", config.bot.name),
        format!("bot.log_level        {}", config.bot.log_level),
        format!("telegram.bot_token   {token}"),
        format!("gemini.api_keys      {} configured", config.gemini.api_keys.len()),
        format!("gemini.model         {}", config.gemini.model),
        format!("buffer.idle_timeout  {}s", config.buffer.idle_timeout_secs),
        format!(
            "sampler              {} fps default, {} fps max, x{} oversampling",
            config.sampler.default_frame_rate,
            config.sampler.max_frame_rate,
            config.sampler.batch_factor
        ),
        format!("store.database_path  {}", config.store.database_path),
        format!("store.retention      {}s", config.store.retention_secs),
        format!("health               {health}"),
    ]
    .join("\n")
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            casenote_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(errors) = casenote_config::validate_serve_requirements(&config) {
                casenote_config::render_errors(&errors);
                std::process::exit(1);
            }
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("casenote: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig) => {
            println!("casenote: configuration is valid\n{}", summary(&config));
            if let Err(errors) = casenote_config::validate_serve_requirements(&config) {
                eprintln!("note: `casenote serve` will refuse to start until these are set:");
                casenote_config::render_errors(&errors);
            }
        }
        None => {
            println!("casenote: use --help for available commands");
        }
    }
}
