// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `casenote serve`: wires the Telegram transport, Gemini backend, SQLite
//! store, and media pipeline into the intake loop.

use std::sync::Arc;
use std::time::Duration;

use casenote_agent::dispatcher::RequestDispatcher;
use casenote_agent::prompt::InstructionProfiles;
use casenote_agent::shutdown;
use casenote_agent::{IntakeLoop, IntakeSettings};
use casenote_config::model::CasenoteConfig;
use casenote_core::traits::{Adapter, ChannelAdapter, ContextStore};
use casenote_core::types::HealthStatus;
use casenote_core::CasenoteError;
use casenote_gemini::{GeminiProvider, KeyRotationClient};
use casenote_media::fetch::DEFAULT_DOWNLOAD_TIMEOUT;
use casenote_media::{FfmpegSampler, HttpFetcher};
use casenote_storage::SqliteContextStore;
use casenote_telegram::TelegramChannel;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::health;

/// Runs the bot until SIGINT/SIGTERM.
pub async fn run_serve(config: CasenoteConfig) -> Result<(), CasenoteError> {
    init_tracing(&config.bot.log_level);

    info!(name = %config.bot.name, "starting casenote serve");

    let store = Arc::new(SqliteContextStore::open(&config.store).await?);
    if let HealthStatus::Unhealthy(reason) = probe(store.as_ref()).await {
        return Err(CasenoteError::Storage {
            source: format!("context store unusable at startup: {reason}").into(),
        });
    }

    let provider = Arc::new(GeminiProvider::new(&config.gemini)?);
    let backend = Arc::new(KeyRotationClient::from_keys(
        config.gemini.api_keys.clone(),
        provider,
    )?);
    info!(
        model = %config.gemini.model,
        credentials = backend.pool_size(),
        "generative backend ready"
    );

    let profiles = InstructionProfiles::load(&config.instructions).await?;
    let dispatcher = RequestDispatcher::new(
        backend,
        Arc::new(HttpFetcher::new(DEFAULT_DOWNLOAD_TIMEOUT)?),
        Arc::new(FfmpegSampler::new(&config.sampler)),
        profiles,
    );

    let mut telegram = TelegramChannel::new(&config.telegram)?;
    telegram.connect().await?;
    let channel: Arc<dyn ChannelAdapter> = Arc::new(telegram);
    probe(channel.as_ref()).await;

    let cancel = shutdown::install_signal_handler();

    if config.health.enabled {
        let host = config.health.bind_address.clone();
        let port = config.health.port;
        let health_cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = health::serve(&host, port, health_cancel).await {
                error!(error = %e, "health endpoint stopped");
            }
        });
    }

    {
        let store: Arc<dyn ContextStore> = store.clone();
        let interval = Duration::from_secs(config.store.purge_interval_secs);
        tokio::spawn(purge_loop(store, interval, cancel.clone()));
        info!(
            retention_secs = config.store.retention_secs,
            purge_interval_secs = config.store.purge_interval_secs,
            "record purge task started"
        );
    }

    let mut intake = IntakeLoop::new(
        channel.clone(),
        store.clone(),
        dispatcher,
        IntakeSettings::from(&config),
    );
    intake.run(cancel.clone()).await?;

    // The loop can also stop because the channel closed; stop the side tasks.
    cancel.cancel();

    if let Err(e) = channel.shutdown().await {
        warn!(error = %e, "channel shutdown failed");
    }
    if let Err(e) = store.shutdown().await {
        warn!(error = %e, "store shutdown failed");
    }

    info!("casenote serve shutdown complete");
    Ok(())
}

/// Runs one health check and logs the outcome under the adapter's name.
///
/// A failing check reads as unhealthy.
async fn probe<A: Adapter + ?Sized>(adapter: &A) -> HealthStatus {
    let status = match adapter.health_check().await {
        Ok(status) => status,
        Err(e) => HealthStatus::Unhealthy(e.to_string()),
    };
    match &status {
        HealthStatus::Healthy => debug!(adapter = adapter.name(), "adapter healthy"),
        HealthStatus::Degraded(reason) => {
            warn!(adapter = adapter.name(), %reason, "adapter degraded")
        }
        HealthStatus::Unhealthy(reason) => {
            error!(adapter = adapter.name(), %reason, "adapter unhealthy")
        }
    }
    status
}

/// Periodically removes expired records until `cancel` fires.
pub async fn purge_loop(store: Arc<dyn ContextStore>, every: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    // Skip the first immediate tick.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match store.purge_expired().await {
                    Ok(0) => debug!("no expired records"),
                    Ok(removed) => info!(removed, "expired records purged"),
                    Err(e) => warn!(error = %e, "record purge failed (non-fatal)"),
                }
            }
            _ = cancel.cancelled() => {
                debug!("record purge task shutting down");
                break;
            }
        }
    }
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides `log_level`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("casenote={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use casenote_core::types::{ConversationId, MessageId, SynthesisMode, SynthesisRecord};
    use casenote_test_utils::MemoryStore;

    fn record(id: &str, age: chrono::Duration) -> SynthesisRecord {
        SynthesisRecord {
            conversation_id: ConversationId::from("c"),
            message_id: MessageId::from(id),
            source_media: vec![],
            response_text: "r".into(),
            mode: SynthesisMode::Primary,
            created_at: chrono::Utc::now() - age,
        }
    }

    #[tokio::test]
    async fn probe_reports_store_outage() {
        let store = MemoryStore::new();
        assert_eq!(probe(&store).await, HealthStatus::Healthy);

        store.set_unavailable(true);
        assert!(matches!(probe(&store).await, HealthStatus::Unhealthy(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn purge_loop_runs_on_interval_until_cancelled() {
        let store = Arc::new(MemoryStore::with_retention(Duration::from_secs(1800)));
        store.put(&record("old", chrono::Duration::hours(1))).await.unwrap();
        store.put(&record("new", chrono::Duration::zero())).await.unwrap();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(purge_loop(
            store.clone(),
            Duration::from_secs(300),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(store.records().len(), 1);

        cancel.cancel();
        task.await.unwrap();
    }
}
