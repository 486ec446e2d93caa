// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle shared by every external collaborator.

use async_trait::async_trait;

use crate::error::CasenoteError;
use crate::types::HealthStatus;

/// Identity, health, and shutdown for a transport, backend, or store.
///
/// `serve` probes each adapter once at startup and shuts them down in reverse
/// wiring order when the intake loop stops.
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// Short name used in log fields (`telegram`, `sqlite`, `gemini`).
    fn name(&self) -> &str;

    async fn health_check(&self) -> Result<HealthStatus, CasenoteError>;

    /// Releases held resources. Calling it twice must be harmless.
    async fn shutdown(&self) -> Result<(), CasenoteError>;
}
