// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sequential fallback across an ordered credential pool.
//!
//! Every call starts at the first credential and walks the pool in the
//! configured order, returning the first success. The order never changes
//! between calls, so a persistently failing first credential costs one failed
//! attempt on every request.

use std::sync::Arc;

use async_trait::async_trait;
use casenote_core::CasenoteError;
use casenote_core::traits::{Adapter, GenerativeBackend, ProviderAdapter};
use casenote_core::types::{Generation, GenerationRequest};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

/// A [`GenerativeBackend`] that owns the credential pool.
///
/// Credentials are held as [`SecretString`] and only ever logged by their
/// 1-based position (`key#2`).
pub struct KeyRotationClient {
    credentials: Vec<SecretString>,
    provider: Arc<dyn ProviderAdapter>,
}

impl std::fmt::Debug for KeyRotationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRotationClient")
            .field("credentials", &self.credentials.len())
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl KeyRotationClient {
    /// Builds a client over `credentials`, in order.
    ///
    /// An empty pool is a configuration error: nothing could ever be dispatched.
    pub fn new(
        credentials: Vec<SecretString>,
        provider: Arc<dyn ProviderAdapter>,
    ) -> Result<Self, CasenoteError> {
        if credentials.is_empty() {
            return Err(CasenoteError::Config(
                "credential pool is empty; set gemini.api_keys or CASENOTE_GEMINI_API_KEYS"
                    .to_string(),
            ));
        }
        Ok(Self {
            credentials,
            provider,
        })
    }

    /// Convenience constructor from plain strings.
    pub fn from_keys<I, S>(keys: I, provider: Arc<dyn ProviderAdapter>) -> Result<Self, CasenoteError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let credentials = keys
            .into_iter()
            .map(|k| SecretString::from(k.into()))
            .collect();
        Self::new(credentials, provider)
    }

    pub fn pool_size(&self) -> usize {
        self.credentials.len()
    }
}

#[async_trait]
impl GenerativeBackend for KeyRotationClient {
    async fn call(&self, request: &GenerationRequest) -> Result<Generation, CasenoteError> {
        let mut failures = Vec::new();

        for (index, credential) in self.credentials.iter().enumerate() {
            let label = format!("key#{}", index + 1);
            match self
                .provider
                .generate(credential.expose_secret(), request)
                .await
            {
                Ok(text) => {
                    debug!(credential = %label, failures = failures.len(), "backend call succeeded");
                    return Ok(Generation {
                        text,
                        credential_index: index,
                        failures,
                    });
                }
                Err(e) => {
                    warn!(credential = %label, error = %e, "backend call failed, trying next credential");
                    metrics::counter!("casenote_credential_failures_total").increment(1);
                    failures.push(format!("{label}: {e}"));
                }
            }
        }

        Err(CasenoteError::CredentialsExhausted { attempts: failures })
    }
}
