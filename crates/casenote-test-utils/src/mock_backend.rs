// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted generative backends.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use casenote_core::CasenoteError;
use casenote_core::traits::{Adapter, GenerativeBackend, ProviderAdapter};
use casenote_core::types::{Generation, GenerationRequest, HealthStatus};

enum Step {
    Reply(String),
    /// Fail as if a pool of this many credentials all failed.
    Exhausted(usize),
}

/// A [`GenerativeBackend`] that replays a script of outcomes and records
/// every request it receives.
///
/// When the script runs out, the fallback reply (if any) is returned.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Step>>,
    fallback: Option<String>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedBackend {
    /// An empty script with no fallback: every call fails.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers every call with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            fallback: Some(text.into()),
            ..Self::new()
        }
    }

    /// Appends a successful reply to the script.
    pub fn push_ok(self, text: impl Into<String>) -> Self {
        lock(&self.script).push_back(Step::Reply(text.into()));
        self
    }

    /// Appends a credential-exhaustion failure to the script.
    pub fn push_exhausted(self, credentials: usize) -> Self {
        lock(&self.script).push_back(Step::Exhausted(credentials));
        self
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    async fn call(&self, request: &GenerationRequest) -> Result<Generation, CasenoteError> {
        lock(&self.requests).push(request.clone());

        let step = lock(&self.script).pop_front();
        match step {
            Some(Step::Reply(text)) => Ok(Generation {
                text,
                credential_index: 0,
                failures: Vec::new(),
            }),
            Some(Step::Exhausted(n)) => Err(CasenoteError::CredentialsExhausted {
                attempts: (1..=n)
                    .map(|i| format!("key#{i}: scripted failure"))
                    .collect(),
            }),
            None => match &self.fallback {
                Some(text) => Ok(Generation {
                    text: text.clone(),
                    credential_index: 0,
                    failures: Vec::new(),
                }),
                None => Err(CasenoteError::Provider {
                    message: "script exhausted".to_string(),
                    source: None,
                }),
            },
        }
    }
}

/// A [`ProviderAdapter`] that rejects a chosen set of credentials and records
/// the credential used for every call.
///
/// Accepted credentials answer `reply from <key>`.
pub struct ScriptedProvider {
    rejected: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    /// A provider that accepts every credential.
    pub fn new() -> Self {
        Self {
            rejected: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Makes calls with `key` fail.
    pub fn rejecting(mut self, key: &str) -> Self {
        self.rejected.insert(key.to_string());
        self
    }

    /// Credentials used so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted-provider"
    }

    async fn health_check(&self) -> Result<HealthStatus, CasenoteError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CasenoteError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    async fn generate(
        &self,
        api_key: &str,
        _request: &GenerationRequest,
    ) -> Result<String, CasenoteError> {
        lock(&self.calls).push(api_key.to_string());
        if self.rejected.contains(api_key) {
            return Err(CasenoteError::Provider {
                message: "API error 403: key rejected".to_string(),
                source: None,
            });
        }
        Ok(format!("reply from {api_key}"))
    }
}

/// A poisoned mutex means another test thread already panicked; keep going.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
