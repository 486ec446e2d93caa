// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generative backend traits.
//!
//! [`ProviderAdapter`] is the opaque single-credential inference call.
//! [`GenerativeBackend`] is what the dispatcher talks to: a call that may try
//! several credentials before giving up.

use async_trait::async_trait;

use crate::error::CasenoteError;
use crate::traits::adapter::Adapter;
use crate::types::{Generation, GenerationRequest};

/// One generative-AI invocation made with one explicit credential.
#[async_trait]
pub trait ProviderAdapter: Adapter {
    /// Submits the request with `api_key` and returns the response text.
    async fn generate(
        &self,
        api_key: &str,
        request: &GenerationRequest,
    ) -> Result<String, CasenoteError>;
}

/// A generative call that owns its credentials.
#[async_trait]
pub trait GenerativeBackend: Send + Sync + 'static {
    /// Submits the request, returning the first successful response.
    async fn call(&self, request: &GenerationRequest) -> Result<Generation, CasenoteError>;
}
