// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Google Gemini backend for Casenote.
//!
//! [`GeminiProvider`] implements [`ProviderAdapter`]: one `generateContent`
//! call with one credential. [`KeyRotationClient`] wraps any provider with
//! sequential fallback across the credential pool.

pub mod client;
pub mod rotation;
pub mod types;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use casenote_config::model::GeminiConfig;
use casenote_core::CasenoteError;
use casenote_core::traits::{Adapter, ProviderAdapter};
use casenote_core::types::{ContentPart, GenerationRequest, HealthStatus};
use tracing::{debug, info};

pub use client::GeminiClient;
pub use rotation::KeyRotationClient;

use crate::types::{Blob, Content, GenerateContentRequest, Part};

/// Gemini provider implementing [`ProviderAdapter`].
pub struct GeminiProvider {
    client: GeminiClient,
}

impl GeminiProvider {
    pub fn new(config: &GeminiConfig) -> Result<Self, CasenoteError> {
        let client = GeminiClient::new(config)?;
        info!(model = client.model(), "Gemini provider initialized");
        Ok(Self { client })
    }
}

/// Maps a backend-neutral request onto the wire format: the instruction
/// becomes `systemInstruction`, the parts one user turn.
pub fn to_wire_request(request: &GenerationRequest) -> GenerateContentRequest {
    let parts = request
        .parts
        .iter()
        .map(|part| match part {
            ContentPart::Text(text) => Part::Text { text: text.clone() },
            ContentPart::InlineData { mime_type, data } => Part::InlineData {
                inline_data: Blob {
                    mime_type: mime_type.clone(),
                    data: STANDARD.encode(data),
                },
            },
        })
        .collect();

    let system_instruction = (!request.instruction.trim().is_empty()).then(|| Content {
        role: None,
        parts: vec![Part::Text {
            text: request.instruction.clone(),
        }],
    });

    GenerateContentRequest {
        system_instruction,
        contents: vec![Content {
            role: Some("user".to_string()),
            parts,
        }],
    }
}

#[async_trait]
impl Adapter for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn health_check(&self) -> Result<HealthStatus, CasenoteError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CasenoteError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for GeminiProvider {
    async fn generate(
        &self,
        api_key: &str,
        request: &GenerationRequest,
    ) -> Result<String, CasenoteError> {
        let wire = to_wire_request(request);
        debug!(parts = request.parts.len(), "sending generateContent request");

        let response = self.client.generate_content(api_key, &wire).await?;
        response.text().ok_or_else(|| CasenoteError::Provider {
            message: response.empty_reason(),
            source: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use casenote_core::traits::GenerativeBackend;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> GeminiProvider {
        GeminiProvider::new(&GeminiConfig {
            base_url: server.uri(),
            ..GeminiConfig::default()
        })
        .unwrap()
    }

    fn ok_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}, "finishReason": "STOP"}]
        })
    }

    #[test]
    fn wire_request_encodes_inline_data() {
        let wire = to_wire_request(&GenerationRequest {
            instruction: "profile".into(),
            parts: vec![
                ContentPart::InlineData {
                    mime_type: "application/pdf".into(),
                    data: vec![0, 1, 2],
                },
                ContentPart::Text("prompt".into()),
            ],
        });

        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "profile");
        assert_eq!(json["contents"][0]["parts"][0]["inlineData"]["data"], "AAEC");
        assert_eq!(
            json["contents"][0]["parts"][0]["inlineData"]["mimeType"],
            "application/pdf"
        );
        assert_eq!(json["contents"][0]["parts"][1]["text"], "prompt");
    }

    #[test]
    fn blank_instruction_is_omitted() {
        let wire = to_wire_request(&GenerationRequest {
            instruction: "  ".into(),
            parts: vec![],
        });
        assert!(wire.system_instruction.is_none());
    }

    #[tokio::test]
    async fn generate_returns_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "systemInstruction": {"parts": [{"text": "profile"}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("synthesis")))
            .mount(&server)
            .await;

        let text = provider(&server)
            .generate(
                "k",
                &GenerationRequest {
                    instruction: "profile".into(),
                    parts: vec![ContentPart::Text("hi".into())],
                },
            )
            .await
            .unwrap();
        assert_eq!(text, "synthesis");
    }

    #[tokio::test]
    async fn empty_candidate_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"finishReason": "SAFETY"}]
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .generate(
                "k",
                &GenerationRequest {
                    instruction: String::new(),
                    parts: vec![],
                },
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SAFETY"), "got: {err}");
    }

    #[tokio::test]
    async fn rotation_over_real_http_skips_rejected_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-goog-api-key", "revoked"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"code": 400, "message": "API key expired", "status": "INVALID_ARGUMENT"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("x-goog-api-key", "valid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("from valid key")))
            .expect(1)
            .mount(&server)
            .await;

        let rotation =
            KeyRotationClient::from_keys(["revoked", "valid"], Arc::new(provider(&server))).unwrap();
        let generation = rotation
            .call(&GenerationRequest {
                instruction: "p".into(),
                parts: vec![],
            })
            .await
            .unwrap();

        assert_eq!(generation.text, "from valid key");
        assert_eq!(generation.credential_index, 1);
        assert!(generation.failures[0].contains("INVALID_ARGUMENT"));
    }
}
