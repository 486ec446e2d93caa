// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Gemini `generateContent` endpoint.
//!
//! The credential is supplied per request so one client (and one connection
//! pool) serves the whole key pool. There is no per-key retry: a failed call
//! is reported to the rotation layer, which moves on to the next credential.

use std::time::Duration;

use casenote_config::model::GeminiConfig;
use casenote_core::CasenoteError;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::debug;

use crate::types::{ApiErrorResponse, GenerateContentRequest, GenerateContentResponse};

/// HTTP client for Gemini API communication.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// Creates a client for the configured model and endpoint.
    pub fn new(config: &GeminiConfig) -> Result<Self, CasenoteError> {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CasenoteError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Sends one request with `api_key` and returns the parsed response.
    pub async fn generate_content(
        &self,
        api_key: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, CasenoteError> {
        let key = HeaderValue::from_str(api_key).map_err(|e| {
            CasenoteError::Config(format!("credential is not a valid header value: {e}"))
        })?;

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                // reqwest errors can carry the URL; strip it to keep output tidy.
                let e = e.without_url();
                CasenoteError::Provider {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                }
            })?;

        let status = response.status();
        debug!(status = %status, model = %self.model, "generateContent response received");

        let body = response.text().await.map_err(|e| CasenoteError::Provider {
            message: format!("failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => format!(
                    "Gemini API error {} ({}): {}",
                    status.as_u16(),
                    api_err.error.status,
                    api_err.error.message
                ),
                Err(_) => format!("API returned {status}"),
            };
            return Err(CasenoteError::Provider {
                message,
                source: None,
            });
        }

        serde_json::from_str(&body).map_err(|e| CasenoteError::Provider {
            message: format!("failed to parse API response: {e}"),
            source: Some(Box::new(e)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Content, Part};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> GeminiClient {
        GeminiClient::new(&GeminiConfig {
            base_url: format!("{base_url}/v1beta/"),
            ..GeminiConfig::default()
        })
        .unwrap()
    }

    fn test_request() -> GenerateContentRequest {
        GenerateContentRequest {
            system_instruction: None,
            contents: vec![Content {
                role: Some("user".into()),
                parts: vec![Part::Text {
                    text: "Hello".into(),
                }],
            }],
        }
    }

    #[tokio::test]
    async fn sends_key_header_to_model_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "key-one"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "Hi"}]}, "finishReason": "STOP"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let response = client.generate_content("key-one", &test_request()).await.unwrap();
        assert_eq!(response.text().as_deref(), Some("Hi"));
    }

    #[tokio::test]
    async fn api_error_is_described() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {"code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED"}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .generate_content("bad", &test_request())
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("PERMISSION_DENIED"), "got: {err}");
        assert!(err.contains("403"), "got: {err}");
    }

    #[tokio::test]
    async fn no_retry_on_transient_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(client.generate_content("k", &test_request()).await.is_err());
    }

    #[tokio::test]
    async fn malformed_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .generate_content("k", &test_request())
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("failed to parse"), "got: {err}");
    }
}
