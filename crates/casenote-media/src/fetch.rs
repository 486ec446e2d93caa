// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP download of buffered media locators.

use std::time::Duration;

use async_trait::async_trait;
use casenote_core::CasenoteError;
use casenote_core::traits::MediaFetcher;
use tracing::debug;

/// Downloads can be large videos; allow more than a typical API call.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// [`MediaFetcher`] backed by a shared reqwest client.
///
/// Locators for Telegram files embed the bot token in the path, so neither the
/// locator nor reqwest's URL-bearing error text is ever logged or returned.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, CasenoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CasenoteError::Media {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, CasenoteError> {
        let response = self.client.get(locator).send().await.map_err(|e| {
            let e = e.without_url();
            CasenoteError::Media {
                message: format!("download failed: {e}"),
                source: Some(Box::new(e)),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CasenoteError::Media {
                message: format!("download failed with status {}", status.as_u16()),
                source: None,
            });
        }

        let bytes = response.bytes().await.map_err(|e| {
            let e = e.without_url();
            CasenoteError::Media {
                message: format!("failed to read download body: {e}"),
                source: Some(Box::new(e)),
            }
        })?;
        debug!(bytes = bytes.len(), "media downloaded");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_returns_body_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file/botSECRET/photos/file_1.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(DEFAULT_DOWNLOAD_TIMEOUT).unwrap();
        let bytes = fetcher
            .fetch(&format!("{}/file/botSECRET/photos/file_1.jpg", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, vec![0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn error_status_does_not_leak_locator() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(DEFAULT_DOWNLOAD_TIMEOUT).unwrap();
        let err = fetcher
            .fetch(&format!("{}/file/botSECRET/x.pdf", server.uri()))
            .await
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("404"), "got: {text}");
        assert!(!text.contains("SECRET"), "got: {text}");
    }

    #[tokio::test]
    async fn connection_failure_does_not_leak_locator() {
        // Port 9 (discard) on localhost is closed in test environments.
        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher
            .fetch("http://127.0.0.1:9/file/botSECRET/x.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, CasenoteError::Media { .. }));
        assert!(!err.to_string().contains("SECRET"));
    }
}
