// SPDX-FileCopyrightText: 2026 Casenote Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Liveness endpoint: `GET /health` answers `{"status":"ok"}`.

use axum::routing::get;
use axum::{Json, Router};
use casenote_core::CasenoteError;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub fn router() -> Router {
    Router::new().route("/health", get(get_health))
}

/// Binds `host:port` and serves until `cancel` fires.
pub async fn serve(host: &str, port: u16, cancel: CancellationToken) -> Result<(), CasenoteError> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| CasenoteError::Channel {
            message: format!("failed to bind health endpoint to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;
    info!("health endpoint listening on {addr}");
    serve_on(listener, cancel).await
}

/// Serves on an already-bound listener until `cancel` fires.
pub async fn serve_on(listener: TcpListener, cancel: CancellationToken) -> Result<(), CasenoteError> {
    axum::serve(listener, router())
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| CasenoteError::Channel {
            message: format!("health endpoint error: {e}"),
            source: Some(Box::new(e)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_ok_and_stops_on_cancel() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let server = tokio::spawn(serve_on(listener, cancel.clone()));

        let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body, serde_json::json!({"status": "ok"}));

        cancel.cancel();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        tokio::spawn(serve_on(listener, cancel.clone()));

        let response = reqwest::get(format!("http://{addr}/metrics")).await.unwrap();
        assert_eq!(response.status(), 404);
        cancel.cancel();
    }
}
