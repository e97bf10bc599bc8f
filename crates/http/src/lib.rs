//! HTTP server facade for LIBRIS: router assembly, error envelope, extractors
//! and a server loop with bounded graceful shutdown.

use std::future::IntoFuture;
use std::time::Duration;

use anyhow::Context;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::sync::watch;

use libris_kernel::settings::ServerSettings;

pub mod error;
pub mod extract;
pub mod router;

pub use error::AppError;
pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use router::RouterBuilder;

/// Serve `app` until SIGINT/SIGTERM, then let in-flight requests drain for at
/// most `server.shutdown_timeout_ms`.
pub async fn serve(app: Router, settings: &ServerSettings) -> anyhow::Result<()> {
    let address = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind to {address}"))?;

    tracing::info!("HTTP server listening on http://{}", address);

    serve_with_shutdown(listener, app, shutdown_signal(), settings.shutdown_timeout()).await
}

/// Server loop driven by an arbitrary shutdown future.
pub async fn serve_with_shutdown<F>(
    listener: tokio::net::TcpListener,
    app: Router,
    signal: F,
    drain_timeout: Duration,
) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let (draining_tx, mut draining_rx) = watch::channel(false);

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.await;
            tracing::info!("shutdown signal received; draining in-flight requests");
            let _ = draining_tx.send(true);
        })
        .into_future();

    let deadline = async move {
        if draining_rx.wait_for(|draining| *draining).await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(drain_timeout).await;
    };

    tokio::select! {
        result = server => result.context("HTTP server failed")?,
        _ = deadline => tracing::warn!(
            timeout_ms = drain_timeout.as_millis() as u64,
            "drain timeout elapsed; abandoning remaining requests"
        ),
    }

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// `GET /metrics`: Prometheus text, 404 when the recorder is disabled.
pub async fn metrics_handler() -> Response {
    match libris_telemetry::metrics::render() {
        Some(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => AppError::not_found("metrics are disabled").into_response(),
    }
}
