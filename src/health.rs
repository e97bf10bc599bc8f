//! `GET /health`: pings the database and the cache.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use libris_cache::Cache;
use serde::Serialize;
use sqlx::PgPool;

/// Something the health endpoint can ping.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn ping(&self) -> Result<(), String>;
}

#[async_trait]
impl Probe for PgPool {
    async fn ping(&self) -> Result<(), String> {
        libris_db::ping(self).await.map_err(|err| err.to_string())
    }
}

#[async_trait]
impl Probe for Cache {
    async fn ping(&self) -> Result<(), String> {
        Cache::ping(self).await.map_err(|err| err.to_string())
    }
}

#[derive(Clone)]
pub struct HealthState {
    pub database: Arc<dyn Probe>,
    pub cache: Arc<dyn Probe>,
}

#[derive(Debug, Serialize)]
pub struct DependencyStatus {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<(), String>> for DependencyStatus {
    fn from(result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self {
                status: "up",
                error: None,
            },
            Err(error) => Self {
                status: "down",
                error: Some(error),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub database: DependencyStatus,
    pub cache: DependencyStatus,
}

/// 200 when both dependencies answer, 503 otherwise.
pub async fn health(State(state): State<HealthState>) -> impl IntoResponse {
    let (database, cache) = tokio::join!(state.database.ping(), state.cache.ping());
    let healthy = database.is_ok() && cache.is_ok();

    if !healthy {
        tracing::warn!(database = ?database, cache = ?cache, "health check failed");
    }

    let report = HealthReport {
        status: if healthy { "ok" } else { "unavailable" },
        database: database.into(),
        cache: cache.into(),
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}
