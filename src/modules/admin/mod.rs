//! Operator endpoints: catalogue/user totals with cache statistics, and a
//! cache flush. Admin role required.

use std::time::Instant;

use async_trait::async_trait;
use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use axum::{Json, Router};
use libris_authz::{RequireAdmin, TokenService};
use libris_cache::{Cache, CacheStatsSnapshot};
use libris_http::AppError;
use libris_kernel::Module;
use serde::Serialize;
use serde_json::json;

use super::auth::AuthService;
use super::books::BookService;

#[derive(Clone)]
pub struct AdminState {
    pub books: BookService,
    pub auth: AuthService,
    pub cache: Cache,
    pub tokens: TokenService,
    pub started_at: Instant,
}

impl FromRef<AdminState> for TokenService {
    fn from_ref(state: &AdminState) -> Self {
        state.tokens.clone()
    }
}

#[derive(Debug, Serialize)]
pub struct CacheReport {
    pub backend: &'static str,
    /// `None` when the backend could not be asked
    pub entries: Option<u64>,
    #[serde(flatten)]
    pub stats: CacheStatsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub books_total: i64,
    pub users_total: i64,
    pub cache: CacheReport,
    pub uptime_secs: u64,
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/stats", get(stats))
        .route("/cache", delete(flush_cache))
        .with_state(state)
}

async fn stats(
    State(state): State<AdminState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<impl IntoResponse, AppError> {
    let books_total = state.books.count().await?;
    let users_total = state.auth.count().await?;

    let entries = match state.cache.len().await {
        Ok(entries) => Some(entries),
        Err(err) => {
            tracing::warn!(error = %err, "could not size cache");
            None
        }
    };

    Ok(Json(StatsReport {
        books_total,
        users_total,
        cache: CacheReport {
            backend: state.cache.backend(),
            entries,
            stats: state.cache.stats(),
        },
        uptime_secs: state.started_at.elapsed().as_secs(),
    }))
}

async fn flush_cache(
    State(state): State<AdminState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<StatusCode, AppError> {
    state
        .cache
        .flush()
        .await
        .map_err(|err| AppError::Internal(anyhow::Error::new(err).context("cache flush failed")))?;
    tracing::info!(admin = %admin.username, "cache flushed");
    Ok(StatusCode::NO_CONTENT)
}

pub struct AdminModule {
    state: AdminState,
}

impl AdminModule {
    pub fn new(state: AdminState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for AdminModule {
    fn name(&self) -> &'static str {
        "admin"
    }

    fn routes(&self) -> Option<Router> {
        Some(router(self.state.clone()))
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = json!({
            "description": "Error",
            "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ErrorResponse"}}}
        });
        Some(json!({
            "paths": {
                "/stats": {
                    "get": {
                        "summary": "Book and user totals, cache statistics and uptime",
                        "tags": ["Admin"],
                        "security": [{"bearerAuth": []}],
                        "responses": {"200": {"description": "Statistics"}, "401": error, "403": error}
                    }
                },
                "/cache": {
                    "delete": {
                        "summary": "Flush the cache",
                        "tags": ["Admin"],
                        "security": [{"bearerAuth": []}],
                        "responses": {"204": {"description": "Flushed"}, "401": error, "403": error}
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::auth::models::RegisterRequest;
    use crate::testing::{self, InMemoryBooks, InMemoryUsers};
    use axum::body::Body;
    use axum::http::Request;
    use libris_authz::Role;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn state() -> AdminState {
        let tokens = testing::tokens();
        let cache = Cache::in_memory();
        let books = BookService::new(
            Arc::new(InMemoryBooks::default()),
            cache.clone(),
            Duration::from_secs(600),
            Duration::from_secs(300),
        );
        let auth = AuthService::new(Arc::new(InMemoryUsers::default()), tokens.clone(), 6);
        auth.register(RegisterRequest {
            username: "alice".to_string(),
            password: "secret1".to_string(),
            email: "alice@example.com".to_string(),
        })
        .await
        .unwrap();

        AdminState {
            books,
            auth,
            cache,
            tokens,
            started_at: Instant::now(),
        }
    }

    fn request(method: &str, uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn stats_report_totals_for_admins() {
        let state = state().await;
        let token = state.tokens.issue(1, "root", Role::Admin).unwrap();

        let response = router(state).oneshot(request("GET", "/stats", &token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = testing::body_json(response).await;
        assert_eq!(body["books_total"], 0);
        assert_eq!(body["users_total"], 1);
        assert_eq!(body["cache"]["backend"], "memory");
        assert!(body["cache"]["hit_ratio"].is_number());
    }

    #[tokio::test]
    async fn plain_users_are_forbidden() {
        let state = state().await;
        let token = state.tokens.issue(1, "alice", Role::User).unwrap();

        let stats = router(state.clone())
            .oneshot(request("GET", "/stats", &token))
            .await
            .unwrap();
        let flush = router(state).oneshot(request("DELETE", "/cache", &token)).await.unwrap();

        assert_eq!(stats.status(), StatusCode::FORBIDDEN);
        assert_eq!(flush.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn flush_empties_the_cache() {
        let state = state().await;
        state.cache.store("book:1", &1, Duration::from_secs(60)).await;
        let token = state.tokens.issue(1, "root", Role::Admin).unwrap();

        let response = router(state.clone())
            .oneshot(request("DELETE", "/cache", &token))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(state.cache.len().await.unwrap(), 0);
    }
}
