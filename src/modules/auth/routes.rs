use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use libris_authz::{AuthUser, TokenService};
use libris_http::{ApiJson, AppError};
use serde_json::json;

use super::models::{LoginRequest, RegisterRequest, UserView};
use super::service::{AuthError, AuthService};
use crate::validation;

#[derive(Clone)]
pub struct AuthState {
    pub auth: AuthService,
    pub tokens: TokenService,
}

impl FromRef<AuthState> for TokenService {
    fn from_ref(state: &AuthState) -> Self {
        state.tokens.clone()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(errors) => {
                AppError::validation(validation::details(&errors), "invalid registration")
            }
            AuthError::UserExists => AppError::conflict(vec![], "user already exists"),
            AuthError::InvalidCredentials => AppError::unauthorized("invalid credentials"),
            AuthError::NotFound(_) => AppError::not_found("user not found"),
            other => AppError::Internal(anyhow::Error::new(other).context("auth service failed")),
        }
    }
}

pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .with_state(state)
}

async fn register(
    State(state): State<AuthState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth.register(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User created successfully",
            "user": UserView::from(&user),
        })),
    ))
}

async fn login(
    State(state): State<AuthState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.auth.login(&request.username, &request.password).await?))
}

async fn me(State(state): State<AuthState>, user: AuthUser) -> Result<impl IntoResponse, AppError> {
    let profile = state.auth.profile(user.user_id).await?;
    Ok(Json(profile))
}
