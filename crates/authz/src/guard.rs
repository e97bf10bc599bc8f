//! Request guards for bearer-protected routes.
//!
//! Both extractors need a [`TokenService`] reachable from the router state
//! through `FromRef`.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use libris_http::AppError;

use crate::token::{Claims, TokenError, TokenService};
use crate::Role;

/// Authenticated caller, taken from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    fn from_claims(claims: Claims) -> Result<Self, AppError> {
        let user_id = claims
            .user_id()
            .ok_or_else(|| AppError::unauthorized("token subject is not a user id"))?;
        Ok(Self {
            user_id,
            username: claims.username,
            role: claims.role,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::unauthorized("missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("Authorization header is not valid text"))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::unauthorized("Authorization header must use the Bearer scheme"))?
        .trim();

    if token.is_empty() {
        return Err(AppError::unauthorized("empty bearer token"));
    }
    Ok(token)
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let tokens = TokenService::from_ref(state);

        let claims = tokens.verify(token).map_err(|err| {
            tracing::debug!(error = %err, "bearer token rejected");
            match err {
                TokenError::Expired => AppError::unauthorized("token expired"),
                _ => AppError::unauthorized("invalid token"),
            }
        })?;

        Self::from_claims(claims)
    }
}

/// [`AuthUser`] whose role is `admin`; other roles get 403.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AuthUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::debug!(user_id = user.user_id, role = %user.role, "admin access denied");
            return Err(AppError::forbidden("admin role required"));
        }
        Ok(Self(user))
    }
}
