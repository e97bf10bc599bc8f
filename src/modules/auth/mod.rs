pub mod models;
pub mod repository;
pub mod routes;
pub mod service;

use async_trait::async_trait;
use axum::Router;
use libris_kernel::{InitCtx, Migration, Module};
use serde_json::json;

pub use models::User;
pub use repository::{PgUserRepository, UserRepository};
pub use routes::AuthState;
pub use service::{AuthError, AuthService};

/// Accounts: registration, login and the caller's profile.
pub struct AuthModule {
    state: AuthState,
}

impl AuthModule {
    pub fn new(state: AuthState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for AuthModule {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn routes(&self) -> Option<Router> {
        Some(routes::router(self.state.clone()))
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = json!({
            "description": "Error",
            "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ErrorResponse"}}}
        });
        let user = json!({"application/json": {"schema": {"$ref": "#/components/schemas/User"}}});

        Some(json!({
            "paths": {
                "/register": {
                    "post": {
                        "summary": "Register a user account",
                        "tags": ["Auth"],
                        "requestBody": {"required": true, "content": {"application/json": {"schema": {"$ref": "#/components/schemas/RegisterRequest"}}}},
                        "responses": {"201": {"description": "Created"}, "400": error, "409": error}
                    }
                },
                "/login": {
                    "post": {
                        "summary": "Exchange credentials for a bearer token",
                        "tags": ["Auth"],
                        "requestBody": {"required": true, "content": {"application/json": {"schema": {"$ref": "#/components/schemas/LoginRequest"}}}},
                        "responses": {
                            "200": {"description": "Token issued", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/LoginResponse"}}}},
                            "400": error,
                            "401": error
                        }
                    }
                },
                "/me": {
                    "get": {
                        "summary": "Profile of the authenticated caller",
                        "tags": ["Auth"],
                        "security": [{"bearerAuth": []}],
                        "responses": {"200": {"description": "Profile", "content": user}, "401": error, "404": error}
                    }
                }
            },
            "components": {
                "schemas": {
                    "User": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "integer", "format": "int64"},
                            "username": {"type": "string"},
                            "email": {"type": "string"},
                            "role": {"type": "string", "enum": ["user", "admin"]}
                        },
                        "required": ["id", "username", "email", "role"]
                    },
                    "RegisterRequest": {
                        "type": "object",
                        "properties": {
                            "username": {"type": "string", "minLength": 3, "maxLength": 50},
                            "password": {"type": "string", "minLength": 6},
                            "email": {"type": "string", "format": "email"}
                        },
                        "required": ["username", "password", "email"]
                    },
                    "LoginRequest": {
                        "type": "object",
                        "properties": {
                            "username": {"type": "string"},
                            "password": {"type": "string"}
                        },
                        "required": ["username", "password"]
                    },
                    "LoginResponse": {
                        "type": "object",
                        "properties": {
                            "token": {"type": "string"},
                            "token_type": {"type": "string"},
                            "expires_in": {"type": "integer"},
                            "user": {"$ref": "#/components/schemas/User"}
                        },
                        "required": ["token", "token_type", "expires_in", "user"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_create_users",
            up: r#"
                CREATE TABLE IF NOT EXISTS users (
                    id             BIGSERIAL PRIMARY KEY,
                    username       TEXT NOT NULL,
                    email          TEXT NOT NULL,
                    password_hash  TEXT NOT NULL,
                    role           TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
                    created_at     TIMESTAMPTZ NOT NULL DEFAULT now(),
                    updated_at     TIMESTAMPTZ NOT NULL DEFAULT now(),
                    deleted_at     TIMESTAMPTZ
                );
                CREATE UNIQUE INDEX IF NOT EXISTS users_username_key
                    ON users (username) WHERE deleted_at IS NULL;
                CREATE UNIQUE INDEX IF NOT EXISTS users_email_key
                    ON users (email) WHERE deleted_at IS NULL;
                "#,
        }]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        match self.state.auth.count().await {
            Ok(count) => tracing::info!(module = self.name(), users = count, "auth module started"),
            Err(err) => tracing::warn!(module = self.name(), error = %err, "could not count users"),
        }
        Ok(())
    }
}
