pub mod clean;

use async_trait::async_trait;
use axum::routing::post;
use axum::{Json, Router};
use libris_http::{ApiJson, AppError};
use libris_kernel::Module;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub use clean::{clean, CleanError, Operation};

#[derive(Debug, Deserialize)]
pub struct CleanRequest {
    pub url: String,
    pub operation: Operation,
}

#[derive(Debug, Serialize)]
pub struct CleanResponse {
    pub processed_url: String,
}

async fn clean_url(ApiJson(request): ApiJson<CleanRequest>) -> Result<Json<CleanResponse>, AppError> {
    let processed_url = clean(&request.url, request.operation).map_err(|err| {
        AppError::validation(vec![json!({ "field": "url", "error": err.to_string() })], "invalid url")
    })?;
    Ok(Json(CleanResponse { processed_url }))
}

pub fn router() -> Router {
    Router::new().route("/clean", post(clean_url))
}

/// Stateless URL normalization endpoint.
pub struct UrlModule;

#[async_trait]
impl Module for UrlModule {
    fn name(&self) -> &'static str {
        "url"
    }

    fn routes(&self) -> Option<Router> {
        Some(router())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/clean": {
                    "post": {
                        "summary": "Canonicalize and/or redirect-normalize a URL",
                        "tags": ["URL"],
                        "requestBody": {"required": true, "content": {"application/json": {"schema": {
                            "type": "object",
                            "properties": {
                                "url": {"type": "string"},
                                "operation": {"type": "string", "enum": ["canonical", "redirection", "all"]}
                            },
                            "required": ["url", "operation"]
                        }}}},
                        "responses": {
                            "200": {"description": "Processed url", "content": {"application/json": {"schema": {
                                "type": "object",
                                "properties": {"processed_url": {"type": "string"}}
                            }}}},
                            "400": {"description": "Unknown operation or invalid url", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ErrorResponse"}}}}
                        }
                    }
                }
            }
        }))
    }
}
