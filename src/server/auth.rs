/// API-key authentication for org-scoped routes.
///
/// Keys are opaque bearer tokens; only their SHA-256 hex ever reaches
/// the store. A request presents its key either as
/// `Authorization: Bearer <key>` or in the `x-agenttrail-key` header.
/// The verification endpoint stays public and never touches this.
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use super::AppState;
use crate::poa;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Build a `(status, json)` error tuple for handler rejections.
pub fn error_response(status: StatusCode, message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

/// Hash an API key the way the store keeps it.
pub fn hash_api_key(key: &str) -> String {
    poa::sha256_hex(key.as_bytes())
}

/// Authenticated organization extracted from the API key.
///
/// Use this as an extractor in route handlers to require authentication:
/// ```ignore
/// async fn handler(auth: AuthOrg) -> impl IntoResponse { ... }
/// ```
#[derive(Debug, Clone)]
pub struct AuthOrg {
    pub org_id: Uuid,
}

/// Pull the raw key out of the request headers.
fn extract_api_key(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string());

    bearer
        .or_else(|| {
            parts
                .headers
                .get("x-agenttrail-key")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
        })
        .filter(|k| !k.is_empty())
}

impl FromRequestParts<Arc<AppState>> for AuthOrg {
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let key = extract_api_key(parts).ok_or_else(|| {
            error_response(
                StatusCode::UNAUTHORIZED,
                "Missing API key. Provide Authorization: Bearer <key>.",
            )
        })?;

        let api_key = state
            .store
            .find_api_key(&hash_api_key(&key))
            .await
            .map_err(|e| {
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &format!("Failed to look up API key: {e}"),
                )
            })?
            .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "Invalid API key"))?;

        let org = state
            .store
            .get_org(api_key.org_id)
            .await
            .map_err(|e| {
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &format!("Failed to look up organization: {e}"),
                )
            })?
            .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "Invalid API key"))?;

        if api_key.revoked || org.status != "active" {
            return Err(error_response(StatusCode::FORBIDDEN, "API key inactive"));
        }

        Ok(AuthOrg {
            org_id: api_key.org_id,
        })
    }
}
