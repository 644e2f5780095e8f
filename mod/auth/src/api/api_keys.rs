use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use habits_core::{CurrentUser, ServiceError};

use crate::api::AppState;

#[derive(Serialize)]
pub struct ApiKeyResponse {
    pub api_key: String,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct KeyInfo {
    pub key_id: String,
}

#[derive(Serialize)]
pub struct KeyListResponse {
    pub keys: Vec<KeyInfo>,
}

/// POST /auth/api_keys — mint a key. The plaintext appears in this
/// response body and nowhere else, ever.
pub async fn generate(
    State(svc): State<AppState>,
    user: Option<Extension<CurrentUser>>,
) -> Result<Json<ApiKeyResponse>, ServiceError> {
    let user = require_user(user)?;
    let api_key = svc
        .issue_api_key(&user.user_id)
        .map_err(ServiceError::from)?;
    Ok(Json(ApiKeyResponse {
        api_key,
        message: "Save this key securely - it cannot be retrieved later",
    }))
}

/// GET /auth/api_keys — truncated hashes of the caller's keys.
pub async fn list(
    State(svc): State<AppState>,
    user: Option<Extension<CurrentUser>>,
) -> Result<Json<KeyListResponse>, ServiceError> {
    let user = require_user(user)?;
    let keys = svc
        .list_api_keys(&user.user_id)
        .map_err(ServiceError::from)?
        .into_iter()
        .map(|key_id| KeyInfo { key_id })
        .collect();
    Ok(Json(KeyListResponse { keys }))
}

/// DELETE /auth/api_keys/{key_hash} — revoke one of the caller's keys.
/// Deleting someone else's key is 403, an unknown hash 404.
pub async fn revoke(
    State(svc): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    Path(key_hash): Path<String>,
) -> Result<StatusCode, ServiceError> {
    let user = require_user(user)?;
    if key_hash.is_empty() {
        return Err(ServiceError::Validation("missing key hash".into()));
    }
    svc.revoke_api_key(&user.user_id, &key_hash)
        .map_err(ServiceError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

fn require_user(user: Option<Extension<CurrentUser>>) -> Result<CurrentUser, ServiceError> {
    user.map(|Extension(u)| u)
        .ok_or_else(|| ServiceError::Unauthorized("unauthorized".into()))
}
