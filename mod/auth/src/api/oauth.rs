use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use habits_core::ServiceError;
use habits_store::TokenRecord;

use crate::api::{
    clear_session_cookie, cookie_value, found, session_cookie, AppState, SESSION_COOKIE,
};
use crate::model::user_id_from_claims;

#[derive(Deserialize)]
pub struct LoginParams {
    #[serde(rename = "return")]
    return_to: Option<String>,
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// GET /auth/login — minimal provider picker.
pub async fn provider_picker(State(svc): State<AppState>) -> Html<String> {
    let mut page = String::from(
        "<h1>Login</h1><style>button{display:block;margin:10px 0;padding:10px 20px;}</style>",
    );
    for (id, name) in svc.provider_names() {
        page.push_str(&format!(
            r#"<form action="/auth/login/{id}"><button>{name}</button></form>"#
        ));
    }
    Html(page)
}

/// GET /auth/login/{id} — start the PKCE flow and bounce to the provider.
pub async fn login(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<LoginParams>,
) -> Result<Response, ServiceError> {
    let provider = svc
        .provider(&id)
        .ok_or_else(|| ServiceError::NotFound(format!("unknown provider '{id}'")))?;

    // PKCE: 48 random bytes of verifier, S256 challenge.
    let mut verifier_bytes = [0u8; 48];
    rand::rngs::OsRng.fill_bytes(&mut verifier_bytes);
    let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);
    let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));

    let mut state_bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut state_bytes);
    let state = hex::encode(state_bytes);

    let return_to = sanitize_return(params.return_to.as_deref());
    provider.pending.put(&state, verifier, return_to);

    Ok(found(&provider.authorize_url(&state, &challenge)))
}

/// GET /auth/callback/{id} — redeem the code, seal the session.
pub async fn callback(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ServiceError> {
    let provider = svc
        .provider(&id)
        .ok_or_else(|| ServiceError::NotFound(format!("unknown provider '{id}'")))?;

    let state = params
        .state
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ServiceError::Validation("missing state".into()))?;
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ServiceError::Validation("missing code".into()))?;

    // One-shot: a replayed or expired state reads as absent.
    let saved = provider
        .pending
        .get_and_delete(&state)
        .ok_or_else(|| ServiceError::Validation("invalid or expired state".into()))?;

    let tokens = provider
        .exchange(svc.http(), &code, &saved.verifier)
        .await
        .map_err(|e| {
            warn!(provider = %id, error = %e, "code exchange failed");
            ServiceError::External("code exchange failed".into())
        })?;

    let raw_id_token = tokens
        .id_token
        .clone()
        .ok_or_else(|| ServiceError::External("no id_token".into()))?;

    let claims = provider.verify_id_token(&raw_id_token).map_err(|e| {
        warn!(provider = %id, error = %e, "callback id_token rejected");
        ServiceError::Unauthorized("id_token invalid".into())
    })?;

    // Keep the whole token set when the provider handed us a refresh
    // token, so expired sessions can be renewed without a new login.
    if let Some(refresh_token) = tokens.refresh_token.clone() {
        match user_id_from_claims(&claims) {
            Some(user_id) => {
                let record = TokenRecord {
                    access_token: tokens.access_token.clone(),
                    refresh_token,
                    id_token: raw_id_token.clone(),
                    expiry: tokens
                        .expires_in
                        .map(|secs| habits_core::now_unix() + secs)
                        .unwrap_or_default(),
                };
                if let Err(e) = svc.store_token_record(&user_id, record) {
                    warn!(user_id, error = %e, "failed to store refresh token");
                }
            }
            None => debug!("id_token carries no iss/sub; refresh token dropped"),
        }
    } else {
        debug!(provider = %id, "no refresh token in response; session renewal disabled");
    }

    let sealed = svc
        .sealer()
        .seal(&format!("{id}:{raw_id_token}"))
        .ok_or_else(|| ServiceError::Internal("session encoding failed".into()))?;

    info!(provider = %id, "login completed");
    let mut resp = found(&saved.return_to);
    resp.headers_mut().append(
        header::SET_COOKIE,
        session_cookie(&sealed, svc.session_ttl().as_secs()),
    );
    Ok(resp)
}

/// GET /auth/logout — drop the session cookie.
pub async fn logout() -> Response {
    info!("user logout completed");
    let mut resp = StatusCode::NO_CONTENT.into_response();
    resp.headers_mut()
        .append(header::SET_COOKIE, clear_session_cookie());
    resp
}

/// GET /auth/get_api_token — hand the browser its own bearer token, for
/// pasting into CLI configuration.
pub async fn get_api_token(
    State(svc): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<Response, ServiceError> {
    let sealed = cookie_value(&headers, SESSION_COOKIE)
        .ok_or_else(|| ServiceError::Unauthorized("not logged in".into()))?;
    let prefixed = svc
        .sealer()
        .unseal(&sealed)
        .ok_or_else(|| ServiceError::Unauthorized("invalid session cookie".into()))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        prefixed,
    )
        .into_response())
}

/// Keep the post-login return target relative to this host. Absolute and
/// host-bearing URLs would be open redirects; they collapse to `/`.
fn sanitize_return(return_to: Option<&str>) -> String {
    let Some(ret) = return_to.filter(|r| !r.is_empty()) else {
        return "/".to_string();
    };
    if ret.starts_with("//") {
        return "/".to_string();
    }
    if url::Url::parse(ret).is_ok() {
        // Parsed without a base, so it carries a scheme.
        return "/".to_string();
    }
    ret.to_string()
}
