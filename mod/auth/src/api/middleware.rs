//! Request authentication and per-user metrics middleware.
//!
//! The session cookie is tried first; a bearer token is only consulted
//! when no session could be resolved — the API-key path must never
//! accidentally satisfy a browser request that carried a session.

use axum::extract::{MatchedPath, Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use metrics::counter;
use tracing::debug;

use habits_core::{AuthMethod, CurrentUser, ServiceError};

use crate::api::{clear_session_cookie, cookie_value, found, session_cookie, AppState, SESSION_COOKIE};
use crate::model::{parse_provider_token, str_claim, user_id_from_claims};
use crate::service::apikey;

enum Denial {
    /// No credential at all: `WWW-Authenticate: Bearer realm="habits"`.
    MissingToken,
    /// A credential was present but rejected: `error="invalid_token"`.
    InvalidToken,
}

/// Count an authentication event for the metrics exposition.
pub fn record_auth_event(event_type: &str, result: &str, provider: &str) {
    counter!(
        "habits_auth_events_total",
        "event_type" => event_type.to_string(),
        "result" => result.to_string(),
        "provider" => provider.to_string()
    )
    .increment(1);
}

/// Authenticate the request and attach a [`CurrentUser`] to it, or reject.
pub async fn require_user(
    State(svc): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let wants_html = req.method() == Method::GET && accepts_html(req.headers());

    // 1) Session cookie first.
    let mut provider_id: Option<String> = None;
    let mut raw_token: Option<String> = None;
    let mut from_cookie = false;

    if let Some(sealed) = cookie_value(req.headers(), SESSION_COOKIE) {
        match svc.sealer().unseal(&sealed) {
            Some(prefixed) => match parse_provider_token(&prefixed) {
                Some((pid, token)) if svc.provider(pid).is_some() => {
                    provider_id = Some(pid.to_string());
                    raw_token = Some(token.to_string());
                    from_cookie = true;
                }
                Some((pid, _)) => debug!(provider = pid, "unknown provider in session"),
                None => debug!("malformed session payload"),
            },
            None => debug!("unreadable session cookie"),
        }
    }

    // 2) Bearer token, only when no session resolved.
    if raw_token.is_none() {
        if let Some(bearer) = bearer_token(req.headers()).map(str::to_string) {
            if bearer.starts_with(apikey::API_KEY_PREFIX) {
                return match svc.lookup_api_key(&bearer) {
                    Ok(Some(user_id)) => {
                        record_auth_event("api_key", "success", "local");
                        let key_hash = apikey::hash_api_key(&bearer);
                        req.extensions_mut().insert(CurrentUser {
                            user_id,
                            subject: format!("apikey:{}", apikey::truncate_hash(&key_hash)),
                            email: String::new(),
                            claims: serde_json::Value::Null,
                            auth_method: AuthMethod::ApiKey,
                        });
                        next.run(req).await
                    }
                    Ok(None) => {
                        record_auth_event("api_key", "failed", "local");
                        deny(wants_html, Denial::InvalidToken, false)
                    }
                    Err(e) => ServiceError::from(e).into_response(),
                };
            }
            match parse_provider_token(&bearer) {
                Some((pid, token)) if svc.provider(pid).is_some() => {
                    provider_id = Some(pid.to_string());
                    raw_token = Some(token.to_string());
                }
                Some((pid, _)) => debug!(provider = pid, "unknown provider in bearer token"),
                None => debug!("malformed bearer token"),
            }
        }
    }

    // 3) Nothing usable.
    let (Some(provider_id), Some(raw_token)) = (provider_id, raw_token) else {
        record_auth_event("verification", "missing_token", "none");
        return deny(wants_html, Denial::MissingToken, false);
    };

    // 4) Verify with the provider's keys; an expired or otherwise invalid
    //    token gets one refresh attempt before the request is rejected.
    let verified = match svc.provider(&provider_id) {
        Some(provider) => provider.verify_id_token(&raw_token),
        None => Err(crate::service::AuthError::Unauthorized("unknown provider".into())),
    };

    match verified {
        Ok(claims) => {
            record_auth_event("verification", "success", &provider_id);
            match build_user(&claims, from_cookie) {
                Some(user) => {
                    req.extensions_mut().insert(user);
                    next.run(req).await
                }
                None => deny(wants_html, Denial::InvalidToken, from_cookie),
            }
        }
        Err(e) => {
            debug!(provider = %provider_id, error = %e, "id token rejected; trying refresh");
            record_auth_event("verification", "verification_failed", &provider_id);

            match svc.try_refresh(&provider_id, &raw_token).await {
                Ok(new_raw) => {
                    let reverified = svc
                        .provider(&provider_id)
                        .and_then(|p| p.verify_id_token(&new_raw).ok());
                    match reverified.and_then(|claims| build_user(&claims, from_cookie)) {
                        Some(user) => {
                            record_auth_event("refresh", "success", &provider_id);
                            req.extensions_mut().insert(user);
                            let mut resp = next.run(req).await;
                            // The browser keeps working against the fresh
                            // token without ever noticing the renewal.
                            if let Some(sealed) =
                                svc.sealer().seal(&format!("{provider_id}:{new_raw}"))
                            {
                                resp.headers_mut().append(
                                    header::SET_COOKIE,
                                    session_cookie(&sealed, svc.session_ttl().as_secs()),
                                );
                            }
                            resp
                        }
                        None => {
                            record_auth_event("refresh", "failed", &provider_id);
                            deny(wants_html, Denial::InvalidToken, from_cookie)
                        }
                    }
                }
                Err(refresh_err) => {
                    debug!(provider = %provider_id, error = %refresh_err, "token refresh failed");
                    record_auth_event("refresh", "failed", &provider_id);
                    deny(wants_html, Denial::InvalidToken, from_cookie)
                }
            }
        }
    }
}

/// Count requests per authenticated user. Runs inside the auth middleware,
/// so the user extension is already attached when it fires.
pub async fn user_metrics(req: Request, next: Next) -> Response {
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let method = req.method().to_string();
    let user_id = req
        .extensions()
        .get::<CurrentUser>()
        .map(|u| u.user_id.clone());

    let resp = next.run(req).await;

    if let Some(user_id) = user_id {
        counter!(
            "habits_user_requests_total",
            "user_id" => user_id,
            "endpoint" => endpoint,
            "method" => method
        )
        .increment(1);
    }
    resp
}

fn build_user(claims: &serde_json::Value, from_cookie: bool) -> Option<CurrentUser> {
    let user_id = user_id_from_claims(claims)?;
    Some(CurrentUser {
        user_id,
        subject: str_claim(claims, "sub"),
        email: str_claim(claims, "email"),
        claims: claims.clone(),
        auth_method: if from_cookie {
            AuthMethod::Session
        } else {
            AuthMethod::Bearer
        },
    })
}

fn deny(wants_html: bool, denial: Denial, clear_cookie: bool) -> Response {
    let mut resp = if wants_html {
        found("/auth/login")
    } else {
        let challenge = match denial {
            Denial::MissingToken => HeaderValue::from_static(r#"Bearer realm="habits""#),
            Denial::InvalidToken => HeaderValue::from_static(r#"Bearer error="invalid_token""#),
        };
        let mut resp = (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "unauthorized"})),
        )
            .into_response();
        resp.headers_mut().insert(header::WWW_AUTHENTICATE, challenge);
        resp
    };

    if clear_cookie {
        resp.headers_mut()
            .append(header::SET_COOKIE, clear_session_cookie());
    }
    resp
}

/// A GET that accepts HTML — or states no preference at all — belongs to a
/// browser and gets the login redirect instead of a bare 401.
fn accepts_html(headers: &axum::http::HeaderMap) -> bool {
    match headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) {
        None => true,
        Some(accept) => accept.is_empty() || accept.contains("text/html"),
    }
}

fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}
