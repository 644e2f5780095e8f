mod api_keys;
pub mod middleware;
mod oauth;

use std::sync::Arc;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::Router;

use crate::service::AuthService;

/// Shared auth route state.
pub type AppState = Arc<AuthService>;

/// Name of the sealed session cookie.
pub const SESSION_COOKIE: &str = "session";

/// The unauthenticated auth-flow endpoints.
pub fn public_routes(svc: AppState) -> Router {
    Router::new()
        .route("/auth/login", get(oauth::provider_picker))
        .route("/auth/login/{id}", get(oauth::login))
        .route("/auth/callback/{id}", get(oauth::callback))
        .route("/auth/logout", get(oauth::logout))
        .route("/auth/get_api_token", get(oauth::get_api_token))
        .with_state(svc)
}

/// API-key management; the caller layers the auth middleware on top.
pub fn protected_routes(svc: AppState) -> Router {
    Router::new()
        .route("/auth/api_keys", post(api_keys::generate).get(api_keys::list))
        .route("/auth/api_keys/{key_hash}", delete(api_keys::revoke))
        .with_state(svc)
}

/// Plain 302 with a Location header. `axum::response::Redirect` only
/// offers 303/307/308, and the login flow is specified as 302 Found.
pub(crate) fn found(location: &str) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, location.to_string())],
    )
        .into_response()
}

/// Build the `Set-Cookie` value carrying a sealed session.
pub(crate) fn session_cookie(sealed: &str, max_age_secs: u64) -> HeaderValue {
    // Sealed values are base64url, so this is always valid ASCII.
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={sealed}; Path=/; Max-Age={max_age_secs}; HttpOnly; Secure; SameSite=Lax"
    ))
    .expect("cookie value is ASCII")
}

/// Build the `Set-Cookie` value that clears the session.
pub(crate) fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("session=; Path=/; Max-Age=0; HttpOnly; Secure; SameSite=Lax")
}

/// Extract one cookie's value from the request headers.
pub(crate) fn cookie_value(headers: &axum::http::HeaderMap, name: &str) -> Option<String> {
    for header_value in headers.get_all(header::COOKIE) {
        let raw = header_value.to_str().ok()?;
        for pair in raw.split(';') {
            if let Some((k, v)) = pair.trim().split_once('=') {
                if k == name {
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[test]
    fn test_cookie_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc123; lang=en"),
        );
        assert_eq!(cookie_value(&headers, "session").as_deref(), Some("abc123"));
        assert_eq!(cookie_value(&headers, "theme").as_deref(), Some("dark"));
        assert!(cookie_value(&headers, "missing").is_none());
    }

    #[test]
    fn test_session_cookie_attributes() {
        let value = session_cookie("sealed-value", 86_400);
        let value = value.to_str().unwrap();
        assert!(value.starts_with("session=sealed-value;"));
        for attr in ["Path=/", "Max-Age=86400", "HttpOnly", "Secure", "SameSite=Lax"] {
            assert!(value.contains(attr), "missing {attr}");
        }
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let value = clear_session_cookie();
        assert!(value.to_str().unwrap().contains("Max-Age=0"));
    }
}
