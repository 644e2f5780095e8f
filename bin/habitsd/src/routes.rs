//! Route registration — module routes, system endpoints, middleware stack.

use std::sync::Arc;

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

use auth::service::AuthService;
use tracker::service::TrackerService;

use crate::metrics::http_metrics;

/// Everything the router needs at assembly time.
pub struct AppContext {
    pub tracker: Arc<TrackerService>,
    /// Present exactly when auth is enabled.
    pub auth: Option<Arc<AuthService>>,
    pub metrics: PrometheusHandle,
}

/// Build the complete router.
///
/// Layer order (outer to inner): request-ID tagger → metrics timer →
/// auth (protected routes only) → per-user metrics → handler. The access
/// logger and slash normaliser wrap the whole router in `main`.
pub fn build_router(ctx: AppContext) -> Router {
    let auth_enabled = ctx.auth.is_some();

    let mut protected = tracker::api::build_router(ctx.tracker, auth_enabled);
    if let Some(auth_svc) = &ctx.auth {
        protected = protected
            .merge(auth::api::protected_routes(auth_svc.clone()))
            .layer(axum::middleware::from_fn(
                auth::api::middleware::user_metrics,
            ))
            .layer(axum::middleware::from_fn_with_state(
                auth_svc.clone(),
                auth::api::middleware::require_user,
            ));
    }

    let metrics_handle = ctx.metrics;
    let mut app = Router::new()
        .route("/version", get(version))
        .route("/healthz", get(healthz))
        .route(
            "/metrics",
            get(move || {
                let handle = metrics_handle.clone();
                async move { handle.render() }
            }),
        )
        .merge(protected);

    if let Some(auth_svc) = ctx.auth {
        app = app.merge(auth::api::public_routes(auth_svc));
    }

    app.layer(axum::middleware::from_fn(http_metrics))
        .layer(axum::middleware::from_fn(request_id))
}

/// Access log line per request. Wraps the whole router (outside the slash
/// normaliser) so even unroutable paths are logged.
pub async fn access_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = std::time::Instant::now();

    let resp = next.run(req).await;

    tracing::info!(
        %method,
        path,
        status = resp.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "request",
    );
    resp
}

/// Tag each request with a fresh ID: a span field for log correlation and
/// an `x-request-id` response header.
async fn request_id(req: Request, next: Next) -> Response {
    use tracing::Instrument;

    let id = habits_core::new_id();
    let span = tracing::info_span!("request", request_id = %id);

    let mut resp = next.run(req).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        resp.headers_mut().insert("x-request-id", value);
    }
    resp
}

async fn version() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": "habitsd",
        "version": env!("CARGO_PKG_VERSION"),
        "build_date": option_env!("BUILD_DATE").unwrap_or("unknown"),
    }))
}

async fn healthz() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::{Layer, ServiceExt};
    use tower_http::normalize_path::NormalizePathLayer;

    use habits_store::MemStore;

    fn test_router() -> Router {
        let store = Arc::new(MemStore::new());
        build_router(AppContext {
            tracker: TrackerService::new(store),
            auth: None,
            metrics: crate::metrics::test_handle(),
        })
    }

    async fn get_json(app: &Router, path: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .clone()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn test_version_and_healthz_are_public() {
        let app = test_router();

        let (status, body) = get_json(&app, "/version").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "habitsd");
        assert!(body["version"].is_string());

        let (status, body) = get_json(&app, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_metrics_endpoint_renders_prometheus_text() {
        let app = test_router();

        // Generate one request worth of metrics first.
        let _ = get_json(&app, "/version").await;

        let resp = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_responses_carry_a_request_id() {
        let app = test_router();
        let resp = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let id = resp.headers().get("x-request-id").unwrap().to_str().unwrap();
        assert_eq!(id.len(), 32);
    }

    #[tokio::test]
    async fn test_auth_disabled_serves_habits_anonymously() {
        let app = test_router();

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/habits")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"name":"guitar","note":"","timestamp":1700000000}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let (status, body) = get_json(&app, "/habits").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"habits": ["guitar"]}));
    }

    #[tokio::test]
    async fn test_trailing_slashes_are_normalised() {
        // The binary wraps the router exactly like this before serving.
        let app = NormalizePathLayer::trim_trailing_slash().layer(test_router());

        let resp = app
            .oneshot(Request::builder().uri("/habits/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
