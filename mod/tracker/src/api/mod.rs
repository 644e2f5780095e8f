mod habits;

use std::sync::Arc;

use axum::Router;

use crate::service::TrackerService;

/// Shared tracker route state.
#[derive(Clone)]
pub struct AppState {
    pub svc: Arc<TrackerService>,
    /// When auth is disabled there is no middleware to attach a user, and
    /// every request operates as the fixed user "anonymous".
    pub auth_enabled: bool,
}

/// Build the `/habits` router. The caller layers the auth middleware on top
/// for protected deployments.
pub fn build_router(svc: Arc<TrackerService>, auth_enabled: bool) -> Router {
    habits::routes().with_state(AppState { svc, auth_enabled })
}
