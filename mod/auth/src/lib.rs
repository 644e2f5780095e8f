//! Auth module — OIDC federation with PKCE, sealed sessions, API keys.
//!
//! # Resources
//!
//! - **Provider** — a configured OIDC identity provider, addressed by id
//! - **PendingLogin** — one in-flight login attempt (state → verifier)
//! - **Session** — sealed `session` cookie carrying `"<provider>:<idToken>"`
//! - **API key** — opaque `hab_live_` bearer credential, stored as a hash
//!
//! # Usage
//!
//! ```ignore
//! use auth::service::{AuthService, ProviderConfig};
//!
//! let svc = AuthService::configure(providers, store, ttls).await?;
//! let public = auth::api::public_routes(svc.clone());
//! let protected = auth::api::protected_routes(svc.clone());
//! svc.spawn_janitors();
//! ```

pub mod api;
pub mod model;
pub mod service;
