use serde::{Deserialize, Serialize};

/// How a request was authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Sealed `session` cookie carrying a provider-prefixed ID token.
    Session,
    /// `Authorization: Bearer <provider>:<jwt>` header.
    Bearer,
    /// `Authorization: Bearer hab_live_...` opaque key.
    ApiKey,
}

/// The authenticated user for one request.
///
/// Built by the auth middleware and attached to request extensions;
/// handlers must read it from there, never from any global.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// Deterministic opaque identifier: `user-` + 8 hex digits derived
    /// from the token's `(iss, sub)` pair. The only key habit data is
    /// stored under.
    pub user_id: String,

    /// The token `sub` claim, or `apikey:<hash prefix>` for API keys.
    pub subject: String,

    /// The token `email` claim, when present.
    pub email: String,

    /// Full claim set of the verified ID token (empty for API keys).
    pub claims: serde_json::Value,

    /// Which credential class authenticated this request.
    pub auth_method: AuthMethod,
}
