use std::time::Duration;

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use tracing::{debug, info};

use crate::model::{DiscoveryDoc, ProviderConfig, TokenResponse};
use crate::service::pending::PendingLogins;
use crate::service::AuthError;

/// How long a pending login may wait for its callback.
const PENDING_LOGIN_TTL: Duration = Duration::from_secs(5 * 60);

/// One configured OIDC provider after discovery: resolved endpoints, the
/// provider's signing keys, and this provider's pending-login map.
pub struct OidcProvider {
    pub id: String,
    pub name: String,
    pub client_id: String,
    client_secret: String,
    pub redirect_url: String,
    scopes: Vec<String>,
    issuer: String,
    authorization_endpoint: String,
    token_endpoint: String,
    jwks: jsonwebtoken::jwk::JwkSet,
    pub pending: PendingLogins,
}

impl OidcProvider {
    /// Run OIDC discovery against the configured issuer and fetch its JWKS.
    pub async fn discover(
        http: &reqwest::Client,
        cfg: ProviderConfig,
    ) -> Result<Self, AuthError> {
        let well_known = format!(
            "{}/.well-known/openid-configuration",
            cfg.issuer_url.trim_end_matches('/'),
        );
        debug!(provider = %cfg.id, url = %well_known, "running OIDC discovery");

        let doc: DiscoveryDoc = http
            .get(&well_known)
            .send()
            .await
            .map_err(|e| AuthError::External(format!("OIDC discovery failed: {e}")))?
            .error_for_status()
            .map_err(|e| AuthError::External(format!("OIDC discovery failed: {e}")))?
            .json()
            .await
            .map_err(|e| AuthError::External(format!("bad discovery document: {e}")))?;

        let jwks: jsonwebtoken::jwk::JwkSet = http
            .get(&doc.jwks_uri)
            .send()
            .await
            .map_err(|e| AuthError::External(format!("JWKS fetch failed: {e}")))?
            .error_for_status()
            .map_err(|e| AuthError::External(format!("JWKS fetch failed: {e}")))?
            .json()
            .await
            .map_err(|e| AuthError::External(format!("bad JWKS document: {e}")))?;

        info!(provider = %cfg.id, issuer = %doc.issuer, "OIDC provider configured");

        Ok(Self {
            id: cfg.id,
            name: cfg.name,
            client_id: cfg.client_id,
            client_secret: cfg.client_secret,
            redirect_url: cfg.redirect_url,
            scopes: cfg.scopes,
            issuer: doc.issuer,
            authorization_endpoint: doc.authorization_endpoint,
            token_endpoint: doc.token_endpoint,
            jwks,
            pending: PendingLogins::new(PENDING_LOGIN_TTL),
        })
    }

    /// Build the authorize redirect URL for one login attempt.
    pub fn authorize_url(&self, state: &str, code_challenge: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&code_challenge={}&code_challenge_method=S256",
            self.authorization_endpoint,
            urlencoded(&self.client_id),
            urlencoded(&self.redirect_url),
            urlencoded(&self.scopes.join(" ")),
            urlencoded(state),
            urlencoded(code_challenge),
        )
    }

    /// Exchange an authorization code (with its PKCE verifier) for tokens.
    pub async fn exchange(
        &self,
        http: &reqwest::Client,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, AuthError> {
        self.token_request(
            http,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
                ("redirect_uri", &self.redirect_url),
                ("code_verifier", code_verifier),
            ],
            "code exchange",
        )
        .await
    }

    /// Trade a refresh token for a fresh token set.
    pub async fn refresh(
        &self,
        http: &reqwest::Client,
        refresh_token: &str,
    ) -> Result<TokenResponse, AuthError> {
        self.token_request(
            http,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
            ],
            "token refresh",
        )
        .await
    }

    async fn token_request(
        &self,
        http: &reqwest::Client,
        form: &[(&str, &str)],
        what: &str,
    ) -> Result<TokenResponse, AuthError> {
        let resp = http
            .post(&self.token_endpoint)
            .form(form)
            .send()
            .await
            .map_err(|e| AuthError::External(format!("{what} failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            debug!(provider = %self.id, %status, "{what} rejected by token endpoint");
            return Err(AuthError::External(format!("{what} returned {status}")));
        }

        resp.json()
            .await
            .map_err(|e| AuthError::External(format!("bad {what} response: {e}")))
    }

    /// Verify an ID token against this provider's JWKS. Checks signature,
    /// issuer, audience (= client_id) and expiry; returns the claim set.
    pub fn verify_id_token(&self, raw: &str) -> Result<serde_json::Value, AuthError> {
        let header = decode_header(raw)
            .map_err(|e| AuthError::Unauthorized(format!("malformed token: {e}")))?;

        let jwk = match &header.kid {
            Some(kid) => self.jwks.find(kid),
            None => self.jwks.keys.first(),
        }
        .ok_or_else(|| AuthError::Unauthorized("no matching signing key".into()))?;

        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| AuthError::Internal(format!("unusable signing key: {e}")))?;

        let mut validation = Validation::new(header.alg);
        validation.set_audience(&[&self.client_id]);
        validation.set_issuer(&[&self.issuer]);

        let data = decode::<serde_json::Value>(raw, &key, &validation)
            .map_err(|e| AuthError::Unauthorized(format!("invalid token: {e}")))?;
        Ok(data.claims)
    }

    /// Read the claims of an expired token without verifying anything.
    ///
    /// Only ever used to recover `iss`/`sub` on the refresh path — never
    /// for authorisation.
    pub fn decode_expired_claims(raw: &str) -> Result<serde_json::Value, AuthError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<serde_json::Value>(raw, &DecodingKey::from_secret(&[]), &validation)
            .map_err(|e| AuthError::Unauthorized(format!("unreadable token: {e}")))?;
        Ok(data.claims)
    }
}

/// Simple URL encoding for query parameters.
fn urlencoded(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => result.push(ch),
            _ => {
                let mut buf = [0u8; 4];
                for byte in ch.encode_utf8(&mut buf).bytes() {
                    result.push('%');
                    result.push_str(&format!("{byte:02X}"));
                }
            }
        }
    }
    result
}
