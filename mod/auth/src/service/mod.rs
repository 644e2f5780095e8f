pub mod apikey;
pub mod pending;
pub mod provider;
pub mod session;
pub mod tokens;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use habits_core::ServiceError;
use habits_store::{Store, StoreError, TokenRecord};

use crate::model::{user_id_from_claims, ProviderConfig};
use crate::service::provider::OidcProvider;
use crate::service::session::SessionSealer;
use crate::service::tokens::TokenCache;

/// Auth service error type.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Storage(String),

    #[error("{0}")]
    External(String),

    #[error("{0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::Storage(e.to_string())
    }
}

impl From<AuthError> for ServiceError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Validation(m) => ServiceError::Validation(m),
            AuthError::Unauthorized(m) => ServiceError::Unauthorized(m),
            AuthError::Forbidden(m) => ServiceError::Forbidden(m),
            AuthError::NotFound(m) => ServiceError::NotFound(m),
            AuthError::Storage(m) => ServiceError::Storage(m),
            AuthError::External(m) => ServiceError::External(m),
            AuthError::Internal(m) => ServiceError::Internal(m),
        }
    }
}

/// Timing knobs for the auth service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Session cookie lifetime (default 24h).
    pub session_ttl: Duration,
    /// Refresh-token cache lifetime (default 24h).
    pub refresh_cache_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(86_400),
            refresh_cache_ttl: Duration::from_secs(86_400),
        }
    }
}

/// The auth service: provider registry, session sealer, refresh-token
/// cache, and API-key operations.
pub struct AuthService {
    providers: HashMap<String, OidcProvider>,
    sealer: SessionSealer,
    token_cache: TokenCache,
    store: Arc<dyn Store>,
    config: AuthConfig,
    http: reqwest::Client,
}

impl AuthService {
    /// Discover every configured provider and assemble the service.
    /// Any provider failing discovery is fatal.
    pub async fn configure(
        provider_cfgs: Vec<ProviderConfig>,
        store: Arc<dyn Store>,
        config: AuthConfig,
    ) -> Result<Arc<Self>, AuthError> {
        info!(count = provider_cfgs.len(), "configuring OIDC providers");
        let http = reqwest::Client::new();

        let mut providers = HashMap::new();
        for cfg in provider_cfgs {
            let id = cfg.id.clone();
            let provider = OidcProvider::discover(&http, cfg).await?;
            providers.insert(id, provider);
        }

        let refresh_cache_ttl = config.refresh_cache_ttl;
        Ok(Arc::new(Self {
            providers,
            sealer: SessionSealer::new(),
            token_cache: TokenCache::new(refresh_cache_ttl),
            store,
            config,
            http,
        }))
    }

    /// Test-only assembly without network discovery.
    #[doc(hidden)]
    pub fn with_providers(
        providers: Vec<OidcProvider>,
        store: Arc<dyn Store>,
        config: AuthConfig,
    ) -> Arc<Self> {
        let refresh_cache_ttl = config.refresh_cache_ttl;
        Arc::new(Self {
            providers: providers.into_iter().map(|p| (p.id.clone(), p)).collect(),
            sealer: SessionSealer::new(),
            token_cache: TokenCache::new(refresh_cache_ttl),
            store,
            config,
            http: reqwest::Client::new(),
        })
    }

    pub fn provider(&self, id: &str) -> Option<&OidcProvider> {
        self.providers.get(id)
    }

    /// (id, display name) pairs for the provider picker, sorted by id.
    pub fn provider_names(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .providers
            .iter()
            .map(|(id, p)| (id.clone(), p.name.clone()))
            .collect();
        out.sort();
        out
    }

    pub fn sealer(&self) -> &SessionSealer {
        &self.sealer
    }

    pub fn session_ttl(&self) -> Duration {
        self.config.session_ttl
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── Refresh-token records (write-through cache over the store) ──

    /// Persist a token record and mirror it into the cache.
    pub fn store_token_record(&self, user_id: &str, record: TokenRecord) -> Result<(), AuthError> {
        self.store.put_refresh_token(user_id, &record)?;
        self.token_cache.put(user_id, record);
        debug!(user_id, "refresh token stored");
        Ok(())
    }

    /// Load a token record, preferring the cache and repopulating it on a
    /// store hit.
    pub fn load_token_record(&self, user_id: &str) -> Result<Option<TokenRecord>, AuthError> {
        if let Some(record) = self.token_cache.get(user_id) {
            return Ok(Some(record));
        }
        match self.store.get_refresh_token(user_id)? {
            Some(record) => {
                self.token_cache.put(user_id, record.clone());
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Delete a token record from both layers.
    pub fn delete_token_record(&self, user_id: &str) -> Result<(), AuthError> {
        self.store.delete_refresh_token(user_id)?;
        self.token_cache.remove(user_id);
        Ok(())
    }

    // ── Token refresh ──

    /// Attempt to refresh an expired ID token. Returns the new raw ID
    /// token on success; the caller must verify it before trusting it.
    pub async fn try_refresh(
        &self,
        provider_id: &str,
        expired_id_token: &str,
    ) -> Result<String, AuthError> {
        let provider = self
            .provider(provider_id)
            .ok_or_else(|| AuthError::Unauthorized(format!("unknown provider '{provider_id}'")))?;

        // Claims of the expired token are read unverified, solely to find
        // out whose refresh token to use.
        let claims = OidcProvider::decode_expired_claims(expired_id_token)?;
        let user_id = user_id_from_claims(&claims)
            .ok_or_else(|| AuthError::Unauthorized("token has no iss/sub".into()))?;

        let record = self
            .load_token_record(&user_id)?
            .ok_or_else(|| AuthError::Unauthorized("no refresh token on record".into()))?;

        let refreshed = match provider.refresh(&self.http, &record.refresh_token).await {
            Ok(resp) => resp,
            Err(e) => {
                // A rejected refresh token is dead; drop it so the next
                // attempt fails fast.
                warn!(user_id, provider = provider_id, error = %e, "token refresh failed");
                self.delete_token_record(&user_id)?;
                return Err(e);
            }
        };

        let id_token = refreshed
            .id_token
            .clone()
            .ok_or_else(|| AuthError::External("refresh response carried no id_token".into()))?;

        let new_record = TokenRecord {
            access_token: refreshed.access_token,
            refresh_token: refreshed
                .refresh_token
                .unwrap_or(record.refresh_token),
            id_token: id_token.clone(),
            expiry: refreshed
                .expires_in
                .map(|secs| habits_core::now_unix() + secs)
                .unwrap_or(record.expiry),
        };
        self.store_token_record(&user_id, new_record)?;

        debug!(user_id, provider = provider_id, "token refreshed");
        Ok(id_token)
    }

    // ── API keys ──

    /// Mint a new API key for the user, returning the plaintext. This is
    /// the only time the plaintext exists outside the response body.
    pub fn issue_api_key(&self, user_id: &str) -> Result<String, AuthError> {
        let plaintext = apikey::generate_api_key();
        let key_hash = apikey::hash_api_key(&plaintext);
        self.store.put_api_key(&key_hash, user_id)?;
        info!(user_id, key_hash = %apikey::truncate_hash(&key_hash), "API key issued");
        Ok(plaintext)
    }

    /// Truncated hashes of the user's keys.
    pub fn list_api_keys(&self, user_id: &str) -> Result<Vec<String>, AuthError> {
        Ok(self
            .store
            .list_api_key_hashes(user_id)?
            .iter()
            .map(|h| apikey::truncate_hash(h))
            .collect())
    }

    /// Delete one of the caller's keys. Foreign keys are a Forbidden
    /// error, unknown hashes NotFound.
    pub fn revoke_api_key(&self, user_id: &str, key_hash: &str) -> Result<(), AuthError> {
        let owner = self
            .store
            .get_api_key(key_hash)?
            .ok_or_else(|| AuthError::NotFound("key not found".into()))?;

        if owner != user_id {
            warn!(
                user_id,
                owner, "user attempted to delete another user's API key"
            );
            return Err(AuthError::Forbidden("forbidden".into()));
        }

        self.store.delete_api_key(key_hash)?;
        info!(user_id, key_hash = %apikey::truncate_hash(key_hash), "API key deleted");
        Ok(())
    }

    /// Resolve a plaintext `hab_live_` bearer to its owning user id.
    pub fn lookup_api_key(&self, plaintext: &str) -> Result<Option<String>, AuthError> {
        Ok(self.store.get_api_key(&apikey::hash_api_key(plaintext))?)
    }

    // ── Janitor ──

    /// Spawn the background sweeper: once a minute, evict expired pending
    /// logins and cached refresh tokens.
    pub fn spawn_janitors(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let svc = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(60));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                for provider in svc.providers.values() {
                    provider.pending.sweep();
                }
                svc.token_cache.sweep();
            }
        })
    }

    #[doc(hidden)]
    pub fn token_cache(&self) -> &TokenCache {
        &self.token_cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use habits_store::MemStore;

    fn test_service() -> Arc<AuthService> {
        AuthService::with_providers(
            Vec::new(),
            Arc::new(MemStore::new()),
            AuthConfig::default(),
        )
    }

    fn record(tag: &str) -> TokenRecord {
        TokenRecord {
            access_token: format!("at-{tag}"),
            refresh_token: format!("rt-{tag}"),
            id_token: format!("it-{tag}"),
            expiry: 0,
        }
    }

    #[test]
    fn test_token_records_write_through() {
        let svc = test_service();

        svc.store_token_record("u", record("1")).unwrap();
        assert_eq!(svc.load_token_record("u").unwrap().unwrap().refresh_token, "rt-1");

        // The record survives a cache eviction because the store has it.
        svc.token_cache().remove("u");
        assert_eq!(svc.load_token_record("u").unwrap().unwrap().refresh_token, "rt-1");
        // ...and the miss repopulated the cache.
        assert_eq!(svc.token_cache().len(), 1);

        svc.delete_token_record("u").unwrap();
        assert!(svc.load_token_record("u").unwrap().is_none());
    }

    #[test]
    fn test_api_key_issue_list_revoke() {
        let svc = test_service();

        let key = svc.issue_api_key("user-aaaaaaaa").unwrap();
        assert!(key.starts_with("hab_live_"));

        // The plaintext resolves back to the user; listings only carry
        // truncated hashes.
        assert_eq!(
            svc.lookup_api_key(&key).unwrap().as_deref(),
            Some("user-aaaaaaaa")
        );
        let listed = svc.list_api_keys("user-aaaaaaaa").unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].ends_with("..."));
        assert!(!listed[0].contains(&key));

        let full_hash = apikey::hash_api_key(&key);
        svc.revoke_api_key("user-aaaaaaaa", &full_hash).unwrap();
        assert!(svc.lookup_api_key(&key).unwrap().is_none());
    }

    #[test]
    fn test_revoking_foreign_key_is_forbidden() {
        let svc = test_service();

        let key = svc.issue_api_key("user-aaaaaaaa").unwrap();
        let hash = apikey::hash_api_key(&key);

        assert!(matches!(
            svc.revoke_api_key("user-bbbbbbbb", &hash),
            Err(AuthError::Forbidden(_))
        ));
        // The key still works.
        assert!(svc.lookup_api_key(&key).unwrap().is_some());

        assert!(matches!(
            svc.revoke_api_key("user-aaaaaaaa", "deadbeef"),
            Err(AuthError::NotFound(_))
        ));
    }
}
