use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// One in-flight OIDC login attempt, keyed by its `state` parameter.
#[derive(Debug, Clone)]
pub struct PendingLogin {
    /// PKCE code verifier (base64url of 48 random bytes).
    pub verifier: String,
    /// Sanitised relative path to return to after the callback.
    pub return_to: String,
    expire_at: Instant,
}

/// Mutex-guarded map of pending logins with a fixed TTL.
///
/// `get_and_delete` is the only consumer operation: a state value can be
/// redeemed at most once, and an expired entry reads as absent even
/// before the janitor sweeps it.
pub struct PendingLogins {
    ttl: Duration,
    entries: Mutex<HashMap<String, PendingLogin>>,
}

impl PendingLogins {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn put(&self, state: &str, verifier: String, return_to: String) {
        let login = PendingLogin {
            verifier,
            return_to,
            expire_at: Instant::now() + self.ttl,
        };
        self.entries.lock().unwrap().insert(state.to_string(), login);
    }

    /// One-shot consume. A second call with the same state misses, as does
    /// any call after the TTL has elapsed.
    pub fn get_and_delete(&self, state: &str) -> Option<PendingLogin> {
        let login = self.entries.lock().unwrap().remove(state)?;
        if Instant::now() >= login.expire_at {
            return None;
        }
        Some(login)
    }

    /// Drop expired entries. Called by the janitor once a minute.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.entries
            .lock()
            .unwrap()
            .retain(|_, login| now < login.expire_at);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
