//! Typed repository over the ordered KV engine.
//!
//! Presents the storage capability set the server is written against:
//! per-user habit entries, the global API-key hash index, and per-user
//! refresh-token records. Two interchangeable variants exist — [`KvStore`]
//! on redb for production and [`MemStore`] for tests.
//!
//! # Key layout
//!
//! - `users/<user_id>/habits/<name>/<RFC3339>` → JSON habit entry
//! - `users/api_keys/<sha256-hex>` → user id
//! - `users/refresh_tokens/<user_id>` → JSON token record
//!
//! RFC 3339 timestamps in UTC have a fixed width, so key order within one
//! habit's prefix is chronological order.

pub mod kv;
pub mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use kv::KvStore;
pub use memory::MemStore;

/// One observation that a named habit was performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitEntry {
    pub name: String,
    #[serde(default)]
    pub note: String,
    pub timestamp: i64,
}

/// An OAuth token record kept for refresh: access + refresh + id token
/// with the access-token expiry in unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub id_token: String,
    pub expiry: i64,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<habits_kv::KVError> for StoreError {
    fn from(e: habits_kv::KVError) -> Self {
        match e {
            habits_kv::KVError::Storage(m) => StoreError::Storage(m),
            habits_kv::KVError::Serialization(m) => StoreError::Serialization(m),
        }
    }
}

/// The repository capability set.
///
/// All operations are safe for concurrent callers. No method ever returns
/// data belonging to a user other than the one named in its arguments;
/// API keys are global but resolve to exactly one user id.
pub trait Store: Send + Sync {
    /// Append a habit entry. Writing the same (name, timestamp) twice
    /// silently replaces the stored value.
    fn put_habit(&self, user_id: &str, entry: &HabitEntry) -> Result<(), StoreError>;

    /// The deduplicated set of habit names owned by the user. Never fails
    /// with "not found" — a user with no habits gets an empty vec.
    fn list_habit_names(&self, user_id: &str) -> Result<Vec<String>, StoreError>;

    /// All entries for one habit in chronological order.
    fn get_habit(&self, user_id: &str, name: &str) -> Result<Vec<HabitEntry>, StoreError>;

    /// Delete every entry under the habit name. Idempotent.
    fn delete_habit(&self, user_id: &str, name: &str) -> Result<(), StoreError>;

    fn put_api_key(&self, key_hash: &str, user_id: &str) -> Result<(), StoreError>;
    fn get_api_key(&self, key_hash: &str) -> Result<Option<String>, StoreError>;
    fn list_api_key_hashes(&self, user_id: &str) -> Result<Vec<String>, StoreError>;
    fn delete_api_key(&self, key_hash: &str) -> Result<(), StoreError>;

    fn put_refresh_token(&self, user_id: &str, token: &TokenRecord) -> Result<(), StoreError>;
    fn get_refresh_token(&self, user_id: &str) -> Result<Option<TokenRecord>, StoreError>;
    fn delete_refresh_token(&self, user_id: &str) -> Result<(), StoreError>;
}

/// Format an entry timestamp as the fixed-width UTC RFC 3339 key segment.
pub(crate) fn rfc3339_key(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .unwrap_or_default()
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc3339_key_is_fixed_width_utc() {
        let key = rfc3339_key(1_700_000_000);
        assert_eq!(key, "2023-11-14T22:13:20Z");
        assert_eq!(key.len(), 20);
    }

    #[test]
    fn test_rfc3339_key_order_matches_time_order() {
        let a = rfc3339_key(1_700_000_000);
        let b = rfc3339_key(1_700_000_001);
        assert!(a < b);
    }
}
