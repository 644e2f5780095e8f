use crate::error::KVError;

/// KVStore is an ordered key-value storage interface.
///
/// All operations are safe for concurrent callers; the backend serialises
/// writers. Keys are `/`-joined paths (`users/<id>/habits/...`), so a prefix
/// scan over `"<path>/"` is equivalent to iterating a nested bucket.
pub trait KVStore: Send + Sync {
    /// Get the value for a key. Returns None if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError>;

    /// Set a key-value pair, replacing any existing value.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError>;

    /// Delete a key. Deleting an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), KVError>;

    /// Delete several keys in one write transaction.
    fn batch_delete(&self, keys: &[&str]) -> Result<(), KVError>;

    /// Scan all keys matching a prefix. Returns (key, value) pairs in
    /// ascending key order.
    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError>;
}
