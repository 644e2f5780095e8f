use std::sync::Arc;

use tracing::debug;

use habits_kv::KVStore;

use crate::{rfc3339_key, HabitEntry, Store, StoreError, TokenRecord};

const ROOT: &str = "users";
const API_KEYS: &str = "api_keys";
const REFRESH_TOKENS: &str = "refresh_tokens";

/// Repository backed by the ordered KV engine.
pub struct KvStore {
    kv: Arc<dyn KVStore>,
}

impl KvStore {
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self { kv }
    }

    fn habits_prefix(user_id: &str) -> String {
        format!("{ROOT}/{user_id}/habits/")
    }

    fn habit_prefix(user_id: &str, name: &str) -> String {
        format!("{ROOT}/{user_id}/habits/{name}/")
    }

    fn api_key_path(key_hash: &str) -> String {
        format!("{ROOT}/{API_KEYS}/{key_hash}")
    }

    fn refresh_token_path(user_id: &str) -> String {
        format!("{ROOT}/{REFRESH_TOKENS}/{user_id}")
    }
}

impl Store for KvStore {
    fn put_habit(&self, user_id: &str, entry: &HabitEntry) -> Result<(), StoreError> {
        let key = format!(
            "{}{}",
            Self::habit_prefix(user_id, &entry.name),
            rfc3339_key(entry.timestamp),
        );
        let val = serde_json::to_vec(entry)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.kv.set(&key, &val)?;
        debug!(key, "habit entry stored");
        Ok(())
    }

    fn list_habit_names(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let prefix = Self::habits_prefix(user_id);
        let mut names = std::collections::BTreeSet::new();
        for (key, _) in self.kv.scan(&prefix)? {
            let rest = &key[prefix.len()..];
            if let Some((name, _)) = rest.split_once('/') {
                names.insert(name.to_string());
            }
        }
        Ok(names.into_iter().collect())
    }

    fn get_habit(&self, user_id: &str, name: &str) -> Result<Vec<HabitEntry>, StoreError> {
        let prefix = Self::habit_prefix(user_id, name);
        let mut out = Vec::new();
        for (_, val) in self.kv.scan(&prefix)? {
            let entry: HabitEntry = serde_json::from_slice(&val)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            out.push(entry);
        }
        Ok(out)
    }

    fn delete_habit(&self, user_id: &str, name: &str) -> Result<(), StoreError> {
        let prefix = Self::habit_prefix(user_id, name);
        let keys: Vec<String> = self
            .kv
            .scan(&prefix)?
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.kv.batch_delete(&refs)?;
        debug!(user_id, name, count = keys.len(), "habit entries deleted");
        Ok(())
    }

    fn put_api_key(&self, key_hash: &str, user_id: &str) -> Result<(), StoreError> {
        self.kv
            .set(&Self::api_key_path(key_hash), user_id.as_bytes())?;
        Ok(())
    }

    fn get_api_key(&self, key_hash: &str) -> Result<Option<String>, StoreError> {
        match self.kv.get(&Self::api_key_path(key_hash))? {
            Some(val) => Ok(Some(String::from_utf8_lossy(&val).into_owned())),
            None => Ok(None),
        }
    }

    fn list_api_key_hashes(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let prefix = format!("{ROOT}/{API_KEYS}/");
        let mut hashes = Vec::new();
        for (key, val) in self.kv.scan(&prefix)? {
            if val == user_id.as_bytes() {
                hashes.push(key[prefix.len()..].to_string());
            }
        }
        Ok(hashes)
    }

    fn delete_api_key(&self, key_hash: &str) -> Result<(), StoreError> {
        self.kv.delete(&Self::api_key_path(key_hash))?;
        Ok(())
    }

    fn put_refresh_token(&self, user_id: &str, token: &TokenRecord) -> Result<(), StoreError> {
        let val = serde_json::to_vec(token)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.kv.set(&Self::refresh_token_path(user_id), &val)?;
        Ok(())
    }

    fn get_refresh_token(&self, user_id: &str) -> Result<Option<TokenRecord>, StoreError> {
        match self.kv.get(&Self::refresh_token_path(user_id))? {
            Some(val) => {
                let token = serde_json::from_slice(&val)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(token))
            }
            None => Ok(None),
        }
    }

    fn delete_refresh_token(&self, user_id: &str) -> Result<(), StoreError> {
        self.kv.delete(&Self::refresh_token_path(user_id))?;
        Ok(())
    }
}
