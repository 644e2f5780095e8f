use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::{rfc3339_key, HabitEntry, Store, StoreError, TokenRecord};

/// In-memory repository for tests. Mirrors the KV-backed variant's
/// semantics, including chronological entry order and same-key replace.
#[derive(Default)]
pub struct MemStore {
    // user_id -> ("<name>/<rfc3339>" -> entry); BTreeMap keeps key order.
    habits: RwLock<HashMap<String, BTreeMap<String, HabitEntry>>>,
    api_keys: RwLock<HashMap<String, String>>,
    refresh_tokens: RwLock<HashMap<String, TokenRecord>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemStore {
    fn put_habit(&self, user_id: &str, entry: &HabitEntry) -> Result<(), StoreError> {
        let key = format!("{}/{}", entry.name, rfc3339_key(entry.timestamp));
        let mut habits = self.habits.write().unwrap();
        habits
            .entry(user_id.to_string())
            .or_default()
            .insert(key, entry.clone());
        Ok(())
    }

    fn list_habit_names(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let habits = self.habits.read().unwrap();
        Ok(habits
            .get(user_id)
            .map(|m| {
                m.keys()
                    .filter_map(|k| k.split_once('/').map(|(name, _)| name.to_string()))
                    .collect::<std::collections::BTreeSet<_>>()
                    .into_iter()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get_habit(&self, user_id: &str, name: &str) -> Result<Vec<HabitEntry>, StoreError> {
        let prefix = format!("{name}/");
        let habits = self.habits.read().unwrap();
        Ok(habits
            .get(user_id)
            .map(|m| {
                m.range(prefix.clone()..)
                    .take_while(|(k, _)| k.starts_with(&prefix))
                    .map(|(_, e)| e.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn delete_habit(&self, user_id: &str, name: &str) -> Result<(), StoreError> {
        let prefix = format!("{name}/");
        let mut habits = self.habits.write().unwrap();
        if let Some(m) = habits.get_mut(user_id) {
            m.retain(|k, _| !k.starts_with(&prefix));
        }
        Ok(())
    }

    fn put_api_key(&self, key_hash: &str, user_id: &str) -> Result<(), StoreError> {
        self.api_keys
            .write()
            .unwrap()
            .insert(key_hash.to_string(), user_id.to_string());
        Ok(())
    }

    fn get_api_key(&self, key_hash: &str) -> Result<Option<String>, StoreError> {
        Ok(self.api_keys.read().unwrap().get(key_hash).cloned())
    }

    fn list_api_key_hashes(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .api_keys
            .read()
            .unwrap()
            .iter()
            .filter(|(_, uid)| uid.as_str() == user_id)
            .map(|(hash, _)| hash.clone())
            .collect())
    }

    fn delete_api_key(&self, key_hash: &str) -> Result<(), StoreError> {
        self.api_keys.write().unwrap().remove(key_hash);
        Ok(())
    }

    fn put_refresh_token(&self, user_id: &str, token: &TokenRecord) -> Result<(), StoreError> {
        self.refresh_tokens
            .write()
            .unwrap()
            .insert(user_id.to_string(), token.clone());
        Ok(())
    }

    fn get_refresh_token(&self, user_id: &str) -> Result<Option<TokenRecord>, StoreError> {
        Ok(self.refresh_tokens.read().unwrap().get(user_id).cloned())
    }

    fn delete_refresh_token(&self, user_id: &str) -> Result<(), StoreError> {
        self.refresh_tokens.write().unwrap().remove(user_id);
        Ok(())
    }
}
