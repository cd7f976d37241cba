//! Durable key-value store abstraction
//!
//! Holds the per-list event-ID sets, the global list-name index and the
//! permission prompt opt-outs. `update_string_set` must be atomic per key so
//! concurrent reconciliations of different lists never lose index updates.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

/// In-place edit applied to a string set under the store's write lock
pub type SetUpdate = Box<dyn FnOnce(&mut BTreeSet<String>) + Send>;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Missing keys read as the empty set
    async fn get_string_set(&self, key: &str) -> Result<BTreeSet<String>>;

    async fn put_string_set(&self, key: &str, values: &BTreeSet<String>) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;

    /// Atomic read-modify-write of one key. Returns the stored result.
    async fn update_string_set(&self, key: &str, update: SetUpdate) -> Result<BTreeSet<String>>;

    async fn get_bool(&self, key: &str, default: bool) -> Result<bool>;

    async fn put_bool(&self, key: &str, value: bool) -> Result<()>;
}

/// Volatile store for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryKeyValueStore {
    sets: Mutex<HashMap<String, BTreeSet<String>>>,
    flags: Mutex<HashMap<String, bool>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sets(&self) -> std::sync::MutexGuard<'_, HashMap<String, BTreeSet<String>>> {
        self.sets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn flags(&self) -> std::sync::MutexGuard<'_, HashMap<String, bool>> {
        self.flags.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get_string_set(&self, key: &str) -> Result<BTreeSet<String>> {
        Ok(self.sets().get(key).cloned().unwrap_or_default())
    }

    async fn put_string_set(&self, key: &str, values: &BTreeSet<String>) -> Result<()> {
        let mut sets = self.sets();
        if values.is_empty() {
            sets.remove(key);
        } else {
            sets.insert(key.to_string(), values.clone());
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.sets().remove(key);
        self.flags().remove(key);
        Ok(())
    }

    async fn update_string_set(&self, key: &str, update: SetUpdate) -> Result<BTreeSet<String>> {
        let mut sets = self.sets();
        let mut values = sets.remove(key).unwrap_or_default();
        update(&mut values);
        if !values.is_empty() {
            sets.insert(key.to_string(), values.clone());
        }
        Ok(values)
    }

    async fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        Ok(self.flags().get(key).copied().unwrap_or(default))
    }

    async fn put_bool(&self, key: &str, value: bool) -> Result<()> {
        self.flags().insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_missing_key_is_empty() {
        let store = MemoryKeyValueStore::new();
        assert!(store.get_string_set("alarms_Pantry").await.unwrap().is_empty());
        assert!(!store.get_bool("dont_ask_exact", false).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_replaces_and_remove_clears() {
        let store = MemoryKeyValueStore::new();

        store.put_string_set("k", &set(&["1", "2"])).await.unwrap();
        store.put_string_set("k", &set(&["3"])).await.unwrap();
        assert_eq!(store.get_string_set("k").await.unwrap(), set(&["3"]));

        store.remove("k").await.unwrap();
        assert!(store.get_string_set("k").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let store = Arc::new(MemoryKeyValueStore::new());

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .update_string_set(
                        "all_alarm_keys",
                        Box::new(move |names| {
                            names.insert(format!("List {}", i));
                        }),
                    )
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get_string_set("all_alarm_keys").await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_flags() {
        let store = MemoryKeyValueStore::new();
        store.put_bool("dont_ask_permissions", true).await.unwrap();
        assert!(store.get_bool("dont_ask_permissions", false).await.unwrap());
    }
}
