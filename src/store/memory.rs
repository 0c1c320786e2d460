use serde_json::Value;
use std::collections::HashMap;

use super::{KeyValueStore, StoreError};

/// Volatile store; state is lost when the process exits.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_key_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("lastTraffic").expect("memory get"), None);
    }

    #[test]
    fn test_set_overwrites() {
        let mut store = MemoryStore::new();
        store.set("lastTraffic", json!(1)).expect("memory set");
        store.set("lastTraffic", json!(2)).expect("memory set");
        assert_eq!(store.get("lastTraffic").expect("memory get"), Some(json!(2)));
    }
}
