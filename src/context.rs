//! The ambient request context.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::json_ext::Value;

/// A map of arbitrary JSON values shared by one request and every resolver
/// (and, for subscriptions, every per-event sub-execution) it spawns.
///
/// Cloning is cheap; all clones share the same entries.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Context {
    entries: Arc<DashMap<String, Value>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous one if any.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// Get a clone of the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Atomically update the value stored under `key`, inserting the result
    /// of `f(Value::Null)` if it was absent.
    pub fn upsert(&self, key: impl Into<String>, f: impl FnOnce(Value) -> Value) {
        let mut entry = self.entries.entry(key.into()).or_insert(Value::Null);
        let previous = std::mem::take(entry.value_mut());
        *entry.value_mut() = f(previous);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn insert_and_get() {
        let context = Context::new();
        assert!(context.insert("user", json!({ "id": 1 })).is_none());
        assert_eq!(context.get("user"), Some(json!({ "id": 1 })));
        assert!(context.get("missing").is_none());
    }

    #[test]
    fn clones_share_entries() {
        let context = Context::new();
        let clone = context.clone();
        clone.insert("seen", true);
        assert_eq!(context.get("seen"), Some(json!(true)));
    }

    #[test]
    fn upsert_applies_to_previous_value() {
        let context = Context::new();
        context.insert("counter", 1);
        context.upsert("counter", |previous| {
            json!(previous.as_i64().unwrap_or_default() + 1)
        });
        assert_eq!(context.get("counter"), Some(json!(2)));
    }
}
