//! Shared key/value store for cross-node data during one run.
//!
//! The blackboard is owned exclusively by a single
//! [`BlueprintFrame`](crate::frame::BlueprintFrame) and is not thread-safe.
//! Reads are fail-soft: [`Blackboard::get`] returns the type's default when a
//! key is absent or holds a different type, while [`Blackboard::try_get`]
//! signals presence explicitly.

use std::collections::BTreeMap;

use crate::value::{FromValue, Value};

/// Prefix of the reserved keys recording which upstream action activated a
/// target: `"_activatedBy.{targetId}" -> sourceId`.
pub const ACTIVATED_BY_PREFIX: &str = "_activatedBy.";

/// Typed key/value store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Blackboard {
    entries: BTreeMap<String, Value>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Read a typed value, falling back to `T::default()` when the key is
    /// absent or the stored value has another type.
    pub fn get<T: FromValue + Default>(&self, key: &str) -> T {
        self.try_get(key).unwrap_or_default()
    }

    /// Read a typed value, returning `None` when absent or mismatched.
    pub fn try_get<T: FromValue>(&self, key: &str) -> Option<T> {
        self.entries.get(key).and_then(T::from_value)
    }

    /// Raw access to the stored value.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove a key, returning the previous value if any.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Record that `source_id` activated `target_id`.
    pub fn record_activation(&mut self, target_id: &str, source_id: &str) {
        self.entries.insert(
            format!("{ACTIVATED_BY_PREFIX}{target_id}"),
            Value::String(source_id.to_string()),
        );
    }

    /// The id of the action that most recently activated `target_id`.
    pub fn activated_by(&self, target_id: &str) -> Option<&str> {
        self.entries
            .get(&format!("{ACTIVATED_BY_PREFIX}{target_id}"))
            .and_then(Value::as_str)
    }
}

/// Build the scoped key `"{source_id}.{field}"`.
pub fn scoped_key(source_id: &str, field: &str) -> String {
    format!("{source_id}.{field}")
}
