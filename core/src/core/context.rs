// orchid/src/core/context.rs

//! The per-request data bag shared by every step, middleware and async-task
//! of one invocation.
//!
//! A `Context` is an open, string-keyed map of `serde_json::Value`s wrapped
//! in `Arc<parking_lot::RwLock<..>>` so that the cheaply cloned handles
//! passed to each executable unit all observe the same underlying bag.
//!
//! IMPORTANT: lock guards are blocking and are never exposed publicly;
//! every accessor copies data in or out so no guard can be held across an
//! `.await` suspension point.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Request-scoped heterogeneous map. Created empty at request start,
/// mutated in place by every step, destroyed when the request completes.
/// No two concurrent requests ever share a `Context` instance.
pub struct Context(Arc<RwLock<HashMap<String, Value>>>);

impl Context {
  pub fn new() -> Self {
    Context(Arc::new(RwLock::new(HashMap::new())))
  }

  /// Inserts or replaces a value under `key`.
  pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) {
    self.0.write().insert(key.into(), value.into());
  }

  /// Returns a clone of the value under `key`, if present.
  pub fn get(&self, key: &str) -> Option<Value> {
    self.0.read().get(key).cloned()
  }

  pub fn get_str(&self, key: &str) -> Option<String> {
    match self.0.read().get(key) {
      Some(Value::String(s)) => Some(s.clone()),
      _ => None,
    }
  }

  pub fn get_u64(&self, key: &str) -> Option<u64> {
    self.0.read().get(key).and_then(|v| v.as_u64())
  }

  pub fn get_i64(&self, key: &str) -> Option<i64> {
    self.0.read().get(key).and_then(|v| v.as_i64())
  }

  pub fn get_bool(&self, key: &str) -> Option<bool> {
    self.0.read().get(key).and_then(|v| v.as_bool())
  }

  pub fn contains(&self, key: &str) -> bool {
    self.0.read().contains_key(key)
  }

  /// Removes and returns the value under `key`, if present.
  pub fn remove(&self, key: &str) -> Option<Value> {
    self.0.write().remove(key)
  }

  pub fn len(&self) -> usize {
    self.0.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.read().is_empty()
  }

  /// Sorted key list, mainly useful in error reports and tests.
  pub fn keys(&self) -> Vec<String> {
    let mut keys: Vec<String> = self.0.read().keys().cloned().collect();
    keys.sort();
    keys
  }

  /// Appends `value` to the array under `key`, creating the array if the
  /// key is absent. Handy for steps that accumulate an execution log.
  pub fn push(&self, key: &str, value: impl Into<Value>) {
    let mut guard = self.0.write();
    match guard.get_mut(key) {
      Some(Value::Array(items)) => items.push(value.into()),
      _ => {
        guard.insert(key.to_string(), Value::Array(vec![value.into()]));
      }
    }
  }
}

impl Clone for Context {
  fn clone(&self) -> Self {
    Context(Arc::clone(&self.0))
  }
}

impl Default for Context {
  fn default() -> Self {
    Self::new()
  }
}

impl std::fmt::Debug for Context {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Context").field("keys", &self.keys()).finish()
  }
}
