//! Shared state bag for one build's run
//!
//! The bag is the only object shared between steps of a build. Values are
//! opaque; well-known keys carry the error, cancellation and halt markers
//! that cleanup steps inspect to distinguish teardown from abort.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use ironcast_core::error::{CoreError, Result};

/// Reserved state bag keys. Steps must not repurpose these.
pub const STATE_ERROR: &str = "error";
pub const STATE_UI: &str = "ui";
pub const STATE_HOOK: &str = "hook";
pub const STATE_DRIVER: &str = "driver";
pub const STATE_CONFIG: &str = "config";
pub const STATE_DEBUG: &str = "debug";
pub const STATE_FORCE: &str = "force";
pub const STATE_CANCELLED: &str = "cancelled";
pub const STATE_HALTED: &str = "halted";

/// Concurrent key/value map scoped to one build
///
/// Clones share the same underlying map, so a step and the helpers it
/// spawns observe each other's writes.
#[derive(Clone, Default)]
pub struct StateBag {
    map: Arc<RwLock<HashMap<String, Box<dyn Any + Send + Sync>>>>,
}

impl StateBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value under a key, replacing any previous value
    pub fn put(&self, key: impl Into<String>, value: impl Any + Send + Sync) {
        self.map
            .write()
            .unwrap()
            .insert(key.into(), Box::new(value));
    }

    /// Fetch a clone of the value under a key
    ///
    /// Returns `None` when the key is absent or holds a different type.
    pub fn get<T: Any + Clone + Send + Sync>(&self, key: &str) -> Option<T> {
        self.map
            .read()
            .unwrap()
            .get(key)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    /// Fetch a value that must be present
    pub fn require<T: Any + Clone + Send + Sync>(&self, key: &str) -> Result<T> {
        self.get(key)
            .ok_or_else(|| CoreError::MissingStateKey { key: key.to_string() })
    }

    pub fn remove(&self, key: &str) {
        self.map.write().unwrap().remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.read().unwrap().contains_key(key)
    }

    /// Record a fatal error under the reserved `error` key
    pub fn set_error(&self, error: CoreError) {
        self.put(STATE_ERROR, error);
    }

    /// The most recent fatal error, if any
    pub fn error(&self) -> Option<CoreError> {
        self.get(STATE_ERROR)
    }

    pub fn mark_cancelled(&self) {
        self.put(STATE_CANCELLED, true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.get::<bool>(STATE_CANCELLED).unwrap_or(false)
    }

    pub fn mark_halted(&self) {
        self.put(STATE_HALTED, true);
    }

    pub fn is_halted(&self) -> bool {
        self.get::<bool>(STATE_HALTED).unwrap_or(false)
    }
}

impl std::fmt::Debug for StateBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = self.map.read().unwrap().keys().cloned().collect();
        f.debug_struct("StateBag").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_roundtrip() {
        let bag = StateBag::new();
        bag.put("port", 8080u16);
        assert_eq!(bag.get::<u16>("port"), Some(8080));
        assert_eq!(bag.get::<String>("port"), None);
        assert_eq!(bag.get::<u16>("missing"), None);
    }

    #[test]
    fn test_require_missing_key() {
        let bag = StateBag::new();
        let err = bag.require::<u16>("port").unwrap_err();
        assert_eq!(err, CoreError::MissingStateKey { key: "port".into() });
    }

    #[test]
    fn test_clones_share_storage() {
        let bag = StateBag::new();
        let other = bag.clone();
        bag.put("shared", "value".to_string());
        assert_eq!(other.get::<String>("shared").as_deref(), Some("value"));

        other.remove("shared");
        assert!(!bag.contains("shared"));
    }

    #[test]
    fn test_separate_bags_are_isolated() {
        let a = StateBag::new();
        let b = StateBag::new();
        a.put("key", 1u32);
        assert_eq!(b.get::<u32>("key"), None);
    }

    #[test]
    fn test_error_marker_helpers() {
        let bag = StateBag::new();
        assert!(bag.error().is_none());

        bag.set_error(CoreError::step("create", "boom"));
        assert!(matches!(bag.error(), Some(CoreError::Step { .. })));

        bag.mark_cancelled();
        bag.mark_halted();
        assert!(bag.is_cancelled());
        assert!(bag.is_halted());
    }

    #[test]
    fn test_concurrent_access() {
        let bag = StateBag::new();
        let mut handles = Vec::new();
        for i in 0..8 {
            let bag = bag.clone();
            handles.push(std::thread::spawn(move || {
                for j in 0..100 {
                    bag.put(format!("key-{i}"), j);
                    let _ = bag.get::<i32>(&format!("key-{i}"));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
