//! Copy-on-write key/value storage owned by a single execution context.
//!
//! Each [`LocalStore`] holds an immutable map behind an atomically swapped
//! pointer. Readers load the current version without locking; writers build
//! a new version and publish it with a read-copy-update loop, so an observer
//! racing a write sees either the old map or the new one, never a mix.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

/// A type-erased stored value.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Separates the owner from the attribute name inside a [`ContextKey`].
pub const KEY_SEPARATOR: char = '.';

/// Identifies one attribute on one owner, formatted as `owner.name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextKey(Arc<str>);

impl ContextKey {
    /// Build the key for attribute `name` declared on `owner`.
    ///
    /// Keys are only unique when neither part contains [`KEY_SEPARATOR`];
    /// [`AttributeRegistry::declare`](crate::AttributeRegistry::declare)
    /// rejects declarations that do. Module paths (`a::b::Owner`) are fine.
    pub fn new(owner: &str, name: &str) -> Self {
        Self(format!("{owner}.{name}").into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type StoreMap = HashMap<ContextKey, Value>;

/// Per-context persistent map from [`ContextKey`] to [`Value`].
pub struct LocalStore {
    current: ArcSwap<StoreMap>,
}

impl LocalStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(StoreMap::new()),
        }
    }

    /// Whether the current version holds `key`.
    pub fn has(&self, key: &ContextKey) -> bool {
        self.current.load().contains_key(key)
    }

    /// The value stored under `key`, if any.
    pub fn get(&self, key: &ContextKey) -> Option<Value> {
        self.current.load().get(key).cloned()
    }

    /// Publish a new version with `key` bound to `value` and return `value`.
    pub fn set(&self, key: ContextKey, value: Value) -> Value {
        self.current.rcu(|map| {
            let mut next = StoreMap::clone(map);
            next.insert(key.clone(), Arc::clone(&value));
            next
        });
        value
    }

    /// Number of keys in the current version.
    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    /// Whether the current version is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted snapshot of the keys in the current version.
    pub fn keys(&self) -> Vec<ContextKey> {
        let mut keys: Vec<_> = self.current.load().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStore")
            .field("keys", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(name: &str) -> ContextKey {
        ContextKey::new("Owner", name)
    }

    #[test]
    fn test_key_format() {
        assert_eq!(key("setting").as_str(), "Owner.setting");
        assert_eq!(key("setting").to_string(), "Owner.setting");
    }

    #[test]
    fn test_empty_store() {
        let store = LocalStore::new();
        assert!(store.is_empty());
        assert!(!store.has(&key("a")));
        assert!(store.get(&key("a")).is_none());
    }

    #[test]
    fn test_set_then_get() {
        let store = LocalStore::new();
        let returned = store.set(key("a"), Arc::new(7_u32));
        assert_eq!(returned.downcast_ref::<u32>(), Some(&7));

        assert!(store.has(&key("a")));
        let value = store.get(&key("a")).unwrap();
        assert_eq!(value.downcast_ref::<u32>(), Some(&7));
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let store = LocalStore::new();
        store.set(key("a"), Arc::new("old"));
        store.set(key("a"), Arc::new("new"));
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get(&key("a")).unwrap().downcast_ref::<&str>(),
            Some(&"new")
        );
    }

    #[test]
    fn test_reader_keeps_its_version() {
        let store = LocalStore::new();
        store.set(key("a"), Arc::new(1_i32));

        let before = store.current.load_full();
        store.set(key("b"), Arc::new(2_i32));

        assert_eq!(before.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_keys_sorted() {
        let store = LocalStore::new();
        store.set(key("zeta"), Arc::new(()));
        store.set(key("alpha"), Arc::new(()));
        assert_eq!(store.keys(), vec![key("alpha"), key("zeta")]);
    }

    #[test]
    fn test_concurrent_writers_do_not_lose_updates() {
        let store = Arc::new(LocalStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        store.set(key(&format!("k{t}-{i}")), Arc::new(i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 400);
    }
}
