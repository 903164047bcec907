//! In-memory TTL store.
//!
//! The default [`Store`] backing for rate limiting and response caching.
//! Entries expire lazily: an expired entry is dropped the next time it is
//! read. State lives for the process lifetime only; nothing persists
//! across restarts.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use trestle_core::{BoxFuture, Store};

/// A process-local key/value store with per-entry TTL.
///
/// # Example
///
/// ```
/// use trestle_core::Store;
/// use trestle_handlers::MemoryStore;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = MemoryStore::new();
/// store.set("hits", 1.into(), Some(Duration::from_secs(60))).await;
/// assert_eq!(store.get("hits").await, Some(1.into()));
/// assert!(store.delete("hits").await);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live (unexpired) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let entries = self.entries.lock();
        entries.values().filter(|e| !e.is_expired()).count()
    }

    /// Returns `true` when no live entry exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<Value>> {
        Box::pin(async move {
            let mut entries = self.entries.lock();
            match entries.get(key) {
                Some(entry) if entry.is_expired() => {
                    entries.remove(key);
                    None
                }
                Some(entry) => Some(entry.value.clone()),
                None => None,
            }
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: Value, ttl: Option<Duration>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let entry = Entry {
                value,
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            };
            self.entries.lock().insert(key.to_string(), entry);
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(async move { self.entries.lock().remove(key).is_some() })
    }

    fn clear(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move { self.entries.lock().clear() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete_clear() {
        let store = MemoryStore::new();

        store.set("a", Value::from("one"), None).await;
        store.set("b", Value::from(2), None).await;
        assert_eq!(store.get("a").await, Some(Value::from("one")));
        assert_eq!(store.len(), 2);

        assert!(store.delete("a").await);
        assert!(!store.delete("a").await);
        assert_eq!(store.get("a").await, None);

        store.clear().await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_entries_expire_after_ttl() {
        let store = MemoryStore::new();
        store
            .set("temp", Value::from(true), Some(Duration::from_millis(10)))
            .await;
        assert_eq!(store.get("temp").await, Some(Value::from(true)));

        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(store.get("temp").await, None);
    }

    #[tokio::test]
    async fn test_set_without_ttl_never_expires() {
        let store = MemoryStore::new();
        store.set("keep", Value::from(1), None).await;
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.get("keep").await, Some(Value::from(1)));
    }
}
