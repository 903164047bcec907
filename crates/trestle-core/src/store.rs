//! Key/value store contract.
//!
//! Rate-limiting and caching collaborators persist per-key values through
//! this trait. Methods return boxed futures so remote stores can suspend;
//! the bundled in-memory implementation (`trestle-handlers`) never does.
//! No transactional multi-key operation is provided.

use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// A boxed future, the async vocabulary used across trait objects in this
/// workspace.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Key/value store consumed by rate-limiting and caching handlers.
///
/// Implementations decide their own eviction policy; `ttl` is a hint that
/// entries may be dropped once the duration elapses.
pub trait Store: Send + Sync + 'static {
    /// Returns the value for a key, or `None` when absent or expired.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<Value>>;

    /// Stores a value under a key, optionally expiring after `ttl`.
    fn set<'a>(&'a self, key: &'a str, value: Value, ttl: Option<Duration>) -> BoxFuture<'a, ()>;

    /// Deletes a key, returning `true` when an entry was removed.
    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, bool>;

    /// Removes every entry.
    fn clear(&self) -> BoxFuture<'_, ()>;
}
