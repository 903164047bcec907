//! Inter-handler state bag.
//!
//! Handlers communicate through a free-form, string-keyed JSON map. The
//! per-request context seeds its bag from a shallow copy of the
//! caller-supplied initial state, so a pipeline run can never mutate the
//! caller's copy.

use crate::error::TrestleResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Free-form state shared between handlers within one pipeline run.
///
/// # Example
///
/// ```
/// use trestle_core::State;
///
/// let mut state = State::new();
/// state.insert("user", "alice").unwrap();
/// state.insert("attempts", 3).unwrap();
///
/// assert_eq!(state.get_as::<String>("user").as_deref(), Some("alice"));
/// assert_eq!(state.get_as::<u32>("attempts"), Some(3));
/// assert!(state.get("missing").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    entries: Map<String, Value>,
}

impl State {
    /// Creates an empty state bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes and stores a value under a key.
    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> TrestleResult<()> {
        let value = serde_json::to_value(value)?;
        self.entries.insert(key.into(), value);
        Ok(())
    }

    /// Stores an already-built JSON value under a key.
    pub fn insert_value(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    /// Returns the raw JSON value for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Deserializes the value for a key into a concrete type.
    ///
    /// Returns `None` when the key is absent or the value does not
    /// deserialize as `T`.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.entries
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Removes and returns the value for a key.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Returns `true` when the key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over entries in insertion-independent map order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }
}

impl From<Map<String, Value>> for State {
    fn from(entries: Map<String, Value>) -> Self {
        Self { entries }
    }
}
