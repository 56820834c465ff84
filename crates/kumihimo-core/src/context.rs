//! Workflow execution context backed by JSON values.

use crate::error::ContextError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Type-safe context key wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextKey(String);

impl ContextKey {
    /// Creates a new ContextKey.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContextKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ContextKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ContextKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for ContextKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Shared key/value record threaded through one workflow execution.
///
/// Values are stored as [`serde_json::Value`], so anything that implements
/// `Serialize` can be stored and anything that implements `Deserialize` can
/// be read back. Cloning a context produces an independent snapshot.
///
/// # Examples
///
/// ```
/// use kumihimo_core::Context;
///
/// let mut ctx = Context::new();
/// ctx.insert("user_id", 123);
/// ctx.insert("name", "Alice");
/// ctx.insert("active", true);
///
/// assert_eq!(ctx.get::<u64>("user_id"), Some(123));
/// assert_eq!(ctx.get::<String>("name"), Some("Alice".to_string()));
/// assert_eq!(ctx.get::<bool>("active"), Some(true));
///
/// // Wrong type returns None
/// assert_eq!(ctx.get::<String>("user_id"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    data: HashMap<ContextKey, Value>,
}

impl Context {
    /// Creates a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value with the given key.
    ///
    /// If the key already exists, the previous value is replaced.
    pub fn insert(&mut self, key: impl Into<ContextKey>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Serializes `value` and stores it under `key`.
    pub fn insert_serialized<T: Serialize>(
        &mut self,
        key: impl Into<ContextKey>,
        value: &T,
    ) -> Result<(), ContextError> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|source| ContextError::Serialize {
            key: key.clone(),
            source,
        })?;
        self.data.insert(key, value);
        Ok(())
    }

    /// Returns a typed copy of the value for the given key.
    ///
    /// Returns `None` if the key doesn't exist or the value doesn't
    /// deserialize into `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| T::deserialize(v).ok())
    }

    /// Like [`Context::get`], but reports why the value is unavailable.
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T, ContextError> {
        let value = self
            .data
            .get(key)
            .ok_or_else(|| ContextError::MissingKey(ContextKey::new(key)))?;
        T::deserialize(value).map_err(|source| ContextError::TypeMismatch {
            key: ContextKey::new(key),
            source,
        })
    }

    /// Returns the raw JSON value for the given key.
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Returns a mutable reference to the raw JSON value for the given key.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.data.get_mut(key)
    }

    /// Removes a value by key and returns it.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Returns `true` if the context contains a value for the given key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Returns an iterator over all keys in the context.
    pub fn keys(&self) -> impl Iterator<Item = &ContextKey> {
        self.data.keys()
    }

    /// Returns an iterator over all entries in the context.
    pub fn iter(&self) -> impl Iterator<Item = (&ContextKey, &Value)> {
        self.data.iter()
    }

    /// Returns the number of entries in the context.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the context contains no entries.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Removes all entries from the context.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Shallow merge: every key in `other` overwrites the same key here.
    /// Keys absent from `other` are left untouched.
    pub fn merge(&mut self, other: Context) {
        self.data.extend(other.data);
    }

    /// Returns the entries that were added or changed relative to `base`.
    ///
    /// Keys removed since `base` are not reported; merging the result back
    /// never deletes anything.
    pub fn changes_since(&self, base: &Context) -> Context {
        self.data
            .iter()
            .filter(|(key, value)| base.data.get(key.as_str()) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Converts the context into a JSON object.
    pub fn into_value(self) -> Value {
        Value::Object(
            self.data
                .into_iter()
                .map(|(key, value)| (key.0, value))
                .collect(),
        )
    }
}

impl<K: Into<ContextKey>> FromIterator<(K, Value)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            data: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl From<Map<String, Value>> for Context {
    fn from(map: Map<String, Value>) -> Self {
        map.into_iter().collect()
    }
}
