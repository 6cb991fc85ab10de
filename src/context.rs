//! Diagnostic context attached to classified errors.
//!
//! A [`DiagnosticContext`] is a free-form map of string keys to JSON values.
//! It travels with the error into the log record and never reaches the
//! response body.
//!
//! # Security Properties
//!
//! - Every owned string in the map (keys and nested values) is zeroized on drop
//! - `Debug` prints keys only, values are redacted
//! - No `Display`: there is no sanctioned way to render context to a caller
//!
//! # Example
//!
//! ```rust
//! use ingress_errors::DiagnosticContext;
//!
//! let mut ctx = DiagnosticContext::new();
//! ctx.insert("queueUrl", "https://sqs.local/ingest");
//! ctx.insert("retries", 3);
//! assert_eq!(ctx.len(), 2);
//! ```

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroize;

/// Failure building a [`DiagnosticContext`] from an arbitrary value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// The value serialized to something other than a JSON object.
    NotAnObject {
        /// JSON type that was produced instead.
        found: &'static str,
    },
    /// The value could not be serialized at all.
    Serialize(String),
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject { found } => {
                write!(f, "diagnostic context must be a JSON object, found {}", found)
            }
            Self::Serialize(reason) => {
                write!(f, "diagnostic context could not be serialized: {}", reason)
            }
        }
    }
}

impl std::error::Error for ContextError {}

/// Free-form diagnostic key/value map, empty by default.
///
/// Keys are ordered, so serialized output is deterministic.
///
/// # No Clone Policy
///
/// Like the error that owns it, a context is not `Clone`. Copies would
/// multiply the places sensitive values must be scrubbed from.
#[derive(Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DiagnosticContext {
    entries: BTreeMap<String, Value>,
}

impl DiagnosticContext {
    /// Create an empty context.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from any value that serializes to a JSON object.
    ///
    /// ```rust
    /// # use ingress_errors::DiagnosticContext;
    /// #[derive(serde::Serialize)]
    /// struct Batch { size: u32 }
    ///
    /// let ctx = DiagnosticContext::from_serializable(Batch { size: 10 }).unwrap();
    /// assert_eq!(ctx.get("size"), Some(&serde_json::json!(10)));
    ///
    /// assert!(DiagnosticContext::from_serializable(42).is_err());
    /// ```
    pub fn from_serializable(value: impl Serialize) -> crate::Result<Self> {
        match serde_json::to_value(value) {
            Ok(Value::Object(map)) => Ok(Self::from(map)),
            Ok(other) => Err(ContextError::NotAnObject {
                found: json_type_name(&other),
            }),
            Err(e) => Err(ContextError::Serialize(e.to_string())),
        }
    }

    /// Insert one entry, replacing any previous value under `key`.
    ///
    /// Values that fail to serialize are skipped.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Serialize) {
        if let Ok(v) = serde_json::to_value(value) {
            if let Some(mut previous) = self.entries.insert(key.into(), v) {
                scrub_value(&mut previous);
            }
        }
    }

    /// Look up a value by key.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Iterate over entries in key order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are present.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compact JSON rendering for log sinks.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(&self.entries).unwrap_or_else(|_| String::from("{}"))
    }
}

impl From<Map<String, Value>> for DiagnosticContext {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            entries: map.into_iter().collect(),
        }
    }
}

impl From<BTreeMap<String, Value>> for DiagnosticContext {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Self { entries }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for DiagnosticContext {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl PartialEq<Value> for DiagnosticContext {
    fn eq(&self, other: &Value) -> bool {
        match other {
            Value::Object(map) => {
                map.len() == self.entries.len()
                    && map.iter().all(|(k, v)| self.entries.get(k) == Some(v))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for DiagnosticContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for key in self.entries.keys() {
            map.entry(key, &"<REDACTED>");
        }
        map.finish()
    }
}

impl Zeroize for DiagnosticContext {
    fn zeroize(&mut self) {
        // BTreeMap keys are immutable in place; take ownership to scrub them.
        for (mut key, mut value) in std::mem::take(&mut self.entries) {
            key.zeroize();
            scrub_value(&mut value);
        }
    }
}

impl Drop for DiagnosticContext {
    fn drop(&mut self) {
        self.zeroize();
    }
}

fn scrub_value(value: &mut Value) {
    match value {
        Value::String(s) => s.zeroize(),
        Value::Array(items) => items.iter_mut().for_each(scrub_value),
        Value::Object(map) => {
            for (mut key, mut nested) in std::mem::take(map) {
                key.zeroize();
                scrub_value(&mut nested);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
