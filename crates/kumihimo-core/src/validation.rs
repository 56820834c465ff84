//! Validation results and a couple of ready-made validators.

use crate::context::Context;
use crate::traits::Validator;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One segment of the path to an offending value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Object key.
    Key(String),
    /// Array index.
    Index(usize),
}

impl PathSegment {
    pub fn key(key: impl Into<String>) -> Self {
        PathSegment::Key(key.into())
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{}", key),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// A single problem reported by a [`Validator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Location of the offending value; empty for the context itself.
    pub path: Vec<PathSegment>,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: Vec<PathSegment>, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }

    /// An issue about the context as a whole.
    pub fn root(message: impl Into<String>) -> Self {
        Self::new(Vec::new(), message)
    }

    /// Dotted rendering of the path, e.g. `preferences.theme` or `items.0`.
    pub fn path_string(&self) -> String {
        self.path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Validator backed by a closure.
///
/// ```
/// use kumihimo_core::{Context, FnValidator, ValidationIssue, Validator};
///
/// let adults_only = FnValidator::new(|ctx: &Context| match ctx.get::<u32>("age") {
///     Some(age) if age < 18 => Err(vec![ValidationIssue::root("must be 18 or older")]),
///     _ => Ok(()),
/// });
///
/// let mut ctx = Context::new();
/// ctx.insert("age", 15);
/// assert!(adults_only.validate(&ctx).is_err());
/// ```
pub struct FnValidator<F>(F);

impl<F> FnValidator<F>
where
    F: Fn(&Context) -> Result<(), Vec<ValidationIssue>> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> fmt::Debug for FnValidator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnValidator")
    }
}

impl<F> Validator for FnValidator<F>
where
    F: Fn(&Context) -> Result<(), Vec<ValidationIssue>> + Send + Sync,
{
    fn validate(&self, ctx: &Context) -> Result<(), Vec<ValidationIssue>> {
        (self.0)(ctx)
    }
}

/// JSON type a required key must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl ValueKind {
    fn matches(self, value: &serde_json::Value) -> bool {
        use serde_json::Value;
        matches!(
            (self, value),
            (ValueKind::Null, Value::Null)
                | (ValueKind::Bool, Value::Bool(_))
                | (ValueKind::Number, Value::Number(_))
                | (ValueKind::String, Value::String(_))
                | (ValueKind::Array, Value::Array(_))
                | (ValueKind::Object, Value::Object(_))
        )
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        };
        f.write_str(name)
    }
}

/// Requires top-level keys to be present, optionally with a given JSON type.
///
/// ```
/// use kumihimo_core::{Context, RequiredKeys, ValueKind, Validator};
///
/// let validator = RequiredKeys::new()
///     .key("user_id")
///     .typed("email", ValueKind::String);
///
/// let mut ctx = Context::new();
/// ctx.insert("email", 42);
///
/// let issues = validator.validate(&ctx).unwrap_err();
/// assert_eq!(issues.len(), 2);
/// assert_eq!(issues[0].message, "Required");
/// assert_eq!(issues[1].message, "Expected string");
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequiredKeys {
    keys: Vec<(String, Option<ValueKind>)>,
}

impl RequiredKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `key` to be present with any value.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.keys.push((key.into(), None));
        self
    }

    /// Requires `key` to be present and hold a value of `kind`.
    pub fn typed(mut self, key: impl Into<String>, kind: ValueKind) -> Self {
        self.keys.push((key.into(), Some(kind)));
        self
    }
}

impl Validator for RequiredKeys {
    fn validate(&self, ctx: &Context) -> Result<(), Vec<ValidationIssue>> {
        let issues: Vec<ValidationIssue> = self
            .keys
            .iter()
            .filter_map(|(key, kind)| {
                let path = vec![PathSegment::key(key.as_str())];
                match (ctx.get_value(key), kind) {
                    (None, _) => Some(ValidationIssue::new(path, "Required")),
                    (Some(value), Some(kind)) if !kind.matches(value) => {
                        Some(ValidationIssue::new(path, format!("Expected {}", kind)))
                    }
                    _ => None,
                }
            })
            .collect();

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_keys_accepts_valid_context() {
        let validator = RequiredKeys::new()
            .typed("email", ValueKind::String)
            .typed("preferences", ValueKind::Object);

        let mut ctx = Context::new();
        ctx.insert("email", "test@example.com");
        ctx.insert("preferences", json!({"theme": "dark"}));

        assert!(validator.validate(&ctx).is_ok());
    }

    #[test]
    fn test_required_keys_reports_paths() {
        let validator = RequiredKeys::new().typed("age", ValueKind::Number);
        let mut ctx = Context::new();
        ctx.insert("age", "fifteen");

        let issues = validator.validate(&ctx).unwrap_err();
        assert_eq!(issues[0].path, vec![PathSegment::key("age")]);
        assert_eq!(issues[0].path_string(), "age");
        assert_eq!(issues[0].message, "Expected number");
    }

    #[test]
    fn test_path_string_mixes_keys_and_indices() {
        let issue = ValidationIssue::new(
            vec![PathSegment::key("items"), PathSegment::Index(2), PathSegment::key("sku")],
            "Required",
        );
        assert_eq!(issue.path_string(), "items.2.sku");
    }
}
