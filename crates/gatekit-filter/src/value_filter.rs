//! # Value filters
//!
//! When a field may not be seen, its value is not removed but replaced by
//! a neutral stand-in, so the object keeps its shape for serializers and
//! templates. The replacement is pluggable.

use std::cell::RefCell;
use std::collections::HashMap;

use serde_json::Value;

/// Produces the replacement value of a denied field.
pub trait ValueFilter {
    /// Compute the neutral stand-in for a denied value.
    fn filter_value(&self, value: &Value) -> Value;
}

/// Default replacement: collections empty out, everything else nulls out.
///
/// # Example
///
/// ```
/// use gatekit_filter::{NeutralValueFilter, ValueFilter};
/// use serde_json::json;
///
/// let filter = NeutralValueFilter;
/// assert_eq!(filter.filter_value(&json!([1, 2])), json!([]));
/// assert_eq!(filter.filter_value(&json!({"a": 1})), json!({}));
/// assert_eq!(filter.filter_value(&json!("secret")), json!(null));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralValueFilter;

impl ValueFilter for NeutralValueFilter {
    fn filter_value(&self, value: &Value) -> Value {
        match value {
            Value::Array(_) => Value::Array(Vec::new()),
            Value::Object(_) => Value::Object(serde_json::Map::new()),
            _ => Value::Null,
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Replacement values registered per value kind, with the neutral filter
/// as fallback for unregistered kinds.
///
/// The registry is an explicit, clearable cache: reconfiguring it mid-run
/// is supported through [`ZeroValueRegistry::clear`].
///
/// # Example
///
/// ```
/// use gatekit_filter::{ValueFilter, ZeroValueRegistry};
/// use serde_json::json;
///
/// let registry = ZeroValueRegistry::new();
/// registry.register("number", json!(0));
/// registry.register("string", json!(""));
///
/// assert_eq!(registry.filter_value(&json!(42)), json!(0));
/// assert_eq!(registry.filter_value(&json!("secret")), json!(""));
/// // unregistered kinds fall back to the neutral replacement
/// assert_eq!(registry.filter_value(&json!([1])), json!([]));
/// ```
#[derive(Debug, Default)]
pub struct ZeroValueRegistry {
    zeros: RefCell<HashMap<String, Value>>,
}

impl ZeroValueRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the zero value of a kind (`"string"`, `"number"`,
    /// `"boolean"`, `"array"`, `"object"`).
    pub fn register(&self, kind: impl Into<String>, zero: Value) {
        self.zeros.borrow_mut().insert(kind.into(), zero);
    }

    /// Get the registered zero value of a kind.
    pub fn zero_value(&self, kind: &str) -> Option<Value> {
        self.zeros.borrow().get(kind).cloned()
    }

    /// Forget every registered zero value.
    pub fn clear(&self) {
        self.zeros.borrow_mut().clear();
    }
}

impl ValueFilter for ZeroValueRegistry {
    fn filter_value(&self, value: &Value) -> Value {
        self.zero_value(value_kind(value))
            .unwrap_or_else(|| NeutralValueFilter.filter_value(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_neutral_filter() {
        let filter = NeutralValueFilter;

        assert_eq!(filter.filter_value(&json!([1, 2, 3])), json!([]));
        assert_eq!(filter.filter_value(&json!({"a": 1})), json!({}));
        assert_eq!(filter.filter_value(&json!("x")), Value::Null);
        assert_eq!(filter.filter_value(&json!(42)), Value::Null);
        assert_eq!(filter.filter_value(&json!(true)), Value::Null);
        assert_eq!(filter.filter_value(&Value::Null), Value::Null);
    }

    #[test]
    fn test_zero_value_registry_overrides_and_clears() {
        let registry = ZeroValueRegistry::new();
        registry.register("number", json!(0));

        assert_eq!(registry.filter_value(&json!(7)), json!(0));
        assert_eq!(registry.zero_value("number"), Some(json!(0)));
        assert_eq!(registry.zero_value("string"), None);

        registry.clear();
        assert_eq!(registry.filter_value(&json!(7)), Value::Null);
    }
}
