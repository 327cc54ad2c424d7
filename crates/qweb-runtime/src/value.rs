//! The dynamic value model.
//!
//! Evaluation contexts, widget state and expression results are all
//! [`Value`]s. Semantics follow the host dialect: JS-like truthiness,
//! loose numeric equality, string concatenation with `+`.

use indexmap::IndexMap;
use qweb_dom::VNode;
use std::cmp::Ordering;
use std::fmt;

/// A dynamic value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent / null / undefined.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// Insertion-ordered mapping; iteration order is observable in
    /// `t-foreach`.
    Map(IndexMap<String, Value>),
    /// A rendered template fragment, produced by `t-set` bodies and
    /// `t-call` pre-blocks.
    Fragment(Vec<VNode>),
}

impl Value {
    /// Build a map value from entries.
    pub fn map<K: Into<String>, I: IntoIterator<Item = (K, Value)>>(entries: I) -> Self {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// JS-like truthiness: `null`, `false`, `0`, `NaN` and `""` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::List(_) | Value::Map(_) | Value::Fragment(_) => true,
        }
    }

    /// Whether the value suppresses a dynamic attribute: only `null`/
    /// `undefined` and `false` do.
    pub fn suppresses_attr(&self) -> bool {
        matches!(self, Value::Null | Value::Bool(false))
    }

    /// The string form used for text output and attribute values.
    pub fn to_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() {
                    format!("{}", *f as i64)
                } else {
                    f.to_string()
                }
            }
            Value::Str(s) => s.clone(),
            Value::List(items) => items
                .iter()
                .map(Value::to_display)
                .collect::<Vec<_>>()
                .join(","),
            Value::Map(_) => "[object Object]".to_string(),
            Value::Fragment(_) => String::new(),
        }
    }

    /// Member access: map keys plus the `length` pseudo-property.
    pub fn member(&self, name: &str) -> Value {
        match self {
            Value::Map(map) => map.get(name).cloned().unwrap_or_default(),
            Value::List(items) if name == "length" => Value::Int(items.len() as i64),
            Value::Str(s) if name == "length" => Value::Int(s.chars().count() as i64),
            _ => Value::Null,
        }
    }

    /// Index access for lists (numeric) and maps (string).
    pub fn index(&self, index: &Value) -> Value {
        match (self, index) {
            (Value::List(items), Value::Int(i)) => {
                if *i >= 0 {
                    items.get(*i as usize).cloned().unwrap_or_default()
                } else {
                    Value::Null
                }
            }
            (Value::Map(map), Value::Str(key)) => map.get(key).cloned().unwrap_or_default(),
            (value, Value::Str(name)) => value.member(name),
            _ => Value::Null,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(*b as i64 as f64),
            _ => None,
        }
    }

    /// Loose equality: numbers compare numerically across int/float.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }

    /// Ordering for comparison operators; `None` when incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a.partial_cmp(&b);
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// `+`: numeric addition, or string concatenation when either side is
    /// a string.
    pub fn add(&self, other: &Value) -> Value {
        match (self, other) {
            (Value::Str(a), b) => Value::Str(format!("{}{}", a, b.to_display())),
            (a, Value::Str(b)) => Value::Str(format!("{}{}", a.to_display(), b)),
            (Value::Int(a), Value::Int(b)) => Value::Int(a + b),
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => Value::Float(a + b),
                _ => Value::Null,
            },
        }
    }

    /// Numeric arithmetic for `-`, `*`, `%`; integer-preserving.
    pub fn arith(&self, other: &Value, op: fn(f64, f64) -> f64) -> Value {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => {
                let result = op(*a as f64, *b as f64);
                if result.fract() == 0.0 && result.is_finite() {
                    Value::Int(result as i64)
                } else {
                    Value::Float(result)
                }
            }
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => Value::Float(op(a, b)),
                _ => Value::Null,
            },
        }
    }

    /// Shallow-merge a map patch into this value, the `updateState`
    /// semantics. A non-map patch replaces the value.
    pub fn merge(&mut self, patch: Value) {
        match (self, patch) {
            (Value::Map(state), Value::Map(patch)) => {
                for (key, value) in patch {
                    state.insert(key, value);
                }
            }
            (slot, patch) => *slot = patch,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(Value::Int(1).is_truthy());
        assert!(Value::List(vec![]).is_truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Int(42).to_display(), "42");
        assert_eq!(Value::Float(4.0).to_display(), "4");
        assert_eq!(Value::Float(4.5).to_display(), "4.5");
        assert_eq!(Value::Null.to_display(), "");
        assert_eq!(Value::from(vec![1i64, 2]).to_display(), "1,2");
    }

    #[test]
    fn test_member_and_index() {
        let value = Value::from(json!({"items": [10, 20], "name": "x"}));
        assert_eq!(value.member("name"), Value::Str("x".into()));
        assert_eq!(value.member("items").member("length"), Value::Int(2));
        assert_eq!(value.member("items").index(&Value::Int(1)), Value::Int(20));
        assert_eq!(value.member("missing"), Value::Null);
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(Value::Int(2).add(&Value::Int(3)), Value::Int(5));
        assert_eq!(
            Value::Str("a".into()).add(&Value::Int(1)),
            Value::Str("a1".into())
        );
        assert_eq!(
            Value::Int(7).arith(&Value::Int(2), |a, b| a % b),
            Value::Int(1)
        );
        assert_eq!(
            Value::Int(3).arith(&Value::Int(2), |a, b| a / b),
            Value::Float(1.5)
        );
    }

    #[test]
    fn test_loose_eq_and_compare() {
        assert!(Value::Int(1).loose_eq(&Value::Float(1.0)));
        assert!(!Value::Int(1).loose_eq(&Value::Str("1".into())));
        assert_eq!(
            Value::Int(1).compare(&Value::Int(2)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Str("a".into()).compare(&Value::Int(2)), None);
    }

    #[test]
    fn test_merge() {
        let mut state = Value::from(json!({"a": 1, "b": 2}));
        state.merge(Value::from(json!({"b": 3, "c": 4})));
        assert_eq!(state, Value::from(json!({"a": 1, "b": 3, "c": 4})));
    }
}
