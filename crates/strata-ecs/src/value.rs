//! Property values.
//!
//! Every component property holds a [`Value`], a small tagged union covering
//! the shapes a schema default can take. Schemas built from JSON convert each
//! default through [`Value::try_from`]; code that builds schemas directly uses
//! the `From` impls for the usual Rust primitives.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A dynamically-typed property value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absence of a meaningful value (JSON `null`).
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    /// Nested string-keyed record. Ordered for deterministic output.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Short name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of the value. Integers widen to `f64`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

// -- conversions from Rust primitives ----------------------------------------

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(f64::from(x))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

// -- conversion from JSON ------------------------------------------------------

/// Error returned when a JSON number cannot be represented as a [`Value`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("number {0} is not representable as an int or float property")]
pub struct UnrepresentableNumber(pub String);

impl TryFrom<&serde_json::Value> for Value {
    type Error = UnrepresentableNumber;

    fn try_from(json: &serde_json::Value) -> Result<Self, Self::Error> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(x) = n.as_f64() {
                    Value::Float(x)
                } else {
                    return Err(UnrepresentableNumber(n.to_string()));
                }
            }
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => Value::List(
                items
                    .iter()
                    .map(Value::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), Value::try_from(v)?)))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_conversions() {
        assert_eq!(Value::from(100), Value::Int(100));
        assert_eq!(Value::from(1.5), Value::Float(1.5));
        assert_eq!(Value::from("orc"), Value::Text("orc".to_owned()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(
            Value::from(vec![1, 2]),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn json_numbers_prefer_int() {
        let v = Value::try_from(&serde_json::json!(7)).unwrap();
        assert_eq!(v, Value::Int(7));
        let v = Value::try_from(&serde_json::json!(7.25)).unwrap();
        assert_eq!(v, Value::Float(7.25));
    }

    #[test]
    fn json_nested_structures() {
        let v = Value::try_from(&serde_json::json!({"tags": ["a", "b"], "hp": 3})).unwrap();
        let Value::Map(entries) = v else {
            panic!("expected map");
        };
        assert_eq!(entries["hp"], Value::Int(3));
        assert_eq!(
            entries["tags"],
            Value::List(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn accessors_match_only_their_variant() {
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Int(1).as_bool(), None);
        assert_eq!(Value::Int(-3).as_int(), Some(-3));
        assert_eq!(Value::Float(3.0).as_int(), None);
        assert_eq!(Value::from("orc").as_str(), Some("orc"));
        assert!(Value::default().is_null());
        assert!(!Value::Int(0).is_null());
    }

    #[test]
    fn kind_names_each_variant() {
        let kinds: Vec<_> = [
            Value::Null,
            Value::from(false),
            Value::from(1),
            Value::from(1.5),
            Value::from("a"),
            Value::from(vec![1]),
            Value::Map(BTreeMap::new()),
        ]
        .iter()
        .map(Value::kind)
        .collect();
        assert_eq!(kinds, ["null", "bool", "int", "float", "text", "list", "map"]);
    }

    #[test]
    fn int_widens_to_float() {
        assert_eq!(Value::Int(4).as_float(), Some(4.0));
        assert_eq!(Value::Text("x".into()).as_float(), None);
    }

    #[test]
    fn display_is_compact() {
        let v = Value::from(vec![Value::from(1), Value::from("a")]);
        assert_eq!(v.to_string(), r#"[1, "a"]"#);
    }
}
