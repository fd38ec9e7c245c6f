//! Literal attribute values.

/// A scalar (or list of scalars) carried by a literal attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    /// STEP `LOGICAL`; `None` is `.U.` (unknown).
    Logical(Option<bool>),
    Integer(i64),
    Real(f64),
    String(String),
    /// Enumeration literal without the surrounding dots.
    Enum(String),
    /// Hex digits of a STEP binary, as written.
    Binary(String),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Build a literal from plain JSON (objects are kept as their JSON text).
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Real(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(_) => Value::String(value.to_string()),
        }
    }

    /// Convert into the JSON value stored as a node property.
    ///
    /// Enumerations and binaries keep their textual form; an unknown
    /// logical becomes `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Real(r) => serde_json::Number::from_f64(*r)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) | Value::Enum(s) | Value::Binary(s) => {
                serde_json::Value::String(s.clone())
            }
            Value::Logical(l) => l.map(serde_json::Value::Bool).unwrap_or(serde_json::Value::Null),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Real(r)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_json() {
        assert_eq!(Value::from("Wall-1").to_json(), serde_json::json!("Wall-1"));
        assert_eq!(Value::Enum("ELEMENT".into()).to_json(), serde_json::json!("ELEMENT"));
        assert_eq!(Value::Logical(None).to_json(), serde_json::Value::Null);
        assert_eq!(
            Value::List(vec![Value::Real(0.5), Value::Integer(2)]).to_json(),
            serde_json::json!([0.5, 2])
        );
    }

    #[test]
    fn test_from_json() {
        assert_eq!(Value::from_json(&serde_json::json!(5)), Value::Integer(5));
        assert_eq!(Value::from_json(&serde_json::json!(2.5)), Value::Real(2.5));
        assert_eq!(
            Value::from_json(&serde_json::json!(["a", null])),
            Value::List(vec![Value::from("a"), Value::Null])
        );
    }

    #[test]
    fn test_nan_real_becomes_null() {
        assert_eq!(Value::Real(f64::NAN).to_json(), serde_json::Value::Null);
    }
}
