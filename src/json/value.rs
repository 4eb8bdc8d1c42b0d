use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered key-value storage for [`DynamicValue::Map`]
pub type Map = IndexMap<String, DynamicValue>;

/// Any JSON-like value carried by a context or produced by an expression
///
/// Maps keep insertion order so a value serializes back the way it was received, but lookups
/// are always by key.
///
/// Equality is structural and strict about kinds, meaning `Int(1)` and `Double(1.0)` are
/// different values. Numeric coercion only happens inside expression operators.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum DynamicValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Array(Vec<DynamicValue>),
    Map(Map),
}

/// The kind of a [`DynamicValue`], used in diagnostics
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Null,
    Bool,
    Int,
    Double,
    String,
    Array,
    Map,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Null => "null",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Double => "double",
            Kind::String => "string",
            Kind::Array => "array",
            Kind::Map => "map",
        };
        f.write_str(name)
    }
}

impl DynamicValue {
    pub fn kind(&self) -> Kind {
        match self {
            DynamicValue::Null => Kind::Null,
            DynamicValue::Bool(_) => Kind::Bool,
            DynamicValue::Int(_) => Kind::Int,
            DynamicValue::Double(_) => Kind::Double,
            DynamicValue::String(_) => Kind::String,
            DynamicValue::Array(_) => Kind::Array,
            DynamicValue::Map(_) => Kind::Map,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DynamicValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DynamicValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DynamicValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Return the value as a float, widening integers
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DynamicValue::Int(i) => Some(*i as f64),
            DynamicValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DynamicValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<DynamicValue>> {
        match self {
            DynamicValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            DynamicValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Field access. Returns `None` if the value is not a map or the key is missing
    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Index access. Returns `None` if the value is not an array or the index is out of range
    pub fn at(&self, index: usize) -> Option<&DynamicValue> {
        self.as_array().and_then(|items| items.get(index))
    }

    /// Convert the value to the text that replaces a binding inside a template string
    ///
    /// Strings are inserted raw, `Null` becomes empty text and containers are written as compact
    /// JSON.
    pub fn to_text(&self) -> String {
        match self {
            DynamicValue::Null => String::new(),
            DynamicValue::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for DynamicValue {
    /// Writes the value as compact JSON
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynamicValue::Null => f.write_str("null"),
            DynamicValue::Bool(b) => write!(f, "{b}"),
            DynamicValue::Int(i) => write!(f, "{i}"),
            DynamicValue::Double(d) => write!(f, "{d}"),
            other => write!(f, "{}", serde_json::Value::from(other.clone())),
        }
    }
}

impl From<serde_json::Value> for DynamicValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => DynamicValue::Null,
            Value::Bool(b) => DynamicValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => DynamicValue::Int(i),
                // u64 values beyond i64::MAX and floats
                None => n
                    .as_f64()
                    .map(DynamicValue::Double)
                    .unwrap_or(DynamicValue::Null),
            },
            Value::String(s) => DynamicValue::String(s),
            Value::Array(items) => {
                DynamicValue::Array(items.into_iter().map(DynamicValue::from).collect())
            }
            Value::Object(map) => DynamicValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, DynamicValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<DynamicValue> for serde_json::Value {
    fn from(value: DynamicValue) -> Self {
        use serde_json::Value;
        match value {
            DynamicValue::Null => Value::Null,
            DynamicValue::Bool(b) => Value::Bool(b),
            DynamicValue::Int(i) => Value::from(i),
            // JSON has no representation for NaN or infinities
            DynamicValue::Double(d) => serde_json::Number::from_f64(d)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            DynamicValue::String(s) => Value::String(s),
            DynamicValue::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            DynamicValue::Map(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for DynamicValue {
    fn from(b: bool) -> Self {
        DynamicValue::Bool(b)
    }
}

impl From<i64> for DynamicValue {
    fn from(i: i64) -> Self {
        DynamicValue::Int(i)
    }
}

impl From<i32> for DynamicValue {
    fn from(i: i32) -> Self {
        DynamicValue::Int(i.into())
    }
}

impl From<f64> for DynamicValue {
    fn from(d: f64) -> Self {
        DynamicValue::Double(d)
    }
}

impl From<&str> for DynamicValue {
    fn from(s: &str) -> Self {
        DynamicValue::String(s.to_owned())
    }
}

impl From<String> for DynamicValue {
    fn from(s: String) -> Self {
        DynamicValue::String(s)
    }
}

impl From<Vec<DynamicValue>> for DynamicValue {
    fn from(items: Vec<DynamicValue>) -> Self {
        DynamicValue::Array(items)
    }
}

impl From<Map> for DynamicValue {
    fn from(map: Map) -> Self {
        DynamicValue::Map(map)
    }
}

impl<T: Into<DynamicValue>> From<Option<T>> for DynamicValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl FromIterator<(String, DynamicValue)> for DynamicValue {
    fn from_iter<I: IntoIterator<Item = (String, DynamicValue)>>(iter: I) -> Self {
        DynamicValue::Map(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn it_keeps_integers_and_doubles_apart() {
        assert_eq!(DynamicValue::from(json!(1)), DynamicValue::Int(1));
        assert_eq!(DynamicValue::from(json!(1.5)), DynamicValue::Double(1.5));
        assert_ne!(DynamicValue::Int(1), DynamicValue::Double(1.0));
    }

    #[test]
    fn it_preserves_map_insertion_order() {
        let value: DynamicValue = serde_json::from_str(r#"{"z": 1, "a": 2, "m": 3}"#).unwrap();
        let keys: Vec<&str> = value.as_map().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(value.to_string(), r#"{"z":1,"a":2,"m":3}"#);
    }

    #[test]
    fn it_compares_structurally() {
        let a = DynamicValue::from(json!({"list": [1, "two", {"three": 3.0}]}));
        let b = DynamicValue::from(json!({"list": [1, "two", {"three": 3.0}]}));
        assert_eq!(a, b);
    }

    #[test]
    fn it_accesses_fields_and_indexes() {
        let value = DynamicValue::from(json!({"a": [10, 20]}));
        assert_eq!(value.get("a").and_then(|a| a.at(1)), Some(&DynamicValue::Int(20)));
        assert_eq!(value.get("b"), None);
        assert_eq!(value.at(0), None);
    }

    #[test]
    fn it_converts_values_to_text() {
        assert_eq!(DynamicValue::Null.to_text(), "");
        assert_eq!(DynamicValue::from("neo").to_text(), "neo");
        assert_eq!(DynamicValue::Int(42).to_text(), "42");
        assert_eq!(DynamicValue::Double(2.5).to_text(), "2.5");
        assert_eq!(DynamicValue::from(json!(["a", 1])).to_text(), r#"["a",1]"#);
    }

    #[test]
    fn it_writes_non_finite_doubles_as_null() {
        let value = serde_json::Value::from(DynamicValue::Double(f64::NAN));
        assert_eq!(value, json!(null));
    }
}
