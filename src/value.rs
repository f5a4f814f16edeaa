//! Value types that events can hold.
//!
//! Event values are a tagged sum type. Readers coerce to the requested shape
//! and fall back to a documented default instead of failing, so callers never
//! have to handle a type error when reading an event.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Possible values an event can hold.
///
/// # Examples
///
/// ```
/// use eventstate::Value;
///
/// let count = Value::from(3);
/// let ready = Value::from(true);
/// let names = Value::from(vec!["a", "b"]);
///
/// assert_eq!(count.to_integer(), 3);
/// assert!(ready.to_bool());
/// assert_eq!(names.to_sequence().len(), 2);
/// ```
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Value>),
    Mapping(BTreeMap<String, Value>),
}

#[allow(missing_docs)]
impl Value {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    pub const fn is_int(&self) -> bool {
        matches!(self, Self::Int(_))
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float(_))
    }

    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    pub const fn is_sequence(&self) -> bool {
        matches!(self, Self::Sequence(_))
    }

    pub const fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping(_))
    }

    /// Ints and floats are numeric; bools are not.
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Self::Sequence(v) => Some(v),
            _ => None,
        }
    }

    pub const fn as_mapping(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Mapping(v) => Some(v),
            _ => None,
        }
    }

    /// Integer view: ints as-is, floats truncated toward zero, bools as 0/1, otherwise 0.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_integer(&self) -> i64 {
        match self {
            Self::Int(v) => *v,
            Self::Float(v) if v.is_finite() => v.trunc() as i64,
            Self::Bool(v) => i64::from(*v),
            _ => 0,
        }
    }

    /// Float view: numbers as-is, bools as 0.0/1.0, otherwise 0.0.
    #[must_use]
    pub fn to_float(&self) -> f64 {
        match self {
            Self::Bool(v) => f64::from(u8::from(*v)),
            other => other.as_float().unwrap_or(0.0),
        }
    }

    /// Bool view: bools as-is, numbers are true when non-zero, otherwise false.
    #[must_use]
    pub fn to_bool(&self) -> bool {
        match self {
            Self::Bool(v) => *v,
            Self::Int(v) => *v != 0,
            Self::Float(v) => *v != 0.0,
            _ => false,
        }
    }

    /// Sequence view: a copy of the sequence, or empty on mismatch.
    #[must_use]
    pub fn to_sequence(&self) -> Vec<Value> {
        self.as_sequence().map(<[Value]>::to_vec).unwrap_or_default()
    }

    /// Mapping view: a copy of the mapping, or empty on mismatch.
    #[must_use]
    pub fn to_mapping(&self) -> BTreeMap<String, Value> {
        self.as_mapping().cloned().unwrap_or_default()
    }

    /// String view: a copy of the string, or empty on mismatch.
    #[must_use]
    pub fn to_string_value(&self) -> String {
        self.as_str().map(str::to_string).unwrap_or_default()
    }

    /// The value incremented by one, or `None` if it is not numeric.
    #[must_use]
    pub fn incremented(&self) -> Option<Self> {
        match self {
            Self::Int(v) => Some(Self::Int(v.saturating_add(1))),
            Self::Float(v) => Some(Self::Float(v + 1.0)),
            _ => None,
        }
    }

    /// Convert into a `serde_json::Value`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(v) => serde_json::Value::Bool(*v),
            Self::Int(v) => serde_json::Value::from(*v),
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(v) => serde_json::Value::String(v.clone()),
            Self::Sequence(v) => serde_json::Value::Array(v.iter().map(Self::to_json).collect()),
            Self::Mapping(v) => serde_json::Value::Object(
                v.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Sequence(_) => "sequence",
            Self::Mapping(_) => "mapping",
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Sequence(v) => write!(f, "sequence[{}]", v.len()),
            Self::Mapping(v) => write!(f, "mapping{{{}}}", v.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::Sequence(v.into_iter().map(Into::into).collect())
    }
}

impl<V: Into<Value>> From<BTreeMap<String, V>> for Value {
    fn from(v: BTreeMap<String, V>) -> Self {
        Self::Mapping(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<V: Into<Value>> From<HashMap<String, V>> for Value {
    fn from(v: HashMap<String, V>) -> Self {
        Self::Mapping(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(a) => Self::Sequence(a.into_iter().map(Self::from).collect()),
            serde_json::Value::Object(o) => {
                Self::Mapping(o.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}
