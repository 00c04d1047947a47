//! Loosely-typed values as they arrive from the application layer, and [`Fields`], the
//! view used to read them one optional field at a time.

use std::borrow::Cow;
use std::collections::BTreeMap;

/// Configuration payload: field names mapped to loosely-typed values.
pub type Params = BTreeMap<String, Value>;

/// A single loosely-typed value. Mirrors what a host runtime can put on the wire.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(Params),
}

impl Value {
    /// Name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(object) => Self::Map(
                object
                    .into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<Params> for Value {
    fn from(value: Params) -> Self {
        Self::Map(value)
    }
}

/// Convert a JSON document into [`Params`]. Returns `None` if the document is not an object.
pub fn params_from_json(json: serde_json::Value) -> Option<Params> {
    match Value::from(json) {
        Value::Map(params) => Some(params),
        _ => None,
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("expected {expected}, got {actual}")]
    UnexpectedType {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("{value} cannot be represented as {target}")]
    OutOfRange { value: String, target: &'static str },
    #[error("unknown {kind} {value}")]
    UnknownVariant { kind: &'static str, value: u32 },
    #[error("field '{0}' is missing")]
    MissingField(&'static str),
}

fn unexpected(expected: &'static str, value: &Value) -> DecodeError {
    DecodeError::UnexpectedType {
        expected,
        actual: value.kind(),
    }
}

/// Types which can be read out of a [`Value`]. Numbers are accepted in any representation
/// and coerced to the width of the implementing type.
pub trait FromValue<'a>: Sized {
    fn from_value(value: &'a Value) -> Result<Self, DecodeError>;
}

impl FromValue<'_> for f64 {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Int(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            other => Err(unexpected("number", other)),
        }
    }
}

impl FromValue<'_> for f32 {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl FromValue<'_> for i64 {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Int(i) => Ok(*i),
            Value::Float(f)
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 =>
            {
                Ok(*f as i64)
            }
            Value::Float(f) => Err(DecodeError::OutOfRange {
                value: f.to_string(),
                target: "i64",
            }),
            other => Err(unexpected("integer", other)),
        }
    }
}

impl FromValue<'_> for u32 {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let raw = i64::from_value(value)?;
        Self::try_from(raw).map_err(|_overflow| DecodeError::OutOfRange {
            value: raw.to_string(),
            target: "u32",
        })
    }
}

impl FromValue<'_> for bool {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::Float(f) => Ok(*f != 0.0),
            other => Err(unexpected("bool", other)),
        }
    }
}

impl<'a> FromValue<'a> for &'a str {
    fn from_value(value: &'a Value) -> Result<Self, DecodeError> {
        match value {
            Value::String(s) => Ok(s.as_str()),
            other => Err(unexpected("string", other)),
        }
    }
}

impl<'a> FromValue<'a> for &'a Params {
    fn from_value(value: &'a Value) -> Result<Self, DecodeError> {
        match value {
            Value::Map(params) => Ok(params),
            other => Err(unexpected("map", other)),
        }
    }
}

impl<'a> FromValue<'a> for &'a [Value] {
    fn from_value(value: &'a Value) -> Result<Self, DecodeError> {
        match value {
            Value::List(items) => Ok(items.as_slice()),
            other => Err(unexpected("list", other)),
        }
    }
}

/// Byte buffers. JSON has no byte type, so a list of integers in `0..=255` is accepted too.
impl<'a> FromValue<'a> for Cow<'a, [u8]> {
    fn from_value(value: &'a Value) -> Result<Self, DecodeError> {
        match value {
            Value::Bytes(bytes) => Ok(Cow::Borrowed(bytes.as_slice())),
            Value::List(items) => items
                .iter()
                .map(|item| {
                    let raw = i64::from_value(item)?;
                    u8::try_from(raw).map_err(|_overflow| DecodeError::OutOfRange {
                        value: raw.to_string(),
                        target: "u8",
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Cow::Owned),
            other => Err(unexpected("bytes", other)),
        }
    }
}

/// Read-only view over [`Params`] in which every field is optional.
///
/// Absent and `null` fields read as `None`. Fields that are present but malformed are
/// reported with a warning and read as `None` too, so that a single bad field never
/// prevents the rest of the payload from being applied.
#[derive(Clone, Copy)]
pub struct Fields<'a> {
    params: &'a Params,
    scope: &'static str,
}

impl<'a> Fields<'a> {
    /// `scope` prefixes field names in diagnostics, e.g. `icon.style`.
    pub fn new(params: &'a Params, scope: &'static str) -> Self {
        Self { params, scope }
    }

    pub fn params(&self) -> &'a Params {
        self.params
    }

    /// Raw value of the field, `None` if absent or `null`.
    pub fn raw(&self, key: &str) -> Option<&'a Value> {
        self.params
            .get(key)
            .filter(|value| !matches!(value, Value::Null))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.raw(key).is_some()
    }

    pub fn get<T: FromValue<'a>>(&self, key: &str) -> Option<T> {
        self.decode(key, T::from_value)
    }

    /// Like [`Fields::get`], but with a custom decoding function.
    pub fn decode<T>(
        &self,
        key: &str,
        decode: impl FnOnce(&'a Value) -> Result<T, DecodeError>,
    ) -> Option<T> {
        let value = self.raw(key)?;
        match decode(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                log::warn!("Ignoring '{}.{}': {}.", self.scope, key, e);
                None
            }
        }
    }

    /// Nested map, viewed as another [`Fields`].
    pub fn nested(&self, key: &str, scope: &'static str) -> Option<Self> {
        self.get::<&Params>(key).map(|params| Self::new(params, scope))
    }

    /// Field which must be present. Does not log, the caller decides what a missing field
    /// means.
    ///
    /// # Errors
    ///
    /// [`DecodeError::MissingField`] if absent, or the decoding error if malformed.
    pub fn require<T: FromValue<'a>>(&self, key: &'static str) -> Result<T, DecodeError> {
        T::from_value(self.raw(key).ok_or(DecodeError::MissingField(key))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(json: serde_json::Value) -> Params {
        params_from_json(json).unwrap()
    }

    #[test]
    fn converting_json() {
        let value = Value::from(json!({"a": 1, "b": 1.5, "c": [true, null], "d": "x"}));
        let Value::Map(map) = value else {
            panic!("expected a map");
        };

        assert_eq!(map["a"], Value::Int(1));
        assert_eq!(map["b"], Value::Float(1.5));
        assert_eq!(map["c"], Value::List(vec![Value::Bool(true), Value::Null]));
        assert_eq!(map["d"], Value::String("x".to_owned()));
        assert_eq!(params_from_json(json!([1, 2])), None);
    }

    #[test]
    fn numbers_are_coerced() {
        assert_eq!(f32::from_value(&Value::Int(3)), Ok(3.0));
        assert_eq!(f64::from_value(&Value::Float(0.25)), Ok(0.25));
        assert_eq!(i64::from_value(&Value::Float(7.0)), Ok(7));
        assert_eq!(u32::from_value(&Value::Int(4_294_967_295)), Ok(u32::MAX));
        assert!(matches!(
            i64::from_value(&Value::Float(7.5)),
            Err(DecodeError::OutOfRange { .. })
        ));
        assert!(matches!(
            u32::from_value(&Value::Int(-1)),
            Err(DecodeError::OutOfRange { .. })
        ));
        assert_eq!(
            f64::from_value(&Value::from("1")),
            Err(DecodeError::UnexpectedType {
                expected: "number",
                actual: "string"
            })
        );
    }

    #[test]
    fn booleans_accept_numbers() {
        assert_eq!(bool::from_value(&Value::Bool(true)), Ok(true));
        assert_eq!(bool::from_value(&Value::Int(0)), Ok(false));
        assert_eq!(bool::from_value(&Value::Float(0.5)), Ok(true));
        assert!(bool::from_value(&Value::from("true")).is_err());
    }

    #[test]
    fn bytes_from_list_of_integers() {
        let list = Value::from(json!([1, 2, 255]));
        let bytes = Cow::<[u8]>::from_value(&list).unwrap();
        assert_eq!(&*bytes, &[1, 2, 255]);

        let raw = Value::Bytes(vec![9]);
        let bytes = Cow::<[u8]>::from_value(&raw).unwrap();
        assert!(matches!(bytes, Cow::Borrowed(_)));

        assert!(Cow::<[u8]>::from_value(&Value::from(json!([256]))).is_err());
    }

    #[test]
    fn absent_null_and_malformed_fields_read_as_none() {
        let _ = env_logger::try_init();

        let params = params(json!({"present": 2.0, "null": null, "malformed": "2.0"}));
        let fields = Fields::new(&params, "test");

        assert_eq!(fields.get::<f32>("present"), Some(2.0));
        assert_eq!(fields.get::<f32>("absent"), None);
        assert_eq!(fields.get::<f32>("null"), None);
        assert_eq!(fields.get::<f32>("malformed"), None);
        assert!(!fields.contains("null"));
        assert!(fields.contains("malformed"));
    }

    #[test]
    fn required_fields() {
        let params = params(json!({"id": "a", "number": 1}));
        let fields = Fields::new(&params, "test");

        assert_eq!(fields.require::<&str>("id"), Ok("a"));
        assert_eq!(
            fields.require::<&str>("missing"),
            Err(DecodeError::MissingField("missing"))
        );
        assert!(fields.require::<&str>("number").is_err());
    }
}
