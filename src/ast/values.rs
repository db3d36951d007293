use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ast::Constant;

/// A runtime value bound to a placeholder tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    /// Expanded to one placeholder per element (`IN (?, ?, ?)`)
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Declared element type inferred from the value itself.
    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Null => ParamType::Unknown,
            ParamValue::Bool(_) => ParamType::Boolean,
            ParamValue::Int(_) => ParamType::Long,
            ParamValue::Float(_) => ParamType::Double,
            ParamValue::Text(_) => ParamType::Text,
            ParamValue::Bytes(_) => ParamType::Bytes,
            ParamValue::Uuid(_) => ParamType::Uuid,
            ParamValue::Date(_) => ParamType::Date,
            ParamValue::Timestamp(_) => ParamType::Timestamp,
            ParamValue::List(items) => items
                .first()
                .map(ParamValue::param_type)
                .unwrap_or(ParamType::Unknown),
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Null => write!(f, "NULL"),
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(n) => write!(f, "{}", n),
            ParamValue::Float(n) => write!(f, "{}", n),
            ParamValue::Text(s) => write!(f, "'{}'", s),
            ParamValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            ParamValue::Uuid(u) => write!(f, "'{}'", u),
            ParamValue::Date(d) => write!(f, "'{}'", d),
            ParamValue::Timestamp(t) => write!(f, "'{}'", t),
            ParamValue::List(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<Constant> for ParamValue {
    fn from(value: Constant) -> Self {
        match value {
            Constant::Null => ParamValue::Null,
            Constant::Bool(b) => ParamValue::Bool(b),
            Constant::Int(n) => ParamValue::Int(n),
            Constant::Float(n) => ParamValue::Float(n),
            Constant::Str(s) => ParamValue::Text(s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<Uuid> for ParamValue {
    fn from(value: Uuid) -> Self {
        ParamValue::Uuid(value)
    }
}

/// Declared element type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    #[default]
    Unknown,
    Boolean,
    Int,
    Long,
    Double,
    Decimal,
    Text,
    Bytes,
    Uuid,
    Date,
    Timestamp,
}

impl ParamType {
    /// Name of the codec the execution layer uses when none is given.
    pub fn default_codec(&self) -> &'static str {
        match self {
            ParamType::Unknown => "any",
            ParamType::Boolean => "bool",
            ParamType::Int => "i32",
            ParamType::Long => "i64",
            ParamType::Double => "f64",
            ParamType::Decimal => "decimal",
            ParamType::Text => "string",
            ParamType::Bytes => "bytes",
            ParamType::Uuid => "uuid",
            ParamType::Date => "date",
            ParamType::Timestamp => "timestamp",
        }
    }
}

/// Runtime value for a placeholder tag, as supplied by the producer of the
/// tree. `codec` is an opaque handle the execution layer resolves to an
/// encoder/decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub id: String,
    pub value: ParamValue,
    pub codec: String,
    pub ty: ParamType,
}

impl Binding {
    /// Binding with type and codec inferred from the value.
    pub fn new(id: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        let value = value.into();
        let ty = value.param_type();
        Self {
            id: id.into(),
            value,
            codec: ty.default_codec().to_string(),
            ty,
        }
    }

    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = codec.into();
        self
    }

    pub fn with_type(mut self, ty: ParamType) -> Self {
        self.ty = ty;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_infers_type_and_codec() {
        let b = Binding::new("name", "Joe");
        assert_eq!(b.ty, ParamType::Text);
        assert_eq!(b.codec, "string");

        let list = Binding::new("ids", ParamValue::List(vec![1.into(), 2.into()]));
        assert_eq!(list.ty, ParamType::Long);
    }

    #[test]
    fn test_param_value_display() {
        let v = ParamValue::List(vec![ParamValue::Int(1), ParamValue::Text("a".into())]);
        assert_eq!(v.to_string(), "[1, 'a']");
    }
}
