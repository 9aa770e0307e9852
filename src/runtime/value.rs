use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::{GraphError, Result};

/// Type tag of a port or a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Bool,
    Int,
    Float,
    String,
    Any,
}

impl ValueType {
    pub fn default_value(self) -> Value {
        match self {
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::String => Value::String(String::new()),
            ValueType::Any => Value::Null,
        }
    }

    /// Whether an output of type `self` may feed an input of type `target`.
    pub fn links_to(self, target: ValueType) -> bool {
        target == ValueType::Any || self == target
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Int | ValueType::Float)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::Any => "any",
        };
        f.write_str(name)
    }
}

/// A runtime value flowing between ports.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Any,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
        }
    }

    /// Whether this value may be stored in a port declared as `ty`.
    pub fn fits(&self, ty: ValueType) -> bool {
        ty == ValueType::Any || self.value_type() == ty
    }

    /// Converts a JSON param into a value of the requested type.
    pub fn from_json(ty: ValueType, json: &Json) -> Result<Value> {
        let value = match (ty, json) {
            (_, Json::Null) => ty.default_value(),
            (ValueType::Bool, Json::Bool(b)) => Value::Bool(*b),
            (ValueType::Int, Json::Number(n)) => n
                .as_i64()
                .map(Value::Int)
                .ok_or(GraphError::OutOfRange(ValueType::Int))?,
            (ValueType::Float, Json::Number(n)) => n
                .as_f64()
                .map(Value::Float)
                .ok_or(GraphError::OutOfRange(ValueType::Float))?,
            (ValueType::String, Json::String(s)) => Value::String(s.clone()),
            (ValueType::Any, Json::Bool(b)) => Value::Bool(*b),
            (ValueType::Any, Json::Number(n)) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            (ValueType::Any, Json::String(s)) => Value::String(s.clone()),
            _ => {
                return Err(GraphError::TypeMismatch {
                    expected: ty,
                    actual: ValueType::Any,
                });
            }
        };
        Ok(value)
    }

    /// Parses text into a value of the requested type.
    ///
    /// Booleans accept `true`/`false` in any case. `Any` keeps the text as is.
    pub fn parse(ty: ValueType, text: &str) -> Option<Value> {
        match ty {
            ValueType::Bool => {
                if text.eq_ignore_ascii_case("true") {
                    Some(Value::Bool(true))
                } else if text.eq_ignore_ascii_case("false") {
                    Some(Value::Bool(false))
                } else {
                    None
                }
            }
            ValueType::Int => text.parse().ok().map(Value::Int),
            ValueType::Float => text.parse().ok().map(Value::Float),
            ValueType::String | ValueType::Any => Some(Value::String(text.to_string())),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Converts an f64 back into a numeric value of type `ty`, truncating
    /// towards zero for integers.
    pub fn from_f64(ty: ValueType, x: f64) -> Result<Value> {
        match ty {
            ValueType::Float => Ok(Value::Float(x)),
            ValueType::Int => {
                let truncated = x.trunc();
                if !truncated.is_finite() || truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
                    return Err(GraphError::OutOfRange(ValueType::Int));
                }
                Ok(Value::Int(truncated as i64))
            }
            other => Err(GraphError::TypeMismatch {
                expected: ValueType::Float,
                actual: other,
            }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
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

/// Statically typed view of a [`Value`], used by typed port handles.
pub trait PortValue: Sized + Send + 'static {
    const TYPE: ValueType;

    fn from_value(value: Value) -> Result<Self>;

    fn into_value(self) -> Value;
}

fn mismatch(expected: ValueType, value: &Value) -> GraphError {
    GraphError::TypeMismatch {
        expected,
        actual: value.value_type(),
    }
}

impl PortValue for bool {
    const TYPE: ValueType = ValueType::Bool;

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch(Self::TYPE, &other)),
        }
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl PortValue for i64 {
    const TYPE: ValueType = ValueType::Int;

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(mismatch(Self::TYPE, &other)),
        }
    }

    fn into_value(self) -> Value {
        Value::Int(self)
    }
}

impl PortValue for f64 {
    const TYPE: ValueType = ValueType::Float;

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(x) => Ok(x),
            other => Err(mismatch(Self::TYPE, &other)),
        }
    }

    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl PortValue for String {
    const TYPE: ValueType = ValueType::String;

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(mismatch(Self::TYPE, &other)),
        }
    }

    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl PortValue for Value {
    const TYPE: ValueType = ValueType::Any;

    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }

    fn into_value(self) -> Value {
        self
    }
}
