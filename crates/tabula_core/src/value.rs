use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ValueType {
    Str = 1,
    I64 = 2,
    F64 = 3,
    Bool = 4,
    Json = 5,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Str => "str",
            ValueType::I64 => "i64",
            ValueType::F64 => "f64",
            ValueType::Bool => "bool",
            ValueType::Json => "json",
        }
    }
}

/// A single column value. `Null` is an explicit SQL NULL.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Str(String),
    I64(i64),
    F64(f64),
    Bool(bool),
    Json(JsonValue),
}

impl Value {
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::Str(_) => Some(ValueType::Str),
            Value::I64(_) => Some(ValueType::I64),
            Value::F64(_) => Some(ValueType::F64),
            Value::Bool(_) => Some(ValueType::Bool),
            Value::Json(_) => Some(ValueType::Json),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(value) => Some(*value),
            _ => None,
        }
    }

    /// Integers are accepted for float columns; everything else must match exactly.
    pub fn fits(&self, value_type: ValueType) -> bool {
        match (self, value_type) {
            (Value::Null, _) => true,
            (Value::I64(_), ValueType::F64) => true,
            (value, expected) => value.value_type() == Some(expected),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::I64(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        Value::Json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{Value, ValueType};

    #[test]
    fn null_fits_any_type_and_ints_widen_to_float() {
        assert!(Value::Null.fits(ValueType::Str));
        assert!(Value::from(3).fits(ValueType::F64));
        assert!(!Value::from(3.5).fits(ValueType::I64));
        assert!(!Value::from("x").fits(ValueType::Bool));
    }
}
