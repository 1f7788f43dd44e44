//! Field types used by request contracts
//!
//! Every coercion is total over absence: a missing, null or empty value
//! becomes the type's zero value. Only a present value of the wrong shape
//! fails, and the failure is returned instead of panicking.

use serde_json::{json, Number, Value};
use thiserror::Error;

/// Signature shared by all coercions
pub type CoerceFn = fn(Option<&Value>) -> Result<Value, InvalidValue>;

/// Signature shared by all response default factories
pub type DefaultFn = fn() -> Value;

/// A present value that could not be read as the requested type
#[derive(Debug, Clone, PartialEq, Error)]
#[error("expected {expected}, found {found}")]
pub struct InvalidValue {
    pub expected: &'static str,
    pub found: String,
}

impl InvalidValue {
    fn new(expected: &'static str, found: &Value) -> Self {
        Self {
            expected,
            found: found.to_string(),
        }
    }
}

/// A named field type: how to read it from input and what it defaults to
/// in a response.
#[derive(Clone, Copy)]
pub struct FieldType {
    pub name: &'static str,
    pub coerce: CoerceFn,
    pub default: DefaultFn,
}

impl std::fmt::Debug for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Free text. Absent becomes "", scalars are rendered as text.
pub const STRING: FieldType = FieldType {
    name: "string",
    coerce: to_string,
    default: empty_string,
};

/// Floating point number. Absent or "" becomes 0.0.
pub const FLOAT: FieldType = FieldType {
    name: "float",
    coerce: to_float,
    default: zero_float,
};

/// Integer. Absent or "" becomes 0.
pub const INT: FieldType = FieldType {
    name: "int",
    coerce: to_int,
    default: zero_int,
};

/// Truthiness: any non-empty, non-zero value is true.
pub const BOOL: FieldType = FieldType {
    name: "bool",
    coerce: to_bool,
    default: false_value,
};

/// Bool-ish string: true only for a case-insensitive "true".
pub const FLAG: FieldType = FieldType {
    name: "bool-ish string",
    coerce: to_flag,
    default: false_value,
};

/// A JSON list. Only meaningful as a response default.
pub const LIST: FieldType = FieldType {
    name: "list",
    coerce: to_list,
    default: empty_list,
};

fn empty_string() -> Value {
    Value::String(String::new())
}

fn zero_float() -> Value {
    json!(0.0)
}

fn zero_int() -> Value {
    json!(0)
}

fn false_value() -> Value {
    Value::Bool(false)
}

fn empty_list() -> Value {
    Value::Array(Vec::new())
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

fn to_string(value: Option<&Value>) -> Result<Value, InvalidValue> {
    let text = match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    Ok(Value::String(text))
}

fn to_float(value: Option<&Value>) -> Result<Value, InvalidValue> {
    let Some(value) = value.filter(|_| !is_blank(value)) else {
        return Ok(zero_float());
    };
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| InvalidValue::new("float", value))
}

fn to_int(value: Option<&Value>) -> Result<Value, InvalidValue> {
    let Some(value) = value.filter(|_| !is_blank(value)) else {
        return Ok(zero_int());
    };
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    };
    parsed
        .map(|i| json!(i))
        .ok_or_else(|| InvalidValue::new("int", value))
}

fn to_bool(value: Option<&Value>) -> Result<Value, InvalidValue> {
    let truthy = match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    };
    Ok(Value::Bool(truthy))
}

fn to_flag(value: Option<&Value>) -> Result<Value, InvalidValue> {
    let flag = match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        Some(other) => other.to_string().eq_ignore_ascii_case("true"),
    };
    Ok(Value::Bool(flag))
}

fn to_list(value: Option<&Value>) -> Result<Value, InvalidValue> {
    match value {
        None | Some(Value::Null) => Ok(empty_list()),
        Some(Value::Array(items)) => Ok(Value::Array(items.clone())),
        Some(other) => Err(InvalidValue::new("list", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(field: FieldType, value: Value) -> Result<Value, InvalidValue> {
        (field.coerce)(Some(&value))
    }

    #[test]
    fn test_absent_values_become_zero() {
        assert_eq!((STRING.coerce)(None).unwrap(), json!(""));
        assert_eq!((FLOAT.coerce)(None).unwrap(), json!(0.0));
        assert_eq!((INT.coerce)(None).unwrap(), json!(0));
        assert_eq!((BOOL.coerce)(None).unwrap(), json!(false));
        assert_eq!((LIST.coerce)(None).unwrap(), json!([]));
    }

    #[test]
    fn test_empty_string_is_zero_not_error() {
        assert_eq!(apply(FLOAT, json!("")).unwrap(), json!(0.0));
        assert_eq!(apply(INT, json!("")).unwrap(), json!(0));
        assert_eq!(apply(FLOAT, Value::Null).unwrap(), json!(0.0));
    }

    #[test]
    fn test_numeric_strings_parse() {
        assert_eq!(apply(FLOAT, json!("51.5")).unwrap(), json!(51.5));
        assert_eq!(apply(FLOAT, json!(" -0.12 ")).unwrap(), json!(-0.12));
        assert_eq!(apply(INT, json!("42")).unwrap(), json!(42));
        assert_eq!(apply(INT, json!(3.7)).unwrap(), json!(3));
    }

    #[test]
    fn test_garbage_numbers_fail() {
        let err = apply(FLOAT, json!("north")).unwrap_err();
        assert_eq!(err.expected, "float");
        assert!(err.found.contains("north"));

        assert!(apply(INT, json!("4.5")).is_err());
        assert!(apply(FLOAT, json!([1, 2])).is_err());
        assert!(apply(FLOAT, json!("NaN")).is_err());
    }

    #[test]
    fn test_string_renders_scalars() {
        assert_eq!(apply(STRING, json!("rex")).unwrap(), json!("rex"));
        assert_eq!(apply(STRING, json!(12)).unwrap(), json!("12"));
        assert_eq!(apply(STRING, json!(true)).unwrap(), json!("true"));
    }

    #[test]
    fn test_flag_only_accepts_true() {
        assert_eq!(apply(FLAG, json!("TRUE")).unwrap(), json!(true));
        assert_eq!(apply(FLAG, json!("true")).unwrap(), json!(true));
        assert_eq!(apply(FLAG, json!(true)).unwrap(), json!(true));
        assert_eq!(apply(FLAG, json!("yes")).unwrap(), json!(false));
        assert_eq!(apply(FLAG, json!("false")).unwrap(), json!(false));
    }

    #[test]
    fn test_bool_is_truthiness() {
        assert_eq!(apply(BOOL, json!("false")).unwrap(), json!(true));
        assert_eq!(apply(BOOL, json!("")).unwrap(), json!(false));
        assert_eq!(apply(BOOL, json!(0)).unwrap(), json!(false));
    }
}
