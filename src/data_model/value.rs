use serde_json::Value;

use super::{AttributeType, Constraint, ValueType};
use crate::{error::ValidationError, tlv::TagLengthValue};

/// A value that has been checked against the attribute it is written to.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Boolean(bool),
    UInt(u64),
    Int(i64),
    Float32(f32),
    Float64(f64),
    CharString(String),
    OctetString(Vec<u8>),
    Null,
}

impl TypedValue {
    /// Convert a raw argument into a value of `ty`, checking the width's
    /// representable range and then `constraint`.
    ///
    /// Integral numbers are accepted for integer types, any finite number
    /// for floats, and either a hex string or an array of byte values for
    /// octet strings. Integers are never rounded: `1.5` for an integer
    /// attribute, or `16777217` for a single precision one, is a type
    /// mismatch. Decimal literals go to the nearest float of the width.
    pub fn from_json(
        raw: &Value,
        ty: AttributeType,
        constraint: &Constraint,
    ) -> Result<Self, ValidationError> {
        let expected = ty.value_type;
        let mismatch = |found: &'static str| ValidationError::TypeMismatch { expected, found };

        if raw.is_null() {
            return if ty.nullable {
                Ok(TypedValue::Null)
            } else {
                Err(mismatch("null"))
            };
        }

        match expected {
            ValueType::Boolean => raw.as_bool().map(TypedValue::Boolean).ok_or(mismatch(kind(raw))),
            ValueType::UInt(_) | ValueType::Int(_) => {
                let value = integer(raw).map_err(mismatch)?;
                if let Some((min, max)) = expected.integer_range(ty.nullable) {
                    check_range(value, min, max)?;
                }
                if let Constraint::Range { min, max } = constraint {
                    check_range(value, i128::from(*min), i128::from(*max))?;
                }
                // Both conversions hold after the width check
                Ok(match expected {
                    ValueType::UInt(_) => TypedValue::UInt(value as u64),
                    _ => TypedValue::Int(value as i64),
                })
            }
            ValueType::Float32 => {
                let value = float(raw).map_err(mismatch)?;
                let narrowed = value as f32;
                if !narrowed.is_finite() {
                    return Err(mismatch("number outside single precision range"));
                }
                if !holds_integer(raw, narrowed as i128) {
                    return Err(mismatch("number not representable in single precision"));
                }
                Ok(TypedValue::Float32(narrowed))
            }
            ValueType::Float64 => {
                let value = float(raw).map_err(mismatch)?;
                if !holds_integer(raw, value as i128) {
                    return Err(mismatch("number not representable in double precision"));
                }
                Ok(TypedValue::Float64(value))
            }
            ValueType::CharString | ValueType::LongCharString => {
                let value = raw.as_str().ok_or(mismatch(kind(raw)))?;
                check_length(value.len(), expected, constraint)?;
                Ok(TypedValue::CharString(value.to_string()))
            }
            ValueType::OctetString | ValueType::LongOctetString => {
                let value = octets(raw).map_err(mismatch)?;
                check_length(value.len(), expected, constraint)?;
                Ok(TypedValue::OctetString(value))
            }
        }
    }

    pub fn to_tlv(&self) -> TagLengthValue {
        match self {
            TypedValue::Boolean(value) => TagLengthValue::Boolean(*value),
            TypedValue::UInt(value) => TagLengthValue::Unsigned(*value),
            TypedValue::Int(value) => TagLengthValue::Signed(*value),
            TypedValue::Float32(value) => TagLengthValue::Float32(*value),
            TypedValue::Float64(value) => TagLengthValue::Float64(*value),
            TypedValue::CharString(value) => TagLengthValue::Utf8String(value.clone()),
            TypedValue::OctetString(value) => TagLengthValue::ByteString(value.clone()),
            TypedValue::Null => TagLengthValue::Null,
        }
    }
}

fn kind(raw: &Value) -> &'static str {
    match raw {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn integer(raw: &Value) -> Result<i128, &'static str> {
    let Value::Number(number) = raw else {
        return Err(kind(raw));
    };
    if let Some(value) = number.as_u64() {
        return Ok(i128::from(value));
    }
    if let Some(value) = number.as_i64() {
        return Ok(i128::from(value));
    }
    match number.as_f64() {
        // Beyond 2^64 the value fails the width check anyway
        Some(value) if value.is_finite() && value.fract() == 0.0 && value.abs() < 1.9e19 => {
            Ok(value as i128)
        }
        _ => Err("fractional number"),
    }
}

/// Whether an integral literal survived conversion to a float unchanged.
/// Decimal literals are inexact to begin with and always pass.
fn holds_integer(raw: &Value, converted: i128) -> bool {
    let Value::Number(number) = raw else {
        return true;
    };
    match (number.as_u64(), number.as_i64()) {
        (Some(value), _) => i128::from(value) == converted,
        (None, Some(value)) => i128::from(value) == converted,
        (None, None) => true,
    }
}

fn float(raw: &Value) -> Result<f64, &'static str> {
    match raw {
        Value::Number(number) => number
            .as_f64()
            .filter(|value| value.is_finite())
            .ok_or("non-finite number"),
        other => Err(kind(other)),
    }
}

fn octets(raw: &Value) -> Result<Vec<u8>, &'static str> {
    match raw {
        Value::String(value) => hex::decode(value).map_err(|_| "non-hex string"),
        Value::Array(values) => values
            .iter()
            .map(|value| {
                value
                    .as_u64()
                    .and_then(|byte| u8::try_from(byte).ok())
                    .ok_or("array with non-byte values")
            })
            .collect(),
        other => Err(kind(other)),
    }
}

fn check_range(value: i128, min: i128, max: i128) -> Result<(), ValidationError> {
    if value < min || value > max {
        Err(ValidationError::OutOfRange { value, min, max })
    } else {
        Ok(())
    }
}

fn check_length(
    len: usize,
    value_type: ValueType,
    constraint: &Constraint,
) -> Result<(), ValidationError> {
    let max = match constraint {
        Constraint::MaxLength(max) => Some(*max),
        _ => value_type.default_max_len(),
    };
    match max {
        Some(max) if len > max => Err(ValidationError::OutOfRange {
            value: len as i128,
            min: 0,
            max: max as i128,
        }),
        _ => Ok(()),
    }
}
