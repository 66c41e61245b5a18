//! Wire encodings for [`Value`]
//!
//! Two encodings are supported:
//! - **Json**: UTF-8 JSON text, what script engines exchange natively
//! - **Binary**: a compact tagged encoding built on `bincode`
//!
//! Both round-trip every finite value exactly. JSON has no representation for
//! NaN or infinities, so encoding such a number as JSON fails instead of
//! degrading it to `null`; the binary form keeps them. Decoding never panics;
//! any malformed input is reported as [`CodecError::MalformedPayload`].

use bincode::Options;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::{Value, ValueKind, ValueMap};

/// Upper bound on a single encoded payload (16 MB)
pub const MAX_PAYLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Codec errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Encoding used on the script/native boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// JSON text
    #[default]
    Json,
    /// Compact binary
    Binary,
}

impl std::fmt::Display for WireFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Binary => f.write_str("binary"),
        }
    }
}

/// Binary mirror of [`Value`].
///
/// `bincode` is not self-describing, so the value tree is written through an
/// explicitly tagged enum instead of `Value`'s own serde impls.
#[derive(Serialize, Deserialize)]
enum BinaryValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<BinaryValue>),
    Map(Vec<(String, BinaryValue)>),
}

impl From<&Value> for BinaryValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(*n),
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::Array(items.iter().map(Self::from).collect()),
            Value::Map(entries) => Self::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl TryFrom<BinaryValue> for Value {
    type Error = CodecError;

    fn try_from(value: BinaryValue) -> Result<Self, Self::Error> {
        Ok(match value {
            BinaryValue::Null => Value::Null,
            BinaryValue::Bool(b) => Value::Bool(b),
            BinaryValue::Number(n) => Value::Number(n),
            BinaryValue::String(s) => Value::String(s),
            BinaryValue::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            BinaryValue::Map(entries) => {
                let mut map = ValueMap::new();
                for (key, item) in entries {
                    if map.contains_key(&key) {
                        return Err(CodecError::MalformedPayload(format!(
                            "duplicate map key '{}'",
                            key
                        )));
                    }
                    map.insert(key, Value::try_from(item)?);
                }
                Value::Map(map)
            }
        })
    }
}

fn binary_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_limit(MAX_PAYLOAD_BYTES as u64)
        .reject_trailing_bytes()
}

/// Fail on the first NaN or infinite number in `value`
fn check_json_numbers(value: &Value) -> Result<(), CodecError> {
    match value {
        Value::Number(n) if !n.is_finite() => Err(CodecError::MalformedPayload(format!(
            "{} has no JSON representation",
            n
        ))),
        Value::Array(items) => items.iter().try_for_each(check_json_numbers),
        Value::Map(entries) => entries.values().try_for_each(check_json_numbers),
        _ => Ok(()),
    }
}

/// Encode a value with the given wire format
pub fn encode(value: &Value, format: WireFormat) -> Result<Vec<u8>, CodecError> {
    let bytes = match format {
        WireFormat::Json => {
            check_json_numbers(value)?;
            serde_json::to_vec(value).map_err(|e| CodecError::MalformedPayload(e.to_string()))?
        }
        WireFormat::Binary => binary_options()
            .serialize(&BinaryValue::from(value))
            .map_err(|e| CodecError::MalformedPayload(e.to_string()))?,
    };

    if bytes.len() > MAX_PAYLOAD_BYTES {
        return Err(CodecError::PayloadTooLarge {
            size: bytes.len(),
            max: MAX_PAYLOAD_BYTES,
        });
    }
    Ok(bytes)
}

/// Decode a value from the given wire format
pub fn decode(bytes: &[u8], format: WireFormat) -> Result<Value, CodecError> {
    if bytes.len() > MAX_PAYLOAD_BYTES {
        return Err(CodecError::PayloadTooLarge {
            size: bytes.len(),
            max: MAX_PAYLOAD_BYTES,
        });
    }

    match format {
        WireFormat::Json => serde_json::from_slice(bytes)
            .map_err(|e| CodecError::MalformedPayload(e.to_string())),
        WireFormat::Binary => {
            let raw: BinaryValue = binary_options()
                .deserialize(bytes)
                .map_err(|e| CodecError::MalformedPayload(e.to_string()))?;
            Value::try_from(raw)
        }
    }
}

/// Render a value as JSON text (used for script globals)
pub fn to_json_string(value: &Value) -> Result<String, CodecError> {
    check_json_numbers(value)?;
    serde_json::to_string(value).map_err(|e| CodecError::MalformedPayload(e.to_string()))
}

/// Parse JSON text into a value
pub fn from_json_str(text: &str) -> Result<Value, CodecError> {
    serde_json::from_str(text).map_err(|e| CodecError::MalformedPayload(e.to_string()))
}

/// Require an array, naming `what` in the error
pub fn expect_array<'a>(value: &'a Value, what: &str) -> Result<&'a [Value], CodecError> {
    value.as_array().ok_or_else(|| {
        CodecError::MalformedPayload(format!("{} must be an array, got {}", what, value.kind()))
    })
}

/// Require a map, naming `what` in the error
pub fn expect_map<'a>(value: &'a Value, what: &str) -> Result<&'a ValueMap, CodecError> {
    match value {
        Value::Map(map) => Ok(map),
        other => Err(CodecError::MalformedPayload(format!(
            "{} must be a {}, got {}",
            what,
            ValueKind::Map,
            other.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        let mut map = ValueMap::new();
        map.insert("name".into(), Value::from("view"));
        map.insert("opacity".into(), Value::from(0.5));
        map.insert("hidden".into(), Value::from(false));
        map.insert("nothing".into(), Value::Null);
        Value::from(vec![
            Value::from(1),
            Value::from(vec![Value::from("a"), Value::from(-2.25)]),
            Value::Map(map),
        ])
    }

    #[test]
    fn test_json_round_trip() {
        let value = sample();
        let bytes = encode(&value, WireFormat::Json).unwrap();
        assert_eq!(decode(&bytes, WireFormat::Json).unwrap(), value);
    }

    #[test]
    fn test_binary_round_trip() {
        let value = sample();
        let bytes = encode(&value, WireFormat::Binary).unwrap();
        assert_eq!(decode(&bytes, WireFormat::Binary).unwrap(), value);
    }

    #[test]
    fn test_malformed_json() {
        let err = decode(b"[1, 2", WireFormat::Json).unwrap_err();
        assert!(matches!(err, CodecError::MalformedPayload(_)));
    }

    #[test]
    fn test_malformed_binary() {
        let err = decode(&[0xff, 0xff, 0xff], WireFormat::Binary).unwrap_err();
        assert!(matches!(err, CodecError::MalformedPayload(_)));
    }

    #[test]
    fn test_binary_rejects_trailing_bytes() {
        let mut bytes = encode(&Value::from(true), WireFormat::Binary).unwrap();
        bytes.push(0);
        assert!(decode(&bytes, WireFormat::Binary).is_err());
    }

    #[test]
    fn test_json_rejects_non_finite_numbers() {
        for n in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let nested = Value::from(vec![Value::empty_map().with("x", n)]);
            assert!(matches!(
                encode(&nested, WireFormat::Json),
                Err(CodecError::MalformedPayload(_))
            ));
            assert!(to_json_string(&Value::from(n)).is_err());
        }
    }

    #[test]
    fn test_expect_helpers() {
        assert!(expect_array(&Value::Null, "moduleIds").is_err());
        assert!(expect_map(&Value::empty_map(), "props").is_ok());

        let err = expect_array(&Value::from(3), "paramsArrays").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Malformed payload: paramsArrays must be an array, got number"
        );
    }

    #[test]
    fn test_wire_format_serde() {
        let format: WireFormat = serde_json::from_str("\"binary\"").unwrap();
        assert_eq!(format, WireFormat::Binary);
        assert_eq!(WireFormat::default(), WireFormat::Json);
    }
}
