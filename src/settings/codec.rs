//! Value codec: maps in-memory setting values to and from the wire strings the
//! backend stores. Pure; no I/O.
//!
//! Equality between draft and baseline is always decided on the canonical wire
//! form returned by [`normalize`], never on the in-memory representation.

use serde::Serialize;
use serde_json::Value;

use crate::error::AppError;

use super::schema::SettingShape;

/// An in-memory setting value. The variant is the "native type" the draft holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    Json(Value),
    List(Vec<String>),
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Text(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Number(value.into())
    }
}

impl From<Value> for SettingValue {
    fn from(value: Value) -> Self {
        SettingValue::Json(value)
    }
}

/// A wire string that does not conform to its declared shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct DecodeError {
    pub reason: String,
}

impl DecodeError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn for_key(self, key: &str) -> AppError {
        AppError::Decode {
            key: key.to_string(),
            reason: self.reason,
        }
    }
}

/// Shape-independent wire form of a value.
pub fn encode(value: &SettingValue) -> String {
    match value {
        SettingValue::Bool(b) => b.to_string(),
        SettingValue::Number(n) => n.to_string(),
        SettingValue::Text(s) => s.clone(),
        SettingValue::Json(v) => canonical_json(v),
        SettingValue::List(items) => join_list(items.iter().map(String::as_str)),
    }
}

/// Canonical wire form of `value` when stored under a key of `shape`.
///
/// Text typed into a JSON-shaped field is re-serialized compactly when it
/// parses, so whitespace-only edits compare equal. Malformed text is returned
/// verbatim and left for the validator to reject.
pub fn normalize(value: &SettingValue, shape: SettingShape) -> String {
    match (shape, value) {
        (SettingShape::JsonObject | SettingShape::JsonArray, SettingValue::Text(s)) => {
            match serde_json::from_str::<Value>(s) {
                Ok(parsed) => canonical_json(&parsed),
                Err(_) => s.clone(),
            }
        }
        (SettingShape::Boolean, SettingValue::Text(s)) => match s.trim() {
            "true" => "true".into(),
            "false" => "false".into(),
            _ => s.clone(),
        },
        (SettingShape::Numeric, SettingValue::Text(s)) => s.trim().to_string(),
        (SettingShape::Url, _) => encode(value).trim().trim_end_matches('/').to_string(),
        (SettingShape::List, SettingValue::Text(s)) => join_list(s.split(',')),
        _ => encode(value),
    }
}

/// Parse a wire string according to `shape`.
pub fn decode(wire: &str, shape: SettingShape) -> Result<SettingValue, DecodeError> {
    match shape {
        SettingShape::Boolean => match wire {
            "true" => Ok(SettingValue::Bool(true)),
            "false" => Ok(SettingValue::Bool(false)),
            other => Err(DecodeError::new(format!(
                "expected \"true\" or \"false\", got {other:?}"
            ))),
        },
        SettingShape::JsonObject => match parse_json(wire)? {
            v @ Value::Object(_) => Ok(SettingValue::Json(v)),
            _ => Err(DecodeError::new("expected a JSON object")),
        },
        SettingShape::JsonArray => match parse_json(wire)? {
            v @ Value::Array(_) => Ok(SettingValue::Json(v)),
            _ => Err(DecodeError::new("expected a JSON array")),
        },
        SettingShape::Numeric => Ok(decode_numeric(wire)),
        SettingShape::List => Ok(SettingValue::List(
            split_list(wire).map(str::to_string).collect(),
        )),
        SettingShape::Text | SettingShape::Url | SettingShape::Secret => {
            Ok(SettingValue::Text(wire.to_string()))
        }
    }
}

/// Numbers are kept as [`SettingValue::Number`] only when they re-render to
/// the same digits. Anything else (out of i64/u64 range, trailing zeros,
/// exponents, non-numeric text) stays as text so the wire string is untouched.
fn decode_numeric(wire: &str) -> SettingValue {
    let trimmed = wire.trim();
    match serde_json::from_str::<serde_json::Number>(trimmed) {
        Ok(n) if n.to_string() == trimmed => SettingValue::Number(n),
        Ok(_) => SettingValue::Text(trimmed.to_string()),
        Err(_) => SettingValue::Text(wire.to_string()),
    }
}

/// Lenient parse for user-entered text: falls back to plain text when the input
/// does not decode, so validation can report it at submit time.
pub fn parse_input(raw: &str, shape: SettingShape) -> SettingValue {
    if shape.is_json() {
        return SettingValue::Text(raw.to_string());
    }
    decode(raw, shape).unwrap_or_else(|_| SettingValue::Text(raw.to_string()))
}

/// Human-facing rendering. JSON shapes are pretty-printed with 2-space indent.
pub fn display(value: &SettingValue, shape: SettingShape) -> String {
    if shape.is_json() {
        let parsed = match value {
            SettingValue::Json(v) => Some(v.clone()),
            SettingValue::Text(s) => serde_json::from_str::<Value>(s).ok(),
            _ => None,
        };
        if let Some(v) = parsed {
            if let Ok(pretty) = serde_json::to_string_pretty(&sorted(&v)) {
                return pretty;
            }
        }
    }
    normalize(value, shape)
}

/// Compact JSON with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    sorted(value).to_string()
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::with_capacity(map.len());
            for key in keys {
                out.insert(key.clone(), sorted(&map[key.as_str()]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

fn parse_json(wire: &str) -> Result<Value, DecodeError> {
    serde_json::from_str(wire).map_err(|e| DecodeError::new(format!("invalid JSON: {e}")))
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}

fn join_list<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_booleans() {
        assert_eq!(encode(&SettingValue::Bool(true)), "true");
        assert_eq!(encode(&SettingValue::Bool(false)), "false");
    }

    #[test]
    fn test_json_encoding_ignores_key_order() {
        let a = SettingValue::Json(json!({"gpt-4": 15, "gpt-3.5-turbo": 0.75}));
        let b = SettingValue::Json(json!({"gpt-3.5-turbo": 0.75, "gpt-4": 15}));
        assert_eq!(encode(&a), encode(&b));
        assert_eq!(encode(&a), r#"{"gpt-3.5-turbo":0.75,"gpt-4":15}"#);
    }

    #[test]
    fn test_normalize_json_text_ignores_whitespace() {
        let typed = SettingValue::Text("{\n  \"b\": 1,\n  \"a\": 2\n}".into());
        assert_eq!(normalize(&typed, SettingShape::JsonObject), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn test_normalize_keeps_malformed_json_verbatim() {
        let typed = SettingValue::Text("{bad".into());
        assert_eq!(normalize(&typed, SettingShape::JsonObject), "{bad");
    }

    #[test]
    fn test_normalize_url_strips_trailing_slash() {
        let value = SettingValue::Text("https://example.com/ ".into());
        assert_eq!(normalize(&value, SettingShape::Url), "https://example.com");
    }

    #[test]
    fn test_normalize_list_trims_items() {
        let value = SettingValue::Text(" gmail.com, ,qq.com ".into());
        assert_eq!(normalize(&value, SettingShape::List), "gmail.com,qq.com");
        let list = SettingValue::List(vec!["gmail.com".into(), "qq.com".into()]);
        assert_eq!(normalize(&list, SettingShape::List), "gmail.com,qq.com");
    }

    #[test]
    fn test_decode_boolean_rejects_other_strings() {
        assert_eq!(decode("true", SettingShape::Boolean).unwrap(), SettingValue::Bool(true));
        let err = decode("yes", SettingShape::Boolean).unwrap_err();
        assert!(err.reason.contains("\"yes\""));
    }

    #[test]
    fn test_decode_json_object() {
        let v = decode(r#"{"a": 1}"#, SettingShape::JsonObject).unwrap();
        assert_eq!(v, SettingValue::Json(json!({"a": 1})));
        assert!(decode("{bad", SettingShape::JsonObject).is_err());
        assert!(decode("[1]", SettingShape::JsonObject).is_err());
    }

    #[test]
    fn test_decode_json_array() {
        assert!(decode("[]", SettingShape::JsonArray).is_ok());
        assert!(decode("{}", SettingShape::JsonArray).is_err());
    }

    #[test]
    fn test_decode_numeric_is_lenient() {
        assert_eq!(decode("100", SettingShape::Numeric).unwrap(), SettingValue::from(100i64));
        assert_eq!(
            decode("", SettingShape::Numeric).unwrap(),
            SettingValue::Text(String::new())
        );
    }

    #[test]
    fn test_numeric_input_keeps_typed_digits() {
        for typed in ["99999999999999999999", "500000.00", "1e3", "0.5"] {
            let value = parse_input(typed, SettingShape::Numeric);
            assert_eq!(encode(&value), typed);
            assert_eq!(normalize(&value, SettingShape::Numeric), typed);
        }
        assert_eq!(
            parse_input(" 42 ", SettingShape::Numeric),
            SettingValue::from(42i64)
        );
    }

    #[test]
    fn test_json_round_trip() {
        let v = SettingValue::Json(json!({"default": 1, "vip": {"x": [1, 2, 3]}}));
        assert_eq!(decode(&encode(&v), SettingShape::JsonObject).unwrap(), v);
    }

    #[test]
    fn test_display_pretty_prints_json() {
        let v = SettingValue::Text(r#"{"b":1,"a":2}"#.into());
        assert_eq!(display(&v, SettingShape::JsonObject), "{\n  \"a\": 2,\n  \"b\": 1\n}");
        assert_eq!(display(&SettingValue::Bool(true), SettingShape::Boolean), "true");
    }

    #[test]
    fn test_parse_input_by_shape() {
        assert_eq!(parse_input("false", SettingShape::Boolean), SettingValue::Bool(false));
        assert_eq!(parse_input("250", SettingShape::Numeric), SettingValue::from(250i64));
        assert_eq!(
            parse_input("{bad", SettingShape::JsonObject),
            SettingValue::Text("{bad".into())
        );
        assert_eq!(
            parse_input("a.com,b.com", SettingShape::List),
            SettingValue::List(vec!["a.com".into(), "b.com".into()])
        );
    }
}
