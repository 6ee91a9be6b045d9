// Value decoder - turns raw payloads into numeric measurements
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use thiserror::Error;

const TIMESTAMP_FIELDS: [&str; 3] = ["time", "timestamp", "ts"];

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload is not numeric")]
    NotNumeric,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decoded {
    pub value: f64,
    /// Timestamp carried by the payload, if any and parsable.
    pub observed_at: Option<DateTime<Utc>>,
}

type Parser = fn(&[u8], Option<&Value>) -> Option<Decoded>;

/// Tried left to right; first success wins.
const PARSERS: [Parser; 3] = [from_json_object, from_json_number, from_numeric_text];

pub fn decode(payload: &[u8]) -> Result<Decoded, DecodeError> {
    let json = serde_json::from_slice::<Value>(payload).ok();

    PARSERS
        .iter()
        .find_map(|parse| parse(payload, json.as_ref()))
        .filter(|decoded| decoded.value.is_finite())
        .ok_or(DecodeError::NotNumeric)
}

fn from_json_object(_: &[u8], json: Option<&Value>) -> Option<Decoded> {
    let object = json?.as_object()?;
    let value = object.get("value")?.as_f64()?;
    let observed_at = TIMESTAMP_FIELDS
        .iter()
        .filter_map(|field| object.get(*field))
        .find_map(parse_timestamp);
    Some(Decoded { value, observed_at })
}

fn from_json_number(_: &[u8], json: Option<&Value>) -> Option<Decoded> {
    let value = json?.as_f64()?;
    Some(Decoded {
        value,
        observed_at: None,
    })
}

fn from_numeric_text(payload: &[u8], _: Option<&Value>) -> Option<Decoded> {
    let text = std::str::from_utf8(payload).ok()?.trim();
    let value = text.parse::<f64>().ok()?;
    Some(Decoded {
        value,
        observed_at: None,
    })
}

/// RFC 3339 strings or epoch milliseconds.
fn parse_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}
