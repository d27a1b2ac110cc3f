//! Lenient decoding helpers shared by the link decoders and the record model.
//!
//! Share links in the wild mix Base64 alphabets, drop padding and write
//! numbers as strings. Everything here degrades instead of failing.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use percent_encoding::percent_decode_str;
use serde_json::Value;

const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decodes standard or URL-safe Base64, restoring missing `=` padding.
///
/// Returns `None` when the input is not Base64 or does not decode to UTF-8.
pub fn try_decode_base64(input: &str) -> Option<String> {
    let mut normalized: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();

    if normalized.is_empty() {
        return None;
    }
    while normalized.len() % 4 != 0 {
        normalized.push('=');
    }

    let bytes = LENIENT.decode(normalized.as_bytes()).ok()?;
    String::from_utf8(bytes).ok()
}

/// Decodes Base64, handing back the input unchanged when it does not decode.
pub fn decode_base64_or_keep(input: &str) -> String {
    try_decode_base64(input).unwrap_or_else(|| input.to_string())
}

/// Percent-decodes a URI component, replacing invalid UTF-8.
pub fn percent_decode(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}

/// Parses the leading integer of a string, ignoring trailing garbage.
///
/// `"443"`, `" 443"` and `"443/tcp"` all give 443; `"abc"` gives `None`.
pub fn parse_int(input: &str) -> Option<i64> {
    let s = input.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Coerces a JSON/YAML scalar into an integer.
pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => parse_int(s),
        _ => None,
    }
}

/// Coerces a scalar into a usable port number (1-65535).
pub fn coerce_port(value: &Value) -> Option<u16> {
    coerce_int(value)
        .filter(|p| (1..=65535).contains(p))
        .map(|p| p as u16)
}

/// Interprets the many spellings of "on" found in subscriptions.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim(), "true" | "1" | "tls"),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

/// Serde adapters used by [`crate::model`].
pub mod de {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// A port that must coerce to 1-65535; anything else rejects the record.
    pub fn port<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
        let value = Value::deserialize(deserializer)?;
        super::coerce_port(&value).ok_or_else(|| D::Error::custom(format!("invalid port {value}")))
    }

    /// A host name that must be a non-empty string.
    pub fn server<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            other => Err(D::Error::custom(format!("invalid server {other}"))),
        }
    }

    /// An optional integer; non-numeric input is dropped rather than rejected.
    pub fn lenient_u32<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u32>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(super::coerce_int(&value).and_then(|n| u32::try_from(n).ok()))
    }

    /// A boolean flag written as `true`, `"true"`, `"1"`, `1` or `"tls"`.
    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(super::is_truthy(&value))
    }

    /// A list written either as a sequence or as a comma-separated string.
    pub fn string_list<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<String>>, D::Error> {
        let list = match Value::deserialize(deserializer)? {
            Value::String(s) => super::split_list(&s),
            Value::Array(items) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok((!list.is_empty()).then_some(list))
    }
}

/// Splits a comma-separated list, dropping empty items.
pub fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
