//! Parsed metadata values with lossless handling of large numbers.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::value::RawValue;

use crate::error::MetadataError;

/// Largest integer an `f64` represents exactly, 2^53 - 1.
pub const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;

pub(crate) const EMPTY_RESPONSE: &str = "Invalid response from the metadata service";

/// A number kept as its exact decimal text because an `f64` would lose
/// digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigNumber(String);

impl BigNumber {
    /// The original decimal text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The value as a `u64`, if it is an integer in range.
    pub fn to_u64(&self) -> Option<u64> {
        self.0.parse().ok()
    }

    /// The value as an `i128`, if it is an integer in range.
    pub fn to_i128(&self) -> Option<i128> {
        self.0.parse().ok()
    }
}

impl fmt::Display for BigNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BigNumber {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept exactly what JSON accepts as a number.
        match serde_json::from_str::<Box<RawValue>>(s) {
            Ok(raw) if raw.get() == s && starts_number(s) => Ok(Self(s.to_string())),
            _ => Err(MetadataError::InvalidResponse(format!(
                "'{s}' is not a number"
            ))),
        }
    }
}

impl PartialEq<str> for BigNumber {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for BigNumber {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Serialize for BigNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match RawValue::from_string(self.0.clone()) {
            Ok(raw) => raw.serialize(serializer),
            Err(_) => serializer.serialize_str(&self.0),
        }
    }
}

/// A metadata response body.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    /// A number that round-trips through `f64`.
    Number(f64),
    /// A number that does not.
    BigNumber(BigNumber),
    String(String),
    Array(Vec<MetadataValue>),
    Object(BTreeMap<String, MetadataValue>),
}

impl MetadataValue {
    /// The text of a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// A number that fits an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// A number kept as exact text.
    pub fn as_big_number(&self) -> Option<&BigNumber> {
        match self {
            Self::BigNumber(n) => Some(n),
            _ => None,
        }
    }

    /// The value of a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The items of an array value.
    pub fn as_array(&self) -> Option<&[MetadataValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// The entries of an object value.
    pub fn as_object(&self) -> Option<&BTreeMap<String, MetadataValue>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key of an object value.
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Whether this is JSON `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Build a value from a JSON token, keeping number literals verbatim.
    fn from_raw(raw: &RawValue) -> Result<Self, serde_json::Error> {
        let text = raw.get().trim();
        let value = match text.as_bytes().first() {
            Some(b'{') => Self::Object(
                serde_json::from_str::<BTreeMap<String, Box<RawValue>>>(text)?
                    .into_iter()
                    .map(|(k, v)| Self::from_raw(&v).map(|v| (k, v)))
                    .collect::<Result<_, _>>()?,
            ),
            Some(b'[') => Self::Array(
                serde_json::from_str::<Vec<Box<RawValue>>>(text)?
                    .iter()
                    .map(|v| Self::from_raw(v))
                    .collect::<Result<_, _>>()?,
            ),
            Some(b'"') => Self::String(serde_json::from_str(text)?),
            Some(b't' | b'f') => Self::Bool(serde_json::from_str(text)?),
            Some(b'n') => Self::Null,
            _ => Self::from_number_text(text),
        };
        Ok(value)
    }

    /// `text` is a valid JSON number literal.
    fn from_number_text(text: &str) -> Self {
        match text.parse::<f64>() {
            Ok(n) if n.is_finite() && (!is_integer_literal(text) || is_safe_integer(n)) => {
                Self::Number(n)
            }
            _ => Self::BigNumber(BigNumber(text.to_string())),
        }
    }
}

fn starts_number(text: &str) -> bool {
    text.starts_with(|c: char| c == '-' || c.is_ascii_digit())
}

fn is_integer_literal(text: &str) -> bool {
    !text.contains(['.', 'e', 'E'])
}

fn is_safe_integer(n: f64) -> bool {
    n.abs() <= MAX_SAFE_INTEGER as f64
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::BigNumber(n) => write!(f, "{n}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Null => f.write_str("null"),
            other => {
                let json = serde_json::to_string(other).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl Serialize for MetadataValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => {
                if n.fract() == 0.0 && is_safe_integer(*n) {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Self::BigNumber(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

/// Parse a response body.
///
/// JSON bodies are parsed structurally, with every number that an `f64`
/// cannot hold exactly kept as a [`BigNumber`]. Anything that is not JSON is
/// returned as text. Empty bodies and a bare `null` are rejected.
pub fn parse_body(body: &str) -> Result<MetadataValue, MetadataError> {
    if body.is_empty() {
        return Err(MetadataError::InvalidResponse(EMPTY_RESPONSE.to_string()));
    }
    let Ok(raw) = serde_json::from_str::<Box<RawValue>>(body) else {
        return Ok(MetadataValue::String(body.to_string()));
    };
    match MetadataValue::from_raw(&raw)? {
        MetadataValue::Null => Err(MetadataError::InvalidResponse(EMPTY_RESPONSE.to_string())),
        value => Ok(value),
    }
}
