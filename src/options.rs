//! Caller-supplied request options and their allow-list validation.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::MetadataError;

/// The only option keys a caller may pass.
pub const RECOGNIZED_OPTIONS: [&str; 3] = ["property", "params", "headers"];

/// Validated options for one metadata request.
///
/// Build one with the setters, from a property string, or from a loose JSON
/// object through [`MetadataOptions::from_json`]:
///
/// ```
/// use gcp_metadata::MetadataOptions;
///
/// let options = MetadataOptions::from("attributes/")
///     .param("recursive", "true")
///     .header("X-Trace", "abc");
/// assert_eq!(options.property_path(), Some("attributes/"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataOptions {
    property: Option<String>,
    params: BTreeMap<String, String>,
    headers: BTreeMap<String, String>,
}

impl MetadataOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sub-path appended after the `instance` or `project` segment.
    pub fn property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    /// Add a query parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add a request header. `Metadata-Flavor` cannot be overridden.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Validate a loose options object.
    ///
    /// Every key must be one of [`RECOGNIZED_OPTIONS`]. `property` must be a
    /// string, `params` an object of strings or numbers, `headers` an object
    /// of strings. A bare string is accepted as the property shorthand and
    /// `null` as "no options".
    pub fn from_json(value: &Value) -> Result<Self, MetadataError> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::String(property) => return Ok(Self::from(property.as_str())),
            Value::Object(map) => map,
            _ => {
                return Err(MetadataError::InvalidOptions(
                    "options must be a property string or an object".to_string(),
                ))
            }
        };

        if let Some(key) = map
            .keys()
            .find(|key| !RECOGNIZED_OPTIONS.contains(&key.as_str()))
        {
            return Err(MetadataError::invalid_option(key));
        }

        let mut options = Self::default();
        if let Some(property) = map.get("property") {
            match property {
                Value::String(s) => options.property = Some(s.clone()),
                Value::Null => {}
                _ => return Err(malformed("property", "a string")),
            }
        }
        if let Some(params) = map.get("params") {
            options.params = string_map(params, "params", true)?;
        }
        if let Some(headers) = map.get("headers") {
            options.headers = string_map(headers, "headers", false)?;
        }
        Ok(options)
    }

    /// Property with any leading `/` removed; `None` when absent or empty.
    pub fn property_path(&self) -> Option<&str> {
        self.property
            .as_deref()
            .map(|p| p.trim_start_matches('/'))
            .filter(|p| !p.is_empty())
    }

    /// Query parameters, sorted by key.
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Extra request headers.
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }
}

impl From<&str> for MetadataOptions {
    fn from(property: &str) -> Self {
        Self::new().property(property)
    }
}

impl From<String> for MetadataOptions {
    fn from(property: String) -> Self {
        Self::new().property(property)
    }
}

impl From<&String> for MetadataOptions {
    fn from(property: &String) -> Self {
        Self::new().property(property.as_str())
    }
}

impl From<()> for MetadataOptions {
    fn from(_: ()) -> Self {
        Self::default()
    }
}

fn malformed(key: &str, expected: &str) -> MetadataError {
    MetadataError::InvalidOptions(format!("'{key}' must be {expected}."))
}

fn string_map(
    value: &Value,
    key: &str,
    allow_numbers: bool,
) -> Result<BTreeMap<String, String>, MetadataError> {
    let expected = if allow_numbers {
        "an object of string or number values"
    } else {
        "an object of string values"
    };
    let Value::Object(map) = value else {
        return Err(malformed(key, expected));
    };
    map.iter()
        .map(|(k, v)| match v {
            Value::String(s) => Ok((k.clone(), s.clone())),
            Value::Number(n) if allow_numbers => Ok((k.clone(), n.to_string())),
            _ => Err(malformed(key, expected)),
        })
        .collect()
}
