//! Authenticity check for metadata responses.

use reqwest::header::HeaderMap;

use crate::config::{HEADER_NAME, HEADER_VALUE};
use crate::error::MetadataError;

/// Check that a response carries `Metadata-Flavor: Google`.
///
/// Header names are matched case-insensitively, the value exactly. A missing
/// or different value means something other than the metadata service
/// answered.
pub fn validate_headers(headers: &HeaderMap) -> Result<(), MetadataError> {
    match headers.get(HEADER_NAME) {
        Some(value) if value.as_bytes() == HEADER_VALUE.as_bytes() => Ok(()),
        _ => Err(MetadataError::InvalidResponse(format!(
            "Invalid response from metadata service: incorrect {HEADER_NAME} header."
        ))),
    }
}
