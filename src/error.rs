//! Error types for metadata service operations.

use std::fmt;

use thiserror::Error;

/// Errors that can occur when fetching metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The caller passed an unrecognized or malformed configuration option.
    #[error("{0}")]
    InvalidOptions(String),

    /// The response did not come from the metadata service, or had no usable body.
    #[error("{0}")]
    InvalidResponse(String),

    /// The service kept answering with a non-2xx status.
    #[error("Unsuccessful response status code. Request failed with status code {status}")]
    UnsuccessfulResponse {
        /// Status code of the last attempt.
        status: u16,
    },

    /// Network-level failure reported by the transport.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Response exceeds maximum allowed size.
    #[error("response too large: {0} bytes exceeds limit of {1} bytes")]
    TooLarge(usize, usize),

    /// The HTTP client could not be built.
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    /// JSON error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl MetadataError {
    pub(crate) fn invalid_option(key: &str) -> Self {
        if key == "qs" {
            return Self::InvalidOptions(
                "'qs' is not a valid configuration option. Please use 'params' instead."
                    .to_string(),
            );
        }
        Self::InvalidOptions(format!("'{key}' is not a valid configuration option."))
    }

    /// Returns the transport error, if this is one.
    pub fn as_transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the HTTP status for [`MetadataError::UnsuccessfulResponse`].
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnsuccessfulResponse { status } => Some(*status),
            _ => None,
        }
    }
}

/// Classification of a transport failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The metadata host name could not be resolved.
    HostNotFound,
    /// The addressed resource (socket, file, route) does not exist.
    ResourceNotFound,
    /// The attempt was aborted by a timeout.
    Timeout,
    /// The connection could not be established or was reset.
    Connect,
    /// Anything else, with the underlying error code if one is known.
    Other(String),
}

impl TransportErrorKind {
    /// Whether this condition means "no metadata service here" for
    /// `is_available`.
    pub fn is_fail_fast(&self) -> bool {
        matches!(self, Self::HostNotFound | Self::ResourceNotFound)
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HostNotFound => write!(f, "host not found"),
            Self::ResourceNotFound => write!(f, "resource not found"),
            Self::Timeout => write!(f, "timeout"),
            Self::Connect => write!(f, "connection failed"),
            Self::Other(code) => write!(f, "transport error {code}"),
        }
    }
}

/// A network-level failure, passed through to the caller once retries run out.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    /// Create a transport error without an underlying source.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a transport error wrapping the error that caused it.
    pub fn with_source<E>(kind: TransportErrorKind, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns the failure classification.
    pub fn kind(&self) -> &TransportErrorKind {
        &self.kind
    }

    /// Returns the human-readable description of the failure.
    pub fn message(&self) -> &str {
        &self.message
    }
}
