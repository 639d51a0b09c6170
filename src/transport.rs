//! HTTP transport for metadata requests.

use std::error::Error as StdError;
use std::fmt;
use std::io;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};

use crate::config::MetadataConfig;
use crate::error::{MetadataError, TransportError, TransportErrorKind};

/// A fully built GET request.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub params: Vec<(String, String)>,
}

/// Status, headers and body of one response.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Response with the given status, no headers and an empty body.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Replace the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues metadata requests.
///
/// Network failures are reported as [`MetadataError::Transport`] with a
/// [`TransportErrorKind`] so the retry loop can tell "no such host" from a
/// transient failure.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    async fn get(&self, request: &MetadataRequest) -> Result<RawResponse, MetadataError>;
}

/// [`Transport`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    inner: Client,
    max_size: Option<usize>,
}

impl HttpTransport {
    /// Build a client with the configured timeout and body size limit.
    pub fn new(config: &MetadataConfig) -> Result<Self, MetadataError> {
        let inner = Client::builder()
            .timeout(config.timeout())
            .no_proxy()
            .build()
            .map_err(MetadataError::Client)?;
        Ok(Self {
            inner,
            max_size: config.max_size(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, request: &MetadataRequest) -> Result<RawResponse, MetadataError> {
        let mut builder = self.inner.get(&request.url).headers(request.headers.clone());
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        let response = builder
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = read_body_limited(response, self.max_size).await?;
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// Read response body with an optional size limit.
///
/// If `max_size` is `Some`, this will:
/// 1. Check the `Content-Length` header and fail early if it exceeds the limit
/// 2. Read the body chunk by chunk, aborting as soon as the limit is crossed
pub async fn read_body_limited(
    response: Response,
    max_size: Option<usize>,
) -> Result<Vec<u8>, MetadataError> {
    let Some(max_size) = max_size else {
        return Ok(response.bytes().await.map_err(classify)?.to_vec());
    };

    if let Some(content_length) = response.content_length() {
        if content_length as usize > max_size {
            return Err(MetadataError::TooLarge(content_length as usize, max_size));
        }
    }

    // Capacity is capped even if Content-Length is missing or wrong
    let capacity = response
        .content_length()
        .map(|cl| (cl as usize).min(max_size))
        .unwrap_or(max_size.min(8192));
    let mut body = Vec::with_capacity(capacity);

    let mut stream = response;
    while let Some(chunk) = stream.chunk().await.map_err(classify)? {
        let total = body.len().saturating_add(chunk.len());
        if total > max_size {
            return Err(MetadataError::TooLarge(total, max_size));
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

/// Map a reqwest failure onto a [`TransportErrorKind`].
fn classify(err: reqwest::Error) -> MetadataError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if let Some(kind) = kind_from_sources(&err) {
        kind
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else {
        TransportErrorKind::Other("unknown".to_string())
    };
    let message = err.to_string();
    TransportError::with_source(kind, message, err).into()
}

fn kind_from_sources(err: &reqwest::Error) -> Option<TransportErrorKind> {
    let mut source = err.source();
    while let Some(e) = source {
        if is_resolution_failure(&e.to_string()) {
            return Some(TransportErrorKind::HostNotFound);
        }
        if let Some(io) = e.downcast_ref::<io::Error>() {
            return Some(kind_from_io(io));
        }
        source = e.source();
    }
    None
}

/// Matches resolver failures by message text. hyper-util's
/// `client::legacy::connect::dns` `ConnectError` displays as `"dns error"`, and
/// the getaddrinfo io error under it reads `"failed to lookup address
/// information"`. Re-check both strings when upgrading reqwest or hyper-util.
fn is_resolution_failure(message: &str) -> bool {
    message.starts_with("dns error") || message.contains("failed to lookup address")
}

pub(crate) fn kind_from_io(err: &io::Error) -> TransportErrorKind {
    match err.kind() {
        io::ErrorKind::NotFound => TransportErrorKind::ResourceNotFound,
        io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected => TransportErrorKind::Connect,
        kind => TransportErrorKind::Other(format!("{kind:?}")),
    }
}
