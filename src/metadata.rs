//! GcpMetadata client: request building, the retry loop and typed accessors.

use std::fmt;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::{MetadataConfig, HEADER_VALUE};
use crate::error::MetadataError;
use crate::options::MetadataOptions;
use crate::retry::{RetryPolicy, RetryResult, RetryState};
use crate::transport::{HttpTransport, MetadataRequest, RawResponse, Transport};
use crate::validate::validate_headers;
use crate::value::{parse_body, MetadataValue, EMPTY_RESPONSE};

/// Top-level metadata tree a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataType {
    Instance,
    Project,
}

impl MetadataType {
    /// Path segment under [`BASE_PATH`](crate::config::BASE_PATH).
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataType::Instance => "instance",
            MetadataType::Project => "project",
        }
    }
}

impl fmt::Display for MetadataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client for the compute metadata service.
///
/// # Example
///
/// ```ignore
/// use gcp_metadata::{GcpMetadata, MetadataError, MetadataOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), MetadataError> {
///     let metadata = GcpMetadata::new()?;
///     if !metadata.is_available().await? {
///         return Ok(());
///     }
///
///     let id = metadata.instance("id").await?;
///     let attributes = metadata
///         .project(MetadataOptions::from("attributes/").param("recursive", "true"))
///         .await?;
///     println!("{id} {attributes}");
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct GcpMetadata {
    config: MetadataConfig,
    transport: Arc<dyn Transport>,
}

impl GcpMetadata {
    /// Client for the default host, honoring `GCE_METADATA_HOST`.
    pub fn new() -> Result<Self, MetadataError> {
        Self::with_config(MetadataConfig::from_env())
    }

    /// Client using the given configuration over HTTP.
    pub fn with_config(config: MetadataConfig) -> Result<Self, MetadataError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Client for a custom host (for testing).
    pub fn with_host(host: &str) -> Result<Self, MetadataError> {
        Self::with_config(MetadataConfig::new().with_host(host))
    }

    /// Client issuing requests through `transport`.
    pub fn with_transport(config: MetadataConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Configuration this client was built with.
    pub fn config(&self) -> &MetadataConfig {
        &self.config
    }

    /// Fetch and parse an `instance` value.
    ///
    /// Accepts a property string or [`MetadataOptions`]:
    ///
    /// ```ignore
    /// let hostname = metadata.instance("hostname").await?;
    /// let everything = metadata.instance(()).await?;
    /// ```
    pub async fn instance(
        &self,
        options: impl Into<MetadataOptions>,
    ) -> Result<MetadataValue, MetadataError> {
        self.fetch(MetadataType::Instance, &options.into()).await
    }

    /// Fetch and parse a `project` value.
    pub async fn project(
        &self,
        options: impl Into<MetadataOptions>,
    ) -> Result<MetadataValue, MetadataError> {
        self.fetch(MetadataType::Project, &options.into()).await
    }

    /// Fetch an `instance` value as text, without numeric parsing.
    pub async fn instance_text(
        &self,
        options: impl Into<MetadataOptions>,
    ) -> Result<String, MetadataError> {
        let response = self
            .fetch_raw(MetadataType::Instance, &options.into(), self.retry_policy())
            .await?;
        body_text(response)
    }

    /// Fetch a `project` value as text, without numeric parsing.
    pub async fn project_text(
        &self,
        options: impl Into<MetadataOptions>,
    ) -> Result<String, MetadataError> {
        let response = self
            .fetch_raw(MetadataType::Project, &options.into(), self.retry_policy())
            .await?;
        body_text(response)
    }

    /// Fetch an `instance` value and deserialize it as JSON.
    pub async fn instance_json<T: DeserializeOwned>(
        &self,
        options: impl Into<MetadataOptions>,
    ) -> Result<T, MetadataError> {
        let text = self.instance_text(options).await?;
        serde_json::from_str(&text).map_err(MetadataError::from)
    }

    /// Fetch a `project` value and deserialize it as JSON.
    pub async fn project_json<T: DeserializeOwned>(
        &self,
        options: impl Into<MetadataOptions>,
    ) -> Result<T, MetadataError> {
        let text = self.project_text(options).await?;
        serde_json::from_str(&text).map_err(MetadataError::from)
    }

    /// Check whether the metadata service is reachable.
    ///
    /// Returns `Ok(false)` as soon as the host cannot be resolved or the
    /// resource does not exist. Other failures are retried as usual and
    /// returned as errors once retries run out.
    pub async fn is_available(&self) -> Result<bool, MetadataError> {
        let policy = RetryPolicy::fail_fast(self.config.max_retries());
        match self
            .fetch_raw(MetadataType::Instance, &MetadataOptions::default(), policy)
            .await
        {
            Ok(_) => Ok(true),
            Err(MetadataError::Transport(e)) if e.kind().is_fail_fast() => {
                debug!(error = %e, "metadata service not available");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch `kind` with `options` and parse the body.
    pub async fn fetch(
        &self,
        kind: MetadataType,
        options: &MetadataOptions,
    ) -> Result<MetadataValue, MetadataError> {
        let response = self.fetch_raw(kind, options, self.retry_policy()).await?;
        let text = body_text(response)?;
        parse_body(&text)
    }

    /// Build the request for `kind` without sending it.
    ///
    /// `Metadata-Flavor: Google` is always set, after the caller's headers.
    pub fn build_request(
        &self,
        kind: MetadataType,
        options: &MetadataOptions,
    ) -> Result<MetadataRequest, MetadataError> {
        let mut url = format!("{}/{}", self.config.base_url(), kind);
        if let Some(property) = options.property_path() {
            url.push('/');
            url.push_str(property);
        }

        let mut headers = HeaderMap::new();
        for (name, value) in options.headers() {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                MetadataError::InvalidOptions(format!("'headers' has an invalid name: {name}"))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|_| {
                MetadataError::InvalidOptions(format!("'headers' has an invalid value for {name}"))
            })?;
            headers.insert(header_name, header_value);
        }
        headers.insert(
            HeaderName::from_static("metadata-flavor"),
            HeaderValue::from_static(HEADER_VALUE),
        );

        let params = options
            .params()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(MetadataRequest {
            url,
            headers,
            params,
        })
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.max_retries())
    }

    /// Send the request until it succeeds or `policy` stops the loop, then
    /// check the response came from the metadata service.
    async fn fetch_raw(
        &self,
        kind: MetadataType,
        options: &MetadataOptions,
        policy: RetryPolicy,
    ) -> Result<RawResponse, MetadataError> {
        let request = self.build_request(kind, options)?;
        let mut state = RetryState::new();

        loop {
            let attempt = state.start_attempt();
            debug!(attempt, url = %request.url, "requesting metadata");

            let error = match self.transport.get(&request).await {
                Ok(response) if response.is_success() => {
                    validate_headers(&response.headers)?;
                    return Ok(response);
                }
                Ok(response) => MetadataError::UnsuccessfulResponse {
                    status: response.status,
                },
                Err(e) => e,
            };

            match policy.on_error(&state, error) {
                RetryResult::Continue(e) => {
                    warn!(attempt, error = %e, "metadata request failed, retrying");
                }
                flow => return Err(flow.into_error()),
            }
        }
    }
}

fn body_text(response: RawResponse) -> Result<String, MetadataError> {
    if response.body.is_empty() {
        return Err(MetadataError::InvalidResponse(EMPTY_RESPONSE.to_string()));
    }
    String::from_utf8(response.body).map_err(|_| {
        MetadataError::InvalidResponse(
            "Invalid response from the metadata service: body is not valid utf-8".to_string(),
        )
    })
}
