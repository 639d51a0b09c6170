//! Process-wide constants and client configuration.

use std::time::Duration;

/// Link-local address of the metadata service.
pub const HOST_ADDRESS: &str = "http://169.254.169.254";

/// Path prefix of every metadata request.
pub const BASE_PATH: &str = "/computeMetadata/v1";

/// Full default base URL, `HOST_ADDRESS` followed by `BASE_PATH`.
pub const BASE_URL: &str = "http://169.254.169.254/computeMetadata/v1";

/// Header sent with every request and expected on every response.
pub const HEADER_NAME: &str = "Metadata-Flavor";

/// Value of [`HEADER_NAME`] in both directions.
pub const HEADER_VALUE: &str = "Google";

/// Number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default timeout for a single attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Environment variable overriding the metadata host (`host` or `host:port`).
pub const METADATA_HOST_ENV_VAR: &str = "GCE_METADATA_HOST";

/// Immutable configuration shared by every call made through one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataConfig {
    host: String,
    timeout: Duration,
    max_retries: u32,
    max_size: Option<usize>,
}

impl MetadataConfig {
    /// Configuration pointing at the fixed link-local host.
    pub fn new() -> Self {
        Self {
            host: HOST_ADDRESS.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            max_size: None,
        }
    }

    /// Like [`MetadataConfig::new`], honoring `GCE_METADATA_HOST` if set.
    pub fn from_env() -> Self {
        match std::env::var(METADATA_HOST_ENV_VAR) {
            Ok(host) if !host.trim().is_empty() => Self::new().with_host(&host),
            _ => Self::new(),
        }
    }

    /// Point the client at another host, e.g. a mock server.
    ///
    /// A bare `host[:port]` gets an `http://` scheme.
    pub fn with_host(mut self, host: &str) -> Self {
        let host = host.trim().trim_end_matches('/');
        self.host = if host.contains("://") {
            host.to_string()
        } else {
            format!("http://{host}")
        };
        self
    }

    /// Per-attempt request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retries after the first attempt for `instance`/`project` fetches.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Reject response bodies larger than `max_size` bytes.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Scheme and authority, without a trailing slash.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Host followed by [`BASE_PATH`].
    pub fn base_url(&self) -> String {
        format!("{}{}", self.host, BASE_PATH)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Body size limit, if any.
    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
