//! Client for the GCP compute metadata service.
//!
//! Fetches instance and project metadata from the link-local metadata
//! server, retrying transient failures, rejecting responses that do not
//! carry `Metadata-Flavor: Google`, and keeping numbers that do not fit an
//! `f64` as exact decimal text.
//!
//! # Features
//!
//! - `instance` / `project` accessors taking a property string or options
//! - Strict option validation before any request is sent
//! - Bounded immediate retries (3 by default) on non-2xx and network errors
//! - Fast `is_available` check that gives up on unresolvable hosts
//! - Lossless [`BigNumber`] values, also inside nested JSON
//! - `GCE_METADATA_HOST` override and pluggable [`Transport`] for tests
//!
//! # Example
//!
//! ```ignore
//! use gcp_metadata::{GcpMetadata, MetadataError, MetadataOptions, MetadataValue};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), MetadataError> {
//!     let metadata = GcpMetadata::new()?;
//!
//!     if metadata.is_available().await? {
//!         // Property shorthand
//!         let zone = metadata.instance("zone").await?;
//!
//!         // Query parameters and extra headers
//!         let attributes = metadata
//!             .instance(MetadataOptions::from("attributes/").param("recursive", "true"))
//!             .await?;
//!
//!         // Large ids come back exact
//!         if let MetadataValue::BigNumber(id) = metadata.project("numeric-project-id").await? {
//!             println!("{zone} {attributes} {id}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod metadata;
mod options;
mod retry;
mod transport;
mod validate;
mod value;

pub use config::{
    MetadataConfig, BASE_PATH, BASE_URL, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT, HEADER_NAME,
    HEADER_VALUE, HOST_ADDRESS, METADATA_HOST_ENV_VAR,
};
pub use error::{MetadataError, TransportError, TransportErrorKind};
pub use metadata::{GcpMetadata, MetadataType};
pub use options::{MetadataOptions, RECOGNIZED_OPTIONS};
pub use retry::{RetryPolicy, RetryResult, RetryState};
pub use transport::{read_body_limited, HttpTransport, MetadataRequest, RawResponse, Transport};
pub use validate::validate_headers;
pub use value::{parse_body, BigNumber, MetadataValue, MAX_SAFE_INTEGER};
