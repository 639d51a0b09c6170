//! Integration tests using wiremock to simulate the metadata service.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gcp_metadata::{
    GcpMetadata, MetadataConfig, MetadataError, MetadataOptions, MetadataValue, BASE_PATH,
    HEADER_NAME, HEADER_VALUE,
};

const PROPERTY: &str = "property";
const BIG_NUMBER_STRING: &str = "3279739563200103600";

/// Test configuration struct for JSON deserialization tests.
#[derive(Debug, Deserialize, PartialEq)]
struct TestConfig {
    db_host: String,
    port: u16,
}

fn ok() -> ResponseTemplate {
    ResponseTemplate::new(200).insert_header(HEADER_NAME, HEADER_VALUE)
}

fn client(server: &MockServer) -> GcpMetadata {
    GcpMetadata::with_host(&server.uri()).unwrap()
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

// =============================================================================
// Accessors
// =============================================================================

mod accessors {
    use super::*;

    #[tokio::test]
    async fn test_instance_root() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/instance")))
            .and(header(HEADER_NAME, HEADER_VALUE))
            .respond_with(ok().set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let value = client(&server).instance(()).await.unwrap();
        assert_eq!(value, MetadataValue::Object(Default::default()));
    }

    #[tokio::test]
    async fn test_instance_property() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/instance/{PROPERTY}")))
            .and(header(HEADER_NAME, HEADER_VALUE))
            .respond_with(ok().set_body_string("my-instance"))
            .expect(1)
            .mount(&server)
            .await;

        let value = client(&server).instance(PROPERTY).await.unwrap();
        assert_eq!(value.as_str(), Some("my-instance"));
    }

    #[tokio::test]
    async fn test_project_property() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/project/project-id")))
            .respond_with(ok().set_body_string("my-project"))
            .expect(1)
            .mount(&server)
            .await;

        let value = client(&server).project("project-id").await.unwrap();
        assert_eq!(value.as_str(), Some("my-project"));
    }

    #[tokio::test]
    async fn test_custom_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/instance/{PROPERTY}")))
            .and(header("human", "phone"))
            .and(header("monkey", "banana"))
            .and(header(HEADER_NAME, HEADER_VALUE))
            .respond_with(ok().set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let options = MetadataOptions::from(PROPERTY)
            .header("human", "phone")
            .header("monkey", "banana");
        client(&server).instance(options).await.unwrap();
    }

    #[tokio::test]
    async fn test_flavor_header_cannot_be_replaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header(HEADER_NAME, HEADER_VALUE))
            .respond_with(ok().set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let options = MetadataOptions::new().header(HEADER_NAME, "Hazelnut");
        client(&server).instance(options).await.unwrap();
    }

    #[tokio::test]
    async fn test_property_and_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/project/{PROPERTY}")))
            .and(query_param("key", "value"))
            .respond_with(ok().set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let options = MetadataOptions::from(PROPERTY).param("key", "value");
        client(&server).project(options).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests[0].url.query(), Some("key=value"));
    }

    #[tokio::test]
    async fn test_json_options() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/instance/attributes/")))
            .and(query_param("recursive", "true"))
            .and(query_param("timeout_sec", "5"))
            .respond_with(ok().set_body_string(r#"{"a":"b"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let options = MetadataOptions::from_json(&json!({
            "property": "attributes/",
            "params": {"recursive": "true", "timeout_sec": 5}
        }))
        .unwrap();
        let value = client(&server).instance(options).await.unwrap();
        assert_eq!(value.get("a").and_then(MetadataValue::as_str), Some("b"));
    }

    #[tokio::test]
    async fn test_text_and_json_accessors() {
        let server = MockServer::start().await;
        let config = r#"{"db_host": "postgres.internal", "port": 5432}"#;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/instance/attributes/config")))
            .respond_with(ok().set_body_string(config))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/project/numeric-project-id")))
            .respond_with(ok().set_body_string(BIG_NUMBER_STRING))
            .mount(&server)
            .await;

        let metadata = client(&server);
        let text = metadata.instance_text("attributes/config").await.unwrap();
        assert_eq!(text, config);

        let parsed: TestConfig = metadata.instance_json("attributes/config").await.unwrap();
        assert_eq!(
            parsed,
            TestConfig {
                db_host: "postgres.internal".to_string(),
                port: 5432,
            }
        );

        let id: u64 = metadata.project_json("numeric-project-id").await.unwrap();
        assert_eq!(id.to_string(), BIG_NUMBER_STRING);
        let text = metadata.project_text("numeric-project-id").await.unwrap();
        assert_eq!(text, BIG_NUMBER_STRING);
    }
}

// =============================================================================
// Numbers
// =============================================================================

mod numbers {
    use super::*;

    async fn serve(server: &MockServer, body: &str) {
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/instance/{PROPERTY}")))
            .respond_with(ok().set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_large_number_is_big_number() {
        let server = MockServer::start().await;
        serve(&server, BIG_NUMBER_STRING).await;

        let value = client(&server).instance(PROPERTY).await.unwrap();
        let big = value.as_big_number().expect("expected a BigNumber");
        assert_eq!(big.to_string(), BIG_NUMBER_STRING);
    }

    #[tokio::test]
    async fn test_small_number_is_native() {
        let server = MockServer::start().await;
        serve(&server, "32797").await;

        let value = client(&server).instance(PROPERTY).await.unwrap();
        assert_eq!(value.as_f64(), Some(32797.0));
    }

    #[tokio::test]
    async fn test_nested_large_number() {
        let server = MockServer::start().await;
        serve(&server, &format!(r#"{{ "v1": true, "v2": {BIG_NUMBER_STRING} }}"#)).await;

        let value = client(&server).instance(PROPERTY).await.unwrap();
        assert_eq!(value.get("v1").and_then(MetadataValue::as_bool), Some(true));
        assert_eq!(
            value
                .get("v2")
                .and_then(MetadataValue::as_big_number)
                .map(|n| n.as_str()),
            Some(BIG_NUMBER_STRING)
        );
    }

    #[tokio::test]
    async fn test_exponent_overflow_keeps_original_text() {
        let server = MockServer::start().await;
        serve(&server, r#"{"x":1E400}"#).await;

        let value = client(&server).instance(PROPERTY).await.unwrap();
        assert_eq!(
            value
                .get("x")
                .and_then(MetadataValue::as_big_number)
                .map(|n| n.as_str()),
            Some("1E400")
        );
    }
}

// =============================================================================
// Failures and retries
// =============================================================================

mod failures {
    use super::*;

    #[tokio::test]
    async fn test_server_error_exhausts_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/instance")))
            .respond_with(ResponseTemplate::new(500).insert_header(HEADER_NAME, HEADER_VALUE))
            .expect(4)
            .mount(&server)
            .await;

        let err = client(&server).instance(()).await.unwrap_err();
        assert!(matches!(err, MetadataError::UnsuccessfulResponse { status: 500 }));
        assert!(err.to_string().contains("Unsuccessful response status code"));
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ok().set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).instance(()).await.unwrap();
        assert_eq!(request_count(&server).await, 3);
    }

    #[tokio::test]
    async fn test_success_makes_one_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ok().set_body_string("value"))
            .mount(&server)
            .await;

        client(&server).project("x").await.unwrap();
        assert_eq!(request_count(&server).await, 1);
    }

    #[tokio::test]
    async fn test_non_200_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(418).insert_header(HEADER_NAME, HEADER_VALUE))
            .mount(&server)
            .await;

        let err = client(&server).instance(()).await.unwrap_err();
        assert_eq!(err.status(), Some(418));
    }

    #[tokio::test]
    async fn test_configured_retry_budget() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let config = MetadataConfig::new()
            .with_host(&server.uri())
            .with_max_retries(1);
        let err = GcpMetadata::with_config(config)
            .unwrap()
            .instance(())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn test_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).instance(()).await.unwrap_err();
        assert!(matches!(err, MetadataError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_incorrect_flavor_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(HEADER_NAME, "Hazelnut")
                    .set_body_string("{}"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).instance(()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid response from metadata service: incorrect Metadata-Flavor header."
        );
    }

    #[tokio::test]
    async fn test_missing_flavor_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).instance(()).await.unwrap_err();
        assert!(matches!(err, MetadataError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ok().set_body_string("slow").set_delay(Duration::from_secs(2)))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ok().set_body_string("fast"))
            .mount(&server)
            .await;

        let config = MetadataConfig::new()
            .with_host(&server.uri())
            .with_timeout(Duration::from_millis(200));
        let value = GcpMetadata::with_config(config)
            .unwrap()
            .instance(())
            .await
            .unwrap();
        assert_eq!(value.as_str(), Some("fast"));
    }

    #[tokio::test]
    async fn test_body_too_large() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ok().set_body_string("x".repeat(64)))
            .expect(1)
            .mount(&server)
            .await;

        let config = MetadataConfig::new()
            .with_host(&server.uri())
            .with_max_size(16);
        let err = GcpMetadata::with_config(config)
            .unwrap()
            .instance(())
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::TooLarge(64, 16)));
    }
}

// =============================================================================
// Option validation
// =============================================================================

mod options {
    use super::*;

    async fn fetch_with(
        metadata: &GcpMetadata,
        options: serde_json::Value,
    ) -> Result<MetadataValue, MetadataError> {
        let options = MetadataOptions::from_json(&options)?;
        metadata.instance(options).await
    }

    #[tokio::test]
    async fn test_qs_is_rejected_before_request() {
        let server = MockServer::start().await;
        let metadata = client(&server);

        let err = fetch_with(&metadata, json!({"qs": {"one": "two"}}))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "'qs' is not a valid configuration option. Please use 'params' instead."
        );
        assert_eq!(request_count(&server).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_option_is_rejected_before_request() {
        let server = MockServer::start().await;
        let metadata = client(&server);

        let err = fetch_with(&metadata, json!({"fake": "news"}))
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::InvalidOptions(_)));
        assert!(err.to_string().starts_with("'fake' is not a valid"));
        assert_eq!(request_count(&server).await, 0);
    }

    #[tokio::test]
    async fn test_invalid_header_is_rejected_before_request() {
        let server = MockServer::start().await;
        let options = MetadataOptions::new().header("not a header", "x");

        let err = client(&server).instance(options).await.unwrap_err();
        assert!(matches!(err, MetadataError::InvalidOptions(_)));
        assert_eq!(request_count(&server).await, 0);
    }
}

// =============================================================================
// Availability
// =============================================================================

mod availability {
    use super::*;

    #[tokio::test]
    async fn test_available() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{BASE_PATH}/instance")))
            .respond_with(ok().set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client(&server).is_available().await.unwrap());
    }

    #[tokio::test]
    async fn test_available_after_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ok().set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client(&server).is_available().await.unwrap());
    }

    #[tokio::test]
    async fn test_imposter_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).is_available().await.unwrap_err();
        assert!(matches!(err, MetadataError::InvalidResponse(_)));
    }
}
