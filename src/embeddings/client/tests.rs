use super::*;
use crate::config::EmbeddingConfig;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> EmbeddingConfig {
    EmbeddingConfig {
        protocol: "http".to_string(),
        host: "test-host".to_string(),
        port: 1234,
        model: "test-model".to_string(),
        batch_size: 128,
    }
}

fn client_for(server_uri: &str, batch_size: u32) -> EmbeddingClient {
    let url = Url::parse(server_uri).expect("mock server uri parses");
    let config = EmbeddingConfig {
        protocol: url.scheme().to_string(),
        host: url.host_str().expect("mock server has host").to_string(),
        port: url.port().expect("mock server has port"),
        model: "all-minilm:latest".to_string(),
        batch_size,
    };

    EmbeddingClient::new(&config)
        .expect("client builds")
        .with_retry_attempts(1)
}

#[test]
fn client_configuration() {
    let client = EmbeddingClient::new(&test_config()).expect("client builds");

    assert_eq!(client.model, "test-model");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
}

#[test]
fn client_builder_methods() {
    let client = EmbeddingClient::new(&test_config())
        .expect("client builds")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5);

    assert_eq!(client.retry_attempts, 5);
}

#[test]
fn model_id_matches_config() {
    let client = EmbeddingClient::new(&test_config()).expect("client builds");
    assert_eq!(client.model_id(), "test-model");
}

#[test]
fn empty_batch_is_a_noop() {
    let client = EmbeddingClient::new(&test_config()).expect("client builds");
    let vectors = client.embed_batch(&[]).expect("empty batch succeeds");
    assert!(vectors.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_batch_preserves_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 128);
    let texts = vec!["first".to_string(), "second".to_string()];
    let vectors = client.embed_batch(&texts).expect("embedding succeeds");

    assert_eq!(vectors.len(), 2);
    assert_eq!(vectors[0], vec![1.0, 0.0, 0.0]);
    assert_eq!(vectors[1], vec![0.0, 1.0, 0.0]);
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_batches_are_chunked_internally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[0.5, 0.5]] })),
        )
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 1);
    let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let vectors = client.embed_batch(&texts).expect("embedding succeeds");

    assert_eq!(vectors.len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn response_count_mismatch_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[1.0, 0.0]] })),
        )
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 128);
    let texts = vec!["first".to_string(), "second".to_string()];
    let result = client.embed_batch(&texts);

    assert!(matches!(result, Err(QagenError::Embedding(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_fail_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 128);
    let result = client.embed_batch(&["text".to_string()]);

    assert!(matches!(result, Err(QagenError::Embedding(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn health_check_validates_model_availability() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{ "name": "all-minilm:latest" }, { "name": "other-model" }]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 128);
    assert!(client.health_check().is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_model_fails_validation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{ "name": "other-model" }]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 128);
    let result = client.validate_model();

    assert!(matches!(result, Err(QagenError::Embedding(_))));
}
