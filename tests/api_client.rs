//! HTTP client behavior against a mock backend: one-shot credential
//! refresh, 404-as-no-data, and malformed-body tolerance.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dealwatch::api::{CredentialProvider, ExchangeApi, ExchangeApiClient};
use dealwatch::{DealwatchError, Result};

/// Hands out a stale token until refreshed, counting refreshes.
struct TestCredentials {
    refreshes: AtomicUsize,
}

impl TestCredentials {
    fn new() -> Self {
        Self {
            refreshes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CredentialProvider for TestCredentials {
    async fn token(&self) -> Result<String> {
        Ok("stale".to_string())
    }

    async fn refresh(&self) -> Result<String> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok("fresh".to_string())
    }
}

async fn make_client(server: &MockServer) -> (ExchangeApiClient, Arc<TestCredentials>) {
    let credentials = Arc::new(TestCredentials::new());
    let client = ExchangeApiClient::new(&server.uri(), credentials.clone());
    (client, credentials)
}

#[tokio::test]
async fn test_rejected_credential_is_refreshed_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/deals"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/deals"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "id": 1, "status": "open" }
        ])))
        .mount(&server)
        .await;

    let (client, credentials) = make_client(&server).await;
    let deals = client.get_deals().await.unwrap();
    assert_eq!(deals.len(), 1);
    assert_eq!(deals[0].id, 1);
    assert_eq!(credentials.refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_second_rejection_surfaces_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/deals"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (client, credentials) = make_client(&server).await;
    let result = client.get_deals().await;
    assert!(matches!(result, Err(DealwatchError::Auth(_))));
    // Exactly one refresh attempt; no retry loop.
    assert_eq!(credentials.refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_deal_is_no_data() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/deals/99"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let (client, _credentials) = make_client(&server).await;
    let deal = client.get_deal(99).await.unwrap();
    assert!(deal.is_none());
}

#[tokio::test]
async fn test_malformed_body_is_an_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/balance"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let (client, _credentials) = make_client(&server).await;
    let result = client.get_balance().await;
    assert!(matches!(result, Err(DealwatchError::Api(_))));
}

#[tokio::test]
async fn test_partial_deal_shapes_use_defaults() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/deals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "id": 5 },
            { "id": 6, "status": "paid", "chatLastAt": "2026-01-10T12:00:00Z" }
        ])))
        .mount(&server)
        .await;

    let (client, _credentials) = make_client(&server).await;
    let deals = client.get_deals().await.unwrap();
    assert_eq!(deals.len(), 2);
    assert!(!deals[0].reviewed);
    assert!(deals[1].chat_last_at.is_some());
}

#[tokio::test]
async fn test_review_submission_posts_with_auth() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/deals/9/review"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (client, credentials) = make_client(&server).await;
    client
        .submit_review(9, dealwatch::services::Rating::Up, Some("great"))
        .await
        .unwrap();
    assert_eq!(credentials.refreshes.load(Ordering::SeqCst), 0);
}
