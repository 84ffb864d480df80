//! Tests for the HTTP client module

use super::*;
use crate::auth::Authenticator;
use crate::config::TapConfig;
use crate::error::Error;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> TapConfig {
    TapConfig {
        client_id: "id".to_string(),
        client_secret: "secret".to_string(),
        refresh_token: "refresh".to_string(),
        user_agent: "tap-harvest-tests".to_string(),
        start_date: "2021-01-01T00:00:00Z".to_string(),
        account_id: Some("1234567".to_string()),
        request_timeout: None,
    }
}

fn fast_retry(max_tries: u32) -> RetryPolicy {
    RetryPolicy::new(
        max_tries,
        Duration::from_millis(10),
        Duration::from_millis(50),
    )
}

async fn mock_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v2/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token",
            "expires_in": 3600,
            "token_type": "bearer"
        })))
        .mount(server)
        .await;
}

async fn client_with_config(server: &MockServer, config: TapConfig) -> HarvestClient {
    mock_token_endpoint(server).await;
    let auth = Authenticator::new(&config).with_base_url(&format!("{}/api/v2", server.uri()));
    HarvestClient::with_authenticator(&config, auth)
        .unwrap()
        .with_base_url(&server.uri())
        .unwrap()
        .with_retry_policy(fast_retry(5))
}

async fn client_for(server: &MockServer) -> HarvestClient {
    client_with_config(server, test_config()).await
}

#[tokio::test]
async fn test_get_parses_json_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clients": [{"id": 1, "name": "Acme"}],
            "next_page": null
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let body = client.get("clients", &[]).await.unwrap();

    assert_eq!(body["clients"][0]["id"], 1);
    assert_eq!(body["clients"][0]["name"], "Acme");
    assert!(body["next_page"].is_null());
}

#[tokio::test]
async fn test_get_sends_auth_headers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/company"))
        .and(header("Harvest-Account-Id", "1234567"))
        .and(header("Authorization", "Bearer fresh-token"))
        .and(header("User-Agent", "tap-harvest-tests"))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "expense_feature": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let body = client.get("company", &[]).await.unwrap();

    assert_eq!(body["expense_feature"], true);
}

#[tokio::test]
async fn test_get_forwards_query_params() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tasks"))
        .and(query_param("updated_since", "2021-01-01T00:00:00Z"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tasks": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let params = vec![
        (
            "updated_since".to_string(),
            "2021-01-01T00:00:00Z".to_string(),
        ),
        ("page".to_string(), "2".to_string()),
    ];
    client.get("tasks", &params).await.unwrap();
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/projects"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.get("projects", &[]).await.unwrap_err();

    assert!(matches!(err, Error::NotFound { .. }));
    assert_eq!(
        err.to_string(),
        "HTTP-error-code: 404, Error: The resource you have specified cannot be found."
    );
}

#[tokio::test]
async fn test_error_uses_server_message() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/invoices"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"message": "Feature disabled"})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.get("invoices", &[]).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "HTTP-error-code: 403, Error: Feature disabled"
    );
}

#[tokio::test]
async fn test_server_error_retries_until_budget() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(500))
        .expect(5)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.get("users", &[]).await.unwrap_err();

    assert!(matches!(err, Error::Server { status: 500, .. }));
    assert_eq!(
        err.to_string(),
        "HTTP-error-code: 500, Error: An error has occurred at Harvest's end."
    );
}

#[tokio::test]
async fn test_server_error_recovers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/contacts"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"contacts": []})))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let body = client.get("contacts", &[]).await.unwrap();

    assert!(body["contacts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_rate_limit_honors_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/expenses"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "0")
                .set_body_json(json!({"message": "Throttled"})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/expenses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"expenses": []})))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let body = client.get("expenses", &[]).await.unwrap();

    assert!(body["expenses"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_rate_limit_exhausts_budget() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/estimates"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server).await.with_retry_policy(fast_retry(3));
    let err = client.get("estimates", &[]).await.unwrap_err();

    assert!(matches!(err, Error::RateLimitExceeded { .. }));
    assert_eq!(
        err.to_string(),
        "HTTP-error-code: 429, Error: API rate limit exceeded."
    );
}

#[tokio::test]
async fn test_request_timeout_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/roles"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"roles": []}))
                .set_delay(Duration::from_millis(400)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let mut config = test_config();
    config.request_timeout = Some(json!(0.1));

    let client = client_with_config(&server, config)
        .await
        .with_retry_policy(fast_retry(2));
    let err = client.get("roles", &[]).await.unwrap_err();

    assert!(matches!(err, Error::Timeout { .. }));
}

#[test]
fn test_client_debug_hides_credentials() {
    let config = test_config();
    let client = HarvestClient::new(&config).unwrap();
    let debug_str = format!("{client:?}");

    assert!(debug_str.contains("HarvestClient"));
    assert!(debug_str.contains(BASE_API_URL));
    assert!(!debug_str.contains("secret"));
    assert!(!debug_str.contains("refresh"));
}
