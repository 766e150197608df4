//! Wire-contract tests for [`ProviderClient`] against a local mock
//! server: request shapes (form fields, headers, query parameters) and
//! response handling (happy path, error statuses, malformed bodies).

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use trendpro_auth::provider::{ProviderApi, ProviderClient, ProviderError};
use trendpro_auth::OAuthConfig;

fn client_for(server: &MockServer) -> ProviderClient {
    let mut config = OAuthConfig::new(
        "test_key".to_string(),
        "test_secret".to_string(),
        "https://example.com/auth/callback".to_string(),
        vec!["user.info.basic".to_string()],
    );
    config.api_base = server.uri();
    ProviderClient::new(config)
}

#[tokio::test]
async fn exchange_posts_the_authorization_code_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token/"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("client_key=test_key"))
        .and(body_string_contains("client_secret=test_secret"))
        .and(body_string_contains("code=goodcode"))
        .and(body_string_contains(
            "redirect_uri=https%3A%2F%2Fexample.com%2Fauth%2Fcallback",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "A1",
            "refresh_token": "R1",
            "expires_in": 3600,
            "open_id": "u1",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let grant = client_for(&server).exchange_code("goodcode").await.unwrap();

    assert_eq!(grant.access_token, "A1");
    assert_eq!(grant.refresh_token.as_deref(), Some("R1"));
    assert_eq!(grant.expires_in, 3600);
}

#[tokio::test]
async fn exchange_surfaces_error_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token/"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_code"}"#),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).exchange_code("badcode").await.unwrap_err();

    match err {
        ProviderError::Status { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("invalid_code"));
        }
        other => panic!("expected Status error, got {other:?}"),
    }
}

#[tokio::test]
async fn a_success_status_without_a_token_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"error": "server_error"})),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).exchange_code("goodcode").await.unwrap_err();

    assert!(matches!(err, ProviderError::Malformed(_)));
}

#[tokio::test]
async fn a_non_json_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server).exchange_code("goodcode").await.unwrap_err();

    match err {
        ProviderError::Malformed(body) => assert!(body.contains("gateway")),
        other => panic!("expected Malformed error, got {other:?}"),
    }
}

#[tokio::test]
async fn refresh_posts_the_refresh_grant_without_redirect_uri() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token/"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=R1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "A2",
            "refresh_token": "R2",
            "expires_in": 7200
        })))
        .expect(1)
        .mount(&server)
        .await;

    let grant = client_for(&server).refresh("R1").await.unwrap();

    assert_eq!(grant.access_token, "A2");
    assert_eq!(grant.refresh_token.as_deref(), Some("R2"));

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body).into_owned();
    assert!(!body.contains("redirect_uri"));
    assert!(!body.contains("code="));
}

#[tokio::test]
async fn refresh_tolerates_an_unrotated_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "A2"})),
        )
        .mount(&server)
        .await;

    let grant = client_for(&server).refresh("R1").await.unwrap();

    assert_eq!(grant.refresh_token, None);
    // Missing expires_in falls back to the assumed one-day lifetime.
    assert_eq!(grant.expires_in, 86_400);
}

#[tokio::test]
async fn user_info_sends_bearer_token_and_field_selection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/info/"))
        .and(header("authorization", "Bearer A1"))
        .and(query_param("fields", "open_id,display_name,avatar_url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "user": {
                    "open_id": "u1",
                    "display_name": "Ana",
                    "avatar_url": "http://x/a.png"
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let profile = client_for(&server).fetch_user_info("A1").await.unwrap();

    assert_eq!(profile.open_id, "u1");
    assert_eq!(profile.display_name, "Ana");
    assert_eq!(profile.avatar_url, "http://x/a.png");
}

#[tokio::test]
async fn user_info_rejects_an_unexpected_envelope() {
    let server = MockServer::start().await;
    // Profile at the top level instead of under data.user.
    Mock::given(method("GET"))
        .and(path("/user/info/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "open_id": "u1",
            "display_name": "Ana",
            "avatar_url": "http://x/a.png"
        })))
        .mount(&server)
        .await;

    let err = client_for(&server).fetch_user_info("A1").await.unwrap_err();

    assert!(matches!(err, ProviderError::Malformed(_)));
}

#[tokio::test]
async fn user_info_surfaces_an_expired_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/info/"))
        .respond_with(
            ResponseTemplate::new(401).set_body_string(r#"{"error":"access_token_invalid"}"#),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).fetch_user_info("stale").await.unwrap_err();

    assert!(matches!(err, ProviderError::Status { status: 401, .. }));
}
