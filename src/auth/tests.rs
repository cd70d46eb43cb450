//! Tests for the auth module

use super::*;
use crate::cancel::CancellationToken;
use crate::error::{Error, ErrorKind};
use crate::http::{HttpClient, HttpRequest, HttpResponse, ResponseInterpreter};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Mutex as StdMutex;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn get(server: &MockServer, p: &str) -> HttpRequest {
    HttpRequest::get(Url::parse(&format!("{}{p}", server.uri())).unwrap())
}

fn oauth_config(server: &MockServer) -> OAuth2Config {
    OAuth2Config::new("client", "secret", format!("{}/oauth/token", server.uri()))
}

#[test]
fn test_debug_redacts_secrets() {
    let token = OAuth2Token::expires_in("at-secret-value", Some("rt-secret-value".to_string()), 3600);
    let shown = format!("{token:?}");
    assert!(!shown.contains("at-secret-value"));
    assert!(!shown.contains("rt-secret-value"));
    assert!(shown.contains("<redacted>"));
    assert!(shown.contains("expiry"));

    let config = OAuth2Config::new("client", "cs-secret-value", "https://example.com/token");
    let shown = format!("{config:?}");
    assert!(!shown.contains("cs-secret-value"));
    assert!(shown.contains("client"));
}

async fn mount_api(server: &MockServer, bearer: &str, status: u16, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(header("Authorization", format!("Bearer {bearer}").as_str()))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({"ok": status == 200})))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_api_key_header_with_prefix() {
    let server = MockServer::start().await;
    Mock::given(header("Authorization", "Bearer my-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = AuthenticatedClient::api_key(
        "my-token",
        ApiKeyPlacement::Header {
            name: "Authorization".to_string(),
            prefix: Some("Bearer ".to_string()),
        },
    );
    client.send(&CancellationToken::new(), &get(&server, "/api")).await.unwrap();
}

#[tokio::test]
async fn test_api_key_raw_header_and_query() {
    let server = MockServer::start().await;
    Mock::given(path("/header"))
        .and(header("api-key", "xkey"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/query"))
        .and(query_param("api_key", "qkey"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = CancellationToken::new();
    let header_client = AuthenticatedClient::api_key(
        "xkey",
        ApiKeyPlacement::Header {
            name: "api-key".to_string(),
            prefix: None,
        },
    );
    header_client.send(&ctx, &get(&server, "/header")).await.unwrap();

    let query_client = AuthenticatedClient::api_key(
        "qkey",
        ApiKeyPlacement::Query {
            param: "api_key".to_string(),
        },
    );
    query_client.send(&ctx, &get(&server, "/query?page=1")).await.unwrap();
}

#[tokio::test]
async fn test_basic_auth() {
    let server = MockServer::start().await;
    // base64("user:pass")
    Mock::given(header("Authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = AuthenticatedClient::new(
        HttpClient::new(),
        Credentials::Basic {
            username: "user".to_string(),
            password: "pass".to_string(),
        },
    );
    client.send(&CancellationToken::new(), &get(&server, "/api")).await.unwrap();
}

struct SignatureSigner;

impl RequestSigner for SignatureSigner {
    fn sign(&self, request: &mut HttpRequest) -> crate::error::Result<()> {
        let signature = format!("{}:{}", request.method, request.url.path());
        request.set_header("X-Signature", signature);
        Ok(())
    }
}

#[tokio::test]
async fn test_custom_headers_and_signer() {
    let server = MockServer::start().await;
    Mock::given(path("/headers"))
        .and(header("X-Tenant", "acme"))
        .and(header("X-Token", "t"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/signed"))
        .and(header("X-Signature", "GET:/signed"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = CancellationToken::new();
    let headers = AuthenticatedClient::new(
        HttpClient::new(),
        Credentials::CustomHeaders(vec![
            ("X-Tenant".to_string(), "acme".to_string()),
            ("X-Token".to_string(), "t".to_string()),
        ]),
    );
    headers.send(&ctx, &get(&server, "/headers")).await.unwrap();

    let signed = AuthenticatedClient::new(HttpClient::new(), Credentials::Custom(Arc::new(SignatureSigner)));
    signed.send(&ctx, &get(&server, "/signed")).await.unwrap();
}

#[tokio::test]
async fn test_client_credentials_fetched_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=client"))
        .and(body_string_contains("scope=read+write"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "cc-token",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_api(&server, "cc-token", 200, 3).await;

    let config = oauth_config(&server).with_scopes(vec!["read".to_string(), "write".to_string()]);
    let client = AuthenticatedClient::new(HttpClient::new(), Credentials::OAuth2ClientCredentials { config });
    let ctx = CancellationToken::new();

    for _ in 0..3 {
        client.send(&ctx, &get(&server, "/api")).await.unwrap();
    }
    assert_eq!(client.token().await.unwrap().token_type.as_deref(), Some("Bearer"));
}

#[tokio::test]
async fn test_expired_token_refreshed_before_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=r1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_api(&server, "fresh", 200, 1).await;
    mount_api(&server, "stale", 200, 0).await;

    let persisted = Arc::new(StdMutex::new(Vec::new()));
    let sink = Arc::clone(&persisted);
    let client = AuthenticatedClient::oauth2(
        oauth_config(&server),
        OAuth2Token::expires_in("stale", Some("r1".to_string()), -60),
    )
    .with_token_listener(Arc::new(move |token: &OAuth2Token| {
        sink.lock().unwrap().push(token.clone());
    }));

    let response = client.send(&CancellationToken::new(), &get(&server, "/api")).await.unwrap();
    assert_eq!(response.json().unwrap()["ok"], true);

    let persisted = persisted.lock().unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].access_token, "fresh");
    // Refresh token is kept when the grant does not rotate it
    assert_eq!(persisted[0].refresh_token.as_deref(), Some("r1"));
}

#[tokio::test]
async fn test_unauthorized_triggers_single_refresh_and_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "refresh_token": "r2",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_api(&server, "revoked", 401, 1).await;
    mount_api(&server, "fresh", 200, 1).await;

    let client = AuthenticatedClient::oauth2(
        oauth_config(&server),
        OAuth2Token::expires_in("revoked", Some("r1".to_string()), 3600),
    );

    client.send(&CancellationToken::new(), &get(&server, "/api")).await.unwrap();
    let token = client.token().await.unwrap();
    assert_eq!(token.access_token, "fresh");
    assert_eq!(token.refresh_token.as_deref(), Some("r2"));
}

#[tokio::test]
async fn test_second_unauthorized_surfaces() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "fresh"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_api(&server, "revoked", 401, 1).await;
    mount_api(&server, "fresh", 401, 1).await;

    let client = AuthenticatedClient::oauth2(
        oauth_config(&server),
        OAuth2Token::new("revoked", Some("r1".to_string()), None),
    );

    let err = client.send(&CancellationToken::new(), &get(&server, "/api")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_refresh_failure_is_unauthorized_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/api"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = AuthenticatedClient::oauth2(
        oauth_config(&server),
        OAuth2Token::expires_in("stale", Some("r1".to_string()), -60),
    );

    let err = client.send(&CancellationToken::new(), &get(&server, "/api")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert!(err.to_string().contains("invalid_grant"));
}

#[tokio::test]
async fn test_expired_without_refresh_token() {
    let client = AuthenticatedClient::oauth2(
        OAuth2Config::new("c", "s", "http://127.0.0.1:9/token"),
        OAuth2Token::expires_in("stale", None, -60),
    );
    let request = HttpRequest::get(Url::parse("http://127.0.0.1:9/api").unwrap());
    let err = client.send(&CancellationToken::new(), &request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "fresh", "expires_in": 3600}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_api(&server, "fresh", 200, 8).await;

    let client = AuthenticatedClient::oauth2(
        oauth_config(&server),
        OAuth2Token::expires_in("stale", Some("r1".to_string()), -60),
    );

    let ctx = CancellationToken::new();
    let request = get(&server, "/api");
    let calls = (0..8).map(|_| client.send(&ctx, &request));
    let results = futures::future::join_all(calls).await;

    assert!(results.iter().all(Result::is_ok));
}

#[tokio::test]
async fn test_cancellation_abandons_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "fresh"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = AuthenticatedClient::oauth2(
        oauth_config(&server),
        OAuth2Token::expires_in("stale", Some("r1".to_string()), -60),
    );

    let ctx = CancellationToken::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let err = client.send(&ctx, &get(&server, "/api")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(client.token().await.unwrap().access_token, "stale");
}

struct EnvelopeInterpreter;

impl ResponseInterpreter for EnvelopeInterpreter {
    fn interpret(&self, response: &HttpResponse) -> Option<Error> {
        let body = response.json().ok()?;
        (body["success"] == false).then(|| Error::unauthorized("access token expired"))
    }
}

#[tokio::test]
async fn test_interpreter_unauthorized_triggers_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "fresh"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/api"))
        .and(header("Authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/api"))
        .and(header("Authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = AuthenticatedClient::new(
        HttpClient::new(),
        Credentials::OAuth2ClientCredentials {
            config: oauth_config(&server),
        },
    );
    client.replace_token(OAuth2Token::new("stale", None, None)).await;
    let client = client.with_interpreter(Arc::new(EnvelopeInterpreter));

    let response = client.send(&CancellationToken::new(), &get(&server, "/api")).await.unwrap();
    assert_eq!(response.json().unwrap()["success"], true);
}
