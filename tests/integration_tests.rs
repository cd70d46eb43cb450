//! Integration tests using mock HTTP server

use chrono::{Duration as ChronoDuration, Utc};
use connectorkit::auth::{AuthenticatedClient, Credentials, OAuth2Config, OAuth2Token};
use connectorkit::connector::{Connector, ConnectorParams, ReadParams, WriteParams};
use connectorkit::credentials::CredentialsFile;
use connectorkit::http::HttpClient;
use connectorkit::providers::{read_info, salesforce};
use connectorkit::testing::CrudScenario;
use connectorkit::xml::XmlData;
use connectorkit::{new_connector, CancellationToken, ErrorKind, ProviderConnector};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn oauth_client(server: &MockServer, token: OAuth2Token) -> AuthenticatedClient {
    AuthenticatedClient::oauth2(
        OAuth2Config::new("id", "secret", format!("{}/oauth/tokens", server.uri())),
        token,
    )
}

fn zendesk(server: &MockServer, client: AuthenticatedClient) -> ProviderConnector {
    new_connector(
        "zendesk",
        ConnectorParams::new(client)
            .workspace("acme")
            .base_url_override(server.uri()),
    )
    .unwrap()
}

fn tickets_page(ids: &[u64]) -> serde_json::Value {
    let tickets: Vec<_> = ids.iter().map(|id| json!({"id": id, "subject": format!("T{id}")})).collect();
    json!({"tickets": tickets, "meta": {"has_more": false}, "links": {"next": null}})
}

// ============================================================================
// Credentials file to paged read
// ============================================================================

#[tokio::test]
async fn test_offset_read_from_credentials_file() {
    let server = MockServer::start().await;
    for (offset, ids) in [("0", vec![1, 2]), ("2", vec![3, 4]), ("4", vec![5])] {
        let contacts: Vec<_> = ids
            .iter()
            .map(|id| json!({"id": id, "email": format!("c{id}@x.io"), "listIds": [3]}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/v3/contacts"))
            .and(query_param("offset", offset))
            .and(query_param("limit", "2"))
            .and(header("api-key", "xkeysib-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"contacts": contacts, "count": 5})))
            .expect(1)
            .mount(&server)
            .await;
    }

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"apiKey": "xkeysib-1"}}"#).unwrap();
    let creds = CredentialsFile::from_file(file.path()).unwrap();
    let params = creds
        .connector_params(read_info("brevo").unwrap())
        .unwrap()
        .base_url_override(format!("{}/v3", server.uri()));
    let conn = new_connector("brevo", params).unwrap();

    let ctx = CancellationToken::new();
    let mut params = ReadParams::new("contacts").fields(["id", "email"]).page_size(2);
    let mut emails = Vec::new();
    let mut pages = 0;
    loop {
        let page = conn.read(&ctx, &params).await.unwrap();
        pages += 1;
        for record in &page.data {
            assert!(!record.fields.contains_key("listIds"));
            emails.push(record.fields["email"].as_str().unwrap().to_string());
        }
        if page.done {
            break;
        }
        params = params.next_page(page.next_page);
    }

    assert_eq!(pages, 3);
    assert_eq!(emails, vec!["c1@x.io", "c2@x.io", "c3@x.io", "c4@x.io", "c5@x.io"]);
}

// ============================================================================
// CRUD scenario
// ============================================================================

#[tokio::test]
async fn test_brevo_contact_lifecycle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/contacts"))
        .and(body_json(json!({"email": "new@x.io"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 42})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contacts": [{"id": 41, "email": "old@x.io"}, {"id": 42, "email": "new@x.io"}],
            "count": 2
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v3/contacts/42"))
        .and(body_json(json!({"attributes": {"FIRSTNAME": "Ada"}})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v3/contacts/42"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let creds = CredentialsFile::from_json(r#"{"apiKey": "xkeysib-1"}"#).unwrap();
    let params = creds
        .connector_params(read_info("brevo").unwrap())
        .unwrap()
        .base_url_override(format!("{}/v3", server.uri()));
    let conn = new_connector("brevo", params).unwrap();

    let report = CrudScenario::new(
        "contacts",
        json!({"email": "new@x.io"}),
        json!({"attributes": {"FIRSTNAME": "Ada"}}),
    )
    .fields(["id", "email"])
    .run(&conn, &CancellationToken::new())
    .await
    .unwrap();

    assert_eq!(report.record_id, "42");
    assert!(report.found_in_read);
    assert_eq!(report.pages_read, 1);
    assert_eq!(report.updated.record_id, "42");
    assert_eq!(report.search_rows, None);
    assert!(report.deleted);
}

// ============================================================================
// Token refresh
// ============================================================================

#[tokio::test]
async fn test_unauthorized_read_refreshes_and_retries_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/tickets"))
        .and(header("Authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_token"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/tokens"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=r1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh",
            "token_type": "bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/tickets"))
        .and(header("Authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tickets_page(&[7])))
        .expect(1)
        .mount(&server)
        .await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let listener_seen = Arc::clone(&seen);
    let client = oauth_client(&server, OAuth2Token::new("stale", Some("r1".to_string()), None))
        .with_token_listener(Arc::new(move |token: &OAuth2Token| {
            listener_seen.lock().unwrap().push(token.access_token.clone());
        }));
    let conn = zendesk(&server, client);

    let page = conn
        .read(&CancellationToken::new(), &ReadParams::new("tickets").fields(["id"]))
        .await
        .unwrap();
    assert_eq!(page.rows, 1);
    assert_eq!(page.data[0].fields["id"], json!(7));
    assert!(page.done);

    assert_eq!(*seen.lock().unwrap(), vec!["fresh".to_string()]);
    let token = conn.client().token().await.unwrap();
    assert_eq!(token.access_token, "fresh");
    assert_eq!(token.refresh_token.as_deref(), Some("r1"));
}

#[tokio::test]
async fn test_concurrent_reads_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/tokens"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(100))
                .set_body_json(json!({"access_token": "fresh", "expires_in": 3600})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/tickets"))
        .and(header("Authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tickets_page(&[1])))
        .expect(5)
        .mount(&server)
        .await;

    let expired = OAuth2Token::new(
        "old",
        Some("r1".to_string()),
        Some(Utc::now() - ChronoDuration::minutes(5)),
    );
    let conn = Arc::new(zendesk(&server, oauth_client(&server, expired)));
    let ctx = CancellationToken::new();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let conn = Arc::clone(&conn);
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move {
            conn.read(&ctx, &ReadParams::new("tickets")).await
        }));
    }
    for handle in handles {
        let page = handle.await.unwrap().unwrap();
        assert_eq!(page.rows, 1);
    }
}

#[tokio::test]
async fn test_client_credentials_token_fetched_lazily() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/identity/oauth/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "mk-1",
            "token_type": "bearer",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/lists.json"))
        .and(header("Authorization", "Bearer mk-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "requestId": "r#1",
            "success": true,
            "result": [{"id": 1, "name": "Newsletter"}, {"id": 2, "name": "Webinar"}]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = AuthenticatedClient::new(
        HttpClient::new(),
        Credentials::OAuth2ClientCredentials {
            config: OAuth2Config::new("id", "secret", format!("{}/identity/oauth/token", server.uri())),
        },
    );
    let conn = new_connector(
        "marketo",
        ConnectorParams::new(client)
            .workspace("123-abc")
            .base_url_override(server.uri()),
    )
    .unwrap();

    let ctx = CancellationToken::new();
    for _ in 0..2 {
        let page = conn.read(&ctx, &ReadParams::new("lists").fields(["name"])).await.unwrap();
        assert_eq!(page.rows, 2);
        assert_eq!(page.data[1].fields["name"], json!("Webinar"));
        assert!(page.done);
    }
}

// ============================================================================
// Provider hooks end to end
// ============================================================================

#[tokio::test]
async fn test_jira_issue_create_and_update() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ex/jira/c-1/rest/api/3/issue"))
        .and(body_json(json!({"fields": {"summary": "Broken", "project": {"key": "OPS"}}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "10001", "key": "OPS-1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/ex/jira/c-1/rest/api/3/issue/10001"))
        .and(body_json(json!({"fields": {"summary": "Fixed"}})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = oauth_client(&server, OAuth2Token::new("tok", None, None));
    let conn = new_connector(
        "atlassian",
        ConnectorParams::new(client)
            .metadata("cloudId", "c-1")
            .base_url_override(server.uri()),
    )
    .unwrap();
    let ctx = CancellationToken::new();

    let created = conn
        .write(
            &ctx,
            &WriteParams::create("issues", json!({"summary": "Broken", "project": {"key": "OPS"}})),
        )
        .await
        .unwrap();
    assert!(created.success);
    assert_eq!(created.record_id, "10001");
    assert_eq!(created.data["key"], json!("OPS-1"));

    let updated = conn
        .write(&ctx, &WriteParams::update("issues", "10001", json!({"summary": "Fixed"})))
        .await
        .unwrap();
    assert_eq!(updated.record_id, "10001");
    assert!(updated.data.is_empty());
}

#[tokio::test]
async fn test_salesforce_metadata_upsert() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/services/Soap/m/59.0"))
        .and(header("SOAPAction", "upsertMetadata"))
        .and(body_string_contains("<sessionId>sf-tok</sessionId>"))
        .and(body_string_contains(
            r#"<metadata xsi:type="CustomField"><fullName>Account.Tier__c</fullName><label>Tier</label></metadata>"#,
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string(concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">"#,
            "<soapenv:Body><upsertMetadataResponse>",
            "<result><created>true</created><fullName>Account.Tier__c</fullName><success>true</success></result>",
            "</upsertMetadataResponse></soapenv:Body></soapenv:Envelope>"
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = oauth_client(&server, OAuth2Token::new("sf-tok", None, None));
    let conn = new_connector(
        "salesforce",
        ConnectorParams::new(client)
            .workspace("acme")
            .base_url_override(server.uri()),
    )
    .unwrap();

    let field = XmlData::new("metadata")
        .with_attr("xsi:type", "CustomField")
        .with_child(XmlData::text_element("fullName", "Account.Tier__c"))
        .with_child(XmlData::text_element("label", "Tier"));
    let results = salesforce::upsert_metadata(&conn, &CancellationToken::new(), &[field])
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].full_name, "Account.Tier__c");
    assert!(results[0].success);
    assert!(results[0].created);
}

#[tokio::test]
async fn test_salesforce_metadata_upsert_rejects_invalid_items() {
    let server = MockServer::start().await;
    let client = oauth_client(&server, OAuth2Token::new("sf-tok", None, None));
    let conn = new_connector(
        "salesforce",
        ConnectorParams::new(client)
            .workspace("acme")
            .base_url_override(server.uri()),
    )
    .unwrap();
    let ctx = CancellationToken::new();

    let err = salesforce::upsert_metadata(&conn, &ctx, &[]).await.unwrap_err();
    assert!(err.is(ErrorKind::MissingObjects));

    let bad = XmlData::new("1metadata");
    let err = salesforce::upsert_metadata(&conn, &ctx, &[bad]).await.unwrap_err();
    assert!(err.is(ErrorKind::InvalidConfiguration));
    assert!(server.received_requests().await.unwrap().is_empty());
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancel_during_slow_read() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/tickets"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(10))
                .set_body_json(tickets_page(&[1])),
        )
        .mount(&server)
        .await;

    let conn = zendesk(&server, oauth_client(&server, OAuth2Token::new("tok", None, None)));
    let ctx = CancellationToken::new();
    let cancel = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let started = Instant::now();
    let err = conn.read(&ctx, &ReadParams::new("tickets")).await.unwrap_err();
    assert!(err.is(ErrorKind::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}
