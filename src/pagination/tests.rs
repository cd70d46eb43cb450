//! Tests for pagination module

use super::*;
use crate::types::{JsonValue, TimeFormat};
use crate::urlbuilder::UrlBuilder;
use chrono::{TimeZone, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::json;
use url::Url;

fn url(raw: &str) -> Url {
    Url::parse(raw).unwrap()
}

fn page<'a>(request_url: &'a Url, body: &'a JsonValue, headers: &'a HeaderMap, records: usize) -> PageContext<'a> {
    PageContext {
        request_url,
        body,
        headers,
        records,
    }
}

fn next(config: &PaginationConfig, request_url: &str, body: JsonValue, records: usize) -> String {
    let request_url = url(request_url);
    let headers = HeaderMap::new();
    let paginator = config.paginator();
    next_page_token(paginator.as_ref(), &page(&request_url, &body, &headers, records)).unwrap()
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_config_deserialize_defaults() {
    let config: PaginationConfig = serde_json::from_value(json!({
        "type": "page_number",
        "current_path": "pagination.current_page",
        "total_path": "pagination.total_pages"
    }))
    .unwrap();

    match config {
        PaginationConfig::PageNumber {
            page_param,
            start_page,
            ..
        } => {
            assert_eq!(page_param, "page");
            assert_eq!(start_page, 1);
        }
        other => panic!("Expected PageNumber, got {other:?}"),
    }

    let config: PaginationConfig = serde_json::from_value(json!({
        "type": "page_token",
        "token_param": "nextPageToken",
        "token_path": "nextPageToken"
    }))
    .unwrap();
    assert!(matches!(
        config,
        PaginationConfig::PageToken {
            stop_on_empty: true,
            ..
        }
    ));

    assert_eq!(PaginationConfig::default(), PaginationConfig::None);
}

#[test]
fn test_first_page_params() {
    let config = PaginationConfig::PageNumber {
        page_param: "page".to_string(),
        size_param: Some("per_page".to_string()),
        start_page: 1,
        current_path: None,
        total_path: None,
    };
    let mut builder = UrlBuilder::new("https://x.io/api/v1/ideas").unwrap();
    config.paginator().first_page(&mut builder, Some(200));
    assert_eq!(builder.to_string(), "https://x.io/api/v1/ideas?page=1&per_page=200");

    let config = PaginationConfig::Offset {
        offset_param: "startAt".to_string(),
        limit_param: "maxResults".to_string(),
        total_path: None,
    };
    let mut builder = UrlBuilder::new("https://x.io/search").unwrap();
    config.paginator().first_page(&mut builder, None);
    assert_eq!(builder.to_string(), "https://x.io/search?startAt=0");
}

// ============================================================================
// Page Number
// ============================================================================

fn page_number() -> PaginationConfig {
    PaginationConfig::PageNumber {
        page_param: "page".to_string(),
        size_param: Some("per_page".to_string()),
        start_page: 1,
        current_path: Some("pagination.current_page".to_string()),
        total_path: Some("pagination.total_pages".to_string()),
    }
}

#[test]
fn test_page_number_terminates_after_total_pages() {
    let config = page_number();
    let mut request = "https://x.io/ideas?page=1&per_page=200".to_string();
    let mut calls = 0;

    loop {
        calls += 1;
        let current = url(&request)
            .query_pairs()
            .find(|(k, _)| k == "page")
            .map(|(_, v)| v.parse::<i64>().unwrap())
            .unwrap();
        let body = json!({"pagination": {"current_page": current, "total_pages": 3}, "ideas": [{}]});
        let token = next(&config, &request, body, 1);
        if token.is_empty() {
            break;
        }
        request = token;
        assert!(calls < 10, "pagination did not terminate");
    }

    assert_eq!(calls, 3);
}

#[test]
fn test_page_number_next_url_increments_page() {
    let token = next(
        &page_number(),
        "https://x.io/ideas?page=1&per_page=200",
        json!({"pagination": {"current_page": 1, "total_pages": 3}}),
        200,
    );
    assert_eq!(token, "https://x.io/ideas?page=2&per_page=200");
}

#[test]
fn test_page_number_without_totals_stops_on_short_page() {
    let config = PaginationConfig::PageNumber {
        page_param: "page".to_string(),
        size_param: Some("per_page".to_string()),
        start_page: 1,
        current_path: None,
        total_path: None,
    };
    assert_eq!(
        next(&config, "https://x.io/items?page=2&per_page=10", json!([]), 10),
        "https://x.io/items?page=3&per_page=10"
    );
    assert_eq!(next(&config, "https://x.io/items?page=2&per_page=10", json!([]), 4), "");
    assert_eq!(next(&config, "https://x.io/items?page=2", json!([]), 0), "");
}

// ============================================================================
// Offset
// ============================================================================

#[test]
fn test_offset_with_total() {
    let config = PaginationConfig::Offset {
        offset_param: "startAt".to_string(),
        limit_param: "maxResults".to_string(),
        total_path: Some("total".to_string()),
    };
    assert_eq!(
        next(&config, "https://x.io/search?startAt=0&maxResults=50", json!({"total": 120}), 50),
        "https://x.io/search?startAt=50&maxResults=50"
    );
    assert_eq!(
        next(&config, "https://x.io/search?startAt=100&maxResults=50", json!({"total": 120}), 20),
        ""
    );
}

#[test]
fn test_offset_without_total_uses_record_count() {
    let config = PaginationConfig::Offset {
        offset_param: "offset".to_string(),
        limit_param: "limit".to_string(),
        total_path: None,
    };
    assert_eq!(
        next(&config, "https://x.io/contacts?offset=0", json!({}), 25),
        "https://x.io/contacts?offset=25"
    );
    assert_eq!(next(&config, "https://x.io/contacts?offset=25&limit=50", json!({}), 10), "");
    assert_eq!(next(&config, "https://x.io/contacts?offset=25", json!({}), 0), "");
}

// ============================================================================
// Cursor
// ============================================================================

#[test]
fn test_cursor_absolute_link_with_has_more() {
    let config = PaginationConfig::Cursor {
        next_path: "links.next".to_string(),
        cursor_param: None,
        link_param: None,
        has_more_path: Some("meta.has_more".to_string()),
        done_path: None,
        size_param: Some("page[size]".to_string()),
    };
    let body = json!({
        "links": {"next": "https://acme.zendesk.com/api/v2/tickets.json?page%5Bafter%5D=xyz"},
        "meta": {"has_more": true}
    });
    assert_eq!(
        next(&config, "https://acme.zendesk.com/api/v2/tickets.json", body, 100),
        "https://acme.zendesk.com/api/v2/tickets.json?page%5Bafter%5D=xyz"
    );

    let body = json!({"links": {"next": "https://acme.zendesk.com/x"}, "meta": {"has_more": false}});
    assert_eq!(next(&config, "https://acme.zendesk.com/api/v2/tickets.json", body, 100), "");
}

#[test]
fn test_cursor_relative_link_and_done_flag() {
    let config = PaginationConfig::Cursor {
        next_path: "nextRecordsUrl".to_string(),
        cursor_param: None,
        link_param: None,
        has_more_path: None,
        done_path: Some("done".to_string()),
        size_param: None,
    };
    let body = json!({"done": false, "nextRecordsUrl": "/services/data/v59.0/query/01g-2000"});
    assert_eq!(
        next(&config, "https://acme.my.salesforce.com/services/data/v59.0/query?q=SELECT", body, 2000),
        "https://acme.my.salesforce.com/services/data/v59.0/query/01g-2000"
    );

    let body = json!({"done": true, "nextRecordsUrl": "/services/data/v59.0/query/01g-4000"});
    assert_eq!(
        next(&config, "https://acme.my.salesforce.com/services/data/v59.0/query", body, 10),
        ""
    );
}

#[test]
fn test_cursor_extracted_from_link_param() {
    let config = PaginationConfig::Cursor {
        next_path: "_links.next".to_string(),
        cursor_param: Some("cursor".to_string()),
        link_param: Some("cursor".to_string()),
        has_more_path: None,
        done_path: None,
        size_param: Some("limit".to_string()),
    };
    let body = json!({"_links": {"next": "/wiki/api/v2/pages?limit=25&cursor=abc%3D%3D"}});
    assert_eq!(
        next(
            &config,
            "https://api.atlassian.com/ex/confluence/c1/wiki/api/v2/pages?limit=25",
            body,
            25
        ),
        "https://api.atlassian.com/ex/confluence/c1/wiki/api/v2/pages?limit=25&cursor=abc%3D%3D"
    );
}

#[test]
fn test_cursor_missing_or_empty_is_done() {
    let config = PaginationConfig::Cursor {
        next_path: "next_page".to_string(),
        cursor_param: Some("cursor".to_string()),
        link_param: None,
        has_more_path: None,
        done_path: None,
        size_param: None,
    };
    assert_eq!(next(&config, "https://x.io/a", json!({}), 3), "");
    assert_eq!(next(&config, "https://x.io/a", json!({"next_page": ""}), 3), "");
    assert_eq!(next(&config, "https://x.io/a", json!({"next_page": null}), 3), "");
    assert_eq!(
        next(&config, "https://x.io/a", json!({"next_page": "c2"}), 3),
        "https://x.io/a?cursor=c2"
    );
}

// ============================================================================
// Link Header
// ============================================================================

#[test]
fn test_parse_link_header() {
    let header = r#"<https://api.github.com/user/repos?page=2>; rel="next", <https://api.github.com/user/repos?page=5>; rel="last""#;
    assert_eq!(
        parse_link_header(header, "next"),
        Some("https://api.github.com/user/repos?page=2".to_string())
    );
    assert_eq!(
        parse_link_header(header, "last"),
        Some("https://api.github.com/user/repos?page=5".to_string())
    );
    assert_eq!(parse_link_header(header, "prev"), None);
    assert_eq!(
        parse_link_header(r#"<https://x/a>; rel="next prefetch""#, "next"),
        Some("https://x/a".to_string())
    );
}

#[test]
fn test_parse_link_header_commas_in_url() {
    let header = r#"<https://api.github.com/repos?ids=1,2&page=2>; rel="next""#;
    assert_eq!(
        parse_link_header(header, "next"),
        Some("https://api.github.com/repos?ids=1,2&page=2".to_string())
    );

    let header = r#"<https://x/a?f=a,b&page=1>; rel="prev", <https://x/a?f=a,b&page=3>; rel="next""#;
    assert_eq!(
        parse_link_header(header, "prev"),
        Some("https://x/a?f=a,b&page=1".to_string())
    );
    assert_eq!(
        parse_link_header(header, "next"),
        Some("https://x/a?f=a,b&page=3".to_string())
    );
}

#[test]
fn test_link_header_next_is_exact_url() {
    let request_url = url("https://x/api");
    let body = json!([]);
    let mut headers = HeaderMap::new();
    headers.insert(
        "link",
        HeaderValue::from_static(r#"<https://x/api?page=2>; rel="next""#),
    );

    let paginator = PaginationConfig::LinkHeader {
        rel: "next".to_string(),
        size_param: None,
    }
    .paginator();
    let token = next_page_token(paginator.as_ref(), &page(&request_url, &body, &headers, 30)).unwrap();
    assert_eq!(token, "https://x/api?page=2");

    let empty = HeaderMap::new();
    let token = next_page_token(paginator.as_ref(), &page(&request_url, &body, &empty, 30)).unwrap();
    assert_eq!(token, "");
}

// ============================================================================
// Page Token
// ============================================================================

#[test]
fn test_page_token() {
    let config = PaginationConfig::PageToken {
        token_param: "nextPageToken".to_string(),
        token_path: "nextPageToken".to_string(),
        size_param: Some("batchSize".to_string()),
        stop_on_empty: true,
    };
    assert_eq!(
        next(&config, "https://x.io/rest/v1/lists.json?batchSize=2", json!({"nextPageToken": "T1"}), 2),
        "https://x.io/rest/v1/lists.json?batchSize=2&nextPageToken=T1"
    );
    assert_eq!(
        next(&config, "https://x.io/rest/v1/lists.json", json!({"nextPageToken": "T2"}), 0),
        ""
    );
    assert_eq!(next(&config, "https://x.io/rest/v1/lists.json", json!({}), 5), "");
}

// ============================================================================
// Termination guard
// ============================================================================

#[test]
fn test_next_url_equal_to_request_is_done() {
    let config = PaginationConfig::Cursor {
        next_path: "next".to_string(),
        cursor_param: None,
        link_param: None,
        has_more_path: None,
        done_path: None,
        size_param: None,
    };
    assert_eq!(
        next(&config, "https://x.io/leads?page=9", json!({"next": "https://x.io/leads?page=9"}), 1),
        ""
    );
}

#[test]
fn test_no_pagination() {
    assert_eq!(next(&PaginationConfig::None, "https://x.io/a", json!({"next": "b"}), 10), "");
}

// ============================================================================
// Incremental window
// ============================================================================

fn incremental(closed: bool) -> IncrementalConfig {
    IncrementalConfig {
        since_param: "dateFrom".to_string(),
        until_param: Some("dateTo".to_string()),
        format: TimeFormat::Date,
        require_closed_interval: closed,
    }
}

#[test]
fn test_window_applies_both_bounds() {
    let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let until = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

    let mut builder = UrlBuilder::new("https://x.io/events").unwrap();
    let window = apply_window(&mut builder, Some(&incremental(false)), Some(since), Some(until), now);
    assert_eq!(builder.to_string(), "https://x.io/events?dateFrom=2024-01-01&dateTo=2024-02-01");
    assert!(!window.is_open());
}

#[test]
fn test_window_closed_interval_defaults_until_to_now() {
    let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

    let mut builder = UrlBuilder::new("https://x.io/events").unwrap();
    apply_window(&mut builder, Some(&incremental(true)), Some(since), None, now);
    assert_eq!(builder.to_string(), "https://x.io/events?dateFrom=2024-01-01&dateTo=2024-03-01");

    let mut builder = UrlBuilder::new("https://x.io/events").unwrap();
    apply_window(&mut builder, Some(&incremental(false)), Some(since), None, now);
    assert_eq!(builder.to_string(), "https://x.io/events?dateFrom=2024-01-01");
}

#[test]
fn test_window_ignored_without_config() {
    let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut builder = UrlBuilder::new("https://x.io/events").unwrap();
    let window = apply_window(&mut builder, None, Some(since), None, Utc::now());
    assert_eq!(builder.to_string(), "https://x.io/events");
    assert!(window.is_open());
}
