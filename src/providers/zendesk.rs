//! Zendesk Support
//!
//! CRUD uses the default pipeline with cursor pagination and singular
//! write wrappers. Search goes through the unified search endpoint, which
//! takes a `type:` qualified query string and pages with `next_page`.
//! Subscriptions are webhooks that can be patched in place.

use crate::connector::pipeline::{self, next_page_url};
use crate::connector::{FilterOperator, HookContext, ProviderHooks, ReadResult, SearchParams};
use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::pagination::PaginationConfig;
use crate::subscription::{SubscribeParams, SubscriptionState, UpdateMode};
use crate::types::{scalar_to_string, JsonValue, Method, TimeFormat};
use async_trait::async_trait;
use serde_json::json;

const WEBHOOKS_PATH: &str = "api/v2/webhooks";
const TICKET_EVENTS: &str = "conditional_ticket_events";
const DEFAULT_WEBHOOK_NAME: &str = "connectorkit";

#[derive(Debug, Clone, Copy, Default)]
pub struct ZendeskHooks;

#[async_trait]
impl ProviderHooks for ZendeskHooks {
    fn build_search_request(&self, cx: &HookContext<'_>, params: &SearchParams) -> Result<HttpRequest> {
        if !params.next_page.is_empty() {
            return Ok(HttpRequest::get(next_page_url(cx, &params.next_page)?));
        }

        let object = cx.object(&params.object_name)?;
        let query = search_query(object.write_wrapper.as_deref().unwrap_or(&params.object_name), params)?;

        let mut url = cx.url(object.search_path.as_deref().unwrap_or("api/v2/search.json"))?;
        url.with_query_param("query", query);
        search_pagination()
            .paginator()
            .first_page(&mut url, cx.page_size(params.page_size));
        Ok(HttpRequest::get(url.build()))
    }

    fn parse_search_response(
        &self,
        cx: &HookContext<'_>,
        params: &SearchParams,
        request: &HttpRequest,
        response: &HttpResponse,
    ) -> Result<ReadResult> {
        let object = cx.object(&params.object_name)?;
        let key = object.search_response_key.as_deref().unwrap_or("results");
        let pagination = search_pagination();
        pipeline::parse_result(
            response,
            |body| pipeline::records_at(body, key),
            |body, count| pipeline::next_page(&pagination, &request.url, response, body, count),
            &params.fields,
        )
    }

    fn build_subscribe_request(&self, cx: &HookContext<'_>, params: &SubscribeParams) -> Result<HttpRequest> {
        let body = webhook_body(cx, params)?;
        Ok(HttpRequest::json(Method::POST, cx.url(WEBHOOKS_PATH)?.build(), body))
    }

    fn subscription_update_mode(&self) -> UpdateMode {
        UpdateMode::Patch
    }

    fn build_update_subscription_request(
        &self,
        cx: &HookContext<'_>,
        params: &SubscribeParams,
        previous: &SubscriptionState,
    ) -> Result<HttpRequest> {
        let body = webhook_body(cx, params)?;
        let url = cx.url(&format!("{WEBHOOKS_PATH}/{}", previous.external_subscription_id))?;
        Ok(HttpRequest::json(Method::PATCH, url.build(), body))
    }

    fn build_delete_subscription_request(
        &self,
        cx: &HookContext<'_>,
        state: &SubscriptionState,
    ) -> Result<HttpRequest> {
        let url = cx.url(&format!("{WEBHOOKS_PATH}/{}", state.external_subscription_id))?;
        Ok(HttpRequest::delete(url.build()))
    }

    fn subscription_id(&self, body: &JsonValue) -> Option<String> {
        body.pointer("/webhook/id")
            .or_else(|| body.get("id"))
            .and_then(scalar_to_string)
    }
}

fn search_pagination() -> PaginationConfig {
    PaginationConfig::Cursor {
        next_path: "next_page".to_string(),
        cursor_param: None,
        link_param: None,
        has_more_path: None,
        done_path: None,
        size_param: Some("per_page".to_string()),
    }
}

/// Build a search query such as `type:ticket status:open updated>=2024-01-01T00:00:00Z`
fn search_query(record_type: &str, params: &SearchParams) -> Result<String> {
    let mut terms = vec![format!("type:{record_type}")];

    if let Some(filter) = &params.filter {
        for (field, operator, value) in filter.conjunction()? {
            if operator == FilterOperator::In {
                let items = value
                    .as_array()
                    .ok_or_else(|| Error::config(format!("'in' filter on '{field}' needs an array value")))?;
                for item in items {
                    terms.push(format!("{field}:{}", search_value(field, item)?));
                }
                continue;
            }
            let value = search_value(field, value)?;
            let term = match operator {
                FilterOperator::Eq => format!("{field}:{value}"),
                FilterOperator::NotEq => format!("-{field}:{value}"),
                FilterOperator::Gt => format!("{field}>{value}"),
                FilterOperator::Gte => format!("{field}>={value}"),
                FilterOperator::Lt => format!("{field}<{value}"),
                FilterOperator::Lte => format!("{field}<={value}"),
                FilterOperator::Contains => format!("{field}:*{value}*"),
                FilterOperator::In => continue,
            };
            terms.push(term);
        }
    }

    if let Some(since) = params.since {
        terms.push(format!("updated>={}", TimeFormat::Rfc3339.format(since)));
    }
    if let Some(until) = params.until {
        terms.push(format!("updated<{}", TimeFormat::Rfc3339.format(until)));
    }
    Ok(terms.join(" "))
}

fn search_value(field: &str, value: &JsonValue) -> Result<String> {
    let raw = scalar_to_string(value)
        .ok_or_else(|| Error::config(format!("filter value for '{field}' must be a scalar")))?;
    if raw.chars().any(char::is_whitespace) {
        Ok(format!("\"{}\"", raw.replace('"', "")))
    } else {
        Ok(raw)
    }
}

/// Webhook payload; tickets subscribe through triggers, other objects
/// through `zen:event-type` subscriptions
fn webhook_body(cx: &HookContext<'_>, params: &SubscribeParams) -> Result<JsonValue> {
    let endpoint = params.required_option("endpoint")?;
    let name = params.option("name").unwrap_or(DEFAULT_WEBHOOK_NAME);

    let mut subscriptions = Vec::new();
    for (object, events) in &params.subscription_events {
        let native = cx.info.naming.normalize_object(object);
        let schema = cx.object(&native)?;
        if native == "tickets" {
            if !subscriptions.iter().any(|s| s == TICKET_EVENTS) {
                subscriptions.push(TICKET_EVENTS.to_string());
            }
            continue;
        }
        let singular = schema.write_wrapper.as_deref().unwrap_or(native.as_str());
        for event in events {
            subscriptions.push(format!("zen:event-type:{singular}.{event}"));
        }
    }

    Ok(json!({
        "webhook": {
            "name": name,
            "endpoint": endpoint,
            "http_method": "POST",
            "request_format": "json",
            "status": "active",
            "subscriptions": subscriptions,
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::Filter;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_search_query() {
        let params = SearchParams::new("tickets")
            .filter(Filter::And(vec![
                Filter::eq("status", "open"),
                Filter::condition("priority", FilterOperator::NotEq, "low"),
                Filter::eq("subject", "printer on fire"),
            ]))
            .since(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
        assert_eq!(
            search_query("ticket", &params).unwrap(),
            r#"type:ticket status:open -priority:low subject:"printer on fire" updated>=2024-01-02T03:04:05Z"#
        );
    }

    #[test]
    fn test_search_query_in_expands() {
        let params = SearchParams::new("tickets").filter(Filter::condition(
            "status",
            FilterOperator::In,
            json!(["open", "pending"]),
        ));
        assert_eq!(
            search_query("ticket", &params).unwrap(),
            "type:ticket status:open status:pending"
        );
    }

    #[test]
    fn test_search_query_rejects_or() {
        let params = SearchParams::new("tickets").filter(Filter::Or(vec![Filter::eq("a", 1)]));
        assert!(search_query("ticket", &params).is_err());
    }

    #[test]
    fn test_subscription_id_locations() {
        let hooks = ZendeskHooks;
        assert_eq!(hooks.subscription_id(&json!({"webhook": {"id": "01H"}})).as_deref(), Some("01H"));
        assert_eq!(hooks.subscription_id(&json!({"id": 7})).as_deref(), Some("7"));
        assert_eq!(hooks.subscription_id(&json!({})), None);
    }
}
