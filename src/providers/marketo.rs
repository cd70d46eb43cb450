//! Marketo
//!
//! Marketo answers almost everything with HTTP 200 and reports failures in
//! a `success`/`errors` envelope, so the hooks install an interpreter that
//! maps those codes onto the error taxonomy. Leads cannot be listed, only
//! looked up by a filter field, and are written and deleted in batches.

use crate::connector::pipeline::{self, next_page_url, optional_records_at, parse_result};
use crate::connector::{
    DeleteParams, FilterOperator, HookContext, ProviderHooks, ReadParams, ReadResult, SearchParams, WriteParams,
    WriteResult,
};
use crate::error::{body_excerpt, Error, Result};
use crate::http::{HttpRequest, HttpResponse, ResponseInterpreter};
use crate::jsonquery::JsonQuery;
use crate::types::{scalar_to_string, JsonObject, JsonValue, Method};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

const LEADS: &str = "leads";
const DELETE_LEADS_PATH: &str = "leads/delete.json";

#[derive(Debug, Clone, Copy, Default)]
pub struct MarketoHooks;

#[async_trait]
impl ProviderHooks for MarketoHooks {
    fn interpreter(&self) -> Option<Arc<dyn ResponseInterpreter>> {
        Some(Arc::new(MarketoInterpreter))
    }

    fn parse_read_response(
        &self,
        cx: &HookContext<'_>,
        params: &ReadParams,
        request: &HttpRequest,
        response: &HttpResponse,
    ) -> Result<ReadResult> {
        let object = cx.object(&params.object_name)?;
        let pagination = cx.pagination(&params.object_name)?;
        parse_result(
            response,
            |body| optional_records_at(body, &object.response_key),
            |body, count| pipeline::next_page(pagination, &request.url, response, body, count),
            &params.fields,
        )
    }

    fn build_search_request(&self, cx: &HookContext<'_>, params: &SearchParams) -> Result<HttpRequest> {
        if !params.next_page.is_empty() {
            return Ok(HttpRequest::get(next_page_url(cx, &params.next_page)?));
        }

        let filter = params
            .filter
            .as_ref()
            .ok_or_else(|| Error::missing_param("filter"))?;
        let conditions = filter.conjunction()?;
        let [(field, operator, value)] = conditions.as_slice() else {
            return Err(Error::config("Marketo searches by exactly one filter field"));
        };
        let values = match (operator, value) {
            (FilterOperator::Eq, value) => vec![filter_value(field, value)?],
            (FilterOperator::In, JsonValue::Array(items)) => items
                .iter()
                .map(|item| filter_value(field, item))
                .collect::<Result<Vec<_>>>()?,
            _ => {
                return Err(Error::config(format!(
                    "Marketo filters support eq and in, got {operator} on '{field}'"
                )))
            }
        };

        let object = cx.object(&params.object_name)?;
        let mut url = cx.url(object.search_path.as_deref().unwrap_or(&object.path))?;
        url.with_query_param("filterType", *field);
        url.with_query_param("filterValues", values.join(","));
        if !params.fields.is_empty() {
            let fields: Vec<&str> = params.fields.iter().map(String::as_str).collect();
            url.with_query_param("fields", fields.join(","));
        }
        cx.pagination(&params.object_name)?
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
        self.parse_read_response(cx, &params.as_read(), request, response)
    }

    fn build_write_request(&self, cx: &HookContext<'_>, params: &WriteParams) -> Result<HttpRequest> {
        if params.object_name != LEADS {
            return pipeline::write_request(cx, params);
        }

        let mut record = params
            .record_data
            .as_object()
            .cloned()
            .ok_or_else(|| Error::config("lead data must be a JSON object"))?;
        let body = if params.is_create() {
            json!({ "action": "createOrUpdate", "input": [record] })
        } else {
            record.insert("id".to_string(), lead_id(&params.record_id));
            json!({ "action": "updateOnly", "lookupField": "id", "input": [record] })
        };

        let object = cx.object(LEADS)?;
        Ok(HttpRequest::json(Method::POST, cx.url(&object.path)?.build(), body))
    }

    fn parse_write_response(
        &self,
        cx: &HookContext<'_>,
        params: &WriteParams,
        response: &HttpResponse,
    ) -> Result<WriteResult> {
        if params.object_name != LEADS {
            return pipeline::write_response(cx, params, response);
        }

        let body = response.json()?;
        let results = JsonQuery::new(body).array_required("result")?;
        let first = results
            .first()
            .and_then(JsonValue::as_object)
            .ok_or_else(|| Error::missing_value("result"))?;
        lead_write_result(first, &params.record_id)
    }

    fn build_delete_request(&self, cx: &HookContext<'_>, params: &DeleteParams) -> Result<HttpRequest> {
        if params.object_name != LEADS {
            return pipeline::delete_request(cx, params);
        }
        let body = json!({ "input": [{ "id": lead_id(&params.record_id) }] });
        Ok(HttpRequest::json(Method::POST, cx.url(DELETE_LEADS_PATH)?.build(), body))
    }
}

/// Lead ids are integers on the wire
fn lead_id(raw: &str) -> JsonValue {
    raw.parse::<i64>().map_or_else(|_| JsonValue::from(raw), JsonValue::from)
}

fn filter_value(field: &str, value: &JsonValue) -> Result<String> {
    let value = scalar_to_string(value)
        .ok_or_else(|| Error::config(format!("filter value for '{field}' must be a scalar")))?;
    if value.contains(',') {
        return Err(Error::config(format!("filter value for '{field}' cannot contain a comma")));
    }
    Ok(value)
}

/// One entry of a lead batch result: `{"id": 1, "status": "created"}` or
/// `{"status": "skipped", "reasons": [{"code": "1005", "message": "..."}]}`
fn lead_write_result(entry: &JsonObject, requested_id: &str) -> Result<WriteResult> {
    let status = entry.get("status").and_then(JsonValue::as_str).unwrap_or_default();
    let record_id = entry
        .get("id")
        .and_then(scalar_to_string)
        .unwrap_or_else(|| requested_id.to_string());

    if status == "skipped" || status.is_empty() {
        let errors = entry
            .get("reasons")
            .and_then(JsonValue::as_array)
            .map(|reasons| {
                reasons
                    .iter()
                    .filter_map(|r| r.get("message").and_then(JsonValue::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        debug!(?errors, "Lead write skipped");
        return Ok(WriteResult {
            success: false,
            record_id,
            errors,
            data: entry.clone(),
        });
    }

    Ok(WriteResult {
        success: true,
        record_id,
        errors: Vec::new(),
        data: entry.clone(),
    })
}

// ============================================================================
// Error envelope
// ============================================================================

/// Maps `{"success": false, "errors": [{"code": "601", ...}]}` onto errors
#[derive(Debug, Clone, Copy, Default)]
pub struct MarketoInterpreter;

impl ResponseInterpreter for MarketoInterpreter {
    fn interpret(&self, response: &HttpResponse) -> Option<Error> {
        let body = response.json().ok()?;
        if body.get("success").and_then(JsonValue::as_bool) != Some(false) {
            return None;
        }

        let error = body.get("errors").and_then(|e| e.get(0));
        let code = error
            .and_then(|e| e.get("code"))
            .and_then(scalar_to_string)
            .unwrap_or_default();
        let message = error
            .and_then(|e| e.get("message"))
            .and_then(JsonValue::as_str)
            .unwrap_or("request failed");
        let excerpt = body_excerpt(&response.body);

        Some(match code.as_str() {
            // Access token invalid or expired
            "601" | "602" => Error::unauthorized(format!("Marketo {code}: {message}")),
            // Rate limit, concurrency limit, daily quota
            "606" | "607" | "615" => Error::RateLimited {
                retry_after_seconds: None,
                body: excerpt,
            },
            "603" => Error::PermissionDenied { body: excerpt },
            "610" | "702" => Error::NotFound { body: excerpt },
            _ => Error::BadRequest {
                status: response.status,
                body: excerpt,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use bytes::Bytes;
    use reqwest::header::HeaderMap;
    use test_case::test_case;
    use url::Url;

    fn response(body: serde_json::Value) -> HttpResponse {
        HttpResponse::new(
            200,
            HeaderMap::new(),
            Bytes::from(body.to_string()),
            Url::parse("https://acme.mktorest.com/rest/v1/lists.json").unwrap(),
        )
    }

    #[test_case("601", ErrorKind::Unauthorized)]
    #[test_case("602", ErrorKind::Unauthorized)]
    #[test_case("606", ErrorKind::RateLimited)]
    #[test_case("607", ErrorKind::RateLimited)]
    #[test_case("603", ErrorKind::PermissionDenied)]
    #[test_case("610", ErrorKind::NotFound)]
    #[test_case("1003", ErrorKind::BadRequest)]
    fn test_error_codes(code: &str, kind: ErrorKind) {
        let resp = response(json!({"success": false, "errors": [{"code": code, "message": "x"}]}));
        let err = MarketoInterpreter.interpret(&resp).unwrap();
        assert_eq!(err.kind(), kind);
    }

    #[test]
    fn test_success_passes_through() {
        assert!(MarketoInterpreter.interpret(&response(json!({"success": true, "result": []}))).is_none());
        assert!(MarketoInterpreter.interpret(&response(json!({"access_token": "t"}))).is_none());
    }

    #[test]
    fn test_lead_write_results() {
        let created = json!({"id": 50, "status": "created"});
        let result = lead_write_result(created.as_object().unwrap(), "").unwrap();
        assert!(result.success);
        assert_eq!(result.record_id, "50");

        let skipped = json!({"status": "skipped", "reasons": [{"code": "1005", "message": "Lead already exists"}]});
        let result = lead_write_result(skipped.as_object().unwrap(), "7").unwrap();
        assert!(!result.success);
        assert_eq!(result.record_id, "7");
        assert_eq!(result.errors, vec!["Lead already exists"]);
    }

    #[test]
    fn test_lead_id_is_numeric_when_possible() {
        assert_eq!(lead_id("42"), json!(42));
        assert_eq!(lead_id("abc"), json!("abc"));
    }
}
