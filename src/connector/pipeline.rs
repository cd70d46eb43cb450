//! Default request builders and response parsers
//!
//! These implement the conventions most REST providers share: collection
//! paths from the schema store, records under a response key, pagination
//! per object, writes wrapped or bare, updates by record path.

use super::hooks::HookContext;
use super::types::{
    DeleteParams, FilterOperator, ReadParams, ReadRecord, ReadResult, SearchParams, WriteParams,
    WriteResult,
};
use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::jsonquery::values_to_maps;
use crate::pagination::{apply_window, next_page_token, PageContext, PaginationConfig};
use crate::template;
use crate::types::{scalar_to_string, JsonObject, JsonValue, Method, StringMap};
use serde_json::json;
use std::collections::BTreeSet;
use tracing::debug;
use url::Url;

// ============================================================================
// Generic result parsing
// ============================================================================

/// Assemble a [`ReadResult`] from a response.
///
/// `records` extracts the record array from the JSON root and `next`
/// computes the next-page token; `fields` is the requested projection.
pub fn parse_result<R, N>(response: &HttpResponse, records: R, next: N, fields: &BTreeSet<String>) -> Result<ReadResult>
where
    R: FnOnce(&JsonValue) -> Result<Vec<JsonObject>>,
    N: FnOnce(&JsonValue, usize) -> Result<String>,
{
    let body = response.json()?;
    let raw_records = records(body)?;
    let next_page = next(body, raw_records.len())?;

    let data: Vec<ReadRecord> = raw_records
        .into_iter()
        .map(|raw| ReadRecord {
            fields: project(&raw, fields),
            raw,
        })
        .collect();

    Ok(ReadResult {
        rows: data.len(),
        data,
        done: next_page.is_empty(),
        next_page,
    })
}

/// Copy the requested fields out of a record. Dotted names reach into
/// nested objects; missing fields are omitted.
pub fn project(record: &JsonObject, fields: &BTreeSet<String>) -> JsonObject {
    let mut out = JsonObject::new();
    for field in fields {
        let value = match record.get(field.as_str()) {
            Some(value) => Some(value),
            None if field.contains('.') => {
                let mut parts = field.split('.');
                let mut node = parts.next().and_then(|k| record.get(k));
                for key in parts {
                    node = node.and_then(|n| n.get(key));
                }
                node
            }
            None => None,
        };
        if let Some(value) = value {
            out.insert(field.clone(), value.clone());
        }
    }
    out
}

/// Records at a dotted key; an empty key means the root is the array.
///
/// A missing key is `MissingExpectedValues`; an explicit `null` is an
/// empty page.
pub fn records_at(body: &JsonValue, key: &str) -> Result<Vec<JsonObject>> {
    let mut node = body;
    if !key.is_empty() {
        for part in key.split('.') {
            node = node.get(part).ok_or_else(|| Error::missing_value(key))?;
        }
    }
    match node {
        JsonValue::Null => Ok(Vec::new()),
        JsonValue::Array(items) => values_to_maps(items),
        JsonValue::Object(map) if key.is_empty() => Err(Error::unmarshal(format!(
            "expected a record array at the response root, found an object with keys: {}",
            map.keys().take(5).cloned().collect::<Vec<_>>().join(", ")
        ))),
        _ => Err(Error::unmarshal(format!("expected a record array at '{key}'"))),
    }
}

/// Like [`records_at`] but a missing key is an empty page
pub fn optional_records_at(body: &JsonValue, key: &str) -> Result<Vec<JsonObject>> {
    match records_at(body, key) {
        Err(Error::MissingExpectedValues { .. }) => Ok(Vec::new()),
        other => other,
    }
}

/// Next-page token for a response fetched from `request_url`
pub fn next_page(
    pagination: &PaginationConfig,
    request_url: &Url,
    response: &HttpResponse,
    body: &JsonValue,
    records: usize,
) -> Result<String> {
    let page = PageContext {
        request_url,
        body,
        headers: &response.headers,
        records,
    };
    let token = next_page_token(pagination.paginator().as_ref(), &page)?;
    debug!(records, done = token.is_empty(), "Computed next page");
    Ok(token)
}

/// Parse a caller-supplied next-page token.
///
/// The token is replayed verbatim, so it must share the scheme, host and
/// port of the module base URL; credentials never leave that origin.
pub fn next_page_url(cx: &HookContext<'_>, token: &str) -> Result<Url> {
    let url = Url::parse(token).map_err(|e| Error::config(format!("invalid next page token '{token}': {e}")))?;
    let base = cx.module.base_url()?;
    let base = Url::parse(&base).map_err(|e| Error::config(format!("invalid base URL '{base}': {e}")))?;
    if url.origin() != base.origin() {
        return Err(Error::config(format!(
            "next page token '{token}' is outside the module origin {}",
            base.origin().ascii_serialization()
        )));
    }
    Ok(url)
}

/// Scalar fields of a record as template variables
pub fn record_vars(record: &JsonObject) -> StringMap {
    record
        .iter()
        .filter_map(|(k, v)| scalar_to_string(v).map(|s| (k.clone(), s)))
        .collect()
}

fn record_object(params: &WriteParams) -> Result<&JsonObject> {
    params
        .record_data
        .as_object()
        .ok_or_else(|| Error::config(format!("record data for '{}' must be a JSON object", params.object_name)))
}

// ============================================================================
// Read
// ============================================================================

/// GET the object's collection path with first-page and window parameters,
/// or the next-page URL verbatim
pub fn read_request(cx: &HookContext<'_>, params: &ReadParams) -> Result<HttpRequest> {
    if !params.next_page.is_empty() {
        return Ok(HttpRequest::get(next_page_url(cx, &params.next_page)?));
    }

    let object = cx.object(&params.object_name)?;
    let mut url = cx.url(&object.path)?;
    cx.pagination(&params.object_name)?
        .paginator()
        .first_page(&mut url, cx.page_size(params.page_size));
    apply_window(&mut url, object.incremental.as_ref(), params.since, params.until, cx.now);

    Ok(HttpRequest::get(url.build()))
}

/// Records under the object's response key, paginated per the schema
pub fn read_response(
    cx: &HookContext<'_>,
    params: &ReadParams,
    request: &HttpRequest,
    response: &HttpResponse,
) -> Result<ReadResult> {
    let object = cx.object(&params.object_name)?;
    let pagination = cx.pagination(&params.object_name)?;
    parse_result(
        response,
        |body| records_at(body, &object.response_key),
        |body, count| next_page(pagination, &request.url, response, body, count),
        &params.fields,
    )
}

// ============================================================================
// Search
// ============================================================================

/// GET the search path with `eq` conditions as query parameters
pub fn search_request(cx: &HookContext<'_>, params: &SearchParams) -> Result<HttpRequest> {
    if !params.next_page.is_empty() {
        return Ok(HttpRequest::get(next_page_url(cx, &params.next_page)?));
    }

    let object = cx.object(&params.object_name)?;
    let mut url = cx.url(object.search_path.as_deref().unwrap_or(&object.path))?;
    cx.pagination(&params.object_name)?
        .paginator()
        .first_page(&mut url, cx.page_size(params.page_size));
    apply_window(&mut url, object.incremental.as_ref(), params.since, params.until, cx.now);

    if let Some(filter) = &params.filter {
        for (field, operator, value) in filter.conjunction()? {
            if operator != FilterOperator::Eq {
                return Err(Error::config(format!(
                    "{} search supports only eq conditions, got {operator} on '{field}'",
                    cx.info.name
                )));
            }
            let value = scalar_to_string(value)
                .ok_or_else(|| Error::config(format!("filter value for '{field}' must be a scalar")))?;
            url.with_query_param(field, value);
        }
    }

    Ok(HttpRequest::get(url.build()))
}

/// Records under the search response key (falls back to the read key)
pub fn search_response(
    cx: &HookContext<'_>,
    params: &SearchParams,
    request: &HttpRequest,
    response: &HttpResponse,
) -> Result<ReadResult> {
    let object = cx.object(&params.object_name)?;
    let key = object.search_response_key.as_deref().unwrap_or(&object.response_key);
    let pagination = cx.pagination(&params.object_name)?;
    parse_result(
        response,
        |body| records_at(body, key),
        |body, count| next_page(pagination, &request.url, response, body, count),
        &params.fields,
    )
}

// ============================================================================
// Write
// ============================================================================

/// POST to the create path, or the update method to the record path
pub fn write_request(cx: &HookContext<'_>, params: &WriteParams) -> Result<HttpRequest> {
    let object = cx.object(&params.object_name)?;
    let record = record_object(params)?;
    let body = match &object.write_wrapper {
        Some(wrapper) => json!({ wrapper.as_str(): record }),
        None => JsonValue::Object(record.clone()),
    };

    if params.is_create() {
        let path = match &object.create_path {
            Some(path) => template::render(path, &record_vars(record))?,
            None => object.path.clone(),
        };
        Ok(HttpRequest::json(Method::POST, cx.url(&path)?.build(), body))
    } else {
        let path = object.record_path(&params.record_id);
        Ok(HttpRequest::json(object.update_method, cx.url(&path)?.build(), body))
    }
}

/// Unwrap the written record and read its id
pub fn write_response(cx: &HookContext<'_>, params: &WriteParams, response: &HttpResponse) -> Result<WriteResult> {
    let object = cx.object(&params.object_name)?;
    let body = response.json()?;

    let record = match (&object.write_wrapper, body) {
        (Some(wrapper), JsonValue::Object(map)) if map.contains_key(wrapper) => &map[wrapper],
        (_, body) => body,
    };
    let data = match record {
        JsonValue::Object(map) => map.clone(),
        JsonValue::Null => JsonObject::new(),
        _ => return Err(Error::unmarshal("write response is not a JSON object")),
    };

    let record_id = data
        .get(&object.id_field)
        .and_then(scalar_to_string)
        .unwrap_or_else(|| params.record_id.clone());
    if record_id.is_empty() {
        return Err(Error::missing_value(object.id_field.clone()));
    }

    Ok(WriteResult {
        success: true,
        record_id,
        errors: Vec::new(),
        data,
    })
}

// ============================================================================
// Delete
// ============================================================================

/// DELETE the record path
pub fn delete_request(cx: &HookContext<'_>, params: &DeleteParams) -> Result<HttpRequest> {
    let object = cx.object(&params.object_name)?;
    let url = cx.url(&object.record_path(&params.record_id))?;
    Ok(HttpRequest::delete(url.build()))
}
