//! Salesforce
//!
//! Reads and searches go through SOQL on the query endpoint and page with
//! `nextRecordsUrl`. Metadata comes from the sObject describe call. Custom
//! fields and objects are deployed with [`upsert_metadata`], which posts
//! an XML envelope to the Metadata SOAP API.

use super::query::Dialect;
use crate::cancel::CancellationToken;
use crate::connector::pipeline;
use crate::connector::{
    FieldMetadata, Filter, HookContext, ObjectMetadata, ProviderConnector, ProviderHooks, ReadParams, SearchParams,
    WriteParams, WriteResult,
};
use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse, RequestBody};
use crate::jsonquery::JsonQuery;
use crate::pagination::Window;
use crate::schema::JsonType;
use crate::types::{JsonValue, Method};
use crate::xml::{self, XmlData};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument, warn};

const QUERY_PATH: &str = "services/data/v59.0/query";
const METADATA_PATH: &str = "services/Soap/m/59.0";
const SOBJECTS_PATH: &str = "services/data/v59.0/sobjects";

/// Salesforce rejects query batches outside this range
const MIN_BATCH_SIZE: usize = 200;

#[derive(Debug, Clone, Copy, Default)]
pub struct SalesforceHooks;

#[async_trait]
impl ProviderHooks for SalesforceHooks {
    fn build_read_request(&self, cx: &HookContext<'_>, params: &ReadParams) -> Result<HttpRequest> {
        if !params.next_page.is_empty() {
            return pipeline::read_request(cx, params);
        }
        let query = SoqlQuery {
            object: &params.object_name,
            fields: &params.fields,
            filter: None,
            since: params.since,
            until: params.until,
        };
        query_request(cx, &query.render(cx)?, params.page_size)
    }

    fn build_search_request(&self, cx: &HookContext<'_>, params: &SearchParams) -> Result<HttpRequest> {
        if !params.next_page.is_empty() {
            return pipeline::search_request(cx, params);
        }
        let query = SoqlQuery {
            object: &params.object_name,
            fields: &params.fields,
            filter: params.filter.as_ref(),
            since: params.since,
            until: params.until,
        };
        query_request(cx, &query.render(cx)?, params.page_size)
    }

    fn parse_write_response(
        &self,
        cx: &HookContext<'_>,
        params: &WriteParams,
        response: &HttpResponse,
    ) -> Result<WriteResult> {
        let mut result = pipeline::write_response(cx, params, response)?;
        if result.data.get("success").and_then(JsonValue::as_bool) == Some(false) {
            result.success = false;
        }
        if let Some(JsonValue::Array(errors)) = result.data.get("errors") {
            result.errors = errors
                .iter()
                .map(|e| match e.get("message").and_then(JsonValue::as_str) {
                    Some(message) => message.to_string(),
                    None => e.to_string(),
                })
                .collect();
        }
        Ok(result)
    }

    fn build_metadata_request(&self, cx: &HookContext<'_>, object: &str) -> Result<Option<HttpRequest>> {
        let url = cx.url(&format!("{SOBJECTS_PATH}/{object}/describe"))?;
        Ok(Some(HttpRequest::get(url.build())))
    }

    fn parse_metadata_response(
        &self,
        _cx: &HookContext<'_>,
        object: &str,
        response: &HttpResponse,
    ) -> Result<ObjectMetadata> {
        let body = response.json()?;
        let query = JsonQuery::new(body);
        let display_name = query.string_optional("labelPlural")?.unwrap_or(object);

        let mut fields = BTreeMap::new();
        for field in query.array_required("fields")? {
            let field = JsonQuery::new(field);
            let name = field.string_required("name")?;
            let meta = FieldMetadata {
                display_name: field.string_optional("label")?.unwrap_or(name).to_string(),
                value_type: describe_type(field.string_optional("type")?.unwrap_or_default()),
            };
            fields.insert(name.to_string(), meta);
        }
        Ok(ObjectMetadata::new(display_name, fields))
    }
}

/// Map a describe field type onto a JSON type
fn describe_type(kind: &str) -> JsonType {
    match kind {
        "boolean" => JsonType::Boolean,
        "int" | "long" => JsonType::Integer,
        "double" | "currency" | "percent" => JsonType::Number,
        "address" | "location" => JsonType::Object,
        _ => JsonType::String,
    }
}

// ============================================================================
// SOQL
// ============================================================================

struct SoqlQuery<'a> {
    object: &'a str,
    fields: &'a BTreeSet<String>,
    filter: Option<&'a Filter>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
}

impl SoqlQuery<'_> {
    fn render(&self, cx: &HookContext<'_>) -> Result<String> {
        let schema = cx.object(self.object)?;

        let select = if self.fields.is_empty() {
            "FIELDS(STANDARD)".to_string()
        } else {
            let mut columns: Vec<&str> = self.fields.iter().map(String::as_str).collect();
            if !columns.iter().any(|c| c.eq_ignore_ascii_case("id")) {
                columns.insert(0, "Id");
            }
            columns.join(", ")
        };

        let mut conditions = Vec::new();
        if let Some(config) = &schema.incremental {
            let window = Window::resolve(Some(config), self.since, self.until, cx.now);
            if let Some(since) = window.since {
                conditions.push(format!("{} >= {}", config.since_param, config.format.format(since)));
            }
            if let Some(until) = window.until {
                conditions.push(format!("{} < {}", config.since_param, config.format.format(until)));
            }
        }
        if let Some(filter) = self.filter {
            conditions.push(format!("({})", Dialect::Soql.render(filter)?));
        }

        let mut soql = format!("SELECT {select} FROM {}", self.object);
        if !conditions.is_empty() {
            soql.push_str(" WHERE ");
            soql.push_str(&conditions.join(" AND "));
        }
        if let Some(config) = &schema.incremental {
            soql.push_str(&format!(" ORDER BY {} ASC", config.since_param));
        }
        Ok(soql)
    }
}

fn query_request(cx: &HookContext<'_>, soql: &str, page_size: Option<usize>) -> Result<HttpRequest> {
    debug!(%soql, "Built SOQL");
    let mut url = cx.url(QUERY_PATH)?;
    url.with_query_param("q", soql);

    let mut request = HttpRequest::get(url.build());
    if let Some(size) = cx.page_size(page_size) {
        request.set_header(
            "Sforce-Query-Options",
            format!("batchSize={}", size.max(MIN_BATCH_SIZE)),
        );
    }
    Ok(request)
}

// ============================================================================
// Metadata API
// ============================================================================

/// Outcome of one deployed metadata component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataUpsertResult {
    pub full_name: String,
    pub success: bool,
    pub created: bool,
    pub errors: Vec<String>,
}

/// Create or update metadata components (custom fields, objects, ...).
///
/// Each item is one `<metadata xsi:type="...">` element. Items are
/// validated before anything is sent.
#[instrument(skip_all, fields(items = items.len()))]
pub async fn upsert_metadata(
    connector: &ProviderConnector,
    ctx: &CancellationToken,
    items: &[XmlData],
) -> Result<Vec<MetadataUpsertResult>> {
    if connector.info().name != "salesforce" {
        return Err(Error::not_supported(&connector.info().name, "metadata upsert"));
    }
    if items.is_empty() {
        return Err(Error::MissingObjects);
    }
    for item in items {
        item.validate()?;
    }

    let session = connector.client().access_token(ctx).await?;
    let envelope = upsert_envelope(&session, items);
    envelope.validate()?;

    let module = connector.ready_module(ctx).await?;
    let url = module.url(METADATA_PATH)?.build();
    let request = HttpRequest::new(Method::POST, url)
        .with_header("SOAPAction", "upsertMetadata")
        .with_body(RequestBody::Xml(envelope.to_string()));
    let response = connector.send(ctx, &request).await?;

    let results = parse_upsert_response(&response.text())?;
    for result in results.iter().filter(|r| !r.success) {
        warn!(full_name = %result.full_name, errors = ?result.errors, "Metadata upsert failed");
    }
    info!(
        succeeded = results.iter().filter(|r| r.success).count(),
        failed = results.iter().filter(|r| !r.success).count(),
        "Upserted metadata"
    );
    Ok(results)
}

/// SOAP envelope for `upsertMetadata`
pub fn upsert_envelope(session_id: &str, items: &[XmlData]) -> XmlData {
    let header = XmlData::new("soapenv:Header").with_child(
        XmlData::new("SessionHeader").with_child(XmlData::text_element("sessionId", session_id)),
    );
    let upsert = items
        .iter()
        .cloned()
        .fold(XmlData::new("upsertMetadata"), XmlData::with_child);

    XmlData::new("soapenv:Envelope")
        .with_attr("xmlns:soapenv", "http://schemas.xmlsoap.org/soap/envelope/")
        .with_attr("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance")
        .with_attr("xmlns", "http://soap.sforce.com/2006/04/metadata")
        .with_child(header)
        .with_child(XmlData::new("soapenv:Body").with_child(upsert))
}

/// Read the `<result>` entries of an `upsertMetadataResponse`
pub fn parse_upsert_response(body: &str) -> Result<Vec<MetadataUpsertResult>> {
    let root = xml::parse(body)?;
    let mut results = Vec::new();
    root.descendants_named("result", &mut results);

    Ok(results
        .into_iter()
        .map(|result| {
            let mut errors = Vec::new();
            for error in result.children_named("errors") {
                if let Some(message) = error.child_text("message") {
                    errors.push(message);
                }
            }
            MetadataUpsertResult {
                full_name: result.child_text("fullName").unwrap_or_default(),
                success: result.child_text("success").as_deref() == Some("true"),
                created: result.child_text("created").as_deref() == Some("true"),
                errors,
            }
        })
        .collect())
}
