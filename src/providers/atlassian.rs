//! Atlassian: Jira and Confluence
//!
//! Both modules live under a site-specific `cloudId`, discovered after
//! authentication from the token's accessible resources. Jira issues are
//! read and searched with JQL and written inside a `fields` envelope;
//! everything else uses the default pipeline.

use super::query::Dialect;
use crate::cancel::CancellationToken;
use crate::connector::pipeline::{self, parse_result, project, records_at};
use crate::connector::{
    Filter, HookContext, PostAuthEnv, PostAuthInfo, ProviderHooks, ReadParams, ReadResult, SearchParams,
    WriteParams,
};
use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::jsonquery::JsonQuery;
use crate::pagination::Window;
use crate::types::{JsonObject, JsonValue, Method, StringMap};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::BTreeSet;
use tracing::{debug, info};
use url::Url;

const ACCESSIBLE_RESOURCES_URL: &str = "https://api.atlassian.com/oauth/token/accessible-resources";
const CLOUD_ID: &str = "cloudId";
const JIRA: &str = "jira";
const ISSUES: &str = "issues";

/// Issue keys that sit beside the `fields` object rather than inside it
const ISSUE_TOP_LEVEL: &[&str] = &["id", "key", "self", "expand"];

#[derive(Debug, Clone, Copy, Default)]
pub struct AtlassianHooks;

#[async_trait]
impl ProviderHooks for AtlassianHooks {
    async fn post_auth_info(&self, ctx: &CancellationToken, env: &PostAuthEnv<'_>) -> Result<PostAuthInfo> {
        let url = Url::parse(&env.module.rebase(ACCESSIBLE_RESOURCES_URL)?)?;
        let request = HttpRequest::get(url).with_header("Accept", "application/json");
        let response = env.client.send(ctx, &request).await?;

        let sites = response
            .json()?
            .as_array()
            .ok_or_else(|| Error::unmarshal("accessible-resources response is not an array"))?;
        let site = select_site(sites, env.workspace)?;
        let cloud_id = JsonQuery::new(site).string_required("id")?;
        info!(cloud_id, "Discovered Atlassian site");

        Ok(PostAuthInfo {
            values: StringMap::from([(CLOUD_ID.to_string(), cloud_id.to_string())]),
            raw: Some(site.clone()),
        })
    }

    fn build_read_request(&self, cx: &HookContext<'_>, params: &ReadParams) -> Result<HttpRequest> {
        if !is_jira_issues(cx, &params.object_name) || !params.next_page.is_empty() {
            return pipeline::read_request(cx, params);
        }
        let query = JqlQuery {
            object: &params.object_name,
            filter: None,
            since: params.since,
            until: params.until,
            page_size: params.page_size,
            fields: &params.fields,
        };
        query.request(cx)
    }

    fn parse_read_response(
        &self,
        cx: &HookContext<'_>,
        params: &ReadParams,
        request: &HttpRequest,
        response: &HttpResponse,
    ) -> Result<ReadResult> {
        if !is_jira_issues(cx, &params.object_name) {
            return pipeline::read_response(cx, params, request, response);
        }
        issues_response(cx, &params.object_name, &params.fields, request, response)
    }

    fn build_search_request(&self, cx: &HookContext<'_>, params: &SearchParams) -> Result<HttpRequest> {
        if !is_jira_issues(cx, &params.object_name) || !params.next_page.is_empty() {
            return pipeline::search_request(cx, params);
        }
        let query = JqlQuery {
            object: &params.object_name,
            filter: params.filter.as_ref(),
            since: params.since,
            until: params.until,
            page_size: params.page_size,
            fields: &params.fields,
        };
        query.request(cx)
    }

    fn parse_search_response(
        &self,
        cx: &HookContext<'_>,
        params: &SearchParams,
        request: &HttpRequest,
        response: &HttpResponse,
    ) -> Result<ReadResult> {
        if !is_jira_issues(cx, &params.object_name) {
            return pipeline::search_response(cx, params, request, response);
        }
        issues_response(cx, &params.object_name, &params.fields, request, response)
    }

    fn build_write_request(&self, cx: &HookContext<'_>, params: &WriteParams) -> Result<HttpRequest> {
        if !is_jira_issues(cx, &params.object_name) {
            return pipeline::write_request(cx, params);
        }

        let object = cx.object(&params.object_name)?;
        let record = params
            .record_data
            .as_object()
            .ok_or_else(|| Error::config("issue data must be a JSON object"))?;
        let body = if record.contains_key("fields") || record.contains_key("update") {
            JsonValue::Object(record.clone())
        } else {
            json!({ "fields": record })
        };

        if params.is_create() {
            let path = object.create_path.as_deref().unwrap_or(&object.path);
            Ok(HttpRequest::json(Method::POST, cx.url(path)?.build(), body))
        } else {
            let path = object.record_path(&params.record_id);
            Ok(HttpRequest::json(object.update_method, cx.url(&path)?.build(), body))
        }
    }
}

fn is_jira_issues(cx: &HookContext<'_>, object: &str) -> bool {
    cx.module.id() == JIRA && object == ISSUES
}

/// Pick the site matching the workspace (by name or subdomain), or the
/// first site when no workspace was given
fn select_site<'a>(sites: &'a [JsonValue], workspace: Option<&str>) -> Result<&'a JsonValue> {
    let Some(workspace) = workspace.filter(|w| !w.is_empty()) else {
        return sites
            .first()
            .ok_or_else(|| Error::config("no Atlassian sites are accessible with this token"));
    };

    let subdomain = format!("https://{}.", workspace.to_ascii_lowercase());
    sites
        .iter()
        .find(|site| {
            let name = site.get("name").and_then(JsonValue::as_str).unwrap_or_default();
            let url = site.get("url").and_then(JsonValue::as_str).unwrap_or_default();
            name.eq_ignore_ascii_case(workspace) || url.to_ascii_lowercase().starts_with(&subdomain)
        })
        .ok_or_else(|| Error::config(format!("no accessible Atlassian site matches workspace '{workspace}'")))
}

// ============================================================================
// JQL
// ============================================================================

struct JqlQuery<'a> {
    object: &'a str,
    filter: Option<&'a Filter>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    page_size: Option<usize>,
    fields: &'a BTreeSet<String>,
}

impl JqlQuery<'_> {
    fn jql(&self, cx: &HookContext<'_>) -> Result<String> {
        let object = cx.object(self.object)?;
        let mut clauses = Vec::new();

        if let Some(config) = &object.incremental {
            let window = Window::resolve(Some(config), self.since, self.until, cx.now);
            if let Some(since) = window.since {
                clauses.push(format!("{} >= \"{}\"", config.since_param, config.format.format(since)));
            }
            if let Some(until) = window.until {
                clauses.push(format!("{} < \"{}\"", config.since_param, config.format.format(until)));
            }
        }

        if let Some(filter) = self.filter {
            let rendered = Dialect::Jql.render(filter)?;
            if clauses.is_empty() {
                clauses.push(rendered);
            } else {
                clauses.push(format!("({rendered})"));
            }
        }

        let mut jql = clauses.join(" AND ");
        if !jql.is_empty() {
            jql.push(' ');
        }
        jql.push_str("ORDER BY updated ASC");
        Ok(jql)
    }

    fn request(&self, cx: &HookContext<'_>) -> Result<HttpRequest> {
        let object = cx.object(self.object)?;
        let jql = self.jql(cx)?;
        debug!(%jql, "Built JQL");

        let mut url = cx.url(&object.path)?;
        url.with_query_param("jql", jql);
        cx.pagination(self.object)?
            .paginator()
            .first_page(&mut url, cx.page_size(self.page_size));

        let fields: Vec<&str> = self
            .fields
            .iter()
            .map(String::as_str)
            .filter(|f| !ISSUE_TOP_LEVEL.contains(f))
            .collect();
        if !fields.is_empty() {
            url.with_query_param("fields", fields.join(","));
        }

        Ok(HttpRequest::get(url.build()))
    }
}

/// Issues page; projections see the `fields` object merged into the issue
fn issues_response(
    cx: &HookContext<'_>,
    object: &str,
    fields: &BTreeSet<String>,
    request: &HttpRequest,
    response: &HttpResponse,
) -> Result<ReadResult> {
    let schema = cx.object(object)?;
    let pagination = cx.pagination(object)?;
    let mut result = parse_result(
        response,
        |body| records_at(body, &schema.response_key),
        |body, count| pipeline::next_page(pagination, &request.url, response, body, count),
        fields,
    )?;
    for record in &mut result.data {
        record.fields = project(&flatten_issue(&record.raw), fields);
    }
    Ok(result)
}

fn flatten_issue(issue: &JsonObject) -> JsonObject {
    let mut flat = issue.clone();
    if let Some(JsonValue::Object(fields)) = flat.remove("fields") {
        for (key, value) in fields {
            flat.entry(key).or_insert(value);
        }
    }
    flat
}
