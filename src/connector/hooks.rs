//! Provider hooks
//!
//! A provider is a catalog entry plus a [`ProviderHooks`] implementation.
//! Every hook has a default built from the schema store, so a provider only
//! overrides the operations whose wire shape diverges from the common
//! REST conventions.

use super::pipeline;
use super::types::{
    DeleteParams, ObjectMetadata, PostAuthInfo, ReadParams, ReadResult, SearchParams, WriteParams,
    WriteResult,
};
use crate::auth::AuthenticatedClient;
use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse, ResponseInterpreter};
use crate::pagination::PaginationConfig;
use crate::providers::ProviderInfo;
use crate::resolver::ResolvedModule;
use crate::schema::{ModuleSchema, ObjectSchema, ProviderSchema};
use crate::subscription::{SubscribeParams, SubscriptionState, UpdateMode};
use crate::types::{scalar_to_string, JsonValue};
use crate::urlbuilder::UrlBuilder;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Everything a hook may consult while building or parsing
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    /// Catalog entry
    pub info: &'static ProviderInfo,
    /// Object tables
    pub schema: &'static ProviderSchema,
    /// Active module with post-auth values
    pub module: &'a ResolvedModule,
    /// Instant the operation started
    pub now: DateTime<Utc>,
}

impl HookContext<'_> {
    /// Schema of the active module
    pub fn module_schema(&self) -> Result<&'static ModuleSchema> {
        self.schema.module(self.module.id())
    }

    /// Schema of an object in the active module
    pub fn object(&self, name: &str) -> Result<&'static ObjectSchema> {
        self.schema.object(self.module.id(), name)
    }

    /// Effective pagination of an object
    pub fn pagination(&self, name: &str) -> Result<&'static PaginationConfig> {
        self.schema.pagination_for(self.module.id(), name)
    }

    /// URL builder under the module base URL
    pub fn url(&self, path: &str) -> Result<UrlBuilder> {
        self.module.url(path)
    }

    /// Requested page size clamped to the module maximum
    pub fn page_size(&self, requested: Option<usize>) -> Option<usize> {
        let max = self.module_schema().ok().and_then(|m| m.max_page_size);
        match (requested, max) {
            (Some(size), Some(max)) => Some(size.clamp(1, max)),
            (Some(size), None) => Some(size.max(1)),
            (None, max) => max,
        }
    }
}

/// Inputs to a post-auth introspection call
#[derive(Debug, Clone, Copy)]
pub struct PostAuthEnv<'a> {
    pub info: &'static ProviderInfo,
    /// Module as resolved at construction (discovered inputs still pending)
    pub module: &'a ResolvedModule,
    pub client: &'a AuthenticatedClient,
    /// Workspace given by the caller, if any
    pub workspace: Option<&'a str>,
}

/// Per-provider request builders and response parsers
#[async_trait]
pub trait ProviderHooks: Send + Sync {
    /// Discover post-auth values. Called once per connector when the active
    /// module has inputs marked as discovered via introspection.
    async fn post_auth_info(&self, _ctx: &CancellationToken, _env: &PostAuthEnv<'_>) -> Result<PostAuthInfo> {
        Ok(PostAuthInfo::default())
    }

    /// Interpreter for error envelopes inside 2xx responses
    fn interpreter(&self) -> Option<Arc<dyn ResponseInterpreter>> {
        None
    }

    // ------------------------------------------------------------------------
    // Read / Search
    // ------------------------------------------------------------------------

    fn build_read_request(&self, cx: &HookContext<'_>, params: &ReadParams) -> Result<HttpRequest> {
        pipeline::read_request(cx, params)
    }

    fn parse_read_response(
        &self,
        cx: &HookContext<'_>,
        params: &ReadParams,
        request: &HttpRequest,
        response: &HttpResponse,
    ) -> Result<ReadResult> {
        pipeline::read_response(cx, params, request, response)
    }

    fn build_search_request(&self, cx: &HookContext<'_>, params: &SearchParams) -> Result<HttpRequest> {
        pipeline::search_request(cx, params)
    }

    fn parse_search_response(
        &self,
        cx: &HookContext<'_>,
        params: &SearchParams,
        request: &HttpRequest,
        response: &HttpResponse,
    ) -> Result<ReadResult> {
        pipeline::search_response(cx, params, request, response)
    }

    // ------------------------------------------------------------------------
    // Write / Delete
    // ------------------------------------------------------------------------

    fn build_write_request(&self, cx: &HookContext<'_>, params: &WriteParams) -> Result<HttpRequest> {
        pipeline::write_request(cx, params)
    }

    fn parse_write_response(
        &self,
        cx: &HookContext<'_>,
        params: &WriteParams,
        response: &HttpResponse,
    ) -> Result<WriteResult> {
        pipeline::write_response(cx, params, response)
    }

    fn build_delete_request(&self, cx: &HookContext<'_>, params: &DeleteParams) -> Result<HttpRequest> {
        pipeline::delete_request(cx, params)
    }

    // ------------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------------

    /// Request describing an object. `None` selects static metadata from
    /// the schema store, or sampling when the schema declares no fields.
    fn build_metadata_request(&self, _cx: &HookContext<'_>, _object: &str) -> Result<Option<HttpRequest>> {
        Ok(None)
    }

    fn parse_metadata_response(
        &self,
        _cx: &HookContext<'_>,
        _object: &str,
        _response: &HttpResponse,
    ) -> Result<ObjectMetadata> {
        Err(Error::not_implemented("describe"))
    }

    // ------------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------------

    fn build_subscribe_request(&self, _cx: &HookContext<'_>, _params: &SubscribeParams) -> Result<HttpRequest> {
        Err(Error::not_implemented("subscribe"))
    }

    fn parse_subscribe_response(
        &self,
        cx: &HookContext<'_>,
        params: &SubscribeParams,
        response: &HttpResponse,
    ) -> Result<SubscriptionState> {
        let body = response.json()?;
        let id = self
            .subscription_id(body)
            .ok_or_else(|| Error::missing_value("id"))?;
        Ok(SubscriptionState::new(&cx.info.name, params, id, body.clone()))
    }

    fn subscription_update_mode(&self) -> UpdateMode {
        UpdateMode::Recreate
    }

    fn build_update_subscription_request(
        &self,
        _cx: &HookContext<'_>,
        _params: &SubscribeParams,
        _previous: &SubscriptionState,
    ) -> Result<HttpRequest> {
        Err(Error::not_implemented("update subscription"))
    }

    fn build_delete_subscription_request(
        &self,
        _cx: &HookContext<'_>,
        _state: &SubscriptionState,
    ) -> Result<HttpRequest> {
        Err(Error::not_implemented("delete subscription"))
    }

    /// Subscription id in a create response or a 409 conflict body
    fn subscription_id(&self, body: &JsonValue) -> Option<String> {
        body.get("id").and_then(scalar_to_string)
    }
}

/// Hooks that use every default
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

#[async_trait]
impl ProviderHooks for DefaultHooks {}
