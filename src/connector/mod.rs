//! Operation pipeline
//!
//! Uniform Read/Write/Delete/Search/ListObjectMetadata/Subscribe contract
//! over every provider.
//!
//! # Overview
//!
//! The connector module provides:
//! - `Connector` - The provider-agnostic operation interface
//! - `ProviderConnector` - Catalog entry + schema + hooks composed into a connector
//! - `ProviderHooks` - Per-provider request builders and response parsers
//! - `pipeline` - Default builders and the generic `parse_result`

mod hooks;
pub mod pipeline;
mod types;

pub use hooks::{DefaultHooks, HookContext, PostAuthEnv, ProviderHooks};
pub use types::{
    ConnectorParams, DeleteParams, DeleteResult, FieldMetadata, Filter, FilterOperator,
    ListObjectMetadataResult, ObjectMetadata, PostAuthInfo, ReadParams, ReadRecord, ReadResult,
    SearchParams, WriteParams, WriteResult,
};

use crate::auth::AuthenticatedClient;
use crate::cancel::CancellationToken;
use crate::error::{Error, ErrorKind, Result};
use crate::http::{HttpRequest, HttpResponse, RequestBody};
use crate::providers::{self, ProviderInfo};
use crate::resolver::ResolvedModule;
use crate::schema::{infer_fields, provider_schema, ProviderSchema};
use crate::subscription::{SubscribeParams, SubscriptionManager, SubscriptionResult, SubscriptionState};
use crate::types::{JsonValue, Method, Operation};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

// ============================================================================
// Connector Trait
// ============================================================================

/// Provider-agnostic operation interface
#[async_trait]
pub trait Connector: Send + Sync {
    /// Provider name
    fn provider(&self) -> &str;

    /// Active module id
    fn module(&self) -> &str;

    /// Values known after authentication, discovering them if needed
    async fn get_post_auth_info(&self, ctx: &CancellationToken) -> Result<PostAuthInfo>;

    /// Read one page of an object
    async fn read(&self, ctx: &CancellationToken, params: &ReadParams) -> Result<ReadResult>;

    /// Create (empty record id) or update a record
    async fn write(&self, ctx: &CancellationToken, params: &WriteParams) -> Result<WriteResult>;

    /// Delete a record; a record that is already gone counts as deleted
    async fn delete(&self, ctx: &CancellationToken, params: &DeleteParams) -> Result<DeleteResult>;

    /// Search one page of an object
    async fn search(&self, ctx: &CancellationToken, params: &SearchParams) -> Result<ReadResult>;

    /// Describe objects, collecting per-object failures
    async fn list_object_metadata(
        &self,
        ctx: &CancellationToken,
        objects: &[String],
    ) -> Result<ListObjectMetadataResult>;

    /// Create a webhook subscription
    async fn subscribe(&self, ctx: &CancellationToken, params: &SubscribeParams) -> Result<SubscriptionResult>;

    /// Change a subscription
    async fn update_subscription(
        &self,
        ctx: &CancellationToken,
        params: &SubscribeParams,
        previous: &SubscriptionState,
    ) -> Result<SubscriptionResult>;

    /// Remove a subscription
    async fn delete_subscription(&self, ctx: &CancellationToken, state: &SubscriptionState) -> Result<()>;
}

// ============================================================================
// Provider Connector
// ============================================================================

/// A connector for one provider and module
pub struct ProviderConnector {
    info: &'static ProviderInfo,
    schema: &'static ProviderSchema,
    hooks: Arc<dyn ProviderHooks>,
    client: AuthenticatedClient,
    module: ResolvedModule,
    workspace: Option<String>,
    discovered: OnceCell<(ResolvedModule, PostAuthInfo)>,
}

/// Construct a connector for a registered provider
pub fn new_connector(provider: &str, params: ConnectorParams) -> Result<ProviderConnector> {
    let info = providers::read_info(provider)?;
    ProviderConnector::new(info, providers::hooks_for(provider), params)
}

impl ProviderConnector {
    /// Compose a connector from a catalog entry and hooks.
    ///
    /// Construction errors (`MissingAuthClient`, `MissingWorkspace`,
    /// `MissingParam`, `InvalidConfiguration`) surface here.
    pub fn new(info: &'static ProviderInfo, hooks: Arc<dyn ProviderHooks>, params: ConnectorParams) -> Result<Self> {
        let client = params.client.ok_or(Error::MissingAuthClient)?;
        let module = ResolvedModule::resolve(
            info,
            params.module.as_deref(),
            params.workspace.as_deref(),
            &params.metadata,
            params.base_url_override.as_deref(),
        )?;
        let schema = provider_schema(&info.name)?;
        schema.module(module.id())?;

        let client = match hooks.interpreter() {
            Some(interpreter) => client.with_interpreter(interpreter),
            None => client,
        };

        info!(provider = %info.name, module = module.id(), "Created connector");
        Ok(Self {
            info,
            schema,
            hooks,
            client,
            module,
            workspace: params.workspace,
            discovered: OnceCell::new(),
        })
    }

    /// Catalog entry
    pub fn info(&self) -> &'static ProviderInfo {
        self.info
    }

    /// Object tables
    pub fn schema(&self) -> &'static ProviderSchema {
        self.schema
    }

    /// Authenticated client used for every request
    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    /// Hooks of this provider
    pub fn hooks(&self) -> &dyn ProviderHooks {
        self.hooks.as_ref()
    }

    /// Module as resolved at construction
    pub fn resolved_module(&self) -> &ResolvedModule {
        &self.module
    }

    /// Object names of the active module
    pub fn object_names(&self) -> Vec<&'static str> {
        self.schema.object_names(self.module.id()).unwrap_or_default()
    }

    /// Module with every post-auth value known, running introspection once
    pub async fn ready_module(&self, ctx: &CancellationToken) -> Result<&ResolvedModule> {
        if self.module.is_ready() {
            return Ok(&self.module);
        }
        let (module, _) = self
            .discovered
            .get_or_try_init(|| async {
                debug!(pending = ?self.module.pending(), "Running post-auth introspection");
                let env = PostAuthEnv {
                    info: self.info,
                    module: &self.module,
                    client: &self.client,
                    workspace: self.workspace.as_deref(),
                };
                let discovered = self.hooks.post_auth_info(ctx, &env).await?;
                let module = self.module.with_discovered(&discovered.values)?;
                Ok::<_, Error>((module, discovered))
            })
            .await?;
        Ok(module)
    }

    /// Hook context for the given module
    pub fn context<'a>(&self, module: &'a ResolvedModule) -> HookContext<'a> {
        HookContext {
            info: self.info,
            schema: self.schema,
            module,
            now: Utc::now(),
        }
    }

    /// Send a request with the provider's fixed headers
    pub async fn send(&self, ctx: &CancellationToken, request: &HttpRequest) -> Result<HttpResponse> {
        if self.info.headers.is_empty() {
            return self.client.send(ctx, request).await;
        }
        let mut request = request.clone();
        for (name, value) in &self.info.headers {
            if request.header(name).is_none() {
                request.set_header(name.as_str(), value.as_str());
            }
        }
        self.client.send(ctx, &request).await
    }

    /// Send an arbitrary request under the module base URL
    #[instrument(skip_all, fields(provider = %self.info.name, method = %method, path = %path))]
    pub async fn proxy(
        &self,
        ctx: &CancellationToken,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
    ) -> Result<HttpResponse> {
        self.check_provider_support(Operation::Proxy, path)?;
        let module = self.ready_module(ctx).await?;
        let url = module.url(path)?.build();
        let body = body.map_or(RequestBody::Empty, RequestBody::Json);
        self.send(ctx, &HttpRequest::new(method, url).with_body(body)).await
    }

    // ------------------------------------------------------------------------
    // Support checks and naming
    // ------------------------------------------------------------------------

    fn check_provider_support(&self, op: Operation, object: &str) -> Result<()> {
        if self.info.support_for(self.module.id()).supports(op) {
            Ok(())
        } else {
            Err(Error::not_supported(object, op.to_string()))
        }
    }

    /// Provider-native object name: taken as given when the schema knows it,
    /// otherwise passed through the provider's naming rules
    pub fn object_name(&self, raw: &str) -> Result<String> {
        if raw.is_empty() {
            return Err(Error::MissingObjects);
        }
        if self.schema.object(self.module.id(), raw).is_ok() {
            return Ok(raw.to_string());
        }
        Ok(self.info.naming.normalize_object(raw))
    }

    fn supported_object(&self, raw: &str, op: Operation) -> Result<String> {
        let name = self.object_name(raw)?;
        self.check_provider_support(op, &name)?;
        let object = self.schema.object(self.module.id(), &name)?;
        if !object.supports(op) {
            return Err(Error::not_supported(&name, op.to_string()));
        }
        Ok(name)
    }

    fn normalize_fields(&self, fields: &BTreeSet<String>) -> BTreeSet<String> {
        fields.iter().map(|f| self.info.naming.normalize_field(f)).collect()
    }

    // ------------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------------

    async fn object_metadata(&self, ctx: &CancellationToken, raw: &str) -> Result<ObjectMetadata> {
        let name = self.supported_object(raw, Operation::Metadata)?;
        let module = self.ready_module(ctx).await?;
        let cx = self.context(module);
        let object = cx.object(&name)?;

        if let Some(request) = self.hooks.build_metadata_request(&cx, &name)? {
            let response = self.send(ctx, &request).await?;
            return self.hooks.parse_metadata_response(&cx, &name, &response);
        }

        if !object.fields.is_empty() {
            let fields = object
                .fields
                .iter()
                .map(|(field, schema)| {
                    let meta = FieldMetadata {
                        display_name: schema.display_name.clone(),
                        value_type: schema.value_type,
                    };
                    (field.clone(), meta)
                })
                .collect();
            return Ok(ObjectMetadata::new(&object.display_name, fields));
        }

        // Sample one record and derive the fields from its keys
        let params = ReadParams::new(&name).page_size(1);
        let request = self.hooks.build_read_request(&cx, &params)?;
        let response = self.send(ctx, &request).await?;
        let page = self.hooks.parse_read_response(&cx, &params, &request, &response)?;
        let Some(sample) = page.data.first() else {
            return Err(Error::missing_value(format!("{name}: no record to sample fields from")));
        };

        let fields: BTreeMap<String, FieldMetadata> = infer_fields(std::slice::from_ref(&sample.raw))
            .into_iter()
            .map(|(field, schema)| {
                let meta = FieldMetadata {
                    display_name: schema.display_name,
                    value_type: schema.value_type,
                };
                (field, meta)
            })
            .collect();
        Ok(ObjectMetadata::new(&object.display_name, fields))
    }
}

impl fmt::Debug for ProviderConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConnector")
            .field("provider", &self.info.name)
            .field("module", &self.module.id())
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connector for ProviderConnector {
    fn provider(&self) -> &str {
        &self.info.name
    }

    fn module(&self) -> &str {
        self.module.id()
    }

    async fn get_post_auth_info(&self, ctx: &CancellationToken) -> Result<PostAuthInfo> {
        let module = self.ready_module(ctx).await?;
        if let Some((_, discovered)) = self.discovered.get() {
            return Ok(discovered.clone());
        }
        Ok(PostAuthInfo {
            values: module.values().clone(),
            raw: None,
        })
    }

    #[instrument(skip_all, fields(provider = %self.info.name, object = %params.object_name))]
    async fn read(&self, ctx: &CancellationToken, params: &ReadParams) -> Result<ReadResult> {
        let mut params = params.clone();
        params.object_name = self.supported_object(&params.object_name, Operation::Read)?;
        params.fields = self.normalize_fields(&params.fields);

        let module = self.ready_module(ctx).await?;
        let cx = self.context(module);
        let request = self.hooks.build_read_request(&cx, &params)?;
        let response = self.send(ctx, &request).await?;
        let result = self.hooks.parse_read_response(&cx, &params, &request, &response)?;

        debug!(rows = result.rows, done = result.done, "Read page");
        Ok(result)
    }

    #[instrument(skip_all, fields(provider = %self.info.name, object = %params.object_name, create = params.is_create()))]
    async fn write(&self, ctx: &CancellationToken, params: &WriteParams) -> Result<WriteResult> {
        let mut params = params.clone();
        params.object_name = self.supported_object(&params.object_name, Operation::Write)?;

        let module = self.ready_module(ctx).await?;
        let cx = self.context(module);
        let request = self.hooks.build_write_request(&cx, &params)?;
        let response = self.send(ctx, &request).await?;
        self.hooks.parse_write_response(&cx, &params, &response)
    }

    #[instrument(skip_all, fields(provider = %self.info.name, object = %params.object_name))]
    async fn delete(&self, ctx: &CancellationToken, params: &DeleteParams) -> Result<DeleteResult> {
        if params.record_id.is_empty() {
            return Err(Error::missing_param("record_id"));
        }
        let mut params = params.clone();
        params.object_name = self.supported_object(&params.object_name, Operation::Delete)?;

        let module = self.ready_module(ctx).await?;
        let cx = self.context(module);
        let request = self.hooks.build_delete_request(&cx, &params)?;
        match self.send(ctx, &request).await {
            Ok(_) => Ok(DeleteResult { success: true }),
            Err(err) if err.is(ErrorKind::NotFound) => {
                debug!(record_id = %params.record_id, "Record already gone, treating delete as done");
                Ok(DeleteResult { success: true })
            }
            Err(err) => Err(err),
        }
    }

    #[instrument(skip_all, fields(provider = %self.info.name, object = %params.object_name))]
    async fn search(&self, ctx: &CancellationToken, params: &SearchParams) -> Result<ReadResult> {
        let mut params = params.clone();
        params.object_name = self.supported_object(&params.object_name, Operation::Search)?;
        params.fields = self.normalize_fields(&params.fields);
        let naming = self.info.naming;
        params.filter = params
            .filter
            .as_ref()
            .map(|f| f.map_fields(&|field| naming.normalize_field(field)));

        let module = self.ready_module(ctx).await?;
        let cx = self.context(module);
        let request = self.hooks.build_search_request(&cx, &params)?;
        let response = self.send(ctx, &request).await?;
        self.hooks.parse_search_response(&cx, &params, &request, &response)
    }

    #[instrument(skip_all, fields(provider = %self.info.name, objects = objects.len()))]
    async fn list_object_metadata(
        &self,
        ctx: &CancellationToken,
        objects: &[String],
    ) -> Result<ListObjectMetadataResult> {
        if objects.is_empty() {
            return Err(Error::MissingObjects);
        }

        let outcomes = join_all(objects.iter().map(|name| async move {
            (name.clone(), self.object_metadata(ctx, name).await)
        }))
        .await;

        let mut result = ListObjectMetadataResult::default();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(metadata) => {
                    result.result.insert(name, metadata);
                }
                Err(err) => {
                    warn!(object = %name, kind = ?err.kind(), error = %err, "Metadata lookup failed");
                    result.errors.insert(name, err);
                }
            }
        }

        if result.result.is_empty() {
            if let Some(name) = objects.first() {
                if let Some(err) = result.errors.remove(name) {
                    return Err(err);
                }
            }
        }
        Ok(result)
    }

    async fn subscribe(&self, ctx: &CancellationToken, params: &SubscribeParams) -> Result<SubscriptionResult> {
        SubscriptionManager::new(self).subscribe(ctx, params).await
    }

    async fn update_subscription(
        &self,
        ctx: &CancellationToken,
        params: &SubscribeParams,
        previous: &SubscriptionState,
    ) -> Result<SubscriptionResult> {
        SubscriptionManager::new(self).update(ctx, params, previous).await
    }

    async fn delete_subscription(&self, ctx: &CancellationToken, state: &SubscriptionState) -> Result<()> {
        SubscriptionManager::new(self).delete(ctx, state).await
    }
}
