//! CLI runner - executes commands

use crate::cancel::CancellationToken;
use crate::cli::commands::{Cli, Commands};
use crate::connector::{new_connector, Connector, ProviderConnector, ReadParams};
use crate::credentials::CredentialsFile;
use crate::providers::{list_providers, read_info};
use crate::schema::provider_schema;
use crate::resolver::ResolvedModule;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use tracing::{debug, info};

/// Options of the `read` command
#[derive(Debug, Clone, Default)]
struct ReadOptions {
    fields: Vec<String>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    page_size: Option<usize>,
    next_page: Option<String>,
    pages: Option<usize>,
}

/// CLI runner
pub struct Runner {
    cli: Cli,
    ctx: CancellationToken,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            ctx: CancellationToken::new(),
        }
    }

    /// Token cancelled when the process is interrupted
    pub fn cancellation(&self) -> CancellationToken {
        self.ctx.clone()
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Providers => self.providers(),
            Commands::Objects { provider, module } => self.objects(provider, module.as_deref()),
            Commands::Read {
                provider,
                object,
                credentials,
                module,
                fields,
                since,
                until,
                page_size,
                next_page,
                pages,
            } => {
                let options = ReadOptions {
                    fields: fields.clone(),
                    since: *since,
                    until: *until,
                    page_size: *page_size,
                    next_page: next_page.clone(),
                    pages: *pages,
                };
                self.read(provider, object, credentials, module.as_deref(), options)
                    .await
            }
            Commands::Metadata {
                provider,
                objects,
                credentials,
                module,
            } => {
                self.metadata(provider, objects, credentials, module.as_deref())
                    .await
            }
        }
    }

    fn emit(&self, value: &impl Serialize) -> Result<()> {
        let out = if self.cli.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        println!("{out}");
        Ok(())
    }

    fn connector(&self, provider: &str, credentials: &Path, module: Option<&str>) -> Result<ProviderConnector> {
        let info = read_info(provider)?;
        let file = CredentialsFile::from_file(credentials)?;
        let mut params = file.connector_params(info)?;
        if let Some(module) = module {
            params = params.module(module);
        }
        new_connector(provider, params).with_context(|| format!("failed to create {provider} connector"))
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// List registered providers
    fn providers(&self) -> Result<()> {
        let providers: Vec<Value> = list_providers()
            .into_iter()
            .filter_map(|name| read_info(name).ok())
            .map(|info| {
                json!({
                    "name": info.name,
                    "display_name": info.display_name,
                    "auth": info.auth,
                    "modules": info.modules.keys().collect::<Vec<_>>(),
                    "default_module": info.default_module,
                })
            })
            .collect();
        self.emit(&providers)
    }

    /// List the objects of a module with their supported operations
    fn objects(&self, provider: &str, module: Option<&str>) -> Result<()> {
        let info = read_info(provider)?;
        let schema = provider_schema(provider)?;
        let module = ResolvedModule::select(info, module)?;

        let objects: Vec<Value> = schema
            .object_names(&module)?
            .into_iter()
            .map(|name| {
                let object = schema.object(&module, name)?;
                Ok(json!({
                    "name": name,
                    "display_name": object.display_name,
                    "operations": object.operations,
                    "incremental": object.supports_incremental(),
                }))
            })
            .collect::<crate::Result<_>>()?;

        self.emit(&json!({ "provider": provider, "module": module, "objects": objects }))
    }

    /// Read pages of an object, one JSON line per page
    async fn read(
        &self,
        provider: &str,
        object: &str,
        credentials: &Path,
        module: Option<&str>,
        options: ReadOptions,
    ) -> Result<()> {
        let connector = self.connector(provider, credentials, module)?;

        let mut params = ReadParams::new(object).fields(options.fields);
        params.since = options.since;
        params.until = options.until;
        params.page_size = options.page_size;
        params.next_page = options.next_page.unwrap_or_default();

        let max_pages = options.pages.unwrap_or(1).max(1);
        let mut total = 0;
        for page_number in 1..=max_pages {
            let page = connector
                .read(&self.ctx, &params)
                .await
                .with_context(|| format!("failed to read {provider} {object}"))?;
            total += page.rows;
            debug!(page = page_number, rows = page.rows, "Read page");
            self.emit(&page)?;

            if page.done {
                break;
            }
            params.next_page = page.next_page;
        }

        info!(provider, object, records = total, "Read complete");
        Ok(())
    }

    /// Describe objects; per-object failures are reported beside the results
    async fn metadata(&self, provider: &str, objects: &[String], credentials: &Path, module: Option<&str>) -> Result<()> {
        let connector = self.connector(provider, credentials, module)?;
        let result = connector
            .list_object_metadata(&self.ctx, objects)
            .await
            .with_context(|| format!("failed to describe {provider} objects"))?;

        let errors: serde_json::Map<String, Value> = result
            .errors
            .iter()
            .map(|(name, err)| (name.clone(), json!(err.to_string())))
            .collect();
        self.emit(&json!({ "result": result.result, "errors": errors }))
    }
}
