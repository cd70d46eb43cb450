//! Module and metadata resolution
//!
//! Picks the active module of a provider, checks that every post-auth input
//! the module needs is present, and renders the module base URL. Inputs the
//! provider discovers through introspection stay pending until the
//! connector's first call supplies them.

use crate::error::{Error, Result};
use crate::providers::{InputLifecycle, ProviderInfo, ROOT_MODULE};
use crate::template;
use crate::types::StringMap;
use crate::urlbuilder::UrlBuilder;
use tracing::debug;
use url::Url;

/// Active module of a connector with its post-auth values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModule {
    provider: String,
    id: String,
    base_url_template: String,
    values: StringMap,
    pending: Vec<String>,
    base_url_override: Option<Url>,
}

impl ResolvedModule {
    /// Resolve the module a connector will use.
    ///
    /// Selection order: explicit module, then the provider default, then the
    /// only declared module, then the root module.
    pub fn resolve(
        info: &ProviderInfo,
        module: Option<&str>,
        workspace: Option<&str>,
        metadata: &StringMap,
        base_url_override: Option<&str>,
    ) -> Result<Self> {
        let id = select_module(info, module)?;

        let base_url_template = info
            .module(&id)
            .map_or_else(|| info.base_url.clone(), |m| m.base_url.clone());

        let mut values = metadata.clone();
        if let Some(workspace) = workspace.filter(|w| !w.is_empty()) {
            values.insert("workspace".to_string(), workspace.to_string());
        }

        let mut pending = Vec::new();
        for input in info.metadata_inputs.iter().filter(|i| i.applies_to(&id)) {
            if values.get(&input.name).is_some_and(|v| !v.is_empty()) {
                continue;
            }
            match input.lifecycle {
                InputLifecycle::RequiredBeforeFirstCall if input.name == "workspace" => {
                    return Err(Error::MissingWorkspace {
                        provider: info.name.clone(),
                    });
                }
                InputLifecycle::RequiredBeforeFirstCall => {
                    return Err(Error::missing_param(input.name.clone()));
                }
                InputLifecycle::DiscoveredViaIntrospection => pending.push(input.name.clone()),
            }
        }

        let base_url_override = base_url_override
            .map(|raw| {
                Url::parse(raw).map_err(|e| Error::config(format!("invalid base URL override '{raw}': {e}")))
            })
            .transpose()?;

        let resolved = Self {
            provider: info.name.clone(),
            id,
            base_url_template,
            values,
            pending,
            base_url_override,
        };

        if resolved.is_ready() {
            resolved.base_url()?;
        }
        debug!(provider = %resolved.provider, module = %resolved.id, pending = ?resolved.pending, "Resolved module");
        Ok(resolved)
    }

    /// Id of the module a connector would use, without checking inputs
    pub fn select(info: &ProviderInfo, module: Option<&str>) -> Result<String> {
        select_module(info, module)
    }

    /// Module id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Provider name
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Known post-auth values (workspace included)
    pub fn values(&self) -> &StringMap {
        &self.values
    }

    /// A post-auth value
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Inputs still waiting for introspection
    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    /// Whether every input the module needs is known
    pub fn is_ready(&self) -> bool {
        self.pending.is_empty()
    }

    /// Copy with discovered values merged in.
    ///
    /// Fails with `MissingParam` when a pending input was not discovered.
    pub fn with_discovered(&self, discovered: &StringMap) -> Result<Self> {
        let mut next = self.clone();
        for (name, value) in discovered {
            next.values.entry(name.clone()).or_insert_with(|| value.clone());
        }
        next.pending.retain(|name| !next.values.get(name).is_some_and(|v| !v.is_empty()));
        if let Some(name) = next.pending.first() {
            return Err(Error::missing_param(name.clone()));
        }
        next.base_url()?;
        Ok(next)
    }

    /// Module base URL with placeholders substituted
    pub fn base_url(&self) -> Result<String> {
        let rendered = template::render(&self.base_url_template, &self.values)?;
        self.rebase(&rendered)
    }

    /// Builder for a path under the module base URL
    pub fn url(&self, path: &str) -> Result<UrlBuilder> {
        UrlBuilder::with_path(&self.base_url()?, &[path])
    }

    /// Rewrite the origin of a URL when a base URL override is configured.
    ///
    /// The override's path is prefixed to the original path, so
    /// `https://api.atlassian.com/ex/jira/1` under `http://127.0.0.1:9000/mock`
    /// becomes `http://127.0.0.1:9000/mock/ex/jira/1`.
    pub fn rebase(&self, raw: &str) -> Result<String> {
        let Some(base) = &self.base_url_override else {
            return Ok(raw.to_string());
        };
        let original = Url::parse(raw).map_err(|e| Error::config(format!("invalid URL '{raw}': {e}")))?;

        let mut rebased = base.clone();
        let prefix = base.path().trim_end_matches('/');
        let path = original.path().trim_start_matches('/');
        rebased.set_path(&format!("{prefix}/{path}"));
        rebased.set_query(original.query());

        let mut out = rebased.to_string();
        if path.is_empty() && original.query().is_none() {
            out = out.trim_end_matches('/').to_string();
        }
        Ok(out)
    }
}

fn select_module(info: &ProviderInfo, requested: Option<&str>) -> Result<String> {
    if let Some(module) = requested.filter(|m| !m.is_empty()) {
        let known = info.modules.contains_key(module) || (info.modules.is_empty() && module == ROOT_MODULE);
        if !known {
            return Err(Error::config(format!(
                "{}: unknown module '{module}'",
                info.name
            )));
        }
        return Ok(module.to_string());
    }
    if let Some(default) = &info.default_module {
        return Ok(default.clone());
    }
    if info.modules.len() == 1 {
        if let Some(only) = info.modules.keys().next() {
            return Ok(only.clone());
        }
    }
    Ok(ROOT_MODULE.to_string())
}
