//! Provider descriptors
//!
//! A [`ProviderInfo`] is the immutable catalog entry for one provider: where
//! its API lives, how it authenticates, which modules it exposes and which
//! operations it supports.

use crate::auth::ApiKeyPlacement;
use crate::error::{Error, Result};
use crate::naming::NamingRules;
use crate::types::Operation;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Module id used by providers that expose a single API surface
pub const ROOT_MODULE: &str = "root";

/// Authentication scheme declared by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthScheme {
    /// OAuth2 authorization-code grant
    Oauth2AuthorizationCode,
    /// OAuth2 client-credentials grant
    Oauth2ClientCredentials,
    /// API key in a header
    ApiKeyHeader,
    /// API key in a query parameter
    ApiKeyQuery,
    /// HTTP basic
    Basic,
    /// Provider-specific signing
    Custom,
}

impl AuthScheme {
    /// Whether the scheme uses OAuth2 endpoints
    pub fn is_oauth2(self) -> bool {
        matches!(
            self,
            AuthScheme::Oauth2AuthorizationCode | AuthScheme::Oauth2ClientCredentials
        )
    }
}

/// OAuth2 endpoints and default scopes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2Opts {
    /// Authorization endpoint (authorization-code grant only)
    #[serde(default)]
    pub auth_url: Option<String>,
    /// Token endpoint; may contain placeholders such as `{workspace}`
    pub token_url: String,
    /// Default scopes
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// API key placement options
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApiKeyOpts {
    /// Header carrying the key
    #[serde(default)]
    pub header_name: Option<String>,
    /// Query parameter carrying the key
    #[serde(default)]
    pub query_param: Option<String>,
    /// Prefix placed before the key (e.g. `Bearer `)
    #[serde(default)]
    pub value_prefix: Option<String>,
}

/// When a metadata input becomes available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputLifecycle {
    /// Caller must supply it when constructing the connector
    RequiredBeforeFirstCall,
    /// The connector discovers it through an introspection call
    DiscoveredViaIntrospection,
}

/// A named value the provider needs after authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataInput {
    /// Input name, also the URL placeholder name (`workspace`, `cloudId`...)
    pub name: String,
    /// When the value becomes known
    pub lifecycle: InputLifecycle,
    /// Modules that need the value; empty means every module
    #[serde(default)]
    pub module_dependencies: Vec<String>,
}

impl MetadataInput {
    /// Whether the active module needs this input
    pub fn applies_to(&self, module: &str) -> bool {
        self.module_dependencies.is_empty() || self.module_dependencies.iter().any(|m| m == module)
    }
}

/// Operations supported by a provider or module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Support {
    pub read: bool,
    pub write: bool,
    pub delete: bool,
    pub search: bool,
    pub subscribe: bool,
    pub metadata: bool,
    pub proxy: bool,
}

impl Support {
    /// Whether the operation is supported
    pub fn supports(&self, op: Operation) -> bool {
        match op {
            Operation::Read => self.read,
            Operation::Write => self.write,
            Operation::Delete => self.delete,
            Operation::Search => self.search,
            Operation::Subscribe => self.subscribe,
            Operation::Metadata => self.metadata,
            Operation::Proxy => self.proxy,
        }
    }
}

/// A sub-API of a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Display name
    pub display_name: String,
    /// Base URL of the module; may contain placeholders
    pub base_url: String,
    /// Module-level support matrix; falls back to the provider's
    #[serde(default)]
    pub support: Option<Support>,
}

/// Immutable descriptor of one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Provider name (registry key)
    pub name: String,
    /// Display name
    pub display_name: String,
    /// Provider-level base URL; may contain placeholders
    pub base_url: String,
    /// Authentication scheme
    pub auth: AuthScheme,
    /// OAuth2 options
    #[serde(default)]
    pub oauth2: Option<OAuth2Opts>,
    /// API key options
    #[serde(default)]
    pub api_key: Option<ApiKeyOpts>,
    /// Values required after authentication
    #[serde(default)]
    pub metadata_inputs: Vec<MetadataInput>,
    /// Modules keyed by id; empty means a single root module at `base_url`
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleInfo>,
    /// Module used when the caller does not pick one
    #[serde(default)]
    pub default_module: Option<String>,
    /// Provider-level support matrix
    #[serde(default)]
    pub support: Support,
    /// Headers sent with every request to this provider
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Object and field naming
    #[serde(default)]
    pub naming: NamingRules,
}

impl ProviderInfo {
    /// Whether the provider exposes more than one module
    pub fn is_multi_module(&self) -> bool {
        self.modules.len() > 1
    }

    /// Look up a module
    pub fn module(&self, id: &str) -> Option<&ModuleInfo> {
        self.modules.get(id)
    }

    /// Support matrix for a module (module override, else provider)
    pub fn support_for(&self, module: &str) -> Support {
        self.module(module)
            .and_then(|m| m.support)
            .unwrap_or(self.support)
    }

    /// Metadata input by name
    pub fn metadata_input(&self, name: &str) -> Option<&MetadataInput> {
        self.metadata_inputs.iter().find(|i| i.name == name)
    }

    /// Whether the caller must supply a workspace
    pub fn requires_workspace(&self) -> bool {
        self.metadata_input("workspace")
            .is_some_and(|i| i.lifecycle == InputLifecycle::RequiredBeforeFirstCall)
    }

    /// Where this provider expects an API key
    pub fn api_key_placement(&self) -> Result<ApiKeyPlacement> {
        let opts = self.api_key.clone().unwrap_or_default();
        match self.auth {
            AuthScheme::ApiKeyHeader => Ok(ApiKeyPlacement::Header {
                name: opts
                    .header_name
                    .ok_or_else(|| Error::config(format!("{}: api_key.header_name is not set", self.name)))?,
                prefix: opts.value_prefix,
            }),
            AuthScheme::ApiKeyQuery => Ok(ApiKeyPlacement::Query {
                param: opts
                    .query_param
                    .ok_or_else(|| Error::config(format!("{}: api_key.query_param is not set", self.name)))?,
            }),
            other => Err(Error::config(format!(
                "{} authenticates with {other:?}, not an API key",
                self.name
            ))),
        }
    }

    /// Check catalog invariants
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::config("provider name cannot be empty"));
        }
        if self.base_url.is_empty() {
            return Err(Error::config(format!("{}: base_url cannot be empty", self.name)));
        }

        if let Some(default) = &self.default_module {
            if !self.modules.contains_key(default) {
                return Err(Error::config(format!(
                    "{}: default module '{default}' is not declared",
                    self.name
                )));
            }
        } else if self.is_multi_module() {
            return Err(Error::config(format!(
                "{}: multi-module provider must declare a default module",
                self.name
            )));
        }

        let mut seen = BTreeSet::new();
        for input in &self.metadata_inputs {
            if !seen.insert(input.name.as_str()) {
                return Err(Error::config(format!(
                    "{}: metadata input '{}' declared twice",
                    self.name, input.name
                )));
            }
            if self.is_multi_module() && input.module_dependencies.is_empty() {
                return Err(Error::config(format!(
                    "{}: metadata input '{}' must declare module dependencies",
                    self.name, input.name
                )));
            }
            if let Some(unknown) = input
                .module_dependencies
                .iter()
                .find(|m| !self.modules.contains_key(*m) && m.as_str() != ROOT_MODULE)
            {
                return Err(Error::config(format!(
                    "{}: metadata input '{}' depends on unknown module '{unknown}'",
                    self.name, input.name
                )));
            }
        }

        if self.auth.is_oauth2() && self.oauth2.is_none() {
            return Err(Error::config(format!(
                "{}: OAuth2 provider must declare oauth2 options",
                self.name
            )));
        }
        if matches!(self.auth, AuthScheme::ApiKeyHeader | AuthScheme::ApiKeyQuery) {
            self.api_key_placement()?;
        }

        Ok(())
    }
}
