//! Credentials files
//!
//! A JSON document with well-known keys, read by the CLI and by tests to
//! build an [`AuthenticatedClient`] for a provider:
//!
//! ```json
//! {
//!   "clientId": "...",
//!   "clientSecret": "...",
//!   "accessToken": "...",
//!   "refreshToken": "...",
//!   "workspace": "acme",
//!   "metadata": { "cloudId": "..." }
//! }
//! ```
//!
//! Unknown keys are ignored.

use crate::auth::{AuthenticatedClient, Credentials, OAuth2Config, OAuth2Token};
use crate::connector::ConnectorParams;
use crate::error::{Error, Result, ResultExt};
use crate::http::HttpClient;
use crate::providers::{AuthScheme, ProviderInfo};
use crate::template;
use crate::types::StringMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Contents of a credentials file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsFile {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Absolute expiry of `access_token`
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Secret paired with an API key (signing providers)
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub workspace: Option<String>,
    /// Post-auth metadata (`cloudId`, ...)
    #[serde(default)]
    pub metadata: StringMap,
}

impl CredentialsFile {
    /// Parse a credentials document
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::config(format!("invalid credentials file: {e}")))
    }

    /// Read a credentials file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read credentials from {}", path.display()))?;
        debug!(path = %path.display(), "Loaded credentials file");
        Self::from_json(&raw)
    }

    /// Credentials for the provider's authentication scheme
    pub fn credentials(&self, info: &ProviderInfo) -> Result<Credentials> {
        match info.auth {
            AuthScheme::Oauth2AuthorizationCode => {
                let config = self.oauth2_config(info)?;
                let token = OAuth2Token::new(
                    required(&self.access_token, "accessToken")?,
                    self.refresh_token.clone(),
                    self.expiry,
                );
                Ok(Credentials::OAuth2AuthCode { config, token })
            }
            AuthScheme::Oauth2ClientCredentials => Ok(Credentials::OAuth2ClientCredentials {
                config: self.oauth2_config(info)?,
            }),
            AuthScheme::ApiKeyHeader | AuthScheme::ApiKeyQuery => Ok(Credentials::ApiKey {
                key: required(&self.api_key, "apiKey")?,
                placement: info.api_key_placement()?,
            }),
            AuthScheme::Basic => Ok(Credentials::Basic {
                username: required(&self.username, "username")?,
                password: self.password.clone().unwrap_or_default(),
            }),
            AuthScheme::Custom => Err(Error::not_implemented(format!(
                "credentials files for {}",
                info.name
            ))),
        }
    }

    /// An authenticated client for the provider
    pub fn client(&self, info: &ProviderInfo) -> Result<AuthenticatedClient> {
        Ok(AuthenticatedClient::new(HttpClient::new(), self.credentials(info)?))
    }

    /// Connector params with client, workspace and metadata filled in
    pub fn connector_params(&self, info: &ProviderInfo) -> Result<ConnectorParams> {
        let mut params = ConnectorParams::new(self.client(info)?);
        if let Some(workspace) = self.workspace.as_deref().filter(|w| !w.is_empty()) {
            params = params.workspace(workspace);
        }
        for (key, value) in &self.metadata {
            params = params.metadata(key.as_str(), value.as_str());
        }
        Ok(params)
    }

    fn oauth2_config(&self, info: &ProviderInfo) -> Result<OAuth2Config> {
        let opts = info
            .oauth2
            .as_ref()
            .ok_or_else(|| Error::config(format!("{} has no OAuth2 endpoints", info.name)))?;

        let mut vars = self.metadata.clone();
        if let Some(workspace) = &self.workspace {
            vars.insert("workspace".to_string(), workspace.clone());
        }
        let token_url = template::render(&opts.token_url, &vars)?;

        Ok(OAuth2Config::new(
            self.client_id.clone().unwrap_or_default(),
            self.client_secret.clone().unwrap_or_default(),
            token_url,
        )
        .with_scopes(opts.scopes.clone()))
    }
}

fn required(value: &Option<String>, key: &str) -> Result<String> {
    value
        .clone()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::missing_param(key))
}
