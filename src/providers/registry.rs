//! Built-in provider catalog embedded in the binary
//!
//! Every provider is one YAML document under `catalog/`. Documents are parsed
//! and validated once, on first access, and shared read-only afterwards.

use super::info::ProviderInfo;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::warn;

/// Embedded catalog sources
const CATALOG_SOURCES: &[(&str, &str)] = &[
    ("aha", include_str!("catalog/aha.yaml")),
    ("atlassian", include_str!("catalog/atlassian.yaml")),
    ("brevo", include_str!("catalog/brevo.yaml")),
    ("github", include_str!("catalog/github.yaml")),
    ("marketo", include_str!("catalog/marketo.yaml")),
    ("salesforce", include_str!("catalog/salesforce.yaml")),
    ("zendesk", include_str!("catalog/zendesk.yaml")),
];

type Entry = std::result::Result<ProviderInfo, String>;

static REGISTRY: LazyLock<BTreeMap<&'static str, Entry>> = LazyLock::new(|| {
    CATALOG_SOURCES
        .iter()
        .map(|(name, yaml)| {
            let entry = parse_info(yaml).and_then(|info| {
                if info.name == *name {
                    Ok(info)
                } else {
                    Err(Error::config(format!(
                        "catalog entry '{name}' declares name '{}'",
                        info.name
                    )))
                }
            });
            if let Err(e) = &entry {
                warn!(provider = name, error = %e, "Invalid provider catalog entry");
            }
            (*name, entry.map_err(|e| e.to_string()))
        })
        .collect()
});

/// Parse and validate a provider descriptor from YAML
pub fn parse_info(yaml: &str) -> Result<ProviderInfo> {
    let info: ProviderInfo = serde_yaml::from_str(yaml)?;
    info.validate()?;
    Ok(info)
}

/// Look up a provider
pub fn read_info(provider: &str) -> Result<&'static ProviderInfo> {
    match REGISTRY.get(provider) {
        Some(Ok(info)) => Ok(info),
        Some(Err(message)) => Err(Error::config(format!(
            "provider '{provider}' has an invalid catalog entry: {message}"
        ))),
        None => Err(Error::config(format!(
            "unknown provider '{provider}'. Known providers: {}",
            list_providers().join(", ")
        ))),
    }
}

/// Names of all registered providers, sorted
pub fn list_providers() -> Vec<&'static str> {
    REGISTRY.keys().copied().collect()
}

/// Header name and value carrying `key` for an API-key-header provider
pub fn get_api_key_header(provider: &str, key: &str) -> Result<(String, String)> {
    let info = read_info(provider)?;
    match info.api_key_placement()? {
        crate::auth::ApiKeyPlacement::Header { name, prefix } => {
            Ok((name, format!("{}{key}", prefix.unwrap_or_default())))
        }
        crate::auth::ApiKeyPlacement::Query { .. } => Err(Error::config(format!(
            "{provider} takes its API key as a query parameter"
        ))),
    }
}
