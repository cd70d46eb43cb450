//! Embedded schema store
//!
//! Per-provider object tables compiled into the binary and parsed once on
//! first access.

use super::types::{FieldSchema, ModuleSchema, ObjectSchema, ProviderSchema};
use crate::error::{Error, Result};
use crate::pagination::PaginationConfig;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::warn;

const SCHEMA_SOURCES: &[(&str, &str)] = &[
    ("aha", include_str!("data/aha.json")),
    ("atlassian", include_str!("data/atlassian.json")),
    ("brevo", include_str!("data/brevo.json")),
    ("github", include_str!("data/github.json")),
    ("marketo", include_str!("data/marketo.json")),
    ("salesforce", include_str!("data/salesforce.json")),
    ("zendesk", include_str!("data/zendesk.json")),
];

type Entry = std::result::Result<ProviderSchema, String>;

static STORE: LazyLock<BTreeMap<&'static str, Entry>> = LazyLock::new(|| {
    SCHEMA_SOURCES
        .iter()
        .map(|(name, json)| {
            let entry = serde_json::from_str::<ProviderSchema>(json)
                .map_err(Error::from)
                .and_then(|schema| {
                    if schema.provider == *name {
                        Ok(schema)
                    } else {
                        Err(Error::config(format!(
                            "schema '{name}' declares provider '{}'",
                            schema.provider
                        )))
                    }
                });
            if let Err(e) = &entry {
                warn!(provider = name, error = %e, "Invalid schema document");
            }
            (*name, entry.map_err(|e| e.to_string()))
        })
        .collect()
});

/// Schema of a provider
pub fn provider_schema(provider: &str) -> Result<&'static ProviderSchema> {
    match STORE.get(provider) {
        Some(Ok(schema)) => Ok(schema),
        Some(Err(message)) => Err(Error::config(format!(
            "provider '{provider}' has an invalid schema: {message}"
        ))),
        None => Err(Error::config(format!("no schema registered for '{provider}'"))),
    }
}

impl ProviderSchema {
    /// Module schema
    pub fn module(&self, module: &str) -> Result<&ModuleSchema> {
        self.modules.get(module).ok_or_else(|| {
            Error::config(format!(
                "{}: module '{module}' has no schema",
                self.provider
            ))
        })
    }

    /// Object schema; unknown objects are `ObjectNotSupported`
    pub fn object(&self, module: &str, object: &str) -> Result<&ObjectSchema> {
        self.module(module)?
            .objects
            .get(object)
            .ok_or_else(|| Error::not_supported(object, format!("module '{module}'")))
    }

    /// Collection URL path of an object
    pub fn lookup_url_path(&self, module: &str, object: &str) -> Result<&str> {
        Ok(&self.object(module, object)?.path)
    }

    /// Response key holding an object's records (empty for a root array)
    pub fn lookup_array_field_name(&self, module: &str, object: &str) -> Result<&str> {
        Ok(&self.object(module, object)?.response_key)
    }

    /// Object names of a module, sorted
    pub fn object_names(&self, module: &str) -> Result<Vec<&str>> {
        Ok(self.module(module)?.objects.keys().map(String::as_str).collect())
    }

    /// Declared fields of an object
    pub fn fields_for(&self, module: &str, object: &str) -> Result<&BTreeMap<String, FieldSchema>> {
        Ok(&self.object(module, object)?.fields)
    }

    /// Effective pagination of an object (object override, else module)
    pub fn pagination_for(&self, module: &str, object: &str) -> Result<&PaginationConfig> {
        let module_schema = self.module(module)?;
        let object_schema = self.object(module, object)?;
        Ok(object_schema
            .pagination
            .as_ref()
            .unwrap_or(&module_schema.pagination))
    }

    /// Whether an object filters `since`/`until` server-side
    pub fn supports_incremental(&self, module: &str, object: &str) -> Result<bool> {
        Ok(self.object(module, object)?.supports_incremental())
    }
}
