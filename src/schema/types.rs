//! Schema store types
//!
//! One [`ProviderSchema`] per provider, split by module. Each object entry
//! tells the pipeline where the object lives, where its records sit in a
//! response and which operations and filters it accepts.

use crate::pagination::{IncrementalConfig, PaginationConfig};
use crate::types::{JsonValue, Method, Operation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

impl JsonType {
    /// Type of a JSON value
    pub fn of(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => JsonType::Null,
            JsonValue::Bool(_) => JsonType::Boolean,
            JsonValue::Number(n) if n.is_i64() || n.is_u64() => JsonType::Integer,
            JsonValue::Number(_) => JsonType::Number,
            JsonValue::String(_) => JsonType::String,
            JsonValue::Array(_) => JsonType::Array,
            JsonValue::Object(_) => JsonType::Object,
        }
    }

    /// Merge two types, returning the more general type
    pub fn merge_with(self, other: JsonType) -> JsonType {
        match (self, other) {
            (a, b) if a == b => a,
            (JsonType::Null, other) | (other, JsonType::Null) => other,
            (JsonType::Integer, JsonType::Number) | (JsonType::Number, JsonType::Integer) => {
                JsonType::Number
            }
            // Incompatible types - fall back to string
            _ => JsonType::String,
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonType::String => write!(f, "string"),
            JsonType::Number => write!(f, "number"),
            JsonType::Integer => write!(f, "integer"),
            JsonType::Boolean => write!(f, "boolean"),
            JsonType::Object => write!(f, "object"),
            JsonType::Array => write!(f, "array"),
            JsonType::Null => write!(f, "null"),
        }
    }
}

/// A declared field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Human-readable name
    pub display_name: String,
    /// Value type
    #[serde(rename = "type", default)]
    pub value_type: JsonType,
}

/// A declared object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSchema {
    /// Human-readable name
    pub display_name: String,

    /// Collection path relative to the module base URL
    pub path: String,

    /// Single-record path; `{id}` is the record id. Defaults to `<path>/{id}`.
    #[serde(default)]
    pub record_path: Option<String>,

    /// Create path when it differs from `path`; placeholders are filled from
    /// the record being written
    #[serde(default)]
    pub create_path: Option<String>,

    /// Key holding the record array in a read response; empty means the
    /// response root is the array
    #[serde(default)]
    pub response_key: String,

    /// Operations the object accepts
    #[serde(default = "default_operations")]
    pub operations: Vec<Operation>,

    /// Static field list used for metadata
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSchema>,

    /// Server-side time filtering
    #[serde(default)]
    pub incremental: Option<IncrementalConfig>,

    /// Pagination override for this object
    #[serde(default)]
    pub pagination: Option<PaginationConfig>,

    /// Key the record is wrapped in on write (`{"ticket": {...}}`)
    #[serde(default)]
    pub write_wrapper: Option<String>,

    /// Method used for updates
    #[serde(default = "default_update_method")]
    pub update_method: Method,

    /// Search endpoint when it differs from `path`
    #[serde(default)]
    pub search_path: Option<String>,

    /// Key holding the record array in a search response
    #[serde(default)]
    pub search_response_key: Option<String>,

    /// Field holding the record id
    #[serde(default = "default_id_field")]
    pub id_field: String,
}

fn default_operations() -> Vec<Operation> {
    vec![Operation::Read, Operation::Metadata]
}

fn default_update_method() -> Method {
    Method::PATCH
}

fn default_id_field() -> String {
    "id".to_string()
}

impl ObjectSchema {
    /// Whether the object accepts an operation
    pub fn supports(&self, op: Operation) -> bool {
        self.operations.contains(&op)
    }

    /// Whether `since`/`until` are applied server-side
    pub fn supports_incremental(&self) -> bool {
        self.incremental.is_some()
    }

    /// Path of a single record
    pub fn record_path(&self, id: &str) -> String {
        match &self.record_path {
            Some(template) => template.replace("{id}", id),
            None => format!("{}/{id}", self.path.trim_end_matches('/')),
        }
    }

    /// Field name to display name
    pub fn fields_map(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .map(|(name, field)| (name.clone(), field.display_name.clone()))
            .collect()
    }
}

/// Objects of one module
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModuleSchema {
    /// Default pagination for the module's objects
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Largest page size the API accepts
    #[serde(default)]
    pub max_page_size: Option<usize>,

    /// Objects keyed by provider-native name
    #[serde(default)]
    pub objects: BTreeMap<String, ObjectSchema>,
}

/// Schema of one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSchema {
    /// Provider name
    pub provider: String,
    /// Modules keyed by id
    pub modules: BTreeMap<String, ModuleSchema>,
}
