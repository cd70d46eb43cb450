//! Operation parameters and results

use crate::auth::AuthenticatedClient;
use crate::error::{Error, Result};
use crate::schema::JsonType;
use crate::types::{JsonObject, JsonValue, StringMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ============================================================================
// Connector Params
// ============================================================================

/// Per-session configuration given to a connector constructor
#[derive(Debug, Clone, Default)]
pub struct ConnectorParams {
    /// Authenticated HTTP client
    pub client: Option<AuthenticatedClient>,
    /// Module id; defaults to the provider's default module
    pub module: Option<String>,
    /// Provider-specific tenant (subdomain, instance, region)
    pub workspace: Option<String>,
    /// Post-auth metadata (`cloudId`, ...)
    pub metadata: StringMap,
    /// Origin that replaces the provider's API origin (tests, proxies)
    pub base_url_override: Option<String>,
}

impl ConnectorParams {
    /// Params with an authenticated client
    pub fn new(client: AuthenticatedClient) -> Self {
        Self {
            client: Some(client),
            ..Self::default()
        }
    }

    /// Select a module
    #[must_use]
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Set the workspace
    #[must_use]
    pub fn workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    /// Add a metadata value
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Redirect every request to another origin
    #[must_use]
    pub fn base_url_override(mut self, url: impl Into<String>) -> Self {
        self.base_url_override = Some(url.into());
        self
    }
}

// ============================================================================
// Search Filters
// ============================================================================

/// Comparison operator of a filter condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    In,
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterOperator::Eq => "eq",
            FilterOperator::NotEq => "not_eq",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::Contains => "contains",
            FilterOperator::In => "in",
        };
        f.write_str(name)
    }
}

/// Search filter tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Single comparison
    Condition {
        field: String,
        operator: FilterOperator,
        value: JsonValue,
    },
    /// Every child must match
    And(Vec<Filter>),
    /// Any child may match
    Or(Vec<Filter>),
}

impl Filter {
    /// `field == value`
    pub fn eq(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::condition(field, FilterOperator::Eq, value)
    }

    /// A comparison
    pub fn condition(field: impl Into<String>, operator: FilterOperator, value: impl Into<JsonValue>) -> Self {
        Filter::Condition {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Flatten a conjunction into its conditions.
    ///
    /// Fails with `InvalidConfiguration` when the tree contains an `Or`.
    pub fn conjunction(&self) -> Result<Vec<(&str, FilterOperator, &JsonValue)>> {
        let mut out = Vec::new();
        self.collect_conjunction(&mut out)?;
        Ok(out)
    }

    fn collect_conjunction<'a>(&'a self, out: &mut Vec<(&'a str, FilterOperator, &'a JsonValue)>) -> Result<()> {
        match self {
            Filter::Condition { field, operator, value } => {
                out.push((field.as_str(), *operator, value));
                Ok(())
            }
            Filter::And(children) => children.iter().try_for_each(|c| c.collect_conjunction(out)),
            Filter::Or(_) => Err(Error::config("this provider cannot search with OR filters")),
        }
    }

    /// Copy with every field name passed through `f`
    #[must_use]
    pub fn map_fields(&self, f: &impl Fn(&str) -> String) -> Self {
        match self {
            Filter::Condition { field, operator, value } => Filter::Condition {
                field: f(field),
                operator: *operator,
                value: value.clone(),
            },
            Filter::And(children) => Filter::And(children.iter().map(|c| c.map_fields(f)).collect()),
            Filter::Or(children) => Filter::Or(children.iter().map(|c| c.map_fields(f)).collect()),
        }
    }
}

// ============================================================================
// Operation Params
// ============================================================================

/// Read parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadParams {
    /// Object to read
    pub object_name: String,
    /// Fields to project into `ReadRecord::fields`
    pub fields: BTreeSet<String>,
    /// Only records updated at or after this instant
    pub since: Option<DateTime<Utc>>,
    /// Only records updated before this instant
    pub until: Option<DateTime<Utc>>,
    /// Requested page size
    pub page_size: Option<usize>,
    /// Token returned by the previous page; empty for the first page
    pub next_page: String,
}

impl ReadParams {
    /// Read the first page of an object
    pub fn new(object_name: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
            ..Self::default()
        }
    }

    /// Project these fields
    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Lower time bound
    #[must_use]
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Upper time bound
    #[must_use]
    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    /// Page size
    #[must_use]
    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Continue from a previous page
    #[must_use]
    pub fn next_page(mut self, token: impl Into<String>) -> Self {
        self.next_page = token.into();
        self
    }
}

/// Write parameters; an empty `record_id` creates a record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteParams {
    pub object_name: String,
    pub record_id: String,
    pub record_data: JsonValue,
}

impl WriteParams {
    /// Create a record
    pub fn create(object_name: impl Into<String>, record_data: JsonValue) -> Self {
        Self {
            object_name: object_name.into(),
            record_id: String::new(),
            record_data,
        }
    }

    /// Update a record
    pub fn update(object_name: impl Into<String>, record_id: impl Into<String>, record_data: JsonValue) -> Self {
        Self {
            object_name: object_name.into(),
            record_id: record_id.into(),
            record_data,
        }
    }

    /// Whether this write creates a record
    pub fn is_create(&self) -> bool {
        self.record_id.is_empty()
    }
}

/// Delete parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteParams {
    pub object_name: String,
    pub record_id: String,
}

impl DeleteParams {
    /// Delete a record
    pub fn new(object_name: impl Into<String>, record_id: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
            record_id: record_id.into(),
        }
    }
}

/// Search parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams {
    pub object_name: String,
    pub fields: BTreeSet<String>,
    pub filter: Option<Filter>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub page_size: Option<usize>,
    pub next_page: String,
}

impl SearchParams {
    /// Search an object
    pub fn new(object_name: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
            ..Self::default()
        }
    }

    /// Project these fields
    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Filter tree
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Lower time bound
    #[must_use]
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Continue from a previous page
    #[must_use]
    pub fn next_page(mut self, token: impl Into<String>) -> Self {
        self.next_page = token.into();
        self
    }

    /// The same query expressed as read parameters
    pub fn as_read(&self) -> ReadParams {
        ReadParams {
            object_name: self.object_name.clone(),
            fields: self.fields.clone(),
            since: self.since,
            until: self.until,
            page_size: self.page_size,
            next_page: self.next_page.clone(),
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// One record of a read
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReadRecord {
    /// Requested projection
    pub fields: JsonObject,
    /// The full upstream record
    pub raw: JsonObject,
}

/// A page of records
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReadResult {
    /// Number of records on this page
    pub rows: usize,
    /// Records
    pub data: Vec<ReadRecord>,
    /// Token for the next page; empty when done
    pub next_page: String,
    /// Whether this was the last page
    pub done: bool,
}

/// Outcome of a write
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WriteResult {
    pub success: bool,
    pub record_id: String,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub data: JsonObject,
}

/// Outcome of a delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeleteResult {
    pub success: bool,
}

/// A field in object metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMetadata {
    pub display_name: String,
    pub value_type: JsonType,
}

/// Metadata of one object
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub display_name: String,
    /// Field name to display name
    pub fields_map: BTreeMap<String, String>,
    /// Field name to typed metadata
    pub fields: BTreeMap<String, FieldMetadata>,
}

impl ObjectMetadata {
    /// Build from typed fields; `fields_map` is derived
    pub fn new(display_name: impl Into<String>, fields: BTreeMap<String, FieldMetadata>) -> Self {
        let fields_map = fields
            .iter()
            .map(|(name, field)| (name.clone(), field.display_name.clone()))
            .collect();
        Self {
            display_name: display_name.into(),
            fields_map,
            fields,
        }
    }
}

/// Metadata of several objects; per-object failures are collected
#[derive(Debug, Default)]
pub struct ListObjectMetadataResult {
    pub result: BTreeMap<String, ObjectMetadata>,
    pub errors: BTreeMap<String, Error>,
}

/// Values discovered after authentication
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostAuthInfo {
    /// Discovered metadata (`cloudId`, ...)
    pub values: StringMap,
    /// Raw introspection payload
    #[serde(default)]
    pub raw: Option<JsonValue>,
}
