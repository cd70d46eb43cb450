//! Common types used throughout connectorkit
//!
//! Shared type aliases, HTTP verbs, time formats and the operation
//! vocabulary used by the provider support matrix.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// Generic key-value map with string keys and values
pub type StringMap = HashMap<String, String>;

// ============================================================================
// HTTP Types
// ============================================================================

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => reqwest::Method::GET,
            Method::POST => reqwest::Method::POST,
            Method::PUT => reqwest::Method::PUT,
            Method::PATCH => reqwest::Method::PATCH,
            Method::DELETE => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::PATCH => "PATCH",
            Method::DELETE => "DELETE",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Operations
// ============================================================================

/// An operation a connector may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Read,
    Write,
    Delete,
    Search,
    Subscribe,
    Metadata,
    Proxy,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Read => "read",
            Operation::Write => "write",
            Operation::Delete => "delete",
            Operation::Search => "search",
            Operation::Subscribe => "subscribe",
            Operation::Metadata => "metadata",
            Operation::Proxy => "proxy",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Time Format
// ============================================================================

/// Wire format of timestamps sent in incremental-sync query parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFormat {
    /// RFC 3339 / ISO 8601 with seconds precision (`2024-01-02T03:04:05Z`)
    #[default]
    Rfc3339,
    /// Unix timestamp (seconds)
    Unix,
    /// Unix timestamp (milliseconds)
    UnixMs,
    /// Calendar date only (`2024-01-02`)
    Date,
    /// Date and minutes, as used by JQL (`2024-01-02 03:04`)
    DateTimeMinutes,
}

impl TimeFormat {
    /// Render a timestamp in this format
    pub fn format(self, at: DateTime<Utc>) -> String {
        match self {
            TimeFormat::Rfc3339 => at.to_rfc3339_opts(SecondsFormat::Secs, true),
            TimeFormat::Unix => at.timestamp().to_string(),
            TimeFormat::UnixMs => at.timestamp_millis().to_string(),
            TimeFormat::Date => at.format("%Y-%m-%d").to_string(),
            TimeFormat::DateTimeMinutes => at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

// ============================================================================
// Utilities
// ============================================================================

/// Render a scalar JSON value as the string a provider expects in a URL or id
pub fn scalar_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
