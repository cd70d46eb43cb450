//! Pagination types and traits
//!
//! Every strategy turns a response into the absolute URL of the next page.
//! That URL is handed to the caller as the opaque `NextPage` token and sent
//! verbatim on the following call.

use crate::error::Result;
use crate::jsonquery::JsonQuery;
use crate::types::{scalar_to_string, JsonValue};
use crate::urlbuilder::UrlBuilder;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use url::Url;

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// Absolute URL of the next page
    Url(String),
    /// No more pages
    Done,
}

impl NextPage {
    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// The caller-facing token: the URL, or empty when done
    pub fn into_token(self) -> String {
        match self {
            Self::Url(url) => url,
            Self::Done => String::new(),
        }
    }
}

/// Everything a strategy may inspect after a page was fetched
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    /// URL the page was fetched from
    pub request_url: &'a Url,
    /// Parsed response body
    pub body: &'a JsonValue,
    /// Response headers
    pub headers: &'a HeaderMap,
    /// Number of records extracted from the page
    pub records: usize,
}

impl PageContext<'_> {
    /// First value selected by a dotted path in the body
    pub fn value_at(&self, path: &str) -> Result<Option<JsonValue>> {
        let mut values = JsonQuery::new(self.body).select(path)?;
        Ok(if values.is_empty() { None } else { Some(values.swap_remove(0)) })
    }

    /// Scalar at a path rendered as a string; empty strings count as absent
    pub fn string_at(&self, path: &str) -> Result<Option<String>> {
        Ok(self
            .value_at(path)?
            .as_ref()
            .and_then(scalar_to_string)
            .filter(|s| !s.is_empty()))
    }

    /// Integer at a path; numeric strings are accepted
    pub fn integer_at(&self, path: &str) -> Result<Option<i64>> {
        Ok(self.value_at(path)?.and_then(|v| match v {
            JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }))
    }

    /// Boolean at a path
    pub fn bool_at(&self, path: &str) -> Result<Option<bool>> {
        Ok(self.value_at(path)?.and_then(|v| v.as_bool()))
    }

    /// Current value of a query parameter on the request URL
    pub fn query_param(&self, key: &str) -> Option<String> {
        self.request_url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// The request URL with one query parameter replaced
    pub fn request_with_param(&self, key: &str, value: &str) -> Result<String> {
        let mut url = UrlBuilder::new(self.request_url.as_str())?;
        url.with_query_param(key, value);
        Ok(url.to_string())
    }
}

/// Declarative pagination configuration, as stored in the schema tables
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationConfig {
    /// Single page
    #[default]
    None,

    /// Page number in the query; stops at the reported page count
    PageNumber {
        /// Query parameter carrying the page number
        #[serde(default = "default_page_param")]
        page_param: String,
        /// Query parameter carrying the page size
        #[serde(default)]
        size_param: Option<String>,
        /// First page number
        #[serde(default = "default_start_page")]
        start_page: i64,
        /// Body path of the current page number
        #[serde(default)]
        current_path: Option<String>,
        /// Body path of the total page count
        #[serde(default)]
        total_path: Option<String>,
    },

    /// Offset and limit in the query
    Offset {
        /// Query parameter carrying the offset
        #[serde(default = "default_offset_param")]
        offset_param: String,
        /// Query parameter carrying the limit
        #[serde(default = "default_limit_param")]
        limit_param: String,
        /// Body path of the total record count
        #[serde(default)]
        total_path: Option<String>,
    },

    /// Cursor or next link in the body. Relative links resolve against
    /// the request URL.
    Cursor {
        /// Body path of the cursor or next URL
        next_path: String,
        /// Query parameter the cursor goes into; `None` means the value is a URL
        #[serde(default)]
        cursor_param: Option<String>,
        /// When set, the value at `next_path` is a URL and the cursor is this
        /// query parameter of it
        #[serde(default)]
        link_param: Option<String>,
        /// Body path of a "has more" flag
        #[serde(default)]
        has_more_path: Option<String>,
        /// Body path of a "done" flag
        #[serde(default)]
        done_path: Option<String>,
        /// Query parameter carrying the page size
        #[serde(default)]
        size_param: Option<String>,
    },

    /// RFC 5988 `Link` header
    LinkHeader {
        /// Rel to follow
        #[serde(default = "default_rel")]
        rel: String,
        /// Query parameter carrying the page size
        #[serde(default)]
        size_param: Option<String>,
    },

    /// Page token echoed back in the query
    PageToken {
        /// Query parameter the token goes into
        token_param: String,
        /// Body path of the token
        token_path: String,
        /// Query parameter carrying the page size
        #[serde(default)]
        size_param: Option<String>,
        /// Stop when a page has no records even if a token is present
        #[serde(default = "default_true")]
        stop_on_empty: bool,
    },
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_start_page() -> i64 {
    1
}

fn default_offset_param() -> String {
    "offset".to_string()
}

fn default_limit_param() -> String {
    "limit".to_string()
}

fn default_rel() -> String {
    "next".to_string()
}

fn default_true() -> bool {
    true
}

/// Core trait for pagination strategies
pub trait Paginator: Send + Sync {
    /// Add first-page query parameters
    fn first_page(&self, url: &mut UrlBuilder, page_size: Option<usize>);

    /// Compute the next page from a fetched page
    fn next_page(&self, page: &PageContext<'_>) -> Result<NextPage>;
}
