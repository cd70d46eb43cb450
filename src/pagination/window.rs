//! Incremental-sync windowing
//!
//! Translates a read's `since`/`until` bounds into the query parameters an
//! object understands. Objects without an incremental block ignore both.

use crate::types::TimeFormat;
use crate::urlbuilder::UrlBuilder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Server-side time filtering supported by an object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementalConfig {
    /// Query parameter carrying the lower bound
    pub since_param: String,
    /// Query parameter carrying the upper bound, if the API has one
    #[serde(default)]
    pub until_param: Option<String>,
    /// Wire format of both bounds
    #[serde(default)]
    pub format: TimeFormat,
    /// The API rejects an open interval; `until` defaults to now
    #[serde(default)]
    pub require_closed_interval: bool,
}

/// Effective bounds after defaults were applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl Window {
    /// Resolve the bounds a request should carry
    pub fn resolve(
        config: Option<&IncrementalConfig>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        let Some(config) = config else {
            if since.is_some() || until.is_some() {
                debug!("Object has no server-side time filter, ignoring since/until");
            }
            return Self::default();
        };

        let until = match (since, until) {
            (Some(_), None) if config.require_closed_interval => Some(now),
            (_, until) => until,
        };
        Self { since, until }
    }

    /// Whether neither bound is set
    pub fn is_open(&self) -> bool {
        self.since.is_none() && self.until.is_none()
    }
}

/// Add the window's query parameters to a URL
pub fn apply_window(
    url: &mut UrlBuilder,
    config: Option<&IncrementalConfig>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Window {
    let window = Window::resolve(config, since, until, now);
    if let Some(config) = config {
        if let Some(since) = window.since {
            url.with_query_param(config.since_param.as_str(), config.format.format(since));
        }
        if let (Some(param), Some(until)) = (&config.until_param, window.until) {
            url.with_query_param(param.as_str(), config.format.format(until));
        }
    }
    window
}
