//! Materialized HTTP responses

use crate::error::{Error, Result};
use crate::types::JsonValue;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use std::borrow::Cow;
use std::sync::OnceLock;
use url::Url;

/// A response whose body has been read into memory.
///
/// The JSON root is parsed on first access and cached.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw body bytes
    pub body: Bytes,
    /// Final URL of the request (after redirects)
    pub url: Url,
    json: OnceLock<std::result::Result<JsonValue, String>>,
}

impl HttpResponse {
    /// Create a response
    pub fn new(status: u16, headers: HeaderMap, body: Bytes, url: Url) -> Self {
        Self {
            status,
            headers,
            body,
            url,
            json: OnceLock::new(),
        }
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text (lossy)
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Header value as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Parsed JSON root. An empty body parses as `null`.
    pub fn json(&self) -> Result<&JsonValue> {
        let parsed = self.json.get_or_init(|| {
            if self.body.iter().all(u8::is_ascii_whitespace) {
                return Ok(JsonValue::Null);
            }
            serde_json::from_slice(&self.body).map_err(|e| e.to_string())
        });

        parsed
            .as_ref()
            .map_err(|message| Error::unmarshal(format!("response is not valid JSON: {message}")))
    }
}
