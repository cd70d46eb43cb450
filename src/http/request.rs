//! Prepared HTTP requests
//!
//! Provider hooks produce an [`HttpRequest`]; the authenticated client
//! injects credentials into it and the HTTP client sends it. Requests are
//! cheap to clone so a request can be replayed once after a token refresh.

use crate::error::Result;
use crate::types::{JsonValue, Method};
use crate::urlbuilder::UrlBuilder;
use url::Url;

/// Request body encodings supported by the pipeline
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    /// No body
    #[default]
    Empty,
    /// `application/json`
    Json(JsonValue),
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
    /// `text/xml`
    Xml(String),
}

impl RequestBody {
    /// Whether the body is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }

    /// JSON payload, if this is a JSON body
    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            RequestBody::Json(v) => Some(v),
            _ => None,
        }
    }
}

/// A fully prepared request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL including query string
    pub url: Url,
    /// Headers in insertion order (names compared case-insensitively)
    pub headers: Vec<(String, String)>,
    /// Body
    pub body: RequestBody,
}

impl HttpRequest {
    /// Create a request with no headers and no body
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// GET request
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// DELETE request
    pub fn delete(url: Url) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Request with a JSON body
    pub fn json(method: Method, url: Url, body: JsonValue) -> Self {
        Self::new(method, url).with_body(RequestBody::Json(body))
    }

    /// Replace the body
    #[must_use]
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Set a header, replacing any existing value with the same name
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Set a header in place
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    /// Look up a header value
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set a query parameter, replacing earlier values for the key
    pub fn set_query_param(&mut self, key: &str, value: &str) -> Result<()> {
        let mut builder = UrlBuilder::new(self.url.as_str())?;
        builder.with_query_param(key, value);
        self.url = builder.build();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn test_header_replacement_is_case_insensitive() {
        let req = HttpRequest::get(url("https://x.io"))
            .with_header("Authorization", "Bearer a")
            .with_header("authorization", "Bearer b");
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.header("AUTHORIZATION"), Some("Bearer b"));
    }

    #[test]
    fn test_set_query_param() {
        let mut req = HttpRequest::get(url("https://x.io/items?page=1"));
        req.set_query_param("page", "2").unwrap();
        req.set_query_param("api_key", "k 1").unwrap();
        assert_eq!(req.url.as_str(), "https://x.io/items?page=2&api_key=k%201");
    }

    #[test]
    fn test_json_body() {
        let req = HttpRequest::json(Method::POST, url("https://x.io"), json!({"a": 1}));
        assert_eq!(req.body.as_json(), Some(&json!({"a": 1})));
        assert!(!req.body.is_empty());
    }
}
