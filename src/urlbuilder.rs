//! URL construction
//!
//! Composes a base URL, path segments and query parameters. Every path piece
//! is escaped on its own, empty pieces are dropped and exactly one slash
//! separates components. Setting a query key that already exists replaces
//! its value in place.

use crate::error::{Error, Result};
use std::fmt;
use url::form_urlencoded;
use url::Url;

/// Builder for request URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlBuilder {
    base: Url,
    query: Vec<(String, String)>,
}

impl UrlBuilder {
    /// Parse a base URL. Any query string on it is kept as initial parameters.
    pub fn new(base: &str) -> Result<Self> {
        let mut url = Url::parse(base)
            .map_err(|e| Error::config(format!("invalid base URL '{base}': {e}")))?;
        if url.cannot_be_a_base() {
            return Err(Error::config(format!(
                "URL '{base}' cannot be used as a base"
            )));
        }

        let query = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.set_query(None);
        url.set_fragment(None);

        Ok(Self { base: url, query })
    }

    /// Parse a base URL and append path segments
    pub fn with_path<S: AsRef<str>>(base: &str, segments: &[S]) -> Result<Self> {
        let mut builder = Self::new(base)?;
        builder.add_path(segments);
        Ok(builder)
    }

    /// Append path segments.
    ///
    /// A segment containing `/` contributes one piece per component, so
    /// `"api/v2"` and `["api", "v2"]` are equivalent.
    pub fn add_path<S: AsRef<str>>(&mut self, segments: &[S]) -> &mut Self {
        let pieces: Vec<&str> = segments
            .iter()
            .flat_map(|s| s.as_ref().split('/'))
            .filter(|p| !p.is_empty())
            .collect();

        if pieces.is_empty() {
            return self;
        }

        if let Ok(mut path) = self.base.path_segments_mut() {
            path.pop_if_empty().extend(pieces);
        }
        self
    }

    /// Set a query parameter, replacing every earlier value for the key
    pub fn with_query_param(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();

        match self.query.iter().position(|(k, _)| *k == key) {
            Some(first) => {
                self.query[first].1 = value;
                let mut index = 0;
                self.query.retain(|(k, _)| {
                    let keep = index <= first || *k != key;
                    index += 1;
                    keep
                });
            }
            None => self.query.push((key, value)),
        }
        self
    }

    /// Remove a query parameter
    pub fn remove_query_param(&mut self, key: &str) -> &mut Self {
        self.query.retain(|(k, _)| k != key);
        self
    }

    /// Current value of a query parameter
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The URL path (without query)
    pub fn path(&self) -> &str {
        self.base.path()
    }

    /// Build the final URL
    pub fn build(&self) -> Url {
        let mut url = self.base.clone();
        if !self.query.is_empty() {
            let encoded = self
                .query
                .iter()
                .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&encoded));
        }
        url
    }
}

impl fmt::Display for UrlBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.build())
    }
}

/// Percent-encode a query component (spaces become `%20`, not `+`)
pub fn encode_component(raw: &str) -> String {
    form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
