//! Error types for connectorkit
//!
//! Every public API returns `Result<T, Error>`. Errors are grouped into a
//! finite set of [`ErrorKind`]s so callers can branch on the kind without
//! matching individual variants.

use thiserror::Error;

/// Maximum number of characters of an upstream body kept on an error
pub const BODY_EXCERPT_LIMIT: usize = 512;

/// Classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required parameter or metadata value was not supplied
    MissingParam,
    /// The connector was constructed without an authenticated client
    MissingAuthClient,
    /// The provider needs a workspace and none was supplied
    MissingWorkspace,
    /// An operation that needs object names received none
    MissingObjects,
    /// The object (or the operation on it) is not supported by the provider
    ObjectNotSupported,
    /// Configuration is malformed (bad URL, bad catalog entry, invalid XML name...)
    InvalidConfiguration,
    /// A response did not contain a value the parser requires
    MissingExpectedValues,
    /// A response body could not be decoded
    FailedToUnmarshalBody,
    /// The operation is not implemented for this provider
    NotImplemented,
    /// HTTP 403
    PermissionDenied,
    /// HTTP 404
    NotFound,
    /// HTTP 429
    RateLimited,
    /// HTTP 401 or a failed token refresh
    Unauthorized,
    /// HTTP 5xx
    ServerError,
    /// Network failure before a response was received
    TransportError,
    /// Any other 4xx, or a provider error envelope inside a 2xx
    BadRequest,
    /// The caller cancelled the operation
    Cancelled,
}

/// The main error type for connectorkit
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Construction Errors
    // ============================================================================
    #[error("Missing required parameter: {param}")]
    MissingParam { param: String },

    #[error("Connector requires an authenticated client")]
    MissingAuthClient,

    #[error("Provider '{provider}' requires a workspace")]
    MissingWorkspace { provider: String },

    #[error("At least one object name is required")]
    MissingObjects,

    #[error("Object '{object}' does not support {operation}")]
    ObjectNotSupported { object: String, operation: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Undefined placeholder in template: {variable}")]
    UndefinedVariable { variable: String },

    // ============================================================================
    // Response Decoding Errors
    // ============================================================================
    #[error("Missing expected value: {key}")]
    MissingExpectedValues { key: String },

    #[error("Failed to unmarshal body: {message}")]
    FailedToUnmarshalBody { message: String },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("XML parsing error: {message}")]
    XmlParse { message: String },

    #[error("{operation} is not implemented for this provider")]
    NotImplemented { operation: String },

    // ============================================================================
    // Upstream Errors
    // ============================================================================
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Permission denied (HTTP 403): {body}")]
    PermissionDenied { body: String },

    #[error("Not found (HTTP 404): {body}")]
    NotFound { body: String },

    #[error("Rate limited, retry after {retry_after_seconds:?}s")]
    RateLimited {
        retry_after_seconds: Option<u64>,
        body: String,
    },

    #[error("Server error (HTTP {status}): {body}")]
    ServerError { status: u16, body: String },

    #[error("Bad request (HTTP {status}): {body}")]
    BadRequest { status: u16, body: String },

    /// 409; `payload` is the full response body when it parses as JSON
    #[error("Conflict (HTTP 409): {body}")]
    Conflict {
        body: String,
        payload: Option<serde_json::Value>,
    },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Operation cancelled")]
    Cancelled,

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Wrapped Errors
    // ============================================================================
    #[error("{message}: {source}")]
    Context {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a missing parameter error
    pub fn missing_param(param: impl Into<String>) -> Self {
        Self::MissingParam {
            param: param.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create a missing expected value error
    pub fn missing_value(key: impl Into<String>) -> Self {
        Self::MissingExpectedValues { key: key.into() }
    }

    /// Create an unmarshal error
    pub fn unmarshal(message: impl Into<String>) -> Self {
        Self::FailedToUnmarshalBody {
            message: message.into(),
        }
    }

    /// Create an object-not-supported error
    pub fn not_supported(object: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::ObjectNotSupported {
            object: object.into(),
            operation: operation.into(),
        }
    }

    /// Create a not-implemented error
    pub fn not_implemented(operation: impl Into<String>) -> Self {
        Self::NotImplemented {
            operation: operation.into(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create an XML parse error
    pub fn xml(message: impl Into<String>) -> Self {
        Self::XmlParse {
            message: message.into(),
        }
    }

    /// The taxonomy kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingParam { .. } | Error::UndefinedVariable { .. } => ErrorKind::MissingParam,
            Error::MissingAuthClient => ErrorKind::MissingAuthClient,
            Error::MissingWorkspace { .. } => ErrorKind::MissingWorkspace,
            Error::MissingObjects => ErrorKind::MissingObjects,
            Error::ObjectNotSupported { .. } => ErrorKind::ObjectNotSupported,
            Error::InvalidConfiguration { .. }
            | Error::InvalidUrl(_)
            | Error::YamlParse(_)
            | Error::Io(_) => ErrorKind::InvalidConfiguration,
            Error::MissingExpectedValues { .. } => ErrorKind::MissingExpectedValues,
            Error::FailedToUnmarshalBody { .. } | Error::JsonParse(_) | Error::XmlParse { .. } => {
                ErrorKind::FailedToUnmarshalBody
            }
            Error::NotImplemented { .. } => ErrorKind::NotImplemented,
            Error::Unauthorized { .. } => ErrorKind::Unauthorized,
            Error::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::RateLimited { .. } => ErrorKind::RateLimited,
            Error::ServerError { .. } => ErrorKind::ServerError,
            Error::BadRequest { .. } | Error::Conflict { .. } => ErrorKind::BadRequest,
            Error::Transport(e) if e.is_decode() => ErrorKind::FailedToUnmarshalBody,
            Error::Transport(_) => ErrorKind::TransportError,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Context { source, .. } => source.kind(),
        }
    }

    /// Check whether this error is of the given kind
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == kind
    }

    /// Upstream HTTP status code, when the error came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::PermissionDenied { .. } => Some(403),
            Error::NotFound { .. } => Some(404),
            Error::RateLimited { .. } => Some(429),
            Error::Conflict { .. } => Some(409),
            Error::ServerError { status, .. } | Error::BadRequest { status, .. } => Some(*status),
            Error::Transport(e) => e.status().map(|s| s.as_u16()),
            Error::Context { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Retry-after hint carried by a rate limit error
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Error::RateLimited {
                retry_after_seconds,
                ..
            } => *retry_after_seconds,
            Error::Context { source, .. } => source.retry_after_seconds(),
            _ => None,
        }
    }
}

/// Truncate an upstream body to [`BODY_EXCERPT_LIMIT`] characters
pub fn body_excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.chars().count() <= BODY_EXCERPT_LIMIT {
        return text.into_owned();
    }
    let mut excerpt: String = text.chars().take(BODY_EXCERPT_LIMIT).collect();
    excerpt.push_str("...");
    excerpt
}

/// Result type alias for connectorkit
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Context {
            message: message.into(),
            source: Box::new(e.into()),
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| Error::Context {
            message: f(),
            source: Box::new(e.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("bad base url");
        assert_eq!(err.to_string(), "Invalid configuration: bad base url");

        let err = Error::missing_param("cloudId");
        assert_eq!(err.to_string(), "Missing required parameter: cloudId");

        let err = Error::NotFound {
            body: "gone".to_string(),
        };
        assert_eq!(err.to_string(), "Not found (HTTP 404): gone");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(Error::config("x").kind(), ErrorKind::InvalidConfiguration);
        assert_eq!(Error::missing_value("id").kind(), ErrorKind::MissingExpectedValues);
        assert_eq!(Error::unauthorized("x").kind(), ErrorKind::Unauthorized);
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(
            Error::UndefinedVariable {
                variable: "workspace".to_string()
            }
            .kind(),
            ErrorKind::MissingParam
        );
        assert!(Error::ServerError {
            status: 502,
            body: String::new()
        }
        .is(ErrorKind::ServerError));
    }

    #[test]
    fn test_status_and_retry_after() {
        let err = Error::RateLimited {
            retry_after_seconds: Some(30),
            body: String::new(),
        };
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.retry_after_seconds(), Some(30));
        assert_eq!(Error::config("x").status(), None);
    }

    #[test]
    fn test_context_preserves_kind() {
        let result: Result<()> = Err(Error::NotFound {
            body: String::new(),
        });
        let err = result.context("reading tickets").unwrap_err();
        assert!(err.is(ErrorKind::NotFound));
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().starts_with("reading tickets: Not found"));
    }

    #[test]
    fn test_body_excerpt_truncates() {
        let long = "a".repeat(BODY_EXCERPT_LIMIT + 10);
        let excerpt = body_excerpt(long.as_bytes());
        assert_eq!(excerpt.len(), BODY_EXCERPT_LIMIT + 3);
        assert!(excerpt.ends_with("..."));
        assert_eq!(body_excerpt(b"short"), "short");
    }
}
