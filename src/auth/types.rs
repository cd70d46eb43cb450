//! Credential types
//!
//! Credentials are opaque to the operation pipeline; only the authenticated
//! client looks inside them.

use crate::error::Result;
use crate::http::HttpRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Seconds before the stated expiry at which a token is treated as expired
const EXPIRY_BUFFER_SECONDS: i64 = 30;

/// OAuth2 token as issued by a provider
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2Token {
    /// Bearer access token
    pub access_token: String,
    /// Refresh token, when the grant issued one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute expiry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    /// Token type reported by the provider (usually `Bearer`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl OAuth2Token {
    /// Create a token
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expiry: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expiry,
            token_type: None,
        }
    }

    /// Create a token that expires `seconds` from now
    pub fn expires_in(access_token: impl Into<String>, refresh_token: Option<String>, seconds: i64) -> Self {
        Self::new(
            access_token,
            refresh_token,
            Some(Utc::now() + chrono::Duration::seconds(seconds)),
        )
    }

    /// Check if the token is expired (with 30 second buffer)
    pub fn is_expired(&self) -> bool {
        match self.expiry {
            Some(expiry) => Utc::now() + chrono::Duration::seconds(EXPIRY_BUFFER_SECONDS) >= expiry,
            None => false,
        }
    }
}

impl fmt::Debug for OAuth2Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Token")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expiry", &self.expiry)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// OAuth2 client registration
#[derive(Clone, PartialEq, Eq)]
pub struct OAuth2Config {
    /// Client ID
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
    /// Token endpoint URL
    pub token_url: String,
    /// Requested scopes
    pub scopes: Vec<String>,
}

impl OAuth2Config {
    /// Create a config with no scopes
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: token_url.into(),
            scopes: Vec::new(),
        }
    }

    /// Set the requested scopes
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }
}

impl fmt::Debug for OAuth2Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Config")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_url", &self.token_url)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Where an API key goes on the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiKeyPlacement {
    /// Named header, value optionally prefixed (e.g. `Bearer `)
    Header {
        /// Header name
        name: String,
        /// Prefix placed before the key
        prefix: Option<String>,
    },
    /// Named query parameter
    Query {
        /// Parameter name
        param: String,
    },
}

/// Caller-provided request modifier that runs after the request is built
pub trait RequestSigner: Send + Sync {
    /// Modify the request in place (headers, query or body)
    fn sign(&self, request: &mut HttpRequest) -> Result<()>;
}

/// Credential variants understood by the authenticated client
#[derive(Clone)]
pub enum Credentials {
    /// OAuth2 authorization-code grant with a refreshable token
    OAuth2AuthCode {
        /// Client registration
        config: OAuth2Config,
        /// Current token
        token: OAuth2Token,
    },
    /// OAuth2 client-credentials grant; the token is fetched lazily
    OAuth2ClientCredentials {
        /// Client registration
        config: OAuth2Config,
    },
    /// Static API key
    ApiKey {
        /// The key
        key: String,
        /// Where it goes
        placement: ApiKeyPlacement,
    },
    /// HTTP basic authentication
    Basic {
        /// Username
        username: String,
        /// Password
        password: String,
    },
    /// Fixed headers on every request
    CustomHeaders(Vec<(String, String)>),
    /// Arbitrary request signing
    Custom(Arc<dyn RequestSigner>),
}

impl Credentials {
    /// Whether these credentials use OAuth2 bearer tokens
    pub fn uses_oauth2(&self) -> bool {
        matches!(
            self,
            Credentials::OAuth2AuthCode { .. } | Credentials::OAuth2ClientCredentials { .. }
        )
    }

    /// Short name of the variant, safe to log
    pub fn scheme(&self) -> &'static str {
        match self {
            Credentials::OAuth2AuthCode { .. } => "oauth2-authorization-code",
            Credentials::OAuth2ClientCredentials { .. } => "oauth2-client-credentials",
            Credentials::ApiKey {
                placement: ApiKeyPlacement::Header { .. },
                ..
            } => "api-key-header",
            Credentials::ApiKey {
                placement: ApiKeyPlacement::Query { .. },
                ..
            } => "api-key-query",
            Credentials::Basic { .. } => "basic",
            Credentials::CustomHeaders(_) | Credentials::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("scheme", &self.scheme())
            .finish_non_exhaustive()
    }
}

/// Callback invoked with every newly issued token so callers can persist it
pub type TokenListener = Arc<dyn Fn(&OAuth2Token) + Send + Sync>;
