//! Authenticated client
//!
//! Injects credentials into every request and keeps OAuth2 tokens fresh.
//! A single mutex guards the token: the caller that finds it expired
//! refreshes while holding the lock, so concurrent callers wait for that
//! refresh and then observe the new token.

use super::types::{ApiKeyPlacement, Credentials, OAuth2Config, OAuth2Token, TokenListener};
use crate::cancel::CancellationToken;
use crate::error::{Error, ErrorKind, Result};
use crate::http::{HttpClient, HttpRequest, HttpResponse, RequestBody, ResponseInterpreter};
use crate::types::Method;
use base64::Engine;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// HTTP client bound to one set of credentials.
///
/// Clones share the credentials and the token state.
#[derive(Clone)]
pub struct AuthenticatedClient {
    http: HttpClient,
    credentials: Arc<Credentials>,
    token: Arc<Mutex<Option<OAuth2Token>>>,
    listener: Option<TokenListener>,
    interpreter: Option<Arc<dyn ResponseInterpreter>>,
}

impl AuthenticatedClient {
    /// Create a client over the given transport
    pub fn new(http: HttpClient, credentials: Credentials) -> Self {
        let token = match &credentials {
            Credentials::OAuth2AuthCode { token, .. } => Some(token.clone()),
            _ => None,
        };

        Self {
            http,
            credentials: Arc::new(credentials),
            token: Arc::new(Mutex::new(token)),
            listener: None,
            interpreter: None,
        }
    }

    /// Shorthand for an authorization-code client on a default transport
    pub fn oauth2(config: OAuth2Config, token: OAuth2Token) -> Self {
        Self::new(HttpClient::new(), Credentials::OAuth2AuthCode { config, token })
    }

    /// Shorthand for an API-key client on a default transport
    pub fn api_key(key: impl Into<String>, placement: ApiKeyPlacement) -> Self {
        Self::new(
            HttpClient::new(),
            Credentials::ApiKey {
                key: key.into(),
                placement,
            },
        )
    }

    /// Register a callback that receives every refreshed token
    #[must_use]
    pub fn with_token_listener(mut self, listener: TokenListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Copy of this client that inspects 2xx responses for error envelopes.
    ///
    /// The copy shares token state with `self`.
    #[must_use]
    pub fn with_interpreter(&self, interpreter: Arc<dyn ResponseInterpreter>) -> Self {
        let mut client = self.clone();
        client.interpreter = Some(interpreter);
        client
    }

    /// The underlying transport
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// The credentials this client injects
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Snapshot of the current OAuth2 token, if any
    pub async fn token(&self) -> Option<OAuth2Token> {
        self.token.lock().await.clone()
    }

    /// Replace the current token, e.g. after an out-of-band re-authorization
    pub async fn replace_token(&self, token: OAuth2Token) {
        *self.token.lock().await = Some(token);
    }

    /// Send a request with credentials applied.
    ///
    /// An `Unauthorized` outcome on OAuth2 credentials triggers one token
    /// refresh and one retry; a second `Unauthorized` is returned as is.
    #[instrument(skip_all, fields(method = %request.method, url = %request.url, scheme = self.credentials.scheme()))]
    pub async fn send(&self, ctx: &CancellationToken, request: &HttpRequest) -> Result<HttpResponse> {
        let (prepared, access) = self.authorize(ctx, request).await?;

        match self.exchange(ctx, &prepared).await {
            Err(err) if err.is(ErrorKind::Unauthorized) => {
                let Some(stale) = access else {
                    return Err(err);
                };
                debug!("Received Unauthorized, refreshing token and retrying once");
                let fresh = self.force_refresh(ctx, &stale).await?;
                let mut retried = request.clone();
                self.inject(&mut retried, Some(&fresh))?;
                self.exchange(ctx, &retried).await
            }
            other => other,
        }
    }

    /// Apply credentials to a copy of the request.
    ///
    /// Returns the bearer token used, when the credentials are OAuth2.
    async fn authorize(
        &self,
        ctx: &CancellationToken,
        request: &HttpRequest,
    ) -> Result<(HttpRequest, Option<String>)> {
        let access = if self.credentials.uses_oauth2() {
            Some(self.access_token(ctx).await?)
        } else {
            None
        };

        let mut prepared = request.clone();
        self.inject(&mut prepared, access.as_deref())?;
        Ok((prepared, access))
    }

    fn inject(&self, request: &mut HttpRequest, access: Option<&str>) -> Result<()> {
        match self.credentials.as_ref() {
            Credentials::OAuth2AuthCode { .. } | Credentials::OAuth2ClientCredentials { .. } => {
                let access = access.ok_or_else(|| Error::unauthorized("no access token available"))?;
                request.set_header("Authorization", format!("Bearer {access}"));
            }
            Credentials::ApiKey { key, placement } => match placement {
                ApiKeyPlacement::Header { name, prefix } => {
                    request.set_header(name.as_str(), format!("{}{key}", prefix.as_deref().unwrap_or("")));
                }
                ApiKeyPlacement::Query { param } => request.set_query_param(param, key)?,
            },
            Credentials::Basic { username, password } => {
                let encoded =
                    base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
                request.set_header("Authorization", format!("Basic {encoded}"));
            }
            Credentials::CustomHeaders(headers) => {
                for (name, value) in headers {
                    request.set_header(name.as_str(), value.as_str());
                }
            }
            Credentials::Custom(signer) => signer.sign(request)?,
        }
        Ok(())
    }

    async fn exchange(&self, ctx: &CancellationToken, request: &HttpRequest) -> Result<HttpResponse> {
        let response = self.http.send(ctx, request).await?;
        if let Some(interpreter) = &self.interpreter {
            if let Some(err) = interpreter.interpret(&response) {
                debug!(kind = ?err.kind(), "Response body carries an error");
                return Err(err);
            }
        }
        Ok(response)
    }

    // ============================================================================
    // Token lifecycle
    // ============================================================================

    async fn lock_token(&self, ctx: &CancellationToken) -> Result<MutexGuard<'_, Option<OAuth2Token>>> {
        tokio::select! {
            biased;
            () = ctx.cancelled() => Err(Error::Cancelled),
            guard = self.token.lock() => Ok(guard),
        }
    }

    /// A valid access token, refreshing if the current one is missing or expired.
    ///
    /// Only meaningful for OAuth2 credentials; other schemes fail with
    /// `InvalidConfiguration`.
    pub async fn access_token(&self, ctx: &CancellationToken) -> Result<String> {
        let mut guard = self.lock_token(ctx).await?;
        if let Some(token) = guard.as_ref() {
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
            debug!("Access token expired");
        }

        let fresh = self.refresh(ctx, guard.as_ref()).await?;
        let access = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(access)
    }

    /// Refresh after the provider rejected `stale`.
    ///
    /// When another caller already replaced `stale`, its token is reused.
    async fn force_refresh(&self, ctx: &CancellationToken, stale: &str) -> Result<String> {
        let mut guard = self.lock_token(ctx).await?;
        if let Some(token) = guard.as_ref() {
            if token.access_token != stale && !token.is_expired() {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.refresh(ctx, guard.as_ref()).await?;
        let access = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(access)
    }

    /// Obtain a new token from the token endpoint. Must hold the token lock.
    async fn refresh(&self, ctx: &CancellationToken, current: Option<&OAuth2Token>) -> Result<OAuth2Token> {
        let (config, form) = match self.credentials.as_ref() {
            Credentials::OAuth2AuthCode { config, .. } => {
                let refresh_token = current
                    .and_then(|t| t.refresh_token.clone())
                    .ok_or_else(|| Error::unauthorized("token expired and no refresh token is available"))?;
                let form = vec![
                    ("grant_type".to_string(), "refresh_token".to_string()),
                    ("refresh_token".to_string(), refresh_token),
                    ("client_id".to_string(), config.client_id.clone()),
                    ("client_secret".to_string(), config.client_secret.clone()),
                ];
                (config, form)
            }
            Credentials::OAuth2ClientCredentials { config } => {
                let mut form = vec![
                    ("grant_type".to_string(), "client_credentials".to_string()),
                    ("client_id".to_string(), config.client_id.clone()),
                    ("client_secret".to_string(), config.client_secret.clone()),
                ];
                if !config.scopes.is_empty() {
                    form.push(("scope".to_string(), config.scopes.join(" ")));
                }
                (config, form)
            }
            _ => return Err(Error::config("credentials do not use OAuth2 tokens")),
        };

        let token_url = Url::parse(&config.token_url)
            .map_err(|e| Error::config(format!("invalid token URL '{}': {e}", config.token_url)))?;
        let request = HttpRequest::new(Method::POST, token_url).with_body(RequestBody::Form(form));

        info!(token_url = %config.token_url, "Requesting OAuth2 token");
        let response = match self.http.send(ctx, &request).await {
            Ok(response) => response,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(err) => {
                warn!(error = %err, "Token request failed");
                return Err(Error::unauthorized(format!("token refresh failed: {err}")));
            }
        };

        let parsed: TokenResponse = serde_json::from_slice(&response.body)
            .map_err(|e| Error::unauthorized(format!("token endpoint returned an unexpected body: {e}")))?;
        let token = parsed.into_token(current.and_then(|t| t.refresh_token.clone()));

        if let Some(listener) = &self.listener {
            listener(&token);
        }
        Ok(token)
    }
}

impl fmt::Debug for AuthenticatedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedClient")
            .field("credentials", &self.credentials)
            .field("interpreter", &self.interpreter.is_some())
            .finish_non_exhaustive()
    }
}

/// OAuth2 token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
}

impl TokenResponse {
    /// A grant that does not rotate the refresh token keeps the previous one
    fn into_token(self, previous_refresh: Option<String>) -> OAuth2Token {
        let refresh_token = self.refresh_token.or(previous_refresh);
        let mut token = match self.expires_in {
            Some(secs) => OAuth2Token::expires_in(self.access_token, refresh_token, secs),
            None => OAuth2Token::new(self.access_token, refresh_token, None),
        };
        token.token_type = self.token_type;
        token
    }
}
