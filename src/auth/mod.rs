//! Authentication module
//!
//! Supports: OAuth2 authorization-code, OAuth2 client-credentials, API key
//! (header or query), Basic, fixed headers and custom request signers.
//!
//! The `AuthenticatedClient` injects credentials per request and manages
//! OAuth2 token refresh with at most one refresh in flight per credential.

mod authenticator;
mod types;

pub use authenticator::AuthenticatedClient;
pub use types::{
    ApiKeyPlacement, Credentials, OAuth2Config, OAuth2Token, RequestSigner, TokenListener,
};

#[cfg(test)]
mod tests;
