// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # connectorkit
//!
//! One operation contract over many SaaS REST APIs: read, write, delete,
//! search, describe and subscribe against any registered provider, with
//! authentication, pagination and error classification handled uniformly.
//!
//! ## Features
//!
//! - **Provider catalog**: Base URLs, modules, auth schemes and support
//!   matrices declared per provider in embedded YAML
//! - **Schema store**: Object paths, response keys and pagination per object
//! - **Authenticated client**: OAuth2 (auth code, client credentials), API
//!   key, basic and custom signing, with single-flight token refresh
//! - **Pagination**: Page number, offset, cursor, Link header and page token
//! - **Subscriptions**: Webhook create, update and delete with caller-held state
//! - **XML**: Validated document model and parser for XML-speaking APIs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use connectorkit::auth::{AuthenticatedClient, OAuth2Config, OAuth2Token};
//! use connectorkit::connector::{new_connector, Connector, ConnectorParams, ReadParams};
//! use connectorkit::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> connectorkit::Result<()> {
//!     let client = AuthenticatedClient::oauth2(
//!         OAuth2Config::new("client-id", "secret", "https://acme.zendesk.com/oauth/tokens"),
//!         OAuth2Token::new("access-token", None, None),
//!     );
//!     let connector = new_connector("zendesk", ConnectorParams::new(client).workspace("acme"))?;
//!
//!     let ctx = CancellationToken::new();
//!     let mut params = ReadParams::new("tickets").fields(["id", "subject"]);
//!     loop {
//!         let page = connector.read(&ctx, &params).await?;
//!         for record in &page.data {
//!             println!("{:?}", record.fields);
//!         }
//!         if page.done {
//!             break;
//!         }
//!         params = params.next_page(page.next_page);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Connector Interface                        │
//! │  read  write  delete  search  list_object_metadata  subscribe   │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │ Catalog  │  Schema   │   Paginate    │   Auth    │   Hooks     │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ Modules  │ Paths     │ Page number   │ OAuth2    │ JQL / SOQL  │
//! │ Support  │ Keys      │ Offset        │ API key   │ Webhooks    │
//! │ Naming   │ Fields    │ Cursor        │ Basic     │ Envelopes   │
//! │ Inputs   │ Windows   │ Link header   │ Signing   │ XML upsert  │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Cancellation signal
pub mod cancel;

/// Common types and type aliases
pub mod types;

/// URL construction
pub mod urlbuilder;

/// Typed accessors over JSON
pub mod jsonquery;

/// HTTP client, requests and responses
pub mod http;

/// Authentication
pub mod auth;

/// Template interpolation
pub mod template;

/// Object and field name normalization
pub mod naming;

/// Provider catalog and provider-specific hooks
pub mod providers;

/// Pagination strategies
pub mod pagination;

/// Object schemas per provider
pub mod schema;

/// Module and metadata resolution
pub mod resolver;

/// Connector trait and operation pipeline
pub mod connector;

/// Webhook subscriptions
pub mod subscription;

/// XML document model
pub mod xml;

/// Credentials files
pub mod credentials;

/// Connector test harness
pub mod testing;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, ErrorKind, Result};
pub use types::*;

// Re-export commonly used types
pub use connector::{new_connector, Connector, ConnectorParams, ProviderConnector};
pub use cancel::CancellationToken;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
