//! Providers
//!
//! Each provider is a catalog entry (`catalog/<name>.yaml`) plus a set of
//! hooks. Providers whose APIs follow the common REST conventions (Aha!,
//! GitHub) use [`DefaultHooks`] and need no code of their own.

mod atlassian;
mod brevo;
mod info;
mod marketo;
mod query;
mod registry;
pub mod salesforce;
mod zendesk;

pub use atlassian::AtlassianHooks;
pub use brevo::BrevoHooks;
pub use info::{
    ApiKeyOpts, AuthScheme, InputLifecycle, MetadataInput, ModuleInfo, OAuth2Opts, ProviderInfo, Support,
    ROOT_MODULE,
};
pub use marketo::{MarketoHooks, MarketoInterpreter};
pub use query::Dialect;
pub use registry::{get_api_key_header, list_providers, parse_info, read_info};
pub use salesforce::SalesforceHooks;
pub use zendesk::ZendeskHooks;

use crate::connector::{DefaultHooks, ProviderHooks};
use std::sync::Arc;

/// Hooks registered for a provider
pub fn hooks_for(provider: &str) -> Arc<dyn ProviderHooks> {
    match provider {
        "atlassian" => Arc::new(AtlassianHooks),
        "brevo" => Arc::new(BrevoHooks),
        "marketo" => Arc::new(MarketoHooks),
        "salesforce" => Arc::new(SalesforceHooks),
        "zendesk" => Arc::new(ZendeskHooks),
        _ => Arc::new(DefaultHooks),
    }
}
