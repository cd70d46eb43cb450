//! Brevo
//!
//! Records use the default pipeline. Subscriptions are marketing webhooks;
//! a changed subscription is deleted and created again.

use crate::connector::{HookContext, ProviderHooks};
use crate::error::{Error, Result};
use crate::http::HttpRequest;
use crate::subscription::{SubscribeParams, SubscriptionState};
use crate::types::{JsonValue, Method};
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeSet;

const WEBHOOKS_PATH: &str = "webhooks";

#[derive(Debug, Clone, Copy, Default)]
pub struct BrevoHooks;

#[async_trait]
impl ProviderHooks for BrevoHooks {
    fn build_subscribe_request(&self, cx: &HookContext<'_>, params: &SubscribeParams) -> Result<HttpRequest> {
        let body = webhook_body(params)?;
        Ok(HttpRequest::json(Method::POST, cx.url(WEBHOOKS_PATH)?.build(), body))
    }

    fn build_delete_subscription_request(
        &self,
        cx: &HookContext<'_>,
        state: &SubscriptionState,
    ) -> Result<HttpRequest> {
        let url = cx.url(&format!("{WEBHOOKS_PATH}/{}", state.external_subscription_id))?;
        Ok(HttpRequest::delete(url.build()))
    }
}

fn webhook_body(params: &SubscribeParams) -> Result<JsonValue> {
    let url = params.required_option("url")?;
    let events: BTreeSet<&str> = params
        .subscription_events
        .values()
        .flatten()
        .map(String::as_str)
        .collect();
    if events.is_empty() {
        return Err(Error::missing_param("subscription_events"));
    }

    Ok(json!({
        "url": url,
        "description": params.option("description").unwrap_or("connectorkit"),
        "events": events,
        "type": params.option("type").unwrap_or("marketing"),
    }))
}
