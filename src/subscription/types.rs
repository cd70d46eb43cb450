//! Subscription types

use crate::error::{Error, Result};
use crate::types::JsonValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle of a webhook subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// No subscription exists upstream
    Unsubscribed,
    /// Create request sent, not yet confirmed
    Pending,
    /// Confirmed by the provider; the external id is known
    Active,
    /// Past its time to live
    Expired,
}

impl SubscriptionStatus {
    /// Whether the state machine allows moving to `next`
    pub fn can_transition_to(self, next: SubscriptionStatus) -> bool {
        use SubscriptionStatus::{Active, Expired, Pending, Unsubscribed};
        matches!(
            (self, next),
            (Unsubscribed, Pending)
                | (Pending, Active)
                | (Pending, Unsubscribed)
                | (Active, Active)
                | (Active, Expired)
                | (Active, Unsubscribed)
                | (Expired, Unsubscribed)
                | (Expired, Pending)
        )
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow
    pub fn transition(self, next: SubscriptionStatus) -> Result<SubscriptionStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(Error::config(format!(
                "subscription cannot move from {self:?} to {next:?}"
            )))
        }
    }
}

/// Subscribe parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscribeParams {
    /// Events to receive, keyed by object name
    pub subscription_events: BTreeMap<String, Vec<String>>,
    /// Provider-specific request options (target URL, name, secret...)
    #[serde(default)]
    pub request: JsonValue,
}

impl SubscribeParams {
    /// Subscribe with provider-specific options
    pub fn new(request: JsonValue) -> Self {
        Self {
            subscription_events: BTreeMap::new(),
            request,
        }
    }

    /// Add events for an object
    #[must_use]
    pub fn events<I, S>(mut self, object: impl Into<String>, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subscription_events
            .insert(object.into(), events.into_iter().map(Into::into).collect());
        self
    }

    /// String option from the provider-specific request
    pub fn option(&self, key: &str) -> Option<&str> {
        self.request.get(key).and_then(JsonValue::as_str)
    }

    /// String option that must be present
    pub fn required_option(&self, key: &str) -> Result<&str> {
        self.option(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::missing_param(format!("request.{key}")))
    }
}

/// Caller-persisted record of a subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionState {
    pub provider: String,
    /// Objects covered by the subscription
    pub objects: Vec<String>,
    /// Events per object
    #[serde(default)]
    pub events: BTreeMap<String, Vec<String>>,
    pub external_subscription_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub raw_provider_payload: JsonValue,
}

impl SubscriptionState {
    /// State for a subscription the provider just confirmed
    pub fn new(
        provider: impl Into<String>,
        params: &SubscribeParams,
        external_subscription_id: impl Into<String>,
        raw_provider_payload: JsonValue,
    ) -> Self {
        Self {
            provider: provider.into(),
            objects: params.subscription_events.keys().cloned().collect(),
            events: params.subscription_events.clone(),
            external_subscription_id: external_subscription_id.into(),
            created_at: Utc::now(),
            expires_at: None,
            raw_provider_payload,
        }
    }

    /// Status at `now`
    pub fn status(&self, now: DateTime<Utc>) -> SubscriptionStatus {
        match self.expires_at {
            Some(at) if at <= now => SubscriptionStatus::Expired,
            _ => SubscriptionStatus::Active,
        }
    }
}

/// Outcome of a subscribe or update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionResult {
    pub status: SubscriptionStatus,
    pub state: SubscriptionState,
}

/// How a provider applies subscription changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Modify the existing subscription in place
    Patch,
    /// Delete the existing subscription and create a new one
    Recreate,
}
