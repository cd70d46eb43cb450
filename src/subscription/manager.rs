//! Subscription manager
//!
//! Drives the subscription lifecycle over a connector's hooks:
//! `Unsubscribed -> Pending -> Active -> (Expired) -> Unsubscribed`.
//! Providers without in-place updates get delete + create.

use super::types::{SubscribeParams, SubscriptionResult, SubscriptionState, SubscriptionStatus, UpdateMode};
use crate::cancel::CancellationToken;
use crate::connector::ProviderConnector;
use crate::error::{Error, ErrorKind, Result};
use crate::types::Operation;
use tracing::{debug, info, instrument};

/// Subscription operations of one connector
#[derive(Debug, Clone, Copy)]
pub struct SubscriptionManager<'a> {
    connector: &'a ProviderConnector,
}

impl<'a> SubscriptionManager<'a> {
    /// Manage subscriptions through `connector`
    pub fn new(connector: &'a ProviderConnector) -> Self {
        Self { connector }
    }

    fn check(&self, params: &SubscribeParams) -> Result<()> {
        if params.subscription_events.is_empty() {
            return Err(Error::MissingObjects);
        }
        let info = self.connector.info();
        if !info.support_for(self.connector.resolved_module().id()).subscribe {
            return Err(Error::not_supported(&info.name, Operation::Subscribe.to_string()));
        }
        for object in params.subscription_events.keys() {
            let name = self.connector.object_name(object)?;
            let schema = self
                .connector
                .schema()
                .object(self.connector.resolved_module().id(), &name)?;
            if !schema.supports(Operation::Subscribe) {
                return Err(Error::not_supported(&name, Operation::Subscribe.to_string()));
            }
        }
        Ok(())
    }

    /// Create a subscription.
    ///
    /// A 409 conflict whose body names the existing subscription is treated
    /// as success with that id.
    #[instrument(skip_all, fields(provider = %self.connector.info().name))]
    pub async fn subscribe(&self, ctx: &CancellationToken, params: &SubscribeParams) -> Result<SubscriptionResult> {
        self.check(params)?;
        let status = SubscriptionStatus::Unsubscribed.transition(SubscriptionStatus::Pending)?;

        let module = self.connector.ready_module(ctx).await?;
        let cx = self.connector.context(module);
        let hooks = self.connector.hooks();
        let request = hooks.build_subscribe_request(&cx, params)?;

        let state = match self.connector.send(ctx, &request).await {
            Ok(response) => hooks.parse_subscribe_response(&cx, params, &response)?,
            Err(err) if err.status() == Some(409) => {
                let Some(state) = self.reconcile_conflict(params, &err) else {
                    return Err(err);
                };
                info!(id = %state.external_subscription_id, "Subscription already exists, reusing it");
                state
            }
            Err(err) => return Err(err),
        };

        let status = status.transition(SubscriptionStatus::Active)?;
        info!(id = %state.external_subscription_id, "Subscription active");
        Ok(SubscriptionResult { status, state })
    }

    fn reconcile_conflict(&self, params: &SubscribeParams, err: &Error) -> Option<SubscriptionState> {
        let Error::Conflict {
            payload: Some(payload), ..
        } = err
        else {
            return None;
        };
        let id = self.connector.hooks().subscription_id(payload)?;
        Some(SubscriptionState::new(
            &self.connector.info().name,
            params,
            id,
            payload.clone(),
        ))
    }

    /// Change a subscription, in place when the provider allows it
    #[instrument(skip_all, fields(provider = %self.connector.info().name, id = %previous.external_subscription_id))]
    pub async fn update(
        &self,
        ctx: &CancellationToken,
        params: &SubscribeParams,
        previous: &SubscriptionState,
    ) -> Result<SubscriptionResult> {
        self.check(params)?;
        let hooks = self.connector.hooks();

        match hooks.subscription_update_mode() {
            UpdateMode::Patch => {
                let module = self.connector.ready_module(ctx).await?;
                let cx = self.connector.context(module);
                let request = hooks.build_update_subscription_request(&cx, params, previous)?;
                let response = self.connector.send(ctx, &request).await?;

                let mut state = previous.clone();
                state.objects = params.subscription_events.keys().cloned().collect();
                state.events = params.subscription_events.clone();
                if let Ok(body) = response.json() {
                    if !body.is_null() {
                        state.raw_provider_payload = body.clone();
                    }
                }
                Ok(SubscriptionResult {
                    status: SubscriptionStatus::Active,
                    state,
                })
            }
            UpdateMode::Recreate => {
                debug!("Provider cannot update subscriptions in place, recreating");
                self.delete(ctx, previous).await?;
                self.subscribe(ctx, params).await
            }
        }
    }

    /// Delete a subscription; one that is already gone counts as deleted
    #[instrument(skip_all, fields(provider = %self.connector.info().name, id = %state.external_subscription_id))]
    pub async fn delete(&self, ctx: &CancellationToken, state: &SubscriptionState) -> Result<()> {
        if state.external_subscription_id.is_empty() {
            return Err(Error::missing_param("external_subscription_id"));
        }
        let module = self.connector.ready_module(ctx).await?;
        let cx = self.connector.context(module);
        let request = self.connector.hooks().build_delete_subscription_request(&cx, state)?;

        match self.connector.send(ctx, &request).await {
            Ok(_) => Ok(()),
            Err(err) if err.is(ErrorKind::NotFound) => {
                debug!("Subscription already gone");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}
