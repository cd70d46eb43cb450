//! Webhook subscriptions
//!
//! The library holds no subscription state: [`SubscriptionState`] is
//! returned to the caller, persisted there, and handed back for updates and
//! deletes.

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    SubscribeParams, SubscriptionResult, SubscriptionState, SubscriptionStatus, UpdateMode,
};
