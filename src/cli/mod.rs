//! CLI module
//!
//! Command-line interface over the provider catalog and connectors.
//!
//! # Commands
//!
//! - `providers` - List registered providers
//! - `objects` - List the objects of a provider module
//! - `read` - Read pages of an object
//! - `metadata` - Describe objects

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::Runner;
