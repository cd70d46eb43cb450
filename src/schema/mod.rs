//! Schema store module
//!
//! Embedded per-provider object tables plus field inference for objects
//! whose shape is only known at runtime.
//!
//! # Features
//!
//! - **Object lookup**: URL path, response key and supported operations
//! - **Static metadata**: declared fields with display names and types
//! - **Per-object pagination**: overrides of the module default
//! - **Incremental flags**: which objects filter `since`/`until` server-side
//! - **Inference**: field types merged across sampled records

mod inference;
mod store;
mod types;

pub use inference::{display_name, infer_fields};
pub use store::provider_schema;
pub use types::{FieldSchema, JsonType, ModuleSchema, ObjectSchema, ProviderSchema};
