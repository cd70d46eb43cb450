//! XML document model
//!
//! An ordered element tree with deterministic serialization, used to build
//! request bodies for providers that accept XML (Salesforce metadata). The
//! reader parses the same grammar back into a tree.

mod parser;
mod types;

pub use parser::{parse, unescape};
pub use types::{escape, XmlAttr, XmlData, XmlSchema, XmlString};
