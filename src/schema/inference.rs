//! Field inference from sampled records
//!
//! Providers with custom fields describe an object by reading a record and
//! inspecting its keys. Types are merged across every sampled record.

use super::types::{FieldSchema, JsonType};
use crate::types::JsonObject;
use std::collections::BTreeMap;

/// Infer the fields of an object from sample records
pub fn infer_fields(records: &[JsonObject]) -> BTreeMap<String, FieldSchema> {
    let mut types: BTreeMap<String, JsonType> = BTreeMap::new();

    for record in records {
        for (key, value) in record {
            let observed = JsonType::of(value);
            types
                .entry(key.clone())
                .and_modify(|existing| *existing = existing.merge_with(observed))
                .or_insert(observed);
        }
    }

    types
        .into_iter()
        .map(|(key, value_type)| {
            let field = FieldSchema {
                display_name: display_name(&key),
                value_type,
            };
            (key, field)
        })
        .collect()
}

/// Human-readable name for a field key
///
/// `created_at` → `Created At`, `firstName` → `First Name`,
/// `Custom__c` → `Custom`.
pub fn display_name(key: &str) -> String {
    let key = key.strip_suffix("__c").unwrap_or(key);
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in key.chars() {
        if c == '_' || c == '-' || c == '.' || c == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.push(c);
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
