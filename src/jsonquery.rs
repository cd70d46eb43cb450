//! Typed accessors over untyped JSON
//!
//! A "required" accessor fails with `MissingExpectedValues` when the key is
//! absent, null or of the wrong type. An "optional" accessor returns `None`
//! when the key is absent or null and fails only on a type mismatch.

use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue};

/// A cursor into a JSON tree
#[derive(Debug, Clone, Copy)]
pub struct JsonQuery<'a> {
    node: &'a JsonValue,
}

impl<'a> JsonQuery<'a> {
    /// Wrap a JSON node
    pub fn new(node: &'a JsonValue) -> Self {
        Self { node }
    }

    /// The wrapped node
    pub fn value(&self) -> &'a JsonValue {
        self.node
    }

    fn get(&self, key: &str) -> Option<&'a JsonValue> {
        match self.node.get(key) {
            Some(JsonValue::Null) | None => None,
            Some(v) => Some(v),
        }
    }

    /// Descend through nested objects; `None` when any step is absent
    pub fn path(&self, keys: &[&str]) -> Result<Option<JsonQuery<'a>>> {
        let mut current = *self;
        for key in keys {
            match current.object_optional(key)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    // ============================================================================
    // Objects
    // ============================================================================

    /// Nested object that must exist
    pub fn object_required(&self, key: &str) -> Result<JsonQuery<'a>> {
        match self.get(key) {
            Some(v @ JsonValue::Object(_)) => Ok(JsonQuery::new(v)),
            _ => Err(Error::missing_value(key)),
        }
    }

    /// Nested object that may be absent
    pub fn object_optional(&self, key: &str) -> Result<Option<JsonQuery<'a>>> {
        match self.get(key) {
            None => Ok(None),
            Some(v @ JsonValue::Object(_)) => Ok(Some(JsonQuery::new(v))),
            Some(other) => Err(type_mismatch(key, "object", other)),
        }
    }

    // ============================================================================
    // Arrays
    // ============================================================================

    /// Array that must exist
    pub fn array_required(&self, key: &str) -> Result<&'a Vec<JsonValue>> {
        match self.get(key) {
            Some(JsonValue::Array(arr)) => Ok(arr),
            _ => Err(Error::missing_value(key)),
        }
    }

    /// Array that may be absent
    pub fn array_optional(&self, key: &str) -> Result<Option<&'a Vec<JsonValue>>> {
        match self.get(key) {
            None => Ok(None),
            Some(JsonValue::Array(arr)) => Ok(Some(arr)),
            Some(other) => Err(type_mismatch(key, "array", other)),
        }
    }

    // ============================================================================
    // Scalars
    // ============================================================================

    /// String that must exist
    pub fn string_required(&self, key: &str) -> Result<&'a str> {
        match self.get(key) {
            Some(JsonValue::String(s)) => Ok(s),
            _ => Err(Error::missing_value(key)),
        }
    }

    /// String that may be absent
    pub fn string_optional(&self, key: &str) -> Result<Option<&'a str>> {
        match self.get(key) {
            None => Ok(None),
            Some(JsonValue::String(s)) => Ok(Some(s)),
            Some(other) => Err(type_mismatch(key, "string", other)),
        }
    }

    /// Integer that must exist
    pub fn integer_required(&self, key: &str) -> Result<i64> {
        self.get(key)
            .and_then(as_integer)
            .ok_or_else(|| Error::missing_value(key))
    }

    /// Integer that may be absent
    pub fn integer_optional(&self, key: &str) -> Result<Option<i64>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => as_integer(v)
                .map(Some)
                .ok_or_else(|| type_mismatch(key, "integer", v)),
        }
    }

    /// Boolean that may be absent
    pub fn bool_optional(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(JsonValue::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(type_mismatch(key, "boolean", other)),
        }
    }

    // ============================================================================
    // Conversion
    // ============================================================================

    /// Materialize this node as a map
    pub fn object_to_map(&self) -> Result<JsonObject> {
        match self.node {
            JsonValue::Object(map) => Ok(map.clone()),
            other => Err(Error::unmarshal(format!(
                "expected an object, found {}",
                type_name(other)
            ))),
        }
    }

    /// Materialize the array at `key` as a list of maps.
    ///
    /// A missing key yields an empty list; a present key holding anything
    /// other than an array of objects is an error.
    pub fn array_to_maps(&self, key: &str) -> Result<Vec<JsonObject>> {
        match self.array_optional(key)? {
            None => Ok(Vec::new()),
            Some(items) => values_to_maps(items),
        }
    }

    /// Select nodes with a path expression.
    ///
    /// Dotted paths (`data.items`, `$.data.items`) are resolved directly;
    /// expressions with wildcards go through JSONPath.
    pub fn select(&self, path: &str) -> Result<Vec<JsonValue>> {
        if path.contains('*') {
            return select_with_jsonpath(self.node, path);
        }
        let trimmed = path.strip_prefix("$.").unwrap_or(path);
        if trimmed.is_empty() || trimmed == "$" {
            return Ok(vec![self.node.clone()]);
        }
        let keys: Vec<&str> = trimmed.split('.').collect();
        let mut current = self.node;
        for key in keys {
            match current.get(key) {
                Some(next) => current = next,
                None => return Ok(Vec::new()),
            }
        }
        match current {
            JsonValue::Null => Ok(Vec::new()),
            JsonValue::Array(items) => Ok(items.clone()),
            other => Ok(vec![other.clone()]),
        }
    }
}

/// Convert a slice of JSON values into maps, rejecting non-objects
pub fn values_to_maps(items: &[JsonValue]) -> Result<Vec<JsonObject>> {
    items
        .iter()
        .map(|item| match item {
            JsonValue::Object(map) => Ok(map.clone()),
            other => Err(Error::unmarshal(format!(
                "expected record object, found {}",
                type_name(other)
            ))),
        })
        .collect()
}

fn as_integer(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn type_mismatch(key: &str, expected: &str, found: &JsonValue) -> Error {
    Error::missing_value(format!(
        "{key} (expected {expected}, found {})",
        type_name(found)
    ))
}

fn select_with_jsonpath(value: &JsonValue, path: &str) -> Result<Vec<JsonValue>> {
    use jsonpath_rust::JsonPath;

    let jp = JsonPath::try_from(path)
        .map_err(|e| Error::config(format!("invalid JSONPath '{path}': {e}")))?;

    match jp.find(value) {
        JsonValue::Array(arr) => Ok(arr),
        JsonValue::Null => Ok(Vec::new()),
        other => Ok(vec![other]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn sample() -> JsonValue {
        json!({
            "pagination": {"current_page": 2, "total_pages": 5.0},
            "ideas": [{"id": "1"}, {"id": "2"}],
            "name": "Portal",
            "archived": false,
            "note": null,
            "count": "7"
        })
    }

    #[test]
    fn test_required_accessors() {
        let body = sample();
        let q = JsonQuery::new(&body);
        let pagination = q.object_required("pagination").unwrap();
        assert_eq!(pagination.integer_required("current_page").unwrap(), 2);
        assert_eq!(pagination.integer_required("total_pages").unwrap(), 5);
        assert_eq!(q.array_required("ideas").unwrap().len(), 2);
        assert_eq!(q.string_required("name").unwrap(), "Portal");
    }

    #[test]
    fn test_required_missing_or_wrong_type() {
        let body = sample();
        let q = JsonQuery::new(&body);
        assert!(q.object_required("absent").unwrap_err().is(ErrorKind::MissingExpectedValues));
        assert!(q.string_required("archived").unwrap_err().is(ErrorKind::MissingExpectedValues));
        assert!(q.integer_required("count").is_err());
        assert!(q.string_required("note").is_err());
    }

    #[test]
    fn test_optional_accessors() {
        let body = sample();
        let q = JsonQuery::new(&body);
        assert_eq!(q.string_optional("absent").unwrap(), None);
        assert_eq!(q.string_optional("note").unwrap(), None);
        assert_eq!(q.bool_optional("archived").unwrap(), Some(false));
        assert!(q.integer_optional("count").is_err());
        assert!(q.array_optional("name").is_err());
    }

    #[test]
    fn test_path_navigation() {
        let body = json!({"meta": {"page": {"next": "abc"}}});
        let q = JsonQuery::new(&body);
        let page = q.path(&["meta", "page"]).unwrap().unwrap();
        assert_eq!(page.string_required("next").unwrap(), "abc");
        assert!(q.path(&["meta", "missing"]).unwrap().is_none());
    }

    #[test]
    fn test_conversions() {
        let body = sample();
        let q = JsonQuery::new(&body);
        let ideas = q.array_to_maps("ideas").unwrap();
        assert_eq!(ideas[1]["id"], "2");
        assert!(q.array_to_maps("absent").unwrap().is_empty());
        assert!(q.object_to_map().unwrap().contains_key("name"));
        assert!(JsonQuery::new(&json!([1])).object_to_map().is_err());
    }

    #[test]
    fn test_select_paths() {
        let body = json!({"data": {"items": [{"id": 1}, {"id": 2}]}});
        let q = JsonQuery::new(&body);
        assert_eq!(q.select("data.items").unwrap().len(), 2);
        assert_eq!(q.select("$.data.items").unwrap().len(), 2);
        assert!(q.select("data.absent").unwrap().is_empty());
    }
}
