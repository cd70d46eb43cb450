//! Entity-name normalization
//!
//! Turns user-facing object and field identifiers into the casing and
//! number a provider expects. Each provider picks one [`Transform`] per
//! entity kind in its catalog entry.

use serde::{Deserialize, Serialize};

/// Words that are never pluralized
const UNCOUNTABLE: &[&str] = &["data", "metadata", "information", "news", "feedback", "media"];

/// Irregular plurals
const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("criterion", "criteria"),
    ("datum", "data"),
    ("leaf", "leaves"),
];

/// A name transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Transform {
    /// Leave the name untouched
    #[default]
    #[serde(rename = "identity")]
    Identity,
    /// `IdeaPortal` → `idea_portal`
    #[serde(rename = "lower-snake")]
    LowerSnake,
    /// `IdeaPortal` → `idea_portals`
    #[serde(rename = "lower-snake-plural")]
    LowerSnakePlural,
    /// `IdeaPortal` → `idea-portals`
    #[serde(rename = "lower-kebab-plural")]
    LowerKebabPlural,
    /// `idea_portal` → `ideaPortal`
    #[serde(rename = "camelCase")]
    CamelCase,
    /// `idea_portal` → `IdeaPortal`
    #[serde(rename = "PascalCase")]
    PascalCase,
    /// `IdeaPortal` → `ideaportals`
    #[serde(rename = "lowercase-plural")]
    LowercasePlural,
}

impl Transform {
    /// Apply the transform. Compound names are normalized per `/` segment.
    pub fn apply(self, name: &str) -> String {
        if self == Transform::Identity {
            return name.to_string();
        }
        name.split('/')
            .map(|segment| self.apply_segment(segment))
            .collect::<Vec<_>>()
            .join("/")
    }

    fn apply_segment(self, segment: &str) -> String {
        let words = split_words(segment);
        if words.is_empty() {
            return segment.to_string();
        }
        let lower: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();

        match self {
            Transform::Identity => segment.to_string(),
            Transform::LowerSnake => lower.join("_"),
            Transform::LowerSnakePlural => pluralize_last(lower).join("_"),
            Transform::LowerKebabPlural => pluralize_last(lower).join("-"),
            Transform::LowercasePlural => pluralize_last(lower).concat(),
            Transform::CamelCase => lower
                .iter()
                .enumerate()
                .map(|(i, w)| if i == 0 { w.clone() } else { capitalize(w) })
                .collect(),
            Transform::PascalCase => lower.iter().map(|w| capitalize(w)).collect(),
        }
    }
}

/// Object and field transforms of one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NamingRules {
    /// Transform for object names
    #[serde(default)]
    pub object: Transform,
    /// Transform for field names
    #[serde(default)]
    pub field: Transform,
}

impl NamingRules {
    /// Normalize an object name
    pub fn normalize_object(&self, name: &str) -> String {
        self.object.apply(name)
    }

    /// Normalize a field name
    pub fn normalize_field(&self, name: &str) -> String {
        self.field.apply(name)
    }
}

/// Split an identifier into words on separators and case boundaries.
///
/// An uppercase letter starts a new word when the previous character is
/// lowercase or a digit, or when it ends an uppercase run that is followed
/// by a lowercase letter (`HTTPResponse` → `HTTP`, `Response`).
fn split_words(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn pluralize_last(mut words: Vec<String>) -> Vec<String> {
    if let Some(last) = words.pop() {
        words.push(pluralize(&last));
    }
    words
}

/// Pluralize a lowercase English noun
pub fn pluralize(word: &str) -> String {
    if word.is_empty() || UNCOUNTABLE.contains(&word) {
        return word.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == word) {
        return (*plural).to_string();
    }
    if IRREGULAR.iter().any(|(_, plural)| *plural == word) {
        return word.to_string();
    }

    if word.ends_with('s') && !(word.ends_with("ss") || word.ends_with("us") || word.ends_with("is")) {
        return word.to_string();
    }

    if let Some(stem) = word.strip_suffix("is") {
        return format!("{stem}es");
    }

    let mut chars = word.chars().rev();
    let last = chars.next();
    let before_last = chars.next();
    if last == Some('y') && before_last.is_some_and(|c| !"aeiou".contains(c)) {
        return format!("{}ies", &word[..word.len() - 1]);
    }

    if ["s", "x", "z", "ch", "sh"].iter().any(|suffix| word.ends_with(suffix)) {
        return format!("{word}es");
    }
    format!("{word}s")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("HTTPResponse", "http_response")]
    #[test_case("CreatedAt", "created_at")]
    #[test_case("createdAt", "created_at")]
    #[test_case("already_snake", "already_snake")]
    #[test_case("Address2Line", "address2_line")]
    #[test_case("userID", "user_id")]
    fn test_lower_snake(input: &str, expected: &str) {
        assert_eq!(Transform::LowerSnake.apply(input), expected);
    }

    #[test_case("IdeaPortal", "idea_portals")]
    #[test_case("ideas/endorsements", "ideas/endorsements")]
    #[test_case("Category", "categories")]
    #[test_case("Status", "statuses")]
    #[test_case("Box", "boxes")]
    #[test_case("Branch", "branches")]
    #[test_case("Key", "keys")]
    #[test_case("Person", "people")]
    #[test_case("Metadata", "metadata")]
    #[test_case("Analysis", "analyses")]
    #[test_case("crisis", "crises")]
    #[test_case("user/Repo", "users/repos")]
    fn test_lower_snake_plural(input: &str, expected: &str) {
        assert_eq!(Transform::LowerSnakePlural.apply(input), expected);
    }

    #[test_case(Transform::LowerKebabPlural, "IdeaPortal", "idea-portals")]
    #[test_case(Transform::CamelCase, "idea_portal", "ideaPortal")]
    #[test_case(Transform::CamelCase, "first_name", "firstName")]
    #[test_case(Transform::PascalCase, "opportunity", "Opportunity")]
    #[test_case(Transform::PascalCase, "line_item", "LineItem")]
    #[test_case(Transform::LowercasePlural, "IdeaPortal", "ideaportals")]
    #[test_case(Transform::Identity, "X__c", "X__c")]
    fn test_other_transforms(transform: Transform, input: &str, expected: &str) {
        assert_eq!(transform.apply(input), expected);
    }

    #[test]
    fn test_naming_rules() {
        let rules = NamingRules {
            object: Transform::LowerSnakePlural,
            field: Transform::LowerSnake,
        };
        assert_eq!(rules.normalize_object("IdeaPortal"), "idea_portals");
        assert_eq!(rules.normalize_field("HTTPResponse"), "http_response");
    }

    #[test]
    fn test_transform_serde_names() {
        let rules: NamingRules =
            serde_yaml::from_str("object: lower-snake-plural\nfield: camelCase\n").unwrap();
        assert_eq!(rules.object, Transform::LowerSnakePlural);
        assert_eq!(rules.field, Transform::CamelCase);
        assert_eq!(NamingRules::default().object, Transform::Identity);
    }
}
