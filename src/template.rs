//! Placeholder substitution for catalog URLs and schema paths
//!
//! Handles `{name}` placeholders such as `https://{workspace}.aha.io` or
//! `/ex/jira/{cloudId}/rest/api/3`. Names are ASCII identifiers.

use crate::error::{Error, Result};
use crate::types::StringMap;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Regex for matching placeholders: {name}
static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// Substitute every placeholder from `vars`.
///
/// Fails with `UndefinedVariable` (kind `MissingParam`) naming every
/// placeholder that has no value.
pub fn render(template: &str, vars: &StringMap) -> Result<String> {
    let mut missing = Vec::new();
    let rendered = PLACEHOLDER_REGEX.replace_all(template, |cap: &Captures<'_>| {
        let name = &cap[1];
        match vars.get(name) {
            Some(value) => value.clone(),
            None => {
                missing.push(name.to_string());
                cap[0].to_string()
            }
        }
    });

    if missing.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(Error::UndefinedVariable {
            variable: missing.join(", "),
        })
    }
}

/// Substitute the placeholders that have values and leave the rest intact
pub fn render_partial(template: &str, vars: &StringMap) -> String {
    PLACEHOLDER_REGEX
        .replace_all(template, |cap: &Captures<'_>| {
            vars.get(&cap[1]).cloned().unwrap_or_else(|| cap[0].to_string())
        })
        .into_owned()
}

/// Check if a string contains placeholders
pub fn has_placeholders(s: &str) -> bool {
    PLACEHOLDER_REGEX.is_match(s)
}

/// Names of all placeholders in order of appearance
pub fn placeholders(template: &str) -> Vec<String> {
    PLACEHOLDER_REGEX
        .captures_iter(template)
        .map(|cap| cap[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn vars(pairs: &[(&str, &str)]) -> StringMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_render_workspace() {
        let url = render("https://{workspace}.aha.io/api/v1", &vars(&[("workspace", "acme")])).unwrap();
        assert_eq!(url, "https://acme.aha.io/api/v1");
    }

    #[test]
    fn test_render_multiple() {
        let url = render(
            "https://api.atlassian.com/ex/{product}/{cloudId}",
            &vars(&[("product", "jira"), ("cloudId", "c-1")]),
        )
        .unwrap();
        assert_eq!(url, "https://api.atlassian.com/ex/jira/c-1");
    }

    #[test]
    fn test_missing_placeholder_is_missing_param() {
        let err = render("https://{region}.x.io/{tenant}", &vars(&[])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingParam);
        assert!(err.to_string().contains("region, tenant"));
    }

    #[test]
    fn test_render_partial_keeps_unknown() {
        let out = render_partial("/ex/jira/{cloudId}/{id}", &vars(&[("id", "7")]));
        assert_eq!(out, "/ex/jira/{cloudId}/7");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders("{a}/x/{b_2}"), vec!["a", "b_2"]);
        assert!(has_placeholders("https://{workspace}.x.io"));
        assert!(!has_placeholders("https://x.io/{not valid}"));
    }
}
