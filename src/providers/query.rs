//! Filter rendering for providers that search with a query language

use crate::connector::{Filter, FilterOperator};
use crate::error::{Error, Result};
use crate::types::JsonValue;

/// Query language of a provider's search endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Jira Query Language
    Jql,
    /// Salesforce Object Query Language
    Soql,
}

impl Dialect {
    /// Render a filter tree as a boolean expression
    pub fn render(self, filter: &Filter) -> Result<String> {
        match filter {
            Filter::Condition { field, operator, value } => self.condition(field, *operator, value),
            Filter::And(children) => self.join(children, "AND"),
            Filter::Or(children) => self.join(children, "OR"),
        }
    }

    fn join(self, children: &[Filter], keyword: &str) -> Result<String> {
        let parts = children
            .iter()
            .map(|child| match child {
                Filter::Condition { .. } => self.render(child),
                _ => self.render(child).map(|s| format!("({s})")),
            })
            .collect::<Result<Vec<_>>>()?;
        if parts.is_empty() {
            return Err(Error::config(format!("empty {keyword} filter")));
        }
        Ok(parts.join(&format!(" {keyword} ")))
    }

    fn condition(self, field: &str, operator: FilterOperator, value: &JsonValue) -> Result<String> {
        if field.is_empty() || !field.chars().all(|c| c.is_alphanumeric() || matches!(c, '_' | '.')) {
            return Err(Error::config(format!("invalid filter field '{field}'")));
        }

        let rendered = match (self, operator) {
            (_, FilterOperator::In) => {
                let items = value
                    .as_array()
                    .ok_or_else(|| Error::config(format!("'in' filter on '{field}' needs an array value")))?;
                let list = items
                    .iter()
                    .map(|item| self.literal(item))
                    .collect::<Result<Vec<_>>>()?
                    .join(", ");
                let keyword = if self == Dialect::Jql { "in" } else { "IN" };
                format!("{field} {keyword} ({list})")
            }
            (Dialect::Jql, FilterOperator::Contains) => format!("{field} ~ {}", self.literal(value)?),
            (Dialect::Soql, FilterOperator::Contains) => {
                let text = value
                    .as_str()
                    .ok_or_else(|| Error::config(format!("'contains' filter on '{field}' needs a string value")))?;
                format!("{field} LIKE '%{}%'", escape_soql(text))
            }
            (_, op) => format!("{field} {} {}", comparison(op), self.literal(value)?),
        };
        Ok(rendered)
    }

    fn literal(self, value: &JsonValue) -> Result<String> {
        match value {
            JsonValue::String(s) => Ok(match self {
                Dialect::Jql => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
                Dialect::Soql => format!("'{}'", escape_soql(s)),
            }),
            JsonValue::Number(n) => Ok(n.to_string()),
            JsonValue::Bool(b) => Ok(b.to_string()),
            JsonValue::Null => Ok(match self {
                Dialect::Jql => "EMPTY".to_string(),
                Dialect::Soql => "null".to_string(),
            }),
            _ => Err(Error::config("filter values must be scalars")),
        }
    }
}

fn comparison(op: FilterOperator) -> &'static str {
    match op {
        FilterOperator::Eq => "=",
        FilterOperator::NotEq => "!=",
        FilterOperator::Gt => ">",
        FilterOperator::Gte => ">=",
        FilterOperator::Lt => "<",
        FilterOperator::Lte => "<=",
        FilterOperator::Contains => "~",
        FilterOperator::In => "in",
    }
}

fn escape_soql(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('\'', "\\'")
}
