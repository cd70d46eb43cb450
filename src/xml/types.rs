//! XML document tree

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

/// Element and attribute names: a letter or underscore, then letters,
/// digits, `_`, `:` or `-`
static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_:\-]*$").expect("XML name pattern is valid"));

/// One attribute, kept in insertion order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlAttr {
    pub key: String,
    pub value: String,
}

/// Text leaf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct XmlString(pub String);

/// A child node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum XmlSchema {
    /// Text
    String(XmlString),
    /// Nested element
    Data(XmlData),
}

/// An element with ordered attributes and children
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XmlData {
    pub xml_name: String,
    #[serde(default)]
    pub attributes: Vec<XmlAttr>,
    #[serde(default)]
    pub children: Vec<XmlSchema>,
    #[serde(default)]
    pub self_closing: bool,
}

impl XmlData {
    /// Element with no attributes or children
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            xml_name: name.into(),
            ..Self::default()
        }
    }

    /// Element holding a single text child (`<name>text</name>`)
    pub fn text_element(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name).with_text(text)
    }

    /// Append an attribute
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(XmlAttr {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Append a child element
    #[must_use]
    pub fn with_child(mut self, child: XmlData) -> Self {
        self.children.push(XmlSchema::Data(child));
        self
    }

    /// Append a text child
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlSchema::String(XmlString(text.into())));
        self
    }

    /// Mark as self-closing
    #[must_use]
    pub fn self_closing(mut self) -> Self {
        self.self_closing = true;
        self
    }

    /// Attribute value by key
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }

    /// Child elements with the given name. A prefixed name (`ns:result`)
    /// also matches its local part (`result`).
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlData> + 'a {
        self.children.iter().filter_map(move |child| match child {
            XmlSchema::Data(data) if local_name(&data.xml_name) == name || data.xml_name == name => Some(data),
            _ => None,
        })
    }

    /// First child element with the given name
    pub fn child(&self, name: &str) -> Option<&XmlData> {
        self.children.iter().find_map(|child| match child {
            XmlSchema::Data(data) if local_name(&data.xml_name) == name || data.xml_name == name => Some(data),
            _ => None,
        })
    }

    /// Every descendant element with the given name, depth first
    pub fn descendants_named<'a>(&'a self, name: &str, out: &mut Vec<&'a XmlData>) {
        for child in &self.children {
            if let XmlSchema::Data(data) = child {
                if local_name(&data.xml_name) == name || data.xml_name == name {
                    out.push(data);
                }
                data.descendants_named(name, out);
            }
        }
    }

    /// Concatenated text of the direct text children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                XmlSchema::String(XmlString(s)) => Some(s.as_str()),
                XmlSchema::Data(_) => None,
            })
            .collect()
    }

    /// Text of a child element
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).map(XmlData::text)
    }

    /// Check the tree: names are well formed, attribute keys are unique,
    /// self-closing elements have no children.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.xml_name, "element")?;

        let mut seen = HashSet::new();
        for attr in &self.attributes {
            validate_name(&attr.key, "attribute")?;
            if !seen.insert(attr.key.as_str()) {
                return Err(Error::config(format!(
                    "duplicate attribute '{}' on <{}>",
                    attr.key, self.xml_name
                )));
            }
        }

        if self.self_closing && !self.children.is_empty() {
            return Err(Error::config(format!(
                "self-closing element <{}> cannot have children",
                self.xml_name
            )));
        }

        for child in &self.children {
            if let XmlSchema::Data(data) = child {
                data.validate()?;
            }
        }
        Ok(())
    }
}

fn validate_name(name: &str, what: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::config(format!("XML {what} name cannot be empty")));
    }
    if !NAME_REGEX.is_match(name) {
        return Err(Error::config(format!("invalid XML {what} name '{name}'")));
    }
    Ok(())
}

fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

// ============================================================================
// Serialization
// ============================================================================

impl fmt::Display for XmlData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.xml_name)?;
        for attr in &self.attributes {
            write!(f, " {}=\"{}\"", attr.key, escape(&attr.value, true))?;
        }
        if self.self_closing {
            return f.write_str("/>");
        }
        f.write_str(">")?;
        for child in &self.children {
            write!(f, "{child}")?;
        }
        write!(f, "</{}>", self.xml_name)
    }
}

impl fmt::Display for XmlSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XmlSchema::String(text) => write!(f, "{text}"),
            XmlSchema::Data(data) => write!(f, "{data}"),
        }
    }
}

impl fmt::Display for XmlString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&escape(&self.0, false))
    }
}

impl From<XmlData> for XmlSchema {
    fn from(data: XmlData) -> Self {
        XmlSchema::Data(data)
    }
}

impl From<&str> for XmlSchema {
    fn from(text: &str) -> Self {
        XmlSchema::String(XmlString(text.to_string()))
    }
}

/// Escape markup characters; quotes only inside attribute values
pub fn escape(raw: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\'' if attribute => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}
