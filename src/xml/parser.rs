//! XML reader
//!
//! A small recursive-descent parser that produces the same tree the
//! serializer consumes. It skips declarations, comments and doctypes,
//! decodes the predefined entities and character references, and keeps
//! CDATA as text. Whitespace-only text beside child elements is treated as
//! indentation and dropped.

use super::types::{XmlAttr, XmlData, XmlSchema, XmlString};
use crate::error::{Error, Result};

/// Parse a document and return its root element
pub fn parse(xml: &str) -> Result<XmlData> {
    let mut cursor = Cursor { input: xml, pos: 0 };
    cursor.skip_misc()?;
    if !cursor.rest().starts_with('<') {
        return Err(Error::xml("input does not appear to be XML"));
    }

    let root = cursor.element()?;
    cursor.skip_misc()?;
    if !cursor.rest().is_empty() {
        return Err(Error::xml(format!(
            "unexpected content after root element <{}>",
            root.xml_name
        )));
    }
    Ok(root)
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.advance(rest.len() - rest.trim_start().len());
    }

    fn skip_past(&mut self, terminator: &str, what: &str) -> Result<()> {
        match self.rest().find(terminator) {
            Some(at) => {
                self.advance(at + terminator.len());
                Ok(())
            }
            None => Err(Error::xml(format!("unterminated {what}"))),
        }
    }

    /// Skip whitespace, declarations, comments and doctypes
    fn skip_misc(&mut self) -> Result<()> {
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.starts_with("<?") {
                self.skip_past("?>", "processing instruction")?;
            } else if rest.starts_with("<!--") {
                self.skip_past("-->", "comment")?;
            } else if rest.starts_with("<!DOCTYPE") {
                self.skip_past(">", "doctype")?;
            } else {
                return Ok(());
            }
        }
    }

    fn name(&mut self) -> Result<&'a str> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '>' | '/' | '='))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(Error::xml("expected a name"));
        }
        self.advance(len);
        Ok(&rest[..len])
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        if self.rest().starts_with(token) {
            self.advance(token.len());
            Ok(())
        } else {
            Err(Error::xml(format!("expected '{token}' at offset {}", self.pos)))
        }
    }

    /// Parse one element starting at `<`
    fn element(&mut self) -> Result<XmlData> {
        self.expect("<")?;
        let mut data = XmlData::new(self.name()?);

        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.starts_with("/>") {
                self.advance(2);
                data.self_closing = true;
                return Ok(data);
            }
            if rest.starts_with('>') {
                self.advance(1);
                break;
            }
            if rest.is_empty() {
                return Err(Error::xml(format!("unterminated tag <{}>", data.xml_name)));
            }
            data.attributes.push(self.attribute()?);
        }

        self.content(&mut data)?;
        Ok(data)
    }

    fn attribute(&mut self) -> Result<XmlAttr> {
        let key = self.name()?.to_string();
        self.skip_whitespace();
        self.expect("=")?;
        self.skip_whitespace();

        let quote = match self.rest().chars().next() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(Error::xml(format!("attribute '{key}' value must be quoted"))),
        };
        self.advance(1);
        let rest = self.rest();
        let end = rest
            .find(quote)
            .ok_or_else(|| Error::xml(format!("unterminated value for attribute '{key}'")))?;
        let value = unescape(&rest[..end])?;
        self.advance(end + 1);
        Ok(XmlAttr { key, value })
    }

    /// Parse children up to and including the matching end tag
    fn content(&mut self, data: &mut XmlData) -> Result<()> {
        let mut text = String::new();
        let mut has_elements = false;

        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return Err(Error::xml(format!("missing closing tag for <{}>", data.xml_name)));
            }

            if rest.starts_with("</") {
                self.advance(2);
                let name = self.name()?;
                if name != data.xml_name {
                    return Err(Error::xml(format!(
                        "mismatched closing tag </{name}> for <{}>",
                        data.xml_name
                    )));
                }
                self.skip_whitespace();
                self.expect(">")?;
                flush_text(data, &mut text);
                if has_elements {
                    drop_indentation(data);
                }
                return Ok(());
            }

            if rest.starts_with("<!--") {
                self.skip_past("-->", "comment")?;
            } else if let Some(after) = rest.strip_prefix("<![CDATA[") {
                let end = after
                    .find("]]>")
                    .ok_or_else(|| Error::xml("unterminated CDATA section"))?;
                text.push_str(&after[..end]);
                self.advance("<![CDATA[".len() + end + 3);
            } else if rest.starts_with("<?") {
                self.skip_past("?>", "processing instruction")?;
            } else if rest.starts_with('<') {
                flush_text(data, &mut text);
                has_elements = true;
                let child = self.element()?;
                data.children.push(XmlSchema::Data(child));
            } else {
                let end = rest.find('<').unwrap_or(rest.len());
                text.push_str(&unescape(&rest[..end])?);
                self.advance(end);
            }
        }
    }
}

fn flush_text(data: &mut XmlData, text: &mut String) {
    if !text.is_empty() {
        data.children
            .push(XmlSchema::String(XmlString(std::mem::take(text))));
    }
}

/// Remove whitespace-only text nodes from an element with child elements
fn drop_indentation(data: &mut XmlData) {
    data.children.retain(|child| match child {
        XmlSchema::String(XmlString(s)) => !s.trim().is_empty(),
        XmlSchema::Data(_) => true,
    });
}

/// Decode predefined entities and numeric character references
pub fn unescape(raw: &str) -> Result<String> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(at) = rest.find('&') {
        out.push_str(&rest[..at]);
        let after = &rest[at + 1..];
        let end = after
            .find(';')
            .ok_or_else(|| Error::xml("unterminated entity reference"))?;
        let entity = &after[..end];
        let decoded = match entity {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            _ => numeric_reference(entity)
                .ok_or_else(|| Error::xml(format!("unknown entity '&{entity};'")))?,
        };
        out.push(decoded);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn numeric_reference(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(code)
}
