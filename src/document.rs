//! Attribute-Document Reader/Writer
//!
//! Configuration for the flash subsystem travels as a single element whose
//! children are flat `<Name>value</Name>` attribute nodes. The surrounding
//! simulator owns the real document tree; this module is the thin boundary
//! representation the parameter record serializes to and from.
//!
//! Rendering is deterministic (insertion order, fixed indentation) so that
//! serialize -> parse -> serialize round-trips byte for byte.

use thiserror::Error;

/// One element with a flat list of named text attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeElement {
    name: String,
    attributes: Vec<(String, String)>,
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("attribute document is empty")]
    Empty,
    #[error("malformed open tag: `{0}`")]
    MalformedOpenTag(String),
    #[error("malformed attribute line: `{0}`")]
    MalformedAttribute(String),
    #[error("missing close tag for element `{0}`")]
    MissingCloseTag(String),
}

impl AttributeElement {
    pub fn new(name: impl Into<String>) -> Self {
        AttributeElement {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append an attribute. Later pushes with the same name shadow earlier
    /// ones for lookup but both are rendered.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.push((name.into(), value.into()));
    }

    /// First value stored under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Render the element as text, one attribute per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push('<');
        out.push_str(&self.name);
        out.push_str(">\n");
        for (name, value) in &self.attributes {
            out.push_str("    <");
            out.push_str(name);
            out.push('>');
            out.push_str(value);
            out.push_str("</");
            out.push_str(name);
            out.push_str(">\n");
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push_str(">\n");
        out
    }

    /// Parse the textual form produced by [`render`](Self::render).
    ///
    /// Attribute order is irrelevant to consumers; blank lines are skipped.
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

        let open = lines.next().ok_or(DocumentError::Empty)?;
        let name = open
            .strip_prefix('<')
            .and_then(|l| l.strip_suffix('>'))
            .filter(|n| !n.is_empty() && !n.starts_with('/'))
            .ok_or_else(|| DocumentError::MalformedOpenTag(open.to_string()))?
            .to_string();

        let close = format!("</{name}>");
        let mut element = AttributeElement::new(name.clone());
        for line in lines {
            if line == close {
                return Ok(element);
            }
            let (attr, rest) = line
                .strip_prefix('<')
                .and_then(|l| l.split_once('>'))
                .ok_or_else(|| DocumentError::MalformedAttribute(line.to_string()))?;
            let value = rest
                .strip_suffix(&format!("</{attr}>"))
                .ok_or_else(|| DocumentError::MalformedAttribute(line.to_string()))?;
            element.push(attr, value);
        }
        Err(DocumentError::MissingCloseTag(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_parse_round_trip() {
        let mut element = AttributeElement::new("Flash_Parameter_Set");
        element.push("Flash_Technology", "MLC");
        element.push("Page_Capacity", "8192");

        let text = element.render();
        let parsed = AttributeElement::parse(&text).unwrap();
        assert_eq!(parsed, element);
        assert_eq!(parsed.render(), text);
    }

    #[test]
    fn test_lookup() {
        let mut element = AttributeElement::new("E");
        element.push("A", "1");
        element.push("B", "2");
        assert_eq!(element.get("A"), Some("1"));
        assert_eq!(element.get("B"), Some("2"));
        assert_eq!(element.get("C"), None);
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let text = "<E>\n\n    <A>1</A>\n\n</E>\n";
        let parsed = AttributeElement::parse(text).unwrap();
        assert_eq!(parsed.get("A"), Some("1"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            AttributeElement::parse(""),
            Err(DocumentError::Empty)
        ));
        assert!(matches!(
            AttributeElement::parse("garbage\n"),
            Err(DocumentError::MalformedOpenTag(_))
        ));
        assert!(matches!(
            AttributeElement::parse("<E>\n<A>1\n</E>\n"),
            Err(DocumentError::MalformedAttribute(_))
        ));
        assert!(matches!(
            AttributeElement::parse("<E>\n<A>1</A>\n"),
            Err(DocumentError::MissingCloseTag(_))
        ));
    }
}
