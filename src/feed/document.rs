//! Owned, namespace-resolved element tree built from a feed response.
//!
//! The feed schema is deeply optional, so lookups walk a small in-memory
//! tree instead of a streaming cursor. The tree is built in one pass over
//! `quick-xml` events; namespace prefixes are resolved to their URIs so that
//! callers match on `(namespace, local name)` regardless of the prefix the
//! server happened to choose.

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use thiserror::Error;

/// Namespace of the Atom envelope: `feed`, `entry`, `title`, `modified`, `link`.
pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

/// Namespace of every contract field inside an entry's content.
pub const FPDS_NS: &str = "https://www.fpds.gov/FPDS";

/// The body could not be turned into an element tree.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct MalformedXml(pub String);

fn malformed(reason: impl Into<String>) -> MalformedXml {
    MalformedXml(reason.into())
}

/// One XML element with its resolved namespace, attributes, text and children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    namespace: Option<String>,
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when this element is `{ns}name`.
    pub fn is(&self, ns: &str, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(ns)
    }

    /// Character data directly inside this element, trimmed.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Attribute value by local name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Direct children named `{ns}name`, in document order.
    pub fn children_named<'a>(
        &'a self,
        ns: &'a str,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.is(ns, name))
    }

    /// First direct child named `{ns}name`.
    pub fn child(&self, ns: &str, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.is(ns, name))
    }

    /// First descendant named `{ns}name` in document order, excluding `self`.
    pub fn find(&self, ns: &str, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|c| {
            if c.is(ns, name) {
                Some(c)
            } else {
                c.find(ns, name)
            }
        })
    }

    fn close(&mut self) {
        let trimmed = self.text.trim();
        if trimmed.len() != self.text.len() {
            self.text = trimmed.to_string();
        }
    }
}

/// Parse a full XML document into its root element.
///
/// Fails on syntax errors, mismatched or unclosed tags, unknown entities,
/// an empty body, or more than one root element.
pub fn parse_document(xml: &str) -> Result<Element, MalformedXml> {
    let mut reader = NsReader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let (resolved, event) = match reader.read_resolved_event() {
            Ok(pair) => pair,
            Err(e) => return Err(malformed(e.to_string())),
        };
        let namespace = match resolved {
            ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.0).into_owned()),
            _ => None,
        };

        match event {
            Event::Start(start) => stack.push(open_element(namespace, &start)?),
            Event::Empty(start) => {
                let element = open_element(namespace, &start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| malformed("closing tag without an open element"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    let decoded = text.decode().map_err(|e| malformed(e.to_string()))?;
                    current.text.push_str(&decoded);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::GeneralRef(reference) => {
                let resolved = match reference
                    .resolve_char_ref()
                    .map_err(|e| malformed(e.to_string()))?
                {
                    Some(ch) => ch.to_string(),
                    None => {
                        let name = reference.decode().map_err(|e| malformed(e.to_string()))?;
                        resolve_predefined_entity(&name)
                            .ok_or_else(|| malformed(format!("unknown entity &{name};")))?
                            .to_string()
                    }
                };
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&resolved);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(malformed(format!(
            "document ended with {} unclosed element(s)",
            stack.len()
        )));
    }
    root.ok_or_else(|| malformed("document has no root element"))
}

fn open_element(namespace: Option<String>, start: &BytesStart<'_>) -> Result<Element, MalformedXml> {
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| malformed(e.to_string()))?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        let name = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| malformed(e.to_string()))?
            .into_owned();
        attributes.push((name, value));
    }

    Ok(Element {
        namespace,
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        attributes,
        text: String::new(),
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    mut element: Element,
) -> Result<(), MalformedXml> {
    element.close();
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(malformed("document has more than one root element")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:ns1="https://www.fpds.gov/FPDS">
  <title type="html">Search Results</title>
  <entry>
    <title>First</title>
    <content>
      <ns1:award>
        <ns1:outer>
          <ns1:PIID>INNER</ns1:PIID>
        </ns1:outer>
        <ns1:PIID>LATER</ns1:PIID>
        <ns1:vendorName>AT&amp;T &#8211; Federal</ns1:vendorName>
        <ns1:note><![CDATA[a < b]]></ns1:note>
        <ns1:agencyID name="GSA &amp; Co"/>
      </ns1:award>
    </content>
  </entry>
</feed>"#;

    #[test]
    fn test_resolves_namespaces_regardless_of_prefix() {
        let root = parse_document(SAMPLE).unwrap();
        assert!(root.is(ATOM_NS, "feed"));
        let entry = root.child(ATOM_NS, "entry").unwrap();
        assert!(entry.find(FPDS_NS, "award").is_some());
        assert!(entry.find(ATOM_NS, "award").is_none());
    }

    #[test]
    fn test_find_is_preorder_first_match() {
        let root = parse_document(SAMPLE).unwrap();
        let entry = root.child(ATOM_NS, "entry").unwrap();
        assert_eq!(entry.find(FPDS_NS, "PIID").unwrap().text(), "INNER");
    }

    #[test]
    fn test_find_excludes_self() {
        let root = parse_document(SAMPLE).unwrap();
        let entry = root.child(ATOM_NS, "entry").unwrap();
        assert!(entry.find(ATOM_NS, "entry").is_none());
    }

    #[test]
    fn test_entities_and_cdata_are_resolved() {
        let root = parse_document(SAMPLE).unwrap();
        assert_eq!(
            root.find(FPDS_NS, "vendorName").unwrap().text(),
            "AT&T \u{2013} Federal"
        );
        assert_eq!(root.find(FPDS_NS, "note").unwrap().text(), "a < b");
        assert_eq!(
            root.find(FPDS_NS, "agencyID").unwrap().attribute("name"),
            Some("GSA & Co")
        );
    }

    #[test]
    fn test_parent_text_is_blank_after_trim() {
        let root = parse_document(SAMPLE).unwrap();
        assert_eq!(root.find(FPDS_NS, "award").unwrap().text(), "");
        assert_eq!(root.child(ATOM_NS, "title").unwrap().attribute("type"), Some("html"));
    }

    #[test]
    fn test_namespace_declarations_are_not_attributes() {
        let root = parse_document(SAMPLE).unwrap();
        assert_eq!(root.attribute("xmlns"), None);
        assert_eq!(root.attribute("ns1"), None);
    }

    #[test]
    fn test_rejects_empty_body() {
        assert!(parse_document("").is_err());
        assert!(parse_document("   ").is_err());
    }

    #[test]
    fn test_rejects_unclosed_elements() {
        let err = parse_document("<feed><entry></entry>").unwrap_err();
        assert!(err.0.contains("unclosed"));
    }

    #[test]
    fn test_rejects_mismatched_tags() {
        assert!(parse_document("<feed><entry></feed></entry>").is_err());
    }

    #[test]
    fn test_rejects_multiple_roots() {
        assert!(parse_document("<a/><b/>").is_err());
    }
}
