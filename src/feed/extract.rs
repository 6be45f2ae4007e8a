//! Default-tolerant field lookups inside a single feed entry.
//!
//! Every lookup searches the entry's whole subtree in the FPDS namespace
//! (first match in document order wins) and falls back to the supplied
//! default when the element, its parent, or the attribute is missing, or
//! when the element carries no text. Absence is the normal case: award-only
//! fields are missing on IDV records and vice versa.

use super::document::{ATOM_NS, Element, FPDS_NS};

/// Text of the first `name` element below `entry`.
pub fn get_text<'a>(entry: &'a Element, name: &str, default: &'a str) -> &'a str {
    entry
        .find(FPDS_NS, name)
        .map(Element::text)
        .filter(|text| !text.is_empty())
        .unwrap_or(default)
}

/// Attribute `attribute` of the first `name` element below `entry`.
pub fn get_attribute<'a>(
    entry: &'a Element,
    name: &str,
    attribute: &str,
    default: &'a str,
) -> &'a str {
    entry
        .find(FPDS_NS, name)
        .and_then(|element| element.attribute(attribute))
        .filter(|value| !value.is_empty())
        .unwrap_or(default)
}

/// Text of the first `child` below the first `parent` below `entry`.
pub fn get_nested_text<'a>(
    entry: &'a Element,
    parent: &str,
    child: &str,
    default: &'a str,
) -> &'a str {
    match entry.find(FPDS_NS, parent) {
        Some(parent) => get_text(parent, child, default),
        None => default,
    }
}

/// Attribute of the first `child` below the first `parent` below `entry`.
pub fn get_nested_attribute<'a>(
    entry: &'a Element,
    parent: &str,
    child: &str,
    attribute: &str,
    default: &'a str,
) -> &'a str {
    match entry.find(FPDS_NS, parent) {
        Some(parent) => get_attribute(parent, child, attribute, default),
        None => default,
    }
}

/// Where a field lives inside an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPath {
    /// Atom-namespace direct child of the entry (`title`, `modified`).
    Entry(&'static str),
    Text(&'static str),
    Attribute(&'static str, &'static str),
    Nested(&'static str, &'static str),
    #[cfg_attr(not(test), allow(dead_code))]
    NestedAttribute(&'static str, &'static str, &'static str),
    /// First path that resolves to something other than the default.
    FirstOf(&'static [FieldPath]),
}

impl FieldPath {
    pub fn resolve<'a>(&self, entry: &'a Element, default: &'a str) -> &'a str {
        match *self {
            FieldPath::Entry(name) => entry
                .child(ATOM_NS, name)
                .map(Element::text)
                .filter(|text| !text.is_empty())
                .unwrap_or(default),
            FieldPath::Text(name) => get_text(entry, name, default),
            FieldPath::Attribute(name, attribute) => get_attribute(entry, name, attribute, default),
            FieldPath::Nested(parent, child) => get_nested_text(entry, parent, child, default),
            FieldPath::NestedAttribute(parent, child, attribute) => {
                get_nested_attribute(entry, parent, child, attribute, default)
            }
            FieldPath::FirstOf(paths) => paths
                .iter()
                .map(|path| path.resolve(entry, default))
                .find(|value| *value != default)
                .unwrap_or(default),
        }
    }
}
