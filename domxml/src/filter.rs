//! Declarative XML subtree filter.
//!
//! A [`FilterSpec`] names the root element and, recursively, which attributes
//! and child elements to keep. Everything else is dropped. Unlike the
//! canonical parser, the filter keeps the source order of attributes and
//! elements: its output is a projection of the input document.
//!
//! Specs can be built in code or deserialized from the nested mapping form:
//!
//! ```yaml
//! domain:
//!   __attributes__: [type]
//!   name: {}
//!   title: { required: false }
//!   os:
//!     type: {}
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::de::{self, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::Deserialize;
use tracing::debug;

use crate::element::{Content, Element};
use crate::error::{DomXmlError, Result};
use crate::parse::xml_to_document_tree;
use crate::serialize::element_to_xml;

/// Reserved key listing the attributes to keep.
pub const ATTRIBUTES_KEY: &str = "__attributes__";

/// Reserved key carrying the `required` flag.
pub const REQUIRED_KEY: &str = "required";

/// Selection for one element of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterNode {
    attributes: BTreeSet<String>,
    children: BTreeMap<String, FilterNode>,
    required: bool,
}

impl Default for FilterNode {
    fn default() -> Self {
        Self {
            attributes: BTreeSet::new(),
            children: BTreeMap::new(),
            required: true,
        }
    }
}

impl FilterNode {
    /// A required node that keeps no attributes and no children.
    pub fn new() -> Self {
        Self::default()
    }

    /// A node whose absence is not reported.
    pub fn optional() -> Self {
        Self::default().required(false)
    }

    /// Keep the named attribute.
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.attributes.insert(name.into());
        self
    }

    /// Keep the named child element, filtered by `node`.
    pub fn child(mut self, name: impl Into<String>, node: FilterNode) -> Self {
        self.children.insert(name.into(), node);
        self
    }

    /// Set whether the node must be present in the source.
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Attributes kept on matching elements.
    pub fn attributes(&self) -> &BTreeSet<String> {
        &self.attributes
    }

    /// Child selections by element name.
    pub fn children(&self) -> &BTreeMap<String, FilterNode> {
        &self.children
    }

    /// Whether the node must be present in the source.
    pub fn is_required(&self) -> bool {
        self.required
    }
}

/// A complete filter: the expected root element and its selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    root: String,
    node: FilterNode,
}

impl FilterSpec {
    /// Create a filter for documents whose root is `root`.
    pub fn new(root: impl Into<String>, node: FilterNode) -> Self {
        Self {
            root: root.into(),
            node,
        }
    }

    /// Parse a filter from its JSON mapping form.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| DomXmlError::InvalidFilterSpec(e.to_string()))
    }

    /// Name of the expected root element.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Selection applied to the root element.
    pub fn node(&self) -> &FilterNode {
        &self.node
    }
}

/// Output of [`apply_filter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filtered {
    /// The projected document, in source order.
    pub document: Element,
    /// Paths (`/domain/uuid`) of required elements absent from the source.
    pub missing_required: Vec<String>,
}

impl Filtered {
    /// Whether every required element was found.
    pub fn is_complete(&self) -> bool {
        self.missing_required.is_empty()
    }

    /// Fail with [`DomXmlError::MissingRequired`] if a required element was absent.
    pub fn require_complete(self) -> Result<Self> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(DomXmlError::MissingRequired(self.missing_required))
        }
    }

    /// Serialize the projected document.
    pub fn to_xml(&self) -> Result<String> {
        element_to_xml(&self.document)
    }
}

/// Filter an XML document and return the projected XML.
///
/// Missing elements are left out silently, required or not. Use
/// [`apply_filter`] to find out which required elements were absent.
pub fn filter_xml(spec: &FilterSpec, xml: &str) -> Result<String> {
    apply_filter(spec, xml)?.to_xml()
}

/// Filter an XML document, reporting missing required elements.
pub fn apply_filter(spec: &FilterSpec, xml: &str) -> Result<Filtered> {
    let source = xml_to_document_tree(xml)?;
    filter_tree(spec, &source)
}

/// Filter a tree that is already parsed (in document order).
pub fn filter_tree(spec: &FilterSpec, source: &Element) -> Result<Filtered> {
    if source.name != spec.root {
        return Err(DomXmlError::FilterRootMismatch {
            expected: spec.root.clone(),
            found: source.name.clone(),
        });
    }

    let mut missing_required = Vec::new();
    let path = format!("/{}", spec.root);
    let document = project(source, &spec.node, &path, &mut missing_required);
    debug!(
        root = %spec.root,
        kept = document.children().len(),
        missing = missing_required.len(),
        "Filtered XML document"
    );
    Ok(Filtered {
        document,
        missing_required,
    })
}

fn project(source: &Element, node: &FilterNode, path: &str, missing: &mut Vec<String>) -> Element {
    for (name, child) in &node.children {
        if child.required && source.child(name).is_none() {
            // Repeated siblings share a path; report it once.
            let missing_path = format!("{path}/{name}");
            if !missing.contains(&missing_path) {
                missing.push(missing_path);
            }
        }
    }

    let attributes = source
        .attributes
        .iter()
        .filter(|a| node.attributes.contains(&a.name))
        .cloned()
        .collect();

    let content = match &source.content {
        Content::Empty => Content::Empty,
        Content::Text(text) => Content::Text(text.clone()),
        Content::Children(children) => {
            let kept: Vec<Element> = children
                .iter()
                .filter_map(|child| {
                    let spec = node.children.get(&child.name)?;
                    let child_path = format!("{path}/{}", child.name);
                    Some(project(child, spec, &child_path, missing))
                })
                .collect();
            if kept.is_empty() {
                Content::Empty
            } else {
                Content::Children(kept)
            }
        }
    };

    Element {
        name: source.name.clone(),
        attributes,
        content,
    }
}

// =============================================================================
// DESERIALIZATION
// =============================================================================

impl<'de> Deserialize<'de> for FilterNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(FilterNodeVisitor)
    }
}

/// Value under a `required` key: the flag, or a child element named `required`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RequiredEntry {
    Flag(bool),
    Element(FilterNode),
}

struct FilterNodeVisitor;

impl<'de> Visitor<'de> for FilterNodeVisitor {
    type Value = FilterNode;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping of attribute selections and child elements")
    }

    // `name: ~` selects an element with nothing below it.
    fn visit_unit<E: de::Error>(self) -> std::result::Result<FilterNode, E> {
        Ok(FilterNode::default())
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<FilterNode, E> {
        Ok(FilterNode::default())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<FilterNode, A::Error> {
        let mut node = FilterNode::default();
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                ATTRIBUTES_KEY => node.attributes.extend(map.next_value::<Vec<String>>()?),
                REQUIRED_KEY => match map.next_value::<RequiredEntry>()? {
                    RequiredEntry::Flag(required) => node.required = required,
                    RequiredEntry::Element(child) => insert_child::<A::Error>(&mut node, key, child)?,
                },
                _ => {
                    let child = map.next_value::<FilterNode>()?;
                    insert_child::<A::Error>(&mut node, key, child)?;
                }
            }
        }
        Ok(node)
    }
}

fn insert_child<E: de::Error>(node: &mut FilterNode, name: String, child: FilterNode) -> std::result::Result<(), E> {
    if name.is_empty() {
        return Err(E::custom("element names must not be empty"));
    }
    if node.children.contains_key(&name) {
        return Err(E::custom(format!("element {name:?} selected twice")));
    }
    node.children.insert(name, child);
    Ok(())
}

impl<'de> Deserialize<'de> for FilterSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(FilterSpecVisitor)
    }
}

struct FilterSpecVisitor;

impl<'de> Visitor<'de> for FilterSpecVisitor {
    type Value = FilterSpec;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping with exactly one root element")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<FilterSpec, A::Error> {
        let Some((root, node)) = map.next_entry::<String, FilterNode>()? else {
            return Err(de::Error::custom("filter specification names no root element"));
        };
        if map.next_key::<IgnoredAny>()?.is_some() {
            return Err(de::Error::custom(
                "filter specification must name exactly one root element",
            ));
        }
        if root.is_empty() {
            return Err(de::Error::custom("root element name must not be empty"));
        }
        Ok(FilterSpec { root, node })
    }
}
