//! The intermediate tree shared by every converter.
//!
//! An [`Element`] mirrors one XML element of the restricted shape used by
//! libvirt domain descriptions: a name, a list of attributes and either text
//! or child elements, never both.

use serde::{Deserialize, Serialize};

/// A single `name="value"` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name
    pub name: String,
    /// Attribute value (unescaped)
    pub value: String,
}

impl Attribute {
    /// Create a new attribute.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// What an element carries besides its attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Content {
    /// Neither text nor children (`<name/>`).
    #[default]
    Empty,
    /// Text content, kept verbatim. `Text("")` is distinct from `Empty`.
    Text(String),
    /// Child elements. Never empty when built through [`Element`] helpers.
    Children(Vec<Element>),
}

/// A node of the intermediate tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Tag name
    pub name: String,
    /// Attributes; sorted by name once the tree is canonical
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
    /// Text or children
    #[serde(default)]
    pub content: Content,
}

impl Element {
    /// Create an element with no attributes and no content.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            content: Content::Empty,
        }
    }

    /// Set an attribute (see [`Element::set_attribute`]).
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Set the text content, replacing any children.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.content = Content::Text(text.into());
        self
    }

    /// Set the children. An empty list leaves the element empty.
    pub fn with_children(mut self, children: Vec<Element>) -> Self {
        self.content = if children.is_empty() {
            Content::Empty
        } else {
            Content::Children(children)
        };
        self
    }

    /// Append one child (see [`Element::push_child`]).
    pub fn with_child(mut self, child: Element) -> Self {
        self.push_child(child);
        self
    }

    /// Append a child. Text content, if any, is dropped.
    pub fn push_child(&mut self, child: Element) {
        match &mut self.content {
            Content::Children(children) => children.push(child),
            content => *content = Content::Children(vec![child]),
        }
    }

    /// Text content, if this is a text element.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Content::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Replace the content with text.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.content = Content::Text(text.into());
    }

    /// Child elements (empty for text and empty elements).
    pub fn children(&self) -> &[Element] {
        match &self.content {
            Content::Children(children) => children,
            _ => &[],
        }
    }

    /// First child with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children().iter().find(|c| c.name == name)
    }

    /// First child with the given name, mutably.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        match &mut self.content {
            Content::Children(children) => children.iter_mut().find(|c| c.name == name),
            _ => None,
        }
    }

    /// Value of the named attribute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute value.
    ///
    /// An existing attribute keeps its position. A new one is inserted at its
    /// sorted position, so a canonical element stays canonical.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(existing) = self.attributes.iter_mut().find(|a| a.name == name) {
            existing.value = value;
            return;
        }
        let index = self
            .attributes
            .partition_point(|a| a.name.as_str() < name.as_str());
        self.attributes.insert(index, Attribute { name, value });
    }

    /// Whether the element has neither text nor children.
    pub fn is_empty(&self) -> bool {
        matches!(self.content, Content::Empty)
    }

    /// Sort attributes and children by name, recursively.
    ///
    /// Both sorts are stable: same-name siblings keep their relative order.
    pub fn canonicalize(&mut self) {
        self.attributes.sort_by(|a, b| a.name.cmp(&b.name));
        if let Content::Children(children) = &mut self.content {
            for child in children.iter_mut() {
                child.canonicalize();
            }
            children.sort_by(|a, b| a.name.cmp(&b.name));
        }
    }

    /// Consume and return the canonical form.
    pub fn into_canonical(mut self) -> Self {
        self.canonicalize();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_attribute_keeps_sorted_order() {
        let element = Element::new("vcpu")
            .with_attribute("placement", "static")
            .with_attribute("current", "1")
            .with_attribute("cpuset", "0-3");

        let names: Vec<_> = element.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["cpuset", "current", "placement"]);
    }

    #[test]
    fn test_set_attribute_replaces_value() {
        let mut element = Element::new("memory").with_attribute("unit", "GiB");
        element.set_attribute("unit", "KiB");

        assert_eq!(element.attributes.len(), 1);
        assert_eq!(element.attribute("unit"), Some("KiB"));
    }

    #[test]
    fn test_empty_children_is_empty_content() {
        let element = Element::new("features").with_children(Vec::new());
        assert!(element.is_empty());
        assert!(element.children().is_empty());
    }

    #[test]
    fn test_push_child_replaces_text() {
        let mut element = Element::new("os").with_text("stale");
        element.push_child(Element::new("type").with_text("hvm"));

        assert_eq!(element.text(), None);
        assert_eq!(element.child("type").and_then(Element::text), Some("hvm"));
    }

    #[test]
    fn test_canonicalize_is_recursive_and_stable() {
        let tree = Element::new("domain")
            .with_child(
                Element::new("devices")
                    .with_child(Element::new("disk").with_attribute("device", "disk"))
                    .with_child(Element::new("controller"))
                    .with_child(Element::new("disk").with_attribute("device", "cdrom")),
            )
            .with_child(Element::new("name").with_text("vm"))
            .into_canonical();

        let names: Vec<_> = tree.children().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["devices", "name"]);

        let devices = tree.child("devices").unwrap();
        let devices: Vec<_> = devices
            .children()
            .iter()
            .map(|c| (c.name.as_str(), c.attribute("device")))
            .collect();
        assert_eq!(
            devices,
            [("controller", None), ("disk", Some("disk")), ("disk", Some("cdrom"))]
        );
    }

    #[test]
    fn test_serde_shape() {
        let element = Element::new("memory")
            .with_attribute("unit", "KiB")
            .with_text("1024");
        let json = serde_json::to_value(&element).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "name": "memory",
                "attributes": [{"name": "unit", "value": "KiB"}],
                "content": {"text": "1024"}
            })
        );
    }
}
