//! XML text to intermediate tree.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, trace};

use crate::element::{Attribute, Content, Element};
use crate::error::{DomXmlError, Result};

/// How the children and attributes of the produced tree are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Order {
    /// Sorted by name, for comparison.
    Canonical,
    /// As found in the source document.
    Document,
}

/// Parse an XML document into its canonical tree.
///
/// Attributes and children are sorted by name, whitespace-only text is
/// dropped, other text is kept verbatim. Comments, processing instructions,
/// the XML declaration and the doctype are skipped.
pub fn xml_to_element(xml: &str) -> Result<Element> {
    read_tree(xml, Order::Canonical)
}

/// Parse an XML document keeping source order of attributes and children.
pub fn xml_to_document_tree(xml: &str) -> Result<Element> {
    read_tree(xml, Order::Document)
}

/// An element whose end tag has not been read yet.
struct Frame {
    name: String,
    attributes: Vec<Attribute>,
    children: Vec<Element>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>, position: usize) -> Result<Self> {
        let name = utf8(start.name().as_ref(), position)?;
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| DomXmlError::parse(position, e.to_string()))?;
            let value = attr
                .unescape_value()
                .map_err(|e| DomXmlError::parse(position, e.to_string()))?;
            attributes.push(Attribute {
                name: utf8(attr.key.as_ref(), position)?,
                value: value.into_owned(),
            });
        }
        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
            text: String::new(),
        })
    }

    fn finish(self, order: Order) -> Element {
        let content = if !self.children.is_empty() {
            // Text around child elements is formatting, not content.
            Content::Children(self.children)
        } else if is_blank(&self.text) {
            Content::Empty
        } else {
            Content::Text(self.text)
        };
        let mut element = Element {
            name: self.name,
            attributes: self.attributes,
            content,
        };
        if order == Order::Canonical {
            // Children are already canonical; sort this level only.
            element.attributes.sort_by(|a, b| a.name.cmp(&b.name));
            if let Content::Children(children) = &mut element.content {
                children.sort_by(|a, b| a.name.cmp(&b.name));
            }
        }
        element
    }
}

fn read_tree(xml: &str, order: Order) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Element> = None;
    let mut count = 0usize;

    loop {
        let position = reader.buffer_position();
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => return Err(DomXmlError::parse(reader.buffer_position(), e.to_string())),
        };

        match event {
            Event::Start(start) => {
                ensure_no_second_root(&stack, &root, position)?;
                stack.push(Frame::open(&start, position)?);
            }
            Event::Empty(start) => {
                ensure_no_second_root(&stack, &root, position)?;
                let element = Frame::open(&start, position)?.finish(order);
                count += 1;
                attach(element, &mut stack, &mut root);
            }
            Event::End(end) => {
                let frame = stack.pop().ok_or_else(|| {
                    DomXmlError::parse(
                        position,
                        format!("unexpected end tag </{}>", String::from_utf8_lossy(end.name().as_ref())),
                    )
                })?;
                trace!(element = %frame.name, "Closed element");
                count += 1;
                let element = frame.finish(order);
                attach(element, &mut stack, &mut root);
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| DomXmlError::parse(position, e.to_string()))?;
                push_text(&mut stack, &text, position)?;
            }
            Event::CData(data) => {
                let text = utf8(&data, position)?;
                push_text(&mut stack, &text, position)?;
            }
            Event::Eof => break,
            // Declaration, comments, processing instructions and doctype
            _ => {}
        }
    }

    if let Some(frame) = stack.last() {
        return Err(DomXmlError::parse(
            reader.buffer_position(),
            format!("unclosed element <{}>", frame.name),
        ));
    }

    let root = root.ok_or_else(|| DomXmlError::parse(0, "document has no root element"))?;
    debug!(
        root = %root.name,
        elements = count,
        canonical = order == Order::Canonical,
        "Parsed XML into intermediate tree"
    );
    Ok(root)
}

fn ensure_no_second_root(stack: &[Frame], root: &Option<Element>, position: usize) -> Result<()> {
    if stack.is_empty() && root.is_some() {
        return Err(DomXmlError::parse(position, "more than one root element"));
    }
    Ok(())
}

fn attach(element: Element, stack: &mut [Frame], root: &mut Option<Element>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}

fn push_text(stack: &mut [Frame], text: &str, position: usize) -> Result<()> {
    match stack.last_mut() {
        Some(frame) => {
            frame.text.push_str(text);
            Ok(())
        }
        None if is_blank(text) => Ok(()),
        None => Err(DomXmlError::parse(position, "text outside of the root element")),
    }
}

/// XML whitespace only (space, tab, carriage return, line feed).
fn is_blank(text: &str) -> bool {
    text.chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
}

fn utf8(bytes: &[u8], position: usize) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| DomXmlError::parse(position, format!("invalid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(element: &Element) -> Vec<&str> {
        element.children().iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_children_and_attributes_sorted() {
        let tree = xml_to_element(
            r#"<domain type="kvm" id="3"><vcpu current="1">2</vcpu><name>vm-foo</name><memory unit="KiB">1024</memory></domain>"#,
        )
        .unwrap();

        assert_eq!(tree.name, "domain");
        let attrs: Vec<_> = tree.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(attrs, ["id", "type"]);
        assert_eq!(names(&tree), ["memory", "name", "vcpu"]);
        assert_eq!(tree.child("vcpu").unwrap().text(), Some("2"));
    }

    #[test]
    fn test_order_invariance() {
        let a = xml_to_element(r#"<os><type arch="x86_64" machine="q35">hvm</type><boot dev="hd"/></os>"#).unwrap();
        let b = xml_to_element(r#"<os><boot dev="hd"/><type machine="q35" arch="x86_64">hvm</type></os>"#).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_whitespace_only_text_suppressed() {
        let tree = xml_to_element("<domain>\n  <features>\n    \n  </features>\n  <name>vm</name>\n</domain>").unwrap();

        assert_eq!(names(&tree), ["features", "name"]);
        assert!(tree.child("features").unwrap().is_empty());
    }

    #[test]
    fn test_text_kept_verbatim() {
        let tree = xml_to_element("<description>  spaced out\n</description>").unwrap();
        assert_eq!(tree.text(), Some("  spaced out\n"));
    }

    #[test]
    fn test_entities_and_cdata() {
        let tree = xml_to_element(
            r#"<domain><title a="x &amp; y">R&amp;D &#65;</title><description><![CDATA[<raw>]]></description></domain>"#,
        )
        .unwrap();

        let title = tree.child("title").unwrap();
        assert_eq!(title.text(), Some("R&D A"));
        assert_eq!(title.attribute("a"), Some("x & y"));
        assert_eq!(tree.child("description").unwrap().text(), Some("<raw>"));
    }

    #[test]
    fn test_empty_attribute_value_kept() {
        let tree = xml_to_element(r#"<graphics type="vnc" passwd=""/>"#).unwrap();
        assert_eq!(tree.attribute("passwd"), Some(""));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_mixed_content_keeps_children_only() {
        let tree = xml_to_element("<os>text<type>hvm</type>tail</os>").unwrap();
        assert_eq!(tree.text(), None);
        assert_eq!(names(&tree), ["type"]);
    }

    #[test]
    fn test_declaration_and_comments_skipped() {
        let tree = xml_to_element(
            "<?xml version=\"1.0\"?>\n<!-- managed --><domain><!-- note --><name>vm</name></domain>\n",
        )
        .unwrap();
        assert_eq!(names(&tree), ["name"]);
    }

    #[test]
    fn test_document_order_preserved() {
        let tree = xml_to_document_tree(r#"<domain b="2" a="1"><vcpu/><name/><memory/></domain>"#).unwrap();

        assert_eq!(names(&tree), ["vcpu", "name", "memory"]);
        assert_eq!(tree.attributes[0].name, "b");
    }

    #[test]
    fn test_malformed_input() {
        let cases = [
            "",
            "   ",
            "<domain>",
            "<domain><name></domain>",
            "<a></b>",
            "</a>",
            "<a/><b/>",
            "<a/>trailing",
            r#"<a x="1" x="2"/>"#,
            "<a>&unknown;</a>",
        ];
        for xml in cases {
            let err = xml_to_element(xml).unwrap_err();
            assert!(matches!(err, DomXmlError::Parse { .. }), "{xml:?} gave {err:?}");
        }
    }
}
