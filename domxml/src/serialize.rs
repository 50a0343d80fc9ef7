//! Intermediate tree to XML text.

use std::borrow::Cow;
use std::collections::HashSet;

use quick_xml::escape::escape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::debug;

use crate::element::{Content, Element};
use crate::error::{DomXmlError, Result};

/// Serialize a tree as a compact XML document.
///
/// Attributes and children are written in the order stored in the tree. No
/// XML declaration is emitted and the root element is the document root.
pub fn element_to_xml(element: &Element) -> Result<String> {
    write_document(Writer::new(Vec::new()), element)
}

/// Serialize a tree with one element per line, indented by `indent` spaces.
///
/// Text elements stay on one line, so the output parses back to the same
/// canonical tree as [`element_to_xml`].
pub fn element_to_xml_pretty(element: &Element, indent: usize) -> Result<String> {
    if indent == 0 {
        return element_to_xml(element);
    }
    write_document(Writer::new_with_indent(Vec::new(), b' ', indent), element)
}

fn write_document(mut writer: Writer<Vec<u8>>, element: &Element) -> Result<String> {
    write_element(&mut writer, element)?;
    let xml = String::from_utf8(writer.into_inner())
        .map_err(|e| DomXmlError::Serialization(e.to_string()))?;
    debug!(root = %element.name, bytes = xml.len(), "Serialized intermediate tree");
    Ok(xml)
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    if !is_valid_name(&element.name) {
        return Err(DomXmlError::Serialization(format!(
            "invalid element name {:?}",
            element.name
        )));
    }

    let mut start = BytesStart::new(element.name.as_str());
    let mut seen = HashSet::with_capacity(element.attributes.len());
    for attribute in &element.attributes {
        if !is_valid_name(&attribute.name) {
            return Err(DomXmlError::Serialization(format!(
                "invalid attribute name {:?} on <{}>",
                attribute.name, element.name
            )));
        }
        if !seen.insert(attribute.name.as_str()) {
            return Err(DomXmlError::Serialization(format!(
                "duplicate attribute {:?} on <{}>",
                attribute.name, element.name
            )));
        }
        let value = escape_attribute_value(&attribute.value);
        start.push_attribute((attribute.name.as_bytes(), value.as_bytes()));
    }

    match &element.content {
        Content::Empty => emit(writer, Event::Empty(start)),
        Content::Text(text) => {
            emit(writer, Event::Start(start))?;
            // Written even when empty so `Text("")` stays `<name></name>`.
            emit(writer, Event::Text(BytesText::new(text)))?;
            emit(writer, Event::End(BytesEnd::new(element.name.as_str())))
        }
        Content::Children(children) if children.is_empty() => emit(writer, Event::Empty(start)),
        Content::Children(children) => {
            emit(writer, Event::Start(start))?;
            for child in children {
                write_element(writer, child)?;
            }
            emit(writer, Event::End(BytesEnd::new(element.name.as_str())))
        }
    }
}

/// Escape markup characters and write `\n`, `\r` and `\t` as character
/// references, which attribute-value normalization would otherwise turn into
/// spaces.
fn escape_attribute_value(value: &str) -> Cow<'_, str> {
    let escaped = escape(value);
    if !escaped.contains(['\n', '\r', '\t']) {
        return escaped;
    }
    let mut out = String::with_capacity(escaped.len() + 8);
    for c in escaped.chars() {
        match c {
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| DomXmlError::Serialization(e.to_string()))
}

/// Whether `name` is usable as an XML element or attribute name.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' || first == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '.' | '_' | ':'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::xml_to_element;

    fn domain() -> Element {
        Element::new("domain")
            .with_attribute("type", "kvm")
            .with_child(Element::new("name").with_text("vm-foo"))
            .with_child(
                Element::new("memory")
                    .with_attribute("unit", "GiB")
                    .with_text("1"),
            )
            .with_child(Element::new("os").with_child(Element::new("type").with_text("hvm")))
            .with_child(Element::new("features"))
    }

    #[test]
    fn test_compact_output() {
        let xml = element_to_xml(&domain()).unwrap();
        assert_eq!(
            xml,
            r#"<domain type="kvm"><name>vm-foo</name><memory unit="GiB">1</memory><os><type>hvm</type></os><features/></domain>"#
        );
    }

    #[test]
    fn test_explicit_empty_text() {
        let xml = element_to_xml(&Element::new("title").with_text("")).unwrap();
        assert_eq!(xml, "<title></title>");
    }

    #[test]
    fn test_escaping() {
        let element = Element::new("title")
            .with_attribute("note", "a \"quoted\" <value>")
            .with_text("R&D <lab>");
        let xml = element_to_xml(&element).unwrap();

        let parsed = xml_to_element(&xml).unwrap();
        assert_eq!(parsed, element);
    }

    #[test]
    fn test_round_trip_canonical() {
        let tree = domain().into_canonical();
        let xml = element_to_xml(&tree).unwrap();
        assert_eq!(xml_to_element(&xml).unwrap(), tree);
    }

    #[test]
    fn test_pretty_round_trip() {
        let tree = domain().into_canonical();
        let xml = element_to_xml_pretty(&tree, 2).unwrap();

        assert!(xml.contains("\n  <name>vm-foo</name>"));
        assert!(xml.contains("\n    <type>hvm</type>"));
        assert_eq!(xml_to_element(&xml).unwrap(), tree);
    }

    #[test]
    fn test_pretty_keeps_empty_text_inline() {
        let tree = Element::new("domain").with_child(Element::new("title").with_text(""));
        let xml = element_to_xml_pretty(&tree, 2).unwrap();
        assert!(xml.contains("<title></title>"));
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", "1abc", "has space", "a<b"] {
            let err = element_to_xml(&Element::new(name)).unwrap_err();
            assert!(matches!(err, DomXmlError::Serialization(_)), "{name:?}");
        }

        let bad_attribute = Element::new("domain").with_attribute("bad name", "x");
        assert!(matches!(
            element_to_xml(&bad_attribute),
            Err(DomXmlError::Serialization(_))
        ));
    }

    #[test]
    fn test_invalid_nested_name_aborts() {
        let tree = Element::new("domain").with_child(Element::new("os").with_child(Element::new("")));
        assert!(element_to_xml(&tree).is_err());
    }

    #[test]
    fn test_duplicate_attribute_rejected() {
        let mut element = Element::new("vcpu");
        element.attributes.push(crate::element::Attribute::new("current", "1"));
        element.attributes.push(crate::element::Attribute::new("current", "2"));
        assert!(matches!(
            element_to_xml(&element),
            Err(DomXmlError::Serialization(_))
        ));
    }

    #[test]
    fn test_valid_names() {
        for name in ["domain", "currentMemory", "_x", "ns:tag", "a-b.c_d", "é"] {
            assert!(is_valid_name(name), "{name:?}");
        }
    }

    #[test]
    fn test_attribute_whitespace_written_as_references() {
        let element = Element::new("disk").with_attribute("serial", "a\nb\tc\rd & \"e\"");
        let xml = element_to_xml(&element).unwrap();

        assert_eq!(xml, r#"<disk serial="a&#10;b&#9;c&#13;d &amp; &quot;e&quot;"/>"#);
        assert_eq!(xml_to_element(&xml).unwrap(), element);
    }
}
