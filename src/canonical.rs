//! Canonical text form of decoded resources.
//!
//! Two compiled files that describe the same animation produce the same text, whatever
//! their string pool layout or attribute order, so the text can be hashed for dedup.

use crate::DecodeError;
use crate::value::is_reference;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use sha2::{Digest, Sha256};

/// An attribute with its value already rendered to text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Qualified name, e.g. `android:duration`
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Name without its namespace prefix
    pub fn local_name(&self) -> &str {
        self.name
            .split_once(':')
            .map_or(self.name.as_str(), |(_, local)| local)
    }

    pub fn is_reference(&self) -> bool {
        is_reference(Some(&self.value))
    }
}

/// A decoded element with text attribute values
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    /// Namespace declarations as (prefix, uri)
    pub namespaces: Vec<(String, String)>,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Look an attribute up by its unprefixed name
    pub fn attribute(&self, local_name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|attr| attr.local_name() == local_name)
    }

    /// Attributes in this subtree that still point at other resources
    pub fn references(&self) -> Vec<&Attribute> {
        let mut found: Vec<&Attribute> = self
            .attributes
            .iter()
            .filter(|attr| attr.is_reference())
            .collect();
        for child in &self.children {
            found.extend(child.references());
        }
        found
    }

    /// Render the canonical XML text of this element tree
    pub fn to_canonical_xml(&self) -> Result<String, DecodeError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(|e| DecodeError::Serialize(e.to_string()))?;
        write_element(&mut writer, self)?;

        String::from_utf8(writer.into_inner())
            .map_err(|_| DecodeError::Serialize("Invalid UTF-8 in output".to_string()))
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), DecodeError> {
    let mut start = BytesStart::new(element.name.as_str());

    let mut namespaces: Vec<&(String, String)> = element.namespaces.iter().collect();
    namespaces.sort();
    for (prefix, uri) in namespaces {
        let key = if prefix.is_empty() {
            "xmlns".to_string()
        } else {
            format!("xmlns:{}", prefix)
        };
        start.push_attribute((key.as_str(), uri.as_str()));
    }

    let mut attributes: Vec<&Attribute> = element.attributes.iter().collect();
    attributes.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.value.cmp(&b.value)));
    for attr in attributes {
        start.push_attribute((attr.name.as_str(), attr.value.as_str()));
    }

    let serialize = |e: std::io::Error| DecodeError::Serialize(e.to_string());
    if element.children.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(serialize)?;
    } else {
        writer.write_event(Event::Start(start)).map_err(serialize)?;
        for child in &element.children {
            write_element(writer, child)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(element.name.as_str())))
            .map_err(serialize)?;
    }
    Ok(())
}

/// SHA-256 of the canonical text, lowercase hex
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ANDROID_NS;

    fn fade_in() -> Element {
        let mut alpha = Element::new("alpha");
        alpha.attributes = vec![
            Attribute::new("android:toAlpha", "1.0"),
            Attribute::new("android:fromAlpha", "0.0"),
            Attribute::new("android:duration", "500"),
        ];
        let mut set = Element::new("set");
        set.namespaces = vec![("android".to_string(), ANDROID_NS.to_string())];
        set.attributes = vec![Attribute::new("android:interpolator", "@0x010c000d")];
        set.children = vec![alpha];
        set
    }

    #[test]
    fn test_canonical_xml_layout() {
        let xml = fade_in().to_canonical_xml().unwrap();
        let expected = [
            r#"<?xml version="1.0" encoding="utf-8"?>"#,
            r#"<set xmlns:android="http://schemas.android.com/apk/res/android" android:interpolator="@0x010c000d">"#,
            r#"    <alpha android:duration="500" android:fromAlpha="0.0" android:toAlpha="1.0"/>"#,
            r#"</set>"#,
        ]
        .join("\n");
        assert_eq!(xml, expected);
    }

    #[test]
    fn test_attribute_order_does_not_change_content() {
        let mut shuffled = fade_in();
        shuffled.children[0].attributes.reverse();
        assert_eq!(
            fade_in().to_canonical_xml().unwrap(),
            shuffled.to_canonical_xml().unwrap()
        );
    }

    #[test]
    fn test_values_are_escaped() {
        let mut element = Element::new("linearInterpolator");
        element.attributes = vec![Attribute::new("note", "a<b & \"c\"")];
        let xml = element.to_canonical_xml().unwrap();
        assert!(xml.contains(r#"note="a&lt;b &amp; &quot;c&quot;""#));
    }

    #[test]
    fn test_references_and_lookup() {
        let set = fade_in();
        let references = set.references();
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].local_name(), "interpolator");
        assert_eq!(
            set.children[0].attribute("fromAlpha").map(|a| a.value.as_str()),
            Some("0.0")
        );
        assert!(set.attribute("duration").is_none());
    }

    #[test]
    fn test_content_hash() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        let xml = fade_in().to_canonical_xml().unwrap();
        assert_eq!(content_hash(&xml), content_hash(&xml));
        assert_eq!(content_hash(&xml).len(), 64);
    }
}
