use crate::{AxmlError, NO_INDEX, UTF8_FLAG};
use crate::{RES_NULL_TYPE, RES_STRING_POOL_TYPE, RES_XML_CDATA_TYPE, RES_XML_RESOURCE_MAP_TYPE};
use crate::{RES_XML_END_ELEMENT_TYPE, RES_XML_END_NAMESPACE_TYPE, RES_XML_TYPE};
use crate::{RES_XML_START_ELEMENT_TYPE, RES_XML_START_NAMESPACE_TYPE};
use std::io::{Read, Seek, SeekFrom};
use tracing::debug;

type Result<T> = std::result::Result<T, AxmlError>;

/// Little-endian reader for compiled resource chunks
pub struct ChunkReader<R: Read + Seek> {
    reader: R,
}

impl<R: Read + Seek> ChunkReader<R> {
    /// Create a new ChunkReader
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read a single byte
    pub fn read_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.reader
            .read_exact(&mut buf)
            .map_err(|_| AxmlError::ReadError("byte".to_string()))?;
        Ok(buf[0])
    }

    /// Read a 16-bit unsigned integer (little-endian)
    pub fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.reader
            .read_exact(&mut buf)
            .map_err(|_| AxmlError::ReadError("u16".to_string()))?;
        Ok(u16::from_le_bytes(buf))
    }

    /// Read a 32-bit unsigned integer (little-endian)
    pub fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.reader
            .read_exact(&mut buf)
            .map_err(|_| AxmlError::ReadError("u32".to_string()))?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Read a byte array of specified length
    pub fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>> {
        let mut data = vec![0u8; length];
        self.reader
            .read_exact(&mut data)
            .map_err(|_| AxmlError::ReadError("bytes".to_string()))?;
        Ok(data)
    }

    /// Get current position in the stream
    pub fn tell(&mut self) -> Result<u64> {
        self.reader.stream_position().map_err(AxmlError::Io)
    }

    /// Seek to a specific position in the stream
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        self.reader.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    /// Total length of the stream, leaving the position untouched
    pub fn stream_len(&mut self) -> Result<u64> {
        let current = self.tell()?;
        let end = self.reader.seek(SeekFrom::End(0))?;
        self.seek(current)?;
        Ok(end)
    }

    fn read_chunk_header(&mut self) -> Result<ChunkHeader> {
        let offset = self.tell()?;
        Ok(ChunkHeader {
            chunk_type: self.read_u16()?,
            header_size: self.read_u16()?,
            size: self.read_u32()?,
            offset,
        })
    }

    /// Read a length-prefixed UTF-16 pool string
    fn read_utf16(&mut self, limit: u64) -> Result<String> {
        let mut length = self.read_u16()? as u64;
        if length & 0x8000 != 0 {
            length = ((length & 0x7FFF) << 16) | self.read_u16()? as u64;
        }
        if self.tell()? + length * 2 > limit {
            return Err(AxmlError::ReadError("UTF-16 string (length past chunk end)".to_string()));
        }
        let mut units = Vec::with_capacity(length as usize);
        for _ in 0..length {
            units.push(self.read_u16()?);
        }
        String::from_utf16(&units)
            .map_err(|_| AxmlError::ReadError("UTF-16 string (invalid UTF-16)".to_string()))
    }

    /// Read a length-prefixed UTF-8 pool string
    fn read_utf8(&mut self, limit: u64) -> Result<String> {
        // utf-16 length first, only the byte length matters here
        let _ = self.read_utf8_length()?;
        let length = self.read_utf8_length()? as u64;
        if self.tell()? + length > limit {
            return Err(AxmlError::ReadError("UTF-8 string (length past chunk end)".to_string()));
        }
        let buffer = self.read_bytes(length as usize)?;
        String::from_utf8(buffer)
            .map_err(|_| AxmlError::ReadError("UTF-8 string (invalid UTF-8)".to_string()))
    }

    fn read_utf8_length(&mut self) -> Result<u16> {
        let first = self.read_byte()? as u16;
        if first & 0x80 != 0 {
            Ok(((first & 0x7F) << 8) | self.read_byte()? as u16)
        } else {
            Ok(first)
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ChunkHeader {
    chunk_type: u16,
    header_size: u16,
    size: u32,
    offset: u64,
}

impl ChunkHeader {
    fn end(&self) -> u64 {
        self.offset + self.size as u64
    }

    fn body(&self) -> u64 {
        self.offset + self.header_size as u64
    }

    fn truncated(&self) -> AxmlError {
        AxmlError::Truncated {
            chunk_type: self.chunk_type,
            offset: self.offset,
        }
    }
}

/// One attribute of a compiled element, before value conversion
#[derive(Debug, Clone, PartialEq)]
pub struct RawAttribute {
    pub namespace: Option<String>,
    pub prefix: Option<String>,
    pub name: String,
    /// Resource id of the attribute name, from the resource map
    pub resource_id: Option<u32>,
    pub raw_value: Option<String>,
    pub data_type: u8,
    pub data: u32,
}

impl RawAttribute {
    /// Name with its namespace prefix, e.g. `android:duration`
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, self.name),
            _ => self.name.clone(),
        }
    }
}

/// Element tree recovered from a compiled XML document
#[derive(Debug, Clone, PartialEq)]
pub struct XmlNode {
    pub name: String,
    /// Namespace declarations opened right before this element, as (prefix, uri)
    pub namespaces: Vec<(String, String)>,
    pub attributes: Vec<RawAttribute>,
    pub children: Vec<XmlNode>,
}

/// A parsed compiled XML document
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub root: XmlNode,
    /// String pool, needed to resolve string-typed attribute values
    pub strings: Vec<String>,
}

/// Parse a compiled XML document
pub fn parse_document<R: Read + Seek>(reader: R) -> Result<XmlDocument> {
    DocumentParser::new(reader).parse()
}

struct DocumentParser<R: Read + Seek> {
    input: ChunkReader<R>,
    strings: Vec<String>,
    resource_ids: Vec<u32>,
    namespaces: Vec<(String, String)>,
    pending_namespaces: Vec<(String, String)>,
    stack: Vec<XmlNode>,
    root: Option<XmlNode>,
}

impl<R: Read + Seek> DocumentParser<R> {
    fn new(reader: R) -> Self {
        Self {
            input: ChunkReader::new(reader),
            strings: Vec::new(),
            resource_ids: Vec::new(),
            namespaces: Vec::new(),
            pending_namespaces: Vec::new(),
            stack: Vec::new(),
            root: None,
        }
    }

    fn parse(mut self) -> Result<XmlDocument> {
        let document = self.input.read_chunk_header()?;
        if document.chunk_type != RES_XML_TYPE {
            return Err(AxmlError::InvalidHeader {
                expected: RES_XML_TYPE,
                actual: document.chunk_type,
            });
        }
        if document.end() > self.input.stream_len()? || document.header_size < 8 {
            return Err(document.truncated());
        }

        let mut pos = document.body();
        while pos + 8 <= document.end() {
            self.input.seek(pos)?;
            let chunk = self.input.read_chunk_header()?;
            if chunk.size < 8
                || chunk.header_size < 8
                || chunk.header_size as u32 > chunk.size
                || chunk.end() > document.end()
            {
                return Err(chunk.truncated());
            }
            self.process_chunk(&chunk)?;
            pos = chunk.end();
        }

        if let Some(open) = self.stack.pop() {
            return Err(AxmlError::UnclosedElement(open.name));
        }
        let root = self.root.ok_or(AxmlError::MissingRoot)?;
        Ok(XmlDocument {
            root,
            strings: self.strings,
        })
    }

    fn process_chunk(&mut self, chunk: &ChunkHeader) -> Result<()> {
        match chunk.chunk_type {
            RES_STRING_POOL_TYPE => {
                self.strings = self.read_string_pool(chunk)?;
            }

            RES_XML_RESOURCE_MAP_TYPE => {
                self.input.seek(chunk.body())?;
                let count = (chunk.end() - chunk.body()) / 4;
                self.resource_ids = (0..count)
                    .map(|_| self.input.read_u32())
                    .collect::<Result<_>>()?;
            }

            RES_XML_START_NAMESPACE_TYPE => {
                self.input.seek(chunk.body())?;
                let prefix = self.read_string_ref()?.unwrap_or_default();
                let uri = self.read_string_ref()?.unwrap_or_default();
                self.namespaces.push((prefix.clone(), uri.clone()));
                self.pending_namespaces.push((prefix, uri));
            }

            RES_XML_END_NAMESPACE_TYPE => {
                self.input.seek(chunk.body())?;
                let _prefix = self.read_string_ref()?;
                let uri = self.read_string_ref()?.unwrap_or_default();
                if let Some(index) = self.namespaces.iter().rposition(|(_, u)| *u == uri) {
                    self.namespaces.remove(index);
                }
            }

            RES_XML_START_ELEMENT_TYPE => {
                let node = self.read_start_element(chunk)?;
                self.stack.push(node);
            }

            RES_XML_END_ELEMENT_TYPE => {
                self.input.seek(chunk.body())?;
                let _ns = self.input.read_u32()?;
                let name = self.read_string_ref()?.unwrap_or_default();

                let node = match self.stack.pop() {
                    Some(node) if node.name == name => node,
                    _ => return Err(AxmlError::UnbalancedEndTag(name)),
                };

                match self.stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None if self.root.is_none() => self.root = Some(node),
                    None => debug!(element = %node.name, "ignoring additional root element"),
                }
            }

            RES_XML_CDATA_TYPE | RES_NULL_TYPE => {}

            other => {
                debug!(chunk_type = other, offset = chunk.offset, "skipping unknown chunk");
            }
        }

        Ok(())
    }

    fn read_start_element(&mut self, chunk: &ChunkHeader) -> Result<XmlNode> {
        let ext = chunk.body();
        self.input.seek(ext)?;
        let _ns = self.input.read_u32()?;
        let name = self.read_string_ref()?.unwrap_or_default();
        let attribute_start = self.input.read_u16()? as u64;
        let attribute_size = self.input.read_u16()? as u64;
        let attribute_count = self.input.read_u16()? as u64;

        if attribute_count > 0
            && (attribute_size < 20
                || ext + attribute_start + attribute_count * attribute_size > chunk.end())
        {
            return Err(chunk.truncated());
        }

        let mut attributes = Vec::with_capacity(attribute_count as usize);
        for index in 0..attribute_count {
            self.input
                .seek(ext + attribute_start + index * attribute_size)?;
            let ns_index = self.input.read_u32()?;
            let name_index = self.input.read_u32()?;
            let raw_value = self.read_string_ref()?;
            let _size = self.input.read_u16()?;
            let _res0 = self.input.read_byte()?;
            let data_type = self.input.read_byte()?;
            let data = self.input.read_u32()?;

            let namespace = self.string(ns_index)?;
            let prefix = namespace.as_ref().and_then(|uri| {
                self.namespaces
                    .iter()
                    .rev()
                    .find(|(_, u)| u == uri)
                    .map(|(p, _)| p.clone())
            });

            attributes.push(RawAttribute {
                namespace,
                prefix,
                name: self.string(name_index)?.unwrap_or_default(),
                resource_id: self.resource_ids.get(name_index as usize).copied(),
                raw_value,
                data_type,
                data,
            });
        }

        Ok(XmlNode {
            name,
            namespaces: std::mem::take(&mut self.pending_namespaces),
            attributes,
            children: Vec::new(),
        })
    }

    fn read_string_ref(&mut self) -> Result<Option<String>> {
        let index = self.input.read_u32()?;
        self.string(index)
    }

    fn string(&self, index: u32) -> Result<Option<String>> {
        if index == NO_INDEX {
            return Ok(None);
        }
        self.strings
            .get(index as usize)
            .cloned()
            .map(Some)
            .ok_or(AxmlError::InvalidStringIndex(index))
    }

    fn read_string_pool(&mut self, chunk: &ChunkHeader) -> Result<Vec<String>> {
        self.input.seek(chunk.offset + 8)?;
        let string_count = self.input.read_u32()? as u64;
        let _style_count = self.input.read_u32()?;
        let flags = self.input.read_u32()?;
        let strings_start = self.input.read_u32()? as u64;
        let _styles_start = self.input.read_u32()?;

        if chunk.body() + string_count * 4 > chunk.end() {
            return Err(chunk.truncated());
        }

        self.input.seek(chunk.body())?;
        let offsets = (0..string_count)
            .map(|_| self.input.read_u32())
            .collect::<Result<Vec<_>>>()?;

        let mut strings = Vec::with_capacity(offsets.len());
        for offset in offsets {
            let pos = chunk.offset + strings_start + offset as u64;
            if pos >= chunk.end() {
                return Err(chunk.truncated());
            }
            self.input.seek(pos)?;
            let string = if flags & UTF8_FLAG != 0 {
                self.input.read_utf8(chunk.end())?
            } else {
                self.input.read_utf16(chunk.end())?
            };
            strings.push(string);
        }

        Ok(strings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{AxmlBuilder, TestAttr, android_document};
    use crate::{ANDROID_NS, TYPE_FLOAT, TYPE_INT_DEC};
    use std::io::Cursor;

    fn parse(bytes: &[u8]) -> Result<XmlNode> {
        parse_document(Cursor::new(bytes)).map(|document| document.root)
    }

    #[test]
    fn test_parse_nested_elements() {
        let bytes = android_document(|b| {
            b.start_element("set", &[TestAttr::android("shareInterpolator", 0x12, 0)]);
            b.start_element(
                "alpha",
                &[
                    TestAttr::android("fromAlpha", TYPE_FLOAT, 0.0f32.to_bits()),
                    TestAttr::android("duration", TYPE_INT_DEC, 500),
                ],
            );
            b.end_element("alpha");
            b.start_element("scale", &[]);
            b.end_element("scale");
            b.end_element("set");
        });

        let root = parse(&bytes).unwrap();
        assert_eq!(root.name, "set");
        assert_eq!(
            root.namespaces,
            vec![("android".to_string(), ANDROID_NS.to_string())]
        );
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].name, "alpha");
        assert_eq!(root.children[1].name, "scale");
        assert!(root.children[0].namespaces.is_empty());

        let duration = &root.children[0].attributes[1];
        assert_eq!(duration.qualified_name(), "android:duration");
        assert_eq!(duration.namespace.as_deref(), Some(ANDROID_NS));
        assert_eq!(duration.data_type, TYPE_INT_DEC);
        assert_eq!(duration.data, 500);
        assert_eq!(duration.raw_value, None);
    }

    #[test]
    fn test_utf8_string_pool() {
        let mut builder = AxmlBuilder::new().utf8();
        builder.start_element("linearInterpolator", &[TestAttr::plain_string("note", "héllo")]);
        builder.end_element("linearInterpolator");

        let root = parse(&builder.build()).unwrap();
        assert_eq!(root.name, "linearInterpolator");
        assert_eq!(root.attributes[0].raw_value.as_deref(), Some("héllo"));
        assert_eq!(root.attributes[0].qualified_name(), "note");
    }

    #[test]
    fn test_resource_map_ids() {
        let mut builder = AxmlBuilder::new().with_attribute_ids(&[("duration", 0x0101_0198)]);
        builder.start_namespace("android", ANDROID_NS);
        builder.start_element("alpha", &[TestAttr::android("duration", TYPE_INT_DEC, 10)]);
        builder.end_element("alpha");
        builder.end_namespace("android", ANDROID_NS);

        let root = parse(&builder.build()).unwrap();
        assert_eq!(root.attributes[0].resource_id, Some(0x0101_0198));
    }

    #[test]
    fn test_cdata_is_skipped() {
        let bytes = android_document(|b| {
            b.start_element("set", &[]);
            b.cdata("ignored");
            b.end_element("set");
        });
        let root = parse(&bytes).unwrap();
        assert!(root.children.is_empty());
    }

    #[test]
    fn test_invalid_header() {
        let result = parse(&[0x02, 0x00, 0x0C, 0x00, 0x08, 0x00, 0x00, 0x00]);
        match result {
            Err(AxmlError::InvalidHeader { expected, actual }) => {
                assert_eq!(expected, RES_XML_TYPE);
                assert_eq!(actual, 0x0002);
            }
            other => panic!("Expected InvalidHeader, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_document() {
        let mut bytes = android_document(|b| {
            b.start_element("alpha", &[]);
            b.end_element("alpha");
        });
        bytes.truncate(bytes.len() - 10);
        assert!(matches!(parse(&bytes), Err(AxmlError::Truncated { .. })));
    }

    #[test]
    fn test_unbalanced_end_tag() {
        let bytes = android_document(|b| {
            b.start_element("set", &[]);
            b.end_element("alpha");
        });
        match parse(&bytes) {
            Err(AxmlError::UnbalancedEndTag(name)) => assert_eq!(name, "alpha"),
            other => panic!("Expected UnbalancedEndTag, got {:?}", other),
        }
    }

    #[test]
    fn test_unclosed_element() {
        let bytes = android_document(|b| {
            b.start_element("set", &[]);
        });
        assert!(matches!(parse(&bytes), Err(AxmlError::UnclosedElement(name)) if name == "set"));
    }

    #[test]
    fn test_empty_document_has_no_root() {
        let bytes = AxmlBuilder::new().build();
        assert!(matches!(parse(&bytes), Err(AxmlError::MissingRoot)));
    }

    #[test]
    fn test_read_primitives() {
        let data = [0x01, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12];
        let mut reader = ChunkReader::new(Cursor::new(&data[..]));
        assert_eq!(reader.read_byte().unwrap(), 0x01);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_u32().unwrap(), 0x1234_5678);
        assert_eq!(reader.stream_len().unwrap(), 7);
        assert!(reader.read_byte().is_err());
    }
}
