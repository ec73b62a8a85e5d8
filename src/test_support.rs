//! Builds compiled XML documents for tests.

use crate::{
    ANDROID_NS, NO_INDEX, RES_STRING_POOL_TYPE, RES_XML_CDATA_TYPE, RES_XML_END_ELEMENT_TYPE,
    RES_XML_END_NAMESPACE_TYPE, RES_XML_RESOURCE_MAP_TYPE, RES_XML_START_ELEMENT_TYPE,
    RES_XML_START_NAMESPACE_TYPE, RES_XML_TYPE, TYPE_NULL, TYPE_STRING, UTF8_FLAG,
};

#[derive(Debug, Clone)]
pub(crate) struct TestAttr {
    namespace: Option<String>,
    name: String,
    raw: Option<String>,
    data_type: u8,
    data: u32,
}

impl TestAttr {
    /// Typed attribute in the android namespace
    pub fn android(name: &str, data_type: u8, data: u32) -> Self {
        Self {
            namespace: Some(ANDROID_NS.to_string()),
            name: name.to_string(),
            raw: None,
            data_type,
            data,
        }
    }

    /// Typed attribute in an arbitrary namespace
    pub fn namespaced(namespace: &str, name: &str, data_type: u8, data: u32) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
            raw: None,
            data_type,
            data,
        }
    }

    /// Typed attribute without a namespace
    pub fn plain(name: &str, data_type: u8, data: u32) -> Self {
        Self {
            namespace: None,
            name: name.to_string(),
            raw: None,
            data_type,
            data,
        }
    }

    /// String attribute in the android namespace
    pub fn android_string(name: &str, value: &str) -> Self {
        Self {
            namespace: Some(ANDROID_NS.to_string()),
            name: name.to_string(),
            raw: Some(value.to_string()),
            data_type: TYPE_STRING,
            data: 0,
        }
    }

    /// String attribute without a namespace
    pub fn plain_string(name: &str, value: &str) -> Self {
        Self {
            namespace: None,
            name: name.to_string(),
            raw: Some(value.to_string()),
            data_type: TYPE_STRING,
            data: 0,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct AxmlBuilder {
    strings: Vec<String>,
    resource_ids: Vec<u32>,
    body: Vec<u8>,
    utf8: bool,
}

impl AxmlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode the string pool as UTF-8 instead of UTF-16
    pub fn utf8(mut self) -> Self {
        self.utf8 = true;
        self
    }

    /// Attribute names backed by resource ids. Must be called before anything else is interned.
    pub fn with_attribute_ids(mut self, ids: &[(&str, u32)]) -> Self {
        for (name, id) in ids {
            self.intern(name);
            self.resource_ids.push(*id);
        }
        self
    }

    fn intern(&mut self, value: &str) -> u32 {
        match self.strings.iter().position(|s| s == value) {
            Some(index) => index as u32,
            None => {
                self.strings.push(value.to_string());
                (self.strings.len() - 1) as u32
            }
        }
    }

    fn node_header(&mut self, chunk_type: u16, size: u32) {
        push_u16(&mut self.body, chunk_type);
        push_u16(&mut self.body, 16);
        push_u32(&mut self.body, size);
        push_u32(&mut self.body, 1);
        push_u32(&mut self.body, NO_INDEX);
    }

    pub fn start_namespace(&mut self, prefix: &str, uri: &str) -> &mut Self {
        let prefix = self.intern(prefix);
        let uri = self.intern(uri);
        self.node_header(RES_XML_START_NAMESPACE_TYPE, 24);
        push_u32(&mut self.body, prefix);
        push_u32(&mut self.body, uri);
        self
    }

    pub fn end_namespace(&mut self, prefix: &str, uri: &str) -> &mut Self {
        let prefix = self.intern(prefix);
        let uri = self.intern(uri);
        self.node_header(RES_XML_END_NAMESPACE_TYPE, 24);
        push_u32(&mut self.body, prefix);
        push_u32(&mut self.body, uri);
        self
    }

    pub fn start_element(&mut self, name: &str, attrs: &[TestAttr]) -> &mut Self {
        let name = self.intern(name);
        let mut encoded = Vec::with_capacity(attrs.len());
        for attr in attrs {
            let ns = match attr.namespace.as_deref() {
                Some(ns) => self.intern(ns),
                None => NO_INDEX,
            };
            let attr_name = self.intern(&attr.name);
            let raw = match attr.raw.as_deref() {
                Some(raw) => self.intern(raw),
                None => NO_INDEX,
            };
            // string values carry their pool index as data
            let data = if attr.data_type == TYPE_STRING {
                raw
            } else {
                attr.data
            };
            encoded.push((ns, attr_name, raw, attr.data_type, data));
        }

        self.node_header(RES_XML_START_ELEMENT_TYPE, 16 + 20 + 20 * attrs.len() as u32);
        push_u32(&mut self.body, NO_INDEX);
        push_u32(&mut self.body, name);
        push_u16(&mut self.body, 20);
        push_u16(&mut self.body, 20);
        push_u16(&mut self.body, attrs.len() as u16);
        push_u16(&mut self.body, 0);
        push_u16(&mut self.body, 0);
        push_u16(&mut self.body, 0);
        for (ns, attr_name, raw, data_type, data) in encoded {
            push_u32(&mut self.body, ns);
            push_u32(&mut self.body, attr_name);
            push_u32(&mut self.body, raw);
            push_u16(&mut self.body, 8);
            self.body.push(0);
            self.body.push(data_type);
            push_u32(&mut self.body, data);
        }
        self
    }

    pub fn end_element(&mut self, name: &str) -> &mut Self {
        let name = self.intern(name);
        self.node_header(RES_XML_END_ELEMENT_TYPE, 24);
        push_u32(&mut self.body, NO_INDEX);
        push_u32(&mut self.body, name);
        self
    }

    pub fn cdata(&mut self, text: &str) -> &mut Self {
        let text = self.intern(text);
        self.node_header(RES_XML_CDATA_TYPE, 28);
        push_u32(&mut self.body, text);
        push_u16(&mut self.body, 8);
        self.body.push(0);
        self.body.push(TYPE_NULL);
        push_u32(&mut self.body, 0);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let pool = self.string_pool();

        let mut map = Vec::new();
        if !self.resource_ids.is_empty() {
            push_u16(&mut map, RES_XML_RESOURCE_MAP_TYPE);
            push_u16(&mut map, 8);
            push_u32(&mut map, 8 + 4 * self.resource_ids.len() as u32);
            for id in &self.resource_ids {
                push_u32(&mut map, *id);
            }
        }

        let mut out = Vec::new();
        push_u16(&mut out, RES_XML_TYPE);
        push_u16(&mut out, 8);
        push_u32(&mut out, (8 + pool.len() + map.len() + self.body.len()) as u32);
        out.extend_from_slice(&pool);
        out.extend_from_slice(&map);
        out.extend_from_slice(&self.body);
        out
    }

    fn string_pool(&self) -> Vec<u8> {
        let mut offsets = Vec::new();
        let mut data = Vec::new();
        for s in &self.strings {
            offsets.push(data.len() as u32);
            if self.utf8 {
                data.push(s.encode_utf16().count() as u8);
                data.push(s.len() as u8);
                data.extend_from_slice(s.as_bytes());
                data.push(0);
            } else {
                let units: Vec<u16> = s.encode_utf16().collect();
                push_u16(&mut data, units.len() as u16);
                for unit in units {
                    push_u16(&mut data, unit);
                }
                push_u16(&mut data, 0);
            }
        }
        while data.len() % 4 != 0 {
            data.push(0);
        }

        let count = self.strings.len() as u32;
        let strings_start = 28 + 4 * count;
        let mut pool = Vec::new();
        push_u16(&mut pool, RES_STRING_POOL_TYPE);
        push_u16(&mut pool, 28);
        push_u32(&mut pool, strings_start + data.len() as u32);
        push_u32(&mut pool, count);
        push_u32(&mut pool, 0);
        push_u32(&mut pool, if self.utf8 { UTF8_FLAG } else { 0 });
        push_u32(&mut pool, strings_start);
        push_u32(&mut pool, 0);
        for offset in offsets {
            push_u32(&mut pool, offset);
        }
        pool.extend_from_slice(&data);
        pool
    }
}

/// Wraps the elements written by `build` in an android namespace declaration
pub(crate) fn android_document(build: impl FnOnce(&mut AxmlBuilder)) -> Vec<u8> {
    let mut builder = AxmlBuilder::new();
    builder.start_namespace("android", ANDROID_NS);
    build(&mut builder);
    builder.end_namespace("android", ANDROID_NS);
    builder.build()
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}
