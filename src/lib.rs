//! Extraction of tween animations and interpolators from compiled Android resources.
//!
//! Decodes the compiled binary XML (AXML) of an application's `res/anim` and
//! `res/interpolator` resources, renders each one to a canonical XML text, hashes it,
//! and records the results in an SQLite database for later analysis.
//!
//! # Examples
//!
//! ```no_run
//! use maltap::{ApkSource, ContentStore, DecoderConfig, DedupPolicy, Extractor};
//!
//! let store = ContentStore::open("animations.db", DedupPolicy::PerFile).unwrap();
//! let mut extractor = Extractor::new(DecoderConfig::default(), store);
//!
//! let mut source = ApkSource::open("app.apk", None).unwrap();
//! let report = extractor.scan(&mut source).unwrap();
//! println!("{} animations written", report.animations.written);
//! ```

use std::io;
use thiserror::Error;

mod binary_xml;
mod canonical;
pub mod cli;
mod decoder;
mod extractor;
mod interpolator;
mod source;
mod store;
mod value;

#[cfg(test)]
mod test_support;

pub use binary_xml::{ChunkReader, RawAttribute, XmlDocument, XmlNode, parse_document};
pub use canonical::{Attribute, Element, content_hash};
pub use decoder::{
    DecodeOutcome, DecodedResource, DecoderConfig, ResourceDecoder, ResourceEntry,
    ResourceFailure, ResourceKind, UnknownAttributes, Vocabulary,
};
pub use extractor::{Extractor, ScanReport};
pub use interpolator::{InterpolatorKind, validate};
pub use source::{ApkSource, DirectorySource, RawResource, ResourceSource, is_animation_resource};
pub use store::{ContentStore, DedupPolicy, WriteReport};
pub use value::{EncodedValue, ResourceNames, convert, is_reference};

/// Errors raised while reading the compiled XML container
#[derive(Error, Debug)]
pub enum AxmlError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid compiled XML - chunk type mismatch. Expected: {expected:#06x}, got: {actual:#06x}")]
    InvalidHeader { expected: u16, actual: u16 },
    #[error("Failed to read {0} from stream")]
    ReadError(String),
    #[error("Chunk of type {chunk_type:#06x} at offset {offset} is truncated")]
    Truncated { chunk_type: u16, offset: u64 },
    #[error("Invalid string pool index: {0}")]
    InvalidStringIndex(u32),
    #[error("Unbalanced end tag: {0}")]
    UnbalancedEndTag(String),
    #[error("Element <{0}> is never closed")]
    UnclosedElement(String),
    #[error("Document has no root element")]
    MissingRoot,
}

/// An encoded attribute value that has no canonical text form
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("Unsupported value type {data_type:#04x} (data {data:#010x})")]
    UnsupportedType { data_type: u8, data: u32 },
    #[error("Malformed {kind} value: {data:#010x}")]
    Malformed { kind: &'static str, data: u32 },
    #[error("String value refers to missing pool entry {0}")]
    MissingString(u32),
}

/// A decoded interpolator that does not describe a usable interpolator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidInterpolator {
    #[error("Unknown interpolator type <{0}>")]
    UnknownType(String),
    #[error("<{interpolator}> requires the {parameter} attribute")]
    MissingParameter {
        interpolator: &'static str,
        parameter: &'static str,
    },
    #[error("<{interpolator}> {parameter}=\"{value}\" is not a number")]
    NotNumeric {
        interpolator: &'static str,
        parameter: &'static str,
        value: String,
    },
    #[error("<{interpolator}> {parameter}=\"{value}\" is out of range ({expected})")]
    OutOfRange {
        interpolator: &'static str,
        parameter: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("<{interpolator}> pathData \"{value}\" does not start with a move command")]
    InvalidPath {
        interpolator: &'static str,
        value: String,
    },
    #[error("<{interpolator}> must not contain child tags, found <{child}>")]
    UnexpectedChild {
        interpolator: &'static str,
        child: String,
    },
}

/// Failure to decode a single resource
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error(transparent)]
    Axml(#[from] AxmlError),
    #[error("Attribute {attribute}: {source}")]
    Conversion {
        attribute: String,
        #[source]
        source: ConversionError,
    },
    #[error(transparent)]
    InvalidInterpolator(#[from] InvalidInterpolator),
    #[error("Failed to write canonical XML: {0}")]
    Serialize(String),
}

/// Failures of the SQLite content store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open database {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("Failed to create table {table}: {source}")]
    Schema {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("Failed to write {table} batch: {source}")]
    Persistence {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("Failed to query {table}: {source}")]
    Query {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("Database connection already closed")]
    Closed,
    #[error("Unknown dedup policy '{0}', expected off, per-file, per-package or global")]
    UnknownDedupPolicy(String),
}

/// Top-level error for scanning applications
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("APK error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Usage error: {0}")]
    Usage(String),
    #[error("{failed} of {total} inputs could not be scanned")]
    ScanFailed { failed: usize, total: usize },
}

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

// Chunk types
pub const RES_NULL_TYPE: u16 = 0x0000;
pub const RES_STRING_POOL_TYPE: u16 = 0x0001;
pub const RES_XML_TYPE: u16 = 0x0003;
pub const RES_XML_START_NAMESPACE_TYPE: u16 = 0x0100;
pub const RES_XML_END_NAMESPACE_TYPE: u16 = 0x0101;
pub const RES_XML_START_ELEMENT_TYPE: u16 = 0x0102;
pub const RES_XML_END_ELEMENT_TYPE: u16 = 0x0103;
pub const RES_XML_CDATA_TYPE: u16 = 0x0104;
pub const RES_XML_RESOURCE_MAP_TYPE: u16 = 0x0180;

// String pool flags
pub const UTF8_FLAG: u32 = 1 << 8;

/// Index value meaning "no string"
pub const NO_INDEX: u32 = 0xFFFF_FFFF;

// Res_value data types
pub const TYPE_NULL: u8 = 0x00;
pub const TYPE_REFERENCE: u8 = 0x01;
pub const TYPE_ATTRIBUTE: u8 = 0x02;
pub const TYPE_STRING: u8 = 0x03;
pub const TYPE_FLOAT: u8 = 0x04;
pub const TYPE_DIMENSION: u8 = 0x05;
pub const TYPE_FRACTION: u8 = 0x06;
pub const TYPE_DYNAMIC_REFERENCE: u8 = 0x07;
pub const TYPE_DYNAMIC_ATTRIBUTE: u8 = 0x08;
pub const TYPE_INT_DEC: u8 = 0x10;
pub const TYPE_INT_HEX: u8 = 0x11;
pub const TYPE_INT_BOOLEAN: u8 = 0x12;
pub const TYPE_INT_COLOR_ARGB8: u8 = 0x1c;
pub const TYPE_INT_COLOR_RGB8: u8 = 0x1d;
pub const TYPE_INT_COLOR_ARGB4: u8 = 0x1e;
pub const TYPE_INT_COLOR_RGB4: u8 = 0x1f;

pub const ANDROID_NS: &str = "http://schemas.android.com/apk/res/android";
