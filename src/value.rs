use crate::ConversionError;
use crate::{TYPE_ATTRIBUTE, TYPE_DIMENSION, TYPE_DYNAMIC_ATTRIBUTE, TYPE_DYNAMIC_REFERENCE};
use crate::{TYPE_FLOAT, TYPE_FRACTION, TYPE_NULL, TYPE_REFERENCE, TYPE_STRING};
use crate::{TYPE_INT_BOOLEAN, TYPE_INT_DEC, TYPE_INT_HEX};
use crate::{TYPE_INT_COLOR_ARGB4, TYPE_INT_COLOR_ARGB8, TYPE_INT_COLOR_RGB4, TYPE_INT_COLOR_RGB8};
use std::collections::HashMap;

const DATA_NULL_UNDEFINED: u32 = 0;
const DATA_NULL_EMPTY: u32 = 1;

const COMPLEX_UNIT_MASK: u32 = 0xF;
const COMPLEX_RADIX_SHIFT: u32 = 4;
const COMPLEX_RADIX_MASK: u32 = 0x3;
const COMPLEX_MANTISSA_MASK: u32 = 0xFFFF_FF00;

// 23p0, 16p7, 8p15 and 0p23 mantissas, already scaled by the 8-bit shift
const RADIX_MULTS: [f32; 4] = [
    1.0 / 256.0,
    1.0 / 32768.0,
    1.0 / 8388608.0,
    1.0 / 2147483648.0,
];

const DIMENSION_UNITS: [&str; 6] = ["px", "dp", "sp", "pt", "in", "mm"];
const FRACTION_UNITS: [&str; 2] = ["%", "%p"];

/// Symbolic names for resource ids, e.g. `0x7f010000` -> `anim/fade_in`
///
/// Ids without a name are rendered numerically.
#[derive(Debug, Clone, Default)]
pub struct ResourceNames {
    names: HashMap<u32, String>,
}

impl ResourceNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: u32, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }

    pub fn get(&self, id: u32) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }
}

impl FromIterator<(u32, String)> for ResourceNames {
    fn from_iter<I: IntoIterator<Item = (u32, String)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

/// A typed attribute cell from a compiled resource
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedValue {
    Null,
    Empty,
    Reference(u32),
    Attribute(u32),
    String(String),
    Float(f32),
    Dimension(u32),
    Fraction(u32),
    IntDec(i32),
    IntHex(u32),
    Boolean(bool),
    ColorArgb8(u32),
    ColorRgb8(u32),
    ColorArgb4(u32),
    ColorRgb4(u32),
}

impl EncodedValue {
    /// Interpret a `(data_type, data)` cell. String cells index into `strings`.
    pub fn decode(data_type: u8, data: u32, strings: &[String]) -> Result<Self, ConversionError> {
        let value = match data_type {
            TYPE_NULL => match data {
                DATA_NULL_UNDEFINED => Self::Null,
                DATA_NULL_EMPTY => Self::Empty,
                _ => return Err(ConversionError::Malformed { kind: "null", data }),
            },
            TYPE_REFERENCE | TYPE_DYNAMIC_REFERENCE => match data {
                0 => Self::Null,
                id => Self::Reference(id),
            },
            TYPE_ATTRIBUTE | TYPE_DYNAMIC_ATTRIBUTE => match data {
                0 => return Err(ConversionError::Malformed { kind: "attribute", data }),
                id => Self::Attribute(id),
            },
            TYPE_STRING => strings
                .get(data as usize)
                .map(|s| Self::String(s.clone()))
                .ok_or(ConversionError::MissingString(data))?,
            TYPE_FLOAT => Self::Float(f32::from_bits(data)),
            TYPE_DIMENSION => {
                if (data & COMPLEX_UNIT_MASK) as usize >= DIMENSION_UNITS.len() {
                    return Err(ConversionError::Malformed { kind: "dimension", data });
                }
                Self::Dimension(data)
            }
            TYPE_FRACTION => {
                if (data & COMPLEX_UNIT_MASK) as usize >= FRACTION_UNITS.len() {
                    return Err(ConversionError::Malformed { kind: "fraction", data });
                }
                Self::Fraction(data)
            }
            TYPE_INT_DEC => Self::IntDec(data as i32),
            TYPE_INT_HEX => Self::IntHex(data),
            TYPE_INT_BOOLEAN => Self::Boolean(data != 0),
            TYPE_INT_COLOR_ARGB8 => Self::ColorArgb8(data),
            TYPE_INT_COLOR_RGB8 => Self::ColorRgb8(data),
            TYPE_INT_COLOR_ARGB4 => Self::ColorArgb4(data),
            TYPE_INT_COLOR_RGB4 => Self::ColorRgb4(data),
            _ => return Err(ConversionError::UnsupportedType { data_type, data }),
        };
        Ok(value)
    }

    /// The text a hand-written resource file would use for this value
    pub fn to_text(&self, names: &ResourceNames) -> String {
        match self {
            Self::Null => "@null".to_string(),
            Self::Empty => "@empty".to_string(),
            Self::Reference(id) => symbolic('@', *id, names),
            Self::Attribute(id) => symbolic('?', *id, names),
            Self::String(s) => s.clone(),
            Self::Float(v) => format_float(*v),
            Self::Dimension(data) => {
                let unit = DIMENSION_UNITS[(data & COMPLEX_UNIT_MASK) as usize];
                format!("{}{}", format_complex(complex_to_float(*data)), unit)
            }
            Self::Fraction(data) => {
                let unit = FRACTION_UNITS[(data & COMPLEX_UNIT_MASK) as usize];
                format!("{}{}", format_complex(complex_to_float(*data) * 100.0), unit)
            }
            Self::IntDec(v) => v.to_string(),
            Self::IntHex(v) => format!("0x{:08x}", v),
            Self::Boolean(v) => v.to_string(),
            Self::ColorArgb8(v) => format!("#{:08x}", v),
            Self::ColorRgb8(v) => format!("#{:06x}", v & 0x00FF_FFFF),
            Self::ColorArgb4(v) => format!(
                "#{:x}{:x}{:x}{:x}",
                (v >> 28) & 0xF,
                (v >> 20) & 0xF,
                (v >> 12) & 0xF,
                (v >> 4) & 0xF
            ),
            Self::ColorRgb4(v) => {
                format!("#{:x}{:x}{:x}", (v >> 20) & 0xF, (v >> 12) & 0xF, (v >> 4) & 0xF)
            }
        }
    }
}

/// Convert a typed attribute cell to its canonical text
pub fn convert(
    data_type: u8,
    data: u32,
    strings: &[String],
    names: &ResourceNames,
) -> Result<String, ConversionError> {
    EncodedValue::decode(data_type, data, strings).map(|value| value.to_text(names))
}

/// Whether `value` points at another resource (`@...`) or theme attribute (`?...`).
///
/// `@null` and `@empty` are explicit "no value" markers, not references.
pub fn is_reference(value: Option<&str>) -> bool {
    match value {
        None => false,
        Some("@null") | Some("@empty") => false,
        Some(v) => v.starts_with('@') || v.starts_with('?'),
    }
}

fn symbolic(prefix: char, id: u32, names: &ResourceNames) -> String {
    match names.get(id) {
        Some(name) => format!("{}{}", prefix, name),
        None => format!("{}0x{:08x}", prefix, id),
    }
}

fn complex_to_float(complex: u32) -> f32 {
    let mantissa = (complex & COMPLEX_MANTISSA_MASK) as i32 as f32;
    mantissa * RADIX_MULTS[((complex >> COMPLEX_RADIX_SHIFT) & COMPLEX_RADIX_MASK) as usize]
}

/// Whole dimensions and fractions drop the decimal point: `12dp`, `50%`
fn format_complex(value: f32) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Floats keep a trailing `.0` when whole: `0.0`, `1.0`, `0.75`
fn format_float(value: f32) -> String {
    if value.is_infinite() {
        let text = if value > 0.0 { "Infinity" } else { "-Infinity" };
        return text.to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e7 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}
