//! Type-erased field values and their conversion rules.
//!
//! [`FieldValue`] replaces the byte-offset field access of the original
//! design with a tagged union: every field of a record instance is one
//! `FieldValue`, and generic access (links, introspection, string I/O)
//! converts between kinds here. Numeric narrowing follows Rust `as` cast
//! semantics (float-to-int saturates, int-to-int truncates); text and link
//! payloads never convert implicitly to numbers.

use ironioc_error::{IocError, Result};

use crate::field::FieldKind;

/// One field's value. The active variant matches the descriptor's
/// [`FieldKind`] for the whole lifetime of the record instance.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Char(i8),
    UChar(u8),
    Short(i16),
    UShort(u16),
    Long(i32),
    ULong(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Text(String),
    /// Menu choice index.
    Enum(u16),
    /// Unresolved link specification text; resolution happens at init.
    Link(String),
    DoubleArray(Vec<f64>),
}

impl FieldValue {
    /// The kind of the active variant.
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Char(_) => FieldKind::Char,
            FieldValue::UChar(_) => FieldKind::UChar,
            FieldValue::Short(_) => FieldKind::Short,
            FieldValue::UShort(_) => FieldKind::UShort,
            FieldValue::Long(_) => FieldKind::Long,
            FieldValue::ULong(_) => FieldKind::ULong,
            FieldValue::Int64(_) => FieldKind::Int64,
            FieldValue::UInt64(_) => FieldKind::UInt64,
            FieldValue::Float(_) => FieldKind::Float,
            FieldValue::Double(_) => FieldKind::Double,
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Enum(_) => FieldKind::Enum,
            FieldValue::Link(_) => FieldKind::Link,
            FieldValue::DoubleArray(_) => FieldKind::DoubleArray,
        }
    }

    /// Zero/empty value of the given kind.
    pub fn default_for(kind: FieldKind) -> FieldValue {
        match kind {
            FieldKind::Char => FieldValue::Char(0),
            FieldKind::UChar => FieldValue::UChar(0),
            FieldKind::Short => FieldValue::Short(0),
            FieldKind::UShort => FieldValue::UShort(0),
            FieldKind::Long => FieldValue::Long(0),
            FieldKind::ULong => FieldValue::ULong(0),
            FieldKind::Int64 => FieldValue::Int64(0),
            FieldKind::UInt64 => FieldValue::UInt64(0),
            FieldKind::Float => FieldValue::Float(0.0),
            FieldKind::Double => FieldValue::Double(0.0),
            FieldKind::Text => FieldValue::Text(String::new()),
            FieldKind::Enum => FieldValue::Enum(0),
            FieldKind::Link => FieldValue::Link(String::new()),
            FieldKind::DoubleArray => FieldValue::DoubleArray(Vec::new()),
        }
    }

    /// Numeric view as `f64`, or `None` for text and link payloads.
    ///
    /// For arrays this is the first element (empty arrays read as 0).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Char(v) => Some(f64::from(*v)),
            FieldValue::UChar(v) => Some(f64::from(*v)),
            FieldValue::Short(v) => Some(f64::from(*v)),
            FieldValue::UShort(v) => Some(f64::from(*v)),
            FieldValue::Long(v) => Some(f64::from(*v)),
            FieldValue::ULong(v) => Some(f64::from(*v)),
            FieldValue::Int64(v) => Some(*v as f64),
            FieldValue::UInt64(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(f64::from(*v)),
            FieldValue::Double(v) => Some(*v),
            FieldValue::Enum(v) => Some(f64::from(*v)),
            FieldValue::DoubleArray(v) => Some(v.first().copied().unwrap_or(0.0)),
            FieldValue::Text(_) | FieldValue::Link(_) => None,
        }
    }

    /// Numeric view, treating text/link as zero. For callers on hot paths
    /// where the layout guarantees a numeric field.
    pub fn to_f64_lossy(&self) -> f64 {
        self.as_f64().unwrap_or(0.0)
    }

    /// Integer view, truncating floats toward zero.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int64(v) => Some(*v),
            FieldValue::UInt64(v) => Some(*v as i64),
            other => other.as_f64().map(|v| v as i64),
        }
    }

    /// Build a value of `kind` from an `f64` (the engine's common carrier).
    pub fn from_f64(kind: FieldKind, v: f64) -> FieldValue {
        match kind {
            FieldKind::Char => FieldValue::Char(v as i8),
            FieldKind::UChar => FieldValue::UChar(v as u8),
            FieldKind::Short => FieldValue::Short(v as i16),
            FieldKind::UShort => FieldValue::UShort(v as u16),
            FieldKind::Long => FieldValue::Long(v as i32),
            FieldKind::ULong => FieldValue::ULong(v as u32),
            FieldKind::Int64 => FieldValue::Int64(v as i64),
            FieldKind::UInt64 => FieldValue::UInt64(v as u64),
            FieldKind::Float => FieldValue::Float(v as f32),
            FieldKind::Double => FieldValue::Double(v),
            FieldKind::Enum => FieldValue::Enum(v as u16),
            FieldKind::DoubleArray => FieldValue::DoubleArray(vec![v]),
            FieldKind::Text => FieldValue::Text(format_f64(v)),
            FieldKind::Link => FieldValue::Link(String::new()),
        }
    }

    /// Convert to another kind.
    ///
    /// Numeric kinds interconvert freely. Text converts only to text, links
    /// only to links; arrays convert to scalars via their first element and
    /// scalars to one-element arrays.
    pub fn convert_to(&self, kind: FieldKind) -> Result<FieldValue> {
        if self.kind() == kind {
            return Ok(self.clone());
        }
        match (self, kind) {
            (FieldValue::Text(s), FieldKind::Text) => Ok(FieldValue::Text(s.clone())),
            (FieldValue::Link(s), FieldKind::Link) => Ok(FieldValue::Link(s.clone())),
            (FieldValue::Text(_) | FieldValue::Link(_), _)
            | (_, FieldKind::Text | FieldKind::Link) => Err(IocError::LinkTypeMismatch {
                from: self.kind().name(),
                to: kind.name(),
            }),
            (FieldValue::DoubleArray(v), _) => Ok(FieldValue::from_f64(
                kind,
                v.first().copied().unwrap_or(0.0),
            )),
            (_, FieldKind::DoubleArray) => {
                Ok(FieldValue::DoubleArray(vec![self.to_f64_lossy()]))
            }
            _ => Ok(FieldValue::from_f64(kind, self.to_f64_lossy())),
        }
    }

    /// Parse `text` into a value of `kind`. Menu fields are parsed here
    /// only as raw indices; choice-name resolution is the caller's job
    /// since it needs the menu table.
    pub fn parse(kind: FieldKind, text: &str) -> Result<FieldValue> {
        let text = text.trim();
        let invalid = || IocError::InvalidValue {
            what: kind.name().to_owned(),
            text: text.to_owned(),
        };
        Ok(match kind {
            FieldKind::Text => FieldValue::Text(text.to_owned()),
            FieldKind::Link => FieldValue::Link(text.to_owned()),
            FieldKind::Char => FieldValue::Char(parse_int(text).ok_or_else(invalid)? as i8),
            FieldKind::UChar => FieldValue::UChar(parse_int(text).ok_or_else(invalid)? as u8),
            FieldKind::Short => FieldValue::Short(parse_int(text).ok_or_else(invalid)? as i16),
            FieldKind::UShort => FieldValue::UShort(parse_int(text).ok_or_else(invalid)? as u16),
            FieldKind::Long => FieldValue::Long(parse_int(text).ok_or_else(invalid)? as i32),
            FieldKind::ULong => FieldValue::ULong(parse_int(text).ok_or_else(invalid)? as u32),
            FieldKind::Int64 => FieldValue::Int64(parse_int(text).ok_or_else(invalid)? as i64),
            FieldKind::UInt64 => FieldValue::UInt64(parse_int(text).ok_or_else(invalid)? as u64),
            FieldKind::Enum => FieldValue::Enum(parse_int(text).ok_or_else(invalid)? as u16),
            FieldKind::Float => {
                FieldValue::Float(text.parse::<f32>().map_err(|_| invalid())?)
            }
            FieldKind::Double => {
                FieldValue::Double(text.parse::<f64>().map_err(|_| invalid())?)
            }
            FieldKind::DoubleArray => {
                let mut out = Vec::new();
                if !text.is_empty() {
                    for part in text.split(',') {
                        out.push(part.trim().parse::<f64>().map_err(|_| invalid())?);
                    }
                }
                FieldValue::DoubleArray(out)
            }
        })
    }

    /// Format for display and for `get_field_as_string`.
    pub fn format(&self) -> String {
        match self {
            FieldValue::Char(v) => v.to_string(),
            FieldValue::UChar(v) => v.to_string(),
            FieldValue::Short(v) => v.to_string(),
            FieldValue::UShort(v) => v.to_string(),
            FieldValue::Long(v) => v.to_string(),
            FieldValue::ULong(v) => v.to_string(),
            FieldValue::Int64(v) => v.to_string(),
            FieldValue::UInt64(v) => v.to_string(),
            FieldValue::Float(v) => format_f64(f64::from(*v)),
            FieldValue::Double(v) => format_f64(*v),
            FieldValue::Text(s) | FieldValue::Link(s) => s.clone(),
            FieldValue::Enum(v) => v.to_string(),
            FieldValue::DoubleArray(v) => v
                .iter()
                .map(|x| format_f64(*x))
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// Integers accept decimal and `0x` hex, with a float fallback so that
/// "3.0" stores into an integer field the way the original loader allowed.
fn parse_int(text: &str) -> Option<i128> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i128::from_str_radix(hex, 16).ok();
    }
    if let Ok(v) = text.parse::<i128>() {
        return Some(v);
    }
    text.parse::<f64>().ok().map(|v| v as i128)
}

fn format_f64(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e15 && v.is_finite() {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}
