//! Semantic field types and field-descriptor attributes.

use std::fmt;

/// Scalar kind of a field value, without menu or link payload.
///
/// This is what numeric conversion dispatches on; [`FieldType`] refines it
/// with descriptor-level information (which menu, which link direction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Char,
    UChar,
    Short,
    UShort,
    Long,
    ULong,
    Int64,
    UInt64,
    Float,
    Double,
    Text,
    Enum,
    Link,
    DoubleArray,
}

impl FieldKind {
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Char => "CHAR",
            FieldKind::UChar => "UCHAR",
            FieldKind::Short => "SHORT",
            FieldKind::UShort => "USHORT",
            FieldKind::Long => "LONG",
            FieldKind::ULong => "ULONG",
            FieldKind::Int64 => "INT64",
            FieldKind::UInt64 => "UINT64",
            FieldKind::Float => "FLOAT",
            FieldKind::Double => "DOUBLE",
            FieldKind::Text => "STRING",
            FieldKind::Enum => "ENUM",
            FieldKind::Link => "LINK",
            FieldKind::DoubleArray => "DOUBLE[]",
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, FieldKind::Text | FieldKind::Link)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Link direction, part of a link field's descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    Input,
    Output,
    Forward,
}

/// Declared semantic type of a field descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Char,
    UChar,
    Short,
    UShort,
    Long,
    ULong,
    Int64,
    UInt64,
    Float,
    Double,
    /// Fixed-capacity text; capacity bounds `put_field_from_string`.
    Text { capacity: usize },
    /// Menu-valued field; the name resolves against the loaded menu tables.
    Menu { menu: String },
    /// Link field with a direction.
    Link { mode: LinkMode },
    /// Scalar double array (waveform-style value field).
    DoubleArray { capacity: usize },
    /// Present in the layout but not accessible generically.
    NoAccess,
}

impl FieldType {
    /// The scalar kind this type stores.
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldType::Char => FieldKind::Char,
            FieldType::UChar => FieldKind::UChar,
            FieldType::Short => FieldKind::Short,
            FieldType::UShort => FieldKind::UShort,
            FieldType::Long => FieldKind::Long,
            FieldType::ULong => FieldKind::ULong,
            FieldType::Int64 => FieldKind::Int64,
            FieldType::UInt64 => FieldKind::UInt64,
            FieldType::Float => FieldKind::Float,
            FieldType::Double => FieldKind::Double,
            FieldType::Text { .. } => FieldKind::Text,
            FieldType::Menu { .. } => FieldKind::Enum,
            FieldType::Link { .. } => FieldKind::Link,
            FieldType::DoubleArray { .. } => FieldKind::DoubleArray,
            // NoAccess fields still occupy a slot; treat as text for storage.
            FieldType::NoAccess => FieldKind::Text,
        }
    }
}

/// Special-processing class of a field.
///
/// `Mod` fields get the record support's `special` hook called around every
/// direct field write (before with `after=false`, then after with
/// `after=true`). Fields without a special class skip the hook entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Special {
    #[default]
    None,
    Mod,
    /// Changing the field alters scan-list membership.
    Scan,
    /// Field may not be written at runtime.
    NoMod,
}
