//! Record instances: one `Vec<FieldValue>` per record, indexed by ordinal.

use std::sync::Arc;

use ironioc_error::{IocError, Result};
use ironioc_types::{FieldType, FieldValue};

use crate::rtype::RecordType;

/// A live record: its name, its type, and one value slot per descriptor.
///
/// The variant of each slot matches its descriptor's kind for the whole
/// lifetime of the instance; `set` converts incoming values to keep that
/// true.
#[derive(Debug)]
pub struct RecordInstance {
    name: String,
    rtype: Arc<RecordType>,
    fields: Vec<FieldValue>,
}

impl RecordInstance {
    pub fn new(name: impl Into<String>, rtype: Arc<RecordType>) -> RecordInstance {
        let fields = rtype.fields().iter().map(|d| d.default_value()).collect();
        RecordInstance {
            name: name.into(),
            rtype,
            fields,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rtype(&self) -> &Arc<RecordType> {
        &self.rtype
    }

    /// Borrow a field slot. Ordinals come from the type's layout, so an
    /// out-of-range ordinal is a caller bug and panics.
    pub fn field(&self, ordinal: usize) -> &FieldValue {
        &self.fields[ordinal]
    }

    pub fn get(&self, ordinal: usize) -> Option<&FieldValue> {
        self.fields.get(ordinal)
    }

    /// Store a value, converting it to the slot's declared kind. Text
    /// fields truncate to their declared capacity.
    pub fn set(&mut self, ordinal: usize, value: FieldValue) -> Result<()> {
        let desc = self
            .rtype
            .descriptor(ordinal)
            .ok_or_else(|| IocError::FieldNotFound {
                record_type: self.rtype.name().to_owned(),
                field: format!("#{ordinal}"),
            })?;
        let mut converted = value.convert_to(desc.field_type().kind())?;
        match (desc.field_type(), &mut converted) {
            (FieldType::Text { capacity }, FieldValue::Text(s)) => {
                if s.len() > *capacity {
                    s.truncate(*capacity);
                }
            }
            (FieldType::DoubleArray { capacity }, FieldValue::DoubleArray(v)) => {
                if v.len() > *capacity {
                    let requested = v.len();
                    v.truncate(*capacity);
                    self.fields[ordinal] = converted;
                    return Err(IocError::ArrayBoundsExceeded {
                        count: requested,
                        capacity: *capacity,
                    });
                }
            }
            _ => {}
        }
        self.fields[ordinal] = converted;
        Ok(())
    }

    /// Numeric read; text and link slots read as zero.
    pub fn get_f64(&self, ordinal: usize) -> f64 {
        self.fields[ordinal].to_f64_lossy()
    }

    /// Numeric write preserving the slot's kind.
    pub fn set_f64(&mut self, ordinal: usize, v: f64) {
        let kind = self.fields[ordinal].kind();
        self.fields[ordinal] = FieldValue::from_f64(kind, v);
    }

    /// Menu choice index of an enum slot (0 for anything else).
    pub fn get_enum(&self, ordinal: usize) -> u16 {
        match &self.fields[ordinal] {
            FieldValue::Enum(v) => *v,
            other => other.to_f64_lossy() as u16,
        }
    }

    pub fn set_enum(&mut self, ordinal: usize, v: u16) {
        self.fields[ordinal] = FieldValue::Enum(v);
    }

    /// Text payload of a string or link slot ("" for anything else).
    pub fn text(&self, ordinal: usize) -> &str {
        match &self.fields[ordinal] {
            FieldValue::Text(s) | FieldValue::Link(s) => s,
            _ => "",
        }
    }

    pub fn set_text(&mut self, ordinal: usize, s: impl Into<String>) {
        let s = s.into();
        self.fields[ordinal] = match &self.fields[ordinal] {
            FieldValue::Link(_) => FieldValue::Link(s),
            _ => FieldValue::Text(s),
        };
    }

    pub fn get_bool(&self, ordinal: usize) -> bool {
        self.fields[ordinal].to_f64_lossy() != 0.0
    }

    pub fn set_bool(&mut self, ordinal: usize, v: bool) {
        self.set_f64(ordinal, if v { 1.0 } else { 0.0 });
    }
}
