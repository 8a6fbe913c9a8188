//! Record type definitions: field descriptors and the per-type layout.
//!
//! A `RecordType` is immutable once built and shared by every instance of
//! the type behind an `Arc`. Field access is by ordinal; the descriptor
//! table maps names to ordinals once, at build time.

use hashbrown::HashMap;
use ironioc_error::{IocError, Result};
use ironioc_types::{FieldType, FieldValue, Special};

/// Ordinal of a field within its record type's layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldHandle {
    ordinal: usize,
}

impl FieldHandle {
    pub const fn new(ordinal: usize) -> FieldHandle {
        FieldHandle { ordinal }
    }

    pub const fn ordinal(self) -> usize {
        self.ordinal
    }
}

/// Declared attributes of one field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    field_type: FieldType,
    prompt: String,
    initial: Option<FieldValue>,
    special: Special,
    process_passive: bool,
    interest: u8,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> FieldDescriptor {
        FieldDescriptor {
            name: name.into().to_ascii_uppercase(),
            field_type,
            prompt: String::new(),
            initial: None,
            special: Special::None,
            process_passive: false,
            interest: 0,
        }
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> FieldDescriptor {
        self.prompt = prompt.into();
        self
    }

    /// Initial value, already typed. The caller is responsible for matching
    /// the declared kind; mismatches are caught at build time.
    pub fn initial(mut self, value: FieldValue) -> FieldDescriptor {
        self.initial = Some(value);
        self
    }

    /// Initial value parsed from descriptor text.
    pub fn initial_text(mut self, text: &str) -> Result<FieldDescriptor> {
        self.initial = Some(FieldValue::parse(self.field_type.kind(), text)?);
        Ok(self)
    }

    pub fn special(mut self, special: Special) -> FieldDescriptor {
        self.special = special;
        self
    }

    /// Whether a fetch through a process-passive input link triggers
    /// processing of the source record.
    pub fn process_passive(mut self, pp: bool) -> FieldDescriptor {
        self.process_passive = pp;
        self
    }

    pub fn interest(mut self, level: u8) -> FieldDescriptor {
        self.interest = level;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn prompt_text(&self) -> &str {
        &self.prompt
    }

    pub fn special_class(&self) -> Special {
        self.special
    }

    pub fn is_process_passive(&self) -> bool {
        self.process_passive
    }

    pub fn interest_level(&self) -> u8 {
        self.interest
    }

    /// Value a fresh instance starts with.
    pub fn default_value(&self) -> FieldValue {
        self.initial
            .clone()
            .unwrap_or_else(|| FieldValue::default_for(self.field_type.kind()))
    }
}

/// Immutable layout of a record type.
#[derive(Debug)]
pub struct RecordType {
    name: String,
    fields: Vec<FieldDescriptor>,
    by_name: HashMap<String, usize>,
    ind_val: usize,
}

impl RecordType {
    pub fn builder(name: impl Into<String>) -> RecordTypeBuilder {
        RecordTypeBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn descriptor(&self, ordinal: usize) -> Option<&FieldDescriptor> {
        self.fields.get(ordinal)
    }

    /// Ordinal lookup by (case-insensitive) field name.
    pub fn find_field(&self, name: &str) -> Option<FieldHandle> {
        self.by_name
            .get(&name.to_ascii_uppercase())
            .map(|&ordinal| FieldHandle { ordinal })
    }

    /// Ordinal of the VAL field, the type's primary value.
    pub fn ind_val(&self) -> usize {
        self.ind_val
    }
}

/// Accumulates descriptors; validation happens at `build`.
#[derive(Debug)]
pub struct RecordTypeBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl RecordTypeBuilder {
    pub fn field(mut self, descriptor: FieldDescriptor) -> RecordTypeBuilder {
        self.fields.push(descriptor);
        self
    }

    pub fn build(self) -> Result<RecordType> {
        let mut by_name = HashMap::with_capacity(self.fields.len());
        for (ordinal, desc) in self.fields.iter().enumerate() {
            if desc.name.is_empty() {
                return Err(IocError::BadFieldDescriptor {
                    record_type: self.name.clone(),
                    field: desc.name.clone(),
                    reason: "empty field name".to_owned(),
                });
            }
            if let Some(initial) = &desc.initial {
                if initial.kind() != desc.field_type.kind() {
                    return Err(IocError::BadFieldDescriptor {
                        record_type: self.name.clone(),
                        field: desc.name.clone(),
                        reason: format!(
                            "initial value kind {} does not match declared {}",
                            initial.kind(),
                            desc.field_type.kind()
                        ),
                    });
                }
            }
            if by_name.insert(desc.name.clone(), ordinal).is_some() {
                return Err(IocError::BadFieldDescriptor {
                    record_type: self.name.clone(),
                    field: desc.name.clone(),
                    reason: "duplicate field name".to_owned(),
                });
            }
        }
        let Some(&ind_val) = by_name.get("VAL") else {
            return Err(IocError::BadFieldDescriptor {
                record_type: self.name.clone(),
                field: "VAL".to_owned(),
                reason: "record type declares no VAL field".to_owned(),
            });
        };
        Ok(RecordType {
            name: self.name,
            fields: self.fields,
            by_name,
            ind_val,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironioc_types::FieldKind;

    fn minimal() -> RecordTypeBuilder {
        RecordType::builder("test")
            .field(FieldDescriptor::new("VAL", FieldType::Double).prompt("Value"))
    }

    #[test]
    fn build_indexes_fields_by_name() {
        let rt = minimal()
            .field(FieldDescriptor::new("egu", FieldType::Text { capacity: 16 }))
            .build()
            .unwrap();
        assert_eq!(rt.find_field("VAL").unwrap().ordinal(), 0);
        // Lookup is case-insensitive; storage is uppercase.
        assert_eq!(rt.find_field("egu").unwrap().ordinal(), 1);
        assert_eq!(rt.descriptor(1).unwrap().name(), "EGU");
        assert_eq!(rt.ind_val(), 0);
        assert!(rt.find_field("NOPE").is_none());
    }

    #[test]
    fn duplicate_field_is_rejected() {
        let err = minimal()
            .field(FieldDescriptor::new("val", FieldType::Long))
            .build()
            .unwrap_err();
        assert!(matches!(err, IocError::BadFieldDescriptor { .. }));
    }

    #[test]
    fn missing_val_is_rejected() {
        let err = RecordType::builder("bad")
            .field(FieldDescriptor::new("A", FieldType::Long))
            .build()
            .unwrap_err();
        assert!(matches!(err, IocError::BadFieldDescriptor { .. }));
    }

    #[test]
    fn initial_kind_must_match_declared() {
        let err = RecordType::builder("bad")
            .field(
                FieldDescriptor::new("VAL", FieldType::Double)
                    .initial(FieldValue::Text("x".into())),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, IocError::BadFieldDescriptor { .. }));
    }

    #[test]
    fn initial_text_parses_against_declared_kind() {
        let desc = FieldDescriptor::new("HIGH", FieldType::Double)
            .initial_text("80")
            .unwrap();
        assert_eq!(desc.default_value(), FieldValue::Double(80.0));
        assert_eq!(desc.field_type().kind(), FieldKind::Double);
    }
}
