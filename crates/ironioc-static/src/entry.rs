//! Cursor ("entry") iteration over the static database.
//!
//! A `DbEntry` walks record types, then records of the current type, then
//! fields of the current record, mirroring how database browsing tools
//! traverse definitions. The cursor borrows the database; its transient
//! position state goes away when it is dropped.

use std::sync::Arc;

use ironioc_error::{IocError, Result};

use crate::database::{Database, RecordRef};
use crate::rtype::{FieldHandle, RecordType};

pub struct DbEntry<'db> {
    db: &'db Database,
    type_ix: Option<usize>,
    rec_ix: Option<usize>,
    field_ord: Option<usize>,
}

impl<'db> DbEntry<'db> {
    pub fn new(db: &'db Database) -> DbEntry<'db> {
        DbEntry {
            db,
            type_ix: None,
            rec_ix: None,
            field_ord: None,
        }
    }

    // ------------------------------------------------------------------
    // Record types
    // ------------------------------------------------------------------

    pub fn first_record_type(&mut self) -> bool {
        self.rec_ix = None;
        self.field_ord = None;
        self.type_ix = if self.db.record_type_names().is_empty() {
            None
        } else {
            Some(0)
        };
        self.type_ix.is_some()
    }

    pub fn next_record_type(&mut self) -> bool {
        self.rec_ix = None;
        self.field_ord = None;
        self.type_ix = match self.type_ix {
            Some(ix) if ix + 1 < self.db.record_type_names().len() => Some(ix + 1),
            _ => None,
        };
        self.type_ix.is_some()
    }

    pub fn record_type_name(&self) -> Option<&str> {
        self.type_ix
            .map(|ix| self.db.record_type_names()[ix].as_str())
    }

    fn current_type(&self) -> Option<&Arc<RecordType>> {
        self.record_type_name()
            .and_then(|name| self.db.record_type(name))
    }

    // ------------------------------------------------------------------
    // Records of the current type
    // ------------------------------------------------------------------

    fn records_here(&self) -> &[String] {
        self.record_type_name()
            .map_or(&[], |name| self.db.records_of_type(name))
    }

    pub fn first_record(&mut self) -> bool {
        self.field_ord = None;
        self.rec_ix = if self.records_here().is_empty() {
            None
        } else {
            Some(0)
        };
        self.rec_ix.is_some()
    }

    pub fn next_record(&mut self) -> bool {
        self.field_ord = None;
        self.rec_ix = match self.rec_ix {
            Some(ix) if ix + 1 < self.records_here().len() => Some(ix + 1),
            _ => None,
        };
        self.rec_ix.is_some()
    }

    pub fn record_name(&self) -> Option<&str> {
        self.rec_ix.map(|ix| self.records_here()[ix].as_str())
    }

    fn current_record(&self) -> Option<RecordRef> {
        self.record_name().and_then(|name| self.db.find_record(name))
    }

    // ------------------------------------------------------------------
    // Fields of the current record's type
    // ------------------------------------------------------------------

    pub fn first_field(&mut self) -> bool {
        let count = self.current_type().map_or(0, |t| t.field_count());
        self.field_ord = if count == 0 { None } else { Some(0) };
        self.field_ord.is_some()
    }

    pub fn next_field(&mut self) -> bool {
        let count = self.current_type().map_or(0, |t| t.field_count());
        self.field_ord = match self.field_ord {
            Some(ord) if ord + 1 < count => Some(ord + 1),
            _ => None,
        };
        self.field_ord.is_some()
    }

    pub fn field_name(&self) -> Option<&str> {
        let rtype = self.current_type()?;
        rtype.descriptor(self.field_ord?).map(|d| d.name())
    }

    /// Point the cursor at "record.FIELD" (field defaults to VAL).
    pub fn position_at(&mut self, target: &str) -> Result<()> {
        let (rec_name, field_name) = match target.split_once('.') {
            Some((r, f)) => (r, Some(f)),
            None => (target, None),
        };
        let rec = self
            .db
            .find_record(rec_name)
            .ok_or_else(|| IocError::RecordNotFound(rec_name.to_owned()))?;
        let rtype_name = rec.lock().rtype().name().to_owned();
        let type_ix = self
            .db
            .record_type_names()
            .iter()
            .position(|n| *n == rtype_name)
            .ok_or_else(|| IocError::RecordTypeNotFound(rtype_name.clone()))?;
        self.type_ix = Some(type_ix);
        self.rec_ix = self
            .db
            .records_of_type(&rtype_name)
            .iter()
            .position(|n| n == rec_name);
        let rtype = self
            .db
            .record_type(&rtype_name)
            .ok_or_else(|| IocError::RecordTypeNotFound(rtype_name.clone()))?;
        let handle = match field_name {
            Some(f) => rtype
                .find_field(f)
                .ok_or_else(|| IocError::FieldNotFound {
                    record_type: rtype_name,
                    field: f.to_owned(),
                })?,
            None => FieldHandle::new(rtype.ind_val()),
        };
        self.field_ord = Some(handle.ordinal());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Field access at the cursor
    // ------------------------------------------------------------------

    fn position(&self) -> Result<(RecordRef, FieldHandle)> {
        let rec = self
            .current_record()
            .ok_or_else(|| IocError::internal("cursor not on a record"))?;
        let ord = self
            .field_ord
            .ok_or_else(|| IocError::internal("cursor not on a field"))?;
        Ok((rec, FieldHandle::new(ord)))
    }

    pub fn get_field_as_string(&self) -> Result<String> {
        let (rec, handle) = self.position()?;
        let guard = rec.lock();
        self.db.field_to_string(&guard, handle)
    }

    pub fn put_field_from_string(&self, text: &str) -> Result<()> {
        let (rec, handle) = self.position()?;
        let mut guard = rec.lock();
        self.db.field_from_string(&mut guard, handle, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtype::{FieldDescriptor, RecordType};
    use ironioc_types::FieldType;

    fn sample_db() -> Database {
        let mut db = Database::new();
        db.register_record_type(
            RecordType::builder("ai")
                .field(FieldDescriptor::new("VAL", FieldType::Double))
                .field(FieldDescriptor::new("EGU", FieldType::Text { capacity: 16 }))
                .build()
                .unwrap(),
        )
        .unwrap();
        db.register_record_type(
            RecordType::builder("ao")
                .field(FieldDescriptor::new("VAL", FieldType::Double))
                .build()
                .unwrap(),
        )
        .unwrap();
        db.create_record("ai", "t:1").unwrap();
        db.create_record("ai", "t:2").unwrap();
        db.create_record("ao", "o:1").unwrap();
        db
    }

    #[test]
    fn walks_types_records_fields() {
        let db = sample_db();
        let mut entry = DbEntry::new(&db);
        let mut seen = Vec::new();
        let mut more_types = entry.first_record_type();
        while more_types {
            let mut more_recs = entry.first_record();
            while more_recs {
                seen.push(format!(
                    "{}/{}",
                    entry.record_type_name().unwrap(),
                    entry.record_name().unwrap()
                ));
                more_recs = entry.next_record();
            }
            more_types = entry.next_record_type();
        }
        assert_eq!(seen, vec!["ai/t:1", "ai/t:2", "ao/o:1"]);
    }

    #[test]
    fn field_walk_covers_the_layout() {
        let db = sample_db();
        let mut entry = DbEntry::new(&db);
        entry.position_at("t:1").unwrap();
        assert!(entry.first_field());
        assert_eq!(entry.field_name(), Some("VAL"));
        assert!(entry.next_field());
        assert_eq!(entry.field_name(), Some("EGU"));
        assert!(!entry.next_field());
    }

    #[test]
    fn position_and_string_access() {
        let db = sample_db();
        let mut entry = DbEntry::new(&db);
        entry.position_at("t:2.EGU").unwrap();
        entry.put_field_from_string("counts").unwrap();
        assert_eq!(entry.get_field_as_string().unwrap(), "counts");
        // Bare record name lands on VAL.
        entry.position_at("t:2").unwrap();
        assert_eq!(entry.get_field_as_string().unwrap(), "0.0");
        assert!(entry.position_at("nope.VAL").is_err());
        assert!(entry.position_at("t:2.NOPE").is_err());
    }
}
