//! The static database: menus, record types, device entries, and the
//! process-variable directory of record instances.

use std::sync::Arc;

use hashbrown::HashMap;
use ironioc_com::{NameDirectory, NamespaceId};
use ironioc_error::{IocError, Result};
use ironioc_types::{builtin_menus, FieldType, FieldValue, Menu, Special};
use parking_lot::Mutex;

use crate::instance::RecordInstance;
use crate::rtype::{FieldHandle, RecordType};

/// Shared handle to a live record.
pub type RecordRef = Arc<Mutex<RecordInstance>>;

/// One `device(...)` entry: a device-type choice bound to a named device
/// support for one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    /// Choice text matched against a record's DTYP field.
    pub choice: String,
    /// Registered name of the device support.
    pub dset_name: String,
}

/// Everything loaded before the IOC runs: definitions plus instances.
///
/// Record types and menus are immutable once registered; record instances
/// sit behind per-record mutexes in the process-variable directory.
pub struct Database {
    menus: HashMap<String, Arc<Menu>>,
    types: HashMap<String, Arc<RecordType>>,
    devices: HashMap<String, Vec<DeviceEntry>>,
    pvd: NameDirectory<RecordRef>,
    /// Record names per type, in creation order; backs cursor iteration.
    by_type: HashMap<String, Vec<String>>,
    type_order: Vec<String>,
}

impl Default for Database {
    fn default() -> Self {
        Database::new()
    }
}

impl Database {
    /// An empty database preloaded with the canned menus.
    pub fn new() -> Database {
        let mut menus = HashMap::new();
        for menu in builtin_menus() {
            menus.insert(menu.name().to_owned(), Arc::new(menu));
        }
        Database {
            menus,
            types: HashMap::new(),
            devices: HashMap::new(),
            pvd: NameDirectory::new(),
            by_type: HashMap::new(),
            type_order: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Definitions
    // ------------------------------------------------------------------

    /// Register a menu. A redefinition under the same name is ignored with
    /// a warning; the first definition wins.
    pub fn add_menu(&mut self, menu: Menu) {
        if self.menus.contains_key(menu.name()) {
            tracing::warn!(menu = menu.name(), "menu already defined, keeping first");
            return;
        }
        self.menus.insert(menu.name().to_owned(), Arc::new(menu));
    }

    pub fn menu(&self, name: &str) -> Option<&Arc<Menu>> {
        self.menus.get(name)
    }

    /// Register a record type. Menu-typed fields must reference a menu
    /// that is already defined.
    pub fn register_record_type(&mut self, rtype: RecordType) -> Result<Arc<RecordType>> {
        if self.types.contains_key(rtype.name()) {
            return Err(IocError::DuplicateRecordType(rtype.name().to_owned()));
        }
        for desc in rtype.fields() {
            if let FieldType::Menu { menu } = desc.field_type() {
                if !self.menus.contains_key(menu) {
                    return Err(IocError::BadFieldDescriptor {
                        record_type: rtype.name().to_owned(),
                        field: desc.name().to_owned(),
                        reason: format!("references undefined menu {menu}"),
                    });
                }
            }
        }
        let name = rtype.name().to_owned();
        let shared = Arc::new(rtype);
        self.types.insert(name.clone(), Arc::clone(&shared));
        self.by_type.insert(name.clone(), Vec::new());
        self.type_order.push(name);
        Ok(shared)
    }

    pub fn record_type(&self, name: &str) -> Option<&Arc<RecordType>> {
        self.types.get(name)
    }

    /// Record type names in registration order.
    pub fn record_type_names(&self) -> &[String] {
        &self.type_order
    }

    /// Bind a DTYP choice to a device support name for a record type.
    pub fn add_device(
        &mut self,
        rtype: &str,
        choice: impl Into<String>,
        dset_name: impl Into<String>,
    ) -> Result<()> {
        if !self.types.contains_key(rtype) {
            return Err(IocError::RecordTypeNotFound(rtype.to_owned()));
        }
        let entries = self.devices.entry(rtype.to_owned()).or_default();
        let choice = choice.into();
        if entries.iter().any(|e| e.choice == choice) {
            tracing::warn!(rtype, choice, "device choice already bound, keeping first");
            return Ok(());
        }
        entries.push(DeviceEntry {
            choice,
            dset_name: dset_name.into(),
        });
        Ok(())
    }

    /// Device support name for a record's DTYP text. An empty DTYP picks
    /// the first device entry registered for the type.
    pub fn dset_name(&self, rtype: &str, dtyp: &str) -> Option<&str> {
        let entries = self.devices.get(rtype)?;
        if dtyp.is_empty() {
            return entries.first().map(|e| e.dset_name.as_str());
        }
        entries
            .iter()
            .find(|e| e.choice == dtyp)
            .map(|e| e.dset_name.as_str())
    }

    pub fn device_entries(&self, rtype: &str) -> &[DeviceEntry] {
        self.devices.get(rtype).map_or(&[], Vec::as_slice)
    }

    // ------------------------------------------------------------------
    // Instances
    // ------------------------------------------------------------------

    /// Create a record instance with descriptor defaults and insert it
    /// into the process-variable directory.
    pub fn create_record(&mut self, rtype: &str, name: &str) -> Result<RecordRef> {
        let shared = self
            .types
            .get(rtype)
            .ok_or_else(|| IocError::RecordTypeNotFound(rtype.to_owned()))?;
        let rec = RecordInstance::new(name, Arc::clone(shared));
        self.insert_record(rec)
    }

    /// Insert a fully built instance. The loader uses this so a record
    /// whose field list fails part-way is never visible in the directory.
    pub fn insert_record(&mut self, rec: RecordInstance) -> Result<RecordRef> {
        let rtype = rec.rtype().name().to_owned();
        if !self.types.contains_key(&rtype) {
            return Err(IocError::RecordTypeNotFound(rtype));
        }
        let name = rec.name().to_owned();
        let rec: RecordRef = Arc::new(Mutex::new(rec));
        self.pvd
            .insert(NamespaceId::RECORDS, &name, Arc::clone(&rec))?;
        if let Some(names) = self.by_type.get_mut(&rtype) {
            names.push(name);
        }
        Ok(rec)
    }

    pub fn find_record(&self, name: &str) -> Option<RecordRef> {
        self.pvd.find(NamespaceId::RECORDS, name)
    }

    pub fn record_count(&self) -> usize {
        self.pvd.len()
    }

    /// Record names of one type, in creation order.
    pub fn records_of_type(&self, rtype: &str) -> &[String] {
        self.by_type.get(rtype).map_or(&[], Vec::as_slice)
    }

    /// Drop a record from the directory. Only legal before the IOC
    /// initializes; link resolution would otherwise hold dangling refs.
    pub fn remove_record(&mut self, name: &str) -> Result<()> {
        let rec = self
            .pvd
            .remove(NamespaceId::RECORDS, name)
            .ok_or_else(|| IocError::RecordNotFound(name.to_owned()))?;
        let rtype = rec.lock().rtype().name().to_owned();
        if let Some(names) = self.by_type.get_mut(&rtype) {
            names.retain(|n| n != name);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Generic string access
    // ------------------------------------------------------------------

    /// Format a field for display, honoring its semantic type (menu
    /// choices render as their text).
    pub fn field_to_string(&self, rec: &RecordInstance, handle: FieldHandle) -> Result<String> {
        let ordinal = handle.ordinal();
        let desc = rec
            .rtype()
            .descriptor(ordinal)
            .ok_or_else(|| IocError::FieldNotFound {
                record_type: rec.rtype().name().to_owned(),
                field: format!("#{ordinal}"),
            })?;
        if let FieldType::Menu { menu } = desc.field_type() {
            let ix = rec.get_enum(ordinal);
            if let Some(menu) = self.menus.get(menu) {
                if let Some(choice) = menu.choice(ix) {
                    return Ok(choice.to_owned());
                }
            }
        }
        Ok(rec.field(ordinal).format())
    }

    /// Parse text into a field, honoring its semantic type. Menu fields
    /// accept a choice name or a raw index; `NoMod` fields reject writes.
    pub fn field_from_string(
        &self,
        rec: &mut RecordInstance,
        handle: FieldHandle,
        text: &str,
    ) -> Result<()> {
        let ordinal = handle.ordinal();
        let desc = rec
            .rtype()
            .descriptor(ordinal)
            .ok_or_else(|| IocError::FieldNotFound {
                record_type: rec.rtype().name().to_owned(),
                field: format!("#{ordinal}"),
            })?;
        if desc.special_class() == Special::NoMod {
            return Err(IocError::InvalidValue {
                what: format!("read-only field {}.{}", rec.name(), desc.name()),
                text: text.to_owned(),
            });
        }
        let value = match desc.field_type() {
            FieldType::Menu { menu } => {
                let menu = self
                    .menus
                    .get(menu)
                    .ok_or_else(|| IocError::MenuNotFound(menu.clone()))?;
                let ix = match menu.index_of(text.trim()) {
                    Ok(ix) => ix,
                    // Fall back to a raw index, still bounds-checked.
                    Err(err) => {
                        let ix = text.trim().parse::<u16>().map_err(|_| err)?;
                        if usize::from(ix) >= menu.len() {
                            return Err(IocError::BadChoice {
                                menu: menu.name().to_owned(),
                                choice: text.to_owned(),
                            });
                        }
                        ix
                    }
                };
                FieldValue::Enum(ix)
            }
            other => FieldValue::parse(other.kind(), text)?,
        };
        rec.set(ordinal, value)
    }
}
