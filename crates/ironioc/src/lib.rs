//! An EPICS-style input/output controller core.
//!
//! The pieces live in the member crates; this crate ties them together
//! behind [`Ioc`]: load a database, register supports, initialize, then
//! process records and get/put fields by `record.FIELD` address.
//!
//! ```no_run
//! use ironioc::Ioc;
//!
//! # fn main() -> ironioc::Result<()> {
//! let mut builder = Ioc::builder();
//! builder.register_standard()?;
//! builder.load_records(
//!     r#"
//!     record(ai, "temp:water") {
//!         field(DTYP, "Soft Channel")
//!         field(HIGH, "80")
//!         field(HSV,  "MINOR")
//!     }
//!     "#,
//! )?;
//! let ioc = builder.build()?;
//! ioc.put("temp:water.VAL", ironioc::FieldValue::Double(25.0))?;
//! ioc.process("temp:water")?;
//! # Ok(())
//! # }
//! ```

use std::sync::mpsc::Receiver;
use std::sync::Arc;

pub use ironioc_com::{CallbackQueue, NameDirectory, OnceRegistry, OrderedArena, Pool, Priority};
pub use ironioc_db::{
    access, forward_link, process_record, CompletionToken, DeviceSupport, IoOutcome, IocContext,
    MonitorEvent, MonitorHub, RecordRuntime, RecordSupport, ResolvedLink,
};
pub use ironioc_error::{IocError, Result};
pub use ironioc_static::{
    Database, DbEntry, FieldDescriptor, LoadReport, RecordInstance, RecordType,
};
pub use ironioc_types::{AlarmStatus, EventMask, FieldKind, FieldType, FieldValue, Severity};

pub use ironioc_db::records;

/// Collects database content and supports before the IOC starts.
pub struct IocAssembler {
    inner: ironioc_db::IocBuilder,
}

impl IocAssembler {
    pub fn new() -> IocAssembler {
        IocAssembler {
            inner: ironioc_db::IocBuilder::new(),
        }
    }

    /// The built-in record types and soft-channel devices.
    pub fn register_standard(&mut self) -> Result<()> {
        self.inner.register_standard()
    }

    pub fn register_record_support(&mut self, rset: Arc<dyn RecordSupport>) -> Result<()> {
        self.inner.register_record_support(rset)
    }

    pub fn register_device_support(&mut self, dset: Arc<dyn DeviceSupport>) {
        self.inner.register_device_support(dset);
    }

    /// Load menu, record type, and device definitions. Malformed blocks
    /// are skipped and collected in the report.
    pub fn load_definitions(&mut self, src: &str) -> Result<LoadReport> {
        let report = self.inner.database_mut().load_definitions(src)?;
        for err in &report.errors {
            tracing::error!(error = %err, "definition block skipped");
        }
        Ok(report)
    }

    /// Load record instances. Malformed entries are skipped and reported;
    /// the rest of the file still loads.
    pub fn load_records(&mut self, src: &str) -> Result<LoadReport> {
        let report = self.inner.database_mut().load_records(src)?;
        for err in &report.errors {
            tracing::warn!(error = %err, "record entry skipped");
        }
        Ok(report)
    }

    pub fn database(&self) -> &Database {
        self.inner.database()
    }

    pub fn database_mut(&mut self) -> &mut Database {
        self.inner.database_mut()
    }

    /// Resolve links, run both init passes, process PINI records, and
    /// hand back the running IOC.
    pub fn build(self) -> Result<Ioc> {
        Ok(Ioc {
            ctx: self.inner.init()?,
        })
    }
}

impl Default for IocAssembler {
    fn default() -> Self {
        IocAssembler::new()
    }
}

/// A running IOC.
pub struct Ioc {
    ctx: Arc<IocContext>,
}

impl Ioc {
    pub fn builder() -> IocAssembler {
        IocAssembler::new()
    }

    pub fn context(&self) -> &Arc<IocContext> {
        &self.ctx
    }

    pub fn database(&self) -> &Database {
        &self.ctx.db
    }

    /// Run one processing cycle for a record.
    pub fn process(&self, record: &str) -> Result<()> {
        ironioc_db::process_record(&self.ctx, record)
    }

    /// Snapshot a field by `record.FIELD` address (field defaults to VAL).
    pub fn get(&self, addr: &str) -> Result<FieldValue> {
        access::get_field(&self.ctx, addr)
    }

    /// Format a field for display, menu choices as text.
    pub fn get_string(&self, addr: &str) -> Result<String> {
        access::get_field_string(&self.ctx, addr)
    }

    /// Store a value, running put-side processing semantics.
    pub fn put(&self, addr: &str, value: FieldValue) -> Result<()> {
        access::put_field(&self.ctx, addr, value)
    }

    /// Parse text into a field, running put-side processing semantics.
    pub fn put_string(&self, addr: &str, text: &str) -> Result<()> {
        access::put_field_string(&self.ctx, addr, text)
    }

    /// Subscribe to every monitor event posted for one record.
    pub fn subscribe(&self, record: &str) -> Receiver<MonitorEvent> {
        self.ctx.monitors.subscribe(record)
    }
}
