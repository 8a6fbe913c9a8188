//! Static database layer: everything known before the IOC runs.
//!
//! Record types, menus, and device bindings are immutable definitions;
//! record instances live behind per-record mutexes in a process-variable
//! directory. A text loader populates both, and [`DbEntry`] gives cursor
//! iteration over the loaded tree.

pub mod database;
pub mod entry;
pub mod instance;
pub mod loader;
pub mod rtype;

pub use database::{Database, DeviceEntry, RecordRef};
pub use entry::DbEntry;
pub use instance::RecordInstance;
pub use loader::LoadReport;
pub use rtype::{FieldDescriptor, FieldHandle, RecordType, RecordTypeBuilder};
