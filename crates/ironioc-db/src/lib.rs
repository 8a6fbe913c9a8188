//! The record processing engine: dispatcher, alarms, monitors, links,
//! simulation mode, and the built-in record and device supports.

pub mod access;
pub mod common;
pub mod context;
pub mod devsup;
pub mod init;
pub mod link;
pub mod lockset;
pub mod monitor;
pub mod process;
pub mod recgbl;
pub mod records;
pub mod recsup;
pub mod simm;

pub use access::{get_field, get_field_string, put_field, put_field_string};
pub use common::{ord, MAX_LOCK, NCOMMON};
pub use context::{IocContext, RecordRuntime};
pub use devsup::{CompletionToken, DeviceSupport, IoOutcome};
pub use init::IocBuilder;
pub use link::{LinkFlags, MaximizeSeverity, ResolvedLink};
pub use monitor::{MonitorEvent, MonitorHub};
pub use process::{forward_link, process_record};
pub use recsup::{RecordSupport, ValueRange};
pub use simm::{SimFields, SimState};
