//! The common record head: fields every record type starts with.
//!
//! Every engine record type lays out these fields first, in this exact
//! order, so the ordinal constants below hold for any record. Type-specific
//! fields follow from [`NCOMMON`] onward; each record module defines its own
//! constants relative to that base and asserts them against the built
//! layout in its tests.

use ironioc_static::{FieldDescriptor, RecordInstance};
use ironioc_types::{
    AlarmStatus, FieldType, FieldValue, LinkMode, Severity, Special,
};

/// Ordinals of the common head fields.
pub mod ord {
    pub const NAME: usize = 0;
    pub const DESC: usize = 1;
    pub const SCAN: usize = 2;
    pub const PINI: usize = 3;
    pub const STAT: usize = 4;
    pub const SEVR: usize = 5;
    pub const NSTA: usize = 6;
    pub const NSEV: usize = 7;
    pub const AMSG: usize = 8;
    pub const NAMSG: usize = 9;
    pub const ACKS: usize = 10;
    pub const ACKT: usize = 11;
    pub const UDF: usize = 12;
    pub const UDFS: usize = 13;
    pub const TPRO: usize = 14;
    pub const PACT: usize = 15;
    pub const LCNT: usize = 16;
    pub const DISA: usize = 17;
    pub const DISV: usize = 18;
    pub const DISS: usize = 19;
    pub const SDIS: usize = 20;
    pub const FLNK: usize = 21;
    pub const RPRO: usize = 22;
    pub const PUTF: usize = 23;
    pub const PRIO: usize = 24;
    pub const DTYP: usize = 25;
}

/// Number of common head fields.
pub const NCOMMON: usize = 26;

/// Consecutive processing attempts on an active record before the engine
/// raises a SCAN alarm.
pub const MAX_LOCK: u8 = 10;

/// Descriptors for the common head, in ordinal order.
pub fn common_fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::new("NAME", FieldType::Text { capacity: 60 })
            .prompt("Record Name")
            .special(Special::NoMod),
        FieldDescriptor::new("DESC", FieldType::Text { capacity: 40 }).prompt("Descriptor"),
        FieldDescriptor::new("SCAN", FieldType::Menu { menu: "menuScan".into() })
            .prompt("Scan Mechanism")
            .special(Special::Scan),
        FieldDescriptor::new("PINI", FieldType::Menu { menu: "menuYesNo".into() })
            .prompt("Process at iocInit"),
        FieldDescriptor::new("STAT", FieldType::Menu { menu: "menuAlarmStat".into() })
            .prompt("Alarm Status")
            .initial(FieldValue::Enum(AlarmStatus::Udf.index()))
            .special(Special::NoMod),
        FieldDescriptor::new("SEVR", FieldType::Menu { menu: "menuAlarmSevr".into() })
            .prompt("Alarm Severity")
            .initial(FieldValue::Enum(Severity::Invalid.index()))
            .special(Special::NoMod),
        FieldDescriptor::new("NSTA", FieldType::Menu { menu: "menuAlarmStat".into() })
            .prompt("New Alarm Status")
            .special(Special::NoMod),
        FieldDescriptor::new("NSEV", FieldType::Menu { menu: "menuAlarmSevr".into() })
            .prompt("New Alarm Severity")
            .special(Special::NoMod),
        FieldDescriptor::new("AMSG", FieldType::Text { capacity: 40 })
            .prompt("Alarm Message")
            .special(Special::NoMod),
        FieldDescriptor::new("NAMSG", FieldType::Text { capacity: 40 })
            .prompt("New Alarm Message")
            .special(Special::NoMod),
        FieldDescriptor::new("ACKS", FieldType::Menu { menu: "menuAlarmSevr".into() })
            .prompt("Alarm Ack Severity")
            .special(Special::NoMod),
        FieldDescriptor::new("ACKT", FieldType::Menu { menu: "menuYesNo".into() })
            .prompt("Alarm Ack Transient")
            .initial(FieldValue::Enum(1)),
        FieldDescriptor::new("UDF", FieldType::UChar)
            .prompt("Undefined")
            .initial(FieldValue::UChar(1)),
        FieldDescriptor::new("UDFS", FieldType::Menu { menu: "menuAlarmSevr".into() })
            .prompt("Undefined Alarm Sevrty")
            .initial(FieldValue::Enum(Severity::Invalid.index())),
        FieldDescriptor::new("TPRO", FieldType::UChar).prompt("Trace Processing"),
        FieldDescriptor::new("PACT", FieldType::UChar)
            .prompt("Record active")
            .special(Special::NoMod),
        FieldDescriptor::new("LCNT", FieldType::UChar)
            .prompt("Lock Count")
            .special(Special::NoMod),
        FieldDescriptor::new("DISA", FieldType::Short).prompt("Disable"),
        FieldDescriptor::new("DISV", FieldType::Short)
            .prompt("Disable Value")
            .initial(FieldValue::Short(1)),
        FieldDescriptor::new("DISS", FieldType::Menu { menu: "menuAlarmSevr".into() })
            .prompt("Disable Alarm Sevrty"),
        FieldDescriptor::new("SDIS", FieldType::Link { mode: LinkMode::Input })
            .prompt("Scanning Disable"),
        FieldDescriptor::new("FLNK", FieldType::Link { mode: LinkMode::Forward })
            .prompt("Forward Process Link"),
        FieldDescriptor::new("RPRO", FieldType::UChar)
            .prompt("Reprocess")
            .special(Special::NoMod),
        FieldDescriptor::new("PUTF", FieldType::UChar)
            .prompt("dbPutField process")
            .special(Special::NoMod),
        FieldDescriptor::new("PRIO", FieldType::Menu { menu: "menuPriority".into() })
            .prompt("Scheduling Priority"),
        FieldDescriptor::new("DTYP", FieldType::Text { capacity: 40 }).prompt("Device Type"),
    ]
}

// Typed accessors for the head fields the engine touches on every cycle.

pub fn pact(rec: &RecordInstance) -> bool {
    rec.get_bool(ord::PACT)
}

pub fn set_pact(rec: &mut RecordInstance, v: bool) {
    rec.set_bool(ord::PACT, v);
}

pub fn udf(rec: &RecordInstance) -> bool {
    rec.get_bool(ord::UDF)
}

pub fn set_udf(rec: &mut RecordInstance, v: bool) {
    rec.set_bool(ord::UDF, v);
}

pub fn stat(rec: &RecordInstance) -> AlarmStatus {
    AlarmStatus::from_index(rec.get_enum(ord::STAT))
}

pub fn sevr(rec: &RecordInstance) -> Severity {
    Severity::from_index(rec.get_enum(ord::SEVR))
}

pub fn nsta(rec: &RecordInstance) -> AlarmStatus {
    AlarmStatus::from_index(rec.get_enum(ord::NSTA))
}

pub fn nsev(rec: &RecordInstance) -> Severity {
    Severity::from_index(rec.get_enum(ord::NSEV))
}
