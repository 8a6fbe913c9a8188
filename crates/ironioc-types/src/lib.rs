//! Core type definitions for the ironioc IOC core.
//!
//! This crate holds the vocabulary shared by the static database and the
//! record processing engine: the [`FieldValue`] tagged union used for
//! type-erased field access, the semantic [`FieldType`] of a field
//! descriptor, alarm [`Severity`]/[`AlarmStatus`] ranking, the monitor
//! [`EventMask`], and read-only [`Menu`] choice tables.

pub mod alarm;
pub mod events;
pub mod field;
pub mod menu;
pub mod value;

pub use alarm::{AlarmStatus, Severity};
pub use events::EventMask;
pub use field::{FieldKind, FieldType, LinkMode, Special};
pub use menu::{builtin_menus, menu_scan, Menu};
pub use value::FieldValue;
