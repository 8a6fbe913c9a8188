//! Record support: the per-type processing logic behind the engine.

use std::sync::Arc;

use ironioc_error::Result;
use ironioc_static::{RecordInstance, RecordType};

use crate::context::{IocContext, RecordRuntime};

/// Graphic or control display range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub lower: f64,
    pub upper: f64,
}

/// One record type's support: layout plus processing behavior.
///
/// `process` owns the whole cycle the way the engine's dispatcher expects:
/// it sets the record active, runs I/O and conversion, arbitrates alarms,
/// posts monitors, schedules the forward link, and clears the active flag.
/// For asynchronous devices it is called a second time with the record
/// still active to run the completion half.
pub trait RecordSupport: Send + Sync {
    /// The record type name this support implements.
    fn type_name(&self) -> &str;

    /// Field layout of the type, common head first.
    fn record_type(&self) -> RecordType;

    /// Fewest functions a device support bound to this type may declare.
    fn min_dset_functions(&self) -> usize {
        6
    }

    /// Two-pass instance init: pass 0 before links resolve, pass 1 after.
    fn init_record(
        &self,
        _ctx: &Arc<IocContext>,
        _rt: &Arc<RecordRuntime>,
        _rec: &mut RecordInstance,
        _pass: u8,
    ) -> Result<()> {
        Ok(())
    }

    /// One processing cycle (or its completion half). Called with the
    /// record's lock set held but the record itself unlocked.
    fn process(&self, ctx: &Arc<IocContext>, rt: &Arc<RecordRuntime>) -> Result<()>;

    /// Hook around direct writes to fields whose descriptor declares a
    /// special-modification class.
    fn special(
        &self,
        _ctx: &Arc<IocContext>,
        _rt: &Arc<RecordRuntime>,
        _ordinal: usize,
        _after: bool,
    ) -> Result<()> {
        Ok(())
    }

    fn get_units(&self, _rec: &RecordInstance) -> String {
        String::new()
    }

    fn get_precision(&self, _rec: &RecordInstance) -> i16 {
        0
    }

    fn get_graphic_range(&self, _rec: &RecordInstance) -> Option<ValueRange> {
        None
    }

    fn get_control_range(&self, _rec: &RecordInstance) -> Option<ValueRange> {
        None
    }

    /// Limit-alarm thresholds (lolo, low, high, hihi), when the type has
    /// them.
    fn get_alarm_range(&self, _rec: &RecordInstance) -> Option<[f64; 4]> {
        None
    }
}
