//! Built-in record types and their shared processing helpers.

pub mod ai;
pub mod ao;
pub mod bits;
pub mod soft;

use ironioc_static::RecordInstance;
use ironioc_types::{AlarmStatus, EventMask, Severity};

use crate::common::{self, ord};
use crate::monitor::MonitorHub;
use crate::recgbl::{check_deadband, post_event, reset_alarms, set_severity};

/// Ordinals of the limit-alarm fields within an analog layout.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AnalogAlarmFields {
    pub hihi: usize,
    pub lolo: usize,
    pub high: usize,
    pub low: usize,
    pub hhsv: usize,
    pub llsv: usize,
    pub hsv: usize,
    pub lsv: usize,
    pub hyst: usize,
    pub lalm: usize,
}

/// Limit alarm arbitration with hysteresis.
///
/// Checked in precedence order HIHI, LOLO, HIGH, LOW; the first limit that
/// trips (or is still held within HYST of its threshold) wins. LALM
/// captures the value that tripped the alarm, stays put while the alarm is
/// only being held by hysteresis, and re-arms to the current value once
/// the reading leaves every alarm band.
pub(crate) fn check_analog_alarms(rec: &mut RecordInstance, f: &AnalogAlarmFields) {
    if common::udf(rec) {
        let udfs = Severity::from_index(rec.get_enum(ord::UDFS));
        set_severity(rec, AlarmStatus::Udf, udfs);
        return;
    }
    let val = rec.get_f64(rec.rtype().ind_val());
    let hyst = rec.get_f64(f.hyst);
    let lalm = rec.get_f64(f.lalm);

    let hihi = rec.get_f64(f.hihi);
    let hhsv = Severity::from_index(rec.get_enum(f.hhsv));
    let tripped = val >= hihi;
    if hhsv > Severity::NoAlarm && (tripped || (lalm >= hihi && val >= hihi - hyst)) {
        if set_severity(rec, AlarmStatus::HiHi, hhsv) && tripped {
            rec.set_f64(f.lalm, val);
        }
        return;
    }

    let lolo = rec.get_f64(f.lolo);
    let llsv = Severity::from_index(rec.get_enum(f.llsv));
    let tripped = val <= lolo;
    if llsv > Severity::NoAlarm && (tripped || (lalm <= lolo && val <= lolo + hyst)) {
        if set_severity(rec, AlarmStatus::LoLo, llsv) && tripped {
            rec.set_f64(f.lalm, val);
        }
        return;
    }

    let high = rec.get_f64(f.high);
    let hsv = Severity::from_index(rec.get_enum(f.hsv));
    let tripped = val >= high;
    if hsv > Severity::NoAlarm && (tripped || (lalm >= high && val >= high - hyst)) {
        if set_severity(rec, AlarmStatus::High, hsv) && tripped {
            rec.set_f64(f.lalm, val);
        }
        return;
    }

    let low = rec.get_f64(f.low);
    let lsv = Severity::from_index(rec.get_enum(f.lsv));
    let tripped = val <= low;
    if lsv > Severity::NoAlarm && (tripped || (lalm <= low && val <= low + hyst)) {
        if set_severity(rec, AlarmStatus::Low, lsv) && tripped {
            rec.set_f64(f.lalm, val);
        }
        return;
    }

    // Out of every band by at least the hysteresis; re-arm.
    rec.set_f64(f.lalm, val);
}

/// Ordinals of the change-notification deadband fields.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AnalogMonitorFields {
    pub mdel: usize,
    pub adel: usize,
    pub mlst: usize,
    pub alst: usize,
}

/// Publish alarm and value changes for an analog record.
///
/// The value channel and the archive channel keep separate shadows, so a
/// change can be worth archiving without being worth a value event and
/// vice versa. Small changes accumulate in the shadow distance until they
/// cross the deadband, then post once.
pub(crate) fn monitor_analog(hub: &MonitorHub, rec: &mut RecordInstance, f: &AnalogMonitorFields) {
    let mut mask = reset_alarms(hub, rec);
    let ind_val = rec.rtype().ind_val();
    let val = rec.get_f64(ind_val);
    if check_deadband(val, rec.get_f64(f.mlst), rec.get_f64(f.mdel)) {
        mask |= EventMask::VALUE;
        rec.set_f64(f.mlst, val);
    }
    if check_deadband(val, rec.get_f64(f.alst), rec.get_f64(f.adel)) {
        mask |= EventMask::ARCHIVE;
        rec.set_f64(f.alst, val);
    }
    post_event(hub, rec, ind_val, mask);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::common_fields;
    use ironioc_static::{FieldDescriptor, RecordType};
    use ironioc_types::FieldType;

    const VAL: usize = crate::common::NCOMMON;
    const HIHI: usize = VAL + 1;
    const LOLO: usize = VAL + 2;
    const HIGH: usize = VAL + 3;
    const LOW: usize = VAL + 4;
    const HHSV: usize = VAL + 5;
    const LLSV: usize = VAL + 6;
    const HSV: usize = VAL + 7;
    const LSV: usize = VAL + 8;
    const HYST: usize = VAL + 9;
    const LALM: usize = VAL + 10;

    const FIELDS: AnalogAlarmFields = AnalogAlarmFields {
        hihi: HIHI,
        lolo: LOLO,
        high: HIGH,
        low: LOW,
        hhsv: HHSV,
        llsv: LLSV,
        hsv: HSV,
        lsv: LSV,
        hyst: HYST,
        lalm: LALM,
    };

    fn sevr_menu() -> FieldType {
        FieldType::Menu {
            menu: "menuAlarmSevr".to_owned(),
        }
    }

    fn test_record() -> ironioc_static::RecordInstance {
        let mut builder = RecordType::builder("test");
        for desc in common_fields() {
            builder = builder.field(desc);
        }
        let rtype = builder
            .field(FieldDescriptor::new("VAL", FieldType::Double))
            .field(FieldDescriptor::new("HIHI", FieldType::Double))
            .field(FieldDescriptor::new("LOLO", FieldType::Double))
            .field(FieldDescriptor::new("HIGH", FieldType::Double))
            .field(FieldDescriptor::new("LOW", FieldType::Double))
            .field(FieldDescriptor::new("HHSV", sevr_menu()))
            .field(FieldDescriptor::new("LLSV", sevr_menu()))
            .field(FieldDescriptor::new("HSV", sevr_menu()))
            .field(FieldDescriptor::new("LSV", sevr_menu()))
            .field(FieldDescriptor::new("HYST", FieldType::Double))
            .field(FieldDescriptor::new("LALM", FieldType::Double))
            .build()
            .unwrap();
        let mut rec =
            ironioc_static::RecordInstance::new("lim:1", std::sync::Arc::new(rtype));
        common::set_udf(&mut rec, false);
        rec
    }

    fn arbitrate(rec: &mut ironioc_static::RecordInstance, val: f64) -> (AlarmStatus, Severity) {
        rec.set_f64(VAL, val);
        check_analog_alarms(rec, &FIELDS);
        let out = (common::nsta(rec), common::nsev(rec));
        // Clear the pending pair the way the end of a cycle does.
        rec.set_enum(ord::NSTA, 0);
        rec.set_enum(ord::NSEV, 0);
        out
    }

    #[test]
    fn hysteresis_holds_then_clears() {
        let mut rec = test_record();
        rec.set_f64(HIGH, 10.0);
        rec.set_enum(HSV, Severity::Minor.index());
        rec.set_f64(HYST, 2.0);

        assert_eq!(arbitrate(&mut rec, 11.0), (AlarmStatus::High, Severity::Minor));
        assert_eq!(rec.get_f64(LALM), 11.0, "the tripping value is captured");

        // Within HYST of the threshold the alarm holds, LALM stays put.
        assert_eq!(arbitrate(&mut rec, 9.5), (AlarmStatus::High, Severity::Minor));
        assert_eq!(rec.get_f64(LALM), 11.0);

        // Past the hysteresis band it clears and re-arms.
        assert_eq!(arbitrate(&mut rec, 7.9), (AlarmStatus::NoAlarm, Severity::NoAlarm));
        assert_eq!(rec.get_f64(LALM), 7.9);
    }

    #[test]
    fn hihi_takes_precedence_over_high() {
        let mut rec = test_record();
        rec.set_f64(HIGH, 80.0);
        rec.set_enum(HSV, Severity::Minor.index());
        rec.set_f64(HIHI, 90.0);
        rec.set_enum(HHSV, Severity::Major.index());
        rec.set_f64(HYST, 5.0);

        assert_eq!(arbitrate(&mut rec, 95.0), (AlarmStatus::HiHi, Severity::Major));
    }

    #[test]
    fn zero_severity_limit_never_alarms() {
        let mut rec = test_record();
        rec.set_f64(HIGH, 10.0);
        // HSV stays NO_ALARM.
        assert_eq!(
            arbitrate(&mut rec, 100.0),
            (AlarmStatus::NoAlarm, Severity::NoAlarm)
        );
    }

    #[test]
    fn undefined_value_alarms_with_udfs() {
        let mut rec = test_record();
        common::set_udf(&mut rec, true);
        check_analog_alarms(&mut rec, &FIELDS);
        assert_eq!(common::nsta(&rec), AlarmStatus::Udf);
        assert_eq!(common::nsev(&rec), Severity::Invalid);
    }
}
