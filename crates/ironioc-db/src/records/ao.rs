//! Analog output record type.

use std::sync::Arc;

use ironioc_error::Result;
use ironioc_static::{FieldDescriptor, RecordInstance, RecordType};
use ironioc_types::{
    menu::{linr, omsl, sim_mode},
    AlarmStatus, FieldKind, FieldType, FieldValue, LinkMode, Severity, Special,
};

use crate::common::{self, common_fields};
use crate::context::{IocContext, RecordRuntime};
use crate::devsup::IoOutcome;
use crate::link::{get_link, put_link, ResolvedLink};
use crate::recgbl::{set_severity, set_severity_msg};
use crate::recsup::{RecordSupport, ValueRange};

use super::{check_analog_alarms, monitor_analog, AnalogAlarmFields, AnalogMonitorFields};

/// Type-specific field ordinals, after the common head.
pub mod ord {
    use crate::common::NCOMMON;

    pub const VAL: usize = NCOMMON;
    pub const OVAL: usize = NCOMMON + 1;
    pub const OUT: usize = NCOMMON + 2;
    pub const DOL: usize = NCOMMON + 3;
    pub const OMSL: usize = NCOMMON + 4;
    pub const RVAL: usize = NCOMMON + 5;
    pub const LINR: usize = NCOMMON + 6;
    pub const EGUF: usize = NCOMMON + 7;
    pub const EGUL: usize = NCOMMON + 8;
    pub const ESLO: usize = NCOMMON + 9;
    pub const EOFF: usize = NCOMMON + 10;
    pub const EGU: usize = NCOMMON + 11;
    pub const PREC: usize = NCOMMON + 12;
    pub const HOPR: usize = NCOMMON + 13;
    pub const LOPR: usize = NCOMMON + 14;
    pub const DRVH: usize = NCOMMON + 15;
    pub const DRVL: usize = NCOMMON + 16;
    pub const HIHI: usize = NCOMMON + 17;
    pub const LOLO: usize = NCOMMON + 18;
    pub const HIGH: usize = NCOMMON + 19;
    pub const LOW: usize = NCOMMON + 20;
    pub const HHSV: usize = NCOMMON + 21;
    pub const LLSV: usize = NCOMMON + 22;
    pub const HSV: usize = NCOMMON + 23;
    pub const LSV: usize = NCOMMON + 24;
    pub const HYST: usize = NCOMMON + 25;
    pub const LALM: usize = NCOMMON + 26;
    pub const MDEL: usize = NCOMMON + 27;
    pub const ADEL: usize = NCOMMON + 28;
    pub const MLST: usize = NCOMMON + 29;
    pub const ALST: usize = NCOMMON + 30;
    pub const SIMM: usize = NCOMMON + 31;
    pub const SIML: usize = NCOMMON + 32;
    pub const SIOL: usize = NCOMMON + 33;
    pub const SIMS: usize = NCOMMON + 34;
}

const ALARMS: AnalogAlarmFields = AnalogAlarmFields {
    hihi: ord::HIHI,
    lolo: ord::LOLO,
    high: ord::HIGH,
    low: ord::LOW,
    hhsv: ord::HHSV,
    llsv: ord::LLSV,
    hsv: ord::HSV,
    lsv: ord::LSV,
    hyst: ord::HYST,
    lalm: ord::LALM,
};

const MON: AnalogMonitorFields = AnalogMonitorFields {
    mdel: ord::MDEL,
    adel: ord::ADEL,
    mlst: ord::MLST,
    alst: ord::ALST,
};

fn sevr_menu() -> FieldType {
    FieldType::Menu {
        menu: "menuAlarmSevr".to_owned(),
    }
}

pub struct AoRecordSupport;

impl AoRecordSupport {
    /// Clamp VAL to the drive limits when they form a nonempty range.
    fn drive_limit(rec: &mut RecordInstance) {
        let drvh = rec.get_f64(ord::DRVH);
        let drvl = rec.get_f64(ord::DRVL);
        if drvh > drvl {
            let val = rec.get_f64(ord::VAL).clamp(drvl, drvh);
            rec.set_f64(ord::VAL, val);
        }
    }

    fn convert(rec: &mut RecordInstance) {
        let val = rec.get_f64(ord::VAL);
        let rval = match rec.get_enum(ord::LINR) {
            linr::LINEAR => {
                let eslo = rec.get_f64(ord::ESLO);
                if eslo != 0.0 {
                    (val - rec.get_f64(ord::EOFF)) / eslo
                } else {
                    val
                }
            }
            _ => val,
        };
        rec.set_f64(ord::RVAL, rval);
    }

    /// Simulated or real write of the converted value. Runs with the lock
    /// set held but no instance guard, so the output link can chain.
    fn write_value(&self, ctx: &Arc<IocContext>, rt: &Arc<RecordRuntime>) -> Result<IoOutcome> {
        let siml = rt.link(ord::SIML);
        if !siml.is_none() {
            let v = get_link(ctx, rt, siml, FieldKind::Enum)?;
            rt.rec.lock().set(ord::SIMM, v)?;
        }
        let simm = rt.rec.lock().get_enum(ord::SIMM);
        if simm == sim_mode::NO {
            return match &rt.dset {
                Some(dset) => dset.do_io(ctx, rt),
                None => Err(ironioc_error::IocError::MissingDeviceSupport(
                    rt.name.clone(),
                )),
            };
        }
        let oval = {
            let mut rec = rt.rec.lock();
            let sims = Severity::from_index(rec.get_enum(ord::SIMS));
            if sims > Severity::NoAlarm {
                set_severity(&mut rec, AlarmStatus::Simm, sims);
            }
            rec.get_f64(ord::OVAL)
        };
        let siol = rt.link(ord::SIOL).clone();
        put_link(ctx, rt, &siol, FieldValue::Double(oval))?;
        Ok(IoOutcome::NoConvert)
    }
}

impl RecordSupport for AoRecordSupport {
    fn type_name(&self) -> &str {
        "ao"
    }

    fn record_type(&self) -> RecordType {
        let mut builder = RecordType::builder("ao");
        for desc in common_fields() {
            builder = builder.field(desc);
        }
        builder
            .field(
                FieldDescriptor::new("VAL", FieldType::Double)
                    .prompt("Desired Output")
                    .process_passive(true),
            )
            .field(
                FieldDescriptor::new("OVAL", FieldType::Double)
                    .prompt("Output Value")
                    .special(Special::NoMod),
            )
            .field(
                FieldDescriptor::new("OUT", FieldType::Link { mode: LinkMode::Output })
                    .prompt("Output Specification"),
            )
            .field(
                FieldDescriptor::new("DOL", FieldType::Link { mode: LinkMode::Input })
                    .prompt("Desired Output Link"),
            )
            .field(
                FieldDescriptor::new(
                    "OMSL",
                    FieldType::Menu {
                        menu: "menuOmsl".to_owned(),
                    },
                )
                .prompt("Output Mode Select"),
            )
            .field(
                FieldDescriptor::new("RVAL", FieldType::Long)
                    .prompt("Current Raw Value")
                    .special(Special::NoMod),
            )
            .field(
                FieldDescriptor::new(
                    "LINR",
                    FieldType::Menu {
                        menu: "menuConvert".to_owned(),
                    },
                )
                .prompt("Linearization")
                .special(Special::Mod),
            )
            .field(
                FieldDescriptor::new("EGUF", FieldType::Double)
                    .prompt("Eng Units Full")
                    .special(Special::Mod),
            )
            .field(
                FieldDescriptor::new("EGUL", FieldType::Double)
                    .prompt("Eng Units Low")
                    .special(Special::Mod),
            )
            .field(
                FieldDescriptor::new("ESLO", FieldType::Double)
                    .prompt("EGU to Raw Slope")
                    .initial(FieldValue::Double(1.0)),
            )
            .field(FieldDescriptor::new("EOFF", FieldType::Double).prompt("EGU to Raw Offset"))
            .field(
                FieldDescriptor::new("EGU", FieldType::Text { capacity: 16 })
                    .prompt("Engineering Units"),
            )
            .field(FieldDescriptor::new("PREC", FieldType::Short).prompt("Display Precision"))
            .field(FieldDescriptor::new("HOPR", FieldType::Double).prompt("High Operating Range"))
            .field(FieldDescriptor::new("LOPR", FieldType::Double).prompt("Low Operating Range"))
            .field(FieldDescriptor::new("DRVH", FieldType::Double).prompt("Drive High Limit"))
            .field(FieldDescriptor::new("DRVL", FieldType::Double).prompt("Drive Low Limit"))
            .field(FieldDescriptor::new("HIHI", FieldType::Double).prompt("Hihi Alarm Limit"))
            .field(FieldDescriptor::new("LOLO", FieldType::Double).prompt("Lolo Alarm Limit"))
            .field(FieldDescriptor::new("HIGH", FieldType::Double).prompt("High Alarm Limit"))
            .field(FieldDescriptor::new("LOW", FieldType::Double).prompt("Low Alarm Limit"))
            .field(FieldDescriptor::new("HHSV", sevr_menu()).prompt("Hihi Severity"))
            .field(FieldDescriptor::new("LLSV", sevr_menu()).prompt("Lolo Severity"))
            .field(FieldDescriptor::new("HSV", sevr_menu()).prompt("High Severity"))
            .field(FieldDescriptor::new("LSV", sevr_menu()).prompt("Low Severity"))
            .field(FieldDescriptor::new("HYST", FieldType::Double).prompt("Alarm Deadband"))
            .field(
                FieldDescriptor::new("LALM", FieldType::Double)
                    .prompt("Last Value Alarmed")
                    .special(Special::NoMod),
            )
            .field(FieldDescriptor::new("MDEL", FieldType::Double).prompt("Monitor Deadband"))
            .field(FieldDescriptor::new("ADEL", FieldType::Double).prompt("Archive Deadband"))
            .field(
                FieldDescriptor::new("MLST", FieldType::Double)
                    .prompt("Last Val Monitored")
                    .special(Special::NoMod),
            )
            .field(
                FieldDescriptor::new("ALST", FieldType::Double)
                    .prompt("Last Value Archived")
                    .special(Special::NoMod),
            )
            .field(
                FieldDescriptor::new(
                    "SIMM",
                    FieldType::Menu {
                        menu: "menuSimm".to_owned(),
                    },
                )
                .prompt("Simulation Mode"),
            )
            .field(
                FieldDescriptor::new("SIML", FieldType::Link { mode: LinkMode::Input })
                    .prompt("Simulation Mode Link"),
            )
            .field(
                FieldDescriptor::new("SIOL", FieldType::Link { mode: LinkMode::Output })
                    .prompt("Simulation Output Link"),
            )
            .field(FieldDescriptor::new("SIMS", sevr_menu()).prompt("Simulation Mode Severity"))
            .build()
            .unwrap_or_else(|err| panic!("ao layout is inconsistent: {err}"))
    }

    fn init_record(
        &self,
        _ctx: &Arc<IocContext>,
        rt: &Arc<RecordRuntime>,
        rec: &mut RecordInstance,
        pass: u8,
    ) -> Result<()> {
        if pass == 1 {
            if let ResolvedLink::Constant(v) = rt.link(ord::DOL) {
                if rec.get_enum(ord::OMSL) == omsl::CLOSED_LOOP {
                    rec.set(ord::VAL, v.clone())?;
                    common::set_udf(rec, false);
                }
            }
        }
        Ok(())
    }

    fn process(&self, ctx: &Arc<IocContext>, rt: &Arc<RecordRuntime>) -> Result<()> {
        let pact_before = common::pact(&rt.rec.lock());

        if !pact_before {
            // Closed loop: fetch the desired output before writing.
            let dol = rt.link(ord::DOL).clone();
            let closed_loop = rt.rec.lock().get_enum(ord::OMSL) == omsl::CLOSED_LOOP;
            if closed_loop && !dol.is_none() {
                match get_link(ctx, rt, &dol, FieldKind::Double) {
                    Ok(v) => {
                        let mut rec = rt.rec.lock();
                        rec.set(ord::VAL, v)?;
                        common::set_udf(&mut rec, false);
                    }
                    Err(err) => {
                        set_severity(&mut rt.rec.lock(), AlarmStatus::Link, Severity::Invalid);
                        tracing::warn!(
                            record = %rt.name,
                            error = %err,
                            "desired output fetch failed"
                        );
                    }
                }
            }
            // OVAL is fixed before the write so a readback chain sees the
            // value this cycle puts out.
            let mut rec = rt.rec.lock();
            Self::drive_limit(&mut rec);
            Self::convert(&mut rec);
            let val = rec.get_f64(ord::VAL);
            rec.set_f64(ord::OVAL, val);
            common::set_udf(&mut rec, false);
        }

        let (outcome, io_err) = match self.write_value(ctx, rt) {
            Ok(o) => (o, None),
            Err(err) => {
                set_severity_msg(
                    &mut rt.rec.lock(),
                    AlarmStatus::Write,
                    Severity::Invalid,
                    &err.to_string(),
                );
                (IoOutcome::NoConvert, Some(err))
            }
        };
        let mut rec = rt.rec.lock();
        if outcome == IoOutcome::Pending {
            if !pact_before {
                common::set_pact(&mut rec, true);
            }
            return Ok(());
        }
        common::set_pact(&mut rec, true);
        check_analog_alarms(&mut rec, &ALARMS);
        monitor_analog(&ctx.monitors, &mut rec, &MON);
        crate::process::forward_link(ctx, rt, &mut rec);
        common::set_pact(&mut rec, false);
        match io_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn special(
        &self,
        _ctx: &Arc<IocContext>,
        rt: &Arc<RecordRuntime>,
        ordinal: usize,
        after: bool,
    ) -> Result<()> {
        if matches!(ordinal, ord::LINR | ord::EGUF | ord::EGUL) {
            if let Some(dset) = &rt.dset {
                let mut rec = rt.rec.lock();
                dset.special_linconv(&mut rec, after)?;
            }
        }
        Ok(())
    }

    fn get_units(&self, rec: &RecordInstance) -> String {
        rec.text(ord::EGU).to_owned()
    }

    fn get_precision(&self, rec: &RecordInstance) -> i16 {
        rec.get_f64(ord::PREC) as i16
    }

    fn get_graphic_range(&self, rec: &RecordInstance) -> Option<ValueRange> {
        Some(ValueRange {
            lower: rec.get_f64(ord::LOPR),
            upper: rec.get_f64(ord::HOPR),
        })
    }

    fn get_control_range(&self, rec: &RecordInstance) -> Option<ValueRange> {
        Some(ValueRange {
            lower: rec.get_f64(ord::DRVL),
            upper: rec.get_f64(ord::DRVH),
        })
    }

    fn get_alarm_range(&self, rec: &RecordInstance) -> Option<[f64; 4]> {
        Some([
            rec.get_f64(ord::LOLO),
            rec.get_f64(ord::LOW),
            rec.get_f64(ord::HIGH),
            rec.get_f64(ord::HIHI),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_ordinals_match_declared_names() {
        let rtype = AoRecordSupport.record_type();
        for (name, ordinal) in [
            ("VAL", ord::VAL),
            ("OVAL", ord::OVAL),
            ("OUT", ord::OUT),
            ("DOL", ord::DOL),
            ("OMSL", ord::OMSL),
            ("DRVH", ord::DRVH),
            ("DRVL", ord::DRVL),
            ("SIMS", ord::SIMS),
        ] {
            assert_eq!(
                rtype.find_field(name).map(|h| h.ordinal()),
                Some(ordinal),
                "ordinal mismatch for {name}"
            );
        }
        assert_eq!(rtype.ind_val(), ord::VAL);
    }

    #[test]
    fn drive_limits_clamp_the_output() {
        let rtype = std::sync::Arc::new(AoRecordSupport.record_type());
        let mut rec = RecordInstance::new("ao:clamp", rtype);
        rec.set_f64(ord::DRVL, 0.0);
        rec.set_f64(ord::DRVH, 10.0);
        rec.set_f64(ord::VAL, 15.0);
        AoRecordSupport::drive_limit(&mut rec);
        assert_eq!(rec.get_f64(ord::VAL), 10.0);

        rec.set_f64(ord::VAL, -3.0);
        AoRecordSupport::drive_limit(&mut rec);
        assert_eq!(rec.get_f64(ord::VAL), 0.0);
    }

    #[test]
    fn empty_drive_range_is_ignored() {
        let rtype = std::sync::Arc::new(AoRecordSupport.record_type());
        let mut rec = RecordInstance::new("ao:free", rtype);
        rec.set_f64(ord::VAL, 1e6);
        AoRecordSupport::drive_limit(&mut rec);
        assert_eq!(rec.get_f64(ord::VAL), 1e6);
    }

    #[test]
    fn inverse_linear_conversion() {
        let rtype = std::sync::Arc::new(AoRecordSupport.record_type());
        let mut rec = RecordInstance::new("ao:conv", rtype);
        rec.set_enum(ord::LINR, linr::LINEAR);
        rec.set_f64(ord::ESLO, 0.5);
        rec.set_f64(ord::EOFF, 2.0);
        rec.set_f64(ord::VAL, 52.0);
        AoRecordSupport::convert(&mut rec);
        assert_eq!(rec.get_f64(ord::RVAL), 100.0);
    }
}
