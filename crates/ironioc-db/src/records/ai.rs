//! Analog input record type.

use std::sync::Arc;

use ironioc_error::Result;
use ironioc_static::{FieldDescriptor, RecordInstance, RecordType};
use ironioc_types::{
    menu::linr, AlarmStatus, FieldType, FieldValue, LinkMode, Severity, Special,
};

use crate::common::{self, common_fields};
use crate::context::{IocContext, RecordRuntime};
use crate::devsup::IoOutcome;
use crate::link::ResolvedLink;
use crate::recgbl::set_severity_msg;
use crate::recsup::{RecordSupport, ValueRange};
use crate::simm::{self, SimFields};

use super::{check_analog_alarms, monitor_analog, AnalogAlarmFields, AnalogMonitorFields};

/// Type-specific field ordinals, after the common head.
pub mod ord {
    use crate::common::NCOMMON;

    pub const VAL: usize = NCOMMON;
    pub const INP: usize = NCOMMON + 1;
    pub const RVAL: usize = NCOMMON + 2;
    pub const LINR: usize = NCOMMON + 3;
    pub const EGUF: usize = NCOMMON + 4;
    pub const EGUL: usize = NCOMMON + 5;
    pub const ESLO: usize = NCOMMON + 6;
    pub const EOFF: usize = NCOMMON + 7;
    pub const EGU: usize = NCOMMON + 8;
    pub const PREC: usize = NCOMMON + 9;
    pub const HOPR: usize = NCOMMON + 10;
    pub const LOPR: usize = NCOMMON + 11;
    pub const HIHI: usize = NCOMMON + 12;
    pub const LOLO: usize = NCOMMON + 13;
    pub const HIGH: usize = NCOMMON + 14;
    pub const LOW: usize = NCOMMON + 15;
    pub const HHSV: usize = NCOMMON + 16;
    pub const LLSV: usize = NCOMMON + 17;
    pub const HSV: usize = NCOMMON + 18;
    pub const LSV: usize = NCOMMON + 19;
    pub const HYST: usize = NCOMMON + 20;
    pub const LALM: usize = NCOMMON + 21;
    pub const MDEL: usize = NCOMMON + 22;
    pub const ADEL: usize = NCOMMON + 23;
    pub const MLST: usize = NCOMMON + 24;
    pub const ALST: usize = NCOMMON + 25;
    pub const SIMM: usize = NCOMMON + 26;
    pub const SIML: usize = NCOMMON + 27;
    pub const SVAL: usize = NCOMMON + 28;
    pub const SIOL: usize = NCOMMON + 29;
    pub const SIMS: usize = NCOMMON + 30;
    pub const SDLY: usize = NCOMMON + 31;
    pub const SSCN: usize = NCOMMON + 32;
    pub const OLDSIMM: usize = NCOMMON + 33;
}

const SIM: SimFields = SimFields {
    simm: ord::SIMM,
    siml: ord::SIML,
    sval: ord::SVAL,
    siol: ord::SIOL,
    sims: ord::SIMS,
    sdly: ord::SDLY,
    sscn: ord::SSCN,
    oldsimm: ord::OLDSIMM,
    rval: Some(ord::RVAL),
};

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

pub struct AiRecordSupport;

impl AiRecordSupport {
    fn convert(rec: &mut RecordInstance) {
        let rval = rec.get_f64(ord::RVAL);
        let val = match rec.get_enum(ord::LINR) {
            linr::LINEAR => rval * rec.get_f64(ord::ESLO) + rec.get_f64(ord::EOFF),
            _ => rval,
        };
        rec.set_f64(ord::VAL, val);
        common::set_udf(rec, false);
    }
}

impl RecordSupport for AiRecordSupport {
    fn type_name(&self) -> &str {
        "ai"
    }

    fn record_type(&self) -> RecordType {
        let mut builder = RecordType::builder("ai");
        for desc in common_fields() {
            builder = builder.field(desc);
        }
        builder
            .field(
                FieldDescriptor::new("VAL", FieldType::Double)
                    .prompt("Current EGU Value")
                    .process_passive(true),
            )
            .field(
                FieldDescriptor::new("INP", FieldType::Link { mode: LinkMode::Input })
                    .prompt("Input Specification"),
            )
            .field(FieldDescriptor::new("RVAL", FieldType::Long).prompt("Current Raw Value"))
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
                    .prompt("Engineer Units Full")
                    .special(Special::Mod),
            )
            .field(
                FieldDescriptor::new("EGUL", FieldType::Double)
                    .prompt("Engineer Units Low")
                    .special(Special::Mod),
            )
            .field(
                FieldDescriptor::new("ESLO", FieldType::Double)
                    .prompt("Raw to EGU Slope")
                    .initial(FieldValue::Double(1.0)),
            )
            .field(FieldDescriptor::new("EOFF", FieldType::Double).prompt("Raw to EGU Offset"))
            .field(
                FieldDescriptor::new("EGU", FieldType::Text { capacity: 16 })
                    .prompt("Engineering Units"),
            )
            .field(FieldDescriptor::new("PREC", FieldType::Short).prompt("Display Precision"))
            .field(FieldDescriptor::new("HOPR", FieldType::Double).prompt("High Operating Range"))
            .field(FieldDescriptor::new("LOPR", FieldType::Double).prompt("Low Operating Range"))
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
            .field(FieldDescriptor::new("SVAL", FieldType::Double).prompt("Simulation Value"))
            .field(
                FieldDescriptor::new("SIOL", FieldType::Link { mode: LinkMode::Input })
                    .prompt("Simulation Input Link"),
            )
            .field(FieldDescriptor::new("SIMS", sevr_menu()).prompt("Simulation Mode Severity"))
            .field(
                FieldDescriptor::new("SDLY", FieldType::Double)
                    .prompt("Sim. Mode Async Delay")
                    .initial(FieldValue::Double(-1.0)),
            )
            .field(
                FieldDescriptor::new(
                    "SSCN",
                    FieldType::Menu {
                        menu: "menuScan".to_owned(),
                    },
                )
                .prompt("Sim. Mode Scan"),
            )
            .field(
                FieldDescriptor::new(
                    "OLDSIMM",
                    FieldType::Menu {
                        menu: "menuSimm".to_owned(),
                    },
                )
                .prompt("Prev. Simulation Mode")
                .special(Special::NoMod),
            )
            .build()
            .unwrap_or_else(|err| panic!("ai layout is inconsistent: {err}"))
    }

    fn init_record(
        &self,
        _ctx: &Arc<IocContext>,
        rt: &Arc<RecordRuntime>,
        rec: &mut RecordInstance,
        pass: u8,
    ) -> Result<()> {
        if pass == 1 {
            if let ResolvedLink::Constant(v) = rt.link(SIM.siml) {
                rec.set(ord::SIMM, v.clone())?;
            }
            if let ResolvedLink::Constant(v) = rt.link(SIM.siol) {
                rec.set(ord::SVAL, v.clone())?;
            }
            rec.set_enum(ord::OLDSIMM, rec.get_enum(ord::SIMM));
        }
        Ok(())
    }

    fn process(&self, ctx: &Arc<IocContext>, rt: &Arc<RecordRuntime>) -> Result<()> {
        let pact_before = common::pact(&rt.rec.lock());
        let (outcome, io_err) = match simm::read_value(ctx, rt, &SIM) {
            Ok(o) => (o, None),
            Err(err) => {
                set_severity_msg(
                    &mut rt.rec.lock(),
                    AlarmStatus::Read,
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
        if io_err.is_none() && outcome == IoOutcome::Convert {
            Self::convert(&mut rec);
        }
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
        // Linearization inputs changed; let the device recompute its slope.
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
        self.get_graphic_range(rec)
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
        let rtype = AiRecordSupport.record_type();
        for (name, ordinal) in [
            ("VAL", ord::VAL),
            ("INP", ord::INP),
            ("RVAL", ord::RVAL),
            ("LINR", ord::LINR),
            ("ESLO", ord::ESLO),
            ("HYST", ord::HYST),
            ("LALM", ord::LALM),
            ("MDEL", ord::MDEL),
            ("SIMM", ord::SIMM),
            ("OLDSIMM", ord::OLDSIMM),
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
    fn linear_conversion_applies_slope_and_offset() {
        let rtype = std::sync::Arc::new(AiRecordSupport.record_type());
        let mut rec = RecordInstance::new("ai:conv", rtype);
        rec.set_f64(ord::RVAL, 100.0);
        rec.set_enum(ord::LINR, linr::LINEAR);
        rec.set_f64(ord::ESLO, 0.5);
        rec.set_f64(ord::EOFF, 2.0);
        AiRecordSupport::convert(&mut rec);
        assert_eq!(rec.get_f64(ord::VAL), 52.0);
        assert!(!common::udf(&rec));
    }

    #[test]
    fn no_conversion_copies_raw_value() {
        let rtype = std::sync::Arc::new(AiRecordSupport.record_type());
        let mut rec = RecordInstance::new("ai:raw", rtype);
        rec.set_f64(ord::RVAL, 7.0);
        rec.set_f64(ord::ESLO, 0.5);
        AiRecordSupport::convert(&mut rec);
        assert_eq!(rec.get_f64(ord::VAL), 7.0);
    }
}
