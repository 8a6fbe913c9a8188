//! Direct bit-field input record type.
//!
//! Reads a raw word, shifts and masks it down to NOBT bits, and mirrors
//! each bit into its own one-byte field so clients can monitor individual
//! bits. Bit fields post only when their bit actually changes.

use std::sync::Arc;

use ironioc_error::Result;
use ironioc_static::{FieldDescriptor, RecordInstance, RecordType};
use ironioc_types::{AlarmStatus, EventMask, FieldType, FieldValue, LinkMode, Severity, Special};

use crate::common::{self, common_fields, ord as cord};
use crate::context::{IocContext, RecordRuntime};
use crate::devsup::IoOutcome;
use crate::recgbl::{post_event, reset_alarms, set_severity, set_severity_msg};
use crate::recsup::RecordSupport;
use crate::simm::{self, SimFields};

pub const NUM_BITS: usize = 8;

/// Type-specific field ordinals, after the common head.
pub mod ord {
    use crate::common::NCOMMON;

    pub const VAL: usize = NCOMMON;
    pub const INP: usize = NCOMMON + 1;
    pub const RVAL: usize = NCOMMON + 2;
    pub const NOBT: usize = NCOMMON + 3;
    pub const SHFT: usize = NCOMMON + 4;
    pub const MLST: usize = NCOMMON + 5;
    /// B0 through B7 are consecutive.
    pub const B0: usize = NCOMMON + 6;
    pub const SIMM: usize = NCOMMON + 14;
    pub const SIML: usize = NCOMMON + 15;
    pub const SVAL: usize = NCOMMON + 16;
    pub const SIOL: usize = NCOMMON + 17;
    pub const SIMS: usize = NCOMMON + 18;
    pub const SDLY: usize = NCOMMON + 19;
    pub const SSCN: usize = NCOMMON + 20;
    pub const OLDSIMM: usize = NCOMMON + 21;
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

pub struct BitsInRecordSupport;

impl BitsInRecordSupport {
    /// Shift and mask RVAL down to VAL. NOBT and SHFT are clamped to the
    /// word width so out-of-range settings read as zero instead of
    /// overflowing the shift.
    fn convert(rec: &mut RecordInstance) {
        let raw = rec.get_f64(ord::RVAL) as u32;
        let nobt = (rec.get_f64(ord::NOBT) as u32).min(31);
        let shft = rec.get_f64(ord::SHFT) as u32;
        let mask = if nobt == 0 { 0 } else { (1u32 << nobt) - 1 };
        let val = raw.checked_shr(shft).unwrap_or(0) & mask;
        rec.set_f64(ord::VAL, f64::from(val));
        common::set_udf(rec, false);
    }

    /// Post VAL on change and each bit field whose bit flipped.
    fn monitor(ctx: &IocContext, rec: &mut RecordInstance) {
        let mut mask = reset_alarms(&ctx.monitors, rec);
        let val = rec.get_f64(ord::VAL) as u32;
        if val != rec.get_f64(ord::MLST) as u32 {
            mask |= EventMask::VALUE | EventMask::ARCHIVE;
            rec.set_f64(ord::MLST, f64::from(val));
        }
        post_event(&ctx.monitors, rec, ord::VAL, mask);

        for bit in 0..NUM_BITS {
            let ordinal = ord::B0 + bit;
            let new = ((val >> bit) & 1) as u8;
            let old = rec.get_f64(ordinal) as u8;
            if new != old {
                rec.set_f64(ordinal, f64::from(new));
                post_event(
                    &ctx.monitors,
                    rec,
                    ordinal,
                    EventMask::VALUE | EventMask::ARCHIVE,
                );
            }
        }
    }
}

impl RecordSupport for BitsInRecordSupport {
    fn type_name(&self) -> &str {
        "bitsin"
    }

    fn record_type(&self) -> RecordType {
        let mut builder = RecordType::builder("bitsin");
        for desc in common_fields() {
            builder = builder.field(desc);
        }
        builder = builder
            .field(
                FieldDescriptor::new("VAL", FieldType::Long)
                    .prompt("Current Value")
                    .process_passive(true),
            )
            .field(
                FieldDescriptor::new("INP", FieldType::Link { mode: LinkMode::Input })
                    .prompt("Input Specification"),
            )
            .field(FieldDescriptor::new("RVAL", FieldType::ULong).prompt("Raw Value"))
            .field(
                FieldDescriptor::new("NOBT", FieldType::Short)
                    .prompt("Number of Bits")
                    .initial(FieldValue::Short(8)),
            )
            .field(FieldDescriptor::new("SHFT", FieldType::Short).prompt("Shift"))
            .field(
                FieldDescriptor::new("MLST", FieldType::Long)
                    .prompt("Last Value Monitored")
                    .special(Special::NoMod),
            );
        for bit in 0..NUM_BITS {
            builder = builder.field(
                FieldDescriptor::new(format!("B{bit}"), FieldType::UChar)
                    .prompt(format!("Bit {bit}"))
                    .special(Special::NoMod),
            );
        }
        builder
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
            .field(
                FieldDescriptor::new(
                    "SIMS",
                    FieldType::Menu {
                        menu: "menuAlarmSevr".to_owned(),
                    },
                )
                .prompt("Simulation Mode Severity"),
            )
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
            .unwrap_or_else(|err| panic!("bitsin layout is inconsistent: {err}"))
    }

    fn init_record(
        &self,
        _ctx: &Arc<IocContext>,
        rt: &Arc<RecordRuntime>,
        rec: &mut RecordInstance,
        pass: u8,
    ) -> Result<()> {
        if pass == 1 {
            if let crate::link::ResolvedLink::Constant(v) = rt.link(SIM.siml) {
                rec.set(ord::SIMM, v.clone())?;
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
        if common::udf(&rec) {
            let udfs = Severity::from_index(rec.get_enum(cord::UDFS));
            set_severity(&mut rec, AlarmStatus::Udf, udfs);
        }
        Self::monitor(ctx, &mut rec);
        crate::process::forward_link(ctx, rt, &mut rec);
        common::set_pact(&mut rec, false);
        match io_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_ordinals_match_declared_names() {
        let rtype = BitsInRecordSupport.record_type();
        for (name, ordinal) in [
            ("VAL", ord::VAL),
            ("RVAL", ord::RVAL),
            ("NOBT", ord::NOBT),
            ("SHFT", ord::SHFT),
            ("B0", ord::B0),
            ("B7", ord::B0 + 7),
            ("SIMM", ord::SIMM),
            ("OLDSIMM", ord::OLDSIMM),
        ] {
            assert_eq!(
                rtype.find_field(name).map(|h| h.ordinal()),
                Some(ordinal),
                "ordinal mismatch for {name}"
            );
        }
    }

    #[test]
    fn convert_shifts_and_masks() {
        let rtype = std::sync::Arc::new(BitsInRecordSupport.record_type());
        let mut rec = RecordInstance::new("bits:1", rtype);
        rec.set_f64(ord::RVAL, f64::from(0b1011_0100u32));
        rec.set_f64(ord::NOBT, 4.0);
        rec.set_f64(ord::SHFT, 2.0);
        BitsInRecordSupport::convert(&mut rec);
        assert_eq!(rec.get_f64(ord::VAL) as u32, 0b1101);
    }

    #[test]
    fn shift_past_the_word_width_reads_zero() {
        let rtype = std::sync::Arc::new(BitsInRecordSupport.record_type());
        let mut rec = RecordInstance::new("bits:s", rtype);
        rec.set_f64(ord::RVAL, 255.0);
        rec.set_f64(ord::NOBT, 8.0);
        rec.set_f64(ord::SHFT, 32.0);
        BitsInRecordSupport::convert(&mut rec);
        assert_eq!(rec.get_f64(ord::VAL), 0.0);
    }

    #[test]
    fn zero_width_reads_as_zero() {
        let rtype = std::sync::Arc::new(BitsInRecordSupport.record_type());
        let mut rec = RecordInstance::new("bits:z", rtype);
        rec.set_f64(ord::RVAL, 255.0);
        rec.set_f64(ord::NOBT, 0.0);
        BitsInRecordSupport::convert(&mut rec);
        assert_eq!(rec.get_f64(ord::VAL), 0.0);
    }
}
