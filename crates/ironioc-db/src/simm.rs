//! Simulation mode: substituting device I/O with a simulation link.
//!
//! Input record types share this machinery. SIMM selects the mode: NO runs
//! the real device, YES feeds the simulation value straight into VAL, RAW
//! feeds it into the raw field so normal conversion applies. SIML can drive
//! SIMM from another record, SDLY >= 0 makes simulated reads complete
//! asynchronously after that many seconds, SIMS raises a standing alarm
//! while simulating, and SSCN swaps with SCAN on every transition in or
//! out of simulation so a simulated record can scan differently.

use std::sync::Arc;
use std::time::Duration;

use ironioc_error::{IocError, Result};
use ironioc_static::RecordInstance;
use ironioc_types::{menu::sim_mode, AlarmStatus, EventMask, FieldKind, Severity};

use crate::common::{self, ord};
use crate::context::{IocContext, RecordRuntime};
use crate::devsup::{CompletionToken, IoOutcome};
use crate::link::get_link;
use crate::recgbl::{post_event, set_severity};

/// Ordinals of the simulation fields within one record type's layout.
#[derive(Debug, Clone, Copy)]
pub struct SimFields {
    pub simm: usize,
    pub siml: usize,
    pub sval: usize,
    pub siol: usize,
    pub sims: usize,
    pub sdly: usize,
    pub sscn: usize,
    pub oldsimm: usize,
    /// Raw destination for RAW mode, when the type has one.
    pub rval: Option<usize>,
}

/// Mutable per-record simulation bookkeeping.
#[derive(Debug, Default)]
pub struct SimState {
    /// A delayed simulated read is in flight.
    pub pending: bool,
}

/// Refresh SIMM from SIML and swap SCAN/SSCN on mode transitions.
fn refresh_mode(
    ctx: &Arc<IocContext>,
    rt: &Arc<RecordRuntime>,
    fields: &SimFields,
) -> Result<()> {
    let siml = rt.link(fields.siml);
    if !siml.is_none() {
        let v = get_link(ctx, rt, siml, FieldKind::Enum)?;
        rt.rec.lock().set(fields.simm, v)?;
    }
    let mut rec = rt.rec.lock();
    let simm = rec.get_enum(fields.simm);
    let old = rec.get_enum(fields.oldsimm);
    if simm != old {
        let was_sim = old != sim_mode::NO;
        let is_sim = simm != sim_mode::NO;
        if was_sim != is_sim {
            let scan = rec.get_enum(ord::SCAN);
            let sscn = rec.get_enum(fields.sscn);
            rec.set_enum(ord::SCAN, sscn);
            rec.set_enum(fields.sscn, scan);
            post_event(&ctx.monitors, &rec, ord::SCAN, EventMask::VALUE);
            tracing::debug!(
                record = rec.name(),
                entering = is_sim,
                "simulation mode transition, scan swapped"
            );
        }
        rec.set_enum(fields.oldsimm, simm);
    }
    Ok(())
}

/// Read the record's input, simulated or real.
///
/// Called from a record support's process with the lock set held but no
/// instance guard, so the simulation links can chain into other records.
/// When the record is already active this is the completion half of a
/// delayed simulated read.
pub fn read_value(
    ctx: &Arc<IocContext>,
    rt: &Arc<RecordRuntime>,
    fields: &SimFields,
) -> Result<IoOutcome> {
    let pact = common::pact(&rt.rec.lock());
    if !pact {
        refresh_mode(ctx, rt, fields)?;
    }
    let simm = rt.rec.lock().get_enum(fields.simm);
    match simm {
        sim_mode::NO => match &rt.dset {
            Some(dset) => dset.do_io(ctx, rt),
            None => Err(IocError::MissingDeviceSupport(rt.name.clone())),
        },
        sim_mode::YES => {
            if pact {
                rt.sim.lock().pending = false;
                let mut rec = rt.rec.lock();
                let sval = rec.get_f64(fields.sval);
                let ind_val = rec.rtype().ind_val();
                rec.set_f64(ind_val, sval);
                common::set_udf(&mut rec, false);
                return Ok(IoOutcome::NoConvert);
            }
            raise_sim_alarm(&mut rt.rec.lock(), fields);
            fetch_sim_value(ctx, rt, fields)?;
            if let Some((delay, token)) = start_delay(ctx, rt, fields) {
                token.complete_after(delay);
                return Ok(IoOutcome::Pending);
            }
            let mut rec = rt.rec.lock();
            let sval = rec.get_f64(fields.sval);
            let ind_val = rec.rtype().ind_val();
            rec.set_f64(ind_val, sval);
            common::set_udf(&mut rec, false);
            Ok(IoOutcome::NoConvert)
        }
        sim_mode::RAW => {
            let Some(rval) = fields.rval else {
                set_severity(&mut rt.rec.lock(), AlarmStatus::Soft, Severity::Invalid);
                return Ok(IoOutcome::NoConvert);
            };
            if pact {
                rt.sim.lock().pending = false;
                let mut rec = rt.rec.lock();
                let sval = rec.get_f64(fields.sval);
                rec.set_f64(rval, sval);
                return Ok(IoOutcome::Convert);
            }
            raise_sim_alarm(&mut rt.rec.lock(), fields);
            fetch_sim_value(ctx, rt, fields)?;
            if let Some((delay, token)) = start_delay(ctx, rt, fields) {
                token.complete_after(delay);
                return Ok(IoOutcome::Pending);
            }
            let mut rec = rt.rec.lock();
            let sval = rec.get_f64(fields.sval);
            rec.set_f64(rval, sval);
            Ok(IoOutcome::Convert)
        }
        other => {
            tracing::warn!(record = %rt.name, simm = other, "bad simulation mode");
            set_severity(&mut rt.rec.lock(), AlarmStatus::Soft, Severity::Invalid);
            Ok(IoOutcome::NoConvert)
        }
    }
}

/// Standing alarm while simulating, per SIMS.
fn raise_sim_alarm(rec: &mut RecordInstance, fields: &SimFields) {
    let sims = Severity::from_index(rec.get_enum(fields.sims));
    if sims > Severity::NoAlarm {
        set_severity(rec, AlarmStatus::Simm, sims);
    }
}

/// Pull SIOL into SVAL. A broken simulation link is a LINK alarm.
fn fetch_sim_value(
    ctx: &Arc<IocContext>,
    rt: &Arc<RecordRuntime>,
    fields: &SimFields,
) -> Result<()> {
    let siol = rt.link(fields.siol);
    if siol.is_none() {
        return Ok(());
    }
    match get_link(ctx, rt, siol, FieldKind::Double) {
        Ok(v) => rt.rec.lock().set(fields.sval, v),
        Err(err) => {
            set_severity(&mut rt.rec.lock(), AlarmStatus::Link, Severity::Invalid);
            Err(err)
        }
    }
}

/// Prepare a delayed completion when SDLY asks for one. The token is
/// fulfilled by the caller once its own bookkeeping is done.
fn start_delay(
    ctx: &Arc<IocContext>,
    rt: &Arc<RecordRuntime>,
    fields: &SimFields,
) -> Option<(Duration, CompletionToken)> {
    let rec = rt.rec.lock();
    let sdly = rec.get_f64(fields.sdly);
    if sdly < 0.0 {
        return None;
    }
    rt.sim.lock().pending = true;
    Some((Duration::from_secs_f64(sdly), ctx.completion_token(&rec)))
}
