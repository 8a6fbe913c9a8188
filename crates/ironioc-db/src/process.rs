//! The processing dispatcher: reentry guard, disable link, trace, and the
//! hand-off to record support.

use std::sync::Arc;

use ironioc_error::{IocError, Result};
use ironioc_static::RecordInstance;
use ironioc_types::{menu::scan, AlarmStatus, FieldKind, Severity};

use crate::common::{self, ord, MAX_LOCK};
use crate::context::{IocContext, RecordRuntime};
use crate::link::{get_link, ResolvedLink};
use crate::recgbl::{post_event, reset_alarms, set_severity, set_severity_msg};

/// Process one record by name: take its lock set, run the guards, and
/// dispatch to its record support.
pub fn process_record(ctx: &Arc<IocContext>, name: &str) -> Result<()> {
    let rt = ctx.runtime(name)?;
    let _set = rt.lockset.lock();
    process_inner(ctx, &rt)
}

/// Processing entry for callers that already hold the record's lock set
/// (link traversal). Failures are logged, not propagated.
pub(crate) fn process_locked(ctx: &Arc<IocContext>, rt: &Arc<RecordRuntime>) {
    if let Err(err) = process_inner(ctx, rt) {
        tracing::warn!(record = %rt.name, error = %err, "link-triggered processing failed");
    }
}

fn process_inner(ctx: &Arc<IocContext>, rt: &Arc<RecordRuntime>) -> Result<()> {
    {
        let mut rec = rt.rec.lock();
        if rec.get_bool(ord::TPRO) {
            tracing::info!(
                record = %rt.name,
                rtype = rec.rtype().name(),
                "process"
            );
        }

        // Reentry guard: an active record is counted, not reprocessed.
        // Stuck this way MAX_LOCK times in a row, it gets a SCAN alarm,
        // raised once.
        if common::pact(&rec) {
            let lcnt = rec.get_f64(ord::LCNT) as u8;
            if lcnt < MAX_LOCK {
                rec.set_f64(ord::LCNT, f64::from(lcnt) + 1.0);
                if lcnt + 1 == MAX_LOCK {
                    tracing::error!(record = %rt.name, "record stuck active, scan alarm");
                    set_severity(&mut rec, AlarmStatus::Scan, Severity::Invalid);
                    let mask = reset_alarms(&ctx.monitors, &mut rec);
                    let ind_val = rec.rtype().ind_val();
                    post_event(&ctx.monitors, &rec, ind_val, mask);
                }
            }
            return Ok(());
        }
        rec.set_f64(ord::LCNT, 0.0);
    }

    // Disable link: fetch DISA, compare against DISV. The guard is not
    // held across the fetch, which may chain into another record.
    let sdis = rt.link(ord::SDIS).clone();
    if !sdis.is_none() {
        match get_link(ctx, rt, &sdis, FieldKind::Short) {
            Ok(v) => rt.rec.lock().set(ord::DISA, v)?,
            Err(err) => {
                tracing::warn!(record = %rt.name, error = %err, "disable link fetch failed");
            }
        }
    }

    {
        let mut rec = rt.rec.lock();
        if rec.get_f64(ord::DISA) == rec.get_f64(ord::DISV) {
            if common::stat(&rec) != AlarmStatus::Disable {
                rec.set_bool(ord::PUTF, false);
                let diss = Severity::from_index(rec.get_enum(ord::DISS));
                set_severity(&mut rec, AlarmStatus::Disable, diss);
                let mask = reset_alarms(&ctx.monitors, &mut rec);
                let ind_val = rec.rtype().ind_val();
                post_event(&ctx.monitors, &rec, ind_val, mask);
            }
            return Ok(());
        }

        // A record type that does I/O cannot run without its device
        // support; init marks these, processing reports them.
        if rt.dset.is_none() {
            common::set_pact(&mut rec, true);
            set_severity_msg(
                &mut rec,
                AlarmStatus::Udf,
                Severity::Invalid,
                "no device support",
            );
            let mask = reset_alarms(&ctx.monitors, &mut rec);
            let ind_val = rec.rtype().ind_val();
            post_event(&ctx.monitors, &rec, ind_val, mask);
            return Err(IocError::MissingDeviceSupport(rt.name.clone()));
        }
    }
    rt.rset.process(ctx, rt)
}

/// Asynchronous completion entry: re-runs the record support's process
/// for a record that is still active, from a callback worker.
pub(crate) fn async_completion(ctx: &Arc<IocContext>, name: &str) {
    let Ok(rt) = ctx.runtime(name) else {
        tracing::warn!(record = name, "completion for unknown record dropped");
        return;
    };
    let _set = rt.lockset.lock();
    if !common::pact(&rt.rec.lock()) {
        tracing::warn!(record = name, "completion for idle record dropped");
        return;
    }
    if let Err(err) = rt.rset.process(ctx, &rt) {
        tracing::warn!(record = name, error = %err, "asynchronous completion failed");
    }
}

/// End-of-cycle link fan-out: schedule the forward-link target, clear the
/// external-put flag, and honor a latched reprocess request. Called by
/// record supports with the record still locked and active.
pub fn forward_link(ctx: &Arc<IocContext>, rt: &Arc<RecordRuntime>, rec: &mut RecordInstance) {
    let priority = crate::context::queue_priority(rec.get_enum(ord::PRIO));
    if let ResolvedLink::Db { record, .. } = rt.link(ord::FLNK) {
        let passive = ctx
            .runtime(record)
            .ok()
            .is_some_and(|t| t.rec.lock().get_enum(ord::SCAN) == scan::PASSIVE);
        if passive {
            let target = record.clone();
            let ctx2 = Arc::clone(ctx);
            ctx.queue.schedule(priority, move || {
                if let Err(err) = process_record(&ctx2, &target) {
                    tracing::warn!(record = %target, error = %err, "forward link target failed");
                }
            });
        }
    }
    rec.set_bool(ord::PUTF, false);
    if rec.get_bool(ord::RPRO) {
        rec.set_bool(ord::RPRO, false);
        let target = rec.name().to_owned();
        let ctx2 = Arc::clone(ctx);
        ctx.queue.schedule(priority, move || {
            if let Err(err) = process_record(&ctx2, &target) {
                tracing::warn!(record = %target, error = %err, "reprocess failed");
            }
        });
    }
}
