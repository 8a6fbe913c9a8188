//! Per-cycle alarm arbitration and the end-of-cycle alarm reset.
//!
//! During a processing cycle every detected condition calls
//! [`set_severity`]; the pending pair (NSTA, NSEV) keeps the most severe
//! one. At the end of the cycle [`reset_alarms`] publishes the pending pair
//! into (STAT, SEVR), returning the event-mask bit the caller must fold
//! into its value monitors.

use ironioc_static::RecordInstance;
use ironioc_types::{AlarmStatus, EventMask, Severity};

use crate::common::ord;
use crate::monitor::{MonitorEvent, MonitorHub};

/// Propose an alarm for the current cycle. Raises only if `sevr` is
/// strictly more severe than what the cycle already holds; returns whether
/// it raised, which is what limit checks use to latch their re-arm value.
pub fn set_severity(rec: &mut RecordInstance, stat: AlarmStatus, sevr: Severity) -> bool {
    if sevr > crate::common::nsev(rec) {
        rec.set_enum(ord::NSTA, stat.index());
        rec.set_enum(ord::NSEV, sevr.index());
        true
    } else {
        false
    }
}

/// [`set_severity`] plus an alarm message carried with the raise.
pub fn set_severity_msg(
    rec: &mut RecordInstance,
    stat: AlarmStatus,
    sevr: Severity,
    msg: &str,
) -> bool {
    let raised = set_severity(rec, stat, sevr);
    if raised {
        rec.set_text(ord::NAMSG, msg);
    }
    raised
}

/// Snapshot the current value of a field into an event and post it.
pub fn post_event(hub: &MonitorHub, rec: &RecordInstance, ordinal: usize, mask: EventMask) {
    if mask.is_empty() {
        return;
    }
    let field = rec
        .rtype()
        .descriptor(ordinal)
        .map_or_else(String::new, |d| d.name().to_owned());
    hub.post(MonitorEvent {
        record: rec.name().to_owned(),
        field,
        mask,
        value: rec.field(ordinal).clone(),
        stat: crate::common::stat(rec),
        sevr: crate::common::sevr(rec),
        amsg: rec.text(ord::AMSG).to_owned(),
    });
}

/// Publish the cycle's pending alarm state and clear it for the next one.
///
/// Posts SEVR, STAT, ACKS, and AMSG changes as they happen and returns the
/// mask the caller folds into its value-field monitors: `ALARM` when the
/// (stat, sevr) pair changed, empty otherwise.
pub fn reset_alarms(hub: &MonitorHub, rec: &mut RecordInstance) -> EventMask {
    let prev_stat = crate::common::stat(rec);
    let prev_sevr = crate::common::sevr(rec);
    let new_stat = crate::common::nsta(rec);
    let new_sevr = crate::common::nsev(rec);

    rec.set_enum(ord::STAT, new_stat.index());
    rec.set_enum(ord::SEVR, new_sevr.index());
    rec.set_enum(ord::NSTA, AlarmStatus::NoAlarm.index());
    rec.set_enum(ord::NSEV, Severity::NoAlarm.index());

    let mut stat_mask = EventMask::empty();
    if prev_sevr != new_sevr {
        stat_mask = EventMask::ALARM;
        post_event(hub, rec, ord::SEVR, EventMask::VALUE);
    }
    if prev_stat != new_stat {
        stat_mask |= EventMask::VALUE;
    }
    let mut val_mask = EventMask::empty();
    if !stat_mask.is_empty() {
        post_event(hub, rec, ord::STAT, stat_mask);
        val_mask = EventMask::ALARM;

        // Track the highest unacknowledged severity. With transient
        // acknowledgment (ACKT) the mark only ever rises; otherwise it
        // follows the current severity.
        let ackt = rec.get_enum(ord::ACKT) != 0;
        let acks = Severity::from_index(rec.get_enum(ord::ACKS));
        if !ackt || new_sevr >= acks {
            rec.set_enum(ord::ACKS, new_sevr.index());
            post_event(hub, rec, ord::ACKS, EventMask::VALUE);
        }
    }
    if rec.text(ord::AMSG) != rec.text(ord::NAMSG) {
        let namsg = rec.text(ord::NAMSG).to_owned();
        rec.set_text(ord::AMSG, namsg);
        post_event(hub, rec, ord::AMSG, EventMask::VALUE);
    }
    rec.set_text(ord::NAMSG, "");
    val_mask
}

/// Whether a change escapes a deadband.
///
/// Non-finite values post on the transition, then go quiet: a pair of
/// equal infinities or two NaNs counts as no change, so a value parked
/// out of range does not repost every cycle.
pub fn check_deadband(new: f64, old: f64, deadband: f64) -> bool {
    let delta = if new.is_finite() && old.is_finite() {
        (old - new).abs()
    } else if !new.is_nan() && !old.is_nan() {
        // At least one infinity; unequal means an infinite jump.
        if old == new {
            0.0
        } else {
            f64::INFINITY
        }
    } else if !new.is_nan() || !old.is_nan() {
        f64::NAN
    } else {
        0.0
    };
    delta > deadband || !(delta <= f64::MAX)
}
