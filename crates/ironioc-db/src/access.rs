//! External field access: the get/put surface clients go through.
//!
//! Addresses are `record.FIELD` with the field defaulting to VAL. Puts run
//! the special-modification hooks around the write and, for a
//! process-passive field of a passive record, trigger processing with the
//! external-put flag set; a put into a mid-cycle record latches a
//! reprocess instead.

use std::sync::Arc;

use ironioc_error::{IocError, Result};
use ironioc_static::{FieldHandle, RecordInstance};
use ironioc_types::{menu::scan, FieldValue, Special};

use crate::common::{self, ord};
use crate::context::{IocContext, RecordRuntime};

/// Resolve `record.FIELD` (field optional) to a runtime and ordinal.
pub fn resolve_addr(ctx: &IocContext, addr: &str) -> Result<(Arc<RecordRuntime>, usize)> {
    let addr = addr.trim();
    let (record, field) = match addr.split_once('.') {
        Some((r, f)) => (r, Some(f)),
        None => (addr, None),
    };
    let rt = ctx.runtime(record)?;
    let ordinal = {
        let guard = rt.rec.lock();
        let rtype = guard.rtype();
        match field {
            Some(f) => rtype
                .find_field(f)
                .ok_or_else(|| IocError::FieldNotFound {
                    record_type: rtype.name().to_owned(),
                    field: f.to_owned(),
                })?
                .ordinal(),
            None => rtype.ind_val(),
        }
    };
    Ok((rt, ordinal))
}

/// Snapshot a field value.
pub fn get_field(ctx: &IocContext, addr: &str) -> Result<FieldValue> {
    let (rt, ordinal) = resolve_addr(ctx, addr)?;
    let guard = rt.rec.lock();
    Ok(guard.field(ordinal).clone())
}

/// Format a field for display, menu choices as text.
pub fn get_field_string(ctx: &IocContext, addr: &str) -> Result<String> {
    let (rt, ordinal) = resolve_addr(ctx, addr)?;
    let guard = rt.rec.lock();
    ctx.db.field_to_string(&guard, FieldHandle::new(ordinal))
}

/// Store a typed value into a field, with put-side processing semantics.
pub fn put_field(ctx: &Arc<IocContext>, addr: &str, value: FieldValue) -> Result<()> {
    let (rt, ordinal) = resolve_addr(ctx, addr)?;
    put_with(ctx, &rt, ordinal, move |rec| {
        let desc = rec
            .rtype()
            .descriptor(ordinal)
            .ok_or_else(|| IocError::FieldNotFound {
                record_type: rec.rtype().name().to_owned(),
                field: format!("#{ordinal}"),
            })?;
        if desc.special_class() == Special::NoMod {
            return Err(IocError::InvalidValue {
                what: format!("read-only field {}.{}", rec.name(), desc.name()),
                text: value.format(),
            });
        }
        rec.set(ordinal, value)
    })
}

/// Parse text into a field, with put-side processing semantics.
pub fn put_field_string(ctx: &Arc<IocContext>, addr: &str, text: &str) -> Result<()> {
    let (rt, ordinal) = resolve_addr(ctx, addr)?;
    let text = text.to_owned();
    let ctx2 = Arc::clone(ctx);
    put_with(ctx, &rt, ordinal, move |rec| {
        ctx2.db
            .field_from_string(rec, FieldHandle::new(ordinal), &text)
    })
}

fn put_with(
    ctx: &Arc<IocContext>,
    rt: &Arc<RecordRuntime>,
    ordinal: usize,
    write: impl FnOnce(&mut RecordInstance) -> Result<()>,
) -> Result<()> {
    let special = {
        let guard = rt.rec.lock();
        guard
            .rtype()
            .descriptor(ordinal)
            .map_or(Special::None, ironioc_static::FieldDescriptor::special_class)
    };
    let hooked = matches!(special, Special::Mod | Special::Scan);

    let _set = rt.lockset.lock();
    if hooked {
        rt.rset.special(ctx, rt, ordinal, false)?;
    }
    let trigger = {
        let mut rec = rt.rec.lock();
        write(&mut rec)?;
        if ordinal == rec.rtype().ind_val() {
            common::set_udf(&mut rec, false);
        }
        let pp_field = rec
            .rtype()
            .descriptor(ordinal)
            .is_some_and(ironioc_static::FieldDescriptor::is_process_passive);
        let passive = rec.get_enum(ord::SCAN) == scan::PASSIVE;
        if pp_field && passive {
            if common::pact(&rec) {
                rec.set_bool(ord::RPRO, true);
                false
            } else {
                rec.set_bool(ord::PUTF, true);
                true
            }
        } else {
            false
        }
    };
    if hooked {
        rt.rset.special(ctx, rt, ordinal, true)?;
    }
    if trigger {
        crate::process::process_locked(ctx, rt);
    }
    Ok(())
}
