//! Soft-channel device supports: I/O over database links, no hardware.
//!
//! These run with the record's lock set held but no instance guard, taking
//! `rt.rec` in short scopes so their link traffic can chain into other
//! records of the set.

use std::sync::Arc;
use std::time::Duration;

use hashbrown::HashMap;
use ironioc_error::Result;
use ironioc_static::RecordInstance;
use parking_lot::Mutex;

use crate::common;
use crate::context::{IocContext, RecordRuntime};
use crate::devsup::{DeviceSupport, IoOutcome};
use crate::link::{get_link, put_link, ResolvedLink};
use ironioc_types::FieldKind;

use super::{ai, ao, bits};

/// Soft analog input: INP feeds VAL directly, no conversion.
pub struct SoftAi;

impl DeviceSupport for SoftAi {
    fn name(&self) -> &str {
        "devAiSoft"
    }

    fn init_record(
        &self,
        _ctx: &Arc<IocContext>,
        rt: &Arc<RecordRuntime>,
        rec: &mut RecordInstance,
        pass: u8,
    ) -> Result<()> {
        if pass == 1 {
            if let ResolvedLink::Constant(v) = rt.link(ai::ord::INP) {
                rec.set(ai::ord::VAL, v.clone())?;
                common::set_udf(rec, false);
            }
        }
        Ok(())
    }

    fn do_io(&self, ctx: &Arc<IocContext>, rt: &Arc<RecordRuntime>) -> Result<IoOutcome> {
        let inp = rt.link(ai::ord::INP).clone();
        if inp.is_none() || matches!(inp, ResolvedLink::Constant(_)) {
            return Ok(IoOutcome::NoConvert);
        }
        let v = get_link(ctx, rt, &inp, FieldKind::Double)?;
        let mut rec = rt.rec.lock();
        rec.set(ai::ord::VAL, v)?;
        common::set_udf(&mut rec, false);
        Ok(IoOutcome::NoConvert)
    }
}

/// Raw soft analog input: INP feeds RVAL, the record converts.
pub struct SoftRawAi;

impl DeviceSupport for SoftRawAi {
    fn name(&self) -> &str {
        "devAiSoftRaw"
    }

    fn init_record(
        &self,
        _ctx: &Arc<IocContext>,
        rt: &Arc<RecordRuntime>,
        rec: &mut RecordInstance,
        pass: u8,
    ) -> Result<()> {
        if pass == 1 {
            if let ResolvedLink::Constant(v) = rt.link(ai::ord::INP) {
                rec.set(ai::ord::RVAL, v.clone())?;
            }
        }
        Ok(())
    }

    fn do_io(&self, ctx: &Arc<IocContext>, rt: &Arc<RecordRuntime>) -> Result<IoOutcome> {
        let inp = rt.link(ai::ord::INP).clone();
        if !inp.is_none() && !matches!(inp, ResolvedLink::Constant(_)) {
            let v = get_link(ctx, rt, &inp, FieldKind::Long)?;
            rt.rec.lock().set(ai::ord::RVAL, v)?;
        }
        Ok(IoOutcome::Convert)
    }
}

/// Asynchronous soft analog input.
///
/// Reads INP when processing starts, parks the value, and completes after
/// a fixed delay from a callback worker, exercising the same two-phase
/// cycle a slow hardware read would.
pub struct AsyncSoftAi {
    delay: Duration,
    parked: Mutex<HashMap<String, f64>>,
}

impl AsyncSoftAi {
    pub fn new(delay: Duration) -> AsyncSoftAi {
        AsyncSoftAi {
            delay,
            parked: Mutex::new(HashMap::new()),
        }
    }
}

impl DeviceSupport for AsyncSoftAi {
    fn name(&self) -> &str {
        "devAiSoftAsync"
    }

    fn do_io(&self, ctx: &Arc<IocContext>, rt: &Arc<RecordRuntime>) -> Result<IoOutcome> {
        {
            let mut rec = rt.rec.lock();
            if common::pact(&rec) {
                // Completion half: deliver the parked value.
                if let Some(v) = self.parked.lock().remove(rec.name()) {
                    rec.set_f64(ai::ord::VAL, v);
                    common::set_udf(&mut rec, false);
                }
                return Ok(IoOutcome::NoConvert);
            }
        }
        let inp = rt.link(ai::ord::INP).clone();
        let v = match &inp {
            ResolvedLink::Constant(c) => c.to_f64_lossy(),
            ResolvedLink::None => rt.rec.lock().get_f64(ai::ord::VAL),
            _ => get_link(ctx, rt, &inp, FieldKind::Double)?.to_f64_lossy(),
        };
        self.parked.lock().insert(rt.name.clone(), v);
        let token = ctx.completion_token(&rt.rec.lock());
        token.complete_after(self.delay);
        Ok(IoOutcome::Pending)
    }
}

/// Soft analog output: OVAL goes out through OUT.
pub struct SoftAo;

impl DeviceSupport for SoftAo {
    fn name(&self) -> &str {
        "devAoSoft"
    }

    fn do_io(&self, ctx: &Arc<IocContext>, rt: &Arc<RecordRuntime>) -> Result<IoOutcome> {
        let out = rt.link(ao::ord::OUT).clone();
        let oval = rt.rec.lock().get_f64(ao::ord::OVAL);
        put_link(ctx, rt, &out, ironioc_types::FieldValue::Double(oval))?;
        Ok(IoOutcome::NoConvert)
    }
}

/// Soft bit-field input: INP feeds the raw word.
pub struct SoftBitsIn;

impl DeviceSupport for SoftBitsIn {
    fn name(&self) -> &str {
        "devBitsInSoft"
    }

    fn do_io(&self, ctx: &Arc<IocContext>, rt: &Arc<RecordRuntime>) -> Result<IoOutcome> {
        let inp = rt.link(bits::ord::INP).clone();
        if !inp.is_none() && !matches!(inp, ResolvedLink::Constant(_)) {
            let v = get_link(ctx, rt, &inp, FieldKind::ULong)?;
            rt.rec.lock().set(bits::ord::RVAL, v)?;
        }
        Ok(IoOutcome::Convert)
    }
}
