//! Device support: the contract between a record type and its I/O layer.

use std::sync::Arc;
use std::time::Duration;

use ironioc_error::Result;
use ironioc_static::RecordInstance;

use crate::context::{IocContext, RecordRuntime};

/// Result of one I/O call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOutcome {
    /// A raw value was stored; the record support converts it to VAL.
    Convert,
    /// VAL was written directly; skip conversion.
    NoConvert,
    /// The operation was started. The record stays active until the
    /// device fulfills the completion token it took.
    Pending,
}

/// Asynchronous completion handle.
///
/// A device that returns [`IoOutcome::Pending`] must have taken a token
/// via [`IocContext::completion_token`] and must eventually fulfill it;
/// the record stays active (and unprocessable) until then. Dropping a
/// token unfulfilled is logged, and the stuck record is eventually flagged
/// by the scan alarm on repeated processing attempts.
pub struct CompletionToken {
    ctx: Arc<IocContext>,
    record: String,
    priority: ironioc_com::Priority,
    fulfilled: bool,
}

impl CompletionToken {
    pub(crate) fn new(
        ctx: Arc<IocContext>,
        record: String,
        priority: ironioc_com::Priority,
    ) -> CompletionToken {
        CompletionToken {
            ctx,
            record,
            priority,
            fulfilled: false,
        }
    }

    pub fn record(&self) -> &str {
        &self.record
    }

    /// Run the record's completion phase from a callback worker.
    ///
    /// Only enqueues; safe to call from inside a device's I/O with the
    /// record still locked.
    pub fn complete(mut self) {
        self.fulfilled = true;
        let ctx = Arc::clone(&self.ctx);
        let record = self.record.clone();
        self.ctx.queue.schedule(self.priority, move || {
            crate::process::async_completion(&ctx, &record);
        });
    }

    /// Like [`complete`](Self::complete), after a delay.
    pub fn complete_after(mut self, delay: Duration) {
        self.fulfilled = true;
        let ctx = Arc::clone(&self.ctx);
        let record = self.record.clone();
        self.ctx
            .queue
            .schedule_after(self.priority, delay, move || {
                crate::process::async_completion(&ctx, &record);
            });
    }
}

impl Drop for CompletionToken {
    fn drop(&mut self) {
        if !self.fulfilled {
            tracing::warn!(
                record = %self.record,
                "completion token dropped unfulfilled; record stays active"
            );
        }
    }
}

/// One device support, registered under a name and bound to records
/// through `device(...)` entries and their DTYP field.
pub trait DeviceSupport: Send + Sync {
    /// Registered name, matched against `device(...)` entries.
    fn name(&self) -> &str;

    /// Number of functions the support declares. Checked at init against
    /// the record support's declared minimum.
    fn declared_functions(&self) -> usize {
        6
    }

    /// Human-readable state dump for diagnostics.
    fn report(&self, _level: u8) -> String {
        String::new()
    }

    /// Called once before any record of this support initializes.
    fn init_global(&self, _ctx: &Arc<IocContext>) -> Result<()> {
        Ok(())
    }

    /// Two-pass record binding: pass 0 runs before links resolve, pass 1
    /// after. A pass-1 error leaves the record non-functional; the IOC
    /// keeps initializing.
    fn init_record(
        &self,
        _ctx: &Arc<IocContext>,
        _rt: &Arc<RecordRuntime>,
        _rec: &mut RecordInstance,
        _pass: u8,
    ) -> Result<()> {
        Ok(())
    }

    /// Whether records bound to this support can scan on I/O interrupt.
    fn io_interrupt_capable(&self) -> bool {
        false
    }

    /// Perform the record's I/O. Called with the record's lock set held
    /// but no instance guard, so link traversal can chain into other
    /// records in the set; take `rt.rec` in short scopes for field access.
    /// A `Pending` return means a token was taken and the record stays
    /// active.
    fn do_io(&self, ctx: &Arc<IocContext>, rt: &Arc<RecordRuntime>) -> Result<IoOutcome>;

    /// Hook for analog supports: called when the record's linearization
    /// fields change so the support can recompute its slope.
    fn special_linconv(&self, _rec: &mut RecordInstance, _after: bool) -> Result<()> {
        Ok(())
    }
}
