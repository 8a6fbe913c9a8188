//! The IOC runtime context: everything processing needs, with no globals.

use std::sync::Arc;

use hashbrown::HashMap;
use ironioc_com::{CallbackQueue, OnceRegistry, Priority};
use ironioc_error::{IocError, Result};
use ironioc_static::{Database, RecordInstance, RecordRef};
use parking_lot::Mutex;

use crate::common::ord;
use crate::devsup::{CompletionToken, DeviceSupport};
use crate::link::ResolvedLink;
use crate::monitor::MonitorHub;
use crate::recsup::RecordSupport;
use crate::simm::SimState;

/// Per-record engine state built at init and immutable afterwards, apart
/// from the simulation bookkeeping behind its own lock.
pub struct RecordRuntime {
    pub name: String,
    pub rec: RecordRef,
    pub rset: Arc<dyn RecordSupport>,
    pub dset: Option<Arc<dyn DeviceSupport>>,
    /// Resolved links keyed by link-field ordinal.
    pub links: HashMap<usize, ResolvedLink>,
    /// Shared by every record reachable over database links; taken before
    /// the record's own mutex on every processing entry.
    pub lockset: Arc<Mutex<()>>,
    pub sim: Mutex<SimState>,
}

impl RecordRuntime {
    pub fn link(&self, ordinal: usize) -> &ResolvedLink {
        self.links.get(&ordinal).unwrap_or(&ResolvedLink::None)
    }
}

/// The assembled IOC: database, per-record runtimes, scheduler, monitors.
///
/// Built once by the initializer; shared behind an `Arc` by worker threads
/// and completion tokens.
pub struct IocContext {
    pub db: Database,
    runtimes: HashMap<String, Arc<RecordRuntime>>,
    pub queue: CallbackQueue,
    pub monitors: MonitorHub,
    pub registrar: OnceRegistry,
}

impl IocContext {
    pub(crate) fn new(
        db: Database,
        runtimes: HashMap<String, Arc<RecordRuntime>>,
        queue: CallbackQueue,
        registrar: OnceRegistry,
    ) -> IocContext {
        IocContext {
            db,
            runtimes,
            queue,
            monitors: MonitorHub::new(),
            registrar,
        }
    }

    pub fn runtime(&self, record: &str) -> Result<Arc<RecordRuntime>> {
        self.runtimes
            .get(record)
            .cloned()
            .ok_or_else(|| IocError::RecordNotFound(record.to_owned()))
    }

    pub fn runtimes(&self) -> impl Iterator<Item = &Arc<RecordRuntime>> {
        self.runtimes.values()
    }

    pub fn record_count(&self) -> usize {
        self.runtimes.len()
    }

    /// Token an asynchronous device holds across a pending operation.
    ///
    /// The record's name and queue priority are captured here, so fulfilling
    /// the token later never touches the record again.
    pub fn completion_token(self: &Arc<Self>, rec: &RecordInstance) -> CompletionToken {
        CompletionToken::new(
            Arc::clone(self),
            rec.name().to_owned(),
            queue_priority(rec.get_enum(ord::PRIO)),
        )
    }
}

/// Map the PRIO menu choice to a callback queue priority.
pub fn queue_priority(prio: u16) -> Priority {
    match prio {
        2 => Priority::High,
        1 => Priority::Medium,
        _ => Priority::Low,
    }
}
