//! IOC assembly: support registration, link resolution, lock sets, and the
//! two-pass record initialization.

use std::sync::Arc;

use hashbrown::HashMap;
use ironioc_com::{CallbackQueue, OnceRegistry};
use ironioc_error::{IocError, Result};
use ironioc_static::{Database, RecordRef};
use ironioc_types::FieldType;
use parking_lot::Mutex;

use crate::common::{self, ord};
use crate::context::{IocContext, RecordRuntime};
use crate::devsup::DeviceSupport;
use crate::link::ResolvedLink;
use crate::process;
use crate::recgbl::{post_event, reset_alarms, set_severity_msg};
use crate::records::{ai, ao, bits, soft};
use crate::recsup::RecordSupport;
use crate::simm::SimState;
use ironioc_types::{AlarmStatus, Severity};

/// Collects supports and database content, then assembles a running
/// [`IocContext`].
pub struct IocBuilder {
    db: Database,
    rsets: HashMap<String, Arc<dyn RecordSupport>>,
    dsets: HashMap<String, Arc<dyn DeviceSupport>>,
    registrar: OnceRegistry,
}

impl IocBuilder {
    pub fn new() -> IocBuilder {
        IocBuilder {
            db: Database::new(),
            rsets: HashMap::new(),
            dsets: HashMap::new(),
            registrar: OnceRegistry::new(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn database_mut(&mut self) -> &mut Database {
        &mut self.db
    }

    /// Register a record support and its type layout. Repeat registrations
    /// under the same name are ignored.
    pub fn register_record_support(&mut self, rset: Arc<dyn RecordSupport>) -> Result<()> {
        let name = rset.type_name().to_owned();
        if !self.registrar.run_once(&format!("rset:{name}"), || {}) {
            return Ok(());
        }
        self.db.register_record_type(rset.record_type())?;
        self.rsets.insert(name, rset);
        Ok(())
    }

    /// Register a device support under its own name. Repeat registrations
    /// are ignored.
    pub fn register_device_support(&mut self, dset: Arc<dyn DeviceSupport>) {
        let name = dset.name().to_owned();
        if self.registrar.run_once(&format!("dset:{name}"), || {}) {
            self.dsets.insert(name, dset);
        }
    }

    /// The built-in record types and their soft-channel devices.
    pub fn register_standard(&mut self) -> Result<()> {
        self.register_record_support(Arc::new(ai::AiRecordSupport))?;
        self.register_record_support(Arc::new(ao::AoRecordSupport))?;
        self.register_record_support(Arc::new(bits::BitsInRecordSupport))?;
        self.register_device_support(Arc::new(soft::SoftAi));
        self.register_device_support(Arc::new(soft::SoftRawAi));
        self.register_device_support(Arc::new(soft::SoftAo));
        self.register_device_support(Arc::new(soft::SoftBitsIn));
        self.register_device_support(Arc::new(soft::AsyncSoftAi::new(
            std::time::Duration::from_millis(20),
        )));
        self.db.add_device("ai", "Soft Channel", "devAiSoft")?;
        self.db.add_device("ai", "Raw Soft Channel", "devAiSoftRaw")?;
        self.db
            .add_device("ai", "Async Soft Channel", "devAiSoftAsync")?;
        self.db.add_device("ao", "Soft Channel", "devAoSoft")?;
        self.db.add_device("bitsin", "Soft Channel", "devBitsInSoft")?;
        Ok(())
    }

    /// Resolve links, partition lock sets, run both init passes, then
    /// process every PINI record. Per-record failures leave that record
    /// non-functional; the rest of the IOC comes up.
    pub fn init(self) -> Result<Arc<IocContext>> {
        let IocBuilder {
            db,
            rsets,
            dsets,
            registrar,
        } = self;

        // Stage every record that has a support behind it.
        let mut staged: Vec<Staged> = Vec::new();
        for rtype_name in db.record_type_names() {
            let Some(rset) = rsets.get(rtype_name) else {
                let n = db.records_of_type(rtype_name).len();
                if n > 0 {
                    tracing::warn!(
                        rtype = %rtype_name,
                        records = n,
                        "record type has no support, records stay static"
                    );
                }
                continue;
            };
            for name in db.records_of_type(rtype_name) {
                let Some(rec) = db.find_record(name) else {
                    continue;
                };
                staged.push(stage_record(&db, name, rec, rset, &dsets));
            }
        }

        // Partition lock sets over the intra-database link graph.
        let names: Vec<String> = staged.iter().map(|s| s.name.clone()).collect();
        let mut edges = Vec::new();
        for s in &staged {
            for link in s.links.values() {
                if let ResolvedLink::Db { record, .. } = link {
                    edges.push((s.name.clone(), record.clone()));
                }
            }
        }
        let locksets = crate::lockset::compute(&names, &edges);

        let mut runtimes = HashMap::with_capacity(staged.len());
        let mut failures = Vec::new();
        for s in staged {
            let lockset = locksets
                .get(&s.name)
                .cloned()
                .unwrap_or_else(|| Arc::new(Mutex::new(())));
            if let Some(err) = s.error {
                failures.push((s.name.clone(), err));
            }
            let rt = Arc::new(RecordRuntime {
                name: s.name.clone(),
                rec: s.rec,
                rset: s.rset,
                dset: s.dset,
                links: s.links,
                lockset,
                sim: Mutex::new(SimState::default()),
            });
            runtimes.insert(s.name, rt);
        }

        let ctx = Arc::new(IocContext::new(
            db,
            runtimes,
            CallbackQueue::new(),
            registrar,
        ));

        // Staging failures surface as standing alarms, not a dead IOC.
        for (name, err) in failures {
            if let Ok(rt) = ctx.runtime(&name) {
                mark_nonfunctional(&ctx, &rt, &err);
            }
        }

        // Global device init, once per support.
        for rt in ctx.runtimes() {
            if let Some(dset) = &rt.dset {
                let key = format!("dset-global:{}", dset.name());
                let dset = Arc::clone(dset);
                let ctx2 = Arc::clone(&ctx);
                ctx.registrar.run_once(&key, || {
                    if let Err(err) = dset.init_global(&ctx2) {
                        tracing::error!(dset = dset.name(), error = %err, "global init failed");
                    }
                });
            }
        }

        // Two init passes over every runtime.
        for pass in 0..=1u8 {
            for rt in ctx.runtimes() {
                let result = (|| -> Result<()> {
                    let mut rec = rt.rec.lock();
                    rt.rset.init_record(&ctx, rt, &mut rec, pass)?;
                    if let Some(dset) = &rt.dset {
                        dset.init_record(&ctx, rt, &mut rec, pass)?;
                    }
                    Ok(())
                })();
                if let Err(err) = result {
                    mark_nonfunctional(&ctx, rt, &err);
                }
            }
        }

        // Process-at-init records run one synchronous cycle.
        let pini: Vec<String> = ctx
            .runtimes()
            .filter(|rt| rt.rec.lock().get_enum(ord::PINI) != 0)
            .map(|rt| rt.name.clone())
            .collect();
        for name in pini {
            if let Err(err) = process::process_record(&ctx, &name) {
                tracing::warn!(record = %name, error = %err, "init-time processing failed");
            }
        }

        tracing::info!(records = ctx.record_count(), "ioc initialized");
        Ok(ctx)
    }
}

impl Default for IocBuilder {
    fn default() -> Self {
        IocBuilder::new()
    }
}

struct Staged {
    name: String,
    rec: RecordRef,
    rset: Arc<dyn RecordSupport>,
    dset: Option<Arc<dyn DeviceSupport>>,
    links: HashMap<usize, ResolvedLink>,
    error: Option<IocError>,
}

/// Bind one record's device support and resolve its link fields. Errors
/// are captured, not propagated, so one bad record cannot stop init.
fn stage_record(
    db: &Database,
    name: &str,
    rec: RecordRef,
    rset: &Arc<dyn RecordSupport>,
    dsets: &HashMap<String, Arc<dyn DeviceSupport>>,
) -> Staged {
    let mut error = None;
    let mut links = HashMap::new();
    let mut dset = None;
    {
        let guard = rec.lock();
        let rtype = guard.rtype();

        let dtyp = guard.text(ord::DTYP).to_owned();
        match db.dset_name(rtype.name(), &dtyp) {
            Some(dset_name) => match dsets.get(dset_name) {
                Some(d) => {
                    if d.declared_functions() < rset.min_dset_functions() {
                        error = Some(IocError::DeviceSupportTooSmall {
                            name: dset_name.to_owned(),
                            declared: d.declared_functions(),
                            required: rset.min_dset_functions(),
                        });
                    } else {
                        dset = Some(Arc::clone(d));
                    }
                }
                None => {
                    error = Some(IocError::DeviceSupportNotFound(dset_name.to_owned()));
                }
            },
            None => {
                error = Some(IocError::MissingDeviceSupport(name.to_owned()));
            }
        }

        for (ordinal, desc) in rtype.fields().iter().enumerate() {
            if !matches!(desc.field_type(), FieldType::Link { .. }) {
                continue;
            }
            let spec = guard.text(ordinal).to_owned();
            match ResolvedLink::resolve(db, &spec) {
                Ok(link) => {
                    if !link.is_none() {
                        links.insert(ordinal, link);
                    }
                }
                Err(err) => {
                    if error.is_none() {
                        error = Some(err);
                    }
                }
            }
        }
    }
    Staged {
        name: name.to_owned(),
        rec,
        rset: Arc::clone(rset),
        dset,
        links,
        error,
    }
}

/// Leave a record permanently active with a standing INVALID alarm.
fn mark_nonfunctional(ctx: &Arc<IocContext>, rt: &Arc<RecordRuntime>, err: &IocError) {
    tracing::error!(record = %rt.name, error = %err, "record left non-functional");
    let mut rec = rt.rec.lock();
    common::set_pact(&mut rec, true);
    set_severity_msg(
        &mut rec,
        AlarmStatus::Udf,
        Severity::Invalid,
        &err.to_string(),
    );
    let mask = reset_alarms(&ctx.monitors, &mut rec);
    let ind_val = rec.rtype().ind_val();
    post_event(&ctx.monitors, &rec, ind_val, mask);
}
