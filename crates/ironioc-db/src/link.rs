//! Link resolution and value transfer.
//!
//! Link fields hold text until init, when every spec resolves once into a
//! [`ResolvedLink`]: a constant parsed ahead of time, a direct database
//! target (record + field ordinal), or a named process variable that is
//! not (yet) in this database. Value transfer converts between the two
//! ends' kinds and can propagate the source's alarm severity into the
//! reader, per the link's maximize-severity flag.

use std::sync::Arc;

use ironioc_error::{IocError, Result};
use ironioc_static::{Database, RecordInstance};
use ironioc_types::{menu::scan, AlarmStatus, FieldKind, FieldValue, Severity};

use crate::common::{self, ord};
use crate::context::{IocContext, RecordRuntime};
use crate::recgbl::set_severity;

/// How a link propagates its source's alarm severity into the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaximizeSeverity {
    /// NMS: no inheritance.
    #[default]
    No,
    /// MS: inherit the severity with LINK status.
    Yes,
    /// MSI: inherit only an INVALID severity.
    Invalid,
    /// MSS: inherit severity and status both.
    Status,
}

/// Per-link behavior flags parsed from the link field text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkFlags {
    /// PP: a fetch processes a passive target first.
    pub process_passive: bool,
    pub maximize: MaximizeSeverity,
}

/// A link spec after resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedLink {
    /// Empty spec; reads and writes are no-ops the caller decides on.
    None,
    /// Numeric constant, parsed once.
    Constant(FieldValue),
    /// Direct intra-database target.
    Db {
        record: String,
        ordinal: usize,
        flags: LinkFlags,
    },
    /// Named variable not in this database; retryable at access time.
    Pv { name: String },
}

impl ResolvedLink {
    pub fn is_none(&self) -> bool {
        matches!(self, ResolvedLink::None)
    }

    /// Resolve a spec against the database. Unknown record names become
    /// `Pv` links rather than errors; a known record with an unknown
    /// field is a configuration error.
    pub fn resolve(db: &Database, spec: &str) -> Result<ResolvedLink> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Ok(ResolvedLink::None);
        }
        if let Ok(v) = spec.parse::<f64>() {
            return Ok(ResolvedLink::Constant(FieldValue::Double(v)));
        }
        let mut parts = spec.split_whitespace();
        let target = parts.next().unwrap_or_default();
        let mut flags = LinkFlags::default();
        let mut force_pv = false;
        for flag in parts {
            match flag {
                "PP" => flags.process_passive = true,
                "NPP" => flags.process_passive = false,
                "MS" => flags.maximize = MaximizeSeverity::Yes,
                "NMS" => flags.maximize = MaximizeSeverity::No,
                "MSI" => flags.maximize = MaximizeSeverity::Invalid,
                "MSS" => flags.maximize = MaximizeSeverity::Status,
                // Explicitly routed over the network layer.
                "CA" => force_pv = true,
                other => {
                    return Err(IocError::InvalidValue {
                        what: "link flag".to_owned(),
                        text: other.to_owned(),
                    })
                }
            }
        }
        let (rec_name, field_name) = match target.split_once('.') {
            Some((r, f)) => (r, Some(f)),
            None => (target, None),
        };
        if force_pv {
            return Ok(ResolvedLink::Pv {
                name: target.to_owned(),
            });
        }
        let Some(rec) = db.find_record(rec_name) else {
            return Ok(ResolvedLink::Pv {
                name: target.to_owned(),
            });
        };
        let guard = rec.lock();
        let rtype = guard.rtype();
        let ordinal = match field_name {
            Some(f) => rtype
                .find_field(f)
                .ok_or_else(|| IocError::FieldNotFound {
                    record_type: rtype.name().to_owned(),
                    field: f.to_owned(),
                })?
                .ordinal(),
            None => rtype.ind_val(),
        };
        Ok(ResolvedLink::Db {
            record: rec_name.to_owned(),
            ordinal,
            flags,
        })
    }
}

/// Fold a source's alarm state into the reading record per the link flag.
pub fn inherit_severity(
    maximize: MaximizeSeverity,
    reader: &mut RecordInstance,
    stat: AlarmStatus,
    sevr: Severity,
) {
    match maximize {
        MaximizeSeverity::No => {}
        MaximizeSeverity::Yes => {
            set_severity(reader, AlarmStatus::Link, sevr);
        }
        MaximizeSeverity::Status => {
            set_severity(reader, stat, sevr);
        }
        MaximizeSeverity::Invalid => {
            if sevr == Severity::Invalid {
                set_severity(reader, AlarmStatus::Link, Severity::Invalid);
            }
        }
    }
}

/// Fetch through a link, converting to `kind`.
///
/// A PP flag processes a passive, idle target before the read. The caller
/// holds the lock set shared by the reader and any database target but no
/// instance guard; this function takes one record guard at a time, so a
/// chain that loops back through records earlier in the traversal still
/// makes progress.
pub fn get_link(
    ctx: &Arc<IocContext>,
    reader: &Arc<RecordRuntime>,
    link: &ResolvedLink,
    kind: FieldKind,
) -> Result<FieldValue> {
    match link {
        ResolvedLink::None => Err(IocError::LinkNotConnected("<empty>".to_owned())),
        ResolvedLink::Constant(v) => v.convert_to(kind),
        ResolvedLink::Pv { name } => Err(IocError::LinkNotConnected(name.clone())),
        ResolvedLink::Db {
            record,
            ordinal,
            flags,
        } => {
            if *record == reader.name {
                return reader.rec.lock().field(*ordinal).convert_to(kind);
            }
            let rt = ctx.runtime(record)?;
            if flags.process_passive {
                let passive_idle = {
                    let guard = rt.rec.lock();
                    guard.get_enum(ord::SCAN) == scan::PASSIVE && !common::pact(&guard)
                };
                if passive_idle {
                    crate::process::process_locked(ctx, &rt);
                }
            }
            let (value, stat, sevr) = {
                let guard = rt.rec.lock();
                (
                    guard.field(*ordinal).convert_to(kind)?,
                    common::stat(&guard),
                    common::sevr(&guard),
                )
            };
            if flags.maximize != MaximizeSeverity::No {
                inherit_severity(flags.maximize, &mut reader.rec.lock(), stat, sevr);
            }
            Ok(value)
        }
    }
}

/// Store through a link. Writing a process-passive target field of a
/// passive record processes it; if that target is mid-cycle, a reprocess
/// is latched instead. Same guard discipline as [`get_link`]: the caller
/// holds the lock set only, and the target's guard is released before the
/// triggered processing runs.
pub fn put_link(
    ctx: &Arc<IocContext>,
    writer: &Arc<RecordRuntime>,
    link: &ResolvedLink,
    value: FieldValue,
) -> Result<()> {
    match link {
        // Writes into constants and empty links vanish.
        ResolvedLink::None | ResolvedLink::Constant(_) => Ok(()),
        ResolvedLink::Pv { name } => Err(IocError::LinkNotConnected(name.clone())),
        ResolvedLink::Db {
            record,
            ordinal,
            flags: _,
        } => {
            if *record == writer.name {
                return writer.rec.lock().set(*ordinal, value);
            }
            let rt = ctx.runtime(record)?;
            let trigger = {
                let mut guard = rt.rec.lock();
                guard.set(*ordinal, value)?;
                if *ordinal == guard.rtype().ind_val() {
                    common::set_udf(&mut guard, false);
                }
                let pp_field = guard
                    .rtype()
                    .descriptor(*ordinal)
                    .is_some_and(|d| d.is_process_passive());
                let passive = guard.get_enum(ord::SCAN) == scan::PASSIVE;
                if pp_field && passive {
                    if common::pact(&guard) {
                        guard.set_bool(ord::RPRO, true);
                        false
                    } else {
                        true
                    }
                } else {
                    false
                }
            };
            if trigger {
                crate::process::process_locked(ctx, &rt);
            }
            Ok(())
        }
    }
}
