//! Run-once registrar set.
//!
//! Registration hooks (device supports, record types, menus) may be named
//! more than once across database files; each named hook must run exactly
//! once per context.

use hashbrown::HashSet;
use parking_lot::Mutex;

/// Tracks which named registration hooks have already run.
#[derive(Debug, Default)]
pub struct OnceRegistry {
    seen: Mutex<HashSet<String>>,
}

impl OnceRegistry {
    pub fn new() -> OnceRegistry {
        OnceRegistry {
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Run `f` if `name` has not run before. Returns whether `f` ran.
    ///
    /// The name is recorded before `f` runs, so a hook that registers
    /// itself recursively does not run twice. The set lock is not held
    /// while `f` runs.
    pub fn run_once(&self, name: &str, f: impl FnOnce()) -> bool {
        {
            let mut seen = self.seen.lock();
            if !seen.insert(name.to_owned()) {
                tracing::debug!(registrar = name, "registration hook already ran");
                return false;
            }
        }
        f();
        true
    }

    pub fn has_run(&self, name: &str) -> bool {
        self.seen.lock().contains(name)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }
}
