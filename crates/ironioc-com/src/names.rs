//! Namespaced name directory.
//!
//! A process-wide directory mapping (namespace, name) pairs to opaque
//! handles: record names, registered device supports, registrar functions.
//! The lock is coarse and short-held; lookups take it too, which keeps the
//! structure simple and is cheap at the access rates involved.

use hashbrown::HashMap;
use ironioc_error::{IocError, Result};
use parking_lot::Mutex;

/// Directory partition. Different namespaces never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespaceId(pub u16);

impl NamespaceId {
    pub const RECORDS: NamespaceId = NamespaceId(1);
    pub const DEVICE_SUPPORT: NamespaceId = NamespaceId(2);
    pub const DRIVER_SUPPORT: NamespaceId = NamespaceId(3);
    pub const REGISTRAR: NamespaceId = NamespaceId(4);
}

/// Chained-hash name directory with cloneable values.
#[derive(Debug, Default)]
pub struct NameDirectory<V> {
    map: Mutex<HashMap<(NamespaceId, String), V>>,
}

impl<V: Clone> NameDirectory<V> {
    pub fn new() -> NameDirectory<V> {
        NameDirectory {
            map: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a name. Duplicates fail and leave the existing entry intact.
    pub fn insert(&self, ns: NamespaceId, name: &str, value: V) -> Result<()> {
        let mut map = self.map.lock();
        if map.contains_key(&(ns, name.to_owned())) {
            return Err(IocError::DuplicateRecordName(name.to_owned()));
        }
        map.insert((ns, name.to_owned()), value);
        Ok(())
    }

    pub fn find(&self, ns: NamespaceId, name: &str) -> Option<V> {
        self.map.lock().get(&(ns, name.to_owned())).cloned()
    }

    pub fn remove(&self, ns: NamespaceId, name: &str) -> Option<V> {
        self.map.lock().remove(&(ns, name.to_owned()))
    }

    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }

    /// Snapshot of all names in a namespace, unordered.
    pub fn names_in(&self, ns: NamespaceId) -> Vec<String> {
        self.map
            .lock()
            .keys()
            .filter(|(n, _)| *n == ns)
            .map(|(_, name)| name.clone())
            .collect()
    }
}
