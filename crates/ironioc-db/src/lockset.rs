//! Lock set computation.
//!
//! Records joined by database links must share one processing lock, so a
//! chain of link-triggered processing never deadlocks against itself.
//! Union-find over the link graph partitions the records; each partition
//! gets one mutex, taken before any record mutex on a processing entry.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> UnionFind {
        UnionFind {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            // Path halving.
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// Partition `records` by the `edges` between them and hand each partition
/// one shared lock. Edge endpoints not present in `records` are ignored.
pub fn compute(
    records: &[String],
    edges: &[(String, String)],
) -> HashMap<String, Arc<Mutex<()>>> {
    let index: HashMap<&str, usize> = records
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();
    let mut uf = UnionFind::new(records.len());
    for (a, b) in edges {
        if let (Some(&ia), Some(&ib)) = (index.get(a.as_str()), index.get(b.as_str())) {
            uf.union(ia, ib);
        }
    }
    let mut roots: HashMap<usize, Arc<Mutex<()>>> = HashMap::new();
    let mut out = HashMap::with_capacity(records.len());
    for (i, name) in records.iter().enumerate() {
        let root = uf.find(i);
        let lock = roots
            .entry(root)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        out.insert(name.clone(), lock);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn linked_records_share_a_lock() {
        let records = names(&["a", "b", "c", "d"]);
        let edges = vec![
            ("a".to_owned(), "b".to_owned()),
            ("b".to_owned(), "c".to_owned()),
        ];
        let sets = compute(&records, &edges);
        assert!(Arc::ptr_eq(&sets["a"], &sets["b"]));
        assert!(Arc::ptr_eq(&sets["a"], &sets["c"]));
        assert!(!Arc::ptr_eq(&sets["a"], &sets["d"]));
    }

    #[test]
    fn every_record_gets_a_lock() {
        let records = names(&["x", "y"]);
        let sets = compute(&records, &[]);
        assert_eq!(sets.len(), 2);
        assert!(!Arc::ptr_eq(&sets["x"], &sets["y"]));
    }

    #[test]
    fn edges_to_unknown_records_are_ignored() {
        let records = names(&["a"]);
        let edges = vec![("a".to_owned(), "remote:pv".to_owned())];
        let sets = compute(&records, &edges);
        assert_eq!(sets.len(), 1);
    }
}
