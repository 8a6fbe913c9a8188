//! Arena-backed ordered list with stable handles.
//!
//! Replaces the intrusive doubly linked list of the original design: the
//! arena owns every node, handles are generation-checked indices, and the
//! doubly linked order lives in the slots themselves, so removal by handle
//! stays O(1) and iteration follows insertion order. Sorting is a stable
//! merge sort over the link chain; values never move in memory.

/// Generation-checked index into an [`OrderedArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    generation: u32,
    prev: Option<u32>,
    next: Option<u32>,
}

/// Owned arena whose live slots form a doubly linked insertion order.
#[derive(Debug)]
pub struct OrderedArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
}

impl<T> Default for OrderedArena<T> {
    fn default() -> Self {
        OrderedArena::new()
    }
}

impl<T> OrderedArena<T> {
    pub fn new() -> OrderedArena<T> {
        OrderedArena {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn alloc_slot(&mut self, value: T) -> u32 {
        if let Some(ix) = self.free.pop() {
            let slot = &mut self.slots[ix as usize];
            slot.value = Some(value);
            slot.prev = None;
            slot.next = None;
            ix
        } else {
            self.slots.push(Slot {
                value: Some(value),
                generation: 0,
                prev: None,
                next: None,
            });
            (self.slots.len() - 1) as u32
        }
    }

    /// Append at the tail of the order. O(1).
    pub fn push_back(&mut self, value: T) -> NodeHandle {
        let ix = self.alloc_slot(value);
        self.slots[ix as usize].prev = self.tail;
        match self.tail {
            Some(tail) => self.slots[tail as usize].next = Some(ix),
            None => self.head = Some(ix),
        }
        self.tail = Some(ix);
        self.len += 1;
        NodeHandle {
            index: ix,
            generation: self.slots[ix as usize].generation,
        }
    }

    fn live_index(&self, handle: NodeHandle) -> Option<usize> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation == handle.generation && slot.value.is_some() {
            Some(handle.index as usize)
        } else {
            None
        }
    }

    pub fn get(&self, handle: NodeHandle) -> Option<&T> {
        self.live_index(handle)
            .and_then(|ix| self.slots[ix].value.as_ref())
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut T> {
        self.live_index(handle)
            .and_then(|ix| self.slots[ix].value.as_mut())
    }

    /// Unlink and return a node. O(1). Stale handles return `None`.
    pub fn remove(&mut self, handle: NodeHandle) -> Option<T> {
        let ix = self.live_index(handle)? as u32;
        let (prev, next) = {
            let slot = &self.slots[ix as usize];
            (slot.prev, slot.next)
        };
        match prev {
            Some(p) => self.slots[p as usize].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n as usize].prev = prev,
            None => self.tail = prev,
        }
        let slot = &mut self.slots[ix as usize];
        slot.generation = slot.generation.wrapping_add(1);
        slot.prev = None;
        slot.next = None;
        self.len -= 1;
        self.free.push(ix);
        slot.value.take()
    }

    /// First node in order.
    pub fn first(&self) -> Option<NodeHandle> {
        self.head.map(|ix| NodeHandle {
            index: ix,
            generation: self.slots[ix as usize].generation,
        })
    }

    /// Successor of a node in order.
    pub fn next(&self, handle: NodeHandle) -> Option<NodeHandle> {
        let ix = self.live_index(handle)?;
        self.slots[ix].next.map(|n| NodeHandle {
            index: n,
            generation: self.slots[n as usize].generation,
        })
    }

    /// Iterate values in order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            arena: self,
            cursor: self.head,
        }
    }

    /// Iterate (handle, value) pairs in order.
    pub fn iter_handles(&self) -> impl Iterator<Item = (NodeHandle, &T)> {
        HandleIter {
            arena: self,
            cursor: self.head,
        }
    }

    /// Linear search. O(n).
    pub fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<NodeHandle> {
        self.iter_handles()
            .find(|(_, v)| pred(v))
            .map(|(h, _)| h)
    }

    /// Stable merge sort of the order chain by a comparison on values.
    /// Values stay put; only the prev/next links are rewritten.
    pub fn sort_by(&mut self, mut cmp: impl FnMut(&T, &T) -> std::cmp::Ordering) {
        // Collect the chain, merge-sort the index list, then relink.
        let mut order: Vec<u32> = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while let Some(ix) = cursor {
            order.push(ix);
            cursor = self.slots[ix as usize].next;
        }
        if order.len() < 2 {
            return;
        }
        let slots = &self.slots;
        merge_sort(&mut order, &mut |a, b| {
            let (Some(va), Some(vb)) = (
                slots[a as usize].value.as_ref(),
                slots[b as usize].value.as_ref(),
            ) else {
                return std::cmp::Ordering::Equal;
            };
            cmp(va, vb)
        });
        self.head = Some(order[0]);
        self.tail = Some(order[order.len() - 1]);
        for (pos, &ix) in order.iter().enumerate() {
            let slot = &mut self.slots[ix as usize];
            slot.prev = if pos == 0 { None } else { Some(order[pos - 1]) };
            slot.next = order.get(pos + 1).copied();
        }
    }
}

/// Bottom-up stable merge sort over an index vector.
fn merge_sort(items: &mut Vec<u32>, cmp: &mut impl FnMut(u32, u32) -> std::cmp::Ordering) {
    let len = items.len();
    let mut buf = vec![0_u32; len];
    let mut width = 1;
    while width < len {
        let mut start = 0;
        while start < len {
            let mid = (start + width).min(len);
            let end = (start + 2 * width).min(len);
            let (mut i, mut j, mut k) = (start, mid, start);
            while i < mid && j < end {
                if cmp(items[i], items[j]) != std::cmp::Ordering::Greater {
                    buf[k] = items[i];
                    i += 1;
                } else {
                    buf[k] = items[j];
                    j += 1;
                }
                k += 1;
            }
            buf[k..k + (mid - i)].copy_from_slice(&items[i..mid]);
            let k2 = k + (mid - i);
            buf[k2..k2 + (end - j)].copy_from_slice(&items[j..end]);
            items[start..end].copy_from_slice(&buf[start..end]);
            start = end;
        }
        width *= 2;
    }
}

pub struct Iter<'a, T> {
    arena: &'a OrderedArena<T>,
    cursor: Option<u32>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let ix = self.cursor?;
        let slot = &self.arena.slots[ix as usize];
        self.cursor = slot.next;
        slot.value.as_ref()
    }
}

struct HandleIter<'a, T> {
    arena: &'a OrderedArena<T>,
    cursor: Option<u32>,
}

impl<'a, T> Iterator for HandleIter<'a, T> {
    type Item = (NodeHandle, &'a T);

    fn next(&mut self) -> Option<(NodeHandle, &'a T)> {
        let ix = self.cursor?;
        let slot = &self.arena.slots[ix as usize];
        self.cursor = slot.next;
        slot.value.as_ref().map(|v| {
            (
                NodeHandle {
                    index: ix,
                    generation: slot.generation,
                },
                v,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn push_iterates_in_insertion_order() {
        let mut arena = OrderedArena::new();
        for v in ["a", "b", "c"] {
            arena.push_back(v);
        }
        let got: Vec<_> = arena.iter().copied().collect();
        assert_eq!(got, vec!["a", "b", "c"]);
        assert_eq!(arena.len(), 3);
    }

    #[test]
    fn remove_is_o1_and_relinks() {
        let mut arena = OrderedArena::new();
        let _a = arena.push_back(1);
        let b = arena.push_back(2);
        let _c = arena.push_back(3);
        assert_eq!(arena.remove(b), Some(2));
        let got: Vec<_> = arena.iter().copied().collect();
        assert_eq!(got, vec![1, 3]);
        // Stale handle: removal already happened.
        assert_eq!(arena.remove(b), None);
        assert_eq!(arena.get(b), None);
    }

    #[test]
    fn slot_reuse_bumps_generation() {
        let mut arena = OrderedArena::new();
        let a = arena.push_back(10);
        arena.remove(a);
        let b = arena.push_back(20);
        // b reuses a's slot but the old handle stays dead.
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.get(b), Some(&20));
    }

    #[test]
    fn cursor_walk_matches_iter() {
        let mut arena = OrderedArena::new();
        for v in 0..5 {
            arena.push_back(v);
        }
        let mut walked = Vec::new();
        let mut cur = arena.first();
        while let Some(h) = cur {
            walked.push(*arena.get(h).unwrap());
            cur = arena.next(h);
        }
        assert_eq!(walked, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn sort_is_stable() {
        let mut arena = OrderedArena::new();
        // (key, original position): equal keys must keep relative order.
        for pair in [(2, 0), (1, 1), (2, 2), (1, 3), (0, 4)] {
            arena.push_back(pair);
        }
        arena.sort_by(|a, b| a.0.cmp(&b.0));
        let got: Vec<_> = arena.iter().copied().collect();
        assert_eq!(got, vec![(0, 4), (1, 1), (1, 3), (2, 0), (2, 2)]);
    }

    proptest! {
        #[test]
        fn prop_sort_matches_std_stable_sort(values in prop::collection::vec(0_i32..50, 0..64)) {
            let mut arena = OrderedArena::new();
            for &v in &values {
                arena.push_back(v);
            }
            arena.sort_by(|a, b| a.cmp(b));
            let got: Vec<_> = arena.iter().copied().collect();
            let mut expect = values;
            expect.sort();
            prop_assert_eq!(got, expect);
        }
    }
}
