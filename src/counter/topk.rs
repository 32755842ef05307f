//! Bounded top-K selection
//!
//! A min-heap capped at a fixed capacity. Inserting past capacity evicts the
//! current minimum, so the heap always holds the K largest items seen so far.

use crate::record::{PrefixAggregate, Record};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Capacity of the largest-records ranking
pub const LARGEST_RECORDS_CAPACITY: usize = 500;

/// Capacity of the largest-prefixes ranking
pub const LARGEST_PREFIXES_CAPACITY: usize = 1000;

/// Capacity-bounded max-K collection
#[derive(Debug, Clone)]
pub struct TopK<T: Ord> {
    heap: BinaryHeap<Reverse<T>>,
    capacity: usize,
}

impl<T: Ord> TopK<T> {
    /// Create an empty selector holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity.saturating_add(1)),
            capacity,
        }
    }

    /// Offer an item; evicts the minimum when over capacity
    pub fn insert(&mut self, item: T) {
        self.heap.push(Reverse(item));
        if self.heap.len() > self.capacity {
            self.heap.pop();
        }
    }

    /// Smallest retained item
    pub fn min(&self) -> Option<&T> {
        self.heap.peek().map(|Reverse(item)| item)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Ord + Clone> TopK<T> {
    /// Copy of the current contents, largest first
    pub fn snapshot(&self) -> Vec<T> {
        let mut items: Vec<T> = self.heap.iter().map(|Reverse(item)| item.clone()).collect();
        items.sort_unstable_by(|a, b| b.cmp(a));
        items
    }
}

/// Record ordered by byte size only
#[derive(Debug, Clone)]
pub struct BySize(pub Record);

impl PartialEq for BySize {
    fn eq(&self, other: &Self) -> bool {
        self.0.bytes == other.0.bytes
    }
}

impl Eq for BySize {}

impl PartialOrd for BySize {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BySize {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.bytes.cmp(&other.0.bytes)
    }
}

/// Prefix aggregate ordered by bytes, then count, then key
///
/// Among equal bytes and count the lexicographically smaller key compares
/// smaller and is evicted first. The value type breaks any remaining tie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixRank(pub PrefixAggregate);

impl PartialOrd for PrefixRank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PrefixRank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .bytes
            .cmp(&other.0.bytes)
            .then_with(|| self.0.num.cmp(&other.0.num))
            .then_with(|| self.0.pair.key.cmp(&other.0.pair.key))
            .then_with(|| self.0.pair.value_type.cmp(&other.0.pair.value_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TypeKeyPair;

    fn prefix(key: &str, bytes: u64, num: u64) -> PrefixRank {
        PrefixRank(PrefixAggregate {
            pair: TypeKeyPair::new("hash", key),
            bytes,
            num,
        })
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut top = TopK::new(3);
        for n in [5, 1, 9, 3, 7, 2] {
            top.insert(n);
        }
        assert_eq!(top.len(), 3);
        assert_eq!(top.snapshot(), vec![9, 7, 5]);
        assert_eq!(top.min(), Some(&5));
    }

    #[test]
    fn test_fewer_items_than_capacity() {
        let mut top = TopK::new(10);
        top.insert(2);
        top.insert(8);
        assert_eq!(top.snapshot(), vec![8, 2]);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut top = TopK::new(0);
        top.insert(1);
        assert!(top.is_empty());
    }

    #[test]
    fn test_snapshot_does_not_drain() {
        let mut top = TopK::new(2);
        top.insert(4);
        top.insert(6);
        let _ = top.snapshot();
        assert_eq!(top.len(), 2);
    }

    #[test]
    fn test_by_size_orders_on_bytes() {
        let mut top = TopK::new(2);
        top.insert(BySize(Record::new("a", "string", 10, 1)));
        top.insert(BySize(Record::new("b", "string", 30, 1)));
        top.insert(BySize(Record::new("c", "string", 20, 1)));
        let keys: Vec<_> = top.snapshot().into_iter().map(|r| r.0.key).collect();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn test_prefix_rank_count_breaks_byte_tie() {
        assert!(prefix("a", 100, 5) > prefix("b", 100, 4));
        assert!(prefix("a", 101, 1) > prefix("b", 100, 9));
    }

    #[test]
    fn test_prefix_rank_greater_key_kept_on_full_tie() {
        let mut top = TopK::new(1);
        top.insert(prefix("apple", 100, 5));
        top.insert(prefix("banana", 100, 5));
        assert_eq!(top.snapshot()[0].0.pair.key, "banana");

        let mut top = TopK::new(1);
        top.insert(prefix("banana", 100, 5));
        top.insert(prefix("apple", 100, 5));
        assert_eq!(top.snapshot()[0].0.pair.key, "banana");
    }
}
