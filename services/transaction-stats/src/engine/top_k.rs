//! Bounded top-K selection over transaction amounts
//!
//! A fixed-capacity min-heap keyed by rank: the root is always the weakest
//! held record, so deciding whether a new record belongs in the set is a
//! single comparison and admitting it costs O(log K).
//!
//! Rank is amount descending, then insertion sequence ascending: of two
//! equal amounts the earlier insertion ranks higher.

use services_common::{Amount, TransactionRecord};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// A held record tagged with its insertion sequence
#[derive(Debug, Clone)]
struct RankedEntry {
    amount: Amount,
    sequence: u64,
    record: TransactionRecord,
}

impl PartialEq for RankedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.amount == other.amount && self.sequence == other.sequence
    }
}

impl Eq for RankedEntry {}

impl PartialOrd for RankedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RankedEntry {
    // Greater means ranked higher
    fn cmp(&self, other: &Self) -> Ordering {
        self.amount
            .cmp(&other.amount)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Result of offering a record to the top-K set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopKUpdate {
    /// Set was below capacity and the record was added
    Inserted,
    /// Record displaced the weakest held record
    Replaced {
        /// Amount of the evicted record
        evicted: Amount,
    },
    /// Record did not beat the weakest held record
    Rejected,
}

/// Fixed-capacity top-K structure
#[derive(Debug, Clone)]
pub struct TopK {
    capacity: usize,
    heap: BinaryHeap<Reverse<RankedEntry>>,
}

impl TopK {
    /// Create an empty structure holding at most `capacity` records
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    /// Offer a record inserted with the given sequence number - O(log K)
    ///
    /// Sequences must increase across calls for ties to rank correctly.
    pub fn offer(&mut self, sequence: u64, record: TransactionRecord) -> TopKUpdate {
        if self.capacity == 0 {
            return TopKUpdate::Rejected;
        }

        let entry = RankedEntry {
            amount: record.amount(),
            sequence,
            record,
        };

        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(entry));
            return TopKUpdate::Inserted;
        }

        // Equal amounts keep the held record: it was inserted earlier
        match self.heap.peek_mut() {
            Some(mut root) if entry.amount > root.0.amount => {
                let evicted = root.0.amount;
                // Sift-down happens when the PeekMut guard drops
                *root = Reverse(entry);
                TopKUpdate::Replaced { evicted }
            }
            _ => TopKUpdate::Rejected,
        }
    }

    /// Weakest held amount (the heap root)
    #[must_use]
    pub fn min_amount(&self) -> Option<Amount> {
        self.heap.peek().map(|root| root.0.amount)
    }

    /// Held records ranked highest first - O(K log K)
    #[must_use]
    pub fn sorted_desc(&self) -> Vec<TransactionRecord> {
        let mut entries: Vec<&RankedEntry> = self.heap.iter().map(|r| &r.0).collect();
        entries.sort_unstable_by(|a, b| b.cmp(a));
        entries.into_iter().map(|e| e.record.clone()).collect()
    }

    /// Drop every held record
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Number of held records
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether nothing is held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Configured bound K
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
