//! Bounded, deduplicating event buffer
//!
//! The buffer keeps events newest-first in arrival order. Each merge pushes
//! unseen events onto the front and then evicts from the tail until the
//! capacity holds again. An identity index mirrors the buffer contents so
//! duplicate checks stay O(1) regardless of capacity.
//!
//! Evicted identities are remembered for a while (at least `capacity` of
//! them, and every one evicted by the latest merge), so an old event that
//! the source delivers again is not shown a second time. This is also what
//! makes merging the same batch twice a no-op even when the batch overflowed
//! the buffer.

use std::collections::{HashSet, VecDeque};

use tailscope_core::{ConfigError, Event, IdentityKey, identity_of};

use crate::config::validate_capacity;

/// Buffered event with its identity cached
#[derive(Debug, Clone)]
struct Entry {
    key: IdentityKey,
    event: Event,
}

/// What a single merge did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Events accepted as new
    pub inserted: usize,
    /// Events rejected because their identity was already present
    pub duplicates: usize,
    /// Events dropped from the tail to respect capacity
    pub evicted: usize,
}

impl MergeReport {
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.evicted == 0
    }
}

/// Rolling event buffer, newest first
#[derive(Debug, Clone)]
pub struct EventBuffer {
    entries: VecDeque<Entry>,
    index: HashSet<IdentityKey>,
    evicted: VecDeque<IdentityKey>,
    evicted_index: HashSet<IdentityKey>,
    capacity: usize,
}

impl EventBuffer {
    /// Create an empty buffer; a zero capacity is a configuration error
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        validate_capacity(capacity)?;
        Ok(Self {
            entries: VecDeque::new(),
            index: HashSet::new(),
            evicted: VecDeque::new(),
            evicted_index: HashSet::new(),
            capacity,
        })
    }

    /// Merge a freshly fetched batch
    ///
    /// Events are considered in the order received, so the last event of
    /// the batch ends up at the front.
    pub fn merge<I>(&mut self, batch: I) -> MergeReport
    where
        I: IntoIterator<Item = Event>,
    {
        let mut report = MergeReport::default();
        let mut tombstone_hits = HashSet::new();

        for event in batch {
            let key = identity_of(&event);
            if self.evicted_index.contains(&key) {
                report.duplicates += 1;
                tombstone_hits.insert(key);
                continue;
            }
            if !self.index.insert(key.clone()) {
                report.duplicates += 1;
                continue;
            }
            self.entries.push_front(Entry { key, event });
            report.inserted += 1;
        }

        // Tombstones hit by this batch move to the back so the trim below
        // cannot forget them.
        let pinned = tombstone_hits.len();
        if pinned > 0 {
            self.evicted.retain(|k| !tombstone_hits.contains(k));
            self.evicted.extend(tombstone_hits);
        }

        report.evicted = self.evict_to_capacity(pinned);
        report
    }

    /// Pure form of [`merge`](Self::merge): returns the merged buffer and
    /// leaves `self` untouched
    pub fn merged<I>(&self, batch: I) -> (Self, MergeReport)
    where
        I: IntoIterator<Item = Event>,
    {
        let mut next = self.clone();
        let report = next.merge(batch);
        (next, report)
    }

    /// Change the capacity, evicting immediately if it shrank
    ///
    /// Returns the number of evicted events.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<usize, ConfigError> {
        validate_capacity(capacity)?;
        self.capacity = capacity;
        Ok(self.evict_to_capacity(0))
    }

    /// Evict past capacity, then trim tombstones while keeping every
    /// identity evicted now and the `pinned` most recently touched ones
    fn evict_to_capacity(&mut self, pinned: usize) -> usize {
        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            if let Some(entry) = self.entries.pop_back() {
                self.index.remove(&entry.key);
                self.evicted_index.insert(entry.key.clone());
                self.evicted.push_back(entry.key);
                evicted += 1;
            }
        }

        if evicted > 0 {
            let keep = self.capacity.max(evicted + pinned);
            while self.evicted.len() > keep {
                if let Some(key) = self.evicted.pop_front() {
                    self.evicted_index.remove(&key);
                }
            }
        }
        evicted
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.evicted.clear();
        self.evicted_index.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.index.contains(key)
    }

    /// Newest event, if any
    pub fn newest(&self) -> Option<&Event> {
        self.entries.front().map(|e| &e.event)
    }

    /// Read-only view, newest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Event> + ExactSizeIterator + '_ {
        self.entries.iter().map(|e| &e.event)
    }

    /// The `n` newest events in arrival order (oldest of them first)
    pub fn latest_in_arrival_order(&self, n: usize) -> Vec<Event> {
        self.iter().take(n).rev().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a EventBuffer {
    type Item = &'a Event;
    type IntoIter = Box<dyn Iterator<Item = &'a Event> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
