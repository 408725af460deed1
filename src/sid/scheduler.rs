//! Pending register writes ordered by cycle.

use std::collections::VecDeque;

use crate::CycleCount;

/// A register write due at a given cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingWrite {
    /// Cycle at which the write takes effect
    pub cycle: CycleCount,
    /// Register address
    pub addr: u8,
    /// Value to write
    pub value: u8,
}

/// Write queue kept sorted by cycle; equal cycles keep call order
#[derive(Debug, Clone, Default)]
pub struct WriteScheduler {
    pending: VecDeque<PendingWrite>,
}

impl WriteScheduler {
    /// Create an empty scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a write
    pub fn schedule(&mut self, cycle: CycleCount, addr: u8, value: u8) {
        let write = PendingWrite { cycle, addr, value };
        // Fast path: writes usually arrive in order.
        match self.pending.back() {
            Some(last) if last.cycle > cycle => {
                let index = self.pending.partition_point(|w| w.cycle <= cycle);
                self.pending.insert(index, write);
            }
            _ => self.pending.push_back(write),
        }
    }

    /// Remove and return the next write due at or before `now`
    #[inline]
    pub fn pop_due(&mut self, now: CycleCount) -> Option<PendingWrite> {
        match self.pending.front() {
            Some(write) if write.cycle <= now => self.pending.pop_front(),
            _ => None,
        }
    }

    /// Cycle of the earliest pending write
    pub fn next_cycle(&self) -> Option<CycleCount> {
        self.pending.front().map(|w| w.cycle)
    }

    /// Number of pending writes
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no writes are pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop all pending writes
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
