//! Cycle-Accurate Timing
//!
//! Tracks elapsed SID clock cycles. The count only ever moves forward; it
//! survives [`Sid::reset`](crate::Sid::reset) so that scheduled write times
//! stay meaningful for the lifetime of an engine.

/// Elapsed chip clock cycles since construction
pub type CycleCount = i64;

/// Cycle Counter for Cycle-Accurate Emulation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleCounter {
    /// Current cycle count
    cycles: CycleCount,
}

impl CycleCounter {
    /// Create a new cycle counter
    pub fn new() -> Self {
        CycleCounter { cycles: 0 }
    }

    /// Increment the cycle counter by one
    #[inline]
    pub fn clock(&mut self) {
        self.cycles += 1;
    }

    /// Get current cycle count
    #[inline]
    pub fn get_cycles(&self) -> CycleCount {
        self.cycles
    }

    /// Clamp a requested cycle so it never lies in the past
    ///
    /// Returns the clamped value and whether clamping was needed.
    pub fn clamp_to_now(&self, at: CycleCount) -> (CycleCount, bool) {
        if at < self.cycles {
            (self.cycles, true)
        } else {
            (at, false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_counter() {
        let mut counter = CycleCounter::new();
        assert_eq!(counter.get_cycles(), 0);

        counter.clock();
        assert_eq!(counter.get_cycles(), 1);

        (0..99).for_each(|_| counter.clock());
        assert_eq!(counter.get_cycles(), 100);
    }

    #[test]
    fn test_clamp_to_now() {
        let mut counter = CycleCounter::new();
        (0..50).for_each(|_| counter.clock());
        assert_eq!(counter.clamp_to_now(10), (50, true));
        assert_eq!(counter.clamp_to_now(50), (50, false));
        assert_eq!(counter.clamp_to_now(80), (80, false));
    }
}
