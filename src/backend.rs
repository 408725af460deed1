//! Backend trait abstraction for SID chip implementations
//!
//! The renderer drives chips through this interface so that alternative
//! engines (or test doubles) can be substituted for [`Sid`].

use crate::cycle_counter::CycleCount;
use crate::{ChipModel, Sid};

/// Common interface for SID chip backends
///
/// # Example
///
/// ```
/// use resid::{ChipModel, SamplingConfig, Sid, SidBackend};
///
/// fn beep<B: SidBackend>(chip: &mut B) -> Vec<i16> {
///     chip.write_register(0x01, 0x1d); // Voice 1 frequency high
///     chip.write_register(0x06, 0xf0); // Sustain 15
///     chip.write_register(0x18, 0x0f); // Volume 15
///     chip.write_register(0x04, 0x11); // Triangle, gate on
///     let mut samples = Vec::new();
///     chip.clock_into(20_000, &mut samples);
///     samples
/// }
///
/// let mut sid = Sid::new(ChipModel::Mos6581, SamplingConfig::default()).unwrap();
/// assert!(!beep(&mut sid).is_empty());
/// ```
pub trait SidBackend: Send {
    /// Chip revision being emulated
    fn chip_model(&self) -> ChipModel;

    /// Return the chip to its power-on register state
    fn reset(&mut self);

    /// Write a register at the current cycle
    ///
    /// Addresses outside 0x00-0x18 are ignored.
    fn write_register(&mut self, addr: u8, value: u8);

    /// Read a register
    fn read_register(&self, addr: u8) -> u8;

    /// Run `cycles` cycles, appending produced samples to `out`
    fn clock_into(&mut self, cycles: u32, out: &mut Vec<i16>);

    /// Run `cycles` cycles, discarding output
    fn advance(&mut self, cycles: u32);

    /// Cycles elapsed since construction
    fn cycle(&self) -> CycleCount;
}

impl SidBackend for Sid {
    fn chip_model(&self) -> ChipModel {
        Sid::chip_model(self)
    }

    fn reset(&mut self) {
        Sid::reset(self);
    }

    fn write_register(&mut self, addr: u8, value: u8) {
        self.write_now(addr, value);
    }

    fn read_register(&self, addr: u8) -> u8 {
        self.read(addr)
    }

    fn clock_into(&mut self, cycles: u32, out: &mut Vec<i16>) {
        out.extend(self.clock(cycles));
    }

    fn advance(&mut self, cycles: u32) {
        Sid::advance(self, cycles);
    }

    fn cycle(&self) -> CycleCount {
        Sid::cycle(self)
    }
}
