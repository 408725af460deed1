//! SID engine
//!
//! Couples the analog pipeline with register-write scheduling and the output
//! sampler. Time advances one chip cycle at a time; every write is applied
//! before the pipeline runs on the cycle it was scheduled for.

use log::{debug, warn};

use super::registers::{Register, RegisterFile};
use super::scheduler::WriteScheduler;
use super::synth::Synth;
use crate::cycle_counter::{CycleCount, CycleCounter};
use crate::{ChipModel, EngineConfig, Result, Sampler, SamplingConfig};

/// Value returned by the paddle registers with nothing connected
const POT_IDLE: u8 = 0xff;

/// MOS 6581/8580 emulator
///
/// # Examples
///
/// ```
/// use resid::{ChipModel, SamplingConfig, Sid};
///
/// let mut sid = Sid::new(ChipModel::Mos8580, SamplingConfig::default()).unwrap();
/// sid.write_now(0x18, 0x0f);
/// assert_eq!(sid.read(0x18), 0x0f);
///
/// let samples = sid.clock(985_248 / 100);
/// assert!(!samples.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct Sid {
    model: ChipModel,
    synth: Synth,
    sampler: Sampler,
    registers: RegisterFile,
    scheduler: WriteScheduler,
    cycles: CycleCounter,
}

impl Sid {
    /// Create an engine
    ///
    /// # Errors
    ///
    /// Returns [`SidError::InvalidSamplingConfig`](crate::SidError::InvalidSamplingConfig)
    /// when the sampling parameters are rejected.
    pub fn new(model: ChipModel, sampling: SamplingConfig) -> Result<Self> {
        let sampler = Sampler::new(sampling)?;
        debug!(
            "SID {} at {} Hz -> {} Hz ({})",
            model, sampling.clock_rate, sampling.sample_rate, sampling.method
        );
        Ok(Sid {
            model,
            synth: Synth::new(model),
            sampler,
            registers: RegisterFile::new(),
            scheduler: WriteScheduler::new(),
            cycles: CycleCounter::new(),
        })
    }

    /// Create an engine from a complete configuration
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let mut sid = Sid::new(config.chip_model, config.sampling)?;
        sid.enable_filter(config.filter_enabled);
        sid.enable_external_filter(config.external_filter_enabled);
        sid.set_voice_mask(config.voice_mask);
        sid.adjust_filter_bias(config.filter_bias);
        Ok(sid)
    }

    /// Chip model
    pub fn chip_model(&self) -> ChipModel {
        self.model
    }

    /// Cycles elapsed since construction
    pub fn cycle(&self) -> CycleCount {
        self.cycles.get_cycles()
    }

    /// Sampling parameters in use
    pub fn sampling_config(&self) -> &SamplingConfig {
        self.sampler.config()
    }

    /// Register mirror
    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// Number of writes waiting for their cycle
    pub fn pending_writes(&self) -> usize {
        self.scheduler.len()
    }

    /// Replace the sampling parameters
    ///
    /// Resampler history is discarded; chip state is untouched.
    pub fn set_sampling_config(&mut self, config: SamplingConfig) -> Result<()> {
        self.sampler = Sampler::new(config)?;
        debug!(
            "Sampling reconfigured: {} Hz -> {} Hz ({})",
            config.clock_rate, config.sample_rate, config.method
        );
        Ok(())
    }

    /// Change only the output sample rate
    pub fn adjust_sampling_frequency(&mut self, sample_rate: f64) -> Result<()> {
        let config = SamplingConfig {
            sample_rate,
            ..*self.sampler.config()
        };
        self.set_sampling_config(config)
    }

    /// Schedule a register write at an absolute cycle
    ///
    /// Writes in the past are applied at the current cycle. Addresses outside
    /// 0x00-0x18 are ignored.
    pub fn write(&mut self, addr: u8, value: u8, at: CycleCount) {
        if !Register::from_addr(addr).is_some_and(|r| r.is_writable()) {
            return;
        }
        let (at, clamped) = self.cycles.clamp_to_now(at);
        if clamped {
            warn!(
                "Write to ${:02X} scheduled before cycle {}; applying now",
                addr,
                self.cycle()
            );
        }
        if at == self.cycle() {
            self.write_now(addr, value);
        } else {
            self.scheduler.schedule(at, addr, value);
        }
    }

    /// Apply a register write at the current cycle
    pub fn write_now(&mut self, addr: u8, value: u8) {
        self.apply_due_writes();
        self.apply(addr, value);
    }

    /// Read a register
    ///
    /// Write-only registers read back the last value written; unknown
    /// addresses read as 0.
    pub fn read(&self, addr: u8) -> u8 {
        match Register::from_addr(addr) {
            Some(Register::PotX | Register::PotY) => POT_IDLE,
            Some(Register::Osc3) => self.synth.read_osc3(),
            Some(Register::Env3) => self.synth.read_env3(),
            Some(_) => self.registers.read(addr).unwrap_or(0),
            None => 0,
        }
    }

    /// Return the chip to its power-on state
    ///
    /// The cycle counter keeps running; pending writes are dropped. Filter
    /// enables, bias, voice mask, external input and sampling parameters
    /// are kept.
    pub fn reset(&mut self) {
        self.registers = RegisterFile::new();
        self.scheduler.clear();
        self.synth.reset();
        self.sampler.reset();
        debug!("SID reset at cycle {}", self.cycle());
    }

    /// Run `cycles` cycles and return the output samples produced
    pub fn clock(&mut self, cycles: u32) -> Vec<i16> {
        let mut samples = Vec::with_capacity(self.sampler.max_output_for(cycles));
        for _ in 0..cycles {
            if let Some(sample) = self.step() {
                samples.push(sample);
            }
        }
        samples
    }

    /// Run up to `delta` cycles, writing samples to every `interleave`-th
    /// slot of `buffer`
    ///
    /// Stops early when the buffer is full. Returns the number of samples
    /// written and the cycles left unconsumed.
    pub fn sample(&mut self, delta: u32, buffer: &mut [i16], interleave: usize) -> (usize, u32) {
        let interleave = interleave.max(1);
        let capacity = buffer.len().div_ceil(interleave);
        let mut written = 0;
        let mut remaining = delta;

        while remaining > 0 && written < capacity {
            remaining -= 1;
            if let Some(sample) = self.step() {
                buffer[written * interleave] = sample;
                written += 1;
            }
        }
        (written, remaining)
    }

    /// Run `cycles` cycles without producing output
    pub fn advance(&mut self, cycles: u32) {
        for _ in 0..cycles {
            self.apply_due_writes();
            self.synth.clock();
            self.cycles.clock();
        }
    }

    /// Enable or bypass the internal filter
    pub fn enable_filter(&mut self, enabled: bool) {
        self.synth.filter.set_enabled(enabled);
    }

    /// Enable or bypass the C64 output RC filter
    pub fn enable_external_filter(&mut self, enabled: bool) {
        self.synth.ext_filter.set_enabled(enabled);
    }

    /// Shift the 6581 cutoff curve; `bias` is clamped to [-1.0, 1.0]
    pub fn adjust_filter_bias(&mut self, bias: f64) {
        self.synth.filter.set_bias(bias);
    }

    /// Mute voices (bits 0-2) and enable the external input (bit 3)
    pub fn set_voice_mask(&mut self, mask: u8) {
        self.synth.mixer.set_voice_mask(mask);
    }

    /// Feed the external audio input
    pub fn input(&mut self, sample: i16) {
        self.synth.mixer.input(sample);
    }

    /// Current cycle-rate output sample
    pub fn output(&self) -> i16 {
        self.synth.output()
    }

    #[inline]
    fn step(&mut self) -> Option<i16> {
        self.apply_due_writes();
        self.synth.clock();
        self.cycles.clock();
        self.sampler.push(self.synth.output())
    }

    #[inline]
    fn apply_due_writes(&mut self) {
        let now = self.cycles.get_cycles();
        while let Some(write) = self.scheduler.pop_due(now) {
            self.apply(write.addr, write.value);
        }
    }

    fn apply(&mut self, addr: u8, value: u8) {
        if let Some((register, masked)) = self.registers.write(addr, value) {
            self.synth.write(register, masked);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SamplingMethod;

    fn sid() -> Sid {
        Sid::new(ChipModel::Mos6581, SamplingConfig::default()).unwrap()
    }

    #[test]
    fn test_read_only_registers() {
        let sid = sid();
        assert_eq!(sid.read(0x19), 0xff);
        assert_eq!(sid.read(0x1a), 0xff);
        assert_eq!(sid.read(0x1b), 0);
        assert_eq!(sid.read(0x1c), 0);
        assert_eq!(sid.read(0x1d), 0);
        assert_eq!(sid.read(0xff), 0);
    }

    #[test]
    fn test_register_masking() {
        let mut sid = sid();
        sid.write_now(0x03, 0xff);
        sid.write_now(0x15, 0xff);
        assert_eq!(sid.read(0x03), 0x0f);
        assert_eq!(sid.read(0x15), 0x07);
    }

    #[test]
    fn test_scheduled_write_applies_on_its_cycle() {
        let mut sid = sid();
        sid.write(0x18, 0x0f, 100);
        sid.advance(100);
        assert_eq!(sid.read(0x18), 0);
        sid.advance(1);
        assert_eq!(sid.read(0x18), 0x0f);
        assert_eq!(sid.pending_writes(), 0);
    }

    #[test]
    fn test_past_write_is_clamped() {
        let mut sid = sid();
        sid.advance(500);
        sid.write(0x18, 0x0a, 10);
        assert_eq!(sid.read(0x18), 0x0a);
        assert_eq!(sid.cycle(), 500);
    }

    #[test]
    fn test_invalid_write_is_ignored() {
        let mut sid = sid();
        sid.write(0x1b, 0x55, 0);
        sid.write(0x40, 0x55, 10);
        assert_eq!(sid.pending_writes(), 0);
        assert_eq!(sid.registers().as_slice(), &[0u8; 0x19]);
    }

    #[test]
    fn test_sample_fills_interleaved_buffer() {
        let mut sid = sid();
        sid.write_now(0x18, 0x0f);
        let mut buffer = [i16::MIN; 10];
        let (written, remaining) = sid.sample(1_000_000, &mut buffer, 2);
        assert_eq!(written, 5);
        assert!(remaining > 0);
        assert!(buffer.iter().skip(1).step_by(2).all(|&s| s == i16::MIN));
    }

    #[test]
    fn test_adjust_sampling_frequency_keeps_registers() {
        let mut sid = Sid::new(
            ChipModel::Mos8580,
            SamplingConfig::new(SamplingMethod::Interpolate, crate::clock::PAL, 44_100.0),
        )
        .unwrap();
        sid.write_now(0x18, 0x0f);
        sid.adjust_sampling_frequency(22_050.0).unwrap();
        assert_eq!(sid.sampling_config().sample_rate, 22_050.0);
        assert_eq!(sid.read(0x18), 0x0f);
        assert!(sid.adjust_sampling_frequency(0.0).is_err());
        assert_eq!(sid.sampling_config().sample_rate, 22_050.0);
    }
}
