//! Cycle-Rate to Audio-Rate Conversion
//!
//! The sampler is fed one chip output sample per clock cycle and emits an
//! output sample whenever an output instant has been reached. Output instants
//! are tracked in 16.16 fixed point cycles, so the stream stays exact across
//! any split of the input into `clock` calls.
//!
//! - `Fast` picks the cycle sample nearest to the output instant.
//! - `Interpolate` blends the last two cycle samples linearly.
//! - `Resample` convolves a ring buffer of cycle samples with a
//!   Kaiser-windowed sinc, interpolating between neighbouring filter tables.
//! - `ResampleFastMem` uses a finer table grid and a single convolution.

pub mod fir;

use crate::config::RING_SIZE;
use crate::{Result, SamplingConfig, SamplingMethod};
use fir::{Fir, FIR_SHIFT};

const FIXP_SHIFT: u32 = 16;
const FIXP_MASK: i64 = 0xffff;
const FIXP_HALF: i64 = 1 << (FIXP_SHIFT - 1);
const RING_MASK: usize = RING_SIZE - 1;

/// Streaming resampler
#[derive(Clone)]
pub struct Sampler {
    config: SamplingConfig,
    /// Cycles per output sample, 16.16 fixed point
    cycles_per_sample: i64,
    fir: Fir,

    // Output timing
    /// Fractional position of the current output instant
    offset: i64,
    /// Fractional position of the pending output instant
    next_offset: i64,
    /// Cycles left until the pending output instant
    countdown: u32,

    // Cycle-rate history
    prev_sample: i16,
    now_sample: i16,
    ring: Box<[i16]>,
    ring_index: usize,
}

impl Sampler {
    /// Create a sampler for a sampling configuration
    ///
    /// # Errors
    ///
    /// Returns [`SidError::InvalidSamplingConfig`](crate::SidError::InvalidSamplingConfig)
    /// if the configuration does not validate.
    pub fn new(config: SamplingConfig) -> Result<Self> {
        config.validate()?;
        let cycles_per_sample =
            (config.cycles_per_sample() * f64::from(1u32 << FIXP_SHIFT) + 0.5) as i64;
        let fir = if config.method.is_resampling() {
            Fir::design(&config)
        } else {
            Fir::default()
        };
        let ring_len = if config.method.is_resampling() {
            RING_SIZE * 2
        } else {
            0
        };

        let mut sampler = Sampler {
            config,
            cycles_per_sample,
            fir,
            offset: 0,
            next_offset: 0,
            countdown: 0,
            prev_sample: 0,
            now_sample: 0,
            ring: vec![0; ring_len].into_boxed_slice(),
            ring_index: 0,
        };
        sampler.reset();
        Ok(sampler)
    }

    /// Clear buffered history and restart output timing
    pub fn reset(&mut self) {
        self.offset = 0;
        self.prev_sample = 0;
        self.now_sample = 0;
        self.ring.fill(0);
        self.ring_index = 0;
        self.schedule_next();
    }

    /// Sampling parameters in use
    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// Upper bound on samples produced by `cycles` more input cycles
    pub fn max_output_for(&self, cycles: u32) -> usize {
        let whole = (i64::from(cycles) << FIXP_SHIFT) / self.cycles_per_sample.max(1);
        whole as usize + 1
    }

    /// Feed one cycle-rate sample; returns an output sample when an output
    /// instant has been reached
    #[inline]
    pub fn push(&mut self, sample: i16) -> Option<i16> {
        self.prev_sample = self.now_sample;
        self.now_sample = sample;
        if !self.ring.is_empty() {
            self.ring[self.ring_index] = sample;
            self.ring[self.ring_index + RING_SIZE] = sample;
            self.ring_index = (self.ring_index + 1) & RING_MASK;
        }

        self.countdown -= 1;
        if self.countdown > 0 {
            return None;
        }

        self.offset = self.next_offset;
        let output = match self.config.method {
            SamplingMethod::Fast => sample,
            SamplingMethod::Interpolate => self.interpolate(),
            SamplingMethod::Resample => self.convolve_interpolated(),
            SamplingMethod::ResampleFastMem => self.convolve_direct(),
        };
        self.schedule_next();
        Some(output)
    }

    /// Compute the distance to the next output instant
    fn schedule_next(&mut self) {
        let (next, frac) = match self.config.method {
            // Round to the nearest cycle.
            SamplingMethod::Fast => {
                let next = self.offset + self.cycles_per_sample + FIXP_HALF;
                (next, (next & FIXP_MASK) - FIXP_HALF)
            }
            _ => {
                let next = self.offset + self.cycles_per_sample;
                (next, next & FIXP_MASK)
            }
        };
        // Validation keeps cycles_per_sample >= 1.0, so at least one cycle.
        self.countdown = (next >> FIXP_SHIFT).max(1) as u32;
        self.next_offset = frac;
    }

    fn interpolate(&self) -> i16 {
        let prev = i64::from(self.prev_sample);
        let now = i64::from(self.now_sample);
        (prev + ((self.offset * (now - prev)) >> FIXP_SHIFT)) as i16
    }

    /// Start of the newest `n` samples in the mirrored ring
    fn window_start(&self, n: usize) -> usize {
        debug_assert!(n < RING_SIZE, "FIR longer than the sample ring");
        (self.ring_index + RING_SIZE).saturating_sub(n.min(RING_SIZE - 1))
    }

    fn convolve_interpolated(&self) -> i16 {
        let n = self.fir.n;
        let res = self.fir.res as i64;
        let scaled = self.offset * res;
        let fir_offset = (scaled >> FIXP_SHIFT) as usize;
        let rmd = scaled & FIXP_MASK;
        let start = self.window_start(n);

        let v1 = convolve(&self.ring[start..start + n], self.fir.table(fir_offset));

        // Next table; past the last one wrap to the first with the previous
        // sample window.
        let (fir_offset, start) = if fir_offset + 1 == self.fir.res {
            (0, start.saturating_sub(1))
        } else {
            (fir_offset + 1, start)
        };
        let v2 = convolve(&self.ring[start..start + n], self.fir.table(fir_offset));

        let v = v1 + ((rmd * (v2 - v1)) >> FIXP_SHIFT);
        saturate(v >> FIR_SHIFT)
    }

    fn convolve_direct(&self) -> i16 {
        let n = self.fir.n;
        let fir_offset = ((self.offset * self.fir.res as i64) >> FIXP_SHIFT) as usize;
        let start = self.window_start(n);
        let v = convolve(&self.ring[start..start + n], self.fir.table(fir_offset));
        saturate(v >> FIR_SHIFT)
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("config", &self.config)
            .field("cycles_per_sample", &self.cycles_per_sample)
            .field("fir", &self.fir)
            .field("countdown", &self.countdown)
            .finish_non_exhaustive()
    }
}

#[inline]
fn convolve(samples: &[i16], fir: &[i16]) -> i64 {
    samples
        .iter()
        .zip(fir)
        .map(|(&s, &c)| i64::from(s) * i64::from(c))
        .sum()
}

#[inline]
fn saturate(v: i64) -> i16 {
    v.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16
}
