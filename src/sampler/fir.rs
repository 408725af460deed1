//! Kaiser-windowed sinc filter design for band-limited resampling.

use std::f64::consts::PI;

use crate::{SamplingConfig, SamplingMethod};

/// Table resolution target for interpolated FIR lookup
pub(crate) const FIR_RES_INTERPOLATE: f64 = 285.0;
/// Table resolution target for direct FIR lookup
pub(crate) const FIR_RES_FASTMEM: f64 = 51473.0;
/// Fixed-point shift of the FIR coefficients
pub(crate) const FIR_SHIFT: u32 = 15;

/// Precomputed FIR tables
///
/// `res` tables of `n` coefficients each; table `i` is the impulse response
/// shifted by `i / res` of a cycle.
#[derive(Clone, Default)]
pub struct Fir {
    /// Coefficients, `res * n` entries
    pub data: Vec<i16>,
    /// Filter length (odd)
    pub n: usize,
    /// Number of tables (power of two)
    pub res: usize,
}

impl Fir {
    /// Coefficients of table `index`
    #[inline]
    pub fn table(&self, index: usize) -> &[i16] {
        let start = index * self.n;
        &self.data[start..start + self.n]
    }

    /// Design the filter for a validated sampling configuration
    pub fn design(config: &SamplingConfig) -> Self {
        let samples_per_cycle = config.sample_rate / config.clock_rate;
        let cycles_per_sample = config.clock_rate / config.sample_rate;
        let pass_freq = config.effective_pass_freq();

        // 16 bits -> -96dB stopband attenuation.
        let atten = -20.0 * (1.0 / f64::from(1u32 << 16)).log10();
        // Transition band and cutoff midway through it.
        let dw = (1.0 - 2.0 * pass_freq / config.sample_rate) * PI;
        let wc = (2.0 * pass_freq / config.sample_rate + 1.0) * PI / 2.0;

        // Kaiser window parameters as in MATLAB's kaiserord.
        let beta = 0.1102 * (atten - 8.7);
        let i0_beta = i0(beta);

        // Filter order is the number of zero crossings; keep it even.
        let mut order = ((atten - 7.95) / (2.285 * dw) + 0.5) as usize;
        order += order & 1;

        // Filter length is order + 1 scaled to cycles, and must be odd.
        let n = ((order as f64 * cycles_per_sample) as usize + 1) | 1;

        // Resolution clamped to 2^k so the 16.16 sample offset maps onto
        // whole table indices.
        let target = match config.method {
            SamplingMethod::ResampleFastMem => FIR_RES_FASTMEM,
            _ => FIR_RES_INTERPOLATE,
        };
        let shift = (target / cycles_per_sample).log2().ceil().max(0.0) as u32;
        let res = 1usize << shift;

        let mut data = vec![0i16; n * res];
        let half = (n / 2) as i64;
        let gain =
            f64::from(1u32 << FIR_SHIFT) * config.filter_scale * samples_per_cycle * wc / PI;

        for i in 0..res {
            let table = &mut data[i * n..(i + 1) * n];
            let j_offset = i as f64 / res as f64;
            for (slot, j) in table.iter_mut().zip(-half..=half) {
                let jx = j as f64 - j_offset;
                let wt = wc * jx / cycles_per_sample;
                let temp = jx / half as f64;
                let kaiser = if temp.abs() <= 1.0 {
                    i0(beta * (1.0 - temp * temp).sqrt()) / i0_beta
                } else {
                    0.0
                };
                let sinc = if wt.abs() >= 1e-6 { wt.sin() / wt } else { 1.0 };
                *slot = (gain * sinc * kaiser).round() as i16;
            }
        }

        Fir { data, n, res }
    }
}

impl std::fmt::Debug for Fir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fir")
            .field("n", &self.n)
            .field("res", &self.res)
            .finish_non_exhaustive()
    }
}

/// Zeroth order modified Bessel function of the first kind
pub fn i0(x: f64) -> f64 {
    const I0E: f64 = 1e-6;
    let halfx = x / 2.0;
    let mut sum = 1.0;
    let mut u = 1.0;
    let mut n = 1u32;
    loop {
        let temp = halfx / f64::from(n);
        n += 1;
        u *= temp * temp;
        sum += u;
        if u < I0E * sum {
            break;
        }
    }
    sum
}
