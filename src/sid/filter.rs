//! SID Multimode Filter
//!
//! A two-integrator-loop state-variable filter stepped once per cycle.
//! Vhp is the summer output, Vbp and Vlp the integrator outputs. The outputs
//! are inverted with levels independent of Q, as measured on real chips.
//!
//! Coefficients are fixed point: `w0` carries a factor of 2^20 / 10^6 so the
//! per-cycle division by the 1 MHz clock becomes a shift by 20, and `1/Q`
//! carries a factor of 1024.
//!
//! The 6581 integrators run out of headroom at high signal levels; their
//! outputs are bent through a soft saturation curve above a knee.

use std::f64::consts::PI;

use super::mixer::MixerOutput;
use super::registers::FilterMode;
use super::tables::{tables, CUTOFF_RANGE};
use crate::ChipModel;

/// Highest cutoff that keeps a one-cycle step stable
const F0_MAX_1CYCLE: f64 = 16_000.0;

/// 2^20 / 1_000_000
const FIXP_SCALE: f64 = 1.048_576;

/// Lowest Q of the 6581 resonance curve
const Q_MIN_6581: f64 = 0.707;

/// Integrator level where 6581 saturation sets in
const SATURATION_KNEE: i32 = 0x7000;

/// Additional swing available above the knee
const SATURATION_HEADROOM: i32 = 0x4000;

/// DC level of the 6581 mixer output
const MIXER_DC_6581: i32 = (-0xfff * 0xff / 18) >> 7;

/// Bias range accepted by `set_bias`
const BIAS_LIMIT: f64 = 1.0;

/// Padé approximant of tanh, exact to within 1e-4 for |x| < 3
#[inline]
fn tanh_approx(x: f64) -> f64 {
    if x >= 3.0 {
        return 1.0;
    }
    let x2 = x * x;
    x * (945.0 + x2 * (105.0 + x2)) / (945.0 + x2 * (420.0 + x2 * 15.0))
}

/// Bend an integrator value toward `knee + headroom`
#[inline]
fn saturate(value: i32) -> i32 {
    let magnitude = i64::from(value).abs();
    if magnitude <= i64::from(SATURATION_KNEE) {
        return value;
    }
    let over = (magnitude - i64::from(SATURATION_KNEE)) as f64 / f64::from(SATURATION_HEADROOM);
    let bent = SATURATION_KNEE + (f64::from(SATURATION_HEADROOM) * tanh_approx(over)) as i32;
    if value < 0 {
        -bent
    } else {
        bent
    }
}

/// SID filter stage
#[derive(Debug, Clone)]
pub struct Filter {
    model: ChipModel,
    enabled: bool,
    bias: f64,
    f0: &'static [i32],

    // Registers
    fc: u16,
    res: u8,
    mode: FilterMode,
    vol: u8,

    // Coefficients
    w0: i32,
    w0_ceil_1: i32,
    q_1024_div: i32,
    mixer_dc: i32,

    // State
    vhp: i32,
    vbp: i32,
    vlp: i32,
    vnf: i32,
}

impl Filter {
    /// Create a filter for a chip model
    pub fn new(model: ChipModel) -> Self {
        let mut filter = Filter {
            model,
            enabled: true,
            bias: 0.0,
            f0: &tables(model).f0,
            fc: 0,
            res: 0,
            mode: FilterMode::empty(),
            vol: 0,
            w0: 0,
            w0_ceil_1: 0,
            q_1024_div: 0,
            mixer_dc: match model {
                ChipModel::Mos6581 => MIXER_DC_6581,
                ChipModel::Mos8580 => 0,
            },
            vhp: 0,
            vbp: 0,
            vlp: 0,
            vnf: 0,
        };
        filter.reset();
        filter
    }

    /// Clear registers and integrators; enable flag and bias are kept
    pub fn reset(&mut self) {
        self.fc = 0;
        self.res = 0;
        self.mode = FilterMode::empty();
        self.vol = 0;
        self.vhp = 0;
        self.vbp = 0;
        self.vlp = 0;
        self.vnf = 0;
        self.update_w0();
        self.update_q();
    }

    /// Enable or bypass the filter
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether the filter is in the signal path
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Shift the 6581 cutoff curve by a factor of `2^(2 * bias)`
    ///
    /// `bias` is clamped to [-1.0, 1.0]. Has no effect on the 8580.
    pub fn set_bias(&mut self, bias: f64) {
        self.bias = if bias.is_finite() {
            bias.clamp(-BIAS_LIMIT, BIAS_LIMIT)
        } else {
            0.0
        };
        self.update_w0();
    }

    /// Current cutoff bias
    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// Write FC_LO (bits 0-2 of the cutoff)
    pub fn set_fc_lo(&mut self, value: u8) {
        self.fc = (self.fc & 0x7f8) | u16::from(value & 0x07);
        self.update_w0();
    }

    /// Write FC_HI (bits 3-10 of the cutoff)
    pub fn set_fc_hi(&mut self, value: u8) {
        self.fc = (u16::from(value) << 3) | (self.fc & 0x007);
        self.update_w0();
    }

    /// Write RES_FILT; routing bits are handled by the mixer
    pub fn set_res_filt(&mut self, value: u8) {
        self.res = (value >> 4) & 0x0f;
        self.update_q();
    }

    /// Write MODE_VOL
    pub fn set_mode_vol(&mut self, value: u8) {
        self.mode = FilterMode::from_bits_truncate(value);
        self.vol = value & 0x0f;
    }

    fn update_w0(&mut self) {
        let bias_factor = match self.model {
            ChipModel::Mos6581 => (2.0 * self.bias).exp2(),
            ChipModel::Mos8580 => 1.0,
        };
        let f0 = f64::from(self.f0[usize::from(self.fc) % CUTOFF_RANGE]) * bias_factor;
        self.w0 = (2.0 * PI * f0 * FIXP_SCALE) as i32;
        let w0_max_1 = (2.0 * PI * F0_MAX_1CYCLE * FIXP_SCALE) as i32;
        self.w0_ceil_1 = self.w0.min(w0_max_1);
    }

    fn update_q(&mut self) {
        let res = f64::from(self.res);
        self.q_1024_div = match self.model {
            ChipModel::Mos6581 => (1024.0 / (Q_MIN_6581 + res / 15.0)) as i32,
            ChipModel::Mos8580 => (1024.0 * ((4.0 - res) / 8.0).exp2()) as i32,
        };
    }

    /// Advance by one cycle
    #[inline]
    pub fn clock(&mut self, input: MixerOutput) {
        self.vnf = input.direct;
        if !self.enabled {
            self.vhp = 0;
            self.vbp = 0;
            self.vlp = 0;
            return;
        }

        let w0 = i64::from(self.w0_ceil_1);
        let dvbp = ((w0 * i64::from(self.vhp)) >> 20) as i32;
        let dvlp = ((w0 * i64::from(self.vbp)) >> 20) as i32;
        self.vbp -= dvbp;
        self.vlp -= dvlp;

        if self.model == ChipModel::Mos6581 {
            self.vbp = saturate(self.vbp);
            self.vlp = saturate(self.vlp);
        }

        self.vhp = ((i64::from(self.vbp) * i64::from(self.q_1024_div)) >> 10) as i32
            - self.vlp
            - input.filtered;
    }

    /// Filter output scaled by the master volume
    #[inline]
    pub fn output(&self) -> i32 {
        if !self.enabled {
            return (self.vnf + self.mixer_dc) * i32::from(self.vol);
        }
        let mut vf = 0;
        if self.mode.contains(FilterMode::LOWPASS) {
            vf += self.vlp;
        }
        if self.mode.contains(FilterMode::BANDPASS) {
            vf += self.vbp;
        }
        if self.mode.contains(FilterMode::HIGHPASS) {
            vf += self.vhp;
        }
        (self.vnf + vf + self.mixer_dc) * i32::from(self.vol)
    }

    /// Cutoff register value (11 bits)
    pub fn cutoff(&self) -> u16 {
        self.fc
    }

    /// Cutoff coefficient in use
    pub fn w0(&self) -> i32 {
        self.w0_ceil_1
    }

    /// Integrator outputs (Vhp, Vbp, Vlp)
    pub fn state(&self) -> (i32, i32, i32) {
        (self.vhp, self.vbp, self.vlp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(filter: &mut Filter, half_period: usize, cycles: usize, amplitude: i32) -> i32 {
        let mut peak = 0;
        for i in 0..cycles {
            let filtered = if (i / half_period) % 2 == 0 { amplitude } else { -amplitude };
            filter.clock(MixerOutput {
                filtered,
                direct: 0,
            });
            if i > cycles / 2 {
                peak = peak.max(filter.output().abs());
            }
        }
        peak
    }

    fn lowpass(model: ChipModel, fc_hi: u8) -> Filter {
        let mut filter = Filter::new(model);
        filter.set_fc_hi(fc_hi);
        filter.set_res_filt(0x01);
        filter.set_mode_vol(0x1f);
        filter
    }

    #[test]
    fn test_cutoff_register_bits() {
        let mut filter = Filter::new(ChipModel::Mos8580);
        filter.set_fc_lo(0xff);
        filter.set_fc_hi(0xff);
        assert_eq!(filter.cutoff(), 0x7ff);
        filter.set_fc_hi(0x00);
        assert_eq!(filter.cutoff(), 0x007);
    }

    #[test]
    fn test_lowpass_attenuates_high_frequencies() {
        let amplitude = 2000;
        // ~1 kHz cutoff on the 8580
        let mut low = lowpass(ChipModel::Mos8580, 0x14);
        // 500 Hz square
        let pass = square(&mut low, 1000, 40_000, amplitude);
        let mut high = lowpass(ChipModel::Mos8580, 0x14);
        // 10 kHz square
        let stop = square(&mut high, 50, 40_000, amplitude);
        assert!(pass > stop * 5, "pass {pass} stop {stop}");
    }

    #[test]
    fn test_disabled_filter_passes_direct_path() {
        let mut filter = Filter::new(ChipModel::Mos8580);
        filter.set_mode_vol(0x1f);
        filter.set_enabled(false);
        filter.clock(MixerOutput {
            filtered: 0,
            direct: 1234,
        });
        assert_eq!(filter.output(), 1234 * 15);
        assert_eq!(filter.state(), (0, 0, 0));
    }

    #[test]
    fn test_6581_saturation_bounds_integrators() {
        let mut filter = Filter::new(ChipModel::Mos6581);
        filter.set_fc_hi(0xff);
        filter.set_res_filt(0xf0);
        filter.set_mode_vol(0x2f);
        let bound = SATURATION_KNEE + SATURATION_HEADROOM;
        for i in 0..100_000 {
            let filtered = if (i / 30) % 2 == 0 { 30_000 } else { -30_000 };
            filter.clock(MixerOutput {
                filtered,
                direct: 0,
            });
            let (_, vbp, vlp) = filter.state();
            assert!(vbp.abs() <= bound && vlp.abs() <= bound);
        }
    }

    #[test]
    fn test_bias_moves_6581_cutoff_only() {
        let mut filter = Filter::new(ChipModel::Mos6581);
        filter.set_fc_hi(0x20);
        let base = filter.w0();
        filter.set_bias(0.5);
        assert!(filter.w0() > base);
        filter.set_bias(-5.0);
        assert_eq!(filter.bias(), -1.0);
        assert!(filter.w0() < base);

        let mut filter = Filter::new(ChipModel::Mos8580);
        filter.set_fc_hi(0x20);
        let base = filter.w0();
        filter.set_bias(1.0);
        assert_eq!(filter.w0(), base);
    }

    #[test]
    fn test_resonance_curves() {
        let mut f6581 = Filter::new(ChipModel::Mos6581);
        let mut f8580 = Filter::new(ChipModel::Mos8580);
        f6581.set_res_filt(0x00);
        f8580.set_res_filt(0x00);
        assert_eq!(f6581.q_1024_div, (1024.0 / 0.707) as i32);
        assert_eq!(f8580.q_1024_div, (1024.0 * 2f64.sqrt()) as i32);
        f6581.set_res_filt(0xf0);
        f8580.set_res_filt(0xf0);
        assert!(f8580.q_1024_div < f6581.q_1024_div);
    }

    #[test]
    fn test_saturate_is_continuous_at_knee() {
        assert_eq!(saturate(SATURATION_KNEE), SATURATION_KNEE);
        assert!((saturate(SATURATION_KNEE + 10) - (SATURATION_KNEE + 10)).abs() <= 1);
        assert_eq!(saturate(-SATURATION_KNEE - 5), -saturate(SATURATION_KNEE + 5));
        assert!(saturate(i32::MAX - 1) <= SATURATION_KNEE + SATURATION_HEADROOM);
    }
}
