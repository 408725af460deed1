//! Chip-Model Lookup Tables
//!
//! Waveform, DAC and cutoff tables depend only on the chip model. They are
//! built on first use and shared read-only by every engine in the process.

use std::sync::OnceLock;

use super::dac::build_dac_table;
use super::spline::{tabulate, Point};
use crate::ChipModel;

/// Entries per waveform table (upper 12 accumulator bits)
pub const WAVE_TABLE_SIZE: usize = 1 << 12;

/// Cutoff register range (11 bits)
pub const CUTOFF_RANGE: usize = 1 << 11;

/// Measured 6581 cutoff curve: (FC, Hz)
///
/// The curve breaks between 0x7f 0x07 and 0x80, where the highest bit of the
/// cutoff DAC switches in.
const F0_POINTS_6581: [(f64, f64); 31] = [
    (0.0, 220.0),
    (0.0, 220.0),
    (128.0, 230.0),
    (256.0, 250.0),
    (384.0, 300.0),
    (512.0, 420.0),
    (640.0, 780.0),
    (768.0, 1600.0),
    (832.0, 2300.0),
    (896.0, 3200.0),
    (960.0, 4300.0),
    (992.0, 5000.0),
    (1008.0, 5400.0),
    (1016.0, 5700.0),
    (1023.0, 6000.0),
    (1023.0, 6000.0),
    (1024.0, 4600.0),
    (1024.0, 4600.0),
    (1032.0, 4800.0),
    (1056.0, 5300.0),
    (1088.0, 6000.0),
    (1120.0, 6600.0),
    (1152.0, 7200.0),
    (1280.0, 9500.0),
    (1408.0, 12000.0),
    (1536.0, 14500.0),
    (1664.0, 16000.0),
    (1792.0, 17100.0),
    (1920.0, 17700.0),
    (2047.0, 18000.0),
    (2047.0, 18000.0),
];

/// Measured 8580 cutoff curve: (FC, Hz)
const F0_POINTS_8580: [(f64, f64); 19] = [
    (0.0, 0.0),
    (0.0, 0.0),
    (128.0, 800.0),
    (256.0, 1600.0),
    (384.0, 2500.0),
    (512.0, 3300.0),
    (640.0, 4100.0),
    (768.0, 4800.0),
    (896.0, 5600.0),
    (1024.0, 6500.0),
    (1152.0, 7500.0),
    (1280.0, 8400.0),
    (1408.0, 9200.0),
    (1536.0, 9800.0),
    (1664.0, 10500.0),
    (1792.0, 11000.0),
    (1920.0, 11700.0),
    (2047.0, 12500.0),
    (2047.0, 12500.0),
];

/// Bit-interaction parameters of a combined waveform
#[derive(Debug, Clone, Copy)]
struct CombinedWaveform {
    /// Threshold above which an output bit reads as 1
    bias: f32,
    /// Pull-up strength of the pulse line
    pulse_strength: f32,
    /// Attenuation of the sawtooth top bit
    top_bit: f32,
    /// Coupling falloff between neighbouring bits
    distance: f32,
    /// Sawtooth/triangle mixing
    st_mix: f32,
}

impl CombinedWaveform {
    const fn new(bias: f32, pulse_strength: f32, top_bit: f32, distance: f32, st_mix: f32) -> Self {
        CombinedWaveform {
            bias,
            pulse_strength,
            top_bit,
            distance,
            st_mix,
        }
    }
}

/// Parameters for ST, PT, PS and PST, fitted to sampled chips
const COMBINED_6581: [CombinedWaveform; 4] = [
    CombinedWaveform::new(0.880_815, 0.0, 0.0, 0.327_961_4, 0.599_954_5),
    CombinedWaveform::new(0.892_461_8, 2.014_781, 1.003_332, 0.029_923_22, 0.0),
    CombinedWaveform::new(0.864_650_1, 1.712_586, 1.137_704, 0.028_454_23, 0.0),
    CombinedWaveform::new(0.952_783_4, 1.794_777, 0.0, 0.098_062_72, 0.775_248_2),
];

const COMBINED_8580: [CombinedWaveform; 4] = [
    CombinedWaveform::new(0.978_166_5, 0.0, 0.989_946_9, 8.087_667, 0.822_641_2),
    CombinedWaveform::new(0.909_776_9, 2.039_997, 0.958_409_6, 0.176_544_7, 0.0),
    CombinedWaveform::new(0.923_121_2, 2.084_788, 0.949_389_5, 0.171_251_8, 0.0),
    CombinedWaveform::new(0.984_555_2, 1.415_612, 0.970_388_3, 3.688_29, 0.826_500_8),
];

/// Compute one combined waveform output
///
/// `waveform` is the 3-bit T/S/P selector, `index` the upper 12 bits of the
/// accumulator. The selector transistors short neighbouring output bits, so
/// each bit is pulled toward a distance-weighted average of the others before
/// being thresholded.
fn combined_waveform(config: &CombinedWaveform, waveform: usize, index: usize) -> u16 {
    let mut o = [0.0f32; 12];

    // Sawtooth bits
    for (i, bit) in o.iter_mut().enumerate() {
        *bit = if index & (1 << i) != 0 { 1.0 } else { 0.0 };
    }

    if waveform & 3 == 1 {
        // Triangle: bits shifted up and folded by the top bit
        let top = index & 0x800 != 0;
        for i in (1..12).rev() {
            o[i] = if top { 1.0 - o[i - 1] } else { o[i - 1] };
        }
        o[0] = 0.0;
    } else if waveform & 3 == 3 {
        // Sawtooth + triangle; bottom bit grounded by the triangle selector
        o[0] *= config.st_mix;
        for i in 1..12 {
            o[i] = o[i - 1] * (1.0 - config.st_mix) + o[i] * config.st_mix;
        }
    }

    if waveform & 2 == 2 {
        o[11] *= config.top_bit;
    }

    if waveform == 3 || waveform > 4 {
        let mut distance = [0.0f32; 25];
        for i in 0..=12 {
            let weight = 1.0 / (1.0 + (i * i) as f32 * config.distance);
            distance[12 + i] = weight;
            distance[12 - i] = weight;
        }

        let mut mixed = [0.0f32; 12];
        for (i, out) in mixed.iter_mut().enumerate() {
            let mut avg = 0.0;
            let mut n = 0.0;
            for (j, &bit) in o.iter().enumerate() {
                let weight = distance[i + 12 - j];
                avg += bit * weight;
                n += weight;
            }
            if waveform > 4 {
                let weight = distance[i];
                avg += config.pulse_strength * weight;
                n += weight;
            }
            *out = (o[i] + avg / n) * 0.5;
        }
        o = mixed;
    }

    o.iter()
        .enumerate()
        .filter(|(_, &bit)| bit > config.bias)
        .fold(0u16, |acc, (i, _)| acc | (1 << i))
}

/// Lookup tables for one chip model
pub struct ModelTables {
    /// Waveform output by selector (T/S/P bits) and accumulator index
    wave: Vec<u16>,
    /// 12-bit waveform DAC
    pub wave_dac: Vec<u16>,
    /// 8-bit envelope DAC
    pub env_dac: Vec<u16>,
    /// Cutoff frequency in Hz by cutoff register value
    pub f0: Vec<i32>,
}

impl ModelTables {
    fn build(model: ChipModel) -> Self {
        let combined = match model {
            ChipModel::Mos6581 => &COMBINED_6581,
            ChipModel::Mos8580 => &COMBINED_8580,
        };

        let mut wave = vec![0u16; 8 * WAVE_TABLE_SIZE];
        for (waveform, table) in wave.chunks_exact_mut(WAVE_TABLE_SIZE).enumerate() {
            for (index, out) in table.iter_mut().enumerate() {
                *out = match waveform {
                    // Noise-only or pulse-only: pass the mask through
                    0 | 4 => 0xfff,
                    1 => {
                        let folded = if index & 0x800 != 0 { !index } else { index };
                        ((folded << 1) & 0xfff) as u16
                    }
                    2 => index as u16,
                    3 => combined_waveform(&combined[0], waveform, index),
                    5 => combined_waveform(&combined[1], waveform, index),
                    6 => combined_waveform(&combined[2], waveform, index),
                    _ => combined_waveform(&combined[3], waveform, index),
                };
            }
        }

        let points: Vec<Point> = match model {
            ChipModel::Mos6581 => F0_POINTS_6581.iter().copied().map(Point::from).collect(),
            ChipModel::Mos8580 => F0_POINTS_8580.iter().copied().map(Point::from).collect(),
        };

        ModelTables {
            wave,
            wave_dac: build_dac_table(12, model),
            env_dac: build_dac_table(8, model),
            f0: tabulate(&points, CUTOFF_RANGE),
        }
    }

    /// Waveform table for the 3-bit T/S/P selector
    #[inline]
    pub fn wave(&self, selector: u8) -> &[u16] {
        let start = usize::from(selector & 0x07) * WAVE_TABLE_SIZE;
        &self.wave[start..start + WAVE_TABLE_SIZE]
    }
}

impl std::fmt::Debug for ModelTables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelTables")
            .field("wave_dac", &self.wave_dac.len())
            .field("env_dac", &self.env_dac.len())
            .field("f0", &self.f0.len())
            .finish_non_exhaustive()
    }
}

static TABLES_6581: OnceLock<ModelTables> = OnceLock::new();
static TABLES_8580: OnceLock<ModelTables> = OnceLock::new();

/// Shared tables for a chip model
pub fn tables(model: ChipModel) -> &'static ModelTables {
    match model {
        ChipModel::Mos6581 => TABLES_6581.get_or_init(|| ModelTables::build(model)),
        ChipModel::Mos8580 => TABLES_8580.get_or_init(|| ModelTables::build(model)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_waveforms() {
        let t = tables(ChipModel::Mos6581);
        assert_eq!(t.wave(2)[0x123], 0x123);
        assert_eq!(t.wave(1)[0x000], 0x000);
        assert_eq!(t.wave(1)[0x7ff], 0xffe);
        assert_eq!(t.wave(1)[0x800], 0xffe);
        assert_eq!(t.wave(1)[0xfff], 0x000);
        assert!(t.wave(4).iter().all(|&v| v == 0xfff));
    }

    #[test]
    fn test_combined_waveforms_are_not_plain_and() {
        for model in [ChipModel::Mos6581, ChipModel::Mos8580] {
            let t = tables(model);
            let differs = (0..WAVE_TABLE_SIZE).any(|i| t.wave(3)[i] != t.wave(1)[i] & t.wave(2)[i]);
            assert!(differs, "{model} ST should not be the AND of T and S");
        }
    }

    #[test]
    fn test_combined_waveforms_quiet_at_low_phase() {
        // Low accumulator values leave too few high bits to survive the bias.
        for model in [ChipModel::Mos6581, ChipModel::Mos8580] {
            let t = tables(model);
            assert_eq!(t.wave(3)[0x010], 0, "{model} ST");
            assert_eq!(t.wave(6)[0x010], 0, "{model} PS");
        }
    }

    #[test]
    fn test_combined_sawtooth_pulse_has_output_near_top() {
        let t = tables(ChipModel::Mos8580);
        assert!(t.wave(6)[0xfff] != 0);
        assert!((0x800..WAVE_TABLE_SIZE).any(|i| t.wave(7)[i] != 0));
    }

    #[test]
    fn test_cutoff_curves() {
        let t6581 = tables(ChipModel::Mos6581);
        assert_eq!(t6581.f0.len(), CUTOFF_RANGE);
        assert_eq!(t6581.f0[0], 220);
        assert_eq!(t6581.f0[1023], 6000);
        assert_eq!(t6581.f0[1024], 4600);
        assert_eq!(t6581.f0[2047], 18000);
        // Discontinuity at the top cutoff bit
        assert!(t6581.f0[1024] < t6581.f0[1023]);

        let t8580 = tables(ChipModel::Mos8580);
        assert_eq!(t8580.f0[0], 0);
        assert_eq!(t8580.f0[1024], 6500);
        assert_eq!(t8580.f0[2047], 12500);
        assert!(t8580.f0.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_tables_are_shared() {
        let a = tables(ChipModel::Mos6581) as *const ModelTables;
        let b = tables(ChipModel::Mos6581) as *const ModelTables;
        assert_eq!(a, b);
    }
}
