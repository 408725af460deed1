//! R-2R Ladder DAC Model
//!
//! The waveform (12-bit) and envelope (8-bit) DACs are R-2R ladders. On the
//! 6581 the resistors are mismatched (2R/R ~ 2.20) and the ladder lacks its
//! termination resistor, so the transfer curve is non-monotonic. The 8580
//! ladder is matched and terminated, giving a linear curve.

use crate::ChipModel;

impl ChipModel {
    /// Ratio of the ladder's 2R and R resistors
    fn r2r_ratio(self) -> f64 {
        match self {
            ChipModel::Mos6581 => 2.20,
            ChipModel::Mos8580 => 2.00,
        }
    }

    /// Whether bit 0 of the ladder is terminated
    fn has_termination(self) -> bool {
        matches!(self, ChipModel::Mos8580)
    }
}

/// Parallel resistance: r1 || r2
fn parallel(r1: f64, r2: f64) -> f64 {
    (r1 * r2) / (r1 + r2)
}

/// Normalized voltage contributed by a single set bit
fn bit_voltage(set_bit: usize, bits: usize, r2: f64, terminated: bool) -> f64 {
    let r = 1.0;
    let mut vn = 1.0;

    // Tail resistance below the set bit; None is an open circuit.
    let mut tail = if terminated { Some(r2) } else { None };
    for _ in 0..set_bit {
        tail = Some(match tail {
            None => r + r2,
            Some(rn) => r + parallel(r2, rn),
        });
    }

    // Source transformation at the set bit
    let mut rn = match tail {
        None => r2,
        Some(rn) => {
            let rn_par = parallel(r2, rn);
            vn *= rn_par / r2;
            rn_par
        }
    };

    // Voltage dividers from the set bit up to the output
    for _ in (set_bit + 1)..bits {
        rn += r;
        let i = vn / rn;
        rn = parallel(r2, rn);
        vn = rn * i;
    }

    vn
}

/// Build the DAC transfer table for `bits` input bits
///
/// Outputs are scaled so that the sum of all bit contributions maps to
/// `2^bits - 1`.
pub fn build_dac_table(bits: usize, chip_model: ChipModel) -> Vec<u16> {
    let r2 = chip_model.r2r_ratio();
    let terminated = chip_model.has_termination();
    let vbit: Vec<f64> = (0..bits)
        .map(|bit| bit_voltage(bit, bits, r2, terminated))
        .collect();
    let v_sum: f64 = vbit.iter().sum();
    let full_scale = ((1u32 << bits) - 1) as f64;

    (0..1usize << bits)
        .map(|input| {
            let vo: f64 = vbit
                .iter()
                .enumerate()
                .filter(|(bit, _)| input & (1 << bit) != 0)
                .map(|(_, v)| v)
                .sum();
            (full_scale * vo / v_sum + 0.5) as u16
        })
        .collect()
}
