//! C64 Output Stage
//!
//! The board filters the SID output through an RC low-pass at ~16 kHz and a
//! DC-blocking high-pass at ~16 Hz before it reaches the audio connector.
//! Capacitor states carry 11 fraction bits.

use crate::ChipModel;

/// Low-pass coefficient: w0 = 1/(R*C) with R = 10k, C = 1000pF, scaled by 2^20/10^6
const W0_LP: i32 = 104_858;

/// High-pass coefficient: w0 = 1/(R*C) with R = 1k, C = 10uF, scaled by 2^20/10^6
const W0_HP: i32 = 105;

/// Fraction bits of the capacitor states
const STATE_SHIFT: u32 = 11;

/// Maximum mixer DC level of the 6581, removed when the stage is bypassed
const MIXER_DC_6581: i32 =
    ((((0x800 - 0x380) + 0x800) * 0xff * 3 - 0xfff * 0xff / 18) >> 7) * 0x0f;

/// External RC filter
#[derive(Debug, Clone)]
pub struct ExternalFilter {
    enabled: bool,
    mixer_dc: i32,
    vlp: i64,
    vhp: i64,
    vo: i32,
}

impl ExternalFilter {
    /// Create the output stage for a chip model
    pub fn new(model: ChipModel) -> Self {
        ExternalFilter {
            enabled: true,
            mixer_dc: match model {
                ChipModel::Mos6581 => MIXER_DC_6581,
                ChipModel::Mos8580 => 0,
            },
            vlp: 0,
            vhp: 0,
            vo: 0,
        }
    }

    /// Clear the capacitor states
    pub fn reset(&mut self) {
        self.vlp = 0;
        self.vhp = 0;
        self.vo = 0;
    }

    /// Enable or bypass the stage
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether the stage is in the signal path
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Advance by one cycle
    #[inline]
    pub fn clock(&mut self, vi: i32) {
        if !self.enabled {
            // Bypassed: only the mixer DC is removed.
            self.vlp = 0;
            self.vhp = 0;
            self.vo = vi - self.mixer_dc;
            return;
        }

        let vi = i64::from(vi) << STATE_SHIFT;
        let dvlp = (i64::from(W0_LP >> 8) * (vi - self.vlp)) >> 12;
        let dvhp = (i64::from(W0_HP) * (self.vlp - self.vhp)) >> 20;
        self.vo = ((self.vlp - self.vhp) >> STATE_SHIFT) as i32;
        self.vlp += dvlp;
        self.vhp += dvhp;
    }

    /// Filtered output
    #[inline]
    pub fn output(&self) -> i32 {
        self.vo
    }
}
