//! SID voice: waveform generator and envelope generator feeding the
//! waveform and envelope DACs.

use super::envelope::EnvelopeGenerator;
use super::tables::{tables, ModelTables};
use super::wave::WaveformGenerator;
use crate::ChipModel;

/// One of the three SID voices
#[derive(Debug, Clone)]
pub struct Voice {
    /// Oscillator
    pub wave: WaveformGenerator,
    /// ADSR envelope
    pub envelope: EnvelopeGenerator,
    dacs: &'static ModelTables,
    /// Waveform DAC output for a zero waveform
    wave_zero: i32,
    /// DC offset of the voice output
    voice_dc: i32,
}

impl Voice {
    /// Create a voice for a chip model
    pub fn new(model: ChipModel) -> Self {
        // The 6581 waveform "zero" sits above the DAC bottom and the voice
        // output carries a DC component; the 8580 is centered.
        let (wave_zero, voice_dc) = match model {
            ChipModel::Mos6581 => (0x380, 0x800 * 0xff),
            ChipModel::Mos8580 => (0x800, 0),
        };
        Voice {
            wave: WaveformGenerator::new(model),
            envelope: EnvelopeGenerator::new(),
            dacs: tables(model),
            wave_zero,
            voice_dc,
        }
    }

    /// Reset oscillator and envelope
    pub fn reset(&mut self) {
        self.wave.reset();
        self.envelope.reset();
    }

    /// Write the control register to both generators
    pub fn set_control(&mut self, value: u8) {
        self.wave.set_control(value);
        self.envelope.set_control(value);
    }

    /// Amplitude-modulated voice output (20 bits)
    #[inline]
    pub fn output(&self) -> i32 {
        let wave = i32::from(self.dacs.wave_dac[usize::from(self.wave.output())]);
        let env = i32::from(self.dacs.env_dac[usize::from(self.envelope.level())]);
        (wave - self.wave_zero) * env + self.voice_dc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_voice_outputs_dc() {
        let voice = Voice::new(ChipModel::Mos6581);
        assert_eq!(voice.output(), 0x800 * 0xff);
        let voice = Voice::new(ChipModel::Mos8580);
        assert_eq!(voice.output(), 0);
    }

    #[test]
    fn test_output_scales_with_envelope() {
        let mut voice = Voice::new(ChipModel::Mos8580);
        voice.wave.set_freq_hi(0x10);
        voice.envelope.set_attack_decay(0x00);
        voice.envelope.set_sustain_release(0xf0);
        voice.set_control(0x21);

        let mut peak_early = 0;
        for _ in 0..9 * 16 {
            voice.envelope.clock();
            voice.wave.clock();
            voice.wave.set_waveform_output(0);
            peak_early = peak_early.max(voice.output().abs());
        }
        let mut peak_late = 0;
        for _ in 0..10_000 {
            voice.envelope.clock();
            voice.wave.clock();
            voice.wave.set_waveform_output(0);
            peak_late = peak_late.max(voice.output().abs());
        }
        assert!(peak_late > peak_early * 4);
    }
}
