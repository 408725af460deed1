//! Per-cycle signal pipeline: voices, mixer, filter and output stage.

use super::external_filter::ExternalFilter;
use super::filter::Filter;
use super::mixer::Mixer;
use super::registers::{Register, VoiceRegister};
use super::voice::Voice;
use super::wave::SyncSnapshot;
use crate::ChipModel;

/// Output stage divisor: full-scale mixer output of three voices at maximum
/// volume spread over 16 bits, `((4095 * 255 >> 7) * 3 * 15 * 2) / 65536`
pub const SAMPLES_PER_OUTPUT: i32 = ((4095 * 255 >> 7) * 3 * 15 * 2) / 65536;

/// The analog side of the chip
#[derive(Debug, Clone)]
pub struct Synth {
    /// Voices 1-3
    pub voices: [Voice; 3],
    /// Voice routing
    pub mixer: Mixer,
    /// Multimode filter
    pub filter: Filter,
    /// C64 output stage
    pub ext_filter: ExternalFilter,
}

impl Synth {
    /// Create the pipeline for a chip model
    pub fn new(model: ChipModel) -> Self {
        Synth {
            voices: [Voice::new(model), Voice::new(model), Voice::new(model)],
            mixer: Mixer::default(),
            filter: Filter::new(model),
            ext_filter: ExternalFilter::new(model),
        }
    }

    /// Reset chip state; host knobs such as filter enables, bias, voice mask
    /// and external input stay
    pub fn reset(&mut self) {
        for voice in &mut self.voices {
            voice.reset();
        }
        self.mixer.reset();
        self.filter.reset();
        self.ext_filter.reset();
    }

    /// Apply a decoded register write
    pub fn write(&mut self, register: Register, value: u8) {
        if let Some((index, reg)) = register.voice_register() {
            let voice = &mut self.voices[index];
            match reg {
                VoiceRegister::FreqLo => voice.wave.set_freq_lo(value),
                VoiceRegister::FreqHi => voice.wave.set_freq_hi(value),
                VoiceRegister::PwLo => voice.wave.set_pw_lo(value),
                VoiceRegister::PwHi => voice.wave.set_pw_hi(value),
                VoiceRegister::Control => voice.set_control(value),
                VoiceRegister::AttackDecay => voice.envelope.set_attack_decay(value),
                VoiceRegister::SustainRelease => voice.envelope.set_sustain_release(value),
            }
            return;
        }

        match register {
            Register::FcLo => self.filter.set_fc_lo(value),
            Register::FcHi => self.filter.set_fc_hi(value),
            Register::ResFilt => {
                self.filter.set_res_filt(value);
                self.mixer.set_routing(value);
            }
            Register::ModeVol => {
                self.filter.set_mode_vol(value);
                self.mixer.set_mode_vol(value);
            }
            _ => {}
        }
    }

    /// Run one clock cycle
    #[inline]
    pub fn clock(&mut self) {
        for voice in &mut self.voices {
            voice.envelope.clock();
        }
        for voice in &mut self.voices {
            voice.wave.clock();
        }

        let [v1, v2, v3] = &self.voices;
        let sync = SyncSnapshot::capture([&v1.wave, &v2.wave, &v3.wave]);
        for (i, voice) in self.voices.iter_mut().enumerate() {
            if sync.resets(i) {
                voice.wave.hard_sync();
            }
        }

        // Ring modulation reads the sources as they stood before any voice
        // updated its output this cycle.
        let accumulators = self.voices.each_ref().map(|v| v.wave.accumulator());
        for (i, voice) in self.voices.iter_mut().enumerate() {
            voice.wave.set_waveform_output(accumulators[(i + 2) % 3]);
        }

        let outputs = self.voices.each_ref().map(Voice::output);
        let mixed = self.mixer.mix(outputs, self.filter.enabled());
        self.filter.clock(mixed);
        self.ext_filter.clock(self.filter.output());
    }

    /// Current 16-bit output sample
    #[inline]
    pub fn output(&self) -> i16 {
        let sample = self.ext_filter.output() / SAMPLES_PER_OUTPUT;
        sample.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
    }

    /// OSC3 register
    pub fn read_osc3(&self) -> u8 {
        self.voices[2].wave.read_osc()
    }

    /// ENV3 register
    pub fn read_env3(&self) -> u8 {
        self.voices[2].envelope.read_env()
    }
}
