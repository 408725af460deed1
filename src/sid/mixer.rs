//! Voice routing into the filter and the bypass path.

use super::registers::{FilterMode, FilterRouting};

/// Voice and external input sums for one cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MixerOutput {
    /// Sum routed through the filter (Vi)
    pub filtered: i32,
    /// Sum bypassing the filter (Vnf)
    pub direct: i32,
}

/// Mixer state: routing, voice 3 disconnect, voice mask and external input
#[derive(Debug, Clone)]
pub struct Mixer {
    routing: FilterRouting,
    voice3_off: bool,
    voice_mask: u8,
    ext_in: i32,
}

impl Default for Mixer {
    fn default() -> Self {
        Mixer {
            routing: FilterRouting::empty(),
            voice3_off: false,
            voice_mask: 0x07,
            ext_in: 0,
        }
    }
}

impl Mixer {
    /// Reset register-driven routing; voice mask and external input are
    /// host settings and stay
    pub fn reset(&mut self) {
        self.routing = FilterRouting::empty();
        self.voice3_off = false;
    }

    /// Write RES_FILT routing bits
    pub fn set_routing(&mut self, value: u8) {
        self.routing = FilterRouting::from_bits_truncate(value);
    }

    /// Write MODE_VOL; only the voice 3 disconnect bit is used here
    pub fn set_mode_vol(&mut self, value: u8) {
        self.voice3_off = FilterMode::from_bits_truncate(value).contains(FilterMode::VOICE3_OFF);
    }

    /// Mute voices (bits 0-2) and enable the external input (bit 3)
    pub fn set_voice_mask(&mut self, mask: u8) {
        self.voice_mask = mask & 0x0f;
    }

    /// Set the external audio input from a 16-bit sample
    ///
    /// The sample is scaled to the 20-bit voice range and down to the mixer
    /// range, as if it were three voices at full amplitude.
    pub fn input(&mut self, sample: i16) {
        self.ext_in = (i32::from(sample) << 4) * 3;
    }

    /// Split voice outputs into filter input and bypass sums
    pub fn mix(&self, voices: [i32; 3], filter_enabled: bool) -> MixerOutput {
        // 20 -> 13 bits
        let mut v = voices.map(|v| v >> 7);
        let mut ext = self.ext_in >> 7;

        for (i, out) in v.iter_mut().enumerate() {
            if self.voice_mask & (1 << i) == 0 {
                *out = 0;
            }
        }
        if self.voice_mask & 0x08 == 0 {
            ext = 0;
        }

        // Voice 3 is only disconnected from the bypass path.
        if self.voice3_off && !self.routing.contains(FilterRouting::VOICE3) {
            v[2] = 0;
        }

        if !filter_enabled {
            return MixerOutput {
                filtered: 0,
                direct: v.iter().sum::<i32>() + ext,
            };
        }

        let mut output = MixerOutput::default();
        for (i, &voice) in v.iter().enumerate() {
            if self.routing.routes_voice(i) {
                output.filtered += voice;
            } else {
                output.direct += voice;
            }
        }
        if self.routing.contains(FilterRouting::EXT_IN) {
            output.filtered += ext;
        } else {
            output.direct += ext;
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOICES: [i32; 3] = [1 << 7, 2 << 7, 4 << 7];

    #[test]
    fn test_routing_splits_voices() {
        let mut mixer = Mixer::default();
        mixer.set_routing(0x05);
        let out = mixer.mix(VOICES, true);
        assert_eq!(out.filtered, 5);
        assert_eq!(out.direct, 2);
    }

    #[test]
    fn test_disabled_filter_bypasses_everything() {
        let mut mixer = Mixer::default();
        mixer.set_routing(0x07);
        let out = mixer.mix(VOICES, false);
        assert_eq!(out, MixerOutput { filtered: 0, direct: 7 });
    }

    #[test]
    fn test_voice3_off_only_when_unfiltered() {
        let mut mixer = Mixer::default();
        mixer.set_mode_vol(0x80);
        assert_eq!(mixer.mix(VOICES, true).direct, 3);

        mixer.set_routing(0x04);
        let out = mixer.mix(VOICES, true);
        assert_eq!(out.filtered, 4);
    }

    #[test]
    fn test_voice_mask_and_external_input() {
        let mut mixer = Mixer::default();
        mixer.input(1000);
        assert_eq!(mixer.mix([0; 3], true).direct, 0);

        mixer.set_voice_mask(0x0e);
        let out = mixer.mix(VOICES, true);
        assert_eq!(out.direct, 2 + 4 + ((1000 << 4) * 3 >> 7));
    }

    #[test]
    fn test_reset_keeps_host_settings() {
        let mut mixer = Mixer::default();
        mixer.set_voice_mask(0x0f);
        mixer.input(i16::MIN);
        mixer.set_routing(0x08);
        mixer.reset();

        let out = mixer.mix([0; 3], true);
        assert_eq!(out.filtered, 0);
        assert_eq!(out.direct, (i32::from(i16::MIN) << 4) * 3 >> 7);
    }
}
