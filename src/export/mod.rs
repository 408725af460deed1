//! Audio export of rendered PCM
//!
//! Rendered output is already signed 16-bit; export adds optional peak
//! normalization and a fade-out before writing the file.

pub mod wav;

pub use wav::export_wav;

/// Export configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Channel count; samples are interleaved
    pub channels: u16,
    /// Scale so the loudest sample reaches 95% of full scale
    pub normalize: bool,
    /// Fade-out length in seconds at the end
    pub fade_out_duration: f32,
}

impl Default for WavConfig {
    fn default() -> Self {
        WavConfig {
            sample_rate: 44_100,
            channels: 2,
            normalize: false,
            fade_out_duration: 0.0,
        }
    }
}

impl WavConfig {
    /// Mono export at `sample_rate`
    pub fn mono(sample_rate: u32) -> Self {
        WavConfig {
            sample_rate,
            channels: 1,
            ..Self::default()
        }
    }

    /// Interleaved stereo export at `sample_rate`
    pub fn stereo(sample_rate: u32) -> Self {
        WavConfig {
            sample_rate,
            channels: 2,
            ..Self::default()
        }
    }

    /// Enable or disable normalization
    pub fn normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Set fade-out duration in seconds
    pub fn fade_out(mut self, seconds: f32) -> Self {
        self.fade_out_duration = seconds.max(0.0);
        self
    }
}

/// Scale samples so the peak reaches 95% of full scale
pub(crate) fn normalize_samples(samples: &mut [i16]) {
    let peak = samples
        .iter()
        .map(|&s| i32::from(s).abs())
        .max()
        .unwrap_or(0);
    if peak == 0 {
        return;
    }
    let gain = 0.95 * f64::from(i16::MAX) / f64::from(peak);
    for sample in samples.iter_mut() {
        *sample = (f64::from(*sample) * gain)
            .round()
            .clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
    }
}

/// Linear fade over the last `duration` seconds of interleaved frames
pub(crate) fn apply_fade_out(samples: &mut [i16], duration: f32, config: &WavConfig) {
    let channels = usize::from(config.channels.max(1));
    let frames = samples.len() / channels;
    let fade_frames = ((duration * config.sample_rate as f32) as usize).min(frames);
    if fade_frames == 0 {
        return;
    }
    let start = frames - fade_frames;
    for (i, frame) in samples.chunks_mut(channels).skip(start).enumerate() {
        let gain = 1.0 - (i + 1) as f32 / fade_frames as f32;
        for sample in frame {
            *sample = (f32::from(*sample) * gain) as i16;
        }
    }
}
