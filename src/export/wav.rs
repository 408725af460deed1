//! WAV file export functionality

use std::path::Path;

use super::{apply_fade_out, normalize_samples, WavConfig};
use crate::{Result, SidError};

/// Write 16-bit PCM samples to a WAV file
///
/// `samples` are interleaved when `config.channels > 1`.
///
/// # Examples
///
/// ```no_run
/// use resid::{export_wav, RendererConfig, SidRenderer, SidWrite, WavConfig};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = RendererConfig::default();
/// let rate = config.sampling.sample_rate as u32;
/// let mut renderer = SidRenderer::new(config)?;
/// let samples = renderer.render(&[
///     SidWrite::new(0, 0x18, 0x0f),
///     SidWrite::new(0, 0x01, 0x1d),
///     SidWrite::new(0, 0x06, 0xf0),
///     SidWrite::new(0, 0x04, 0x11),
///     SidWrite::new(50_000, 0x04, 0x10),
/// ]);
/// export_wav("tone.wav", &samples, WavConfig::stereo(rate).fade_out(0.5))?;
/// # Ok(())
/// # }
/// ```
pub fn export_wav<P: AsRef<Path>>(path: P, samples: &[i16], config: WavConfig) -> Result<()> {
    if config.channels == 0 || config.sample_rate == 0 {
        return Err(SidError::AudioFileError(format!(
            "invalid WAV format: {} channel(s) at {} Hz",
            config.channels, config.sample_rate
        )));
    }

    let mut samples = samples.to_vec();
    if config.normalize {
        normalize_samples(&mut samples);
    }
    if config.fade_out_duration > 0.0 {
        apply_fade_out(&mut samples, config.fade_out_duration, &config);
    }

    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path.as_ref(), spec)
        .map_err(|e| SidError::AudioFileError(format!("Failed to create WAV file: {e}")))?;
    for &sample in &samples {
        writer
            .write_sample(sample)
            .map_err(|e| SidError::AudioFileError(format!("Failed to write sample: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| SidError::AudioFileError(format!("Failed to finalize WAV file: {e}")))?;

    log::debug!(
        "Wrote {} samples to {}",
        samples.len(),
        path.as_ref().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_channels() {
        let dir = tempfile::tempdir().unwrap();
        let config = WavConfig {
            channels: 0,
            ..WavConfig::default()
        };
        let err = export_wav(dir.path().join("x.wav"), &[0, 1], config).unwrap_err();
        assert!(matches!(err, SidError::AudioFileError(_)));
    }

    #[test]
    fn test_wav_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let samples: Vec<i16> = (0..200).map(|i| (i * 100 - 10_000) as i16).collect();
        export_wav(&path, &samples, WavConfig::stereo(48_000)).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 48_000);
        assert_eq!(spec.bits_per_sample, 16);
        let read: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(read, samples);
    }
}
