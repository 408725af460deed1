//! Engine Configuration
//!
//! Chip model selection, sampling parameters and the serializable engine
//! configuration. Validation happens up front so that an engine is never
//! constructed from parameters the resampler cannot honour.

use std::fmt;
use std::str::FromStr;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::{Result, SidError};

/// Clock frequency constants for common C64 configurations.
pub mod clock {
    /// PAL C64 clock frequency (~985 kHz).
    pub const PAL: f64 = 985_248.0;
    /// NTSC C64 clock frequency (~1.02 MHz).
    pub const NTSC: f64 = 1_022_727.0;
}

/// Default output sample rate
pub const DEFAULT_SAMPLE_RATE: f64 = 44_100.0;

/// Default passband limit for the resampling filter (Hz)
pub const DEFAULT_PASS_FREQ: f64 = 20_000.0;

/// Default FIR gain, slightly below unity to avoid clipping
pub const DEFAULT_FILTER_SCALE: f64 = 0.97;

/// Resampling filter length in output samples
pub(crate) const FIR_N: f64 = 125.0;

/// Capacity of the resampler's cycle-rate ring buffer
pub(crate) const RING_SIZE: usize = 1 << 14;

/// SID chip model selection.
///
/// The MOS 6581 was the original SID chip with a distinctive, distorting
/// filter. The MOS 8580 is the later revision with a cleaner response.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, FromPrimitive, Serialize, Deserialize,
)]
pub enum ChipModel {
    /// Original SID chip (1982)
    #[default]
    #[serde(rename = "6581")]
    Mos6581 = 0,
    /// Revised SID chip (1987)
    #[serde(rename = "8580")]
    Mos8580 = 1,
}

impl ChipModel {
    /// Convert a raw model number (0 = 6581, 1 = 8580)
    pub fn from_raw(raw: u32) -> Result<Self> {
        ChipModel::from_u32(raw)
            .ok_or_else(|| SidError::ConfigError(format!("unknown chip model {raw}")))
    }
}

impl fmt::Display for ChipModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChipModel::Mos6581 => write!(f, "MOS6581"),
            ChipModel::Mos8580 => write!(f, "MOS8580"),
        }
    }
}

impl FromStr for ChipModel {
    type Err = SidError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "6581" | "mos6581" => Ok(ChipModel::Mos6581),
            "8580" | "mos8580" => Ok(ChipModel::Mos8580),
            other => Err(SidError::ConfigError(format!("unknown chip model '{other}'"))),
        }
    }
}

/// Strategy for converting the cycle-rate signal to the output rate
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, FromPrimitive, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum SamplingMethod {
    /// Nearest cycle sample (decimation)
    #[default]
    Fast = 0,
    /// Linear interpolation between the two surrounding cycle samples
    Interpolate = 1,
    /// Windowed-sinc FIR with interpolation between filter tables
    Resample = 2,
    /// Windowed-sinc FIR with a large table and no table interpolation
    ResampleFastMem = 3,
}

impl SamplingMethod {
    /// Convert a raw method number
    ///
    /// # Errors
    ///
    /// Returns [`SidError::InvalidSamplingConfig`] for values outside 0..=3.
    pub fn from_raw(raw: u32) -> Result<Self> {
        SamplingMethod::from_u32(raw).ok_or_else(|| {
            SidError::InvalidSamplingConfig(format!("unsupported sampling method {raw}"))
        })
    }

    /// Whether the method convolves with the windowed-sinc FIR
    pub fn is_resampling(self) -> bool {
        matches!(
            self,
            SamplingMethod::Resample | SamplingMethod::ResampleFastMem
        )
    }
}

impl fmt::Display for SamplingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SamplingMethod::Fast => "fast",
            SamplingMethod::Interpolate => "interpolate",
            SamplingMethod::Resample => "resample",
            SamplingMethod::ResampleFastMem => "resample-fastmem",
        };
        f.write_str(name)
    }
}

impl FromStr for SamplingMethod {
    type Err = SidError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(SamplingMethod::Fast),
            "interpolate" => Ok(SamplingMethod::Interpolate),
            "resample" => Ok(SamplingMethod::Resample),
            "resample-fastmem" | "resample_fastmem" => Ok(SamplingMethod::ResampleFastMem),
            other => Err(SidError::InvalidSamplingConfig(format!(
                "unsupported sampling method '{other}'"
            ))),
        }
    }
}

/// Sampling parameters
///
/// Rates are in Hz. `pass_freq` overrides the resampling filter's passband
/// edge; when absent the passband ends at 20 kHz or 90% of the output Nyquist
/// frequency, whichever is lower.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Conversion strategy
    pub method: SamplingMethod,
    /// Chip clock frequency
    pub clock_rate: f64,
    /// Output sample rate
    pub sample_rate: f64,
    /// Resampling passband limit override
    #[serde(default)]
    pub pass_freq: Option<f64>,
    /// FIR gain
    #[serde(default = "default_filter_scale")]
    pub filter_scale: f64,
}

fn default_filter_scale() -> f64 {
    DEFAULT_FILTER_SCALE
}

impl SamplingConfig {
    /// Create a sampling configuration with default passband and gain
    pub fn new(method: SamplingMethod, clock_rate: f64, sample_rate: f64) -> Self {
        SamplingConfig {
            method,
            clock_rate,
            sample_rate,
            pass_freq: None,
            filter_scale: DEFAULT_FILTER_SCALE,
        }
    }

    /// Override the resampling filter passband limit
    pub fn with_pass_freq(mut self, pass_freq: f64) -> Self {
        self.pass_freq = Some(pass_freq);
        self
    }

    /// Override the resampling filter gain
    pub fn with_filter_scale(mut self, filter_scale: f64) -> Self {
        self.filter_scale = filter_scale;
        self
    }

    /// Passband limit used by the FIR design
    pub fn effective_pass_freq(&self) -> f64 {
        match self.pass_freq {
            Some(freq) => freq,
            None => {
                let nyquist_limit = 0.9 * self.sample_rate / 2.0;
                if 2.0 * DEFAULT_PASS_FREQ / self.sample_rate >= 0.9 {
                    nyquist_limit
                } else {
                    DEFAULT_PASS_FREQ
                }
            }
        }
    }

    /// Ratio of chip cycles to output samples
    pub fn cycles_per_sample(&self) -> f64 {
        self.clock_rate / self.sample_rate
    }

    /// Check that the parameters describe a realisable conversion
    ///
    /// # Errors
    ///
    /// Returns [`SidError::InvalidSamplingConfig`] when a rate is not a
    /// positive finite number, the output rate exceeds the clock rate, or the
    /// resampling filter would not fit its buffers.
    pub fn validate(&self) -> Result<()> {
        if !self.clock_rate.is_finite() || self.clock_rate <= 0.0 {
            return Err(SidError::InvalidSamplingConfig(format!(
                "clock rate must be positive, got {}",
                self.clock_rate
            )));
        }
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(SidError::InvalidSamplingConfig(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.sample_rate > self.clock_rate {
            return Err(SidError::InvalidSamplingConfig(format!(
                "sample rate {} exceeds clock rate {}",
                self.sample_rate, self.clock_rate
            )));
        }
        // 16.16 fixed-point cycle offsets must fit in 32 bits.
        if self.cycles_per_sample() >= 32_768.0 {
            return Err(SidError::InvalidSamplingConfig(format!(
                "clock/sample ratio {:.1} is too large",
                self.cycles_per_sample()
            )));
        }

        if self.method.is_resampling() {
            if FIR_N * self.cycles_per_sample() >= RING_SIZE as f64 {
                return Err(SidError::InvalidSamplingConfig(format!(
                    "clock/sample ratio {:.1} overflows the resampling buffer",
                    self.cycles_per_sample()
                )));
            }
            if let Some(pass_freq) = self.pass_freq {
                if !pass_freq.is_finite() || pass_freq <= 0.0 {
                    return Err(SidError::InvalidSamplingConfig(format!(
                        "pass frequency must be positive, got {pass_freq}"
                    )));
                }
                if pass_freq > 0.9 * self.sample_rate / 2.0 {
                    return Err(SidError::InvalidSamplingConfig(format!(
                        "pass frequency {pass_freq} exceeds 90% of the output Nyquist frequency"
                    )));
                }
            }
            if !(0.9..=1.0).contains(&self.filter_scale) {
                return Err(SidError::InvalidSamplingConfig(format!(
                    "filter scale {} outside [0.9, 1.0]",
                    self.filter_scale
                )));
            }
        }

        Ok(())
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        SamplingConfig::new(SamplingMethod::Fast, clock::PAL, DEFAULT_SAMPLE_RATE)
    }
}

/// Complete engine configuration, loadable from JSON
///
/// ```
/// use resid::EngineConfig;
///
/// let config = EngineConfig::from_json(
///     r#"{ "chip_model": "8580",
///          "sampling": { "method": "resample",
///                        "clock_rate": 985248.0, "sample_rate": 48000.0 } }"#,
/// ).unwrap();
/// assert!(config.filter_enabled);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Chip revision
    #[serde(default)]
    pub chip_model: ChipModel,
    /// Sampling parameters
    #[serde(default)]
    pub sampling: SamplingConfig,
    /// Internal filter enabled
    #[serde(default = "enabled")]
    pub filter_enabled: bool,
    /// C64 output RC filter enabled
    #[serde(default = "enabled")]
    pub external_filter_enabled: bool,
    /// Voice mask (bits 0-2 voices, bit 3 external input)
    #[serde(default = "default_voice_mask")]
    pub voice_mask: u8,
    /// 6581 cutoff curve bias in [-1.0, 1.0]
    #[serde(default)]
    pub filter_bias: f64,
}

fn enabled() -> bool {
    true
}

fn default_voice_mask() -> u8 {
    0x07
}

impl EngineConfig {
    /// Parse a JSON configuration and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate sampling parameters and knob ranges
    pub fn validate(&self) -> Result<()> {
        self.sampling.validate()?;
        if !self.filter_bias.is_finite() || !(-1.0..=1.0).contains(&self.filter_bias) {
            return Err(SidError::ConfigError(format!(
                "filter bias {} outside [-1.0, 1.0]",
                self.filter_bias
            )));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            chip_model: ChipModel::default(),
            sampling: SamplingConfig::default(),
            filter_enabled: true,
            external_filter_enabled: true,
            voice_mask: default_voice_mask(),
            filter_bias: 0.0,
        }
    }
}
