//! MOS 6581/8580 SID Emulator
//!
//! A cycle-accurate emulation of the SID sound chip found in the Commodore 64.
//! The engine steps the chip one clock cycle at a time and resamples the
//! ~1 MHz signal down to an audio output rate.
//!
//! # Features
//! - Three voices with triangle, sawtooth, pulse, noise and combined waveforms
//! - Ring modulation and hard sync between neighbouring voices
//! - ADSR envelopes with the exponential decay curve and the ADSR delay bug
//! - Chip-specific DAC nonlinearity, cutoff curves and 6581 filter distortion
//! - Noise shift register lock-up when noise is combined with other waveforms
//! - Sample-accurate register writes scheduled by cycle
//! - Fast, interpolating and windowed-sinc resampling
//! - Multi-chip stereo rendering of timed register-write streams
//!
//! # Crate feature flags
//! - `export-wav` (default): WAV export of rendered PCM (`export`)
//!
//! # Quick start
//! ```no_run
//! use resid::{ChipModel, SamplingConfig, SamplingMethod, Sid};
//!
//! let config = SamplingConfig::new(SamplingMethod::Resample, 985_248.0, 44_100.0);
//! let mut sid = Sid::new(ChipModel::Mos6581, config).unwrap();
//! sid.write_now(0x00, 0x44); // Voice 1 frequency low
//! sid.write_now(0x01, 0x1D); // Voice 1 frequency high (~440 Hz)
//! sid.write_now(0x06, 0xF0); // Sustain 15, release 0
//! sid.write_now(0x18, 0x0F); // Volume 15
//! sid.write_now(0x04, 0x11); // Triangle, gate on
//! let samples = sid.clock(985_248);
//! ```
//!
//! ## Timed writes
//! ```no_run
//! use resid::{ChipModel, SamplingConfig, Sid};
//!
//! let mut sid = Sid::new(ChipModel::Mos8580, SamplingConfig::default()).unwrap();
//! sid.write(0x04, 0x21, 1_000); // Gate a sawtooth at cycle 1000
//! sid.write(0x04, 0x20, 20_000); // Release it at cycle 20000
//! let samples = sid.clock(40_000);
//! ```

#![warn(missing_docs)]

pub mod backend;
pub mod config;
pub mod cycle_counter;
#[cfg(feature = "export-wav")]
pub mod export; // WAV file output
pub mod render; // Multi-chip stream rendering
pub mod sampler; // Cycle-rate to audio-rate conversion
pub mod sid; // SID chip emulation (core)
pub mod write_log; // CSV register-write logs

/// Error types for SID emulator operations
#[derive(thiserror::Error, Debug)]
pub enum SidError {
    /// Sampling parameters rejected at construction
    #[error("Invalid sampling configuration: {0}")]
    InvalidSamplingConfig(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Error reading or writing a register-write log
    #[error("Write log error: {0}")]
    WriteLogError(String),

    /// Error writing audio file
    #[error("Audio file write error: {0}")]
    AudioFileError(String),

    /// IO error from filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for SidError {
    /// Converts a String into `SidError::Other`.
    ///
    /// Prefer the specific variants (`ConfigError`, `InvalidSamplingConfig`,
    /// `WriteLogError`, `AudioFileError`) where the failure class is known.
    fn from(msg: String) -> Self {
        SidError::Other(msg)
    }
}

impl From<&str> for SidError {
    /// Converts a string slice into `SidError::Other`.
    fn from(msg: &str) -> Self {
        SidError::Other(msg.to_string())
    }
}

impl From<serde_json::Error> for SidError {
    fn from(err: serde_json::Error) -> Self {
        SidError::ConfigError(err.to_string())
    }
}

impl From<csv::Error> for SidError {
    fn from(err: csv::Error) -> Self {
        SidError::WriteLogError(err.to_string())
    }
}

/// Result type for emulator operations
pub type Result<T> = std::result::Result<T, SidError>;

// Public API exports
pub use backend::SidBackend;
pub use config::{clock, ChipModel, EngineConfig, SamplingConfig, SamplingMethod};
pub use cycle_counter::{CycleCount, CycleCounter};
pub use render::{RendererConfig, SidRenderer, SidWrite, WriteQueue};
pub use sampler::Sampler;
pub use sid::{Register, RegisterFile, Sid};
pub use write_log::{read_write_log, write_write_log};

#[cfg(feature = "export-wav")]
pub use export::{export_wav, WavConfig};
