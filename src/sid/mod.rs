//! SID chip emulation
//!
//! Leaf-first: registers, oscillator and envelope per voice, the mixer, the
//! multimode filter and the board's output filter, tied together by the
//! per-cycle [`synth::Synth`] pipeline and driven by the [`Sid`] engine.

mod chip;
pub mod dac;
pub mod envelope;
pub mod external_filter;
pub mod filter;
pub mod mixer;
pub mod registers;
pub mod scheduler;
pub mod spline;
pub mod synth;
pub mod tables;
pub mod voice;
pub mod wave;

pub use chip::Sid;
pub use envelope::{EnvelopeGenerator, EnvelopeState};
pub use registers::{ControlFlags, FilterMode, FilterRouting, Register, RegisterFile};
pub use wave::WaveformGenerator;
