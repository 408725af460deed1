//! Multi-chip stereo rendering of timed register-write streams
//!
//! A write stream is a sequence of [`SidWrite`]s, each carrying the number of
//! cycles to run before the write lands. Register numbers above 0x1F address
//! further chips (`reg >> 5`); every chip runs in lockstep and the outputs are
//! panned into an interleaved stereo stream.

use std::collections::VecDeque;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::backend::SidBackend;
use crate::{ChipModel, Result, SamplingConfig, Sid, SidError};

/// Cycles each chip runs after configuration so its filters settle
const SETTLE_CYCLES: u32 = 0xffff;

/// Panning range: -100 is hard left, 100 hard right
const PAN_LIMIT: i8 = 100;

/// Default 6581 cutoff bias applied by the renderer
pub const DEFAULT_FILTER_BIAS_6581: f64 = 0.24;

/// A register write preceded by a delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidWrite {
    /// Cycles to run before the write
    pub cycles: u16,
    /// Chip (bits 5-7) and register (bits 0-4)
    pub reg: u8,
    /// Value to write
    pub data: u8,
}

impl SidWrite {
    /// Create a write
    pub fn new(cycles: u16, reg: u8, data: u8) -> Self {
        SidWrite { cycles, reg, data }
    }

    /// Chip index encoded in the register number
    pub fn chip(&self) -> usize {
        usize::from(self.reg >> 5)
    }

    /// Register within the chip
    pub fn register(&self) -> u8 {
        self.reg & 0x1f
    }
}

/// Shared write queue between a producer thread and the renderer
#[derive(Debug, Clone, Default)]
pub struct WriteQueue {
    inner: Arc<Mutex<VecDeque<SidWrite>>>,
}

impl WriteQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a write
    pub fn push(&self, write: SidWrite) {
        self.inner.lock().push_back(write);
    }

    /// Append several writes under one lock
    pub fn extend<I: IntoIterator<Item = SidWrite>>(&self, writes: I) {
        self.inner.lock().extend(writes);
    }

    /// Remove up to `max` writes from the front
    pub fn drain(&self, max: usize) -> Vec<SidWrite> {
        let mut queue = self.inner.lock();
        let n = max.min(queue.len());
        queue.drain(..n).collect()
    }

    /// Number of queued writes
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Total delay of the queued writes in cycles
    pub fn pending_cycles(&self) -> u64 {
        self.inner.lock().iter().map(|w| u64::from(w.cycles)).sum()
    }

    /// Drop all queued writes
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

/// Renderer configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RendererConfig {
    /// One entry per chip
    pub chip_models: Vec<ChipModel>,
    /// Sampling parameters shared by all chips
    #[serde(default)]
    pub sampling: SamplingConfig,
    /// Stereo position per chip in [-100, 100]; missing entries are centered
    #[serde(default)]
    pub panning: Vec<i8>,
    /// Add triangular 1-LSB dither to the output
    #[serde(default)]
    pub dither: bool,
    /// Dither seed
    #[serde(default)]
    pub seed: u64,
    /// Route a constant external input into 8580 chips to make
    /// volume-register samples audible
    #[serde(default)]
    pub digiboost: bool,
    /// Cutoff bias for 6581 chips
    #[serde(default = "default_filter_bias")]
    pub filter_bias_6581: f64,
}

fn default_filter_bias() -> f64 {
    DEFAULT_FILTER_BIAS_6581
}

impl Default for RendererConfig {
    fn default() -> Self {
        RendererConfig {
            chip_models: vec![ChipModel::default()],
            sampling: SamplingConfig::default(),
            panning: Vec::new(),
            dither: false,
            seed: 0,
            digiboost: false,
            filter_bias_6581: DEFAULT_FILTER_BIAS_6581,
        }
    }
}

impl RendererConfig {
    /// Configuration for a list of chips with default sampling
    pub fn with_chips(chip_models: Vec<ChipModel>) -> Self {
        RendererConfig {
            chip_models,
            ..Self::default()
        }
    }

    /// Validate chip count, panning, bias and sampling
    pub fn validate(&self) -> Result<()> {
        if self.chip_models.is_empty() || self.chip_models.len() > 8 {
            return Err(SidError::ConfigError(format!(
                "renderer needs 1-8 chips, got {}",
                self.chip_models.len()
            )));
        }
        if let Some(&pan) = self.panning.iter().find(|&&p| !valid_pan(p)) {
            return Err(pan_error(pan));
        }
        if !valid_bias(self.filter_bias_6581) {
            return Err(bias_error(self.filter_bias_6581));
        }
        self.sampling.validate()
    }

    /// Left/right gains in percent for chip `index`
    fn gains(&self, index: usize) -> (i32, i32) {
        let position = i32::from(self.panning.get(index).copied().unwrap_or(0));
        let left = if position <= 0 { 100 } else { 100 - position };
        let right = if position >= 0 { 100 } else { 100 + position };
        (left, right)
    }
}

fn valid_pan(pan: i8) -> bool {
    (-PAN_LIMIT..=PAN_LIMIT).contains(&pan)
}

fn pan_error(pan: i8) -> SidError {
    SidError::ConfigError(format!("panning {pan} outside [-100, 100]"))
}

fn valid_bias(bias: f64) -> bool {
    bias.is_finite() && (-1.0..=1.0).contains(&bias)
}

fn bias_error(bias: f64) -> SidError {
    SidError::ConfigError(format!("filter bias {bias} outside [-1.0, 1.0]"))
}

/// Triangular dither: difference of two consecutive random bits
struct Dither {
    rng: StdRng,
    previous: i32,
}

impl Dither {
    fn new(seed: u64) -> Self {
        Dither {
            rng: StdRng::seed_from_u64(seed),
            previous: 0,
        }
    }

    fn next(&mut self) -> i32 {
        let current = (self.rng.random::<u32>() & 1) as i32;
        let value = current - self.previous;
        self.previous = current;
        value
    }
}

/// Stereo renderer over one or more chips
pub struct SidRenderer<B: SidBackend = Sid> {
    chips: Vec<B>,
    config: RendererConfig,
    gains: Vec<(i32, i32)>,
    dither: Option<Dither>,
    buffers: Vec<Vec<i16>>,
}

impl SidRenderer<Sid> {
    /// Build the chips described by `config`
    pub fn new(config: RendererConfig) -> Result<Self> {
        config.validate()?;
        let mut chips = Vec::with_capacity(config.chip_models.len());
        for &model in &config.chip_models {
            let mut sid = Sid::new(model, config.sampling)?;
            apply_chip_settings(&mut sid, &config);
            sid.advance(SETTLE_CYCLES);
            chips.push(sid);
        }
        debug!(
            "Renderer with {} chip(s) at {} Hz",
            chips.len(),
            config.sampling.sample_rate
        );
        Self::from_backends(chips, &config)
    }

    /// Switch digiboost on or off for every 8580 chip
    pub fn set_digiboost(&mut self, enabled: bool) {
        self.config.digiboost = enabled;
        for sid in &mut self.chips {
            apply_chip_settings(sid, &self.config);
        }
    }

    /// Change the cutoff bias of every 6581 chip
    ///
    /// # Errors
    ///
    /// Returns [`SidError::ConfigError`] for a bias outside [-1.0, 1.0].
    pub fn set_filter_bias_6581(&mut self, bias: f64) -> Result<()> {
        if !valid_bias(bias) {
            return Err(bias_error(bias));
        }
        self.config.filter_bias_6581 = bias;
        for sid in &mut self.chips {
            apply_chip_settings(sid, &self.config);
        }
        Ok(())
    }

    /// Replace the sampling parameters of every chip
    ///
    /// The configuration is validated before any chip changes.
    pub fn set_sampling_config(&mut self, sampling: SamplingConfig) -> Result<()> {
        sampling.validate()?;
        for sid in &mut self.chips {
            sid.set_sampling_config(sampling)?;
        }
        self.config.sampling = sampling;
        Ok(())
    }

    /// Change the output sample rate of every chip
    pub fn adjust_sampling_frequency(&mut self, sample_rate: f64) -> Result<()> {
        self.set_sampling_config(SamplingConfig {
            sample_rate,
            ..self.config.sampling
        })
    }
}

/// Digiboost for 8580 chips, cutoff bias for 6581 chips
fn apply_chip_settings(sid: &mut Sid, config: &RendererConfig) {
    match sid.chip_model() {
        ChipModel::Mos8580 if config.digiboost => {
            sid.set_voice_mask(0x0f);
            sid.input(i16::MIN);
        }
        ChipModel::Mos8580 => {
            sid.set_voice_mask(0x07);
            sid.input(0);
        }
        ChipModel::Mos6581 => sid.adjust_filter_bias(config.filter_bias_6581),
    }
}

impl<B: SidBackend> SidRenderer<B> {
    /// Wrap existing backends; `config` supplies panning and dither
    ///
    /// All backends must produce samples at the same rate.
    pub fn from_backends(chips: Vec<B>, config: &RendererConfig) -> Result<Self> {
        if chips.is_empty() {
            return Err(SidError::ConfigError("renderer needs at least one chip".into()));
        }
        let gains = (0..chips.len()).map(|i| config.gains(i)).collect();
        let dither = config.dither.then(|| Dither::new(config.seed));
        let buffers = vec![Vec::new(); chips.len()];
        Ok(SidRenderer {
            chips,
            config: config.clone(),
            gains,
            dither,
            buffers,
        })
    }

    /// Number of chips
    pub fn chip_count(&self) -> usize {
        self.chips.len()
    }

    /// Chip by index
    pub fn chip(&self, index: usize) -> Option<&B> {
        self.chips.get(index)
    }

    /// Settings currently in effect
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Read a register; `reg >> 5` selects the chip as for writes
    pub fn read(&self, reg: u8) -> u8 {
        self.chips[self.chip_index(reg)].read_register(reg & 0x1f)
    }

    /// Move chip `index` to stereo position `pan`
    ///
    /// # Errors
    ///
    /// Returns [`SidError::ConfigError`] for an unknown chip or a position
    /// outside [-100, 100].
    pub fn set_panning(&mut self, index: usize, pan: i8) -> Result<()> {
        if index >= self.chips.len() {
            return Err(SidError::ConfigError(format!("no chip {index}")));
        }
        if !valid_pan(pan) {
            return Err(pan_error(pan));
        }
        if self.config.panning.len() <= index {
            self.config.panning.resize(index + 1, 0);
        }
        self.config.panning[index] = pan;
        self.gains[index] = self.config.gains(index);
        Ok(())
    }

    /// Reset every chip and let it settle again
    ///
    /// Host settings such as digiboost and filter bias survive the reset.
    pub fn reset(&mut self) {
        for chip in &mut self.chips {
            chip.reset();
            chip.advance(SETTLE_CYCLES);
        }
    }

    /// Render a write stream to interleaved stereo samples
    ///
    /// Writes with `cycles == 0` are applied immediately, not dropped.
    pub fn render(&mut self, writes: &[SidWrite]) -> Vec<i16> {
        let mut out = Vec::new();
        for write in writes {
            self.run(u32::from(write.cycles), &mut out);
            let index = self.chip_index(write.reg);
            self.chips[index].write_register(write.register(), write.data);
        }
        out
    }

    /// Render up to `max_writes` writes taken from a shared queue
    pub fn render_queue(&mut self, queue: &WriteQueue, max_writes: usize) -> Vec<i16> {
        let writes = queue.drain(max_writes);
        self.render(&writes)
    }

    /// Run all chips for `cycles` cycles without writes
    pub fn render_cycles(&mut self, cycles: u32) -> Vec<i16> {
        let mut out = Vec::new();
        self.run(cycles, &mut out);
        out
    }

    fn chip_index(&self, reg: u8) -> usize {
        usize::from(reg >> 5).min(self.chips.len() - 1)
    }

    fn run(&mut self, cycles: u32, out: &mut Vec<i16>) {
        if cycles == 0 {
            return;
        }
        for (chip, buffer) in self.chips.iter_mut().zip(&mut self.buffers) {
            buffer.clear();
            chip.clock_into(cycles, buffer);
        }

        let frames = self.buffers.iter().map(Vec::len).min().unwrap_or(0);
        out.reserve(frames * 2);
        for i in 0..frames {
            let (left, right) = if self.chips.len() == 1 {
                let sample = i32::from(self.buffers[0][i]);
                (sample, sample)
            } else {
                self.buffers
                    .iter()
                    .zip(&self.gains)
                    .fold((0, 0), |(l, r), (buffer, &(gl, gr))| {
                        let sample = i32::from(buffer[i]);
                        (l + sample * gl / 100, r + sample * gr / 100)
                    })
            };
            let dither = self.dither.as_mut().map_or(0, Dither::next);
            out.push(limit(left + dither));
            out.push(limit(right + dither));
        }
    }
}

#[inline]
fn limit(sample: i32) -> i16 {
    sample.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}
