//! SID Envelope Generator
//!
//! An 8-bit up/down counter stepped by a 15-bit rate counter. Attack counts
//! up linearly; decay and release count down through an exponential counter
//! whose period grows as the level falls, approximating the curve of the
//! analog original.
//!
//! The rate counter compares for equality against the period, so lowering
//! the rate mid-count makes it run the full 15-bit range before it wraps
//! (the "ADSR delay bug").

use std::fmt;

/// Rate counter periods in cycles for each 4-bit rate value
pub const RATE_COUNTER_PERIOD: [u16; 16] = [
    9, 32, 63, 95, 149, 220, 267, 313, 392, 977, 1954, 3126, 3907, 11720, 19532, 31251,
];

/// Envelope level for each 4-bit sustain value
pub const SUSTAIN_LEVEL: [u8; 16] = [
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff,
];

const RATE_COUNTER_WRAP: u16 = 0x8000;

/// Envelope stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopeState {
    /// Counting up toward 0xff
    Attack,
    /// Counting down toward the sustain level
    DecaySustain,
    /// Counting down toward zero
    #[default]
    Release,
}

impl fmt::Display for EnvelopeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeState::Attack => write!(f, "Attack"),
            EnvelopeState::DecaySustain => write!(f, "Decay-Sustain"),
            EnvelopeState::Release => write!(f, "Release"),
        }
    }
}

/// Exponential counter period for the level just reached, if it changes
#[inline]
fn exponential_period(level: u8) -> Option<u8> {
    match level {
        0xff => Some(1),
        0x5d => Some(2),
        0x36 => Some(4),
        0x1a => Some(8),
        0x0e => Some(16),
        0x06 => Some(30),
        0x00 => Some(1),
        _ => None,
    }
}

/// ADSR envelope generator of one voice
#[derive(Debug, Clone)]
pub struct EnvelopeGenerator {
    state: EnvelopeState,
    gate: bool,
    attack: u8,
    decay: u8,
    sustain: u8,
    release: u8,

    level: u8,
    rate_counter: u16,
    rate_period: u16,
    exponential_counter: u8,
    exponential_period: u8,
    hold_zero: bool,
}

impl Default for EnvelopeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvelopeGenerator {
    /// Create an envelope generator in its power-on state
    pub fn new() -> Self {
        EnvelopeGenerator {
            state: EnvelopeState::Release,
            gate: false,
            attack: 0,
            decay: 0,
            sustain: 0,
            release: 0,
            level: 0,
            rate_counter: 0,
            rate_period: RATE_COUNTER_PERIOD[0],
            exponential_counter: 0,
            exponential_period: 1,
            hold_zero: true,
        }
    }

    /// Reset to power-on state
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Write the control register; only the gate bit is used
    pub fn set_control(&mut self, value: u8) {
        let gate_next = value & 0x01 != 0;
        if !self.gate && gate_next {
            // Attack restarts from the current level.
            self.state = EnvelopeState::Attack;
            self.rate_period = RATE_COUNTER_PERIOD[usize::from(self.attack)];
            self.hold_zero = false;
        } else if self.gate && !gate_next {
            self.state = EnvelopeState::Release;
            self.rate_period = RATE_COUNTER_PERIOD[usize::from(self.release)];
        }
        self.gate = gate_next;
    }

    /// Write the attack/decay register
    pub fn set_attack_decay(&mut self, value: u8) {
        self.attack = (value >> 4) & 0x0f;
        self.decay = value & 0x0f;
        match self.state {
            EnvelopeState::Attack => {
                self.rate_period = RATE_COUNTER_PERIOD[usize::from(self.attack)];
            }
            EnvelopeState::DecaySustain => {
                self.rate_period = RATE_COUNTER_PERIOD[usize::from(self.decay)];
            }
            EnvelopeState::Release => {}
        }
    }

    /// Write the sustain/release register
    pub fn set_sustain_release(&mut self, value: u8) {
        self.sustain = (value >> 4) & 0x0f;
        self.release = value & 0x0f;
        if self.state == EnvelopeState::Release {
            self.rate_period = RATE_COUNTER_PERIOD[usize::from(self.release)];
        }
    }

    /// Advance by one cycle
    #[inline]
    pub fn clock(&mut self) {
        self.rate_counter += 1;
        if self.rate_counter & RATE_COUNTER_WRAP != 0 {
            self.rate_counter = (self.rate_counter + 1) & (RATE_COUNTER_WRAP - 1);
        }
        if self.rate_counter != self.rate_period {
            return;
        }
        self.rate_counter = 0;

        // Attack bypasses the exponential counter.
        self.exponential_counter += 1;
        if self.state != EnvelopeState::Attack
            && self.exponential_counter != self.exponential_period
        {
            return;
        }
        self.exponential_counter = 0;

        if self.hold_zero {
            return;
        }

        match self.state {
            EnvelopeState::Attack => {
                self.level = self.level.wrapping_add(1);
                if self.level == 0xff {
                    self.state = EnvelopeState::DecaySustain;
                    self.rate_period = RATE_COUNTER_PERIOD[usize::from(self.decay)];
                }
            }
            EnvelopeState::DecaySustain => {
                if self.level != SUSTAIN_LEVEL[usize::from(self.sustain)] {
                    self.level = self.level.wrapping_sub(1);
                }
            }
            EnvelopeState::Release => {
                self.level = self.level.wrapping_sub(1);
            }
        }

        if let Some(period) = exponential_period(self.level) {
            self.exponential_period = period;
            if self.level == 0 {
                self.hold_zero = true;
            }
        }
    }

    /// Current 8-bit level
    #[inline]
    pub fn level(&self) -> u8 {
        self.level
    }

    /// ENV3 register view of the level
    #[inline]
    pub fn read_env(&self) -> u8 {
        self.level
    }

    /// Current stage
    pub fn state(&self) -> EnvelopeState {
        self.state
    }
}
