//! SID Register Definitions
//!
//! The chip exposes 25 write-only registers (0x00-0x18) and four read-only
//! registers (0x19-0x1C). Each voice owns seven consecutive registers; the
//! filter and volume controls follow at 0x15.

use std::fmt;

use bitflags::bitflags;

/// Number of writable registers
pub const WRITABLE_REGISTERS: usize = 0x19;

/// Width masks of the writable registers
///
/// PW_HI carries the top 4 bits of a 12-bit pulse width and FC_LO the bottom
/// 3 bits of the 11-bit cutoff; every other register uses all 8 bits.
const REGISTER_MASKS: [u8; WRITABLE_REGISTERS] = [
    0xff, 0xff, 0xff, 0x0f, 0xff, 0xff, 0xff, // voice 1
    0xff, 0xff, 0xff, 0x0f, 0xff, 0xff, 0xff, // voice 2
    0xff, 0xff, 0xff, 0x0f, 0xff, 0xff, 0xff, // voice 3
    0x07, 0xff, 0xff, 0xff, // filter
];

/// SID Register Address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Voice 1 frequency (low byte)
    Freq1Lo = 0x00,
    /// Voice 1 frequency (high byte)
    Freq1Hi = 0x01,
    /// Voice 1 pulse width (low byte)
    Pw1Lo = 0x02,
    /// Voice 1 pulse width (high nybble)
    Pw1Hi = 0x03,
    /// Voice 1 control
    Control1 = 0x04,
    /// Voice 1 attack/decay
    AttackDecay1 = 0x05,
    /// Voice 1 sustain/release
    SustainRelease1 = 0x06,
    /// Voice 2 frequency (low byte)
    Freq2Lo = 0x07,
    /// Voice 2 frequency (high byte)
    Freq2Hi = 0x08,
    /// Voice 2 pulse width (low byte)
    Pw2Lo = 0x09,
    /// Voice 2 pulse width (high nybble)
    Pw2Hi = 0x0A,
    /// Voice 2 control
    Control2 = 0x0B,
    /// Voice 2 attack/decay
    AttackDecay2 = 0x0C,
    /// Voice 2 sustain/release
    SustainRelease2 = 0x0D,
    /// Voice 3 frequency (low byte)
    Freq3Lo = 0x0E,
    /// Voice 3 frequency (high byte)
    Freq3Hi = 0x0F,
    /// Voice 3 pulse width (low byte)
    Pw3Lo = 0x10,
    /// Voice 3 pulse width (high nybble)
    Pw3Hi = 0x11,
    /// Voice 3 control
    Control3 = 0x12,
    /// Voice 3 attack/decay
    AttackDecay3 = 0x13,
    /// Voice 3 sustain/release
    SustainRelease3 = 0x14,
    /// Filter cutoff (low 3 bits)
    FcLo = 0x15,
    /// Filter cutoff (high byte)
    FcHi = 0x16,
    /// Resonance and filter routing
    ResFilt = 0x17,
    /// Filter mode, voice 3 off and volume
    ModeVol = 0x18,
    /// Paddle X (read-only)
    PotX = 0x19,
    /// Paddle Y (read-only)
    PotY = 0x1A,
    /// Voice 3 waveform output (read-only)
    Osc3 = 0x1B,
    /// Voice 3 envelope level (read-only)
    Env3 = 0x1C,
}

/// Per-voice register within a voice's seven-register block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceRegister {
    /// Frequency low byte
    FreqLo,
    /// Frequency high byte
    FreqHi,
    /// Pulse width low byte
    PwLo,
    /// Pulse width high nybble
    PwHi,
    /// Control register
    Control,
    /// Attack/decay
    AttackDecay,
    /// Sustain/release
    SustainRelease,
}

impl Register {
    /// Convert a raw register number (0x00-0x1C) to Register enum
    pub fn from_addr(addr: u8) -> Option<Self> {
        use Register::*;
        const ALL: [Register; 0x1D] = [
            Freq1Lo, Freq1Hi, Pw1Lo, Pw1Hi, Control1, AttackDecay1, SustainRelease1, Freq2Lo,
            Freq2Hi, Pw2Lo, Pw2Hi, Control2, AttackDecay2, SustainRelease2, Freq3Lo, Freq3Hi,
            Pw3Lo, Pw3Hi, Control3, AttackDecay3, SustainRelease3, FcLo, FcHi, ResFilt, ModeVol,
            PotX, PotY, Osc3, Env3,
        ];
        ALL.get(addr as usize).copied()
    }

    /// Get the register address value
    pub fn addr(&self) -> u8 {
        *self as u8
    }

    /// Whether the register accepts writes
    pub fn is_writable(&self) -> bool {
        (self.addr() as usize) < WRITABLE_REGISTERS
    }

    /// Bit mask of the register's field
    pub fn mask(&self) -> u8 {
        REGISTER_MASKS.get(self.addr() as usize).copied().unwrap_or(0xff)
    }

    /// Split a voice register into (voice index, register within the voice)
    pub fn voice_register(&self) -> Option<(usize, VoiceRegister)> {
        let addr = self.addr() as usize;
        if addr >= 21 {
            return None;
        }
        let reg = match addr % 7 {
            0 => VoiceRegister::FreqLo,
            1 => VoiceRegister::FreqHi,
            2 => VoiceRegister::PwLo,
            3 => VoiceRegister::PwHi,
            4 => VoiceRegister::Control,
            5 => VoiceRegister::AttackDecay,
            _ => VoiceRegister::SustainRelease,
        };
        Some((addr / 7, reg))
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Register::Freq1Lo => "FREQ1_LO",
            Register::Freq1Hi => "FREQ1_HI",
            Register::Pw1Lo => "PW1_LO",
            Register::Pw1Hi => "PW1_HI",
            Register::Control1 => "CR1",
            Register::AttackDecay1 => "AD1",
            Register::SustainRelease1 => "SR1",
            Register::Freq2Lo => "FREQ2_LO",
            Register::Freq2Hi => "FREQ2_HI",
            Register::Pw2Lo => "PW2_LO",
            Register::Pw2Hi => "PW2_HI",
            Register::Control2 => "CR2",
            Register::AttackDecay2 => "AD2",
            Register::SustainRelease2 => "SR2",
            Register::Freq3Lo => "FREQ3_LO",
            Register::Freq3Hi => "FREQ3_HI",
            Register::Pw3Lo => "PW3_LO",
            Register::Pw3Hi => "PW3_HI",
            Register::Control3 => "CR3",
            Register::AttackDecay3 => "AD3",
            Register::SustainRelease3 => "SR3",
            Register::FcLo => "FC_LO",
            Register::FcHi => "FC_HI",
            Register::ResFilt => "RES_FILT",
            Register::ModeVol => "MODE_VOL",
            Register::PotX => "POTX",
            Register::PotY => "POTY",
            Register::Osc3 => "OSC3",
            Register::Env3 => "ENV3",
        };
        write!(f, "${:02X} ({})", self.addr(), name)
    }
}

bitflags! {
    /// Voice control register bitflags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControlFlags: u8 {
        /// Envelope gate
        const GATE = 0x01;
        /// Hard sync to the previous voice
        const SYNC = 0x02;
        /// Ring modulation by the previous voice
        const RING_MOD = 0x04;
        /// Test bit: holds the accumulator at zero
        const TEST = 0x08;
        /// Triangle waveform
        const TRIANGLE = 0x10;
        /// Sawtooth waveform
        const SAWTOOTH = 0x20;
        /// Pulse waveform
        const PULSE = 0x40;
        /// Noise waveform
        const NOISE = 0x80;
    }
}

impl ControlFlags {
    /// Create control flags from raw register value
    pub fn from_register(value: u8) -> Self {
        ControlFlags::from_bits_truncate(value)
    }

    /// Waveform selector (bits 4-7) as a 4-bit number
    pub fn waveform(&self) -> u8 {
        self.bits() >> 4
    }
}

bitflags! {
    /// Filter routing bits (RES_FILT low nybble)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FilterRouting: u8 {
        /// Voice 1 through the filter
        const VOICE1 = 0x01;
        /// Voice 2 through the filter
        const VOICE2 = 0x02;
        /// Voice 3 through the filter
        const VOICE3 = 0x04;
        /// External input through the filter
        const EXT_IN = 0x08;
    }
}

impl FilterRouting {
    /// Whether voice `index` (0-2) is routed to the filter
    pub fn routes_voice(&self, index: usize) -> bool {
        self.bits() & (1 << index) != 0
    }
}

bitflags! {
    /// Filter mode bits (MODE_VOL high nybble)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FilterMode: u8 {
        /// Lowpass output
        const LOWPASS = 0x10;
        /// Bandpass output
        const BANDPASS = 0x20;
        /// Highpass output
        const HIGHPASS = 0x40;
        /// Disconnect voice 3 from the output when not filtered
        const VOICE3_OFF = 0x80;
    }
}

/// Register mirror of the writable registers
///
/// Stores every write masked to its field width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterFile {
    registers: [u8; WRITABLE_REGISTERS],
}

impl RegisterFile {
    /// Create a register file with all values set to 0
    pub fn new() -> Self {
        RegisterFile {
            registers: [0; WRITABLE_REGISTERS],
        }
    }

    /// Store a value, masked to the field width
    ///
    /// Returns the decoded register, or `None` when the address is not
    /// writable (the write is ignored).
    pub fn write(&mut self, addr: u8, value: u8) -> Option<(Register, u8)> {
        let register = Register::from_addr(addr).filter(Register::is_writable)?;
        let masked = value & register.mask();
        self.registers[addr as usize] = masked;
        Some((register, masked))
    }

    /// Last value written to a writable register
    pub fn read(&self, addr: u8) -> Option<u8> {
        self.registers.get(addr as usize).copied()
    }

    /// Get all registers as a slice
    pub fn as_slice(&self) -> &[u8; WRITABLE_REGISTERS] {
        &self.registers
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}
