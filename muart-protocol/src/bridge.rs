//! Bridge command set
//!
//! Command byte format:
//! - bits 7..4: opcode
//! - bits 3..2: zero
//! - bits 1..0: channel index
//!
//! Payload per opcode (all inside one chip-select bracket):
//! - RX depth / TX depth: one read byte (queue depth)
//! - Receive: length byte, then `length` read bytes
//! - Transmit: length byte, then `length` written bytes
//! - Set baud: baud code byte, then [`BAUD_SETTLE_MS`] before the next use

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of UART channels on one bridge
pub const CHANNEL_COUNT: u8 = 4;

/// Settling time after a baud change (the bridge writes it to flash)
pub const BAUD_SETTLE_MS: u32 = 20;

/// Largest payload one receive/transmit command can carry
pub const MAX_TRANSFER_LEN: usize = u8::MAX as usize;

const CHANNEL_MASK: u8 = 0x03;
const OPCODE_MASK: u8 = 0xF0;

/// A valid channel index (0-3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Channel(u8);

impl Channel {
    pub const CH0: Channel = Channel(0);
    pub const CH1: Channel = Channel(1);
    pub const CH2: Channel = Channel(2);
    pub const CH3: Channel = Channel(3);

    /// All channels in index order
    pub const ALL: [Channel; CHANNEL_COUNT as usize] =
        [Self::CH0, Self::CH1, Self::CH2, Self::CH3];

    /// Validate a raw index; anything from 4 upwards is not a channel
    pub const fn new(index: u8) -> Option<Self> {
        if index < CHANNEL_COUNT {
            Some(Channel(index))
        } else {
            None
        }
    }

    /// The raw index (0-3)
    pub const fn index(self) -> u8 {
        self.0
    }
}

/// Bridge opcodes (high nibble of the command byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Opcode {
    /// Query number of bytes in the receive queue
    RxDepth = 0x10,
    /// Dequeue received bytes
    Receive = 0x20,
    /// Query number of bytes in the transmit queue
    TxDepth = 0x30,
    /// Enqueue bytes for transmission
    Transmit = 0x40,
    /// Change the channel line rate
    SetBaud = 0x80,
}

impl Opcode {
    /// Decode the high nibble of a command byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value & OPCODE_MASK {
            0x10 => Some(Opcode::RxDepth),
            0x20 => Some(Opcode::Receive),
            0x30 => Some(Opcode::TxDepth),
            0x40 => Some(Opcode::Transmit),
            0x80 => Some(Opcode::SetBaud),
            _ => None,
        }
    }

    /// Whether a length byte follows the command byte
    pub fn has_length(self) -> bool {
        matches!(self, Opcode::Receive | Opcode::Transmit)
    }
}

/// A command addressed to one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Command {
    pub opcode: Opcode,
    pub channel: Channel,
}

impl Command {
    pub const fn new(opcode: Opcode, channel: Channel) -> Self {
        Self { opcode, channel }
    }

    /// Encode as the command byte sent first in the exchange
    pub const fn to_byte(self) -> u8 {
        self.opcode as u8 | self.channel.index()
    }

    /// Decode a command byte
    ///
    /// Returns `None` for unknown opcodes or when the reserved bits are set.
    pub fn from_byte(byte: u8) -> Option<Self> {
        if byte & !(OPCODE_MASK | CHANNEL_MASK) != 0 {
            return None;
        }
        let opcode = Opcode::from_u8(byte)?;
        let channel = Channel::new(byte & CHANNEL_MASK)?;
        Some(Self { opcode, channel })
    }
}

/// Line rates supported by the bridge, keyed by their wire code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "u32", into = "u32"))]
#[repr(u8)]
pub enum BaudRate {
    Baud1200 = 0,
    Baud2400 = 1,
    Baud4800 = 2,
    #[default]
    Baud9600 = 3,
    Baud19200 = 4,
    Baud38400 = 5,
    Baud57600 = 6,
    Baud115200 = 7,
    /// MIDI rate
    Baud31250 = 8,
    Baud62500 = 9,
}

impl BaudRate {
    /// Wire code sent after the set-baud command
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decode a wire code; the bridge only accepts 0-9
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(BaudRate::Baud1200),
            1 => Some(BaudRate::Baud2400),
            2 => Some(BaudRate::Baud4800),
            3 => Some(BaudRate::Baud9600),
            4 => Some(BaudRate::Baud19200),
            5 => Some(BaudRate::Baud38400),
            6 => Some(BaudRate::Baud57600),
            7 => Some(BaudRate::Baud115200),
            8 => Some(BaudRate::Baud31250),
            9 => Some(BaudRate::Baud62500),
            _ => None,
        }
    }

    /// Line rate in bits per second
    pub const fn bps(self) -> u32 {
        match self {
            BaudRate::Baud1200 => 1_200,
            BaudRate::Baud2400 => 2_400,
            BaudRate::Baud4800 => 4_800,
            BaudRate::Baud9600 => 9_600,
            BaudRate::Baud19200 => 19_200,
            BaudRate::Baud38400 => 38_400,
            BaudRate::Baud57600 => 57_600,
            BaudRate::Baud115200 => 115_200,
            BaudRate::Baud31250 => 31_250,
            BaudRate::Baud62500 => 62_500,
        }
    }

    /// Map a requested rate to a supported one
    ///
    /// Unsupported rates fall back to 9600, the most common default for
    /// serial peripherals.
    pub fn from_bps(bps: u32) -> Self {
        match bps {
            1_200 => BaudRate::Baud1200,
            2_400 => BaudRate::Baud2400,
            4_800 => BaudRate::Baud4800,
            19_200 => BaudRate::Baud19200,
            38_400 => BaudRate::Baud38400,
            57_600 => BaudRate::Baud57600,
            115_200 => BaudRate::Baud115200,
            31_250 => BaudRate::Baud31250,
            62_500 => BaudRate::Baud62500,
            _ => BaudRate::Baud9600,
        }
    }
}

impl From<u32> for BaudRate {
    fn from(bps: u32) -> Self {
        Self::from_bps(bps)
    }
}

impl From<BaudRate> for u32 {
    fn from(baud: BaudRate) -> Self {
        baud.bps()
    }
}
