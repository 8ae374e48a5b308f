//! A02YYUW measurement packet
//!
//! Packet format:
//! - HEADER (1 byte): 0xFF
//! - DIST_HI (1 byte): distance high byte
//! - DIST_LO (1 byte): distance low byte
//! - CHECKSUM (1 byte): (HEADER + DIST_HI + DIST_LO) & 0xFF
//!
//! Distance is in millimetres, big-endian. The sensor cannot resolve
//! anything closer than [`LOWER_LIMIT_MM`], so smaller values are reported
//! as the limit.

/// Packet synchronization byte
pub const HEADER_BYTE: u8 = 0xFF;

/// Complete packet size in bytes
pub const PACKET_SIZE: usize = 4;

/// Closest distance the sensor reports
pub const LOWER_LIMIT_MM: u16 = 30;

/// Errors from packet validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketError {
    /// First byte is not [`HEADER_BYTE`]
    InvalidHeader,
    /// Checksum byte does not match the sum of the first three bytes
    ChecksumMismatch,
}

/// A raw 4-byte sensor packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Packet([u8; PACKET_SIZE]);

impl Packet {
    /// Wrap raw bytes as received
    pub const fn from_bytes(bytes: [u8; PACKET_SIZE]) -> Self {
        Self(bytes)
    }

    /// Build a valid packet carrying `distance_mm`
    pub fn encode(distance_mm: u16) -> Self {
        let [hi, lo] = distance_mm.to_be_bytes();
        Self([HEADER_BYTE, hi, lo, checksum(HEADER_BYTE, hi, lo)])
    }

    /// Raw bytes in wire order
    pub const fn as_bytes(&self) -> &[u8; PACKET_SIZE] {
        &self.0
    }

    /// Checksum byte as transmitted
    pub const fn checksum(&self) -> u8 {
        self.0[3]
    }

    /// Distance field without validation or clamping
    pub const fn raw_distance(&self) -> u16 {
        u16::from_be_bytes([self.0[1], self.0[2]])
    }

    /// Validate the packet and return the clamped distance in millimetres
    pub fn decode(&self) -> Result<u16, PacketError> {
        let [header, hi, lo, sum] = self.0;

        if header != HEADER_BYTE {
            return Err(PacketError::InvalidHeader);
        }

        if checksum(header, hi, lo) != sum {
            return Err(PacketError::ChecksumMismatch);
        }

        Ok(self.raw_distance().max(LOWER_LIMIT_MM))
    }
}

/// Packet checksum: byte sum modulo 256
pub fn checksum(header: u8, hi: u8, lo: u8) -> u8 {
    header.wrapping_add(hi).wrapping_add(lo)
}
