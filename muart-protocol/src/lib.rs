//! Multi-UART bridge and A02YYUW sensor wire formats
//!
//! This crate holds the byte-level definitions shared by the drivers: the
//! SPI command set of the four-channel UART bridge and the 4-byte measurement
//! packet of the A02YYUW ultrasonic distance sensor. Nothing here touches
//! hardware.
//!
//! # Bridge command
//!
//! Every bridge exchange starts with one command byte:
//! ```text
//! ┌────────┬────────┬─────────┐
//! │ OPCODE │ 0 0    │ CHANNEL │
//! │ 4 bits │ 2 bits │ 2 bits  │
//! └────────┴────────┴─────────┘
//! ```
//!
//! # Sensor packet
//!
//! ```text
//! ┌────────┬─────────┬─────────┬──────────┐
//! │ HEADER │ DIST_HI │ DIST_LO │ CHECKSUM │
//! │ 0xFF   │ 1B      │ 1B      │ 1B       │
//! └────────┴─────────┴─────────┴──────────┘
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod bridge;
pub mod packet;

pub use bridge::{
    BaudRate, Channel, Command, Opcode, BAUD_SETTLE_MS, CHANNEL_COUNT, MAX_TRANSFER_LEN,
};
pub use packet::{Packet, PacketError, HEADER_BYTE, LOWER_LIMIT_MM, PACKET_SIZE};
