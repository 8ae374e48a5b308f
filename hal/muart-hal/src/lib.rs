//! muart Hardware Abstraction Layer
//!
//! This crate defines the small set of hardware traits the bridge and sensor
//! drivers are written against. Boards either implement them directly or
//! wrap their `embedded-hal` 1.0 peripherals with the adapters in [`adapter`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  muart-drivers (bridge, channel, sensor)│
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  muart-hal (this crate - traits)        │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  embedded-hal 1.0 / board HAL           │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::OutputPin`] - Digital output (chip select, sensor mode select)
//! - [`spi::SpiBus`] - Full-duplex byte exchange on the shared bus
//! - [`time::Clock`], [`time::Delay`] - Millisecond time base and blocking waits
//! - [`stream::ByteStream`] - Byte-oriented serial stream

#![no_std]
#![deny(unsafe_code)]

pub mod adapter;
pub mod gpio;
pub mod spi;
pub mod stream;
pub mod time;

// Re-export key traits at crate root for convenience
pub use gpio::OutputPin;
pub use spi::SpiBus;
pub use stream::ByteStream;
pub use time::{Clock, Delay};
