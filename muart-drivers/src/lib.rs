//! Multi-UART bridge drivers
//!
//! This crate drives a four-channel SPI-to-UART bridge and the peripherals
//! attached to it:
//!
//! - [`bridge`] - Command protocol over SPI ([`bridge::MultiUart`]) and
//!   mutex-guarded sharing between several users
//! - [`channel`] - Per-channel byte stream ([`channel::UartChannel`])
//! - [`sensor`] - Peripheral drivers that consume a byte stream
//!   (A02YYUW ultrasonic distance sensor)
//! - [`config`] - Setup configuration for channels and sensors
//!
//! ```text
//! DistanceSensor ──▶ UartChannel ──▶ MultiUart ──▶ SPI bus + CS ──▶ bridge
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// Must stay first so the logging macros are visible to every module
mod fmt;

pub mod bridge;
pub mod channel;
pub mod config;
pub mod sensor;

#[cfg(test)]
mod mock;

pub use bridge::{MultiUart, SharedBridge, SharedBridgeError, SharedBridgeExt, UartBridge};
pub use channel::UartChannel;
pub use config::{configure_channels, BridgeConfig, ChannelConfig, ConfigError, SensorConfig};
pub use sensor::a02yyuw::{DistanceSensor, FrameStatus, OutputMode, ReadResult};
