//! Bridge setup configuration
//!
//! Describes how the bridge's SPI link and its channels are set up at boot.
//! With the `serde` feature these types can be loaded from a board config
//! file or stored as postcard binary data.

use heapless::Vec;
use muart_hal::spi::{Mode, SpiConfig};
use muart_protocol::{BaudRate, CHANNEL_COUNT};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bridge::UartBridge;
use crate::sensor::OutputMode;

/// Maximum channel entries per bridge
pub const MAX_CHANNELS: usize = CHANNEL_COUNT as usize;

/// Bridge SPI clock: 16 MHz system clock / 64
pub const BRIDGE_SPI_FREQUENCY_HZ: u32 = 250_000;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Channel index is not below [`CHANNEL_COUNT`]
    ChannelOutOfRange(u8),
    /// Two entries configure the same channel
    DuplicateChannel(u8),
    /// More entries than the bridge has channels
    TooManyChannels,
}

/// Sensor attached to a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorConfig {
    /// Output mode driven on the sensor's mode pin
    #[cfg_attr(feature = "serde", serde(default))]
    pub mode: OutputMode,
}

/// One bridge channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelConfig {
    /// Channel index (0-3)
    pub index: u8,
    /// Line rate, in bits per second when serialized
    #[cfg_attr(feature = "serde", serde(default))]
    pub baud: BaudRate,
    /// Distance sensor on this channel, if any
    #[cfg_attr(feature = "serde", serde(default))]
    pub sensor: Option<SensorConfig>,
}

impl ChannelConfig {
    pub fn new(index: u8, baud: BaudRate) -> Self {
        Self {
            index,
            baud,
            sensor: None,
        }
    }

    /// Attach a distance sensor running in `mode`
    pub fn with_sensor(mut self, mode: OutputMode) -> Self {
        self.sensor = Some(SensorConfig { mode });
        self
    }
}

/// Complete bridge configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BridgeConfig {
    /// SPI link settings
    #[cfg_attr(feature = "serde", serde(default = "default_spi"))]
    pub spi: SpiConfig,
    /// Channel setup, at most one entry per channel
    #[cfg_attr(feature = "serde", serde(default))]
    pub channels: Vec<ChannelConfig, MAX_CHANNELS>,
}

fn default_spi() -> SpiConfig {
    SpiConfig::from_mode(Mode::Mode0, BRIDGE_SPI_FREQUENCY_HZ)
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            spi: default_spi(),
            channels: Vec::new(),
        }
    }
}

impl BridgeConfig {
    /// Add a channel entry, rejecting bad or repeated indices
    pub fn add_channel(&mut self, channel: ChannelConfig) -> Result<(), ConfigError> {
        check_index(channel.index)?;
        if self.channel(channel.index).is_some() {
            return Err(ConfigError::DuplicateChannel(channel.index));
        }
        self.channels
            .push(channel)
            .map_err(|_| ConfigError::TooManyChannels)
    }

    /// Entry for a channel index
    pub fn channel(&self, index: u8) -> Option<&ChannelConfig> {
        self.channels.iter().find(|c| c.index == index)
    }

    /// Check a configuration built by hand or deserialized
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels.len() > MAX_CHANNELS {
            return Err(ConfigError::TooManyChannels);
        }
        for (i, channel) in self.channels.iter().enumerate() {
            check_index(channel.index)?;
            if self.channels[..i].iter().any(|c| c.index == channel.index) {
                return Err(ConfigError::DuplicateChannel(channel.index));
            }
        }
        Ok(())
    }

    /// Decode a configuration stored as postcard bytes
    #[cfg(feature = "serde")]
    pub fn from_postcard(bytes: &[u8]) -> postcard::Result<Self> {
        postcard::from_bytes(bytes)
    }

    /// Encode into `buf`, returning the used prefix
    #[cfg(feature = "serde")]
    pub fn to_postcard<'a>(&self, buf: &'a mut [u8]) -> postcard::Result<&'a mut [u8]> {
        postcard::to_slice(self, buf)
    }
}

fn check_index(index: u8) -> Result<(), ConfigError> {
    if index < CHANNEL_COUNT {
        Ok(())
    } else {
        Err(ConfigError::ChannelOutOfRange(index))
    }
}

/// Apply every channel's line rate
///
/// Each change blocks for the bridge's settling time. Entries with an
/// out-of-range index are skipped by the bridge; run
/// [`BridgeConfig::validate`] first to catch them.
pub fn configure_channels<B: UartBridge>(
    bridge: &mut B,
    config: &BridgeConfig,
) -> Result<(), B::Error> {
    for channel in &config.channels {
        debug!("config: channel {} at {} bps", channel.index, channel.baud.bps());
        bridge.set_baud(channel.index, channel.baud)?;
    }
    Ok(())
}
