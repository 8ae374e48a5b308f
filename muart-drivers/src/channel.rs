//! Single bridge channel as a byte stream
//!
//! [`UartChannel`] pins a bridge handle to one channel index so that serial
//! peripheral drivers can be written against [`ByteStream`] and never see the
//! shared bus. Several channels can share one bridge through a
//! [`crate::SharedBridge`] reference.
//!
//! The bridge has no way to return a dequeued byte to its FIFO, so lookahead
//! is not supported: [`ByteStream::peek`] always returns `None`.

use muart_hal::ByteStream;
use muart_protocol::BaudRate;

use crate::bridge::UartBridge;

/// One UART channel of a multi-UART bridge
///
/// An index from 4 upwards is accepted but every operation on it is a no-op,
/// the same as on the bridge itself.
pub struct UartChannel<B> {
    bridge: B,
    channel: u8,
}

impl<B: UartBridge> UartChannel<B> {
    /// Bind `bridge` to `channel`
    pub fn new(bridge: B, channel: u8) -> Self {
        Self { bridge, channel }
    }

    /// Channel index this stream talks to
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// The underlying bridge handle
    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    /// Mutable access to the underlying bridge handle
    pub fn bridge_mut(&mut self) -> &mut B {
        &mut self.bridge
    }

    /// Release the bridge handle
    pub fn free(self) -> B {
        self.bridge
    }

    /// Configure the channel's line rate
    ///
    /// Unsupported rates fall back to 9600. Blocks for the bridge's settling
    /// time. Returns the rate the request maps to; on an out-of-range channel
    /// that rate is returned without anything being sent.
    pub fn set_baud_rate(&mut self, bps: u32) -> Result<BaudRate, B::Error> {
        let baud = BaudRate::from_bps(bps);
        self.bridge.set_baud(self.channel, baud)?;
        Ok(baud)
    }

    /// Number of bytes still waiting in the transmit queue
    pub fn tx_depth(&mut self) -> Result<u8, B::Error> {
        self.bridge.tx_depth(self.channel)
    }

    /// Busy-wait until the transmit queue has drained
    pub fn flush(&mut self) -> Result<(), B::Error> {
        while self.bridge.tx_depth(self.channel)? > 0 {}
        Ok(())
    }
}

impl<B: UartBridge> ByteStream for UartChannel<B> {
    type Error = B::Error;

    fn available(&mut self) -> Result<usize, Self::Error> {
        self.bridge.rx_depth(self.channel).map(usize::from)
    }

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        self.bridge.receive_byte(self.channel)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.bridge.receive_into(self.channel, buf)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.bridge.transmit_byte(self.channel, byte)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        self.bridge.transmit(self.channel, data)?;
        Ok(data.len())
    }

    /// Always `None`: a byte read from the bridge cannot be put back
    fn peek(&mut self) -> Option<u8> {
        None
    }
}
