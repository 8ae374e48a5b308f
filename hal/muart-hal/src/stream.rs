//! Byte-stream abstraction
//!
//! The capability set a serial peripheral driver needs from whatever carries
//! its bytes: a bridge channel, a native UART, or a test buffer.
//!
//! # Lookahead
//!
//! Streams backed by a remote FIFO cannot put a byte back once it has been
//! dequeued, so [`ByteStream::peek`] is not emulated. Its default returns
//! `None`, and anything that would be built on lookahead (token scanning,
//! number parsing) is unavailable on such streams.

/// Byte-oriented serial stream
pub trait ByteStream {
    /// Error type for the underlying transport
    type Error;

    /// Number of received bytes waiting to be read
    fn available(&mut self) -> Result<usize, Self::Error>;

    /// Read a single byte
    ///
    /// Callers should check [`ByteStream::available`] first; reading from an
    /// empty stream returns whatever the transport produces.
    fn read_byte(&mut self) -> Result<u8, Self::Error>;

    /// Fill `buf` completely
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        for slot in buf.iter_mut() {
            *slot = self.read_byte()?;
        }
        Ok(())
    }

    /// Queue a single byte for transmission
    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Queue `data` for transmission, returning the number of bytes queued
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        for &byte in data {
            self.write_byte(byte)?;
        }
        Ok(data.len())
    }

    /// Look at the next byte without consuming it
    ///
    /// Returns `None` when the stream has no lookahead support, which is the
    /// default. See the module documentation.
    fn peek(&mut self) -> Option<u8> {
        None
    }
}

impl<S: ByteStream + ?Sized> ByteStream for &mut S {
    type Error = S::Error;

    fn available(&mut self) -> Result<usize, Self::Error> {
        (**self).available()
    }

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        (**self).read_byte()
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read_bytes(buf)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        (**self).write_byte(byte)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        (**self).write_bytes(data)
    }

    fn peek(&mut self) -> Option<u8> {
        (**self).peek()
    }
}
