//! A02YYUW ultrasonic distance sensor (UART output)
//!
//! The sensor streams 4-byte packets at 9600 baud (see
//! [`muart_protocol::packet`]). A mode-select input chooses between two
//! output flavours:
//!
//! - Processed (pin high or floating): filtered, updates every 100-300 ms
//! - Real-time (pin low): unfiltered, updates every ~100 ms
//!
//! # Reading
//!
//! [`DistanceSensor::read_distance`] is meant to be polled from a main loop.
//! It throttles itself to one attempt per [`READ_INTERVAL_MS`], and each
//! attempt consumes at most one packet:
//!
//! 1. Fewer than 4 bytes buffered: [`FrameStatus::TooShort`], nothing read
//! 2. Bytes are discarded until the 0xFF header; none found:
//!    [`FrameStatus::HeaderNotFound`]
//! 3. Fewer than 3 bytes after the header: [`FrameStatus::Incomplete`]
//! 4. Otherwise the packet is checksummed and decoded
//!
//! Bytes dropped while hunting for the header are lost. That is how the
//! sensor protocol resynchronises.

use muart_hal::time::elapsed_ms;
use muart_hal::{ByteStream, Clock, OutputPin};
use muart_protocol::{Packet, PacketError, HEADER_BYTE, PACKET_SIZE};

/// Minimum time between read attempts
///
/// The sensor never produces packets faster than this.
pub const READ_INTERVAL_MS: u32 = 100;

/// Sensor output flavour, selected by the mode pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OutputMode {
    /// Filtered output, 100-300 ms update period (pin high)
    #[default]
    Processed,
    /// Raw output, ~100 ms update period (pin low)
    RealTime,
}

impl OutputMode {
    fn from_processed(processed: bool) -> Self {
        if processed {
            OutputMode::Processed
        } else {
            OutputMode::RealTime
        }
    }
}

/// Outcome of pulling one packet off the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameStatus {
    /// A full packet was read
    Complete,
    /// Fewer than a packet's worth of bytes were buffered
    TooShort,
    /// The buffered bytes ran out before a header byte
    HeaderNotFound,
    /// A header was found but the rest of the packet has not arrived
    Incomplete,
}

impl FrameStatus {
    /// Read result recorded for a failed acquisition
    ///
    /// `TooShort` just means "no new data yet" and leaves the previous
    /// result in place.
    fn failure_result(self) -> Option<ReadResult> {
        match self {
            FrameStatus::HeaderNotFound => Some(ReadResult::HeaderNotFound),
            FrameStatus::Incomplete => Some(ReadResult::IncompleteFrame),
            FrameStatus::Complete | FrameStatus::TooShort => None,
        }
    }
}

/// Result of the most recent read attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadResult {
    /// No packet has been processed yet
    #[default]
    Pending,
    /// A valid packet updated the distance
    Success,
    /// A packet arrived with a bad checksum; distance unchanged
    ChecksumMismatch,
    /// Buffered bytes held no header; they were discarded
    HeaderNotFound,
    /// Header found but the packet was cut short
    IncompleteFrame,
}

impl ReadResult {
    /// Whether the last attempt failed on a framing or checksum error
    ///
    /// Such failures are worth retrying on the next interval.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            ReadResult::ChecksumMismatch | ReadResult::HeaderNotFound | ReadResult::IncompleteFrame
        )
    }
}

/// A02YYUW reading session
///
/// Owns the sensor's byte stream, its mode-select pin and a clock handle.
pub struct DistanceSensor<S, P, C> {
    stream: S,
    mode_pin: P,
    clock: C,
    mode: OutputMode,
    distance_mm: Option<u16>,
    last_read_ms: Option<u32>,
    last_success_ms: Option<u32>,
    last_status: Option<FrameStatus>,
    last_result: ReadResult,
}

impl<S, P, C> DistanceSensor<S, P, C>
where
    S: ByteStream,
    P: OutputPin,
    C: Clock,
{
    /// Create a session and drive the mode pin for `mode`
    pub fn new(stream: S, mode_pin: P, clock: C, mode: OutputMode) -> Self {
        let mut sensor = Self {
            stream,
            mode_pin,
            clock,
            mode,
            distance_mm: None,
            last_read_ms: None,
            last_success_ms: None,
            last_status: None,
            last_result: ReadResult::Pending,
        };
        sensor.set_mode(mode);
        sensor
    }

    /// Select processed (`true`) or real-time (`false`) output
    ///
    /// The sensor switches on its own schedule; packets already buffered
    /// were produced in the old mode.
    pub fn set_processed(&mut self, processed: bool) {
        self.set_mode(OutputMode::from_processed(processed));
    }

    /// Select the output mode
    pub fn set_mode(&mut self, mode: OutputMode) {
        self.mode = mode;
        self.mode_pin.set_state(mode == OutputMode::Processed);
        debug!("a02yyuw: mode {}", mode);
    }

    /// Current output mode
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn is_processed(&self) -> bool {
        self.mode == OutputMode::Processed
    }

    /// Last successfully decoded distance in millimetres
    pub fn distance_mm(&self) -> Option<u16> {
        self.distance_mm
    }

    /// Clock time of the last read attempt
    pub fn last_read_ms(&self) -> Option<u32> {
        self.last_read_ms
    }

    /// Clock time of the last successful decode
    pub fn last_success_ms(&self) -> Option<u32> {
        self.last_success_ms
    }

    /// Frame acquisition outcome of the last attempt
    pub fn last_status(&self) -> Option<FrameStatus> {
        self.last_status
    }

    /// Result of the last attempt
    pub fn last_result(&self) -> ReadResult {
        self.last_result
    }

    /// The sensor's byte stream
    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Give back the stream, mode pin and clock
    pub fn release(self) -> (S, P, C) {
        (self.stream, self.mode_pin, self.clock)
    }

    /// Clock time from which the next call to [`Self::read_distance`]
    /// makes a fresh attempt, `None` before the first attempt
    pub fn next_attempt_ms(&self) -> Option<u32> {
        self.last_read_ms.map(|last| last.wrapping_add(READ_INTERVAL_MS))
    }

    /// Whether the next [`Self::read_distance`] call will read the stream
    pub fn is_due(&self) -> bool {
        self.is_due_at(self.clock.now_ms())
    }

    fn is_due_at(&self, now: u32) -> bool {
        match self.last_read_ms {
            Some(last) => elapsed_ms(now, last) >= READ_INTERVAL_MS,
            None => true,
        }
    }

    /// Poll the sensor for a new distance
    ///
    /// Within [`READ_INTERVAL_MS`] of the previous attempt this returns the
    /// stored result without touching the stream, so the returned value
    /// alone does not tell a throttled call from a fresh attempt. Check
    /// [`Self::is_due`] beforehand when that matters. Otherwise it makes one
    /// attempt and returns its result. Transport errors are passed through;
    /// the attempt still counts for throttling.
    pub fn read_distance(&mut self) -> Result<ReadResult, S::Error> {
        let now = self.clock.now_ms();
        if !self.is_due_at(now) {
            return Ok(self.last_result);
        }

        let attempt = self.acquire_frame();
        self.last_read_ms = Some(now);

        match attempt? {
            Ok(packet) => {
                self.last_status = Some(FrameStatus::Complete);
                self.last_result = self.process(packet, now);
            }
            Err(status) => {
                trace!("a02yyuw: no packet ({})", status);
                self.last_status = Some(status);
                if let Some(result) = status.failure_result() {
                    self.last_result = result;
                }
            }
        }

        Ok(self.last_result)
    }

    /// Pull one packet off the stream
    ///
    /// The outer `Result` carries transport errors, the inner one why no
    /// packet could be assembled.
    fn acquire_frame(&mut self) -> Result<Result<Packet, FrameStatus>, S::Error> {
        if self.stream.available()? < PACKET_SIZE {
            return Ok(Err(FrameStatus::TooShort));
        }

        let mut skipped = 0u32;
        loop {
            if self.stream.available()? == 0 {
                warn!("a02yyuw: no header in {} bytes", skipped);
                return Ok(Err(FrameStatus::HeaderNotFound));
            }
            if self.stream.read_byte()? == HEADER_BYTE {
                break;
            }
            skipped += 1;
        }

        if self.stream.available()? < PACKET_SIZE - 1 {
            return Ok(Err(FrameStatus::Incomplete));
        }

        let mut bytes = [HEADER_BYTE; PACKET_SIZE];
        self.stream.read_bytes(&mut bytes[1..])?;
        Ok(Ok(Packet::from_bytes(bytes)))
    }

    fn process(&mut self, packet: Packet, now: u32) -> ReadResult {
        match packet.decode() {
            Ok(distance) => {
                trace!("a02yyuw: {} mm", distance);
                self.distance_mm = Some(distance);
                self.last_success_ms = Some(now);
                ReadResult::Success
            }
            Err(PacketError::ChecksumMismatch) => {
                warn!(
                    "a02yyuw: checksum mismatch (got {=u8:#x})",
                    packet.checksum()
                );
                ReadResult::ChecksumMismatch
            }
            // Acquisition only assembles packets that start with the header
            Err(PacketError::InvalidHeader) => ReadResult::HeaderNotFound,
        }
    }
}
