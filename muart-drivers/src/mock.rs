//! Test doubles shared by the driver tests
//!
//! [`BridgeSim`] behaves like the bridge firmware on the far side of the
//! SPI bus: it decodes command brackets, serves per-channel receive queues
//! and collects transmitted bytes, while recording every byte it saw.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use muart_hal::spi::SpiBus;
use muart_hal::stream::ByteStream;
use muart_hal::{Clock, Delay, OutputPin};
use muart_protocol::{Command, Opcode, CHANNEL_COUNT};

const CHANNELS: usize = CHANNEL_COUNT as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

/// Where the simulated bridge is within the current bracket
#[derive(Debug, Clone, Copy)]
enum SimState {
    Idle,
    Depth(u8),
    Length(Command),
    Payload { command: Command, remaining: u8 },
    Baud(usize),
    Done,
}

pub struct BridgeSim {
    selected: Cell<bool>,
    state: Cell<SimState>,
    rx: RefCell<[VecDeque<u8>; CHANNELS]>,
    tx: RefCell<[Vec<u8>; CHANNELS]>,
    baud: RefCell<[Option<u8>; CHANNELS]>,
    brackets: RefCell<Vec<Vec<u8>>>,
    delays: RefCell<Vec<u32>>,
    exchanges: Cell<usize>,
    unselected_exchanges: Cell<usize>,
    fail_at: Cell<Option<usize>>,
    depth_override: Cell<Option<u8>>,
}

impl BridgeSim {
    pub fn new() -> Self {
        Self {
            selected: Cell::new(false),
            state: Cell::new(SimState::Idle),
            rx: RefCell::new(Default::default()),
            tx: RefCell::new(Default::default()),
            baud: RefCell::new([None; CHANNELS]),
            brackets: RefCell::new(Vec::new()),
            delays: RefCell::new(Vec::new()),
            exchanges: Cell::new(0),
            unselected_exchanges: Cell::new(0),
            fail_at: Cell::new(None),
            depth_override: Cell::new(None),
        }
    }

    /// Bytes arriving on a channel's UART
    pub fn push_rx(&self, channel: usize, data: &[u8]) {
        self.rx.borrow_mut()[channel].extend(data.iter().copied());
    }

    pub fn tx(&self, channel: usize) -> Vec<u8> {
        self.tx.borrow()[channel].clone()
    }

    /// Pretend the UART finished sending everything queued
    pub fn drain_tx(&self, channel: usize) {
        self.tx.borrow_mut()[channel].clear();
    }

    pub fn baud_code(&self, channel: usize) -> Option<u8> {
        self.baud.borrow()[channel]
    }

    pub fn brackets(&self) -> Vec<Vec<u8>> {
        self.brackets.borrow().clone()
    }

    pub fn delays(&self) -> Vec<u32> {
        self.delays.borrow().clone()
    }

    pub fn exchange_count(&self) -> usize {
        self.exchanges.get()
    }

    /// Bytes clocked while chip select was released
    pub fn unselected_exchanges(&self) -> usize {
        self.unselected_exchanges.get()
    }

    pub fn is_selected(&self) -> bool {
        self.selected.get()
    }

    /// Fail the exchange with this zero-based index
    pub fn fail_at_exchange(&self, index: Option<usize>) {
        self.fail_at.set(index);
    }

    /// Answer every depth query with this byte
    pub fn set_depth_override(&self, value: Option<u8>) {
        self.depth_override.set(value);
    }

    fn select(&self) {
        self.selected.set(true);
        self.state.set(SimState::Idle);
        self.brackets.borrow_mut().push(Vec::new());
    }

    fn deselect(&self) {
        self.selected.set(false);
        self.state.set(SimState::Idle);
    }

    fn exchange(&self, mosi: u8) -> Result<u8, MockError> {
        let index = self.exchanges.get();
        self.exchanges.set(index + 1);
        if self.fail_at.get() == Some(index) {
            return Err(MockError);
        }
        if !self.selected.get() {
            self.unselected_exchanges.set(self.unselected_exchanges.get() + 1);
            return Ok(0xFF);
        }
        if let Some(bracket) = self.brackets.borrow_mut().last_mut() {
            bracket.push(mosi);
        }

        let (miso, next) = match self.state.get() {
            SimState::Idle => match Command::from_byte(mosi) {
                Some(command) => {
                    let ch = command.channel.index() as usize;
                    let next = match command.opcode {
                        op if op.has_length() => SimState::Length(command),
                        Opcode::RxDepth => SimState::Depth(self.rx.borrow()[ch].len() as u8),
                        Opcode::TxDepth => SimState::Depth(self.tx.borrow()[ch].len() as u8),
                        Opcode::SetBaud => SimState::Baud(ch),
                        // Taken by the length guard above
                        Opcode::Receive | Opcode::Transmit => SimState::Done,
                    };
                    (0x00, next)
                }
                None => (0x00, SimState::Done),
            },
            SimState::Depth(depth) => (self.depth_override.get().unwrap_or(depth), SimState::Done),
            SimState::Length(command) => (0x00, SimState::Payload { command, remaining: mosi }),
            SimState::Payload { command, remaining } if remaining > 0 => {
                let ch = command.channel.index() as usize;
                let miso = match command.opcode {
                    // Empty queue clocks out stale data
                    Opcode::Receive => self.rx.borrow_mut()[ch].pop_front().unwrap_or(0xEE),
                    _ => {
                        self.tx.borrow_mut()[ch].push(mosi);
                        0x00
                    }
                };
                (miso, SimState::Payload { command, remaining: remaining - 1 })
            }
            SimState::Baud(ch) => {
                self.baud.borrow_mut()[ch] = Some(mosi);
                (0x00, SimState::Done)
            }
            SimState::Payload { .. } | SimState::Done => (0x00, SimState::Done),
        };
        self.state.set(next);
        Ok(miso)
    }
}

pub struct SimBus<'a>(pub &'a BridgeSim);

impl SpiBus for SimBus<'_> {
    type Error = MockError;

    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), MockError> {
        for byte in data.iter_mut() {
            *byte = self.0.exchange(*byte)?;
        }
        Ok(())
    }
}

pub struct SimCs<'a>(pub &'a BridgeSim);

impl OutputPin for SimCs<'_> {
    fn set_high(&mut self) {
        self.0.deselect();
    }

    fn set_low(&mut self) {
        self.0.select();
    }

    fn is_set_high(&self) -> bool {
        !self.0.is_selected()
    }
}

pub struct SimDelay<'a>(pub &'a BridgeSim);

impl Delay for SimDelay<'_> {
    fn delay_ms(&mut self, ms: u32) {
        self.0.delays.borrow_mut().push(ms);
    }
}

/// Settable millisecond clock
pub struct MockClock {
    now: Cell<u32>,
}

impl MockClock {
    pub fn new(start_ms: u32) -> Self {
        Self {
            now: Cell::new(start_ms),
        }
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u32 {
        self.now.get()
    }
}

/// Output pin that remembers its level
#[derive(Default)]
pub struct MockPin {
    pub high: bool,
    pub writes: usize,
}

impl OutputPin for MockPin {
    fn set_high(&mut self) {
        self.high = true;
        self.writes += 1;
    }

    fn set_low(&mut self) {
        self.high = false;
        self.writes += 1;
    }

    fn is_set_high(&self) -> bool {
        self.high
    }
}

/// In-memory byte stream that counts every call made on it
#[derive(Default)]
pub struct ScriptedStream {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
    pub calls: usize,
    /// Report a transport error from `available`
    pub fail: bool,
}

impl ScriptedStream {
    pub fn with_bytes(data: &[u8]) -> Self {
        Self {
            rx: data.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        self.rx.extend(data.iter().copied());
    }
}

impl ByteStream for ScriptedStream {
    type Error = MockError;

    fn available(&mut self) -> Result<usize, MockError> {
        self.calls += 1;
        if self.fail {
            return Err(MockError);
        }
        Ok(self.rx.len())
    }

    fn read_byte(&mut self) -> Result<u8, MockError> {
        self.calls += 1;
        self.rx.pop_front().ok_or(MockError)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), MockError> {
        self.calls += 1;
        self.tx.push(byte);
        Ok(())
    }
}
