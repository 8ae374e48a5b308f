//! SPI-to-UART bridge driver
//!
//! The bridge buffers four hardware UARTs and exposes them through a small
//! command set on one SPI chip select. Each operation is a single bracket:
//!
//! ```text
//! CS low ─▶ command byte ─▶ [length byte] ─▶ payload ─▶ CS high
//! ```
//!
//! Channel indices from 4 upwards are ignored without touching the bus,
//! matching how the bridge firmware treats them.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use muart_hal::spi::READ_FILLER;
use muart_hal::{Delay, OutputPin, SpiBus};
use muart_protocol::{BaudRate, Channel, Command, Opcode, BAUD_SETTLE_MS, MAX_TRANSFER_LEN};

/// Bridge command set, addressed by raw channel index
///
/// Implemented by [`MultiUart`] itself, by `&mut` references to any bridge
/// and by a [`SharedBridge`] reference, so a [`crate::UartChannel`] can hold
/// whichever handle suits the board.
pub trait UartBridge {
    /// Transport error
    type Error;

    /// Number of received bytes queued on `channel`
    fn rx_depth(&mut self, channel: u8) -> Result<u8, Self::Error>;

    /// Number of bytes waiting to be sent on `channel`
    fn tx_depth(&mut self, channel: u8) -> Result<u8, Self::Error>;

    /// Dequeue one received byte
    ///
    /// The queue must be non-empty (check [`UartBridge::rx_depth`]); an empty
    /// queue yields whatever the bridge clocks out.
    fn receive_byte(&mut self, channel: u8) -> Result<u8, Self::Error>;

    /// Dequeue `buf.len()` received bytes, same precondition as
    /// [`UartBridge::receive_byte`]
    fn receive_into(&mut self, channel: u8, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Queue one byte for transmission
    fn transmit_byte(&mut self, channel: u8, byte: u8) -> Result<(), Self::Error>;

    /// Queue `data` for transmission
    fn transmit(&mut self, channel: u8, data: &[u8]) -> Result<(), Self::Error>;

    /// Change the line rate, blocking for the settling time afterwards
    fn set_baud(&mut self, channel: u8, baud: BaudRate) -> Result<(), Self::Error>;
}

/// Multi-UART bridge on an exclusively owned SPI bus
///
/// Owns the bus, the chip-select line and the delay used after baud changes,
/// so no other traffic can reach the bridge while a command is in flight.
pub struct MultiUart<SPI, CS, D> {
    spi: SPI,
    cs: CS,
    delay: D,
}

impl<SPI, CS, D> MultiUart<SPI, CS, D>
where
    SPI: SpiBus,
    CS: OutputPin,
    D: Delay,
{
    /// Create a bridge driver, releasing chip select
    pub fn new(spi: SPI, mut cs: CS, delay: D) -> Self {
        cs.set_high();
        Self { spi, cs, delay }
    }

    /// Release the bus, chip select and delay
    pub fn free(self) -> (SPI, CS, D) {
        (self.spi, self.cs, self.delay)
    }

    /// Run one chip-select bracket: command byte, then `payload`
    ///
    /// Chip select is released on every exit path, including bus errors.
    fn transaction<T>(
        &mut self,
        command: Command,
        payload: impl FnOnce(&mut SPI) -> Result<T, SPI::Error>,
    ) -> Result<T, SPI::Error> {
        self.cs.set_low();
        let result = self
            .spi
            .transfer_byte(command.to_byte())
            .and_then(|_| payload(&mut self.spi));
        self.cs.set_high();
        result
    }

    fn query_depth(&mut self, opcode: Opcode, channel: u8) -> Result<u8, SPI::Error> {
        let Some(channel) = Channel::new(channel) else {
            return Ok(0);
        };
        self.transaction(Command::new(opcode, channel), |spi| {
            spi.transfer_byte(READ_FILLER)
        })
    }
}

impl<SPI, CS, D> UartBridge for MultiUart<SPI, CS, D>
where
    SPI: SpiBus,
    CS: OutputPin,
    D: Delay,
{
    type Error = SPI::Error;

    fn rx_depth(&mut self, channel: u8) -> Result<u8, Self::Error> {
        self.query_depth(Opcode::RxDepth, channel)
    }

    fn tx_depth(&mut self, channel: u8) -> Result<u8, Self::Error> {
        self.query_depth(Opcode::TxDepth, channel)
    }

    fn receive_byte(&mut self, channel: u8) -> Result<u8, Self::Error> {
        let mut byte = [0u8];
        self.receive_into(channel, &mut byte)?;
        Ok(byte[0])
    }

    fn receive_into(&mut self, channel: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        let Some(channel) = Channel::new(channel) else {
            return Ok(());
        };
        let command = Command::new(Opcode::Receive, channel);

        // The length field is one byte, so long reads take several brackets
        for chunk in buf.chunks_mut(MAX_TRANSFER_LEN) {
            self.transaction(command, |spi| {
                spi.transfer_byte(chunk.len() as u8)?;
                spi.read(chunk)
            })?;
        }
        Ok(())
    }

    fn transmit_byte(&mut self, channel: u8, byte: u8) -> Result<(), Self::Error> {
        self.transmit(channel, &[byte])
    }

    fn transmit(&mut self, channel: u8, data: &[u8]) -> Result<(), Self::Error> {
        let Some(channel) = Channel::new(channel) else {
            return Ok(());
        };
        let command = Command::new(Opcode::Transmit, channel);

        for chunk in data.chunks(MAX_TRANSFER_LEN) {
            self.transaction(command, |spi| {
                spi.transfer_byte(chunk.len() as u8)?;
                spi.write(chunk)
            })?;
        }
        Ok(())
    }

    fn set_baud(&mut self, channel: u8, baud: BaudRate) -> Result<(), Self::Error> {
        let Some(channel) = Channel::new(channel) else {
            return Ok(());
        };

        self.transaction(Command::new(Opcode::SetBaud, channel), |spi| {
            spi.transfer_byte(baud.code()).map(|_| ())
        })?;
        debug!(
            "bridge: channel {} set to {} baud",
            channel.index(),
            baud.bps()
        );

        // The bridge stores the rate in flash; it ignores commands meanwhile
        self.delay.delay_ms(BAUD_SETTLE_MS);
        Ok(())
    }
}

impl<B: UartBridge + ?Sized> UartBridge for &mut B {
    type Error = B::Error;

    fn rx_depth(&mut self, channel: u8) -> Result<u8, Self::Error> {
        (**self).rx_depth(channel)
    }

    fn tx_depth(&mut self, channel: u8) -> Result<u8, Self::Error> {
        (**self).tx_depth(channel)
    }

    fn receive_byte(&mut self, channel: u8) -> Result<u8, Self::Error> {
        (**self).receive_byte(channel)
    }

    fn receive_into(&mut self, channel: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).receive_into(channel, buf)
    }

    fn transmit_byte(&mut self, channel: u8, byte: u8) -> Result<(), Self::Error> {
        (**self).transmit_byte(channel, byte)
    }

    fn transmit(&mut self, channel: u8, data: &[u8]) -> Result<(), Self::Error> {
        (**self).transmit(channel, data)
    }

    fn set_baud(&mut self, channel: u8, baud: BaudRate) -> Result<(), Self::Error> {
        (**self).set_baud(channel, baud)
    }
}

/// A bridge shared between several channel users
///
/// Every operation locks the mutex for the duration of its chip-select
/// bracket. Use `NoopRawMutex` when all users run in one context and
/// `CriticalSectionRawMutex` when interrupts or other cores share the bridge.
pub type SharedBridge<M, B> = Mutex<M, RefCell<B>>;

/// Errors from a [`SharedBridge`] operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SharedBridgeError<E> {
    /// Another bridge operation is already in progress in this context
    Busy,
    /// Transport error from the bridge
    Bus(E),
}

/// Locked access to a [`SharedBridge`]
pub trait SharedBridgeExt<B: UartBridge> {
    /// Run `op` with exclusive access to the bridge
    fn with_bridge<T>(
        &self,
        op: impl FnOnce(&mut B) -> Result<T, B::Error>,
    ) -> Result<T, SharedBridgeError<B::Error>>;
}

impl<M: RawMutex, B: UartBridge> SharedBridgeExt<B> for SharedBridge<M, B> {
    fn with_bridge<T>(
        &self,
        op: impl FnOnce(&mut B) -> Result<T, B::Error>,
    ) -> Result<T, SharedBridgeError<B::Error>> {
        self.lock(|cell| {
            let mut bridge = cell.try_borrow_mut().map_err(|_| SharedBridgeError::Busy)?;
            op(&mut bridge).map_err(SharedBridgeError::Bus)
        })
    }
}

impl<M: RawMutex, B: UartBridge> UartBridge for &SharedBridge<M, B> {
    type Error = SharedBridgeError<B::Error>;

    fn rx_depth(&mut self, channel: u8) -> Result<u8, Self::Error> {
        self.with_bridge(|b| b.rx_depth(channel))
    }

    fn tx_depth(&mut self, channel: u8) -> Result<u8, Self::Error> {
        self.with_bridge(|b| b.tx_depth(channel))
    }

    fn receive_byte(&mut self, channel: u8) -> Result<u8, Self::Error> {
        self.with_bridge(|b| b.receive_byte(channel))
    }

    fn receive_into(&mut self, channel: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.with_bridge(|b| b.receive_into(channel, buf))
    }

    fn transmit_byte(&mut self, channel: u8, byte: u8) -> Result<(), Self::Error> {
        self.with_bridge(|b| b.transmit_byte(channel, byte))
    }

    fn transmit(&mut self, channel: u8, data: &[u8]) -> Result<(), Self::Error> {
        self.with_bridge(|b| b.transmit(channel, data))
    }

    fn set_baud(&mut self, channel: u8, baud: BaudRate) -> Result<(), Self::Error> {
        self.with_bridge(|b| b.set_baud(channel, baud))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{BridgeSim, SimBus, SimCs, SimDelay};
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use proptest::prelude::*;

    fn bridge(sim: &BridgeSim) -> MultiUart<SimBus<'_>, SimCs<'_>, SimDelay<'_>> {
        MultiUart::new(SimBus(sim), SimCs(sim), SimDelay(sim))
    }

    #[test]
    fn test_new_releases_chip_select() {
        let sim = BridgeSim::new();
        let _bridge = bridge(&sim);
        assert!(!sim.is_selected());
        assert_eq!(sim.exchange_count(), 0);
    }

    #[test]
    fn test_rx_depth_command_and_result() {
        let sim = BridgeSim::new();
        sim.push_rx(2, &[1, 2, 3, 4, 5, 6, 7]);
        let mut bridge = bridge(&sim);

        assert_eq!(bridge.rx_depth(2), Ok(7));
        assert_eq!(sim.brackets(), vec![vec![0x12, READ_FILLER]]);
        assert!(!sim.is_selected());
    }

    #[test]
    fn test_rx_depth_returns_raw_byte() {
        let sim = BridgeSim::new();
        sim.set_depth_override(Some(0xC8));
        let mut bridge = bridge(&sim);

        assert_eq!(bridge.rx_depth(2), Ok(0xC8));
    }

    #[test]
    fn test_tx_depth_command() {
        let sim = BridgeSim::new();
        let mut bridge = bridge(&sim);

        bridge.transmit(1, b"abc").unwrap();
        assert_eq!(bridge.tx_depth(1), Ok(3));
        assert_eq!(sim.brackets()[1], vec![0x31, READ_FILLER]);
    }

    #[test]
    fn test_receive_byte_wire_format() {
        let sim = BridgeSim::new();
        sim.push_rx(3, &[0xAB]);
        let mut bridge = bridge(&sim);

        assert_eq!(bridge.receive_byte(3), Ok(0xAB));
        assert_eq!(sim.brackets(), vec![vec![0x23, 1, READ_FILLER]]);
    }

    #[test]
    fn test_receive_into_single_bracket() {
        let sim = BridgeSim::new();
        sim.push_rx(0, &[10, 20, 30, 40]);
        let mut bridge = bridge(&sim);

        let mut buf = [0u8; 3];
        bridge.receive_into(0, &mut buf).unwrap();

        assert_eq!(buf, [10, 20, 30]);
        assert_eq!(sim.brackets().len(), 1);
        assert_eq!(sim.brackets()[0][..2], [0x20, 3]);
        assert_eq!(bridge.rx_depth(0), Ok(1));
    }

    #[test]
    fn test_receive_into_splits_long_reads() {
        let sim = BridgeSim::new();
        let data: Vec<u8> = (0..300u16).map(|i| i as u8).collect();
        sim.push_rx(1, &data);
        let mut bridge = bridge(&sim);

        let mut buf = [0u8; 300];
        bridge.receive_into(1, &mut buf).unwrap();

        assert_eq!(&buf[..], &data[..]);
        let brackets = sim.brackets();
        assert_eq!(brackets.len(), 2);
        assert_eq!(brackets[0][..2], [0x21, 255]);
        assert_eq!(brackets[1][..2], [0x21, 45]);
    }

    #[test]
    fn test_empty_buffers_skip_bus() {
        let sim = BridgeSim::new();
        let mut bridge = bridge(&sim);

        bridge.receive_into(0, &mut []).unwrap();
        bridge.transmit(0, &[]).unwrap();
        assert_eq!(sim.exchange_count(), 0);
    }

    #[test]
    fn test_transmit_wire_format() {
        let sim = BridgeSim::new();
        let mut bridge = bridge(&sim);

        bridge.transmit_byte(2, 0x55).unwrap();
        bridge.transmit(2, &[1, 2, 3]).unwrap();

        assert_eq!(
            sim.brackets(),
            vec![vec![0x42, 1, 0x55], vec![0x42, 3, 1, 2, 3]]
        );
        assert_eq!(sim.tx(2), vec![0x55, 1, 2, 3]);
        assert_eq!(sim.unselected_exchanges(), 0);
    }

    #[test]
    fn test_set_baud_wire_format_and_settle() {
        let sim = BridgeSim::new();
        let mut bridge = bridge(&sim);

        bridge.set_baud(1, BaudRate::Baud115200).unwrap();

        assert_eq!(sim.brackets(), vec![vec![0x81, 7]]);
        assert_eq!(sim.baud_code(1), Some(7));
        assert_eq!(sim.delays(), vec![BAUD_SETTLE_MS]);
    }

    #[test]
    fn test_chip_select_released_on_bus_error() {
        let sim = BridgeSim::new();
        sim.fail_at_exchange(Some(1));
        let mut bridge = bridge(&sim);

        assert!(bridge.rx_depth(0).is_err());
        assert!(!sim.is_selected());
    }

    #[test]
    fn test_failed_baud_change_skips_settle() {
        let sim = BridgeSim::new();
        sim.fail_at_exchange(Some(0));
        let mut bridge = bridge(&sim);

        assert!(bridge.set_baud(0, BaudRate::Baud9600).is_err());
        assert!(sim.delays().is_empty());
        assert!(!sim.is_selected());
    }

    #[test]
    fn test_shared_bridge_serializes_channels() {
        let sim = BridgeSim::new();
        sim.push_rx(0, &[1]);
        sim.push_rx(3, &[2, 2]);
        let shared: SharedBridge<NoopRawMutex, _> = Mutex::new(RefCell::new(bridge(&sim)));

        let mut a = &shared;
        let mut b = &shared;
        assert_eq!(a.rx_depth(0), Ok(1));
        assert_eq!(b.rx_depth(3), Ok(2));
        assert_eq!(a.receive_byte(0), Ok(1));
        assert_eq!(sim.brackets().len(), 3);
    }

    #[test]
    fn test_shared_bridge_rejects_reentry() {
        let sim = BridgeSim::new();
        let shared: SharedBridge<NoopRawMutex, _> = Mutex::new(RefCell::new(bridge(&sim)));

        let nested = shared.with_bridge(|_outer| {
            let mut inner = &shared;
            Ok(inner.rx_depth(0))
        });
        assert_eq!(nested, Ok(Err(SharedBridgeError::Busy)));
        assert_eq!(sim.exchange_count(), 0);
    }

    #[test]
    fn test_with_bridge_from_crate_root() {
        let sim = BridgeSim::new();
        sim.push_rx(1, &[7, 8]);
        let shared: crate::SharedBridge<NoopRawMutex, _> = Mutex::new(RefCell::new(bridge(&sim)));

        let depth = crate::SharedBridgeExt::with_bridge(&shared, |b| b.rx_depth(1));
        assert_eq!(depth, Ok(2));
        assert!(!sim.is_selected());
    }

    #[test]
    fn test_shared_bridge_wraps_bus_error() {
        let sim = BridgeSim::new();
        sim.fail_at_exchange(Some(0));
        let shared: SharedBridge<NoopRawMutex, _> = Mutex::new(RefCell::new(bridge(&sim)));

        let mut handle = &shared;
        assert!(matches!(
            handle.tx_depth(0),
            Err(SharedBridgeError::Bus(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_out_of_range_channel_is_noop(channel in 4u8..=255, byte in any::<u8>()) {
            let sim = BridgeSim::new();
            let mut bridge = bridge(&sim);
            let mut buf = [0u8; 4];

            prop_assert_eq!(bridge.rx_depth(channel), Ok(0));
            prop_assert_eq!(bridge.tx_depth(channel), Ok(0));
            prop_assert_eq!(bridge.receive_byte(channel), Ok(0));
            prop_assert_eq!(bridge.receive_into(channel, &mut buf), Ok(()));
            prop_assert_eq!(bridge.transmit_byte(channel, byte), Ok(()));
            prop_assert_eq!(bridge.transmit(channel, &[byte; 3]), Ok(()));
            prop_assert_eq!(bridge.set_baud(channel, BaudRate::Baud9600), Ok(()));

            prop_assert_eq!(sim.exchange_count(), 0);
            prop_assert!(sim.delays().is_empty());
        }

        #[test]
        fn prop_set_baud_two_bytes_then_settle(channel in 0u8..4, code in 0u8..10) {
            let sim = BridgeSim::new();
            let mut bridge = bridge(&sim);
            let baud = BaudRate::from_code(code).unwrap();

            bridge.set_baud(channel, baud).unwrap();

            prop_assert_eq!(sim.brackets(), vec![vec![0x80 | channel, code]]);
            prop_assert!(sim.delays().iter().sum::<u32>() >= 20);
        }
    }
}
