//! Adapters from `embedded-hal` 1.0 peripherals
//!
//! Board code usually already has `embedded-hal` implementations from its
//! chip HAL. These thin wrappers let them drive the muart traits without a
//! board-specific impl block.

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital;
use embedded_hal::spi;

use crate::gpio::OutputPin;
use crate::spi::SpiBus;
use crate::time::Delay;

/// Wraps an `embedded_hal::spi::SpiBus` (8-bit words)
///
/// The wrapped bus must not manage chip select itself; the bridge drives its
/// own select line around each command.
pub struct EhSpiBus<B> {
    bus: B,
}

impl<B> EhSpiBus<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Release the wrapped bus
    pub fn free(self) -> B {
        self.bus
    }
}

impl<B: spi::SpiBus<u8>> SpiBus for EhSpiBus<B> {
    type Error = B::Error;

    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<(), Self::Error> {
        self.bus.transfer_in_place(data)?;
        // Bytes must be on the wire before the caller releases chip select
        self.bus.flush()
    }
}

/// Wraps an infallible `embedded_hal::digital::OutputPin`
///
/// Tracks the driven level so that [`OutputPin::is_set_high`] can be answered
/// without a `StatefulOutputPin` implementation.
pub struct EhOutputPin<P> {
    pin: P,
    high: bool,
}

impl<P: digital::OutputPin<Error = Infallible>> EhOutputPin<P> {
    /// Wrap `pin` and drive it to `initial_high`
    pub fn new(pin: P, initial_high: bool) -> Self {
        let mut wrapped = Self { pin, high: false };
        wrapped.set_state(initial_high);
        wrapped
    }

    /// Release the wrapped pin
    pub fn free(self) -> P {
        self.pin
    }
}

impl<P: digital::OutputPin<Error = Infallible>> OutputPin for EhOutputPin<P> {
    fn set_high(&mut self) {
        let _ = self.pin.set_high();
        self.high = true;
    }

    fn set_low(&mut self) {
        let _ = self.pin.set_low();
        self.high = false;
    }

    fn is_set_high(&self) -> bool {
        self.high
    }
}

/// Wraps an `embedded_hal::delay::DelayNs` provider
pub struct EhDelay<D> {
    delay: D,
}

impl<D> EhDelay<D> {
    pub fn new(delay: D) -> Self {
        Self { delay }
    }
}

impl<D: DelayNs> Delay for EhDelay<D> {
    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}
