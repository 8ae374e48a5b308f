//! Serial sensor drivers
//!
//! Sensors here only need a [`muart_hal::ByteStream`], so they run equally
//! on a bridge channel or on a native UART.

pub mod a02yyuw;

pub use a02yyuw::{DistanceSensor, FrameStatus, OutputMode, ReadResult};
