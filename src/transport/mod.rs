//! Byte-stream transports consumed by the transaction engine.
//!
//! A [`Transport`] is the minimal surface the driver needs from a serial
//! port: write a frame, read up to a terminator, flush stale input, and report
//! its read timeout and port name for diagnostics. Like a line-reading serial
//! port, `read_until` returns whatever arrived (possibly nothing) once the
//! timeout lapses instead of failing; the engine decides what silence means.
//!
//! - [`SerialTransport`]: real RS-232 / USB-serial port (feature
//!   `instrument_serial`).
//! - [`MockTransport`]: scripted device for tests and offline runs.

pub mod mock;
#[cfg(feature = "instrument_serial")]
pub mod serial;

pub use mock::{MockHandle, MockTransport};
#[cfg(feature = "instrument_serial")]
pub use serial::SerialTransport;

use std::io;
use std::time::Duration;

/// Blocking byte-stream to one device.
pub trait Transport: Send {
    /// Write all of `bytes`.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Read until `terminator` has been received or the read timeout lapses.
    ///
    /// The terminator, when received, is included in the returned bytes. A
    /// timeout is not an error: the bytes read so far (possibly none) are
    /// returned.
    fn read_until(&mut self, terminator: &[u8]) -> io::Result<Vec<u8>>;

    /// Discard any bytes waiting in the input buffer.
    fn reset_input_buffer(&mut self) -> io::Result<()>;

    /// Read timeout applied by `read_until`.
    fn timeout(&self) -> Duration;

    /// Port identifier for diagnostics.
    fn port_name(&self) -> &str;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write(bytes)
    }

    fn read_until(&mut self, terminator: &[u8]) -> io::Result<Vec<u8>> {
        (**self).read_until(terminator)
    }

    fn reset_input_buffer(&mut self) -> io::Result<()> {
        (**self).reset_input_buffer()
    }

    fn timeout(&self) -> Duration {
        (**self).timeout()
    }

    fn port_name(&self) -> &str {
        (**self).port_name()
    }
}
