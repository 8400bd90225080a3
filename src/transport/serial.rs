//! RS-232 / USB-serial transport built on the `serialport` crate.

use super::Transport;
use crate::config::SerialSettings;
use crate::error::LaserResult;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};
use tracing::debug;

/// Serial port opened with the Oxxius line settings (8N1, no flow control).
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    port_name: String,
    timeout: Duration,
}

impl SerialTransport {
    /// Open `settings.port` at `settings.baud_rate` with the configured read
    /// timeout.
    pub fn open(settings: &SerialSettings) -> LaserResult<Self> {
        let timeout = settings.timeout();
        let port = serialport::new(&settings.port, settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()?;

        debug!(
            "Serial port '{}' opened at {} baud",
            settings.port, settings.baud_rate
        );

        Ok(Self {
            port,
            port_name: settings.port.clone(),
            timeout,
        })
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn read_until(&mut self, terminator: &[u8]) -> io::Result<Vec<u8>> {
        let mut reply = Vec::new();
        let mut byte = [0u8; 1];
        let start = Instant::now();

        // Each read may block only for what is left of the total timeout.
        while let Some(budget) = remaining(self.timeout, start.elapsed()) {
            self.port.set_timeout(budget).map_err(io::Error::from)?;
            match self.port.read(&mut byte) {
                Ok(1) => {
                    reply.push(byte[0]);
                    if reply.ends_with(terminator) {
                        break;
                    }
                }
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(reply)
    }

    fn reset_input_buffer(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input).map_err(io::Error::from)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn port_name(&self) -> &str {
        &self.port_name
    }
}

/// Read budget left after `elapsed`, or `None` once `timeout` is spent.
fn remaining(timeout: Duration, elapsed: Duration) -> Option<Duration> {
    let left = timeout.saturating_sub(elapsed);
    (!left.is_zero()).then_some(left)
}
