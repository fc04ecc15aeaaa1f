//! Half-duplex byte transport toward the companion.
//!
//! The companion's UART receiver has no FIFO, so frames are sent one byte
//! at a time: write, wait for the transmitter to drain, pause, repeat.
//!
//! The UART itself is an external collaborator reached through
//! [`SerialPort`]; the pacing delay comes from any `embedded-hal`
//! [`DelayNs`] so host tests can run without real timing.

use embedded_hal::delay::DelayNs;

use crate::config::LinkConfig;
use crate::error::TransportError;

/// Snapshot of the UART line-status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineStatus(pub u8);

impl LineStatus {
    /// Transmit holding register empty.
    pub const THR_EMPTY: u8 = 1 << 5;
    /// Transmitter fully idle (shift register empty too).
    pub const TX_EMPTY: u8 = 1 << 6;

    /// Both the holding and shift registers have drained.
    pub fn tx_drained(self) -> bool {
        self.0 & Self::TX_EMPTY != 0
    }
}

/// Byte-level UART primitive provided by the driver.
pub trait SerialPort {
    /// Place one byte in the transmit holding register.
    fn write_byte(&mut self, byte: u8) -> Result<(), TransportError>;

    /// Read the current line status.
    fn line_status(&mut self) -> LineStatus;
}

/// Paced single-byte sender. Not reentrant; the link wraps it in a mutex.
pub struct Transport<S, D> {
    port: S,
    delay: D,
    inter_byte_delay_us: u32,
    drain_poll_limit: u32,
}

impl<S: SerialPort, D: DelayNs> Transport<S, D> {
    pub fn new(port: S, delay: D, config: &LinkConfig) -> Self {
        Self {
            port,
            delay,
            inter_byte_delay_us: config.inter_byte_delay_us,
            drain_poll_limit: config.tx_drain_poll_limit.max(1),
        }
    }

    /// Send `bytes` strictly one at a time.
    ///
    /// Returns the line status observed after the last byte drained.
    pub fn send_frame(&mut self, bytes: &[u8]) -> Result<LineStatus, TransportError> {
        let mut status = self.port.line_status();
        for &byte in bytes {
            self.port.write_byte(byte)?;
            status = self.wait_drained()?;
            self.delay.delay_us(self.inter_byte_delay_us);
        }
        Ok(status)
    }

    /// Pause for `ms` milliseconds on the transport's delay source.
    pub fn pause_ms(&mut self, ms: u32) {
        if ms > 0 {
            self.delay.delay_ms(ms);
        }
    }

    pub fn port(&self) -> &S {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut S {
        &mut self.port
    }

    fn wait_drained(&mut self) -> Result<LineStatus, TransportError> {
        for _ in 0..self.drain_poll_limit {
            let status = self.port.line_status();
            if status.tx_drained() {
                return Ok(status);
            }
        }
        Err(TransportError::DrainTimeout)
    }
}
