//! Temperature-log transfer.
//!
//! The companion sends its buffered readings in numbered bursts. Sequence
//! 0 opens a session and sizes it against the free space in the node's
//! log; every burst is acknowledged with one [`TemperatureAck`] code.
//!
//! ```text
//!   seq 0 ──▶ records_remaining() ──▶ write readings ──▶ ack(code, 0)
//!   seq 1 ──▶                         write readings ──▶ ack(code, 1)
//!   seq 3 ──▶ gap: nothing written, no ack
//! ```

use log::{debug, info, warn};

use crate::error::TransferError;
use crate::ports::TemperatureLogStore;
use crate::protocol::types::{RawTemperature, TemperatureLogChunk};

/// Outcome of one burst, sent back to the companion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TemperatureAck {
    /// Nothing was acknowledged (burst rejected).
    NoAckReceived          = 0,
    Ok                     = 1,
    NoSpaceLeft            = 2,
    WriteFailed            = 3,
    FailedToGetRecordCount = 4,
}

/// Per-transfer state; lives in the dispatcher.
#[derive(Debug, Default)]
pub struct TemperatureLogSession {
    next_sequence: Option<u16>,
    space_left: u32,
    total_readings: u16,
    interval_s: u16,
    written: u32,
}

impl TemperatureLogSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Readings stored in the current transfer.
    pub fn written(&self) -> u32 {
        self.written
    }

    pub fn space_left(&self) -> u32 {
        self.space_left
    }

    /// Handle one burst. `NoAckReceived` means no ack must be sent.
    pub fn process(
        &mut self,
        chunk: &TemperatureLogChunk,
        store: &mut dyn TemperatureLogStore,
    ) -> TemperatureAck {
        if chunk.sequence == 0 {
            if let Some(code) = self.open(chunk, store) {
                return code;
            }
        } else if let Err(e) = self.check_sequence(chunk.sequence) {
            warn!("PMIC[temp]: burst rejected: {}", e);
            return TemperatureAck::NoAckReceived;
        }
        self.next_sequence = chunk.sequence.checked_add(1);

        for (i, &word) in chunk.readings.iter().enumerate() {
            if self.space_left == 0 {
                warn!(
                    "PMIC[temp]: log full, skipping {} readings of burst {}",
                    chunk.readings.len() - i,
                    chunk.sequence
                );
                return TemperatureAck::NoSpaceLeft;
            }
            let celsius = RawTemperature::from_packed(word).celsius();
            let timestamp = chunk
                .timestamp
                .wrapping_add(i as u32 * u32::from(self.interval_s));
            if let Err(e) = store.write_reading(timestamp, celsius) {
                warn!("PMIC[temp]: write failed at reading {}: {}", i, e);
                return TemperatureAck::WriteFailed;
            }
            self.space_left -= 1;
            self.written += 1;
        }

        debug!(
            "PMIC[temp]: burst {} stored ({}/{} readings)",
            chunk.sequence, self.written, self.total_readings
        );
        TemperatureAck::Ok
    }

    fn open(
        &mut self,
        chunk: &TemperatureLogChunk,
        store: &mut dyn TemperatureLogStore,
    ) -> Option<TemperatureAck> {
        *self = Self::default();
        self.total_readings = chunk.total_readings;
        self.interval_s = chunk.interval_s;
        match store.records_remaining() {
            Ok(space) => {
                self.space_left = space;
                info!(
                    "PMIC[temp]: transfer of {} readings, {} slots free",
                    chunk.total_readings, space
                );
                None
            }
            Err(e) => {
                warn!("PMIC[temp]: record count unavailable: {}", e);
                Some(TemperatureAck::FailedToGetRecordCount)
            }
        }
    }

    fn check_sequence(&self, received: u16) -> Result<(), TransferError> {
        match self.next_sequence {
            Some(expected) if expected == received => Ok(()),
            expected => Err(TransferError::SequenceGap {
                expected: expected.unwrap_or(0),
                received,
            }),
        }
    }
}
