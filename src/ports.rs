//! Port traits: the boundary between the link engine and the rest of the node.
//!
//! ```text
//!   Dispatcher ──▶ Port trait ──▶ Adapter (flash log, RTC, scheduler…)
//! ```
//!
//! The serial port itself lives with the transport
//! ([`SerialPort`](crate::protocol::transport::SerialPort)) and is re-exported
//! here so every collaborator can be found in one place.
//!
//! All port errors are typed; the dispatcher turns storage failures into
//! acknowledgement codes rather than propagating them.

use crate::error::StorageError;
use crate::events::LinkEvent;
use crate::protocol::types::RtcDateTime;

pub use crate::protocol::transport::{LineStatus, SerialPort};

// ───────────────────────────────────────────────────────────────
// Temperature log (driven adapter: dispatcher → flash)
// ───────────────────────────────────────────────────────────────

/// Persistent temperature-reading log.
pub trait TemperatureLogStore {
    /// Readings that can still be stored before the log is full.
    fn records_remaining(&mut self) -> Result<u32, StorageError>;

    /// Append one calibrated reading.
    fn write_reading(&mut self, timestamp: u32, celsius: f32) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Event log (driven adapter: dispatcher → flash)
// ───────────────────────────────────────────────────────────────

/// Persistent event log organised in fixed 64-byte frames.
pub trait EventLogStore {
    /// Total frames the log partition can hold.
    fn capacity_frames(&mut self) -> Result<u32, StorageError>;

    /// Frames already occupied. May scan the partition.
    fn stored_frames(&mut self) -> Result<u32, StorageError>;

    /// Append one formatted record. `record.len()` is a multiple of 64.
    fn append(&mut self, record: &[u8]) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Image sink (driven adapter: dump → flash / upload buffer)
// ───────────────────────────────────────────────────────────────

/// Destination for the companion image dump.
pub trait ImageSink {
    /// Write `data` at absolute `address`.
    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// RTC
// ───────────────────────────────────────────────────────────────

pub trait RtcPort {
    /// Cancel any pending wake alarm before the clock is stepped.
    fn disable_wake_alarm(&mut self);

    fn set_time(&mut self, time: &RtcDateTime);
}

// ───────────────────────────────────────────────────────────────
// Event sink (driven adapter: dispatcher → application)
// ───────────────────────────────────────────────────────────────

/// Receives [`LinkEvent`]s. Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &LinkEvent);
}

/// Everything the dispatcher writes to, bundled for one worker.
pub struct Collaborators<'p> {
    pub temperature_log: &'p mut dyn TemperatureLogStore,
    pub event_log: &'p mut dyn EventLogStore,
    pub image: &'p mut dyn ImageSink,
    pub rtc: &'p mut dyn RtcPort,
    pub events: &'p mut dyn EventSink,
}
