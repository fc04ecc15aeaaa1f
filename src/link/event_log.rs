//! Event-log transfer.
//!
//! Entries are formatted into 64-byte frames and appended to the node's
//! event log. The node tells the companion how many frames are still free
//! after every entry; when that reaches zero the ack stops, which is the
//! companion's cue to stop sending.
//!
//! Free space is worked out once per retrieval cycle, the first time an
//! entry arrives: `capacity * (100 - headroom) / 100 - stored`.

use core::fmt::Write as _;

use heapless::{String, Vec};
use log::{debug, info, warn};

use crate::ports::EventLogStore;
use crate::protocol::types::EventLogEntry;

/// Event-log frame size in bytes.
pub const LOG_FRAME_SIZE: usize = 64;
/// Largest formatted record, in frames.
pub const MAX_RECORD_FRAMES: usize = 3;

const MAX_RECORD: usize = LOG_FRAME_SIZE * MAX_RECORD_FRAMES;

/// One formatted, frame-padded record.
pub type LogRecord = Vec<u8, MAX_RECORD>;

/// Companion event codes with a readable name.
const EVENT_NAMES: &[(u16, &str)] = &[
    (0x0001, "POWER_ON"),
    (0x0002, "BROWN_OUT"),
    (0x0003, "WATCHDOG_RESET"),
    (0x0010, "GNSS_FIX_ACQUIRED"),
    (0x0011, "GNSS_FIX_LOST"),
    (0x0020, "TEMP_ALARM"),
    (0x0021, "TEMP_ALARM_CLEARED"),
    (0x0030, "BATTERY_LOW"),
    (0x0031, "HARVESTER_FAULT"),
    (0x0040, "RTC_SYNC"),
    (0x0050, "NFC_FIELD"),
    (0x0060, "MAIN_CPU_TIMEOUT"),
];

pub fn event_name(code: u16) -> Option<&'static str> {
    EVENT_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|&(_, name)| name)
}

/// Render an entry as one text line padded with NULs to whole frames.
pub fn format_entry(entry: &EventLogEntry) -> LogRecord {
    let mut line: String<MAX_RECORD> = String::new();
    // Worst case is well under MAX_RECORD, so these writes cannot fail.
    let _ = write!(line, "{:010} {} ", entry.timestamp, entry.severity.label());
    let _ = match event_name(entry.code) {
        Some(name) => write!(line, "{}", name),
        None => write!(line, "E{:04X}", entry.code),
    };
    if !entry.message.is_empty() {
        let _ = write!(line, ": {}", entry.message);
    }

    let mut record = LogRecord::new();
    let _ = record.extend_from_slice(line.as_bytes());
    let padded = record.len().div_ceil(LOG_FRAME_SIZE).max(1) * LOG_FRAME_SIZE;
    let _ = record.resize(padded, 0);
    record
}

/// Per-cycle accounting; lives in the dispatcher.
#[derive(Debug)]
pub struct EventLogSession {
    headroom_percent: u8,
    epoch: Option<u32>,
    remaining: u32,
}

impl EventLogSession {
    pub fn new(headroom_percent: u8) -> Self {
        Self {
            headroom_percent,
            epoch: None,
            remaining: 0,
        }
    }

    /// Frames still free in the current cycle.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Handle one entry received during retrieval cycle `epoch`.
    ///
    /// Returns the remaining-frame count to acknowledge with, or `None`
    /// when no ack must be sent.
    pub fn process(
        &mut self,
        epoch: u32,
        entry: &EventLogEntry,
        store: &mut dyn EventLogStore,
    ) -> Option<u16> {
        if self.epoch != Some(epoch) {
            self.epoch = Some(epoch);
            self.remaining = self.compute_remaining(store);
        }

        if self.remaining == 0 {
            debug!(
                "PMIC[evlog]: log full, entry 0x{:04X} at {} ignored",
                entry.code, entry.timestamp
            );
            return None;
        }

        let record = format_entry(entry);
        let frames = (record.len() / LOG_FRAME_SIZE) as u32;
        if let Err(e) = store.append(&record) {
            // No ack: the companion keeps the entry and resends it.
            warn!(
                "PMIC[evlog]: append of 0x{:04X} failed: {}",
                entry.code, e
            );
            return None;
        }
        self.remaining = self.remaining.saturating_sub(frames);

        if self.remaining == 0 {
            info!("PMIC[evlog]: capacity reached, acks stop");
            return None;
        }
        Some(u16::try_from(self.remaining).unwrap_or(u16::MAX))
    }

    fn compute_remaining(&self, store: &mut dyn EventLogStore) -> u32 {
        let (capacity, stored) = match (store.capacity_frames(), store.stored_frames()) {
            (Ok(capacity), Ok(stored)) => (capacity, stored),
            (Err(e), _) | (_, Err(e)) => {
                warn!("PMIC[evlog]: capacity scan failed: {}", e);
                return 0;
            }
        };
        let usable_percent = u64::from(100 - self.headroom_percent.min(100));
        let usable = (u64::from(capacity) * usable_percent / 100) as u32;
        let remaining = usable.saturating_sub(stored);
        info!(
            "PMIC[evlog]: {} of {} frames free ({} stored)",
            remaining, capacity, stored
        );
        remaining
    }
}
