//! Outbound link notifications.
//!
//! The dispatcher emits these through the [`EventSink`](crate::ports::EventSink)
//! port. Adapters on the other side decide what to do with them: wake the
//! application scheduler, latch an alarm, start an orderly shutdown.

use crate::protocol::types::{SelfTestReport, WakeReason};

/// Structured events raised by inbound companion messages.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// The companion woke the main processor for this reason.
    Wake(WakeReason),

    /// A temperature alarm; `flags` uses [`alarm_flags`](crate::protocol::types::alarm_flags).
    TemperatureAlarm { code: u8, flags: u8 },

    /// The companion sent an alarm code outside the known table.
    ShutdownRequested { alarm_code: u8 },

    /// Calibrated companion self-test, ready for upload.
    SelfTestReport(SelfTestReport),
}
