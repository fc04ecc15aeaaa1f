//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing every [`LinkEvent`] to the logger
//! (UART console in production). The scheduler's own sink implements the
//! same trait; this one is handy on the bench and in tests.

use log::{info, warn};

use crate::events::LinkEvent;
use crate::ports::EventSink;

/// Adapter that logs every [`LinkEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink {
    emitted: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events seen since construction.
    pub fn emitted(&self) -> u32 {
        self.emitted
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &LinkEvent) {
        self.emitted = self.emitted.wrapping_add(1);
        match event {
            LinkEvent::Wake(reason) => {
                info!("WAKE | reason={:?}", reason);
            }
            LinkEvent::TemperatureAlarm { code, flags } => {
                warn!("ALARM | temperature code={} flags=0b{:04b}", code, flags);
            }
            LinkEvent::ShutdownRequested { alarm_code } => {
                warn!("ALARM | unknown code {}, shutdown requested", alarm_code);
            }
            LinkEvent::SelfTestReport(r) => {
                info!(
                    "SELFTEST | {} | accel=({:.2},{:.2},{:.2})g | V={:.2} | \
                     T={:.1}\u{00b0}C | codes={}",
                    if r.passed { "PASS" } else { "FAIL" },
                    r.accel_g[0],
                    r.accel_g[1],
                    r.accel_g[2],
                    r.voltage_v,
                    r.temperature_c,
                    r.codes.len(),
                );
            }
        }
    }
}
