//! Link configuration parameters
//!
//! All tunable timing, sizing, and retry parameters for the companion link.
//! The values are loaded from NVM by the application; defaults match the
//! companion firmware's expectations.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Core link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    // --- Transport ---
    /// Pause after each transmitted byte (microseconds)
    pub inter_byte_delay_us: u32,
    /// Line-status polls allowed before a byte is declared stuck
    pub tx_drain_poll_limit: u32,

    // --- Blocking waits ---
    /// Metadata blob reassembly timeout (milliseconds)
    pub metadata_timeout_ms: u32,
    /// Full image dump timeout (milliseconds)
    pub dump_timeout_ms: u32,
    /// Capacity-remaining reply timeout (milliseconds)
    pub capacity_timeout_ms: u32,
    /// Longest the dispatcher waits on a full holding queue (milliseconds)
    pub queue_send_timeout_ms: u32,

    // --- Acknowledgements ---
    /// Pause before an acknowledgement is sent (milliseconds)
    pub ack_delay_ms: u32,
    /// Wait for a store-energy confirmation per attempt (milliseconds)
    pub energy_store_wait_ms: u32,
    /// Store-energy attempts before giving up
    pub energy_store_attempts: u8,

    // --- Dump image ---
    /// Absolute address the companion image is mapped at
    pub dump_base_address: u32,
    /// Image size used when the metadata blob carries none (bytes)
    pub default_dump_size: u32,

    // --- Calibration / logs ---
    /// Accelerometer sensitivity (LSB per g)
    pub accel_sensitivity_lsb_per_g: f32,
    /// Event-log capacity held back from the companion (0-100%)
    pub event_log_headroom_percent: u8,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            // Transport
            inter_byte_delay_us: 100,
            tx_drain_poll_limit: 10_000,

            // Blocking waits
            metadata_timeout_ms: 2_000,
            dump_timeout_ms: 60_000,
            capacity_timeout_ms: 1_000,
            queue_send_timeout_ms: 500,

            // Acknowledgements
            ack_delay_ms: 5,
            energy_store_wait_ms: 200,
            energy_store_attempts: 3,

            // Dump image
            dump_base_address: 0x0800_0000,
            default_dump_size: 32 * 1024,

            // Calibration / logs
            accel_sensitivity_lsb_per_g: 1024.0,
            event_log_headroom_percent: 10,
        }
    }
}

impl LinkConfig {
    /// Reject values the link cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.metadata_timeout_ms == 0
            || self.dump_timeout_ms == 0
            || self.capacity_timeout_ms == 0
        {
            return Err(Error::Config("wait timeouts must be non-zero"));
        }
        if self.tx_drain_poll_limit == 0 {
            return Err(Error::Config("tx_drain_poll_limit must be non-zero"));
        }
        if self.energy_store_attempts == 0 {
            return Err(Error::Config("energy_store_attempts must be at least 1"));
        }
        if self.default_dump_size == 0 {
            return Err(Error::Config("default_dump_size must be non-zero"));
        }
        if self
            .dump_base_address
            .checked_add(self.default_dump_size)
            .is_none()
        {
            return Err(Error::Config("dump image wraps the address space"));
        }
        if self.accel_sensitivity_lsb_per_g <= 0.0 {
            return Err(Error::Config("accelerometer sensitivity must be positive"));
        }
        if self.event_log_headroom_percent > 100 {
            return Err(Error::Config("event_log_headroom_percent above 100"));
        }
        Ok(())
    }
}
