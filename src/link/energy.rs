//! Energy accounting: the energy report and the store-energy handshake.
//!
//! `store_energy_use` asks the companion to persist the node's cumulative
//! energy figure and waits briefly for the confirmation byte, retrying a
//! fixed number of times.

use embassy_time::with_timeout;
use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use super::wait::millis;
use super::{InFlight, PmicLink};
use crate::error::{Error, Result, StorageError, WaitKind};
use crate::protocol::ids::CommandId;
use crate::protocol::transport::SerialPort;
use crate::protocol::types::{ENERGY_STORE_SUCCESS, EnergyResult};

impl<S: SerialPort, D: DelayNs> PmicLink<S, D> {
    /// Persist `cumulative_mws` on the companion.
    ///
    /// Fails with `Timeout(EnergyStore)` if no attempt was confirmed, or
    /// `Storage(WriteFailed)` if the companion's last answer was an error.
    pub async fn store_energy_use(&self, cumulative_mws: u32) -> Result<()> {
        let _flag = InFlight::claim(self, WaitKind::EnergyStore)?;
        let payload = cumulative_mws.to_le_bytes();
        let attempts = self.config().energy_store_attempts;
        let wait = millis(self.config().energy_store_wait_ms);
        let mut failure = Error::Timeout(WaitKind::EnergyStore);

        for attempt in 1..=attempts {
            self.energy_store_result.reset();
            self.send_command(CommandId::StoreEnergyUse, &payload).await?;
            match with_timeout(wait, self.energy_store_result.wait()).await {
                Ok(ENERGY_STORE_SUCCESS) => {
                    info!("PMIC[energy]: {} mWs stored", cumulative_mws);
                    return Ok(());
                }
                Ok(code) => {
                    warn!(
                        "PMIC[energy]: store rejected (0x{:02X}), attempt {}/{}",
                        code, attempt, attempts
                    );
                    failure = Error::Storage(StorageError::WriteFailed);
                }
                Err(_) => {
                    warn!(
                        "PMIC[energy]: no confirmation, attempt {}/{}",
                        attempt, attempts
                    );
                    failure = Error::Timeout(WaitKind::EnergyStore);
                }
            }
        }
        Err(failure)
    }
}

impl<S, D> PmicLink<S, D> {
    pub(crate) fn on_energy_info(&self, energy: EnergyResult) {
        debug!(
            "PMIC[energy]: {} mV (min {}), peak {} mA, run {} mWs",
            energy.voltage_mv, energy.lowest_mv, energy.peak_current_ma, energy.this_run_mws
        );
        self.with_state(|s| s.energy.store(energy));
    }

    pub(crate) fn on_store_energy_result(&self, code: u8) {
        self.energy_store_result.signal(code);
    }
}
