//! Outbound request builders, one per command.
//!
//! Each builds its payload in a stack buffer, frames it and sends it.
//! Requests that start a reassembly cycle reset their accumulator and
//! signal first and hand back a guard to wait on.

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use super::PmicLink;
use super::temperature_log::TemperatureAck;
use super::wait::{CapacityRequest, DumpRequest, MetadataRequest};
use crate::error::{Error, FrameError, Result};
use crate::protocol::codec::MAX_FRAME_PAYLOAD;
use crate::protocol::ids::CommandId;
use crate::protocol::transport::SerialPort;
use crate::protocol::types::{PowerUpMode, SystemInfo};

impl<S: SerialPort, D: DelayNs> PmicLink<S, D> {
    /// Ask for a status snapshot. The reply arrives as a `TestResult`.
    pub async fn poll_status(&self) -> Result<()> {
        self.send_command(CommandId::TestCommand, &[]).await
    }

    pub async fn request_metadata(&self) -> Result<MetadataRequest<'_, S, D>> {
        let request = MetadataRequest::claim(self)?;
        self.with_state(|s| s.metadata.reset());
        self.metadata_done.reset();
        self.send_command(CommandId::RequestMetadata, &[]).await?;
        Ok(request)
    }

    /// Start an image dump. The size comes from the last metadata blob's
    /// `image_size`, or the configured default.
    pub async fn request_dump(&self) -> Result<DumpRequest<'_, S, D>> {
        let request = DumpRequest::claim(self)?;
        let base = self.config().dump_base_address;
        let default_size = self.config().default_dump_size;
        let size = match self.with_state(|s| s.metadata.image_size()) {
            Some(size) if size > 0 && base.checked_add(size).is_some() => size,
            Some(size) => {
                warn!(
                    "PMIC[dump]: metadata image_size {} unusable, using {}",
                    size, default_size
                );
                default_size
            }
            None => default_size,
        };
        self.with_state(|s| s.dump.start(size));
        self.dump_done.reset();
        info!("PMIC[dump]: requesting {} bytes at 0x{:08X}", size, base);
        self.send_command(CommandId::RequestDump, &[]).await?;
        Ok(request)
    }

    pub async fn request_capacity_remaining(&self) -> Result<CapacityRequest<'_, S, D>> {
        let request = CapacityRequest::claim(self)?;
        while self.capacity.try_receive().is_ok() {}
        self.send_command(CommandId::RequestCapacityRemaining, &[]).await?;
        Ok(request)
    }

    pub async fn request_energy(&self) -> Result<()> {
        self.send_command(CommandId::RequestEnergy, &[]).await
    }

    /// Push one parameter group to the companion.
    pub async fn update_parameters(&self, group: u8, data: &[u8]) -> Result<()> {
        let mut payload = [0u8; MAX_FRAME_PAYLOAD];
        let len = 1 + data.len();
        if len > MAX_FRAME_PAYLOAD {
            return Err(Error::Frame(FrameError::PayloadTooLarge(len)));
        }
        payload[0] = group;
        payload[1..len].copy_from_slice(data);
        self.send_command(CommandId::UpdateParameter, &payload[..len])
            .await
    }

    /// Announce that the main processor is up. Also starts a new event-log
    /// retrieval cycle.
    pub async fn send_power_up_status(&self, mode: PowerUpMode, info: &SystemInfo) -> Result<()> {
        let mut payload = [0u8; 1 + SystemInfo::ENCODED_LEN];
        payload[0] = mode.to_byte();
        let mut record = [0u8; SystemInfo::ENCODED_LEN];
        info.encode(&mut record);
        payload[1..].copy_from_slice(&record);
        self.begin_log_retrieval();
        self.send_command(CommandId::PowerUpStatus, &payload).await
    }

    pub async fn send_power_down_status(&self, reason: u8, next_wake_secs: u32) -> Result<()> {
        let mut payload = [0u8; 5];
        payload[0] = reason;
        payload[1..].copy_from_slice(&next_wake_secs.to_le_bytes());
        self.send_command(CommandId::PowerDownStatus, &payload).await
    }

    pub async fn send_temperature_ack(&self, code: TemperatureAck, sequence: u16) -> Result<()> {
        let [lo, hi] = sequence.to_le_bytes();
        self.send_ack(CommandId::TemperatureReceivedAck, &[code as u8, lo, hi])
            .await
    }

    /// Acknowledge an event-log entry with the frames still free.
    pub async fn send_log_ack(&self, remaining: u16) -> Result<()> {
        self.send_ack(CommandId::LogReceivedAck, &remaining.to_le_bytes())
            .await
    }

    pub async fn write_ndef_records(&self, records: &[u8]) -> Result<()> {
        self.send_command(CommandId::NdefRecords, records).await
    }

    /// Ask for the NDEF area; the reply lands in the NDEF holding queue.
    pub async fn read_ndef_records(&self) -> Result<()> {
        self.send_command(CommandId::ReadNdefRecords, &[]).await
    }
}
