//! Blocking waits and request guards.
//!
//! A request builder returns a guard; the guard's `wait()` blocks on the
//! matching signal or channel with a bounded timeout. Only one guard per
//! kind can exist at a time, so a second request while the first is still
//! outstanding fails with [`Error::RequestInFlight`].
//!
//! ```text
//!   request_metadata() ──▶ MetadataRequest ──wait()──▶ Signal ◀── Dispatcher
//!                                │
//!                              drop ──▶ in-flight flag cleared
//! ```

use embassy_sync::channel::Channel;
use embassy_time::{Duration, with_timeout};
use embedded_hal::delay::DelayNs;
use futures_lite::future::block_on;
use log::{info, warn};

use super::reassembly::MetadataBlob;
use super::{InFlight, PmicLink, RawMutex};
use crate::error::{Error, Result, TransferError, WaitKind};
use crate::protocol::transport::SerialPort;
use crate::protocol::types::CapacityRemaining;

pub(crate) fn millis(ms: u32) -> Duration {
    Duration::from_millis(u64::from(ms))
}

/// Queue `item`, waiting at most `timeout_ms` for room. Returns `false` if
/// it had to be dropped.
pub(crate) async fn send_or_drop<T, const N: usize>(
    channel: &Channel<RawMutex, T, N>,
    item: T,
    timeout_ms: u32,
    what: &str,
) -> bool {
    let item = match channel.try_send(item) {
        Ok(()) => return true,
        Err(embassy_sync::channel::TrySendError::Full(item)) => item,
    };
    if with_timeout(millis(timeout_ms), channel.send(item)).await.is_ok() {
        return true;
    }
    warn!("PMIC: {} queue full for {} ms, message dropped", what, timeout_ms);
    false
}

// ── Waits on the link ────────────────────────────────────────

impl<S: SerialPort, D: DelayNs> PmicLink<S, D> {
    /// Wait for the metadata blob requested last.
    ///
    /// On timeout the accumulator is invalidated; a late reply still
    /// fills it but is discarded by the next request.
    pub async fn wait_for_metadata(&self) -> Result<MetadataBlob> {
        let timeout = millis(self.config().metadata_timeout_ms);
        let Ok(outcome) = with_timeout(timeout, self.metadata_done.wait()).await else {
            self.with_state(|s| s.metadata.invalidate());
            warn!("PMIC[meta]: no complete blob within {:?}", timeout);
            return Err(Error::Timeout(WaitKind::Metadata));
        };
        self.metadata_done.reset();
        outcome?;

        self.with_state(|s| {
            let blob = s.metadata.blob().ok_or(Error::Timeout(WaitKind::Metadata))?;
            MetadataBlob::from_slice(blob).map_err(|_| {
                Error::Transfer(TransferError::MetadataTooLarge(blob.len()))
            })
        })
    }

    /// Wait for the sentinel chunk of the dump requested last. Returns the
    /// number of image bytes written.
    pub async fn wait_for_dump(&self) -> Result<u32> {
        let timeout = millis(self.config().dump_timeout_ms);
        let Ok(outcome) = with_timeout(timeout, self.dump_done.wait()).await else {
            let written = self.with_state(|s| {
                s.dump.abort();
                s.dump.written()
            });
            warn!(
                "PMIC[dump]: incomplete after {:?} ({} bytes written)",
                timeout, written
            );
            return Err(Error::Timeout(WaitKind::Dump));
        };
        self.dump_done.reset();
        let written = outcome?;
        info!("PMIC[dump]: complete, {} bytes", written);
        Ok(written)
    }

    /// Wait for the capacity-remaining reply.
    pub async fn wait_for_capacity_remaining(&self) -> Result<CapacityRemaining> {
        let timeout = millis(self.config().capacity_timeout_ms);
        match with_timeout(timeout, self.capacity.receive()).await {
            Ok(capacity) => Ok(capacity),
            Err(_) => {
                warn!("PMIC: no capacity reply within {:?}", timeout);
                Err(Error::Timeout(WaitKind::CapacityRemaining))
            }
        }
    }
}

// ── Request guards ───────────────────────────────────────────

/// Outstanding metadata request.
pub struct MetadataRequest<'a, S, D> {
    link: &'a PmicLink<S, D>,
    _flag: InFlight<'a>,
}

impl<'a, S, D> MetadataRequest<'a, S, D> {
    pub(crate) fn claim(link: &'a PmicLink<S, D>) -> Result<Self> {
        let flag = InFlight::claim(link, WaitKind::Metadata)?;
        Ok(Self { link, _flag: flag })
    }
}

impl<S: SerialPort, D: DelayNs> MetadataRequest<'_, S, D> {
    pub async fn wait(self) -> Result<MetadataBlob> {
        self.link.wait_for_metadata().await
    }

    pub fn wait_blocking(self) -> Result<MetadataBlob> {
        block_on(self.wait())
    }
}

/// Outstanding image dump request.
pub struct DumpRequest<'a, S, D> {
    link: &'a PmicLink<S, D>,
    _flag: InFlight<'a>,
}

impl<'a, S, D> DumpRequest<'a, S, D> {
    pub(crate) fn claim(link: &'a PmicLink<S, D>) -> Result<Self> {
        let flag = InFlight::claim(link, WaitKind::Dump)?;
        Ok(Self { link, _flag: flag })
    }

    /// Image size this dump expects.
    pub fn image_size(&self) -> u32 {
        self.link.with_state(|s| s.dump.size())
    }
}

impl<S: SerialPort, D: DelayNs> DumpRequest<'_, S, D> {
    pub async fn wait(self) -> Result<u32> {
        self.link.wait_for_dump().await
    }

    pub fn wait_blocking(self) -> Result<u32> {
        block_on(self.wait())
    }
}

/// Outstanding capacity-remaining request.
pub struct CapacityRequest<'a, S, D> {
    link: &'a PmicLink<S, D>,
    _flag: InFlight<'a>,
}

impl<'a, S, D> CapacityRequest<'a, S, D> {
    pub(crate) fn claim(link: &'a PmicLink<S, D>) -> Result<Self> {
        let flag = InFlight::claim(link, WaitKind::CapacityRemaining)?;
        Ok(Self { link, _flag: flag })
    }
}

impl<S: SerialPort, D: DelayNs> CapacityRequest<'_, S, D> {
    pub async fn wait(self) -> Result<CapacityRemaining> {
        self.link.wait_for_capacity_remaining().await
    }

    pub fn wait_blocking(self) -> Result<CapacityRemaining> {
        block_on(self.wait())
    }
}
