//! Inbound message dispatcher.
//!
//! A single worker drains the inbound queue in arrival order, parses each
//! [`RawMessage`] into a [`Message`] and routes it:
//!
//! ```text
//!   Status / TestResult ──▶ status snapshot (+ wake event for Status)
//!   TemperatureAlarm    ──▶ alarm flags event, or shutdown request
//!   Metadata / Dump     ──▶ reassembly ──▶ completion signal
//!   TemperatureLog      ──▶ TemperatureLogSession ──▶ ack
//!   EventLog            ──▶ EventLogSession ──▶ ack while space remains
//!   SelfTestResult      ──▶ snapshot + calibrated report event
//!   NdefData / Info /
//!   CapacityRemaining   ──▶ holding queues
//!   EnergyInfo          ──▶ snapshot
//!   StoreEnergyUseResult──▶ energy-store signal
//!   RtcUpdate           ──▶ RTC (alarm disabled first)
//! ```
//!
//! Bad input is logged and dropped; nothing here ever stops the worker.

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use super::PmicLink;
use super::event_log::EventLogSession;
use super::reassembly::DumpStep;
use super::temperature_log::{TemperatureAck, TemperatureLogSession};
use super::wait::send_or_drop;
use crate::error::{Error, TransferError};
use crate::events::LinkEvent;
use crate::ports::Collaborators;
use crate::protocol::message::{Message, RawMessage};
use crate::protocol::transport::SerialPort;
use crate::protocol::types::{
    CompanionStatus, DumpChunk, MetadataChunk, RtcDateTime, alarm_flags_for,
};

pub struct Dispatcher<'a, 'p, S, D> {
    link: &'a PmicLink<S, D>,
    ports: Collaborators<'p>,
    temperature: TemperatureLogSession,
    event_log: EventLogSession,
}

impl<'a, 'p, S: SerialPort, D: DelayNs> Dispatcher<'a, 'p, S, D> {
    pub fn new(link: &'a PmicLink<S, D>, ports: Collaborators<'p>) -> Self {
        let headroom = link.config().event_log_headroom_percent;
        Self {
            link,
            ports,
            temperature: TemperatureLogSession::new(),
            event_log: EventLogSession::new(headroom),
        }
    }

    /// Worker loop. Never returns.
    pub async fn run(&mut self) {
        info!("PMIC: dispatcher running");
        loop {
            let raw = self.link.inbound.receive().await;
            self.dispatch_raw(raw).await;
        }
    }

    /// Dispatch everything already queued. Returns the number handled.
    pub async fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(raw) = self.link.inbound.try_receive() {
            self.dispatch_raw(raw).await;
            handled += 1;
        }
        handled
    }

    pub async fn dispatch_raw(&mut self, raw: RawMessage) {
        match Message::parse(&raw) {
            Ok(msg) => self.dispatch(msg).await,
            Err(e) => warn!("PMIC: ignoring message: {}", e),
        }
    }

    pub async fn dispatch(&mut self, msg: Message) {
        match msg {
            Message::Status(status) => self.on_status(status, true),
            Message::TestResult(status) => self.on_status(status, false),
            Message::TemperatureAlarm(code) => self.on_temperature_alarm(code),
            Message::Metadata(chunk) => self.on_metadata(&chunk),
            Message::Dump(chunk) => self.on_dump(&chunk),
            Message::TemperatureLog(chunk) => {
                let code = self
                    .temperature
                    .process(&chunk, &mut *self.ports.temperature_log);
                if code != TemperatureAck::NoAckReceived {
                    if let Err(e) = self.link.send_temperature_ack(code, chunk.sequence).await {
                        error!("PMIC[temp]: ack failed: {}", e);
                    }
                }
            }
            Message::EventLog(entry) => {
                let epoch = self.link.retrieval_epoch();
                let ack = self
                    .event_log
                    .process(epoch, &entry, &mut *self.ports.event_log);
                if let Some(remaining) = ack {
                    if let Err(e) = self.link.send_log_ack(remaining).await {
                        error!("PMIC[evlog]: ack failed: {}", e);
                    }
                }
            }
            Message::SelfTestResult(result) => {
                self.link.on_self_test_result(result, &mut *self.ports.events);
            }
            Message::NdefData(payload) => {
                let timeout = self.link.config().queue_send_timeout_ms;
                send_or_drop(&self.link.ndef, payload, timeout, "NDEF").await;
            }
            Message::InfoRequest(payload) => {
                let timeout = self.link.config().queue_send_timeout_ms;
                send_or_drop(&self.link.info, payload, timeout, "info").await;
            }
            Message::CapacityRemaining(capacity) => {
                let timeout = self.link.config().queue_send_timeout_ms;
                send_or_drop(&self.link.capacity, capacity, timeout, "capacity").await;
            }
            Message::EnergyInfo(energy) => self.link.on_energy_info(energy),
            Message::StoreEnergyUseResult(code) => self.link.on_store_energy_result(code),
            Message::RtcUpdate(epoch_secs) => self.on_rtc_update(epoch_secs),
        }
    }

    fn on_status(&mut self, status: CompanionStatus, forward_wake: bool) {
        let wake = status.wake_reason();
        let raw_wake = status.wake_reason_raw;
        debug!(
            "PMIC: status v{} wake={} batt={}mV T={:.1}/{:.1}",
            status.version,
            raw_wake,
            status.battery_mv,
            status.local_celsius,
            status.remote_celsius
        );
        self.link.with_state(|s| s.status.store(status));

        if !forward_wake {
            return;
        }
        match wake {
            Some(reason) => self.ports.events.emit(&LinkEvent::Wake(reason)),
            None => warn!("PMIC: unmapped wake reason {}", raw_wake),
        }
    }

    fn on_temperature_alarm(&mut self, code: u8) {
        let event = match alarm_flags_for(code) {
            Some(flags) => {
                warn!("PMIC: temperature alarm {} (flags 0b{:04b})", code, flags);
                LinkEvent::TemperatureAlarm { code, flags }
            }
            None => {
                error!("PMIC: alarm code {} out of range, requesting shutdown", code);
                LinkEvent::ShutdownRequested { alarm_code: code }
            }
        };
        self.ports.events.emit(&event);
    }

    fn on_metadata(&mut self, chunk: &MetadataChunk) {
        let result = self.link.with_state(|s| s.metadata.append(chunk));
        match result {
            Ok(true) => {
                info!("PMIC[meta]: blob complete ({} bytes)", chunk.total_size);
                self.link.metadata_done.signal(Ok(()));
            }
            Ok(false) => {}
            Err(e) => {
                warn!("PMIC[meta]: transfer failed: {}", e);
                self.link.metadata_done.signal(Err(Error::Transfer(e)));
            }
        }
    }

    fn on_dump(&mut self, chunk: &DumpChunk) {
        let accepted = self.link.with_state(|s| s.dump.accept(chunk));
        let write = match accepted {
            Ok(DumpStep::Write(write)) => write,
            Ok(DumpStep::Complete) => {
                let written = self.link.with_state(|s| {
                    s.dump.finish();
                    s.dump.written()
                });
                self.link.dump_done.signal(Ok(written));
                return;
            }
            Err(TransferError::DumpNotActive) => {
                debug!("PMIC[dump]: chunk at +0x{:X} with no dump active", chunk.offset);
                return;
            }
            Err(e) => {
                warn!("PMIC[dump]: chunk rejected: {}", e);
                return;
            }
        };

        if let Err(e) = self.ports.image.write(write.address, &chunk.data[..write.len]) {
            error!("PMIC[dump]: image write at 0x{:08X} failed: {}", write.address, e);
            self.link.with_state(|s| s.dump.abort());
            self.link.dump_done.signal(Err(Error::Storage(e)));
            return;
        }
        self.link.with_state(|s| s.dump.record(&write));
    }

    fn on_rtc_update(&mut self, epoch_secs: u32) {
        self.ports.rtc.disable_wake_alarm();
        match RtcDateTime::from_epoch_secs(epoch_secs) {
            Some(time) => {
                info!(
                    "PMIC: RTC set to {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    time.year, time.month, time.day, time.hour, time.minute, time.second
                );
                self.ports.rtc.set_time(&time);
            }
            None => warn!("PMIC: RTC update {} not representable", epoch_secs),
        }
    }
}
