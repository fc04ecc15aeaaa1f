//! Mock ports for integration tests.
//!
//! Every collaborator records what it was asked to do so tests can assert
//! on the full history. The serial mock shares its byte log through a
//! [`SerialTap`] so frames can be inspected while the link owns the port.

use std::sync::{Arc, Mutex};

use embedded_hal::delay::DelayNs;
use pmiclink::error::{StorageError, TransportError};
use pmiclink::events::LinkEvent;
use pmiclink::ports::{
    Collaborators, EventLogStore, EventSink, ImageSink, LineStatus, RtcPort, SerialPort,
    TemperatureLogStore,
};
use pmiclink::protocol::codec::decode_frame;
use pmiclink::protocol::ids::{CommandId, MessageTag};
use pmiclink::protocol::message::RawMessage;
use pmiclink::protocol::types::{DUMP_CHUNK_SIZE, RtcDateTime};
use pmiclink::{LinkConfig, PmicLink};

// ── Serial ────────────────────────────────────────────────────

pub struct MockSerial {
    sent: Arc<Mutex<Vec<u8>>>,
}

impl SerialPort for MockSerial {
    fn write_byte(&mut self, byte: u8) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(byte);
        Ok(())
    }

    fn line_status(&mut self) -> LineStatus {
        LineStatus(LineStatus::THR_EMPTY | LineStatus::TX_EMPTY)
    }
}

/// Read side of the serial mock's byte log.
#[derive(Clone)]
pub struct SerialTap {
    sent: Arc<Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl SerialTap {
    pub fn bytes(&self) -> Vec<u8> {
        self.sent.lock().unwrap().clone()
    }

    /// Every frame sent so far as `(command, payload)`.
    pub fn frames(&self) -> Vec<(u8, Vec<u8>)> {
        let bytes = self.bytes();
        let mut frames = Vec::new();
        let mut pos = 0;
        while pos + 1 < bytes.len() {
            let len = bytes[pos + 1] as usize;
            let view = decode_frame(&bytes[pos..pos + len]).expect("link sent a bad frame");
            frames.push((view.command, view.payload.to_vec()));
            pos += len;
        }
        frames
    }

    pub fn payloads_of(&self, command: CommandId) -> Vec<Vec<u8>> {
        self.frames()
            .into_iter()
            .filter(|(c, _)| *c == command.as_u8())
            .map(|(_, p)| p)
            .collect()
    }

    pub fn count(&self, command: CommandId) -> usize {
        self.payloads_of(command).len()
    }
}

pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

pub type TestLink = PmicLink<MockSerial, NoDelay>;

pub fn new_link(config: LinkConfig) -> (TestLink, SerialTap) {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let port = MockSerial { sent: sent.clone() };
    let link = PmicLink::new(port, NoDelay, config).unwrap();
    (link, SerialTap { sent })
}

/// Defaults with waits short enough for tests that expect a timeout.
pub fn fast_config() -> LinkConfig {
    LinkConfig {
        metadata_timeout_ms: 30,
        dump_timeout_ms: 30,
        capacity_timeout_ms: 30,
        queue_send_timeout_ms: 10,
        energy_store_wait_ms: 20,
        ..LinkConfig::default()
    }
}

// ── Storage / RTC / events ────────────────────────────────────

#[derive(Default)]
pub struct MemTemperatureLog {
    pub space: Option<u32>,
    pub readings: Vec<(u32, f32)>,
}

impl TemperatureLogStore for MemTemperatureLog {
    fn records_remaining(&mut self) -> Result<u32, StorageError> {
        self.space.ok_or(StorageError::ReadFailed)
    }

    fn write_reading(&mut self, timestamp: u32, celsius: f32) -> Result<(), StorageError> {
        self.readings.push((timestamp, celsius));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemEventLog {
    pub capacity: u32,
    pub stored: u32,
    pub records: Vec<Vec<u8>>,
    pub fail: bool,
}

impl EventLogStore for MemEventLog {
    fn capacity_frames(&mut self) -> Result<u32, StorageError> {
        Ok(self.capacity)
    }

    fn stored_frames(&mut self) -> Result<u32, StorageError> {
        Ok(self.stored)
    }

    fn append(&mut self, record: &[u8]) -> Result<(), StorageError> {
        if self.fail {
            return Err(StorageError::WriteFailed);
        }
        self.records.push(record.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemImage {
    pub writes: Vec<(u32, Vec<u8>)>,
    pub fail: bool,
}

impl ImageSink for MemImage {
    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), StorageError> {
        if self.fail {
            return Err(StorageError::WriteFailed);
        }
        self.writes.push((address, data.to_vec()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RtcCall {
    DisableAlarm,
    Set(RtcDateTime),
}

#[derive(Default)]
pub struct MockRtc {
    pub calls: Vec<RtcCall>,
}

impl RtcPort for MockRtc {
    fn disable_wake_alarm(&mut self) {
        self.calls.push(RtcCall::DisableAlarm);
    }

    fn set_time(&mut self, time: &RtcDateTime) {
        self.calls.push(RtcCall::Set(*time));
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<LinkEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &LinkEvent) {
        self.events.push(event.clone());
    }
}

/// Owns one of every mock port.
#[derive(Default)]
pub struct Ports {
    pub temperature_log: MemTemperatureLog,
    pub event_log: MemEventLog,
    pub image: MemImage,
    pub rtc: MockRtc,
    pub sink: RecordingSink,
}

impl Ports {
    pub fn collaborators(&mut self) -> Collaborators<'_> {
        Collaborators {
            temperature_log: &mut self.temperature_log,
            event_log: &mut self.event_log,
            image: &mut self.image,
            rtc: &mut self.rtc,
            events: &mut self.sink,
        }
    }
}

// ── Inbound message builders ──────────────────────────────────

pub fn raw(tag: MessageTag, payload: &[u8]) -> RawMessage {
    RawMessage::new(tag.as_u8(), payload).unwrap()
}

/// Status with a cold RTC and no GNSS fix.
#[allow(dead_code)]
pub fn status(tag: MessageTag, wake: u8) -> RawMessage {
    let mut p = vec![1, wake, 0, 0, 64 + 21, 0x80, 64 + 4, 0x00];
    p.extend_from_slice(&3600u16.to_le_bytes());
    p.push(55);
    p.extend_from_slice(&0u32.to_le_bytes());
    p.push(0);
    p.extend_from_slice(&500u32.to_le_bytes());
    p.push(0);
    p.extend_from_slice(&0u16.to_le_bytes());
    p.extend_from_slice(&0i32.to_le_bytes());
    p.extend_from_slice(&0i32.to_le_bytes());
    p.extend_from_slice(&0u32.to_le_bytes());
    p.push(0);
    raw(tag, &p)
}

#[allow(dead_code)]
pub fn metadata(total: u16, data: &[u8]) -> RawMessage {
    let mut p = total.to_le_bytes().to_vec();
    p.extend_from_slice(data);
    raw(MessageTag::Metadata, &p)
}

#[allow(dead_code)]
pub fn dump(offset: u32, fill: u8) -> RawMessage {
    let mut p = offset.to_le_bytes().to_vec();
    p.extend_from_slice(&[fill; DUMP_CHUNK_SIZE]);
    raw(MessageTag::Dump, &p)
}

/// Temperature burst of `n` readings at 20 °C.
#[allow(dead_code)]
pub fn temperature_log(sequence: u16, total: u16, n: u8) -> RawMessage {
    let mut p = 10_000u32.to_le_bytes().to_vec();
    p.extend_from_slice(&sequence.to_le_bytes());
    p.extend_from_slice(&total.to_le_bytes());
    p.extend_from_slice(&300u16.to_le_bytes());
    p.push(n);
    for _ in 0..n {
        p.extend_from_slice(&u16::from_le_bytes([0x00, 84]).to_le_bytes());
    }
    raw(MessageTag::TemperatureLog, &p)
}

#[allow(dead_code)]
pub fn event_log(code: u16, text: &str) -> RawMessage {
    let mut p = 77u32.to_le_bytes().to_vec();
    p.push(1);
    p.extend_from_slice(&code.to_le_bytes());
    p.push(text.len() as u8);
    p.extend_from_slice(text.as_bytes());
    raw(MessageTag::EventLog, &p)
}
