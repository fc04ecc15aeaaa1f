//! Inbound messages: the raw `{tag, payload}` pair and its typed form.
//!
//! [`RawMessage`] is what the framing layer produces. [`Message::parse`]
//! turns it into one variant per tag; the dispatcher matches on that
//! exhaustively.

use heapless::Vec;

use super::ids::MessageTag;
use super::types::{
    CapacityRemaining, CompanionStatus, DumpChunk, EnergyResult, EventLogEntry, MetadataChunk,
    Payload, Reader, SelfTestResult, TemperatureLogChunk, MAX_MESSAGE_PAYLOAD,
};
use crate::error::ParseError;

/// One decoded message, not yet interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub tag: u8,
    pub payload: Payload,
}

impl RawMessage {
    /// Copy `payload` into a new message. `None` when it exceeds
    /// [`MAX_MESSAGE_PAYLOAD`].
    pub fn new(tag: u8, payload: &[u8]) -> Option<Self> {
        let payload = Vec::from_slice(payload).ok()?;
        Some(Self { tag, payload })
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Typed inbound message.
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::large_enum_variant)]
pub enum Message {
    Status(CompanionStatus),
    /// Reply to the status poll; same layout as `Status`.
    TestResult(CompanionStatus),
    TemperatureLog(TemperatureLogChunk),
    TemperatureAlarm(u8),
    Metadata(MetadataChunk),
    SelfTestResult(SelfTestResult),
    NdefData(Payload),
    InfoRequest(Payload),
    CapacityRemaining(CapacityRemaining),
    EventLog(EventLogEntry),
    Dump(DumpChunk),
    /// Seconds since the Unix epoch.
    RtcUpdate(u32),
    EnergyInfo(EnergyResult),
    /// Raw result byte; only [`ENERGY_STORE_SUCCESS`](super::types::ENERGY_STORE_SUCCESS) means stored.
    StoreEnergyUseResult(u8),
}

impl Message {
    pub fn parse(raw: &RawMessage) -> Result<Self, ParseError> {
        let tag = MessageTag::from_u8(raw.tag).ok_or(ParseError::UnknownTag(raw.tag))?;
        let t = raw.tag;
        let p = &raw.payload[..];
        let msg = match tag {
            MessageTag::Status => Self::Status(CompanionStatus::parse(t, p)?),
            MessageTag::TestResult => Self::TestResult(CompanionStatus::parse(t, p)?),
            MessageTag::TemperatureLog => Self::TemperatureLog(TemperatureLogChunk::parse(t, p)?),
            MessageTag::TemperatureAlarm => Self::TemperatureAlarm(Reader::new(t, p).u8()?),
            MessageTag::Metadata => Self::Metadata(MetadataChunk::parse(t, p)?),
            MessageTag::SelfTestResult => Self::SelfTestResult(SelfTestResult::parse(t, p)?),
            MessageTag::NdefData => Self::NdefData(raw.payload.clone()),
            MessageTag::InfoRequest => Self::InfoRequest(raw.payload.clone()),
            MessageTag::CapacityRemainingInfo => {
                Self::CapacityRemaining(CapacityRemaining::parse(t, p)?)
            }
            MessageTag::EventLog => Self::EventLog(EventLogEntry::parse(t, p)?),
            MessageTag::Dump => Self::Dump(DumpChunk::parse(t, p)?),
            MessageTag::RtcUpdate => Self::RtcUpdate(Reader::new(t, p).u32()?),
            MessageTag::EnergyInfo => Self::EnergyInfo(EnergyResult::parse(t, p)?),
            MessageTag::StoreEnergyUseResult => {
                Self::StoreEnergyUseResult(Reader::new(t, p).u8()?)
            }
        };
        Ok(msg)
    }

    pub fn tag(&self) -> MessageTag {
        match self {
            Self::Status(_) => MessageTag::Status,
            Self::TestResult(_) => MessageTag::TestResult,
            Self::TemperatureLog(_) => MessageTag::TemperatureLog,
            Self::TemperatureAlarm(_) => MessageTag::TemperatureAlarm,
            Self::Metadata(_) => MessageTag::Metadata,
            Self::SelfTestResult(_) => MessageTag::SelfTestResult,
            Self::NdefData(_) => MessageTag::NdefData,
            Self::InfoRequest(_) => MessageTag::InfoRequest,
            Self::CapacityRemaining(_) => MessageTag::CapacityRemainingInfo,
            Self::EventLog(_) => MessageTag::EventLog,
            Self::Dump(_) => MessageTag::Dump,
            Self::RtcUpdate(_) => MessageTag::RtcUpdate,
            Self::EnergyInfo(_) => MessageTag::EnergyInfo,
            Self::StoreEnergyUseResult(_) => MessageTag::StoreEnergyUseResult,
        }
    }
}

const _: () = assert!(MAX_MESSAGE_PAYLOAD >= super::codec::MAX_FRAME_PAYLOAD);
