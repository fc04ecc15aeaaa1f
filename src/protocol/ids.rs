//! Command ids (main → companion) and message tags (companion → main).
//!
//! Both travel in the same byte of the frame: the one after the protocol
//! version. The direction of the frame decides which table applies.

/// Outbound command identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandId {
    PowerUpStatus            = 0x01,
    /// Status poll; the companion answers with a `TestResult` message.
    TestCommand              = 0x02,
    PowerDownStatus          = 0x03,
    UpdateParameter          = 0x04,
    RequestMetadata          = 0x05,
    RunSelfTest              = 0x06,
    NdefRecords              = 0x07,
    ReadNdefRecords          = 0x08,
    RequestCapacityRemaining = 0x09,
    LogReceivedAck           = 0x0A,
    TemperatureReceivedAck   = 0x0B,
    RequestDump              = 0x0C,
    SelfTestResults          = 0x0D,
    RequestEnergy            = 0x0E,
    StoreEnergyUse           = 0x0F,
}

impl CommandId {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Inbound message type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageTag {
    Status                = 0x10,
    TestResult            = 0x11,
    TemperatureLog        = 0x12,
    TemperatureAlarm      = 0x13,
    Metadata              = 0x14,
    SelfTestResult        = 0x15,
    NdefData              = 0x16,
    InfoRequest           = 0x17,
    CapacityRemainingInfo = 0x18,
    EventLog              = 0x19,
    Dump                  = 0x1A,
    RtcUpdate             = 0x1B,
    EnergyInfo            = 0x1C,
    StoreEnergyUseResult  = 0x1D,
}

impl MessageTag {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0x10 => Some(Self::Status),
            0x11 => Some(Self::TestResult),
            0x12 => Some(Self::TemperatureLog),
            0x13 => Some(Self::TemperatureAlarm),
            0x14 => Some(Self::Metadata),
            0x15 => Some(Self::SelfTestResult),
            0x16 => Some(Self::NdefData),
            0x17 => Some(Self::InfoRequest),
            0x18 => Some(Self::CapacityRemainingInfo),
            0x19 => Some(Self::EventLog),
            0x1A => Some(Self::Dump),
            0x1B => Some(Self::RtcUpdate),
            0x1C => Some(Self::EnergyInfo),
            0x1D => Some(Self::StoreEnergyUseResult),
            _    => None,
        }
    }
}
