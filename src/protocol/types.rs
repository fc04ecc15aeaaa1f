//! Strongly-typed payloads exchanged with the companion.
//!
//! Every multi-byte field is little-endian. Parsing goes through a small
//! bounds-checked [`Reader`] so a short payload yields
//! [`ParseError::Truncated`] instead of a panic.

use chrono::{DateTime, Datelike, Timelike};
use heapless::{String, Vec};

use crate::error::ParseError;

/// Satellites reported in one GNSS status block.
pub const MAX_SATELLITES: usize = 12;
/// Status codes carried by one self-test result.
pub const MAX_STATUS_CODES: usize = 16;
/// Free-text bytes in one event-log entry.
pub const MAX_LOG_TEXT: usize = 64;
/// Temperature readings in one log chunk.
pub const MAX_READINGS_PER_CHUNK: usize = 64;
/// Image bytes in one dump chunk.
pub const DUMP_CHUNK_SIZE: usize = 128;
/// Largest inbound payload the framing collaborator may hand over.
pub const MAX_MESSAGE_PAYLOAD: usize = 512;

/// Opaque payload bytes.
pub type Payload = Vec<u8, MAX_MESSAGE_PAYLOAD>;

// ── Reader ───────────────────────────────────────────────────

/// Bounds-checked little-endian cursor over one payload.
pub(crate) struct Reader<'a> {
    tag: u8,
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(tag: u8, buf: &'a [u8]) -> Self {
        Self { tag, buf, pos: 0 }
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        let end = self.pos + n;
        if end > self.buf.len() {
            return Err(ParseError::Truncated {
                tag: self.tag,
                needed: end,
                got: self.buf.len(),
            });
        }
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, ParseError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn i16(&mut self) -> Result<i16, ParseError> {
        Ok(self.u16()? as i16)
    }

    pub(crate) fn u32(&mut self) -> Result<u32, ParseError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn i32(&mut self) -> Result<i32, ParseError> {
        Ok(self.u32()? as i32)
    }

    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }

    fn bounded_count(&mut self, max: usize) -> Result<usize, ParseError> {
        let count = self.u8()? as usize;
        if count > max {
            return Err(ParseError::CountTooLarge {
                tag: self.tag,
                count,
                max,
            });
        }
        Ok(count)
    }
}

// ── Temperatures ─────────────────────────────────────────────

/// Raw two-byte reading from the companion's temperature sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawTemperature {
    pub high: u8,
    pub low: u8,
}

impl RawTemperature {
    /// Unpack the little-endian sensor word used by the temperature log.
    pub fn from_packed(word: u16) -> Self {
        Self {
            high: (word >> 8) as u8,
            low: word as u8,
        }
    }

    /// Calibrated temperature: `(high - 64) + 0.0625 * (low >> 4)`.
    pub fn celsius(self) -> f32 {
        (self.high as f32 - 64.0) + 0.0625 * (self.low >> 4) as f32
    }
}

// ── Wake reasons / alarms ────────────────────────────────────

/// Why the companion woke the main processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WakeReason {
    PowerOn          = 0,
    RtcAlarm         = 1,
    Motion           = 2,
    TemperatureAlarm = 3,
    GnssFix          = 4,
    NfcField         = 5,
    LowBattery       = 6,
    ExternalInput    = 7,
}

impl WakeReason {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::PowerOn),
            1 => Some(Self::RtcAlarm),
            2 => Some(Self::Motion),
            3 => Some(Self::TemperatureAlarm),
            4 => Some(Self::GnssFix),
            5 => Some(Self::NfcField),
            6 => Some(Self::LowBattery),
            7 => Some(Self::ExternalInput),
            _ => None,
        }
    }
}

/// Internal alarm flag bits raised by a temperature alarm.
pub mod alarm_flags {
    pub const LOCAL_HIGH: u8 = 1 << 0;
    pub const LOCAL_LOW: u8 = 1 << 1;
    pub const REMOTE_HIGH: u8 = 1 << 2;
    pub const REMOTE_LOW: u8 = 1 << 3;
}

const FIRST_ALARM_CODE: u8 = 1;

/// Companion alarm code → internal flags, indexed by `code - 1`.
const ALARM_FLAG_TABLE: [u8; 4] = [
    alarm_flags::LOCAL_HIGH,
    alarm_flags::LOCAL_LOW,
    alarm_flags::REMOTE_HIGH,
    alarm_flags::REMOTE_LOW,
];

/// Map a companion alarm code to internal alarm flags.
///
/// Only codes `1..=4` are valid; anything else yields `None`.
pub fn alarm_flags_for(code: u8) -> Option<u8> {
    let index = code.checked_sub(FIRST_ALARM_CODE)? as usize;
    ALARM_FLAG_TABLE.get(index).copied()
}

// ── RTC-format time ──────────────────────────────────────────

/// Calendar time in the layout the node's RTC expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtcDateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl RtcDateTime {
    /// Convert seconds since the Unix epoch (UTC).
    pub fn from_epoch_secs(secs: u32) -> Option<Self> {
        let dt = DateTime::from_timestamp(i64::from(secs), 0)?.naive_utc();
        Some(Self {
            year: u16::try_from(dt.year()).ok()?,
            month: dt.month() as u8,
            day: dt.day() as u8,
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
            second: dt.second() as u8,
        })
    }
}

// ── Companion status ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Satellite {
    pub id: u8,
    pub snr: u8,
}

/// GNSS block nested in the status message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GnssStatus {
    /// 0 = no fix.
    pub fix_quality: u8,
    pub hdop: f32,
    /// Degrees × 10⁷.
    pub latitude_e7: i32,
    /// Degrees × 10⁷.
    pub longitude_e7: i32,
    pub utc_seconds: u32,
    pub satellites: Vec<Satellite, MAX_SATELLITES>,
}

impl GnssStatus {
    pub fn has_fix(&self) -> bool {
        self.fix_quality > 0
    }

    pub fn latitude_deg(&self) -> f64 {
        f64::from(self.latitude_e7) / 1e7
    }

    pub fn longitude_deg(&self) -> f64 {
        f64::from(self.longitude_e7) / 1e7
    }

    fn parse(r: &mut Reader<'_>) -> Result<Self, ParseError> {
        let fix_quality = r.u8()?;
        let hdop = f32::from(r.u16()?) / 100.0;
        let latitude_e7 = r.i32()?;
        let longitude_e7 = r.i32()?;
        let utc_seconds = r.u32()?;
        let count = r.bounded_count(MAX_SATELLITES)?;
        let mut satellites = Vec::new();
        for _ in 0..count {
            let sat = Satellite {
                id: r.u8()?,
                snr: r.u8()?,
            };
            // Capacity checked by bounded_count.
            let _ = satellites.push(sat);
        }
        Ok(Self {
            fix_quality,
            hdop,
            latitude_e7,
            longitude_e7,
            utc_seconds,
            satellites,
        })
    }
}

/// Latest companion status snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanionStatus {
    pub version: u8,
    /// Wake reason byte as sent; see [`Self::wake_reason`].
    pub wake_reason_raw: u8,
    pub motion_detected: bool,
    pub mode: u8,
    pub local_raw: RawTemperature,
    pub remote_raw: RawTemperature,
    pub local_celsius: f32,
    pub remote_celsius: f32,
    pub battery_mv: u16,
    pub harvester_duty: u8,
    pub rtc_seconds: u32,
    pub rtc_valid: bool,
    pub energy_used_mws: u32,
    pub gnss: GnssStatus,
    /// Companion RTC as calendar time, when the RTC is valid.
    pub rtc_time: Option<RtcDateTime>,
    /// GNSS UTC as calendar time, when there is a fix.
    pub gnss_time: Option<RtcDateTime>,
}

impl CompanionStatus {
    pub fn wake_reason(&self) -> Option<WakeReason> {
        WakeReason::from_u8(self.wake_reason_raw)
    }

    pub(crate) fn parse(tag: u8, payload: &[u8]) -> Result<Self, ParseError> {
        let mut r = Reader::new(tag, payload);
        let version = r.u8()?;
        let wake_reason_raw = r.u8()?;
        let motion_detected = r.u8()? != 0;
        let mode = r.u8()?;
        let local_raw = RawTemperature {
            high: r.u8()?,
            low: r.u8()?,
        };
        let remote_raw = RawTemperature {
            high: r.u8()?,
            low: r.u8()?,
        };
        let battery_mv = r.u16()?;
        let harvester_duty = r.u8()?;
        let rtc_seconds = r.u32()?;
        let rtc_valid = r.u8()? != 0;
        let energy_used_mws = r.u32()?;
        let gnss = GnssStatus::parse(&mut r)?;

        let rtc_time = if rtc_valid {
            RtcDateTime::from_epoch_secs(rtc_seconds)
        } else {
            None
        };
        let gnss_time = if gnss.has_fix() {
            RtcDateTime::from_epoch_secs(gnss.utc_seconds)
        } else {
            None
        };

        Ok(Self {
            version,
            wake_reason_raw,
            motion_detected,
            mode,
            local_raw,
            remote_raw,
            local_celsius: local_raw.celsius(),
            remote_celsius: remote_raw.celsius(),
            battery_mv,
            harvester_duty,
            rtc_seconds,
            rtc_valid,
            energy_used_mws,
            gnss,
            rtc_time,
            gnss_time,
        })
    }
}

// ── Self-test ────────────────────────────────────────────────

/// Self-test result as reported by the companion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelfTestResult {
    pub passed: bool,
    pub code_count: u8,
    pub movement: bool,
    pub accel: [i16; 3],
    pub voltage_mv: u16,
    pub temperature: RawTemperature,
    pub codes: Vec<u16, MAX_STATUS_CODES>,
}

impl SelfTestResult {
    pub(crate) fn parse(tag: u8, payload: &[u8]) -> Result<Self, ParseError> {
        let mut r = Reader::new(tag, payload);
        let passed = r.u8()? != 0;
        let count = r.bounded_count(MAX_STATUS_CODES)?;
        let movement = r.u8()? != 0;
        let accel = [r.i16()?, r.i16()?, r.i16()?];
        let voltage_mv = r.u16()?;
        let temperature = RawTemperature {
            high: r.u8()?,
            low: r.u8()?,
        };
        let mut codes = Vec::new();
        for _ in 0..count {
            let _ = codes.push(r.u16()?);
        }
        Ok(Self {
            passed,
            code_count: count as u8,
            movement,
            accel,
            voltage_mv,
            temperature,
            codes,
        })
    }

    /// Apply calibration for the upload record.
    pub fn calibrate(&self, sensitivity_lsb_per_g: f32) -> SelfTestReport {
        let g = |raw: i16| f32::from(raw) / sensitivity_lsb_per_g;
        SelfTestReport {
            passed: self.passed,
            movement: self.movement,
            accel_g: [g(self.accel[0]), g(self.accel[1]), g(self.accel[2])],
            voltage_v: f32::from(self.voltage_mv) / 1000.0,
            temperature_c: self.temperature.celsius(),
            codes: self.codes.clone(),
        }
    }
}

/// Calibrated self-test record destined for the upload/report path.
#[derive(Debug, Clone, PartialEq)]
pub struct SelfTestReport {
    pub passed: bool,
    pub movement: bool,
    pub accel_g: [f32; 3],
    pub voltage_v: f32,
    pub temperature_c: f32,
    pub codes: Vec<u16, MAX_STATUS_CODES>,
}

/// The main processor's own self-test outcome, reported to the companion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeSelfTest {
    pub passed: bool,
    pub codes: Vec<u16, MAX_STATUS_CODES>,
}

// ── Energy ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnergyResult {
    pub voltage_mv: u16,
    pub lowest_mv: u16,
    pub peak_current_ma: u16,
    pub cumulative_mws: u32,
    pub this_run_mws: u32,
}

impl EnergyResult {
    pub(crate) fn parse(tag: u8, payload: &[u8]) -> Result<Self, ParseError> {
        let mut r = Reader::new(tag, payload);
        Ok(Self {
            voltage_mv: r.u16()?,
            lowest_mv: r.u16()?,
            peak_current_ma: r.u16()?,
            cumulative_mws: r.u32()?,
            this_run_mws: r.u32()?,
        })
    }
}

/// Sentinel the companion sends when the energy figure was stored.
pub const ENERGY_STORE_SUCCESS: u8 = 0x01;
/// Sentinel the companion sends when storing failed.
pub const ENERGY_STORE_ERROR: u8 = 0xFF;

// ── Logs ─────────────────────────────────────────────────────

/// One burst of the temperature-log transfer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TemperatureLogChunk {
    pub timestamp: u32,
    pub sequence: u16,
    /// Total readings in the whole transfer; meaningful on sequence 0.
    pub total_readings: u16,
    pub interval_s: u16,
    /// Packed little-endian sensor words.
    pub readings: Vec<u16, MAX_READINGS_PER_CHUNK>,
}

impl TemperatureLogChunk {
    pub(crate) fn parse(tag: u8, payload: &[u8]) -> Result<Self, ParseError> {
        let mut r = Reader::new(tag, payload);
        let timestamp = r.u32()?;
        let sequence = r.u16()?;
        let total_readings = r.u16()?;
        let interval_s = r.u16()?;
        let count = r.bounded_count(MAX_READINGS_PER_CHUNK)?;
        let mut readings = Vec::new();
        for _ in 0..count {
            let _ = readings.push(r.u16()?);
        }
        Ok(Self {
            timestamp,
            sequence,
            total_readings,
            interval_s,
            readings,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Severity {
    Debug   = 0,
    Info    = 1,
    Warning = 2,
    Error   = 3,
    Fatal   = 4,
}

impl Severity {
    /// Unknown severities are treated as errors.
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Debug,
            1 => Self::Info,
            2 => Self::Warning,
            3 => Self::Error,
            _ => Self::Fatal,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Debug => "DBG",
            Self::Info => "INF",
            Self::Warning => "WRN",
            Self::Error => "ERR",
            Self::Fatal => "FTL",
        }
    }
}

/// One companion event-log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLogEntry {
    pub timestamp: u32,
    pub severity: Severity,
    pub code: u16,
    pub message: String<MAX_LOG_TEXT>,
}

impl EventLogEntry {
    pub(crate) fn parse(tag: u8, payload: &[u8]) -> Result<Self, ParseError> {
        let mut r = Reader::new(tag, payload);
        let timestamp = r.u32()?;
        let severity = Severity::from_u8(r.u8()?);
        let code = r.u16()?;
        let len = r.u8()? as usize;
        let text = r.take(len.min(MAX_LOG_TEXT))?;
        let mut message = String::new();
        for &b in text {
            let c = if b.is_ascii() && !b.is_ascii_control() {
                b as char
            } else {
                '?'
            };
            let _ = message.push(c);
        }
        Ok(Self {
            timestamp,
            severity,
            code,
            message,
        })
    }
}

// ── Reassembly chunks ────────────────────────────────────────

/// One slice of the metadata blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataChunk {
    /// Size of the complete blob.
    pub total_size: u16,
    pub data: Payload,
}

impl MetadataChunk {
    pub(crate) fn parse(tag: u8, payload: &[u8]) -> Result<Self, ParseError> {
        let mut r = Reader::new(tag, payload);
        let total_size = r.u16()?;
        let mut data = Payload::new();
        // rest() is always shorter than the payload it came from.
        let _ = data.extend_from_slice(r.rest());
        Ok(Self { total_size, data })
    }
}

/// One 128-byte slice of the companion image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpChunk {
    /// Offset relative to the image base.
    pub offset: u32,
    pub data: [u8; DUMP_CHUNK_SIZE],
}

impl DumpChunk {
    pub(crate) fn parse(tag: u8, payload: &[u8]) -> Result<Self, ParseError> {
        let mut r = Reader::new(tag, payload);
        let offset = r.u32()?;
        let mut data = [0u8; DUMP_CHUNK_SIZE];
        data.copy_from_slice(r.take(DUMP_CHUNK_SIZE)?);
        Ok(Self { offset, data })
    }
}

/// Companion storage headroom reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityRemaining {
    pub bytes_free: u32,
    pub records_pending: u16,
}

impl CapacityRemaining {
    pub(crate) fn parse(tag: u8, payload: &[u8]) -> Result<Self, ParseError> {
        let mut r = Reader::new(tag, payload);
        Ok(Self {
            bytes_free: r.u32()?,
            records_pending: r.u16()?,
        })
    }
}

// ── Outbound records ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

/// Identity record embedded in the power-up status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemInfo {
    pub bootloader: Version,
    pub app: Version,
    pub hardware: u8,
    pub serial_number: u32,
    pub asset_id: [u8; 8],
}

impl SystemInfo {
    pub const ENCODED_LEN: usize = 3 + 3 + 1 + 4 + 8;

    pub fn encode(&self, out: &mut [u8; Self::ENCODED_LEN]) {
        out[0] = self.bootloader.major;
        out[1] = self.bootloader.minor;
        out[2] = self.bootloader.patch;
        out[3] = self.app.major;
        out[4] = self.app.minor;
        out[5] = self.app.patch;
        out[6] = self.hardware;
        out[7..11].copy_from_slice(&self.serial_number.to_le_bytes());
        out[11..19].copy_from_slice(&self.asset_id);
    }
}

/// Power-up mode bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PowerUpMode {
    pub signed_firmware: bool,
    pub engineering_mode: bool,
}

impl PowerUpMode {
    pub const SIGNED: u8 = 1 << 0;
    pub const ENGINEERING: u8 = 1 << 1;

    pub fn to_byte(self) -> u8 {
        let mut b = 0;
        if self.signed_firmware {
            b |= Self::SIGNED;
        }
        if self.engineering_mode {
            b |= Self::ENGINEERING;
        }
        b
    }
}
