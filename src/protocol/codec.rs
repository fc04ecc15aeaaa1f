//! Companion link frame codec.
//!
//! Wire format:
//! ```text
//! ┌─────┬─────┬─────┬─────────┬─────────┬──────────────┬─────┬─────┬─────┐
//! │ SOH │ LEN │ STX │ version │ command │ payload (N B)│ ETX │ CHK │ EOT │
//! │ 01  │ u8  │ 02  │   00    │   u8    │              │ 03  │ xor │ 04  │
//! └─────┴─────┴─────┴─────────┴─────────┴──────────────┴─────┴─────┴─────┘
//! ```
//!
//! `LEN` is the size of the whole frame. `CHK` is the XOR of every byte
//! from `SOH` through `ETX` inclusive.
//!
//! [`build_frame`] lays out an outbound frame. On the receive side,
//! [`decode_frame`] validates one complete frame and [`FrameDecoder`]
//! recovers frames from a raw UART byte stream, resynchronising on `SOH`
//! after garbage or a bad checksum.

use log::warn;

use super::message::RawMessage;
use crate::error::FrameError;

pub const SOH: u8 = 0x01;
pub const STX: u8 = 0x02;
pub const ETX: u8 = 0x03;
pub const EOT: u8 = 0x04;

/// Protocol version spoken by this build.
pub const PROTOCOL_VERSION: u8 = 0x00;

/// Framing bytes: SOH, LEN, STX, ETX, CHK, EOT.
pub const PROTOCOL_OVERHEAD: usize = 6;

/// Message header bytes: version, command.
pub const MESSAGE_OVERHEAD: usize = 2;

/// Smallest legal frame (empty payload).
pub const MIN_FRAME_SIZE: usize = PROTOCOL_OVERHEAD + MESSAGE_OVERHEAD;

/// Largest frame the one-byte length field can describe.
pub const MAX_FRAME_SIZE: usize = u8::MAX as usize;

/// Largest payload a single frame can carry.
pub const MAX_FRAME_PAYLOAD: usize = MAX_FRAME_SIZE - MIN_FRAME_SIZE;

/// Frame size for a payload of `payload_len` bytes.
pub const fn frame_size(payload_len: usize) -> usize {
    payload_len + PROTOCOL_OVERHEAD + MESSAGE_OVERHEAD
}

/// XOR-fold of `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Build a frame for `command` carrying `payload` into `out`.
///
/// Returns the number of bytes written. Nothing is written when `out` is
/// too small or the frame would not fit the length field.
pub fn build_frame(command: u8, out: &mut [u8], payload: &[u8]) -> Result<usize, FrameError> {
    let size = frame_size(payload.len());
    if size > MAX_FRAME_SIZE {
        return Err(FrameError::PayloadTooLarge(payload.len()));
    }
    if out.len() < size {
        return Err(FrameError::BufferTooSmall {
            needed: size,
            available: out.len(),
        });
    }

    out[0] = SOH;
    out[1] = size as u8;
    out[2] = STX;
    out[3] = PROTOCOL_VERSION;
    out[4] = command;
    let etx = 5 + payload.len();
    out[5..etx].copy_from_slice(payload);
    out[etx] = ETX;
    out[etx + 1] = checksum(&out[..=etx]);
    out[etx + 2] = EOT;

    Ok(size)
}

/// A validated frame, borrowing its payload from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameView<'a> {
    pub command: u8,
    pub payload: &'a [u8],
}

/// Validate one complete frame and split out its command and payload.
pub fn decode_frame(frame: &[u8]) -> Result<FrameView<'_>, FrameError> {
    if frame.len() < MIN_FRAME_SIZE {
        return Err(FrameError::LengthMismatch {
            declared: frame.get(1).copied().unwrap_or(0) as usize,
            actual: frame.len(),
        });
    }
    expect_marker(frame, 0, SOH)?;
    let declared = frame[1] as usize;
    if declared != frame.len() {
        return Err(FrameError::LengthMismatch {
            declared,
            actual: frame.len(),
        });
    }
    expect_marker(frame, 2, STX)?;
    if frame[3] != PROTOCOL_VERSION {
        return Err(FrameError::UnsupportedVersion(frame[3]));
    }

    let etx = frame.len() - 3;
    expect_marker(frame, etx, ETX)?;
    expect_marker(frame, frame.len() - 1, EOT)?;

    let expected = checksum(&frame[..=etx]);
    let found = frame[etx + 1];
    if expected != found {
        return Err(FrameError::BadChecksum { expected, found });
    }

    Ok(FrameView {
        command: frame[4],
        payload: &frame[5..etx],
    })
}

fn expect_marker(frame: &[u8], offset: usize, marker: u8) -> Result<(), FrameError> {
    if frame[offset] == marker {
        Ok(())
    } else {
        Err(FrameError::BadMarker {
            offset,
            found: frame[offset],
        })
    }
}

/// Decoder state machine.
enum DecoderState {
    /// Discarding bytes until `SOH`.
    Seeking,
    /// `SOH` seen, next byte is the length.
    ReadingLength,
    /// Collecting the rest of a frame of `expected` bytes.
    ReadingBody { expected: usize, collected: usize },
}

/// Result of one byte through the state machine.
enum Step {
    Pending,
    Frame(RawMessage),
    /// A full-length frame failed validation.
    Rejected { expected: usize },
}

/// Streaming frame decoder for the receive side of the UART.
///
/// A frame that fails validation is rescanned from its next `SOH`, so a
/// stray start byte never swallows the good frames behind it.
pub struct FrameDecoder {
    state: DecoderState,
    buf: [u8; MAX_FRAME_SIZE],
    rejected: u32,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::Seeking,
            buf: [0; MAX_FRAME_SIZE],
            rejected: 0,
        }
    }

    /// Feed a run of bytes, handing every completed message to `sink`.
    pub fn feed(&mut self, data: &[u8], mut sink: impl FnMut(RawMessage)) {
        for &byte in data {
            self.push(byte, &mut sink);
        }
    }

    /// Push one byte, handing any message it completes to `sink`.
    ///
    /// One byte can complete several frames when a rejected frame is
    /// replayed from its next `SOH`.
    pub fn push(&mut self, byte: u8, sink: &mut impl FnMut(RawMessage)) {
        // Bytes still to run through the state machine. Everything held
        // here was in `buf` or is `byte`, so it never outgrows a frame.
        let mut replay = [0u8; MAX_FRAME_SIZE];
        replay[0] = byte;
        let (mut pos, mut len) = (0, 1);

        while pos < len {
            let b = replay[pos];
            pos += 1;
            match self.step(b) {
                Step::Pending => {}
                Step::Frame(msg) => sink(msg),
                Step::Rejected { expected } => {
                    let Some(soh) = self.buf[1..expected].iter().position(|&x| x == SOH) else {
                        continue;
                    };
                    let tail = &self.buf[1 + soh..expected];
                    let rest = &replay[pos..len];
                    let mut next = [0u8; MAX_FRAME_SIZE];
                    let t = tail.len().min(MAX_FRAME_SIZE);
                    next[..t].copy_from_slice(&tail[..t]);
                    let r = rest.len().min(MAX_FRAME_SIZE - t);
                    next[t..t + r].copy_from_slice(&rest[..r]);
                    replay = next;
                    pos = 0;
                    len = t + r;
                }
            }
        }
    }

    fn step(&mut self, byte: u8) -> Step {
        match self.state {
            DecoderState::Seeking => {
                if byte == SOH {
                    self.buf[0] = SOH;
                    self.state = DecoderState::ReadingLength;
                }
                Step::Pending
            }

            DecoderState::ReadingLength => {
                let expected = byte as usize;
                if expected < MIN_FRAME_SIZE {
                    self.rejected = self.rejected.wrapping_add(1);
                    self.state = if byte == SOH {
                        DecoderState::ReadingLength
                    } else {
                        DecoderState::Seeking
                    };
                    return Step::Pending;
                }
                self.buf[1] = byte;
                self.state = DecoderState::ReadingBody {
                    expected,
                    collected: 2,
                };
                Step::Pending
            }

            DecoderState::ReadingBody {
                expected,
                collected,
            } => {
                self.buf[collected] = byte;
                let collected = collected + 1;
                if collected < expected {
                    self.state = DecoderState::ReadingBody {
                        expected,
                        collected,
                    };
                    return Step::Pending;
                }

                self.state = DecoderState::Seeking;
                match decode_frame(&self.buf[..expected]) {
                    Ok(view) => RawMessage::new(view.command, view.payload)
                        .map_or(Step::Pending, Step::Frame),
                    Err(e) => {
                        self.rejected = self.rejected.wrapping_add(1);
                        warn!("PMIC: dropping inbound frame: {}", e);
                        Step::Rejected { expected }
                    }
                }
            }
        }
    }

    /// Frames discarded for bad length, markers, or checksum.
    pub fn rejected(&self) -> u32 {
        self.rejected
    }

    /// Reset decoder state (e.g. after the companion is power-cycled).
    pub fn reset(&mut self) {
        self.state = DecoderState::Seeking;
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────
