//! Unified error types for the companion link.
//!
//! A single `Error` enum that every layer converts into, so callers of the
//! request builders and wait primitives see one uniform failure type.
//! All variants are `Copy` so they can be logged and returned from the
//! dispatcher without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level link error
// ---------------------------------------------------------------------------

/// Every fallible link operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A frame could not be built or decoded.
    Frame(FrameError),
    /// The serial transport failed while sending.
    Transport(TransportError),
    /// No response arrived within the bounded wait.
    Timeout(WaitKind),
    /// A multi-packet transfer was rejected.
    Transfer(TransferError),
    /// A storage collaborator failed.
    Storage(StorageError),
    /// An inbound payload did not match its message layout.
    Malformed(ParseError),
    /// A request of this kind is already outstanding.
    RequestInFlight(WaitKind),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame(e) => write!(f, "frame: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Timeout(kind) => write!(f, "timeout waiting for {kind}"),
            Self::Transfer(e) => write!(f, "transfer: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Malformed(e) => write!(f, "malformed message: {e}"),
            Self::RequestInFlight(kind) => write!(f, "{kind} request already outstanding"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Frame errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Output buffer is smaller than the frame that would be built.
    BufferTooSmall { needed: usize, available: usize },
    /// Frame would not fit the one-byte length field.
    PayloadTooLarge(usize),
    /// Byte at a marker position is not the expected marker.
    BadMarker { offset: usize, found: u8 },
    /// Length field disagrees with the number of bytes supplied.
    LengthMismatch { declared: usize, actual: usize },
    /// XOR checksum does not match the frame contents.
    BadChecksum { expected: u8, found: u8 },
    /// Frame carries a protocol version this build does not speak.
    UnsupportedVersion(u8),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooSmall { needed, available } => {
                write!(f, "output buffer too small ({available} < {needed})")
            }
            Self::PayloadTooLarge(len) => write!(f, "payload of {len} bytes exceeds frame limit"),
            Self::BadMarker { offset, found } => {
                write!(f, "unexpected byte 0x{found:02X} at marker offset {offset}")
            }
            Self::LengthMismatch { declared, actual } => {
                write!(f, "length field {declared} but {actual} bytes present")
            }
            Self::BadChecksum { expected, found } => {
                write!(f, "checksum 0x{found:02X}, computed 0x{expected:02X}")
            }
            Self::UnsupportedVersion(v) => write!(f, "unsupported protocol version {v}"),
        }
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The UART refused the byte.
    WriteFailed,
    /// The transmitter never reported empty within the poll limit.
    DrainTimeout,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteFailed => write!(f, "UART write failed"),
            Self::DrainTimeout => write!(f, "transmitter did not drain"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Wait kinds (timeouts and in-flight guards)
// ---------------------------------------------------------------------------

/// Which request/response cycle a wait or guard belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKind {
    Metadata,
    Dump,
    CapacityRemaining,
    EnergyStore,
}

impl fmt::Display for WaitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metadata => write!(f, "metadata"),
            Self::Dump => write!(f, "dump"),
            Self::CapacityRemaining => write!(f, "capacity remaining"),
            Self::EnergyStore => write!(f, "energy store confirmation"),
        }
    }
}

// ---------------------------------------------------------------------------
// Transfer errors (reassembly)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferError {
    /// Metadata chunk would overrun the accumulator.
    MetadataOverflow { capacity: usize, attempted: usize },
    /// Metadata total exceeds what the accumulator can ever hold.
    MetadataTooLarge(usize),
    /// A later metadata chunk announced a different total size.
    MetadataSizeChanged { expected: usize, announced: usize },
    /// Dump chunk address lies outside the image region.
    DumpOutOfBounds { address: u32, base: u32, size: u32 },
    /// Dump chunk arrived with no dump request outstanding.
    DumpNotActive,
    /// A sub-protocol message arrived out of sequence.
    SequenceGap { expected: u16, received: u16 },
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MetadataOverflow {
                capacity,
                attempted,
            } => write!(f, "metadata overflow ({attempted} > {capacity})"),
            Self::MetadataTooLarge(size) => write!(f, "metadata size {size} exceeds buffer"),
            Self::MetadataSizeChanged {
                expected,
                announced,
            } => write!(f, "metadata size changed mid-transfer ({expected} -> {announced})"),
            Self::DumpOutOfBounds {
                address,
                base,
                size,
            } => write!(
                f,
                "dump address 0x{address:08X} outside 0x{base:08X}+{size}"
            ),
            Self::DumpNotActive => write!(f, "no dump in progress"),
            Self::SequenceGap { expected, received } => {
                write!(f, "sequence {received} received, expected {expected}")
            }
        }
    }
}

impl From<TransferError> for Error {
    fn from(e: TransferError) -> Self {
        Self::Transfer(e)
    }
}

// ---------------------------------------------------------------------------
// Storage errors (collaborator side)
// ---------------------------------------------------------------------------

/// Errors reported by the flash / log / image collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Partition or log is full.
    Full,
    /// Write or erase failed.
    WriteFailed,
    /// Read or scan failed.
    ReadFailed,
    /// Address outside the device.
    OutOfRange,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "storage full"),
            Self::WriteFailed => write!(f, "write failed"),
            Self::ReadFailed => write!(f, "read failed"),
            Self::OutOfRange => write!(f, "address out of range"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Parse errors (inbound payloads)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Tag is not one the companion is known to send.
    UnknownTag(u8),
    /// Payload ended before the layout was complete.
    Truncated { tag: u8, needed: usize, got: usize },
    /// A count field exceeds the bounded list it describes.
    CountTooLarge { tag: u8, count: usize, max: usize },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTag(tag) => write!(f, "unknown tag 0x{tag:02X}"),
            Self::Truncated { tag, needed, got } => {
                write!(f, "tag 0x{tag:02X} truncated ({got} of {needed} bytes)")
            }
            Self::CountTooLarge { tag, count, max } => {
                write!(f, "tag 0x{tag:02X} count {count} exceeds {max}")
            }
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Self::Malformed(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Link-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
