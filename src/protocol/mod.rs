//! Wire-level half of the companion link.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Protocol Stack                           │
//! │                                                              │
//! │  outbound:  payload ──▶ codec::build_frame ──▶ Transport     │
//! │                                      (paced, byte at a time) │
//! │                                                              │
//! │  inbound:   UART bytes ──▶ FrameDecoder ──▶ RawMessage       │
//! │                                   │                          │
//! │                                   ▼                          │
//! │                         Message::parse (typed enum)          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Frame layout:
//!
//! ```text
//! SOH | LEN | STX | VER | CMD | payload… | ETX | CHK | EOT
//! ```
//!
//! `LEN` is the size of the whole frame; `CHK` is the XOR of every byte
//! from `SOH` through `ETX`.

pub mod codec;
pub mod ids;
pub mod message;
pub mod transport;
pub mod types;

pub use ids::{CommandId, MessageTag};
pub use message::{Message, RawMessage};
