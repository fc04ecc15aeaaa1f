//! Companion link library.
//!
//! Protocol engine for the serial link between the sensor node's main
//! application processor and its power-management companion: frame codec,
//! paced half-duplex transport, typed inbound messages, the dispatcher,
//! multi-packet reassembly and the acknowledgement sub-protocols.
//!
//! Hardware (UART, flash logs, RTC) is reached only through the traits in
//! [`ports`], so everything here runs on the host in tests.

#![deny(unused_must_use)]

pub mod adapters;
pub mod config;
pub mod error;
pub mod events;
pub mod link;
pub mod ports;
pub mod protocol;

pub use config::LinkConfig;
pub use error::{Error, Result};
pub use events::LinkEvent;
pub use link::{Dispatcher, PmicLink};
