//! Adapters implementing the link's ports.

pub mod log_sink;

pub use log_sink::LogEventSink;
