//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises one part of the link
//! against mock ports. All tests run on the host with no companion or
//! UART attached.

mod mock_ports;
mod request_tests;
mod transfer_tests;
