//! Fuzz target: `FrameDecoder::feed` / `Message::parse`
//!
//! Drives arbitrary bytes through the streaming decoder and parses every
//! frame it yields. Neither step may panic, every yielded payload must fit
//! a frame, and a second decoder fed the same bytes must yield the same frames.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use pmiclink::protocol::codec::{FrameDecoder, MAX_FRAME_PAYLOAD};
use pmiclink::protocol::message::Message;

fuzz_target!(|data: &[u8]| {
    let mut decoder = FrameDecoder::new();
    let mut first = Vec::new();
    decoder.feed(data, |msg| {
        assert!(msg.payload.len() <= MAX_FRAME_PAYLOAD, "payload exceeds frame");
        let _ = Message::parse(&msg);
        first.push(msg);
    });

    let mut fresh = FrameDecoder::new();
    let mut second = Vec::new();
    fresh.feed(data, |msg| second.push(msg));
    assert_eq!(first, second, "decoding must be deterministic");
});
