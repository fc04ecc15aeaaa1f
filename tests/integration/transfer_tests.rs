//! Request/response cycles: metadata, image dump, capacity remaining.

use futures_lite::future::block_on;
use pmiclink::error::{Error, StorageError, TransferError, WaitKind};
use pmiclink::protocol::ids::{CommandId, MessageTag};
use pmiclink::{Dispatcher, LinkConfig};

use crate::mock_ports::{Ports, dump, fast_config, metadata, new_link, raw};

// ── Metadata ──────────────────────────────────────────────────

#[test]
fn metadata_valid_only_after_last_chunk() {
    let (link, tap) = new_link(LinkConfig::default());
    let mut ports = Ports::default();
    let mut dispatcher = Dispatcher::new(&link, ports.collaborators());

    let request = block_on(link.request_metadata()).unwrap();
    assert_eq!(tap.bytes(), vec![0x01, 0x08, 0x02, 0x00, 0x05, 0x03, 0x0D, 0x04]);

    link.submit(metadata(500, &[b' '; 300]));
    block_on(dispatcher.process_pending());
    assert!(!link.metadata_valid());
    assert_eq!(link.metadata_received(), 300);

    link.submit(metadata(500, &[b' '; 200]));
    block_on(dispatcher.process_pending());
    assert!(link.metadata_valid());

    let blob = request.wait_blocking().unwrap();
    assert_eq!(blob.len(), 500);
}

#[test]
fn new_request_resets_partial_metadata() {
    let (link, _tap) = new_link(fast_config());
    let mut ports = Ports::default();
    let mut dispatcher = Dispatcher::new(&link, ports.collaborators());

    let first = block_on(link.request_metadata()).unwrap();
    link.submit(metadata(400, &[0; 100]));
    block_on(dispatcher.process_pending());
    assert_eq!(link.metadata_received(), 100);
    drop(first);

    let _second = block_on(link.request_metadata()).unwrap();
    assert_eq!(link.metadata_received(), 0);
    assert!(!link.metadata_valid());
}

#[test]
fn one_metadata_request_at_a_time() {
    let (link, tap) = new_link(LinkConfig::default());

    let first = block_on(link.request_metadata()).unwrap();
    assert!(matches!(
        block_on(link.request_metadata()),
        Err(Error::RequestInFlight(WaitKind::Metadata))
    ));
    assert_eq!(tap.count(CommandId::RequestMetadata), 1);

    drop(first);
    assert!(block_on(link.request_metadata()).is_ok());
}

#[test]
fn metadata_timeout_invalidates() {
    let (link, _tap) = new_link(fast_config());
    let mut ports = Ports::default();
    let mut dispatcher = Dispatcher::new(&link, ports.collaborators());

    let request = block_on(link.request_metadata()).unwrap();
    link.submit(metadata(500, &[0; 300]));
    block_on(dispatcher.process_pending());

    assert_eq!(
        request.wait_blocking(),
        Err(Error::Timeout(WaitKind::Metadata))
    );
    assert!(!link.metadata_valid());
    assert!(!link.is_in_flight(WaitKind::Metadata));
}

#[test]
fn metadata_overflow_fails_the_wait() {
    let (link, _tap) = new_link(LinkConfig::default());
    let mut ports = Ports::default();
    let mut dispatcher = Dispatcher::new(&link, ports.collaborators());

    let request = block_on(link.request_metadata()).unwrap();
    link.submit(metadata(100, &[0; 80]));
    link.submit(metadata(100, &[0; 80]));
    block_on(dispatcher.process_pending());

    assert_eq!(
        request.wait_blocking(),
        Err(Error::Transfer(TransferError::MetadataOverflow {
            capacity: 100,
            attempted: 160
        }))
    );
}

// ── Dump ──────────────────────────────────────────────────────

#[test]
fn dump_sized_from_metadata_completes_on_sentinel() {
    let (link, tap) = new_link(LinkConfig::default());
    let mut ports = Ports::default();
    let mut dispatcher = Dispatcher::new(&link, ports.collaborators());

    let json = br#"{"image_size":300}"#;
    let meta = block_on(link.request_metadata()).unwrap();
    link.submit(metadata(json.len() as u16, json));
    block_on(dispatcher.process_pending());
    meta.wait_blocking().unwrap();

    let request = block_on(link.request_dump()).unwrap();
    assert_eq!(request.image_size(), 300);
    assert_eq!(tap.count(CommandId::RequestDump), 1);

    link.submit(dump(0, 0x11));
    link.submit(dump(128, 0x22));
    link.submit(dump(256, 0x33));
    assert_eq!(block_on(dispatcher.process_pending()), 3);
    assert!(!link.dump_complete());

    link.submit(dump(299, 0x44));
    block_on(dispatcher.process_pending());
    assert!(link.dump_complete());
    assert_eq!(request.wait_blocking(), Ok(128 + 128 + 44));
    drop(dispatcher);

    let base = LinkConfig::default().dump_base_address;
    let writes: Vec<(u32, usize)> = ports
        .image
        .writes
        .iter()
        .map(|(a, d)| (*a, d.len()))
        .collect();
    assert_eq!(
        writes,
        vec![(base, 128), (base + 128, 128), (base + 256, 44)],
        "the sentinel chunk is not image data"
    );
}

#[test]
fn dump_falls_back_to_default_size_and_rejects_out_of_bounds() {
    let config = LinkConfig {
        default_dump_size: 256,
        ..LinkConfig::default()
    };
    let base = config.dump_base_address;
    let (link, _tap) = new_link(config);
    let mut ports = Ports::default();
    let mut dispatcher = Dispatcher::new(&link, ports.collaborators());

    let request = block_on(link.request_dump()).unwrap();
    assert_eq!(request.image_size(), 256);

    link.submit(dump(0, 0x11));
    link.submit(dump(128, 0x22));
    link.submit(dump(256, 0xEE));
    link.submit(dump(0x1000, 0xEE));
    link.submit(dump(255, 0x01));
    block_on(dispatcher.process_pending());
    assert_eq!(request.wait_blocking(), Ok(256));
    drop(dispatcher);

    let writes: Vec<(u32, usize)> = ports
        .image
        .writes
        .iter()
        .map(|(a, d)| (*a, d.len()))
        .collect();
    assert_eq!(writes, vec![(base, 128), (base + 128, 128)]);
    assert!(ports.image.writes.iter().all(|(_, d)| d[0] != 0x01));
}

#[test]
fn sentinel_completes_even_when_the_sink_is_failing() {
    let config = LinkConfig {
        default_dump_size: 256,
        ..LinkConfig::default()
    };
    let (link, _tap) = new_link(config);
    let mut ports = Ports::default();
    ports.image.fail = true;
    let mut dispatcher = Dispatcher::new(&link, ports.collaborators());

    let request = block_on(link.request_dump()).unwrap();
    link.submit(dump(255, 0x01));
    block_on(dispatcher.process_pending());
    assert_eq!(request.wait_blocking(), Ok(0));
    assert!(link.dump_complete());
}

#[test]
fn completed_dump_resets_expected_size() {
    let (link, _tap) = new_link(LinkConfig::default());
    let mut ports = Ports::default();
    let mut dispatcher = Dispatcher::new(&link, ports.collaborators());

    let size = LinkConfig::default().default_dump_size;
    let request = block_on(link.request_dump()).unwrap();
    link.submit(dump(size - 1, 0));
    block_on(dispatcher.process_pending());
    assert_eq!(request.image_size(), 0);
    request.wait_blocking().unwrap();

    // Chunks after completion are not written anywhere.
    link.submit(dump(0, 0xAB));
    block_on(dispatcher.process_pending());
    drop(dispatcher);
    assert!(ports.image.writes.is_empty());
}

#[test]
fn dump_chunk_without_request_is_ignored() {
    let (link, _tap) = new_link(LinkConfig::default());
    let mut ports = Ports::default();
    let mut dispatcher = Dispatcher::new(&link, ports.collaborators());

    link.submit(dump(0, 0xAB));
    block_on(dispatcher.process_pending());
    drop(dispatcher);
    assert!(ports.image.writes.is_empty());
}

#[test]
fn dump_sink_failure_fails_the_wait() {
    let (link, _tap) = new_link(LinkConfig::default());
    let mut ports = Ports::default();
    ports.image.fail = true;
    let mut dispatcher = Dispatcher::new(&link, ports.collaborators());

    let request = block_on(link.request_dump()).unwrap();
    link.submit(dump(0, 0xAB));
    block_on(dispatcher.process_pending());
    assert_eq!(
        request.wait_blocking(),
        Err(Error::Storage(StorageError::WriteFailed))
    );
}

#[test]
fn dump_timeout() {
    let (link, _tap) = new_link(fast_config());
    let request = block_on(link.request_dump()).unwrap();
    assert_eq!(request.wait_blocking(), Err(Error::Timeout(WaitKind::Dump)));
    assert!(!link.dump_complete());
}

// ── Capacity remaining ────────────────────────────────────────

#[test]
fn capacity_reply_delivered_to_waiter() {
    let (link, tap) = new_link(LinkConfig::default());
    let mut ports = Ports::default();
    let mut dispatcher = Dispatcher::new(&link, ports.collaborators());

    let request = block_on(link.request_capacity_remaining()).unwrap();
    assert_eq!(tap.count(CommandId::RequestCapacityRemaining), 1);

    let mut p = 8192u32.to_le_bytes().to_vec();
    p.extend_from_slice(&12u16.to_le_bytes());
    link.submit(raw(MessageTag::CapacityRemainingInfo, &p));
    block_on(dispatcher.process_pending());

    let capacity = request.wait_blocking().unwrap();
    assert_eq!(capacity.bytes_free, 8192);
    assert_eq!(capacity.records_pending, 12);
}

#[test]
fn stale_capacity_reply_is_discarded_by_next_request() {
    let (link, _tap) = new_link(fast_config());
    let mut ports = Ports::default();
    let mut dispatcher = Dispatcher::new(&link, ports.collaborators());

    let mut p = 1u32.to_le_bytes().to_vec();
    p.extend_from_slice(&0u16.to_le_bytes());
    link.submit(raw(MessageTag::CapacityRemainingInfo, &p));
    block_on(dispatcher.process_pending());

    let request = block_on(link.request_capacity_remaining()).unwrap();
    assert_eq!(
        request.wait_blocking(),
        Err(Error::Timeout(WaitKind::CapacityRemaining))
    );
}
