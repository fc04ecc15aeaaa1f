//! Outbound request builders: command ids and payload layouts on the wire.

use futures_lite::future::block_on;
use pmiclink::error::{Error, FrameError};
use pmiclink::link::temperature_log::TemperatureAck;
use pmiclink::protocol::codec::MAX_FRAME_PAYLOAD;
use pmiclink::protocol::ids::CommandId;
use pmiclink::protocol::types::{NodeSelfTest, PowerUpMode, SystemInfo, Version};
use pmiclink::LinkConfig;

use crate::mock_ports::{fast_config, new_link};

#[test]
fn simple_commands_carry_no_payload() {
    let (link, tap) = new_link(LinkConfig::default());
    block_on(async {
        link.poll_status().await.unwrap();
        link.request_energy().await.unwrap();
        link.read_ndef_records().await.unwrap();
    });
    assert_eq!(
        tap.frames(),
        vec![
            (CommandId::TestCommand.as_u8(), vec![]),
            (CommandId::RequestEnergy.as_u8(), vec![]),
            (CommandId::ReadNdefRecords.as_u8(), vec![]),
        ]
    );
}

#[test]
fn power_up_status_layout() {
    let (link, tap) = new_link(LinkConfig::default());
    let info = SystemInfo {
        bootloader: Version {
            major: 1,
            minor: 2,
            patch: 3,
        },
        app: Version {
            major: 4,
            minor: 5,
            patch: 6,
        },
        hardware: 7,
        serial_number: 0x0A0B_0C0D,
        asset_id: *b"RAIL0042",
    };
    let mode = PowerUpMode {
        signed_firmware: true,
        engineering_mode: false,
    };
    let epoch = link.retrieval_epoch();
    block_on(link.send_power_up_status(mode, &info)).unwrap();

    let mut expected = vec![0x01, 1, 2, 3, 4, 5, 6, 7, 0x0D, 0x0C, 0x0B, 0x0A];
    expected.extend_from_slice(b"RAIL0042");
    assert_eq!(tap.payloads_of(CommandId::PowerUpStatus), vec![expected]);
    assert_eq!(link.retrieval_epoch(), epoch + 1, "power-up starts a log cycle");
}

#[test]
fn power_down_and_parameter_layouts() {
    let (link, tap) = new_link(LinkConfig::default());
    block_on(async {
        link.send_power_down_status(2, 3600).await.unwrap();
        link.update_parameters(0x10, &[0xAA, 0xBB]).await.unwrap();
        link.run_self_test(0x0F).await.unwrap();
        link.write_ndef_records(&[0xD1, 0x01, 0x00]).await.unwrap();
    });
    assert_eq!(
        tap.payloads_of(CommandId::PowerDownStatus),
        vec![vec![2, 0x10, 0x0E, 0x00, 0x00]]
    );
    assert_eq!(
        tap.payloads_of(CommandId::UpdateParameter),
        vec![vec![0x10, 0xAA, 0xBB]]
    );
    assert_eq!(tap.payloads_of(CommandId::RunSelfTest), vec![vec![0x0F]]);
    assert_eq!(
        tap.payloads_of(CommandId::NdefRecords),
        vec![vec![0xD1, 0x01, 0x00]]
    );
}

#[test]
fn oversized_parameter_group_is_refused_before_sending() {
    let (link, tap) = new_link(LinkConfig::default());
    let data = vec![0u8; MAX_FRAME_PAYLOAD];
    assert_eq!(
        block_on(link.update_parameters(1, &data)),
        Err(Error::Frame(FrameError::PayloadTooLarge(MAX_FRAME_PAYLOAD + 1)))
    );
    assert!(tap.bytes().is_empty());

    let records = vec![0u8; MAX_FRAME_PAYLOAD + 1];
    assert!(matches!(
        block_on(link.write_ndef_records(&records)),
        Err(Error::Frame(FrameError::PayloadTooLarge(_)))
    ));
    assert!(tap.bytes().is_empty());
}

#[test]
fn acknowledgement_layouts() {
    let (link, tap) = new_link(fast_config());
    let mut results = NodeSelfTest {
        passed: true,
        ..NodeSelfTest::default()
    };
    results.codes.push(0x0201).unwrap();
    block_on(async {
        link.send_temperature_ack(TemperatureAck::NoSpaceLeft, 0x0102)
            .await
            .unwrap();
        link.send_log_ack(300).await.unwrap();
        link.send_self_test_results(&results).await.unwrap();
        link.store_energy_use(0x1122_3344).await.ok();
    });
    assert_eq!(
        tap.payloads_of(CommandId::TemperatureReceivedAck),
        vec![vec![2, 0x02, 0x01]]
    );
    assert_eq!(
        tap.payloads_of(CommandId::LogReceivedAck),
        vec![vec![0x2C, 0x01]]
    );
    assert_eq!(
        tap.payloads_of(CommandId::SelfTestResults),
        vec![vec![1, 1, 0x01, 0x02]]
    );
    assert_eq!(
        tap.payloads_of(CommandId::StoreEnergyUse)[0],
        vec![0x44, 0x33, 0x22, 0x11]
    );
}
