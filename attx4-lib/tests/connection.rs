//! Tests for the connection handshake and its bounded retries.

mod common;

use common::*;

#[tokio::test]
async fn handshake_succeeds_against_module() {
    let module = SimulatedModule::new();
    let ambient = Ambient::new(module.hardware()).await.expect("handshake");

    assert_eq!(ambient.firmware_version(), DEFAULT_FIRMWARE_VERSION);
    assert!(ambient.is_connected());
    assert_eq!(module.command_count(Command::FirmwareVersion), 1);
}

#[tokio::test]
async fn handshake_reports_custom_version() {
    let module = SimulatedModule::new();
    module.set_firmware_version(0x42);
    let ambient = Ambient::new(module.hardware()).await.expect("handshake");
    assert_eq!(ambient.firmware_version(), 0x42);
}

#[tokio::test]
async fn handshake_exhausts_exactly_five_attempts() {
    // Empty script: every exchange answers all-zero, which never validates.
    let (bus, handle) = scripted_bus();
    let (_line, irq) = test_line();

    let err = Ambient::new(scripted_hardware(bus, irq))
        .await
        .expect_err("handshake must fail");

    assert!(matches!(err, AmbientError::CannotConnect { attempts: 5 }));
    assert_eq!(handle.exchange_count(), 5);
    // Each retry is a fresh firmware-version exchange, not a resend.
    for tx in handle.exchanges() {
        assert_eq!(tx, vec![0x01, 0x00, 0x00]);
    }
}

#[tokio::test]
async fn handshake_stops_at_first_valid_response() {
    let (bus, handle) = scripted_bus();
    let (_line, irq) = test_line();
    // Two garbage replies, then a valid one.
    handle.push_response(vec![0xDE, 0xAD, 0xBE]);
    handle.push_response(vec![0x00, 0xFF, 0x00]);
    handle.push_response(version_reply(0x07));

    let ambient = Ambient::new(scripted_hardware(bus, irq))
        .await
        .expect("third attempt succeeds");

    assert_eq!(ambient.firmware_version(), 0x07);
    assert_eq!(handle.exchange_count(), 3);
}

#[tokio::test]
async fn handshake_retry_limit_is_configurable() {
    let (bus, handle) = scripted_bus();
    let (_line, irq) = test_line();
    let config = AmbientConfig {
        connect_retries: 2,
        ..AmbientConfig::default()
    };

    let err = Ambient::with_config(scripted_hardware(bus, irq), config)
        .await
        .expect_err("handshake must fail");

    assert!(matches!(err, AmbientError::CannotConnect { attempts: 2 }));
    assert_eq!(handle.exchange_count(), 2);
}
