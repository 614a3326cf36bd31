//! Tests for response validation against positional expectations.

mod common;

use common::*;

#[test]
fn wildcard_positions_match_anything() {
    // The firmware handshake may answer with garbage in the leading byte.
    assert!(frame::validate(&[0x55, 0x01, 0x03], &[ANY, Some(0x01)]));
    assert!(frame::validate(&[0xFF, 0x01, 0x03], &[ANY, Some(0x01)]));
    assert!(frame::validate(&[0x00, 0x01, 0x03], &[ANY, Some(0x01)]));
}

#[test]
fn non_wildcard_mismatch_fails() {
    assert!(!frame::validate(&[0x55, 0x02, 0x03], &[ANY, Some(0x01)]));
    assert!(!frame::validate(
        &[0x54, 0x01],
        &[Some(0x55), Some(0x01)]
    ));
}

#[test]
fn response_shorter_than_expectation() {
    // A missing non-wildcard position fails; missing wildcards do not.
    assert!(!frame::validate(&[0x55], &[Some(0x55), Some(0x01)]));
    assert!(frame::validate(&[0x55], &[Some(0x55), ANY, ANY]));
}

#[test]
fn trailing_bytes_beyond_expectation_are_ignored() {
    assert!(frame::validate(
        &[0x55, 0x06, 0xAA, 0xBB, 0xCC, 0xDD],
        &[Some(0x55), Some(0x06)]
    ));
}

#[test]
fn buffer_read_check_requires_stop_marker() {
    let request = Request::read_buffer(Command::ReadLight, 1);

    let mut good = vec![0x55, 0x02, 1, 0x02, 0x00, STOP_CONF];
    assert!(request.check(&good));

    // Same bytes but the stop marker got clobbered.
    *good.last_mut().unwrap() = 0x00;
    assert!(!request.check(&good));
}

#[test]
fn trigger_set_check_requires_full_echo() {
    let request = Request::set_trigger(Command::SetLightTrigger, 512);
    assert!(request.check(&[0x55, 0x04, 0x02, 0x00]));
    // Low byte echoed wrong.
    assert!(!request.check(&[0x55, 0x04, 0x02, 0x01]));
}
