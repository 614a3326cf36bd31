//! Tests for outgoing frame construction and sample decoding.

mod common;

use common::*;

#[test]
fn buffer_read_frame_shape() {
    let request = Request::read_buffer(Command::ReadLight, 10);

    // 3-byte header + 20 filler bytes + 1 stop byte.
    assert_eq!(request.tx.len(), 24);
    assert_eq!(request.tx[..3], [0x02, 10, 0x00]);
    assert!(request.tx[3..23].iter().all(|&b| b == 0x00));
    assert_eq!(*request.tx.last().unwrap(), STOP_CONF);
    assert!(request.expect_stop);
    assert_eq!(
        request.expect,
        vec![Some(PACKET_CONF), Some(0x02), Some(10)]
    );
}

#[test]
fn single_sample_read_frame() {
    let request = Request::read_buffer(Command::ReadSound, 1);
    assert_eq!(request.tx, vec![0x03, 1, 0x00, 0x00, 0x00, STOP_CONF]);
}

#[test]
fn trigger_set_frame_is_big_endian() {
    let raw = frame::quantize(0.5);
    assert_eq!(raw, 512);
    let request = Request::set_trigger(Command::SetLightTrigger, raw);
    assert_eq!(request.tx, vec![0x04, 0x02, 0x00, 0x00]);
    assert_eq!(
        request.expect,
        vec![Some(PACKET_CONF), Some(0x04), Some(0x02), Some(0x00)]
    );
}

#[test]
fn trigger_quantization_rounds_up() {
    // 0.3 * 1024 = 307.2, ceil to 308 = 0x0134
    let raw = frame::quantize(0.3);
    assert_eq!(raw, 308);
    let request = Request::set_trigger(Command::SetSoundTrigger, raw);
    assert_eq!(request.tx, vec![0x05, 0x01, 0x34, 0x00]);
}

#[test]
fn quantize_endpoints() {
    assert_eq!(frame::quantize(0.0), 0);
    assert_eq!(frame::quantize(1.0), 1024);
}

#[test]
fn fetch_trigger_frame_is_fixed() {
    let request = Request::fetch_trigger_values();
    assert_eq!(request.tx, vec![0x06, 0, 0, 0, 0, 0]);
    assert!(!request.expect_stop);
}

#[test]
fn firmware_version_frame_ignores_leading_byte() {
    let request = Request::firmware_version();
    assert_eq!(request.tx, vec![0x01, 0x00, 0x00]);
    assert_eq!(request.expect, vec![ANY, Some(0x01)]);
}

#[test]
fn ack_expects_ack_code() {
    let request = Request::ack();
    assert_eq!(request.tx, vec![0x00, 0x00, 0x00]);
    assert_eq!(
        request.expect,
        vec![Some(PACKET_CONF), Some(0x00), Some(ACK_CONF)]
    );
}

#[test]
fn normalize_is_full_scale_1024() {
    assert_eq!(frame::normalize(0), 0.0);
    assert_eq!(frame::normalize(512), 0.5);
    assert_eq!(frame::normalize(1024), 1.0);
}

#[test]
fn decode_buffer_preserves_order() {
    // Two big-endian words: 512, 256.
    let readings = frame::decode_buffer(&[0x02, 0x00, 0x01, 0x00]);
    assert_eq!(readings, vec![0.5, 0.25]);
}

#[test]
fn decode_buffer_empty() {
    assert!(frame::decode_buffer(&[]).is_empty());
}
