// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! Shared packet command set

use super::helpers::*;
use crate::core::constants::{asc, sense_key, Status};
use crate::core::utils::{parse_be16, parse_be32};

#[test]
fn test_test_unit_ready_without_medium() {
    let mut h = Harness::new(TestDevice::new());
    h.packet(&cdb(&[0x00]));

    assert!(h.succeeded());
    assert_eq!(h.last_status(), Status::DEVRDY);
    assert_eq!(h.phy.regs().error, 0);
    assert_eq!(h.sense(), (sense_key::NO_SENSE, asc::NO_ADDITIONAL_SENSE));
}

#[test]
fn test_read_capacity_without_medium() {
    let mut h = Harness::new(TestDevice::new());
    h.packet(&cdb(&[0x25]));

    assert_eq!(h.last_status(), Status::DEVRDY | Status::ERR);
    // ABORT with the sense key in the upper nibble
    assert_eq!(h.phy.regs().error, 0x24);
    assert_eq!(h.sense(), (sense_key::NOT_READY, asc::MEDIUM_NOT_PRESENT));
}

#[test]
fn test_media_change_raises_unit_attention_once() {
    let mut h = Harness::new(TestDevice::new());
    h.insert(64 * 512);

    h.packet(&cdb(&[0x00]));
    assert!(!h.succeeded());
    assert_eq!(
        h.sense(),
        (sense_key::UNIT_ATTENTION, asc::MEDIUM_MAY_HAVE_CHANGED)
    );

    h.packet(&cdb(&[0x00]));
    assert!(h.succeeded());
    assert_eq!(h.last_status(), Status::DEVRDY);
}

#[test]
fn test_inquiry_bypasses_unit_attention() {
    let mut h = Harness::new(TestDevice::new());
    h.insert(64 * 512);

    let data = h.packet(&cdb(&[0x12, 0, 0, 0, 36]));
    assert!(h.succeeded());
    assert_eq!(data.len(), 36);
    assert_eq!(data[0], 0x00);
    assert_eq!(data[1], 0x80);
    assert_eq!(&data[8..16], b"ZULUIDE ");
    assert!(h.dev.core.unit_attention);
}

#[test]
fn test_inquiry_truncated_to_allocation_length() {
    let mut h = Harness::new(TestDevice::new());
    let data = h.packet(&cdb(&[0x12, 0, 0, 0, 5]));
    assert_eq!(data.len(), 5);
    assert_eq!(data[4], 31);
}

#[test]
fn test_inquiry_vpd_rejected() {
    let mut h = Harness::new(TestDevice::new());
    h.packet(&cdb(&[0x12, 0x01, 0x80, 0, 36]));
    assert_eq!(
        h.sense(),
        (sense_key::ILLEGAL_REQUEST, asc::INVALID_FIELD_IN_CDB)
    );
}

#[test]
fn test_request_sense_is_repeatable() {
    let mut h = Harness::new(TestDevice::new());
    h.packet(&cdb(&[0xFF]));

    let first = h.sense();
    let second = h.sense();
    assert_eq!(first, (sense_key::ILLEGAL_REQUEST, asc::INVALID_COMMAND_OPERATION_CODE));
    assert_eq!(first, second);
}

#[test]
fn test_request_sense_format() {
    let mut h = Harness::new(TestDevice::new());
    h.packet(&cdb(&[0x25]));

    let data = h.packet(&cdb(&[0x03, 0, 0, 0, 18]));
    assert_eq!(data[0], 0xF0);
    assert_eq!(data[7], 10);
    assert_eq!(data[12], 0x3A);

    h.insert(512);
    h.clear_attention();
    h.packet(&cdb(&[0x00]));
    let data = h.packet(&cdb(&[0x03, 0, 0, 0, 18]));
    assert_eq!(data[0], 0x80);
    assert_eq!(data[2], sense_key::NO_SENSE);
}

#[test]
fn test_read_capacity() {
    let mut h = Harness::new(TestDevice::new());
    h.insert(100 * 512);
    h.clear_attention();

    let data = h.packet(&cdb(&[0x25]));
    assert!(h.succeeded());
    assert_eq!(parse_be32(&data[0..]), 99);
    assert_eq!(parse_be32(&data[4..]), 512);
}

#[test]
fn test_read10_streams_image_data() {
    let mut h = Harness::new(TestDevice::new());
    h.insert(64 * 512);
    h.clear_attention();

    let data = h.packet(&cdb(&[0x28, 0, 0, 0, 0, 5, 0, 0, 3]));
    assert!(h.succeeded());
    assert_eq!(data.len(), 3 * 512);
    for (i, byte) in data.iter().enumerate() {
        assert_eq!(*byte, pattern_byte(5 * 512 + i));
    }
    // Equal blocks share one PHY setup
    assert_eq!(h.phy.write_starts(), &[(512, None)]);
}

#[test]
fn test_read6_zero_length_means_256() {
    let mut h = Harness::new(TestDevice::new());
    h.insert(300 * 512);
    h.clear_attention();

    let data = h.packet(&cdb(&[0x08, 0, 0, 1, 0]));
    assert!(h.succeeded());
    assert_eq!(data.len(), 256 * 512);
    assert_eq!(data[0], pattern_byte(512));
}

#[test]
fn test_read_zero_length_transfers_nothing() {
    let mut h = Harness::new(TestDevice::new());
    h.insert(8 * 512);
    h.clear_attention();

    let data = h.packet(&cdb(&[0x28, 0, 0, 0, 0, 1, 0, 0, 0]));
    assert!(h.succeeded());
    assert!(data.is_empty());
}

#[test]
fn test_read_past_capacity() {
    let mut h = Harness::new(TestDevice::new());
    h.insert(8 * 512);
    h.clear_attention();

    let data = h.packet(&cdb(&[0x28, 0, 0, 0, 0, 7, 0, 0, 2]));
    assert!(data.is_empty());
    assert_eq!(
        h.sense(),
        (sense_key::ILLEGAL_REQUEST, asc::LBA_OUT_OF_RANGE)
    );
}

#[test]
fn test_write10_stores_host_data() {
    let mut h = Harness::new(TestDevice::new());
    h.insert(16 * 512);
    h.clear_attention();

    let payload: Vec<u8> = (0..1024).map(|i| (i % 13) as u8).collect();
    h.packet_out(&cdb(&[0x2A, 0, 0, 0, 0, 2, 0, 0, 2]), 0xFFFE, &payload);
    assert!(h.succeeded());
    assert_eq!(h.phy.pending_host_bytes(), 0);

    let contents = std::fs::read(h.files[0].path()).unwrap();
    assert_eq!(&contents[1024..2048], &payload[..]);
    assert_eq!(contents[2048], pattern_byte(2048));
}

#[test]
fn test_write_protected_image() {
    let mut h = Harness::new(TestDevice::new());
    h.insert_with(16 * 512, true);
    h.clear_attention();

    h.packet_out(&cdb(&[0x2A, 0, 0, 0, 0, 0, 0, 0, 1]), 0xFFFE, &[0u8; 512]);
    assert_eq!(
        h.sense(),
        (sense_key::ABORTED_COMMAND, asc::WRITE_PROTECTED)
    );
}

#[test]
fn test_mode_sense10_single_page() {
    let mut h = Harness::new(TestDevice::new());
    h.insert(8 * 512);
    h.clear_attention();

    let data = h.packet(&cdb(&[0x5A, 0, 0x01, 0, 0, 0, 0, 0, 0xFF]));
    assert!(h.succeeded());
    assert_eq!(data.len(), 16);
    assert_eq!(parse_be16(&data[0..]), 14);
    assert_eq!(data[3], 0x00);
    assert_eq!(&data[8..11], &[0x01, 0x06, 0xC8]);
}

#[test]
fn test_mode_sense6_changeable_values() {
    let mut h = Harness::new(TestDevice::new());
    let data = h.packet(&cdb(&[0x1A, 0, 0x41, 0, 0xFF]));
    assert_eq!(data.len(), 12);
    assert_eq!(data[0], 11);
    assert_eq!(data[4], 0x01);
    assert_eq!(data[6], 0x00);
}

#[test]
fn test_mode_sense_all_pages_and_unknown_page() {
    let mut h = Harness::new(TestDevice::new());
    let all = h.packet(&cdb(&[0x5A, 0, 0x3F, 0, 0, 0, 0, 0, 0xFF]));
    assert_eq!(all.len(), 16);

    h.packet(&cdb(&[0x5A, 0, 0x05, 0, 0, 0, 0, 0, 0xFF]));
    assert_eq!(
        h.sense(),
        (sense_key::ILLEGAL_REQUEST, asc::INVALID_FIELD_IN_CDB)
    );
}

#[test]
fn test_mode_select_consumes_parameters() {
    let mut h = Harness::new(TestDevice::new());
    h.packet_out(&cdb(&[0x55, 0x10, 0, 0, 0, 0, 0, 0, 16]), 0xFFFE, &[0u8; 16]);
    assert!(h.succeeded());
    assert_eq!(h.phy.pending_host_bytes(), 0);
}

#[test]
fn test_event_status_reports_media_change_once() {
    let mut h = Harness::new(TestDevice::new());
    h.insert(8 * 512);

    let gesn = cdb(&[0x4A, 0x01, 0, 0, 0x10, 0, 0, 0, 8]);
    let data = h.packet(&gesn);
    assert!(h.succeeded());
    assert_eq!(data, vec![0, 6, 4, 4, 2, 2, 0, 0]);

    let data = h.packet(&gesn);
    assert_eq!(data, vec![0, 2, 0, 4]);
}

#[test]
fn test_event_status_requires_polled_mode() {
    let mut h = Harness::new(TestDevice::new());
    h.packet(&cdb(&[0x4A, 0x00, 0, 0, 0x10, 0, 0, 0, 8]));
    assert_eq!(
        h.sense(),
        (sense_key::ILLEGAL_REQUEST, asc::INVALID_FIELD_IN_CDB)
    );
}

#[test]
fn test_eject_and_reload() {
    let mut h = Harness::new(TestDevice::new());
    h.insert(8 * 512);
    h.clear_attention();

    h.packet(&cdb(&[0x1B, 0, 0, 0, 0x02]));
    assert!(h.succeeded());
    h.packet(&cdb(&[0x25]));
    assert_eq!(h.sense(), (sense_key::NOT_READY, asc::MEDIUM_NOT_PRESENT));

    h.packet(&cdb(&[0x1B, 0, 0, 0, 0x03]));
    assert!(h.succeeded());
    h.packet(&cdb(&[0x00]));
    assert_eq!(
        h.sense(),
        (sense_key::UNIT_ATTENTION, asc::MEDIUM_MAY_HAVE_CHANGED)
    );
    h.packet(&cdb(&[0x00]));
    assert!(h.succeeded());
}

#[test]
fn test_prevent_removal_blocks_eject() {
    let mut h = Harness::new(TestDevice::new());
    h.insert(8 * 512);
    h.clear_attention();

    h.packet(&cdb(&[0x1E, 0, 0, 0, 0x01]));
    assert!(h.succeeded());

    h.packet(&cdb(&[0x1B, 0, 0, 0, 0x02]));
    assert_eq!(
        h.sense(),
        (sense_key::ILLEGAL_REQUEST, asc::MEDIUM_REMOVAL_PREVENTED)
    );
    assert!(h.dev.core.medium_present());

    h.packet(&cdb(&[0x1E, 0, 0, 0, 0x00]));
    h.packet(&cdb(&[0x1B, 0, 0, 0, 0x02]));
    assert!(h.succeeded());
    assert!(!h.dev.core.medium_present());
}

#[test]
fn test_get_configuration_lists_profiles() {
    let mut h = Harness::new(TestDevice::new());
    h.insert(8 * 512);
    h.clear_attention();

    let data = h.packet(&cdb(&[0x46, 0, 0, 0, 0, 0, 0, 0, 64]));
    assert!(h.succeeded());
    assert_eq!(data.len(), 28);
    assert_eq!(parse_be32(&data[0..]), 24);
    assert_eq!(parse_be16(&data[6..]), 0x0002);
    assert_eq!(&data[8..16], &[0, 0, 3, 4, 0, 2, 1, 0]);
    assert_eq!(parse_be16(&data[16..]), 0x0001);

    // RT = 2 returns only the requested feature
    let data = h.packet(&cdb(&[0x46, 0x02, 0, 1, 0, 0, 0, 0, 64]));
    assert_eq!(data.len(), 20);
}

#[test]
fn test_unknown_command() {
    let mut h = Harness::new(TestDevice::new());
    h.packet(&cdb(&[0xFF]));
    assert_eq!(h.last_status(), Status::DEVRDY | Status::ERR);
    assert_eq!(
        h.sense(),
        (sense_key::ILLEGAL_REQUEST, asc::INVALID_COMMAND_OPERATION_CODE)
    );
}
