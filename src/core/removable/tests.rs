// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! Tests for the removable disk

use super::*;
use crate::core::atapi::tests::helpers::{cdb, pattern_byte, Harness};
use crate::core::config::DeviceKind;
use crate::core::constants::{asc, sense_key};
use crate::core::utils::{parse_be24, parse_be32};

fn removable() -> Harness<RemovableDevice> {
    let device = DeviceConfig::new(DeviceKind::Removable);
    Harness::new(RemovableDevice::new(0, &IdeConfig::default(), &device))
}

#[test]
fn test_inquiry_identity() {
    let mut h = removable();
    let data = h.packet(&cdb(&[0x12, 0, 0, 0, 36]));
    assert_eq!(data[0], 0x00);
    assert_eq!(data[1], 0x80);
    assert_eq!(&data[16..25], b"REMOVABLE");
}

#[test]
fn test_partial_sector_ignored() {
    let mut h = removable();
    h.insert(10 * 512 + 100);
    h.clear_attention();

    assert_eq!(h.dev.capacity_lba(), 10);
    assert_eq!(h.dev.capacity(), 10 * 512);
    let data = h.packet(&cdb(&[0x25]));
    assert_eq!(parse_be32(&data[0..]), 9);
}

#[test]
fn test_read_format_capacities() {
    let mut h = removable();
    h.insert(2880 * 512);
    h.clear_attention();

    let data = h.packet(&cdb(&[0x23, 0, 0, 0, 0, 0, 0, 0, 0xFC]));
    assert!(h.succeeded());
    assert_eq!(data.len(), 20);
    assert_eq!(data[3], 16);
    assert_eq!(parse_be32(&data[4..]), 2880);
    assert_eq!(data[8], 0x02);
    assert_eq!(parse_be24(&data[9..]), 512);
    assert_eq!(parse_be32(&data[12..]), 2880);
    assert_eq!(parse_be24(&data[17..]), 512);

    let short = h.packet(&cdb(&[0x23, 0, 0, 0, 0, 0, 0, 0, 12]));
    assert_eq!(short.len(), 12);
}

#[test]
fn test_read_format_capacities_without_medium() {
    let mut h = removable();
    h.packet(&cdb(&[0x23, 0, 0, 0, 0, 0, 0, 0, 0xFC]));
    assert_eq!(h.sense(), (sense_key::NOT_READY, asc::MEDIUM_NOT_PRESENT));
}

#[test]
fn test_format_unit_consumes_descriptor() {
    let mut h = removable();
    h.insert(64 * 512);
    h.clear_attention();

    h.packet_out(&cdb(&[0x04, 0x17]), 0xFFFE, &[0xAA; 12]);
    assert!(h.succeeded());
    assert_eq!(h.phy.pending_host_bytes(), 0);
}

#[test]
fn test_verify_and_caching_page() {
    let mut h = removable();
    h.insert(64 * 512);
    h.clear_attention();

    h.packet(&cdb(&[0x2F, 0, 0, 0, 0, 0, 0, 0, 8]));
    assert!(h.succeeded());

    let data = h.packet(&cdb(&[0x5A, 0, 0x08, 0, 0, 0, 0, 0, 0xFF]));
    assert_eq!(data.len(), 8 + 12);
    assert_eq!(&data[8..12], &[0x08, 0x0A, 0x00, 0x00]);

    let all = h.packet(&cdb(&[0x5A, 0, 0x3F, 0, 0, 0, 0, 0, 0xFF]));
    assert_eq!(all.len(), 8 + 8 + 12);
    assert_eq!(all[8], 0x01);
    assert_eq!(all[16], 0x08);
}

#[test]
fn test_read_through_device() {
    let mut h = removable();
    h.insert(64 * 512);
    h.clear_attention();

    let data = h.packet(&cdb(&[0x28, 0, 0, 0, 0, 10, 0, 0, 1]));
    assert_eq!(data.len(), 512);
    assert_eq!(data[3], pattern_byte(10 * 512 + 3));
}
