// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! Test fixtures: a minimal packet device, temporary images and a driver
//! that plays the host side through `MockPhy`

use std::io::Write;

use tempfile::NamedTempFile;

use super::super::*;
use crate::core::config::{DeviceKind, IdeConfig};
use crate::core::constants::{devtype, mode_page, profile};
use crate::core::image::ImageFile;
use crate::core::phy::MockPhy;
use crate::core::utils::parse_be16;

/// Direct access packet device with 512-byte sectors and one mode page
pub struct TestDevice {
    pub core: AtapiCore,
}

impl TestDevice {
    pub fn new() -> Self {
        Self::with_config(&IdeConfig::default())
    }

    pub fn with_config(ide: &IdeConfig) -> Self {
        let devinfo = DeviceInfo {
            devtype: devtype::DIRECT_ACCESS,
            writable: true,
            bytes_per_sector: 512,
            profiles: vec![profile::REMOVABLE_DISK],
            current_profile: profile::REMOVABLE_DISK,
            ..DeviceInfo::default()
        };
        let device = DeviceConfig::new(DeviceKind::Removable);
        Self {
            core: AtapiCore::new(devinfo, 0, ide, &device),
        }
    }
}

impl AtapiDevice for TestDevice {
    fn core(&self) -> &AtapiCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AtapiCore {
        &mut self.core
    }

    fn mode_page(&self, page_ctrl: u8, page: u8, out: &mut Vec<u8>) -> bool {
        if page != mode_page::ERROR_RECOVERY {
            return false;
        }
        let retries = if page_ctrl == 1 { 0x00 } else { 0xC8 };
        out.extend_from_slice(&[0x01, 0x06, retries, 0x16, 0, 0, 0, 0]);
        true
    }
}

/// Byte stored at `offset` of every test image
pub fn pattern_byte(offset: usize) -> u8 {
    ((offset / 512) as u8).wrapping_mul(7) ^ (offset % 251) as u8
}

/// Temporary image of `size` bytes filled with [`pattern_byte`]
pub fn temp_image(size: usize, read_only: bool) -> (NamedTempFile, ImageFile) {
    let mut file = NamedTempFile::new().unwrap();
    let data: Vec<u8> = (0..size).map(pattern_byte).collect();
    file.write_all(&data).unwrap();
    file.flush().unwrap();
    let image = ImageFile::open(file.path(), read_only).unwrap();
    (file, image)
}

/// 12-byte CDB from a shorter prefix
pub fn cdb(bytes: &[u8]) -> [u8; 12] {
    let mut out = [0u8; 12];
    out[..bytes.len()].copy_from_slice(bytes);
    out
}

/// Host side driver for one device on a mock bus
pub struct Harness<D: AtapiDevice> {
    pub dev: D,
    pub phy: MockPhy,
    pub files: Vec<NamedTempFile>,
}

impl<D: AtapiDevice> Harness<D> {
    pub fn new(dev: D) -> Self {
        Self::with_phy(dev, MockPhy::new())
    }

    pub fn with_phy(mut dev: D, phy: MockPhy) -> Self {
        dev.set_capabilities(phy.capabilities(), false);
        Self {
            dev,
            phy,
            files: Vec::new(),
        }
    }

    /// Bind a fresh pattern image of `size` bytes
    pub fn insert(&mut self, size: usize) {
        self.insert_with(size, false);
    }

    pub fn insert_with(&mut self, size: usize, read_only: bool) {
        let (file, image) = temp_image(size, read_only);
        self.files.push(file);
        self.dev.set_image(Some(Box::new(image)));
    }

    /// Issue an ATA command and let the device execute it
    pub fn command(&mut self, regs: Registers) -> bool {
        self.phy.issue_command(regs);
        assert_eq!(self.phy.get_events(), PhyEvent::Cmd);
        let regs = self.phy.get_regs();
        self.dev.handle_command(&mut self.phy, &regs)
    }

    /// Run a packet command with the largest byte count limit
    pub fn packet(&mut self, cmd: &[u8; 12]) -> Vec<u8> {
        self.packet_with_limit(cmd, 0xFFFE)
    }

    pub fn packet_with_limit(&mut self, cmd: &[u8; 12], limit: u16) -> Vec<u8> {
        self.packet_out(cmd, limit, &[])
    }

    /// Run a packet command whose data-out phase carries `data`
    pub fn packet_out(&mut self, cmd: &[u8; 12], limit: u16, data: &[u8]) -> Vec<u8> {
        self.phy.issue_packet(0, cmd, limit);
        self.phy.queue_host_data(data);
        assert_eq!(self.phy.get_events(), PhyEvent::Cmd);
        let regs = self.phy.get_regs();
        assert!(self.dev.handle_command(&mut self.phy, &regs));
        self.phy.take_sent()
    }

    /// Status reported with the last interrupt
    pub fn last_status(&self) -> Status {
        self.phy.last_irq().expect("no interrupt asserted")
    }

    pub fn succeeded(&self) -> bool {
        !self.last_status().contains(Status::ERR)
    }

    /// Sense key and ASC/ASCQ through REQUEST SENSE
    pub fn sense(&mut self) -> (u8, u16) {
        let data = self.packet(&cdb(&[0x03, 0, 0, 0, 18]));
        assert_eq!(data.len(), 18);
        (data[2], parse_be16(&data[12..]))
    }

    /// Consume the unit attention raised by a media change
    pub fn clear_attention(&mut self) {
        self.packet(&cdb(&[0x00]));
    }
}
