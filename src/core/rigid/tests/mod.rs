// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! Tests for the ATA rigid disk

mod geometry;

use tempfile::NamedTempFile;

use super::*;
use crate::core::atapi::tests::helpers::{pattern_byte, temp_image};
use crate::core::config::DeviceKind;
use crate::core::constants::device_reg;
use crate::core::phy::MockPhy;

/// Rigid disk on a mock bus with a pattern image
pub struct Disk {
    pub dev: RigidDevice,
    pub phy: MockPhy,
    pub file: Option<NamedTempFile>,
}

impl Disk {
    pub fn new(sectors: usize) -> Self {
        Self::build(sectors, false, &IdeConfig::default(), PhyCapabilities::default())
    }

    pub fn build(sectors: usize, read_only: bool, ide: &IdeConfig, caps: PhyCapabilities) -> Self {
        let mut dev = RigidDevice::new(0, ide, &DeviceConfig::new(DeviceKind::Rigid));
        dev.set_capabilities(caps);
        let (file, image) = temp_image(sectors * 512, read_only);
        dev.set_image(Some(Box::new(image)));
        Self {
            dev,
            phy: MockPhy::with_capabilities(caps),
            file: Some(file),
        }
    }

    /// Issue a command and let the device execute it
    pub fn command(&mut self, regs: Registers) -> bool {
        self.phy.issue_command(regs);
        assert_eq!(self.phy.get_events(), PhyEvent::Cmd);
        let regs = self.phy.get_regs();
        self.dev.handle_command(&mut self.phy, &regs)
    }

    pub fn last_status(&self) -> Status {
        self.phy.last_irq().expect("no interrupt asserted")
    }

    pub fn succeeded(&self) -> bool {
        !self.last_status().contains(Status::ERR)
    }

    pub fn error(&self) -> AtaError {
        AtaError::from_bits_truncate(self.phy.regs().error)
    }

    /// Current contents of the backing file
    pub fn contents(&self) -> Vec<u8> {
        let file = self.file.as_ref().unwrap();
        std::fs::read(file.path()).unwrap()
    }
}

/// Task file for a 28-bit LBA sector command
pub fn lba_command(command: u8, lba: u32, count: u8) -> Registers {
    let [top, high, mid, low] = lba.to_be_bytes();
    Registers {
        command,
        device: device_reg::LBA | (top & device_reg::HEAD_MASK),
        sector_count: count,
        lba_low: low,
        lba_mid: mid,
        lba_high: high,
        ..Registers::default()
    }
}

/// Task file for a CHS sector command
pub fn chs_command(command: u8, cylinder: u16, head: u8, sector: u8, count: u8) -> Registers {
    let [high, mid] = cylinder.to_be_bytes();
    Registers {
        command,
        device: head,
        sector_count: count,
        lba_low: sector,
        lba_mid: mid,
        lba_high: high,
        ..Registers::default()
    }
}

/// Expected image bytes of `count` sectors at `lba`
pub fn sectors(lba: usize, count: usize) -> Vec<u8> {
    (lba * 512..(lba + count) * 512).map(pattern_byte).collect()
}
