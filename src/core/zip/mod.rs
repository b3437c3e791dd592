// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Iomega ZIP 100 / ZIP 250 ATAPI drive
//!
//! The drive reports the fixed capacity of its cartridge type whatever the
//! image size: oversized images are only read up to the cartridge size and
//! undersized ones are accepted with a warning. The identity responses
//! live in [`identity`].

use crate::core::atapi::commands::{caching_page, error_recovery_page, require_medium};
use crate::core::atapi::{AtapiCore, AtapiDevice, CmdResult, DeviceInfo};
use crate::core::config::{DeviceConfig, DeviceKind, IdeConfig};
use crate::core::constants::{
    atapi_cmd, devtype, ide_cmd, medium_type, mode_page, profile, set_feature, start_stop, Status,
};
use crate::core::image::DriveType;
use crate::core::phy::{Phy, Registers};
use crate::core::utils::{parse_be16, write_be24, write_be32, HexBytes};

pub mod identity;

/// Sector size of ZIP cartridges
pub const SECTOR_SIZE: u32 = 512;

/// Emulated drive model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZipModel {
    Zip100,
    Zip250,
}

impl ZipModel {
    /// Sectors on a cartridge of this model
    pub fn sectors(self) -> u64 {
        match self {
            ZipModel::Zip100 => 196_608,
            ZipModel::Zip250 => 489_532,
        }
    }

    pub fn from_kind(kind: DeviceKind) -> Self {
        match kind {
            DeviceKind::Zip250 => ZipModel::Zip250,
            _ => ZipModel::Zip100,
        }
    }

    pub fn kind(self) -> DeviceKind {
        match self {
            ZipModel::Zip100 => DeviceKind::Zip100,
            ZipModel::Zip250 => DeviceKind::Zip250,
        }
    }

    pub fn from_drive_type(drive_type: DriveType) -> Option<Self> {
        match drive_type {
            DriveType::Zip100 => Some(ZipModel::Zip100),
            DriveType::Zip250 => Some(ZipModel::Zip250),
            _ => None,
        }
    }

    fn apply_identity(self, info: &mut DeviceInfo) {
        match self {
            ZipModel::Zip100 => {
                info.set_inquiry_strings("IOMEGA", "ZIP 100", "14.A");
                info.set_ident_strings("IOMEGA  ZIP 100       ATAPI", "", "14.A");
            }
            ZipModel::Zip250 => {
                info.set_inquiry_strings("IOMEGA", "ZIP 250", "41.S");
                info.set_ident_strings("IOMEGA  ZIP 250       ATAPI", "00DB47B188C61421", "41.S");
            }
        }
    }
}

/// ZIP drive
#[derive(Debug)]
pub struct ZipDrive {
    core: AtapiCore,
    model: ZipModel,

    /// Cartridge serial reported in the disk status page
    serial: String,

    /// Eject button pressed while the host prevented removal
    button_pressed: bool,

    /// GET MEDIA STATUS reporting, enabled by SET FEATURES 0x95
    media_status_notification: bool,

    /// Identity overrides, reapplied when an image switches the model
    config: DeviceConfig,
}

impl ZipDrive {
    pub fn new(dev_index: usize, ide: &IdeConfig, device: &DeviceConfig) -> Self {
        let model = ZipModel::from_kind(device.kind);
        let mut devinfo = DeviceInfo {
            devtype: devtype::DIRECT_ACCESS,
            removable: true,
            writable: true,
            bytes_per_sector: SECTOR_SIZE,
            profiles: vec![profile::REMOVABLE_DISK],
            current_profile: profile::REMOVABLE_DISK,
            ..DeviceInfo::default()
        };
        model.apply_identity(&mut devinfo);

        Self {
            core: AtapiCore::new(devinfo, dev_index, ide, device),
            model,
            serial: " ".repeat(identity::SERIAL_LEN),
            button_pressed: false,
            media_status_notification: false,
            config: device.clone(),
        }
    }

    pub fn model(&self) -> ZipModel {
        self.model
    }

    /// Front panel eject button
    ///
    /// While the host prevents removal the press is only latched and
    /// reported through the disk status page.
    pub fn press_eject_button(&mut self) {
        if self.core.prevent_removal {
            log::info!("Eject button pressed, removal prevented by host");
            self.button_pressed = true;
        } else if let Err(err) = self.core.eject() {
            log::warn!("Eject failed: {}", err);
        }
    }

    fn start_stop_unit(&mut self, cmd: &[u8; 12]) -> CmdResult {
        let flags = cmd[4];
        if flags & start_stop::POWER_CONDITION_MASK != 0 || flags & start_stop::LOEJ == 0 {
            return Ok(());
        }
        if flags & start_stop::START == 0 {
            self.core.eject()
        } else {
            self.core.reinsert();
            Ok(())
        }
    }

    fn inquiry(&mut self, phy: &mut dyn Phy, cmd: &[u8; 12]) -> CmdResult {
        let data = identity::inquiry_data(self.model, &self.core.devinfo);
        self.core.send_response(phy, &data, cmd[4] as usize)?;
        if self.core.settings.reinsert_media_on_inquiry {
            self.core.reinsert();
        }
        Ok(())
    }

    fn format_unit(&mut self, phy: &mut dyn Phy) -> CmdResult {
        require_medium(&self.core)?;
        let descriptor = self.core.recv_parameters(phy, 12)?;
        log::debug!("FORMAT UNIT descriptor: {}", HexBytes(&descriptor));
        Ok(())
    }

    fn read_format_capacities(&mut self, phy: &mut dyn Phy, cmd: &[u8; 12]) -> CmdResult {
        let alloc_len = parse_be16(&cmd[7..]) as usize;
        let mut buf = [0u8; 12];
        buf[3] = 0x08;
        write_be32(&mut buf[4..], self.capacity_lba() as u32);
        buf[8] = 0x02;
        write_be24(&mut buf[9..], SECTOR_SIZE);
        self.core.send_response(phy, &buf, alloc_len)
    }

    fn disk_status(&mut self, phy: &mut dyn Phy, cmd: &[u8; 12]) -> CmdResult {
        if cmd[2] != 0x02 {
            log::debug!("Vendor command 0x06 page {:#04x} answered with disk status", cmd[2]);
        }
        let model = self.core.image.as_ref().map(|_| self.model);
        let buf = identity::disk_status(
            model,
            self.core.medium_present(),
            self.button_pressed,
            &self.serial,
        );
        self.core.send_response(phy, &buf, buf.len())
    }

    fn flexible_disk_page(page_ctrl: u8, out: &mut Vec<u8>) {
        let start = out.len();
        let mut page = [0u8; 32];
        page[..10].copy_from_slice(&[
            mode_page::FLEXIBLE_DISK,
            0x1E,
            0x80, // transfer rate
            0x00,
            0x40, // heads
            0x20, // sectors per track
            0x02, // 512 bytes per sector
            0x00,
            0x00,
            0x60, // cylinders
        ]);
        page[28] = 0x0B; // rotation rate
        page[29] = 0x7D;
        out.extend_from_slice(&page);
        if page_ctrl == 1 {
            out[start + 2..].fill(0);
        }
    }

    fn irq_ok(phy: &mut dyn Phy) {
        let mut regs = phy.get_regs();
        regs.error = 0;
        phy.set_regs(&regs);
        phy.assert_irq(Status::DEVRDY | Status::DSC);
    }
}

impl AtapiDevice for ZipDrive {
    fn core(&self) -> &AtapiCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AtapiCore {
        &mut self.core
    }

    fn ata_command(&mut self, phy: &mut dyn Phy, regs: &Registers) -> Option<bool> {
        match regs.command {
            ide_cmd::SET_FEATURES => match regs.feature {
                set_feature::DISABLE_STATUS_NOTIFICATION => {
                    log::debug!("Media status notification disabled");
                    self.media_status_notification = false;
                    Self::irq_ok(phy);
                    Some(true)
                }
                set_feature::ENABLE_STATUS_NOTIFICATION => {
                    log::debug!("Media status notification enabled");
                    self.media_status_notification = true;
                    Self::irq_ok(phy);
                    Some(true)
                }
                _ => None,
            },
            ide_cmd::GET_MEDIA_STATUS => {
                // Media changes are reported through unit attention instead
                log::debug!(
                    "GET MEDIA STATUS (notification {})",
                    if self.media_status_notification { "on" } else { "off" }
                );
                Self::irq_ok(phy);
                Some(true)
            }
            _ => None,
        }
    }

    fn packet_command(&mut self, phy: &mut dyn Phy, cmd: &[u8; 12]) -> Option<CmdResult> {
        let result = match cmd[0] {
            atapi_cmd::INQUIRY => self.inquiry(phy, cmd),
            atapi_cmd::START_STOP_UNIT => self.start_stop_unit(cmd),
            atapi_cmd::FORMAT_UNIT => self.format_unit(phy),
            atapi_cmd::READ_FORMAT_CAPACITIES => self.read_format_capacities(phy, cmd),
            atapi_cmd::VERIFY10 => Ok(()),
            atapi_cmd::IOMEGA_VENDOR => self.disk_status(phy, cmd),
            atapi_cmd::IOMEGA_VENDOR_0D => Ok(()),
            _ => return None,
        };
        Some(result)
    }

    fn mode_page(&self, page_ctrl: u8, page: u8, out: &mut Vec<u8>) -> bool {
        match page {
            mode_page::ERROR_RECOVERY => error_recovery_page(page_ctrl, out),
            mode_page::FLEXIBLE_DISK => Self::flexible_disk_page(page_ctrl, out),
            mode_page::CACHING => caching_page(page_ctrl, out),
            mode_page::IOMEGA_VENDOR => {
                out.extend_from_slice(&[mode_page::IOMEGA_VENDOR, 0x04, 0x5C, 0x0F, 0x3C, 0x0F])
            }
            _ => return false,
        }
        true
    }

    fn inquiry_data(&self) -> Vec<u8> {
        identity::inquiry_data(self.model, &self.core.devinfo)
    }

    fn identify_packet_words(&self) -> [u16; 256] {
        let mut idf = self.core.identify_packet_words();
        identity::patch_identify(self.model, &mut idf);
        idf
    }

    fn capacity_lba(&self) -> u64 {
        if self.core.medium_present() {
            self.model.sectors()
        } else {
            0
        }
    }

    fn loaded_medium_type(&self) -> u8 {
        medium_type::UNKNOWN
    }

    fn image_changed(&mut self) {
        let Some(image) = &self.core.image else {
            return;
        };

        if let Some(model) = ZipModel::from_drive_type(image.drive_type()) {
            if model != self.model {
                log::info!("Image {} selects {:?}", image.filename(), model);
                self.model = model;
                model.apply_identity(&mut self.core.devinfo);
                self.core.devinfo.apply_overrides(&self.config);
            }
        }

        let mut serial: String = image.filename().chars().take(identity::SERIAL_LEN).collect();
        while serial.len() < identity::SERIAL_LEN {
            serial.push(' ');
        }
        self.serial = serial;
        self.button_pressed = false;

        let expected = self.model.sectors() * SECTOR_SIZE as u64;
        if image.capacity() < expected {
            log::warn!(
                "Image {} is only {} bytes, a {:?} cartridge holds {} bytes",
                image.filename(),
                image.capacity(),
                self.model,
                expected
            );
        }
    }
}
