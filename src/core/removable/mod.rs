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

//! Generic removable disk
//!
//! A direct access packet device with 512-byte sectors, as used for
//! LS-120 style drives and other removable media that hosts drive through
//! the ATAPI disk class. Capacity follows the image size; a trailing
//! partial sector is ignored.

use crate::core::atapi::commands::{caching_page, error_recovery_page, require_medium};
use crate::core::atapi::{AtapiCore, AtapiDevice, CmdResult, DeviceInfo};
use crate::core::config::{DeviceConfig, IdeConfig};
use crate::core::constants::{atapi_cmd, devtype, mode_page, medium_type, profile};
use crate::core::phy::Phy;
use crate::core::utils::{parse_be16, write_be24, write_be32, HexBytes};

/// Sector size of removable media
pub const SECTOR_SIZE: u32 = 512;

/// Removable direct access device
#[derive(Debug)]
pub struct RemovableDevice {
    core: AtapiCore,
}

impl RemovableDevice {
    pub fn new(dev_index: usize, ide: &IdeConfig, device: &DeviceConfig) -> Self {
        let mut devinfo = DeviceInfo {
            devtype: devtype::DIRECT_ACCESS,
            removable: true,
            writable: true,
            bytes_per_sector: SECTOR_SIZE,
            profiles: vec![profile::REMOVABLE_DISK],
            current_profile: profile::REMOVABLE_DISK,
            ..DeviceInfo::default()
        };
        devinfo.set_inquiry_strings("ZULUIDE", "REMOVABLE", "1.0");
        devinfo.set_ident_strings("ZULUIDE REMOVABLE", "1234567890", "1.0");

        Self {
            core: AtapiCore::new(devinfo, dev_index, ide, device),
        }
    }

    /// FORMAT UNIT: the 12-byte format descriptor is accepted and ignored
    fn format_unit(&mut self, phy: &mut dyn Phy) -> CmdResult {
        let descriptor = self.core.recv_parameters(phy, 12)?;
        log::debug!("FORMAT UNIT descriptor: {}", HexBytes(&descriptor));
        Ok(())
    }

    /// READ FORMAT CAPACITIES: current capacity plus one formattable size
    fn read_format_capacities(&mut self, phy: &mut dyn Phy, cmd: &[u8; 12]) -> CmdResult {
        require_medium(&self.core)?;
        let alloc_len = parse_be16(&cmd[7..]) as usize;
        let sectors = self.capacity_lba().min(u32::MAX as u64) as u32;

        let mut buf = [0u8; 20];
        buf[3] = 16;
        write_be32(&mut buf[4..], sectors);
        buf[8] = 0x02; // formatted media
        write_be24(&mut buf[9..], self.core.devinfo.bytes_per_sector);
        write_be32(&mut buf[12..], sectors);
        write_be24(&mut buf[17..], SECTOR_SIZE);

        self.core.send_response(phy, &buf, alloc_len)
    }
}

impl AtapiDevice for RemovableDevice {
    fn core(&self) -> &AtapiCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AtapiCore {
        &mut self.core
    }

    fn packet_command(&mut self, phy: &mut dyn Phy, cmd: &[u8; 12]) -> Option<CmdResult> {
        let result = match cmd[0] {
            atapi_cmd::FORMAT_UNIT => self.format_unit(phy),
            atapi_cmd::READ_FORMAT_CAPACITIES => self.read_format_capacities(phy, cmd),
            atapi_cmd::VERIFY10 => {
                log::debug!("VERIFY accepted without media check");
                Ok(())
            }
            _ => return None,
        };
        Some(result)
    }

    fn mode_page(&self, page_ctrl: u8, page: u8, out: &mut Vec<u8>) -> bool {
        match page {
            mode_page::ERROR_RECOVERY => error_recovery_page(page_ctrl, out),
            mode_page::CACHING => caching_page(page_ctrl, out),
            _ => return false,
        }
        true
    }

    fn loaded_medium_type(&self) -> u8 {
        medium_type::UNKNOWN
    }

    fn image_changed(&mut self) {
        if let Some(image) = &self.core.image {
            if image.capacity() % SECTOR_SIZE as u64 != 0 {
                log::warn!(
                    "Image {} is not a multiple of {} bytes, ignoring the last partial sector",
                    image.filename(),
                    SECTOR_SIZE
                );
            }
        }
    }
}

#[cfg(test)]
mod tests;
