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

//! ATAPI CD-ROM drive
//!
//! Emulates an MMC CD-ROM drive on top of the shared packet engine. The
//! disc layout comes from the image's companion CUE sheet (see [`cue`]);
//! a plain `.iso` is a single MODE1/2048 data track.
//!
//! # Supported commands
//!
//! | Opcode | Command                   | Notes                              |
//! |--------|---------------------------|------------------------------------|
//! | 0x28   | READ (10)                 | data tracks, raw sectors stripped  |
//! | 0x42   | READ SUB-CHANNEL          | formats 1-3                        |
//! | 0x43   | READ TOC/PMA/ATIP         | formats 0-2                        |
//! | 0x44   | READ HEADER               |                                    |
//! | 0x45   | PLAY AUDIO (10)           | accepted, no audio output          |
//! | 0x51   | READ DISC INFORMATION     |                                    |
//! | 0x52   | READ TRACK INFORMATION    | LBA, track or session addressing   |
//! | 0xB9   | READ CD MSF               |                                    |
//! | 0xBB   | SET CD SPEED              | accepted                           |
//! | 0xBD   | MECHANISM STATUS          |                                    |
//! | 0xBE   | READ CD                   | sector reformatting, Q sub-channel |

use crate::core::atapi::commands::{error_recovery_page, require_medium};
use crate::core::atapi::{AtapiCore, AtapiDevice, CmdResult, DeviceInfo};
use crate::core::config::{DeviceConfig, IdeConfig};
use crate::core::constants::{asc, atapi_cmd, devtype, medium_type, mode_page, profile};
use crate::core::error::AtapiError;
use crate::core::phy::Phy;
use crate::core::utils::{parse_be16, parse_be24, parse_be32};

pub mod cue;
pub mod msf;
pub mod read;
pub mod toc;
#[cfg(test)]
mod tests;

pub use cue::{resolve_image_path, TrackDescriptor, TrackLayout, TrackMode};
pub use msf::{bcd_to_dec, dec_to_bcd, Msf};
pub use read::{ReadFormat, SectorRequest};

/// Sector size seen through READ (10) and READ CAPACITY
pub const SECTOR_SIZE: u32 = 2048;

/// Drive speed reported in the capabilities page, KB/s (40x)
const MAX_SPEED_KBPS: u16 = 7056;

/// CD-ROM drive
#[derive(Debug)]
pub struct CdromDevice {
    core: AtapiCore,
    layout: TrackLayout,
}

impl CdromDevice {
    pub fn new(dev_index: usize, ide: &IdeConfig, device: &DeviceConfig) -> Self {
        let mut devinfo = DeviceInfo {
            devtype: devtype::CDROM,
            removable: true,
            writable: false,
            bytes_per_sector: SECTOR_SIZE,
            profiles: vec![profile::CDROM],
            current_profile: profile::CDROM,
            ..DeviceInfo::default()
        };
        devinfo.set_inquiry_strings("ZULUIDE", "CDROM", "1.0");
        devinfo.set_ident_strings("ZuluIDE CD-ROM", "1234567890", "1.0");

        Self {
            core: AtapiCore::new(devinfo, dev_index, ide, device),
            layout: TrackLayout::default(),
        }
    }

    /// Track layout of the loaded disc, empty without an image
    pub fn layout(&self) -> &TrackLayout {
        &self.layout
    }

    /// Layout of the present medium, NOT READY when there is none
    fn disc(&self) -> Result<&TrackLayout, AtapiError> {
        require_medium(&self.core)?;
        Ok(&self.layout)
    }

    fn read_toc(&mut self, phy: &mut dyn Phy, cmd: &[u8; 12]) -> CmdResult {
        let format = toc::TocFormat::from_cdb(cmd)?;
        let data = toc::read_toc(self.disc()?, format)?;
        log::debug!("READ TOC {:?}: {} bytes", format, data.len());
        self.core.send_response(phy, &data, parse_be16(&cmd[7..]) as usize)
    }

    fn read_disc_information(&mut self, phy: &mut dyn Phy, cmd: &[u8; 12]) -> CmdResult {
        let data = toc::read_disc_information(self.disc()?)?;
        self.core.send_response(phy, &data, parse_be16(&cmd[7..]) as usize)
    }

    fn read_track_information(&mut self, phy: &mut dyn Phy, cmd: &[u8; 12]) -> CmdResult {
        let data = toc::read_track_information(self.disc()?, cmd)?;
        self.core.send_response(phy, &data, parse_be16(&cmd[7..]) as usize)
    }

    fn read_header(&mut self, phy: &mut dyn Phy, cmd: &[u8; 12]) -> CmdResult {
        let data = toc::read_header(self.disc()?, cmd)?;
        self.core.send_response(phy, &data, parse_be16(&cmd[7..]) as usize)
    }

    fn read_sub_channel(&mut self, phy: &mut dyn Phy, cmd: &[u8; 12]) -> CmdResult {
        let data = toc::read_sub_channel(self.disc()?, cmd)?;
        self.core.send_response(phy, &data, parse_be16(&cmd[7..]) as usize)
    }

    fn mechanism_status(&mut self, phy: &mut dyn Phy, cmd: &[u8; 12]) -> CmdResult {
        let data = toc::mechanism_status(self.core.medium_present());
        self.core.send_response(phy, &data, parse_be16(&cmd[8..]) as usize)
    }

    /// READ CD and READ CD MSF
    fn read_cd(&mut self, phy: &mut dyn Phy, cmd: &[u8; 12]) -> CmdResult {
        require_medium(&self.core)?;
        let (lba, length) = if cmd[0] == atapi_cmd::READ_CD_MSF {
            let start = Msf::from_bytes(&cmd[3..6])
                .to_lba()
                .ok_or_else(AtapiError::invalid_field)?;
            let end = Msf::from_bytes(&cmd[6..9])
                .to_lba()
                .ok_or_else(AtapiError::invalid_field)?;
            if end < start {
                return Err(AtapiError::invalid_field());
            }
            (start, end - start)
        } else {
            (parse_be32(&cmd[2..]), parse_be24(&cmd[6..]))
        };

        let request = SectorRequest::ReadCd {
            sector_type: (cmd[1] >> 2) & 0x07,
            main_channel: cmd[9],
            sub_channel: cmd[10] & 0x07,
        };
        log::debug!("READ CD LBA {} x{} {:?}", lba, length, request);

        if length == 0 {
            return Ok(());
        }
        self.check_range(lba, length)?;
        read::read_sectors(&mut self.core, &self.layout, phy, lba, length, request)
    }

    fn check_range(&self, lba: u32, length: u32) -> CmdResult {
        if lba as u64 + length as u64 > self.layout.lead_out_lba() as u64 {
            log::debug!(
                "CD access out of range: LBA {} + {} beyond lead-out {}",
                lba,
                length,
                self.layout.lead_out_lba()
            );
            return Err(AtapiError::illegal_request(asc::LBA_OUT_OF_RANGE));
        }
        Ok(())
    }

    /// PLAY AUDIO variants
    ///
    /// Audio output is not emulated. The request is validated and accepted
    /// when it addresses an audio track.
    fn play_audio(&self, cmd: &[u8; 12]) -> CmdResult {
        let layout = self.disc()?;
        let (lba, length) = match cmd[0] {
            atapi_cmd::PLAY_AUDIO10 => (parse_be32(&cmd[2..]), parse_be16(&cmd[7..]) as u32),
            atapi_cmd::PLAY_AUDIO12 => (parse_be32(&cmd[2..]), parse_be32(&cmd[6..])),
            _ => {
                if cmd[3..6] == [0xFF, 0xFF, 0xFF] {
                    // Play from the current position
                    return Ok(());
                }
                let start = Msf::from_bytes(&cmd[3..6]).to_lba().unwrap_or(0);
                let end = Msf::from_bytes(&cmd[6..9]).to_lba().unwrap_or(0);
                if end < start {
                    return Err(AtapiError::invalid_field());
                }
                (start, end - start)
            }
        };

        if length == 0 || lba == u32::MAX {
            return Ok(());
        }
        let track = layout
            .track_for_lba(lba)
            .ok_or_else(|| AtapiError::illegal_request(asc::LBA_OUT_OF_RANGE))?;
        if !track.is_audio() {
            log::debug!("PLAY AUDIO on data track {}", track.number);
            return Err(AtapiError::illegal_request(asc::ILLEGAL_MODE_FOR_THIS_TRACK));
        }
        log::info!("PLAY AUDIO LBA {} x{} ignored, no audio output", lba, length);
        Ok(())
    }
}

impl AtapiDevice for CdromDevice {
    fn core(&self) -> &AtapiCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AtapiCore {
        &mut self.core
    }

    fn packet_command(&mut self, phy: &mut dyn Phy, cmd: &[u8; 12]) -> Option<CmdResult> {
        let result = match cmd[0] {
            atapi_cmd::READ_TOC => self.read_toc(phy, cmd),
            atapi_cmd::READ_DISC_INFORMATION => self.read_disc_information(phy, cmd),
            atapi_cmd::READ_TRACK_INFORMATION => self.read_track_information(phy, cmd),
            atapi_cmd::READ_HEADER => self.read_header(phy, cmd),
            atapi_cmd::READ_SUB_CHANNEL => self.read_sub_channel(phy, cmd),
            atapi_cmd::READ_CD | atapi_cmd::READ_CD_MSF => self.read_cd(phy, cmd),
            atapi_cmd::MECHANISM_STATUS => self.mechanism_status(phy, cmd),
            atapi_cmd::SET_CD_SPEED => {
                log::debug!("SET CD SPEED read {} KB/s", parse_be16(&cmd[2..]));
                Ok(())
            }
            atapi_cmd::PLAY_AUDIO10 | atapi_cmd::PLAY_AUDIO12 | atapi_cmd::PLAY_AUDIO_MSF => {
                self.play_audio(cmd)
            }
            atapi_cmd::PAUSE_RESUME | atapi_cmd::STOP_PLAY_SCAN => require_medium(&self.core),
            _ => return None,
        };
        Some(result)
    }

    fn mode_page(&self, page_ctrl: u8, page: u8, out: &mut Vec<u8>) -> bool {
        let page_start = out.len();
        match page {
            mode_page::ERROR_RECOVERY => {
                error_recovery_page(page_ctrl, out);
                return true;
            }
            mode_page::CD_PARAMETERS => {
                // 60 seconds per minute, 75 frames per second
                out.extend_from_slice(&[0x0D, 0x06, 0x00, 0x00, 0x00, 0x3C, 0x00, 0x4B]);
            }
            mode_page::CD_AUDIO_CONTROL => {
                // Immediate playback, ports 0/1 on channels 0/1 at full volume
                out.extend_from_slice(&[
                    0x0E, 0x0E, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0xFF, 0x02, 0xFF, 0x00,
                    0x00, 0x00, 0x00,
                ]);
            }
            mode_page::CAPABILITIES => {
                let lock_state = if self.core.prevent_removal { 0x02 } else { 0x00 };
                let [speed_hi, speed_lo] = MAX_SPEED_KBPS.to_be_bytes();
                out.extend_from_slice(&[
                    0x2A,
                    0x14,
                    0x00,
                    0x00,
                    // Audio play, Mode 2 Form 1/2, multi-session
                    0x71,
                    // CD-DA commands, accurate stream
                    0x03,
                    // Lock, eject, tray loading
                    0x29 | lock_state,
                    0x03,
                    speed_hi,
                    speed_lo,
                    // 256 volume levels
                    0x01,
                    0x00,
                    // 64 KB buffer
                    0x00,
                    0x40,
                    speed_hi,
                    speed_lo,
                    0x00,
                    0x00,
                    0x00,
                    0x00,
                    0x00,
                    0x00,
                ]);
            }
            _ => return false,
        }

        if page_ctrl == 1 {
            out[page_start + 2..].fill(0);
        }
        true
    }

    fn capacity_lba(&self) -> u64 {
        if self.core.medium_present() {
            self.layout.lead_out_lba() as u64
        } else {
            0
        }
    }

    fn loaded_medium_type(&self) -> u8 {
        medium_type::CDROM
    }

    fn image_changed(&mut self) {
        self.layout = match &self.core.image {
            Some(image) => TrackLayout::load(image.path(), image.capacity()),
            None => TrackLayout::default(),
        };
        if !self.layout.is_empty() {
            let medium = self.layout.medium_type();
            self.core.set_loaded_medium_type(medium);
        }
    }

    fn read_blocks(&mut self, phy: &mut dyn Phy, lba: u64, count: u32) -> CmdResult {
        let lba = u32::try_from(lba)
            .map_err(|_| AtapiError::illegal_request(asc::LBA_OUT_OF_RANGE))?;
        read::read_sectors(
            &mut self.core,
            &self.layout,
            phy,
            lba,
            count,
            SectorRequest::UserData,
        )
    }
}
