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

//! IDENTIFY DEVICE data of the rigid disk

use super::{RigidDevice, MAX_LBA28};
use crate::core::atapi::reset_result_word;
use crate::core::constants::identify;
use crate::core::utils::{copy_id_string, finalize_identify, identify_to_bytes};

impl RigidDevice {
    /// IDENTIFY DEVICE words including the integrity word
    pub fn identify_words(&self) -> [u16; 256] {
        let caps = self.xfer.capabilities();
        let mut idf = [0u16; 256];

        // Fixed, non-removable ATA device
        idf[identify::GENERAL_CONFIGURATION] = 0x0040;
        idf[identify::NUM_CYLINDERS] = self.native.cylinders;
        idf[identify::NUM_HEADS] = self.native.heads as u16;
        idf[identify::SECTORS_PER_TRACK] = self.native.sectors_per_track as u16;

        copy_id_string(
            &mut idf[identify::SERIAL_NUMBER..identify::SERIAL_NUMBER + identify::SERIAL_NUMBER_WORDS],
            &self.info.serial,
        );
        copy_id_string(
            &mut idf[identify::FIRMWARE_REV..identify::FIRMWARE_REV + identify::FIRMWARE_REV_WORDS],
            &self.info.firmware,
        );
        copy_id_string(
            &mut idf[identify::MODEL_NUMBER..identify::MODEL_NUMBER + identify::MODEL_NUMBER_WORDS],
            &self.info.model,
        );

        idf[identify::CAPABILITIES_1] = (if caps.supports_iordy { 1 << 11 } else { 0 })
            | (1 << 9)
            | (if caps.max_udma_mode.is_some() { 1 << 8 } else { 0 });
        idf[identify::CAPABILITIES_2] = 0x4000;
        idf[identify::PIO_MODE_ATA1] = (caps.max_pio_mode as u16) << 8;

        // Words 54-58, 64-70 and 88 are valid
        idf[identify::MODE_INFO_VALID] = 0x0007;
        idf[identify::CURRENT_CYLINDERS] = self.current.cylinders;
        idf[identify::CURRENT_HEADS] = self.current.heads as u16;
        idf[identify::CURRENT_SECTORS_PER_TRACK] = self.current.sectors_per_track as u16;
        let current = self.current.total_sectors().min(u32::MAX as u64) as u32;
        idf[identify::CURRENT_CAPACITY_LOW] = current as u16;
        idf[identify::CURRENT_CAPACITY_HIGH] = (current >> 16) as u16;

        let total = self.capacity_lba().min(MAX_LBA28) as u32;
        idf[identify::TOTAL_SECTORS] = total as u16;
        idf[identify::TOTAL_SECTORS + 1] = (total >> 16) as u16;

        idf[identify::MODEINFO_PIO] = match caps.max_pio_mode {
            0..=2 => 0,
            3 => 0x01,
            _ => 0x03,
        };
        idf[identify::PIO_CYCLETIME_MIN] = caps.min_pio_cycletime_no_iordy;
        idf[identify::PIO_CYCLETIME_IORDY] = caps.min_pio_cycletime_with_iordy;

        idf[identify::STANDARD_VERSION_MAJOR] = 0x0078;
        idf[identify::STANDARD_VERSION_MINOR] = 0x0019;
        idf[identify::COMMAND_SET_SUPPORT_1] = 0x4000;
        idf[identify::COMMAND_SET_SUPPORT_2] = 0x4000;
        idf[identify::COMMAND_SET_SUPPORT_3] = 0x4000;
        idf[identify::COMMAND_SET_ENABLED_1] = 0x4000;
        idf[identify::COMMAND_SET_DEFAULT] = 0x4000;

        if let Some(max) = caps.max_udma_mode {
            idf[identify::MODEINFO_ULTRADMA] = (1u16 << (max + 1)) - 1;
            if let Some(mode) = self.xfer.udma_mode {
                idf[identify::MODEINFO_ULTRADMA] |= 1 << (mode + 8);
            }
        }

        idf[identify::HARDWARE_RESET_RESULT] =
            reset_result_word(self.dev_index, self.enable_dev1_zeros);

        finalize_identify(&mut idf);
        idf
    }

    /// IDENTIFY DEVICE data in bus order
    pub fn identify_bytes(&self) -> [u8; 512] {
        identify_to_bytes(&self.identify_words())
    }
}
