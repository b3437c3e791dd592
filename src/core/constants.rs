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

//! ATA / ATAPI protocol constants
//!
//! Register bit layouts follow ATA/ATAPI-6 (T13/1410D), packet command
//! opcodes and sense codes follow MMC-4 and SPC.
//!
//! | Register       | Type           | Notes                               |
//! |----------------|----------------|-------------------------------------|
//! | Status         | [`Status`]     | also used as the IRQ status payload |
//! | Error          | [`AtaError`]   | ATAPI puts the sense key in bits 4-7|
//! | Device control | [`DeviceControl`] | written by host, reported by PHY |
//! | Sector count   | [`InterruptReason`] | ATAPI interrupt reason         |

use bitflags::bitflags;

bitflags! {
    /// Status register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Status: u8 {
        const BSY = 0x80;
        const DEVRDY = 0x40;
        const DEVFAULT = 0x20;
        /// Device seek complete (ATA) / service (ATAPI)
        const DSC = 0x10;
        const DATAREQ = 0x08;
        const CORR = 0x04;
        const IDX = 0x02;
        const ERR = 0x01;
    }
}

impl Status {
    /// Alias of DSC used by packet devices
    pub const SERVICE: Status = Status::DSC;
}

bitflags! {
    /// Error register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AtaError: u8 {
        const ICRC = 0x80;
        const UNC = 0x40;
        const MEDIACHANGE = 0x20;
        const IDNF = 0x10;
        const MEDIACHANGEREQ = 0x08;
        const ABORT = 0x04;
        const NOMEDIA = 0x02;
        const AMNF = 0x01;
    }
}

impl AtaError {
    /// GET_MEDIA_STATUS reuses bit 6 for write protect
    pub const WRITEPROTECT: AtaError = AtaError::UNC;
}

/// EXECUTE DEVICE DIAGNOSTIC results reported in the error register
pub mod diag {
    pub const DEV0_PASS: u8 = 0x01;
    pub const DEV1_FAIL: u8 = 0x80;
}

bitflags! {
    /// Device control register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceControl: u8 {
        const HOB = 0x80;
        const SRST = 0x04;
        const NIEN = 0x02;
    }
}

/// Device/head register bits
pub mod device_reg {
    pub const LBA: u8 = 0x40;
    pub const DEV: u8 = 0x10;
    pub const HEAD_MASK: u8 = 0x0F;
}

bitflags! {
    /// ATAPI interrupt reason, carried in the sector count register
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InterruptReason: u8 {
        const IS_CMD = 0x01;
        const TO_HOST = 0x02;
        const RELEASE = 0x04;
    }
}

/// ATA command opcodes
pub mod ide_cmd {
    pub const NOP: u8 = 0x00;
    pub const DEVICE_RESET: u8 = 0x08;
    pub const RECALIBRATE: u8 = 0x10;
    pub const READ_SECTORS: u8 = 0x20;
    pub const READ_SECTORS_EXT: u8 = 0x24;
    pub const WRITE_SECTORS: u8 = 0x30;
    pub const WRITE_SECTORS_EXT: u8 = 0x34;
    pub const EXECUTE_DEVICE_DIAGNOSTIC: u8 = 0x90;
    pub const INIT_DEV_PARAMS: u8 = 0x91;
    pub const PACKET: u8 = 0xA0;
    pub const IDENTIFY_PACKET_DEVICE: u8 = 0xA1;
    pub const READ_DMA: u8 = 0xC8;
    pub const WRITE_DMA: u8 = 0xCA;
    pub const GET_MEDIA_STATUS: u8 = 0xDA;
    pub const READ_BUFFER: u8 = 0xE4;
    pub const WRITE_BUFFER: u8 = 0xE8;
    pub const IDENTIFY_DEVICE: u8 = 0xEC;
    pub const SET_FEATURES: u8 = 0xEF;
}

/// SET FEATURES subcommands (feature register)
pub mod set_feature {
    pub const TRANSFER_MODE: u8 = 0x03;
    pub const DISABLE_STATUS_NOTIFICATION: u8 = 0x31;
    pub const DISABLE_REVERT_TO_POWERON: u8 = 0x66;
    pub const ENABLE_STATUS_NOTIFICATION: u8 = 0x95;
    pub const ENABLE_REVERT_TO_POWERON: u8 = 0xCC;
}

/// Packet command opcodes
pub mod atapi_cmd {
    pub const TEST_UNIT_READY: u8 = 0x00;
    pub const REQUEST_SENSE: u8 = 0x03;
    pub const FORMAT_UNIT: u8 = 0x04;
    pub const IOMEGA_VENDOR: u8 = 0x06;
    pub const READ6: u8 = 0x08;
    pub const WRITE6: u8 = 0x0A;
    pub const IOMEGA_VENDOR_0D: u8 = 0x0D;
    pub const INQUIRY: u8 = 0x12;
    pub const MODE_SELECT6: u8 = 0x15;
    pub const MODE_SENSE6: u8 = 0x1A;
    pub const START_STOP_UNIT: u8 = 0x1B;
    pub const PREVENT_ALLOW_MEDIUM_REMOVAL: u8 = 0x1E;
    pub const READ_FORMAT_CAPACITIES: u8 = 0x23;
    pub const READ_CAPACITY: u8 = 0x25;
    pub const READ10: u8 = 0x28;
    pub const WRITE10: u8 = 0x2A;
    pub const SEEK10: u8 = 0x2B;
    pub const VERIFY10: u8 = 0x2F;
    pub const SYNCHRONIZE_CACHE: u8 = 0x35;
    pub const READ_SUB_CHANNEL: u8 = 0x42;
    pub const READ_TOC: u8 = 0x43;
    pub const READ_HEADER: u8 = 0x44;
    pub const PLAY_AUDIO10: u8 = 0x45;
    pub const GET_CONFIGURATION: u8 = 0x46;
    pub const PLAY_AUDIO_MSF: u8 = 0x47;
    pub const GET_EVENT_STATUS_NOTIFICATION: u8 = 0x4A;
    pub const PAUSE_RESUME: u8 = 0x4B;
    pub const STOP_PLAY_SCAN: u8 = 0x4E;
    pub const READ_DISC_INFORMATION: u8 = 0x51;
    pub const READ_TRACK_INFORMATION: u8 = 0x52;
    pub const MODE_SELECT10: u8 = 0x55;
    pub const MODE_SENSE10: u8 = 0x5A;
    pub const PLAY_AUDIO12: u8 = 0xA5;
    pub const READ12: u8 = 0xA8;
    pub const WRITE12: u8 = 0xAA;
    pub const READ_CD_MSF: u8 = 0xB9;
    pub const SET_CD_SPEED: u8 = 0xBB;
    pub const MECHANISM_STATUS: u8 = 0xBD;
    pub const READ_CD: u8 = 0xBE;
}

/// SCSI sense keys
pub mod sense_key {
    pub const NO_SENSE: u8 = 0x00;
    pub const RECOVERED_ERROR: u8 = 0x01;
    pub const NOT_READY: u8 = 0x02;
    pub const MEDIUM_ERROR: u8 = 0x03;
    pub const HARDWARE_ERROR: u8 = 0x04;
    pub const ILLEGAL_REQUEST: u8 = 0x05;
    pub const UNIT_ATTENTION: u8 = 0x06;
    pub const DATA_PROTECT: u8 = 0x07;
    pub const ABORTED_COMMAND: u8 = 0x0B;
    pub const MISCOMPARE: u8 = 0x0E;
}

/// Additional sense code and qualifier, packed as `asc << 8 | ascq`
pub mod asc {
    pub const NO_ADDITIONAL_SENSE: u16 = 0x0000;
    pub const UNIT_BECOMING_READY: u16 = 0x0401;
    pub const CRC_ERROR: u16 = 0x0803;
    pub const CIRC_UNRECOVERED_ERROR: u16 = 0x1106;
    pub const PARAMETER_LIST_LENGTH_ERROR: u16 = 0x1A00;
    pub const INVALID_COMMAND_OPERATION_CODE: u16 = 0x2000;
    pub const LBA_OUT_OF_RANGE: u16 = 0x2100;
    pub const INVALID_FIELD_IN_CDB: u16 = 0x2400;
    pub const WRITE_PROTECTED: u16 = 0x2700;
    pub const MEDIUM_MAY_HAVE_CHANGED: u16 = 0x2800;
    pub const POWER_ON_RESET: u16 = 0x2900;
    pub const COMMAND_SEQUENCE_ERROR: u16 = 0x2C00;
    pub const MEDIUM_NOT_PRESENT: u16 = 0x3A00;
    pub const MEDIUM_NOT_PRESENT_TRAY_OPEN: u16 = 0x3A02;
    pub const MEDIUM_REMOVAL_PREVENTED: u16 = 0x5302;
    pub const ILLEGAL_MODE_FOR_THIS_TRACK: u16 = 0x6400;
}

/// Peripheral device types reported by INQUIRY and IDENTIFY PACKET DEVICE
pub mod devtype {
    pub const DIRECT_ACCESS: u8 = 0x00;
    pub const CDROM: u8 = 0x05;
}

/// Medium type codes reported in the mode parameter header
pub mod medium_type {
    pub const UNKNOWN: u8 = 0x00;
    pub const CDROM: u8 = 0x01;
    pub const CDDA: u8 = 0x02;
    pub const CDMIXED: u8 = 0x03;
    pub const NONE: u8 = 0x70;
}

/// MMC feature profiles
pub mod profile {
    pub const REMOVABLE_DISK: u16 = 0x0002;
    pub const CDROM: u16 = 0x0008;
}

/// Mode page codes
pub mod mode_page {
    pub const VENDOR_ZERO: u8 = 0x00;
    pub const ERROR_RECOVERY: u8 = 0x01;
    pub const FLEXIBLE_DISK: u8 = 0x05;
    pub const CACHING: u8 = 0x08;
    pub const CD_PARAMETERS: u8 = 0x0D;
    pub const CD_AUDIO_CONTROL: u8 = 0x0E;
    pub const IOMEGA_VENDOR: u8 = 0x2F;
    pub const CAPABILITIES: u8 = 0x2A;
    pub const ALL: u8 = 0x3F;
}

/// Media status event codes for GET EVENT STATUS NOTIFICATION
pub mod media_event {
    pub const NO_CHANGE: u8 = 0x00;
    pub const EJECT_REQUEST: u8 = 0x01;
    pub const NEW_MEDIA: u8 = 0x02;
    pub const MEDIA_REMOVAL: u8 = 0x03;
}

/// START STOP UNIT byte 4 bits
pub mod start_stop {
    pub const START: u8 = 0x01;
    pub const LOEJ: u8 = 0x02;
    pub const POWER_CONDITION_MASK: u8 = 0xF0;
}

/// INQUIRY response field offsets
pub mod inquiry {
    pub const OFFSET_TYPE: usize = 0;
    pub const OFFSET_REMOVABLE: usize = 1;
    pub const OFFSET_VERSION: usize = 2;
    /// ATAPI version in the upper nibble, response format in the lower
    pub const OFFSET_ATAPI_VERSION: usize = 3;
    pub const OFFSET_EXTRA_LENGTH: usize = 4;
    pub const OFFSET_VENDOR: usize = 8;
    pub const OFFSET_PRODUCT: usize = 16;
    pub const OFFSET_REVISION: usize = 32;
    pub const VENDOR_LEN: usize = 8;
    pub const PRODUCT_LEN: usize = 16;
    pub const REVISION_LEN: usize = 4;
}

/// IDENTIFY (PACKET) DEVICE word offsets
pub mod identify {
    pub const GENERAL_CONFIGURATION: usize = 0;
    pub const NUM_CYLINDERS: usize = 1;
    pub const NUM_HEADS: usize = 3;
    pub const SECTORS_PER_TRACK: usize = 6;
    pub const SERIAL_NUMBER: usize = 10;
    pub const FIRMWARE_REV: usize = 23;
    pub const MODEL_NUMBER: usize = 27;
    pub const MAX_SECTORS: usize = 47;
    pub const CAPABILITIES_1: usize = 49;
    pub const CAPABILITIES_2: usize = 50;
    pub const PIO_MODE_ATA1: usize = 51;
    pub const MODE_INFO_VALID: usize = 53;
    pub const CURRENT_CYLINDERS: usize = 54;
    pub const CURRENT_HEADS: usize = 55;
    pub const CURRENT_SECTORS_PER_TRACK: usize = 56;
    pub const CURRENT_CAPACITY_LOW: usize = 57;
    pub const CURRENT_CAPACITY_HIGH: usize = 58;
    pub const TOTAL_SECTORS: usize = 60;
    pub const MODEINFO_SINGLEWORD: usize = 62;
    pub const MODEINFO_MULTIWORD: usize = 63;
    pub const MODEINFO_PIO: usize = 64;
    pub const MULTIWORD_CYCLETIME_MIN: usize = 65;
    pub const MULTIWORD_CYCLETIME_REC: usize = 66;
    pub const PIO_CYCLETIME_MIN: usize = 67;
    pub const PIO_CYCLETIME_IORDY: usize = 68;
    pub const PACKET_RELEASE_TIME: usize = 71;
    pub const SERVICE_RELEASE_TIME: usize = 72;
    pub const STANDARD_VERSION_MAJOR: usize = 80;
    pub const STANDARD_VERSION_MINOR: usize = 81;
    pub const COMMAND_SET_SUPPORT_1: usize = 82;
    pub const COMMAND_SET_SUPPORT_2: usize = 83;
    pub const COMMAND_SET_SUPPORT_3: usize = 84;
    pub const COMMAND_SET_ENABLED_1: usize = 85;
    pub const COMMAND_SET_ENABLED_2: usize = 86;
    pub const COMMAND_SET_DEFAULT: usize = 87;
    pub const MODEINFO_ULTRADMA: usize = 88;
    pub const HARDWARE_RESET_RESULT: usize = 93;
    pub const MAX_LBA_48: usize = 100;
    pub const REMOVABLE_MEDIA_SUPPORT: usize = 127;
    pub const INTEGRITY_WORD: usize = 255;

    pub const SERIAL_NUMBER_WORDS: usize = 10;
    pub const FIRMWARE_REV_WORDS: usize = 4;
    pub const MODEL_NUMBER_WORDS: usize = 20;
}

/// CHS capacity tier limits
pub mod chs {
    pub const LIMIT_528MB_BYTES: u64 = 528_482_304;
    pub const LIMIT_8GB_WITH_GAP_BYTES: u64 = 8_455_200_768;
    pub const LIMIT_8GB_BYTES: u64 = 8_455_716_864;
    /// 16383 x 16 x 63
    pub const LEGACY_MAX_SECTORS: u64 = 16_514_064;
    pub const MAX_CYLINDERS: u16 = 16383;
    pub const MAX_HEADS: u8 = 16;
    pub const MAX_SECTORS_PER_TRACK: u8 = 63;
}

/// Human readable name of an ATA command for logging
pub fn ide_command_name(cmd: u8) -> &'static str {
    match cmd {
        ide_cmd::NOP => "NOP",
        ide_cmd::DEVICE_RESET => "DEVICE_RESET",
        ide_cmd::RECALIBRATE => "RECALIBRATE",
        ide_cmd::READ_SECTORS => "READ_SECTORS",
        ide_cmd::READ_SECTORS_EXT => "READ_SECTORS_EXT",
        ide_cmd::WRITE_SECTORS => "WRITE_SECTORS",
        ide_cmd::WRITE_SECTORS_EXT => "WRITE_SECTORS_EXT",
        ide_cmd::EXECUTE_DEVICE_DIAGNOSTIC => "EXECUTE_DEVICE_DIAGNOSTIC",
        ide_cmd::INIT_DEV_PARAMS => "INIT_DEV_PARAMS",
        ide_cmd::PACKET => "PACKET",
        ide_cmd::IDENTIFY_PACKET_DEVICE => "IDENTIFY_PACKET_DEVICE",
        ide_cmd::READ_DMA => "READ_DMA",
        ide_cmd::WRITE_DMA => "WRITE_DMA",
        ide_cmd::GET_MEDIA_STATUS => "GET_MEDIA_STATUS",
        ide_cmd::READ_BUFFER => "READ_BUFFER",
        ide_cmd::WRITE_BUFFER => "WRITE_BUFFER",
        ide_cmd::IDENTIFY_DEVICE => "IDENTIFY_DEVICE",
        ide_cmd::SET_FEATURES => "SET_FEATURES",
        _ => "UNKNOWN_CMD",
    }
}

/// Human readable name of a packet command for logging
pub fn atapi_command_name(opcode: u8) -> &'static str {
    use atapi_cmd::*;
    match opcode {
        TEST_UNIT_READY => "TEST_UNIT_READY",
        REQUEST_SENSE => "REQUEST_SENSE",
        FORMAT_UNIT => "FORMAT_UNIT",
        IOMEGA_VENDOR => "IOMEGA_VENDOR",
        READ6 => "READ6",
        WRITE6 => "WRITE6",
        IOMEGA_VENDOR_0D => "IOMEGA_VENDOR_0D",
        INQUIRY => "INQUIRY",
        MODE_SELECT6 => "MODE_SELECT6",
        MODE_SENSE6 => "MODE_SENSE6",
        START_STOP_UNIT => "START_STOP_UNIT",
        PREVENT_ALLOW_MEDIUM_REMOVAL => "PREVENT_ALLOW_MEDIUM_REMOVAL",
        READ_FORMAT_CAPACITIES => "READ_FORMAT_CAPACITIES",
        READ_CAPACITY => "READ_CAPACITY",
        READ10 => "READ10",
        WRITE10 => "WRITE10",
        SEEK10 => "SEEK10",
        VERIFY10 => "VERIFY10",
        SYNCHRONIZE_CACHE => "SYNCHRONIZE_CACHE",
        READ_SUB_CHANNEL => "READ_SUB_CHANNEL",
        READ_TOC => "READ_TOC",
        READ_HEADER => "READ_HEADER",
        PLAY_AUDIO10 => "PLAY_AUDIO10",
        GET_CONFIGURATION => "GET_CONFIGURATION",
        PLAY_AUDIO_MSF => "PLAY_AUDIO_MSF",
        GET_EVENT_STATUS_NOTIFICATION => "GET_EVENT_STATUS_NOTIFICATION",
        PAUSE_RESUME => "PAUSE_RESUME",
        STOP_PLAY_SCAN => "STOP_PLAY_SCAN",
        READ_DISC_INFORMATION => "READ_DISC_INFORMATION",
        READ_TRACK_INFORMATION => "READ_TRACK_INFORMATION",
        MODE_SELECT10 => "MODE_SELECT10",
        MODE_SENSE10 => "MODE_SENSE10",
        PLAY_AUDIO12 => "PLAY_AUDIO12",
        READ12 => "READ12",
        WRITE12 => "WRITE12",
        READ_CD_MSF => "READ_CD_MSF",
        SET_CD_SPEED => "SET_CD_SPEED",
        MECHANISM_STATUS => "MECHANISM_STATUS",
        READ_CD => "READ_CD",
        _ => "UNKNOWN_CMD",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_bits_match_register_layout() {
        let status = Status::DEVRDY | Status::DSC | Status::ERR;
        assert_eq!(status.bits(), 0x51);
        assert_eq!(Status::SERVICE, Status::DSC);
    }

    #[test]
    fn test_command_names() {
        assert_eq!(ide_command_name(ide_cmd::PACKET), "PACKET");
        assert_eq!(atapi_command_name(atapi_cmd::READ_CD), "READ_CD");
        assert_eq!(atapi_command_name(0xFF), "UNKNOWN_CMD");
    }
}
