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

//! Fixed identity data of the Iomega drives
//!
//! INQUIRY, IDENTIFY PACKET DEVICE and the vendor disk status page are
//! reproduced from real ZIP 100 and ZIP 250 ATAPI drives. Iomega host
//! software checks these bytes, so they are not derived from
//! [`crate::core::atapi::DeviceInfo`] beyond the three INQUIRY strings.

use crate::core::atapi::DeviceInfo;
use crate::core::constants::{identify, inquiry};
use crate::core::utils::write_scsi_ascii;

use super::ZipModel;

/// INQUIRY response length of both drives
pub const INQUIRY_LEN: usize = 122;

/// Vendor command 0x06 response length
pub const DISK_STATUS_LEN: usize = 64;

/// Length of the disk serial field in the status page
pub const SERIAL_LEN: usize = 25;

/// Vendor words 129..=146 of IDENTIFY PACKET DEVICE
const IDENTIFY_COPYRIGHT: [u16; 18] = [
    0x2863, 0x2920, 0x436F, 0x7079, 0x7269, 0x6768, 0x7420, 0x494F, 0x4D45, 0x4741, 0x2032,
    0x3030, 0x3020, 0x0000, 0x3830, 0x312F, 0x2F34, 0x3030,
];

const IDENTIFY_COPYRIGHT_OFFSET: usize = 129;

impl ZipModel {
    /// Firmware date stored after the standard INQUIRY fields
    fn firmware_date(self) -> &'static [u8; 8] {
        match self {
            ZipModel::Zip100 => b"09/04/98",
            ZipModel::Zip250 => b"08/14/00",
        }
    }

    fn copyright(self) -> &'static [u8; 26] {
        match self {
            ZipModel::Zip100 => b"(c) Copyright IOMEGA 1997 ",
            ZipModel::Zip250 => b"(c) Copyright IOMEGA 2000 ",
        }
    }

    /// Drive-specific trailer of the disk status page
    fn status_trailer(self) -> [u8; 2] {
        match self {
            ZipModel::Zip100 => [0x00, 0x12],
            ZipModel::Zip250 => [0x10, 0x10],
        }
    }
}

/// INQUIRY data as returned by the drive
pub fn inquiry_data(model: ZipModel, info: &DeviceInfo) -> Vec<u8> {
    let mut buf = vec![0u8; INQUIRY_LEN];
    buf[inquiry::OFFSET_REMOVABLE] = 0x80;
    buf[inquiry::OFFSET_ATAPI_VERSION] = 0x01;
    buf[inquiry::OFFSET_EXTRA_LENGTH] = 0x75;
    write_scsi_ascii(
        &mut buf[inquiry::OFFSET_VENDOR..inquiry::OFFSET_VENDOR + inquiry::VENDOR_LEN],
        &info.vendor,
    );
    write_scsi_ascii(
        &mut buf[inquiry::OFFSET_PRODUCT..inquiry::OFFSET_PRODUCT + inquiry::PRODUCT_LEN],
        &info.product,
    );
    write_scsi_ascii(
        &mut buf[inquiry::OFFSET_REVISION..inquiry::OFFSET_REVISION + inquiry::REVISION_LEN],
        &info.revision,
    );
    buf[36..44].copy_from_slice(model.firmware_date());
    buf[96..122].copy_from_slice(model.copyright());
    buf
}

/// Replace the generic IDENTIFY PACKET DEVICE fields with the drive's own
pub fn patch_identify(model: ZipModel, idf: &mut [u16; 256]) {
    idf[identify::GENERAL_CONFIGURATION] = 0x80A0;

    match model {
        ZipModel::Zip100 => {
            idf[identify::CAPABILITIES_1] = 0x0E00;
            idf[identify::PIO_MODE_ATA1] = 0;
            idf[identify::MODE_INFO_VALID] = 0x0002;
            idf[identify::MODEINFO_MULTIWORD] = 0;
            idf[identify::MODEINFO_PIO] = 0;
            idf[identify::MULTIWORD_CYCLETIME_MIN] = 0;
            idf[identify::MULTIWORD_CYCLETIME_REC] = 0;
            idf[identify::PIO_CYCLETIME_MIN] = 0x01F4;
            idf[identify::PIO_CYCLETIME_IORDY] = 0x01F4;
            idf[identify::STANDARD_VERSION_MAJOR] = 0;
            idf[identify::STANDARD_VERSION_MINOR] = 0;
            idf[identify::MODEINFO_ULTRADMA] = 0;
            idf[identify::REMOVABLE_MEDIA_SUPPORT] = 0x0101;
        }
        ZipModel::Zip250 => {
            idf[identify::CAPABILITIES_1] = 0x0F00;
            idf[identify::PIO_MODE_ATA1] = 0x0200;
            idf[identify::MODE_INFO_VALID] = 0x0006;
            idf[identify::MODEINFO_MULTIWORD] = 0x0203;
            idf[identify::MODEINFO_PIO] = 0x0001;
            idf[identify::MULTIWORD_CYCLETIME_MIN] = 0x0096;
            idf[identify::MULTIWORD_CYCLETIME_REC] = 0x0096;
            idf[identify::PIO_CYCLETIME_MIN] = 0x00B4;
            idf[identify::PIO_CYCLETIME_IORDY] = 0x00B4;
            // ATAPI-4 and ATAPI-5
            idf[identify::STANDARD_VERSION_MAJOR] = 0x0030;
            idf[identify::STANDARD_VERSION_MINOR] = 0x0015;
            idf[identify::REMOVABLE_MEDIA_SUPPORT] = 0x0001;
        }
    }

    idf[identify::CAPABILITIES_2] = 0x4002;
    idf[IDENTIFY_COPYRIGHT_OFFSET..IDENTIFY_COPYRIGHT_OFFSET + IDENTIFY_COPYRIGHT.len()]
        .copy_from_slice(&IDENTIFY_COPYRIGHT);
}

/// Disk status page returned by vendor command 0x06
///
/// # Arguments
///
/// * `model` - Drive model, `None` when no image was ever bound
/// * `medium_present` - A disk is in the drive
/// * `button_pressed` - Eject button pressed while removal was prevented
/// * `serial` - Disk serial, space padded to [`SERIAL_LEN`]
pub fn disk_status(
    model: Option<ZipModel>,
    medium_present: bool,
    button_pressed: bool,
    serial: &str,
) -> [u8; DISK_STATUS_LEN] {
    let mut buf = [0u8; DISK_STATUS_LEN];
    if let Some(model) = model {
        buf[0x3E..0x40].copy_from_slice(&model.status_trailer());
    }

    buf[0x00] = 0x02;
    buf[0x01] = 0x3E;
    let model = match model {
        Some(model) if medium_present => model,
        _ => {
            buf[0x02] = 0x04;
            buf[0x0B] = 0x02;
            return buf;
        }
    };

    buf[0x02] = u8::from(button_pressed);
    buf[0x03] = 0x02;
    buf[0x06] = 0x02;
    buf[0x07] = 0xFF;
    buf[0x08] = 0xFF;
    buf[0x0B] = 0x02;

    match model {
        ZipModel::Zip100 => {
            buf[0x0E] = 0x7E;
            buf[0x12] = 0x7E;
            write_scsi_ascii(&mut buf[0x16..0x16 + SERIAL_LEN], serial);
            buf[0x2F..0x3E].copy_from_slice(b"A42ZP18E112    ");
        }
        ZipModel::Zip250 => {
            buf[0x0E] = 0x7D;
            buf[0x10] = 0x01;
            buf[0x12] = 0x78;
            buf[0x14] = 0x06;
            buf[0x16..0x16 + SERIAL_LEN].copy_from_slice(b"523402021479731402ZIP1   ");
            buf[0x2F..0x3E].copy_from_slice(b"KAM9500E311    ");
        }
    }
    buf
}
