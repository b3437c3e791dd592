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

//! CD sector reads with format conversion
//!
//! The image stores each track either as cooked 2048-byte user data or as
//! raw 2352-byte sectors. The host asks for arbitrary contiguous parts of a
//! raw sector:
//!
//! ```text
//! Mode 1:  | sync 12 | header 4 |           user data 2048 | EDC/ECC 288 |
//! Mode 2:  | sync 12 | header 4 | subhdr 8 | user data 2048 | EDC/ECC 280 |
//! ```
//!
//! Raw sectors are sliced; cooked sectors get a synthesized sync pattern
//! and header with zero EDC/ECC when more than the user data is requested.
//! The formatted Q sub-channel (16 bytes) may be appended to every sector.

use crate::core::atapi::{AtapiCore, AtapiTransfer, CmdResult};
use crate::core::constants::asc;
use crate::core::error::{AtapiError, IdeError, Result};
use crate::core::image::ImageCallback;
use crate::core::phy::Phy;

use super::cue::{TrackDescriptor, TrackLayout, TrackMode};
use super::msf::{dec_to_bcd, Msf};

/// Raw sector size
pub const RAW_SECTOR: usize = 2352;

/// Size of the formatted Q sub-channel appended by READ CD
pub const Q_SUBCHANNEL_LEN: usize = 16;

const SYNC_PATTERN: [u8; 12] = [
    0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00,
];

/// READ CD main channel selection bits (CDB byte 9)
pub mod main_channel {
    pub const SYNC: u8 = 0x80;
    pub const SUBHEADER: u8 = 0x40;
    pub const HEADER: u8 = 0x20;
    pub const USER_DATA: u8 = 0x10;
    pub const EDC_ECC: u8 = 0x08;
    pub const C2_ERRORS: u8 = 0x06;
}

/// READ CD sub-channel selection (CDB byte 10)
pub mod sub_channel {
    pub const NONE: u8 = 0;
    pub const RAW: u8 = 1;
    pub const Q: u8 = 2;
    pub const RW: u8 = 4;
}

/// What the host asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorRequest {
    /// READ 10/12: user data of data tracks
    UserData,
    /// READ CD / READ CD MSF
    ReadCd {
        /// Expected sector type, CDB byte 1 bits 2..4
        sector_type: u8,
        main_channel: u8,
        sub_channel: u8,
    },
}

/// Reject requests whose expected sector type does not match the track
///
/// Types: 0 any, 1 CD-DA, 2 Mode 1, 3 Mode 2 formless, 4/5 Mode 2 Form 1/2.
pub fn check_sector_type(sector_type: u8, mode: TrackMode) -> CmdResult {
    let matches = match sector_type {
        0 => true,
        1 => mode == TrackMode::Audio,
        2 => matches!(mode, TrackMode::Mode1_2048 | TrackMode::Mode1_2352),
        3..=5 => mode == TrackMode::Mode2_2352,
        _ => return Err(AtapiError::invalid_field()),
    };
    if matches {
        Ok(())
    } else {
        log::debug!("Sector type {} requested from {:?} track", sector_type, mode);
        Err(AtapiError::illegal_request(asc::ILLEGAL_MODE_FOR_THIS_TRACK))
    }
}

/// Byte range of the raw sector selected by the main channel bits
///
/// # Returns
///
/// `None` if the selected fields are not contiguous or include C2 data
fn raw_region(mode: TrackMode, flags: u8) -> Option<(usize, usize)> {
    if flags & main_channel::C2_ERRORS != 0 {
        return None;
    }
    if mode == TrackMode::Audio {
        return Some(if flags == 0 { (0, 0) } else { (0, RAW_SECTOR) });
    }

    let (subheader, user) = match mode {
        TrackMode::Mode2_2352 => ((16, 24), (24, 2072)),
        _ => ((16, 16), (16, 2064)),
    };
    let fields = [
        (main_channel::SYNC, (0, 12)),
        (main_channel::HEADER, (12, 16)),
        (main_channel::SUBHEADER, subheader),
        (main_channel::USER_DATA, user),
        (main_channel::EDC_ECC, (user.1, RAW_SECTOR)),
    ];

    let mut region: Option<(usize, usize)> = None;
    for (bit, (start, end)) in fields {
        if flags & bit == 0 || start == end {
            continue;
        }
        region = match region {
            None => Some((start, end)),
            Some((first, last)) if last == start => Some((first, end)),
            Some(_) => return None,
        };
    }
    Some(region.unwrap_or((0, 0)))
}

/// Sector conversion for one run of sectors inside a single track
#[derive(Debug, Clone)]
pub struct ReadFormat {
    /// Sector length in the image file
    pub sector_length_file: usize,
    /// Sector length sent to the host
    pub sector_length_out: usize,
    /// Offset of the copied bytes in the (possibly synthesized) raw sector
    pub data_skip: usize,
    pub data_length: usize,
    /// Build sync and header for cooked 2048-byte sectors
    pub add_fake_headers: bool,
    pub field_q_subchannel: bool,
    pub track: TrackDescriptor,
    pub start_lba: u32,
    pub sectors_done: u32,
}

impl ReadFormat {
    pub fn new(
        track: &TrackDescriptor,
        start_lba: u32,
        request: SectorRequest,
    ) -> std::result::Result<Self, AtapiError> {
        let (main, sub, sector_type) = match request {
            SectorRequest::UserData => {
                if track.is_audio() {
                    log::debug!("READ of audio track {}", track.number);
                    return Err(AtapiError::illegal_request(asc::ILLEGAL_MODE_FOR_THIS_TRACK));
                }
                (main_channel::USER_DATA, sub_channel::NONE, 0)
            }
            SectorRequest::ReadCd {
                sector_type,
                main_channel,
                sub_channel,
            } => (main_channel, sub_channel, sector_type),
        };
        check_sector_type(sector_type, track.mode)?;

        let field_q_subchannel = match sub {
            sub_channel::NONE => false,
            sub_channel::Q => true,
            sub_channel::RAW | sub_channel::RW => {
                log::debug!("Raw sub-channel data not available");
                return Err(AtapiError::invalid_field());
            }
            _ => return Err(AtapiError::invalid_field()),
        };

        let (start, end) = raw_region(track.mode, main).ok_or_else(|| {
            log::debug!("Unsupported main channel selection {:#04x}", main);
            AtapiError::invalid_field()
        })?;

        let cooked = track.sector_length != RAW_SECTOR;
        let user_only = (start, end) == (16, 2064);
        let (data_skip, add_fake_headers) = match (cooked, user_only) {
            (true, true) => (0, false),
            (true, false) => (start, end > start),
            (false, _) => (start, false),
        };

        let data_length = end - start;
        Ok(Self {
            sector_length_file: track.sector_length,
            sector_length_out: data_length
                + if field_q_subchannel { Q_SUBCHANNEL_LEN } else { 0 },
            data_skip,
            data_length,
            add_fake_headers,
            field_q_subchannel,
            track: *track,
            start_lba,
            sectors_done: 0,
        })
    }

    /// Sectors can be sent exactly as stored
    pub fn is_passthrough(&self) -> bool {
        !self.add_fake_headers
            && !self.field_q_subchannel
            && self.data_skip == 0
            && self.data_length == self.sector_length_file
    }

    /// Convert one stored sector at `lba` into `out`
    pub fn format_sector(&self, lba: u32, src: &[u8], out: &mut [u8]) {
        let data = &mut out[..self.data_length];
        if self.add_fake_headers {
            let mut raw = [0u8; RAW_SECTOR];
            raw[..12].copy_from_slice(&SYNC_PATTERN);
            raw[12..15].copy_from_slice(&Msf::from_lba(lba).to_bcd());
            raw[15] = 1;
            raw[16..16 + src.len()].copy_from_slice(src);
            data.copy_from_slice(&raw[self.data_skip..self.data_skip + self.data_length]);
        } else {
            data.copy_from_slice(&src[self.data_skip..self.data_skip + self.data_length]);
        }

        if self.field_q_subchannel {
            let q = &mut out[self.data_length..self.data_length + Q_SUBCHANNEL_LEN];
            q.copy_from_slice(&q_subchannel(&self.track, lba));
        }
    }
}

/// Formatted Q sub-channel of sector `lba` in `track`
pub fn q_subchannel(track: &TrackDescriptor, lba: u32) -> [u8; Q_SUBCHANNEL_LEN] {
    let mut q = [0u8; Q_SUBCHANNEL_LEN];
    q[0] = (track.mode.control() << 4) | 0x01;
    q[1] = dec_to_bcd(track.number);
    q[2] = if lba < track.start_lba { 0x00 } else { 0x01 };
    let relative = Msf::from_frames(lba.abs_diff(track.start_lba));
    q[3..6].copy_from_slice(&relative.to_bcd());
    q[7..10].copy_from_slice(&Msf::from_lba(lba).to_bcd());
    q
}

/// Converts image sectors and streams them to the host
struct CdSendCallback<'a> {
    xfer: &'a mut AtapiTransfer,
    phy: &'a mut dyn Phy,
    format: &'a mut ReadFormat,
    scratch: Vec<u8>,
}

impl ImageCallback for CdSendCallback<'_> {
    fn read_callback(&mut self, data: &[u8], blocksize: usize, num_blocks: usize) -> Result<usize> {
        let format = &mut *self.format;
        if format.is_passthrough() {
            self.xfer.send_data(self.phy, data, blocksize, num_blocks)?;
        } else {
            let out_len = format.sector_length_out;
            self.scratch.resize(out_len * num_blocks, 0);
            for (i, src) in data.chunks(blocksize).take(num_blocks).enumerate() {
                let lba = format.start_lba + format.sectors_done + i as u32;
                format.format_sector(lba, src, &mut self.scratch[i * out_len..(i + 1) * out_len]);
            }
            self.xfer
                .send_data(self.phy, &self.scratch, out_len, num_blocks)?;
        }
        format.sectors_done += num_blocks as u32;
        Ok(num_blocks)
    }

    fn write_callback(&mut self, _data: &mut [u8], _blocksize: usize, _num_blocks: usize) -> Result<usize> {
        Err(IdeError::ReadOnly("CD sectors cannot be written".to_string()))
    }

    fn poll(&mut self) {
        self.phy.platform_poll();
    }
}

/// Send `count` sectors starting at `lba`, track by track
///
/// The caller has already checked the range against the lead-out.
pub fn read_sectors(
    core: &mut AtapiCore,
    layout: &TrackLayout,
    phy: &mut dyn Phy,
    lba: u32,
    count: u32,
    request: SectorRequest,
) -> CmdResult {
    core.access_delay();

    let mut lba = lba;
    let mut remaining = count;
    while remaining > 0 {
        let track = layout
            .track_for_lba(lba)
            .ok_or_else(|| AtapiError::illegal_request(asc::LBA_OUT_OF_RANGE))?;
        let run = remaining.min(layout.track_end_lba(track).saturating_sub(lba)).max(1);
        let mut format = ReadFormat::new(track, lba, request)?;

        log::trace!(
            "CD read track {} LBA {} x{}: {} -> {} bytes",
            track.number,
            lba,
            run,
            format.sector_length_file,
            format.sector_length_out
        );

        if format.sector_length_out > 0 {
            let offset = layout.file_offset(track, lba);
            let blocksize = format.sector_length_file;
            let AtapiCore { image, xfer, ejected, .. } = &mut *core;
            if *ejected {
                return Err(AtapiError::not_ready());
            }
            let image = image.as_deref_mut().ok_or_else(AtapiError::not_ready)?;
            let mut callback = CdSendCallback {
                xfer,
                phy: &mut *phy,
                format: &mut format,
                scratch: Vec::new(),
            };
            image.read(offset, blocksize, run as usize, &mut callback)?;
        }

        lba += run;
        remaining -= run;
    }
    Ok(())
}
