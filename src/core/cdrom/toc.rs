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

//! Disc structure responses
//!
//! READ TOC, READ DISC INFORMATION, READ TRACK INFORMATION, READ HEADER,
//! READ SUB-CHANNEL and MECHANISM STATUS data built from the [`TrackLayout`].
//! Every builder returns the full response; the caller truncates it to the
//! allocation length.

use crate::core::constants::asc;
use crate::core::error::AtapiError;
use crate::core::utils::{parse_be32, write_be16, write_be32};

use super::cue::{TrackDescriptor, TrackLayout, TrackMode};
use super::msf::{dec_to_bcd, Msf};

/// Track number of the lead-out area
pub const LEAD_OUT_TRACK: u8 = 0xAA;

/// Audio status of READ SUB-CHANNEL: no current audio status to return
const AUDIO_STATUS_NONE: u8 = 0x15;

/// TOC response format selected by a READ TOC command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TocFormat {
    /// Track descriptors starting at a track, plus the lead-out
    Simple { msf: bool, track: u8 },
    /// First track of the last complete session
    SessionInfo { msf: bool },
    /// Raw Q sub-channel lead-in entries
    Full { bcd: bool },
}

impl TocFormat {
    /// Decode the READ TOC CDB
    ///
    /// A zero format field falls back to the legacy format bits in the
    /// control byte (`cmd[9] >> 6`). The vendor flag `cmd[9] & 0x40`
    /// requests BCD times in the full TOC.
    pub fn from_cdb(cmd: &[u8; 12]) -> Result<Self, AtapiError> {
        let msf = cmd[1] & 0x02 != 0;
        let mut format = cmd[2] & 0x0F;
        if format == 0 {
            format = cmd[9] >> 6;
        }
        match format {
            0 => Ok(TocFormat::Simple { msf, track: cmd[6] }),
            1 => Ok(TocFormat::SessionInfo { msf }),
            2 => Ok(TocFormat::Full {
                bcd: cmd[2] & 0x0F == 2 && cmd[9] & 0x40 != 0,
            }),
            other => {
                log::debug!("READ TOC format {} not supported", other);
                Err(AtapiError::invalid_field())
            }
        }
    }
}

/// Write an address as LBA or as absolute MSF `[0, M, S, F]`
fn write_address(out: &mut [u8], lba: u32, msf: bool) {
    if msf {
        out[0] = 0;
        out[1..4].copy_from_slice(&Msf::from_lba(lba).to_bytes());
    } else {
        write_be32(out, lba);
    }
}

fn toc_descriptor(adr_control: u8, number: u8, lba: u32, msf: bool) -> [u8; 8] {
    let mut desc = [0u8; 8];
    desc[1] = adr_control;
    desc[2] = number;
    write_address(&mut desc[4..], lba, msf);
    desc
}

fn first_and_last(layout: &TrackLayout) -> Result<(&TrackDescriptor, &TrackDescriptor), AtapiError> {
    match (layout.first_track(), layout.last_track()) {
        (Some(first), Some(last)) => Ok((first, last)),
        _ => Err(AtapiError::not_ready()),
    }
}

/// READ TOC response
pub fn read_toc(layout: &TrackLayout, format: TocFormat) -> Result<Vec<u8>, AtapiError> {
    let (first, last) = first_and_last(layout)?;
    let mut buf = vec![0u8; 4];

    match format {
        TocFormat::Simple { msf, track } => {
            let start = track.max(1);
            if start > last.number && start != LEAD_OUT_TRACK {
                log::debug!("READ TOC start track {} beyond last track {}", start, last.number);
                return Err(AtapiError::invalid_field());
            }
            buf[2] = first.number;
            buf[3] = last.number;
            for t in layout.tracks().iter().filter(|t| t.number >= start) {
                buf.extend_from_slice(&toc_descriptor(t.adr_control(), t.number, t.start_lba, msf));
            }
            buf.extend_from_slice(&toc_descriptor(
                last.adr_control(),
                LEAD_OUT_TRACK,
                layout.lead_out_lba(),
                msf,
            ));
        }
        TocFormat::SessionInfo { msf } => {
            buf[2] = 1;
            buf[3] = 1;
            buf.extend_from_slice(&toc_descriptor(first.adr_control(), first.number, first.start_lba, msf));
        }
        TocFormat::Full { bcd } => {
            buf[2] = 1;
            buf[3] = 1;
            let number = |n: u8| if bcd { dec_to_bcd(n) } else { n };
            let time = |msf: Msf| if bcd { msf.to_bcd() } else { msf.to_bytes() };

            let mut entry = |adr_control: u8, point: u8, p: [u8; 3]| {
                buf.extend_from_slice(&[1, adr_control, 0, point, 0, 0, 0, 0, p[0], p[1], p[2]]);
            };
            entry(first.adr_control(), 0xA0, [number(first.number), layout.disc_type(), 0]);
            entry(last.adr_control(), 0xA1, [number(last.number), 0, 0]);
            entry(last.adr_control(), 0xA2, time(Msf::from_lba(layout.lead_out_lba())));
            for t in layout.tracks() {
                entry(t.adr_control(), number(t.number), time(Msf::from_lba(t.start_lba)));
            }
        }
    }

    let data_len = (buf.len() - 2) as u16;
    write_be16(&mut buf[0..], data_len);
    Ok(buf)
}

/// READ DISC INFORMATION: a finalized single-session disc
pub fn read_disc_information(layout: &TrackLayout) -> Result<Vec<u8>, AtapiError> {
    let (first, last) = first_and_last(layout)?;
    let mut buf = vec![0u8; 34];
    write_be16(&mut buf[0..], 32);
    // Complete disc, complete last session, not erasable
    buf[2] = 0x0E;
    buf[3] = first.number;
    buf[4] = 1;
    buf[5] = first.number;
    buf[6] = last.number;
    buf[8] = layout.disc_type();
    // Lead-in start and last possible lead-out do not apply to pressed media
    buf[16..24].fill(0xFF);
    Ok(buf)
}

/// READ TRACK INFORMATION for LBA (0), track (1) or session (2) addressing
pub fn read_track_information(layout: &TrackLayout, cmd: &[u8; 12]) -> Result<Vec<u8>, AtapiError> {
    first_and_last(layout)?;
    let address = parse_be32(&cmd[2..]);
    let track = match cmd[1] & 0x03 {
        0 => layout
            .track_for_lba(address)
            .ok_or_else(|| AtapiError::illegal_request(asc::LBA_OUT_OF_RANGE))?,
        1 => u8::try_from(address)
            .ok()
            .and_then(|n| layout.track(n))
            .ok_or_else(AtapiError::invalid_field)?,
        2 if address == 1 => layout.first_track().ok_or_else(AtapiError::invalid_field)?,
        _ => return Err(AtapiError::invalid_field()),
    };

    let length = layout.track_length(track);
    let mut buf = vec![0u8; 36];
    let data_len = (buf.len() - 2) as u16;
    write_be16(&mut buf[0..], data_len);
    buf[2] = track.number;
    buf[3] = 1;
    buf[5] = track.mode.control();
    buf[6] = match track.mode {
        TrackMode::Audio => 0x0F,
        TrackMode::Mode1_2048 | TrackMode::Mode1_2352 => 0x01,
        TrackMode::Mode2_2352 => 0x02,
    };
    write_be32(&mut buf[8..], track.start_lba);
    write_be32(&mut buf[24..], length);
    write_be32(&mut buf[28..], track.start_lba + length.saturating_sub(1));
    Ok(buf)
}

/// READ HEADER: data mode and address of a data sector
pub fn read_header(layout: &TrackLayout, cmd: &[u8; 12]) -> Result<Vec<u8>, AtapiError> {
    let lba = parse_be32(&cmd[2..]);
    let track = layout
        .track_for_lba(lba)
        .ok_or_else(|| AtapiError::illegal_request(asc::LBA_OUT_OF_RANGE))?;

    let mut buf = vec![0u8; 8];
    buf[0] = match track.mode {
        TrackMode::Audio => {
            return Err(AtapiError::illegal_request(asc::ILLEGAL_MODE_FOR_THIS_TRACK))
        }
        TrackMode::Mode1_2048 | TrackMode::Mode1_2352 => 1,
        TrackMode::Mode2_2352 => 2,
    };
    write_address(&mut buf[4..], lba, cmd[1] & 0x02 != 0);
    Ok(buf)
}

/// READ SUB-CHANNEL
///
/// Audio playback is not emulated, so the current position is the start of
/// the requested track (or track 1) and the audio status is always "no
/// status". UPC and ISRC are reported as not available.
pub fn read_sub_channel(layout: &TrackLayout, cmd: &[u8; 12]) -> Result<Vec<u8>, AtapiError> {
    let msf = cmd[1] & 0x02 != 0;
    let subq = cmd[2] & 0x40 != 0;
    let format = cmd[3];

    let mut buf = vec![0u8, AUDIO_STATUS_NONE, 0, 0];
    if subq {
        let (first, _) = first_and_last(layout)?;
        let track = layout.track(cmd[6]).unwrap_or(first);
        match format {
            1 => {
                let mut data = [0u8; 12];
                data[0] = 1;
                data[1] = track.adr_control();
                data[2] = track.number;
                data[3] = 1;
                write_address(&mut data[4..8], track.start_lba, msf);
                // Relative address stays 0, the start of the track
                buf.extend_from_slice(&data);
            }
            2 => {
                let mut data = [0u8; 20];
                data[0] = 2;
                buf.extend_from_slice(&data);
            }
            3 => {
                let mut data = [0u8; 20];
                data[0] = 3;
                data[1] = track.adr_control();
                data[2] = track.number;
                buf.extend_from_slice(&data);
            }
            other => {
                log::debug!("READ SUB-CHANNEL format {} not supported", other);
                return Err(AtapiError::invalid_field());
            }
        }
    }

    let data_len = (buf.len() - 4) as u16;
    write_be16(&mut buf[2..], data_len);
    Ok(buf)
}

/// MECHANISM STATUS header for a drive without changer slots
pub fn mechanism_status(medium_present: bool) -> Vec<u8> {
    let mut buf = vec![0u8; 8];
    if !medium_present {
        // Door open
        buf[1] = 0x10;
    }
    buf
}
