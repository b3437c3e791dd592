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

//! Packet commands shared by every ATAPI device
//!
//! Handlers are generic over [`AtapiDevice`] so the per-device hooks (mode
//! pages, INQUIRY data, capacity, read path) are resolved statically.
//! Handlers only produce data and errors; completion is reported by the
//! caller through [`AtapiCore::finish`].

use crate::core::constants::{
    asc, atapi_cmd, atapi_command_name, inquiry, media_event, mode_page, sense_key, start_stop,
};
use crate::core::error::{AtapiError, IdeError, Result};
use crate::core::image::ImageCallback;
use crate::core::phy::Phy;
use crate::core::utils::{parse_be16, parse_be32, write_be16, write_be32, write_scsi_ascii, HexBytes};

use super::{split_block, AtapiCore, AtapiDevice, AtapiTransfer, CmdResult};

/// Execute a shared packet command
pub fn dispatch<D: AtapiDevice + ?Sized>(dev: &mut D, phy: &mut dyn Phy, cmd: &[u8; 12]) -> CmdResult {
    match cmd[0] {
        atapi_cmd::TEST_UNIT_READY => Ok(()),
        atapi_cmd::INQUIRY => inquiry(dev, phy, cmd),
        atapi_cmd::MODE_SENSE6 | atapi_cmd::MODE_SENSE10 => mode_sense(dev, phy, cmd),
        atapi_cmd::MODE_SELECT6 | atapi_cmd::MODE_SELECT10 => mode_select(dev.core_mut(), phy, cmd),
        atapi_cmd::REQUEST_SENSE => request_sense(dev.core_mut(), phy, cmd),
        atapi_cmd::GET_EVENT_STATUS_NOTIFICATION => {
            get_event_status_notification(dev.core_mut(), phy, cmd)
        }
        atapi_cmd::READ_CAPACITY => read_capacity(dev, phy),
        atapi_cmd::READ6 | atapi_cmd::READ10 | atapi_cmd::READ12 => {
            let (lba, len) = parse_rw_cdb(cmd);
            read(dev, phy, lba, len)
        }
        atapi_cmd::WRITE6 | atapi_cmd::WRITE10 | atapi_cmd::WRITE12 => {
            let (lba, len) = parse_rw_cdb(cmd);
            write(dev, phy, lba, len)
        }
        atapi_cmd::START_STOP_UNIT => start_stop_unit(dev.core_mut(), cmd),
        atapi_cmd::PREVENT_ALLOW_MEDIUM_REMOVAL => {
            let core = dev.core_mut();
            core.prevent_removal = cmd[4] & 1 != 0;
            log::debug!("Medium removal {}", if core.prevent_removal { "prevented" } else { "allowed" });
            Ok(())
        }
        atapi_cmd::GET_CONFIGURATION => get_configuration(dev.core_mut(), phy, cmd),
        atapi_cmd::VERIFY10 | atapi_cmd::SYNCHRONIZE_CACHE | atapi_cmd::SEEK10 => {
            require_medium(dev.core())
        }
        other => {
            log::warn!(
                "Unsupported ATAPI command {:#04x} ({})",
                other,
                atapi_command_name(other)
            );
            Err(AtapiError::illegal_request(asc::INVALID_COMMAND_OPERATION_CODE))
        }
    }
}

pub fn require_medium(core: &AtapiCore) -> CmdResult {
    if core.medium_present() {
        Ok(())
    } else {
        Err(AtapiError::not_ready())
    }
}

/// Decode LBA and transfer length of READ/WRITE 6, 10 and 12
pub fn parse_rw_cdb(cmd: &[u8; 12]) -> (u64, u32) {
    match cmd[0] {
        atapi_cmd::READ6 | atapi_cmd::WRITE6 => {
            let lba = (((cmd[1] & 0x1F) as u64) << 16) | ((cmd[2] as u64) << 8) | cmd[3] as u64;
            let len = if cmd[4] == 0 { 256 } else { cmd[4] as u32 };
            (lba, len)
        }
        atapi_cmd::READ12 | atapi_cmd::WRITE12 => {
            (parse_be32(&cmd[2..]) as u64, parse_be32(&cmd[6..]))
        }
        _ => (parse_be32(&cmd[2..]) as u64, parse_be16(&cmd[7..]) as u32),
    }
}

/// 36-byte standard INQUIRY data built from [`super::DeviceInfo`]
pub fn standard_inquiry(core: &AtapiCore) -> Vec<u8> {
    let info = &core.devinfo;
    let mut buf = vec![0u8; 36];
    buf[inquiry::OFFSET_TYPE] = info.devtype;
    buf[inquiry::OFFSET_REMOVABLE] = if info.removable { 0x80 } else { 0 };
    buf[inquiry::OFFSET_ATAPI_VERSION] = 0x21;
    buf[inquiry::OFFSET_EXTRA_LENGTH] = (buf.len() - 5) as u8;
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
    buf
}

pub fn inquiry<D: AtapiDevice + ?Sized>(dev: &mut D, phy: &mut dyn Phy, cmd: &[u8; 12]) -> CmdResult {
    if cmd[1] & 0x01 != 0 {
        // Vital product data pages are not implemented
        return Err(AtapiError::invalid_field());
    }
    let data = dev.inquiry_data();
    dev.core_mut().send_response(phy, &data, cmd[4] as usize)
}

/// MODE SENSE (6) and (10)
///
/// Page 0x3F returns every supported page in ascending order with page 0
/// last. The parameter header is followed directly by the pages; no block
/// descriptors are returned.
pub fn mode_sense<D: AtapiDevice + ?Sized>(dev: &mut D, phy: &mut dyn Phy, cmd: &[u8; 12]) -> CmdResult {
    let ten = cmd[0] == atapi_cmd::MODE_SENSE10;
    let page_ctrl = cmd[2] >> 6;
    let page = cmd[2] & 0x3F;
    let (header_len, alloc_len) = if ten {
        (8, parse_be16(&cmd[7..]) as usize)
    } else {
        (4, cmd[4] as usize)
    };

    let mut resp = vec![0u8; header_len];
    if page == mode_page::ALL {
        for idx in 0x01..mode_page::ALL {
            dev.mode_page(page_ctrl, idx, &mut resp);
        }
        dev.mode_page(page_ctrl, mode_page::VENDOR_ZERO, &mut resp);
    } else if !dev.mode_page(page_ctrl, page, &mut resp) {
        log::debug!("Unsupported mode page {:#04x}", page);
        return Err(AtapiError::invalid_field());
    }

    let info = &dev.core().devinfo;
    let write_protect = if info.writable { 0 } else { 0x80 };
    if ten {
        let data_len = (resp.len() - 2) as u16;
        write_be16(&mut resp[0..], data_len);
        resp[2] = info.medium_type;
        resp[3] = write_protect;
    } else {
        resp[0] = (resp.len() - 1).min(0xFF) as u8;
        resp[1] = info.medium_type;
        resp[2] = write_protect;
    }

    dev.core_mut().send_response(phy, &resp, alloc_len)
}

/// Read-write error recovery page (0x01) of disk-like devices
pub fn error_recovery_page(page_ctrl: u8, out: &mut Vec<u8>) {
    let start = out.len();
    out.extend_from_slice(&[mode_page::ERROR_RECOVERY, 0x06, 0xC8, 0x16, 0, 0, 0, 0]);
    if page_ctrl == 1 {
        out[start + 2..].fill(0);
    }
}

/// Caching page (0x08), write cache disabled
pub fn caching_page(page_ctrl: u8, out: &mut Vec<u8>) {
    let start = out.len();
    out.extend_from_slice(&[
        mode_page::CACHING,
        0x0A,
        0x00,
        0x00,
        0xFF,
        0xFF,
        0x00,
        0x00,
        0xFF,
        0xFF,
        0xFF,
        0xFF,
    ]);
    if page_ctrl == 1 {
        out[start + 2..].fill(0);
    }
}

/// MODE SELECT (6) and (10)
///
/// The parameter list is received and logged; no page is changeable.
pub fn mode_select(core: &mut AtapiCore, phy: &mut dyn Phy, cmd: &[u8; 12]) -> CmdResult {
    let len = if cmd[0] == atapi_cmd::MODE_SELECT10 {
        parse_be16(&cmd[7..]) as usize
    } else {
        cmd[4] as usize
    };
    let params = core.recv_parameters(phy, len)?;
    log::debug!("MODE SELECT parameters: {}", HexBytes(&params));
    Ok(())
}

/// Fixed format sense data
pub fn sense_data(key: u8, sense_asc: u16) -> [u8; 18] {
    let mut resp = [0u8; 18];
    resp[0] = 0x80 | if key != sense_key::NO_SENSE { 0x70 } else { 0 };
    resp[2] = key;
    resp[7] = (resp.len() - 8) as u8;
    write_be16(&mut resp[12..], sense_asc);
    resp
}

pub fn request_sense(core: &mut AtapiCore, phy: &mut dyn Phy, cmd: &[u8; 12]) -> CmdResult {
    let resp = sense_data(core.sense_key, core.sense_asc);
    core.send_response(phy, &resp, cmd[4] as usize)
}

/// GET EVENT STATUS NOTIFICATION, polled operation only
///
/// A pending media event is reported once and then consumed.
pub fn get_event_status_notification(
    core: &mut AtapiCore,
    phy: &mut dyn Phy,
    cmd: &[u8; 12],
) -> CmdResult {
    if cmd[1] & 1 == 0 {
        // Asynchronous notification is not supported
        return Err(AtapiError::invalid_field());
    }
    let alloc_len = parse_be16(&cmd[7..]) as usize;

    let event = core.devinfo.media_status_events;
    if event != media_event::NO_CHANGE {
        let buf = [
            0,
            6,    // event data length
            0x04, // media class
            0x04, // supported classes
            event,
            if core.medium_present() { 0x02 } else { 0x00 },
            0,
            0,
        ];
        core.send_response(phy, &buf, alloc_len)?;
        core.devinfo.media_status_events = media_event::NO_CHANGE;
    } else {
        let buf = [0, 2, 0x00, 0x04];
        core.send_response(phy, &buf, alloc_len)?;
    }
    Ok(())
}

/// READ CAPACITY: last LBA and block length
pub fn read_capacity<D: AtapiDevice + ?Sized>(dev: &mut D, phy: &mut dyn Phy) -> CmdResult {
    require_medium(dev.core())?;
    let last_lba = dev.capacity_lba().saturating_sub(1).min(u32::MAX as u64) as u32;
    let mut buf = [0u8; 8];
    write_be32(&mut buf[0..], last_lba);
    write_be32(&mut buf[4..], dev.core().devinfo.bytes_per_sector);
    dev.core_mut().send_response(phy, &buf, buf.len())
}

/// Range-check and execute a read request
pub fn read<D: AtapiDevice + ?Sized>(dev: &mut D, phy: &mut dyn Phy, lba: u64, len: u32) -> CmdResult {
    require_medium(dev.core())?;
    check_range(dev.capacity_lba(), lba, len)?;
    if len == 0 {
        return Ok(());
    }
    log::debug!("Read {} sectors at LBA {}", len, lba);
    dev.read_blocks(phy, lba, len)
}

/// Range-check and execute a write request
pub fn write<D: AtapiDevice + ?Sized>(dev: &mut D, phy: &mut dyn Phy, lba: u64, len: u32) -> CmdResult {
    require_medium(dev.core())?;
    let core = dev.core();
    let image_writable = core.image.as_ref().is_some_and(|img| img.writable());
    if !core.devinfo.writable || !image_writable {
        return Err(AtapiError::sense(sense_key::ABORTED_COMMAND, asc::WRITE_PROTECTED));
    }
    check_range(dev.capacity_lba(), lba, len)?;
    if len == 0 {
        return Ok(());
    }
    log::debug!("Write {} sectors at LBA {}", len, lba);
    dev.write_blocks(phy, lba, len)
}

fn check_range(capacity: u64, lba: u64, len: u32) -> CmdResult {
    if lba + len as u64 > capacity {
        log::debug!(
            "Access out of range: LBA {} + {} exceeds {} sectors",
            lba,
            len,
            capacity
        );
        return Err(AtapiError::illegal_request(asc::LBA_OUT_OF_RANGE));
    }
    Ok(())
}

/// START STOP UNIT with the LoEj bit ejects or reloads the medium
pub fn start_stop_unit(core: &mut AtapiCore, cmd: &[u8; 12]) -> CmdResult {
    let flags = cmd[4];
    if flags & start_stop::POWER_CONDITION_MASK != 0 || flags & start_stop::LOEJ == 0 {
        return Ok(());
    }

    if flags & start_stop::START == 0 {
        core.eject()
    } else {
        if core.settings.reinsert_media_after_eject {
            core.reinsert();
        }
        Ok(())
    }
}

/// GET CONFIGURATION: profile list and core feature
pub fn get_configuration(core: &mut AtapiCore, phy: &mut dyn Phy, cmd: &[u8; 12]) -> CmdResult {
    let rt = cmd[1] & 0x03;
    let start = parse_be16(&cmd[2..]);
    let alloc_len = parse_be16(&cmd[7..]) as usize;
    let info = &core.devinfo;

    let wanted = |feature: u16| match rt {
        2 => feature == start,
        _ => feature >= start,
    };

    let mut buf = vec![0u8; 8];
    let current = if core.medium_present() {
        info.current_profile
    } else {
        0
    };
    write_be16(&mut buf[6..], current);

    if wanted(0x0000) {
        buf.extend_from_slice(&[0x00, 0x00, 0x03, (info.profiles.len() * 4) as u8]);
        for &profile in &info.profiles {
            let mut desc = [0u8; 4];
            write_be16(&mut desc, profile);
            desc[2] = u8::from(profile == current);
            buf.extend_from_slice(&desc);
        }
    }
    if wanted(0x0001) {
        // Core feature, ATAPI physical interface
        buf.extend_from_slice(&[0x00, 0x01, 0x0B, 0x08, 0x00, 0x00, 0x00, 0x02, 0x01, 0, 0, 0]);
    }

    let data_len = (buf.len() - 4) as u32;
    write_be32(&mut buf[0..], data_len);
    core.send_response(phy, &buf, alloc_len)
}

/// Streams image blocks to the host as they arrive
pub struct SendCallback<'a> {
    pub xfer: &'a mut AtapiTransfer,
    pub phy: &'a mut dyn Phy,
}

impl ImageCallback for SendCallback<'_> {
    fn read_callback(&mut self, data: &[u8], blocksize: usize, num_blocks: usize) -> Result<usize> {
        self.xfer.send_data(self.phy, data, blocksize, num_blocks)?;
        Ok(num_blocks)
    }

    fn write_callback(&mut self, _data: &mut [u8], _blocksize: usize, _num_blocks: usize) -> Result<usize> {
        Err(IdeError::ReadOnly("send callback cannot receive".to_string()))
    }

    fn poll(&mut self) {
        self.phy.platform_poll();
    }
}

/// Fills image buffer space with blocks received from the host
pub struct RecvCallback<'a> {
    pub xfer: &'a mut AtapiTransfer,
    pub phy: &'a mut dyn Phy,
    /// Sub-blocks still expected in this command
    pub remaining: usize,
}

impl ImageCallback for RecvCallback<'_> {
    fn read_callback(&mut self, _data: &[u8], _blocksize: usize, _num_blocks: usize) -> Result<usize> {
        Err(IdeError::ReadOnly("receive callback cannot send".to_string()))
    }

    fn write_callback(&mut self, data: &mut [u8], blocksize: usize, num_blocks: usize) -> Result<usize> {
        let (sub, _) = split_block(blocksize, self.xfer.block_limit())?;
        for chunk in data[..blocksize * num_blocks].chunks_mut(sub) {
            self.remaining = self.remaining.saturating_sub(1);
            self.xfer.recv_block(self.phy, chunk, self.remaining == 0)?;
        }
        Ok(num_blocks)
    }

    fn poll(&mut self) {
        self.phy.platform_poll();
    }
}

/// Read `count` sectors of the current medium and send them to the host
pub fn stream_read(core: &mut AtapiCore, phy: &mut dyn Phy, lba: u64, count: u32) -> CmdResult {
    core.access_delay();
    let bps = core.devinfo.bytes_per_sector as usize;
    if core.ejected {
        return Err(AtapiError::not_ready());
    }
    let AtapiCore { image, xfer, .. } = core;
    let image = image.as_deref_mut().ok_or_else(AtapiError::not_ready)?;
    let mut callback = SendCallback { xfer, phy };
    image.read(lba * bps as u64, bps, count as usize, &mut callback)?;
    Ok(())
}

/// Receive `count` sectors from the host and write them to the medium
pub fn stream_write(core: &mut AtapiCore, phy: &mut dyn Phy, lba: u64, count: u32) -> CmdResult {
    core.access_delay();
    let bps = core.devinfo.bytes_per_sector as usize;
    if core.ejected {
        return Err(AtapiError::not_ready());
    }
    let (_, parts) = split_block(bps, core.xfer.block_limit()).map_err(AtapiError::from)?;
    let AtapiCore { image, xfer, .. } = core;
    let image = image.as_deref_mut().ok_or_else(AtapiError::not_ready)?;
    let mut callback = RecvCallback {
        xfer,
        phy,
        remaining: count as usize * parts,
    };
    let result = image.write(lba * bps as u64, bps, count as usize, &mut callback);
    let RecvCallback { xfer, phy, .. } = callback;
    xfer.recv_finish(phy);
    result.map_err(|err: IdeError| {
        log::warn!("Write failed: {}", err);
        AtapiError::from(err)
    })
}
