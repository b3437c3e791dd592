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

//! ATAPI packet device engine
//!
//! Shared implementation of the packet interface used by the CD-ROM,
//! removable disk and ZIP drive emulations. A command arrives as the ATA
//! PACKET command followed by a 12-byte command descriptor block (CDB):
//!
//! 1. PACKET: the byte count limit is taken from the cylinder registers and
//!    the device requests the CDB (interrupt reason `IS_CMD`).
//! 2. The CDB is decoded. Device specific opcodes are tried first through
//!    [`AtapiDevice::packet_command`], then the shared set in [`commands`].
//! 3. Every command ends in exactly one of [`AtapiCore::cmd_ok`] or
//!    [`AtapiCore::cmd_error`], which set the status and interrupt reason
//!    and assert INTRQ.
//!
//! # Sense model
//!
//! Errors are reported as `(sense_key, asc)` pairs. The error register gets
//! `ABORT | sense_key << 4`; the full sense data is returned by the next
//! REQUEST SENSE. A pending unit attention (media change) fails the next
//! command other than INQUIRY, REQUEST SENSE and GET EVENT STATUS
//! NOTIFICATION once.

use std::time::Duration;

use crate::core::config::{DeviceConfig, IdeConfig};
use crate::core::constants::{
    asc, atapi_cmd, atapi_command_name, device_reg, diag, ide_cmd, identify, media_event,
    medium_type, sense_key, AtaError, InterruptReason, Status,
};
use crate::core::error::{AtapiError, TransferError};
use crate::core::image::Image;
use crate::core::phy::{apply_set_features, Phy, PhyCapabilities, PhyEvent, Registers};
use crate::core::utils::{
    copy_id_string, finalize_identify, format_drive_info_field, identify_to_bytes, HexBytes,
};

pub mod commands;
mod transfer;
#[cfg(test)]
pub(crate) mod tests;

pub use transfer::{split_block, AtapiTransfer, DataState};

/// Result of one packet command
pub type CmdResult = std::result::Result<(), AtapiError>;

/// Identity and media properties of a packet device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Peripheral device type (5 = CD-ROM, 0 = direct access)
    pub devtype: u8,
    pub removable: bool,
    pub writable: bool,
    pub bytes_per_sector: u32,

    /// Pending GET EVENT STATUS NOTIFICATION media event, 0 when none
    pub media_status_events: u8,

    /// Medium type reported in the mode parameter header
    pub medium_type: u8,

    /// INQUIRY strings
    pub vendor: String,
    pub product: String,
    pub revision: String,

    /// IDENTIFY PACKET DEVICE strings
    pub ata_model: String,
    pub ata_serial: String,
    pub ata_revision: String,

    /// MMC profiles listed by GET CONFIGURATION
    pub profiles: Vec<u16>,
    pub current_profile: u16,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            devtype: 0,
            removable: true,
            writable: false,
            bytes_per_sector: 2048,
            media_status_events: media_event::NO_CHANGE,
            medium_type: medium_type::NONE,
            vendor: "ZULUIDE".to_string(),
            product: "ATAPI DEVICE".to_string(),
            revision: "1.0".to_string(),
            ata_model: "ZuluIDE ATAPI".to_string(),
            ata_serial: "123456789".to_string(),
            ata_revision: "1.0".to_string(),
            profiles: Vec::new(),
            current_profile: 0,
        }
    }
}

impl DeviceInfo {
    pub fn set_inquiry_strings(&mut self, vendor: &str, product: &str, revision: &str) {
        self.vendor = format_drive_info_field(vendor, 8);
        self.product = format_drive_info_field(product, 16);
        self.revision = format_drive_info_field(revision, 4);
    }

    pub fn set_ident_strings(&mut self, model: &str, serial: &str, revision: &str) {
        self.ata_model = format_drive_info_field(model, identify::MODEL_NUMBER_WORDS * 2);
        self.ata_serial = format_drive_info_field(serial, identify::SERIAL_NUMBER_WORDS * 2);
        self.ata_revision = format_drive_info_field(revision, identify::FIRMWARE_REV_WORDS * 2);
    }

    /// Apply identity overrides from the configuration file
    pub fn apply_overrides(&mut self, device: &DeviceConfig) {
        let vendor = device.vendor.clone().unwrap_or_else(|| self.vendor.clone());
        let product = device.product.clone().unwrap_or_else(|| self.product.clone());
        let revision = device.revision.clone().unwrap_or_else(|| self.revision.clone());
        self.set_inquiry_strings(&vendor, &product, &revision);

        let model = device.model.clone().unwrap_or_else(|| self.ata_model.clone());
        let serial = device.serial.clone().unwrap_or_else(|| self.ata_serial.clone());
        let firmware = device
            .firmware
            .clone()
            .unwrap_or_else(|| self.ata_revision.clone());
        self.set_ident_strings(&model, &serial, &firmware);
    }
}

/// Per-device behaviour switches taken from the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtapiSettings {
    /// Delay before each media access
    pub access_delay: Duration,
    pub enable_dev1_zeros: bool,
    /// Report DRQ with interrupt in IDENTIFY word 0
    pub atapi_intrq: bool,
    pub reinsert_media_after_eject: bool,
    pub reinsert_media_on_inquiry: bool,
}

impl Default for AtapiSettings {
    fn default() -> Self {
        Self {
            access_delay: Duration::ZERO,
            enable_dev1_zeros: false,
            atapi_intrq: false,
            reinsert_media_after_eject: true,
            reinsert_media_on_inquiry: true,
        }
    }
}

impl AtapiSettings {
    pub fn from_config(ide: &IdeConfig, device: &DeviceConfig) -> Self {
        Self {
            access_delay: Duration::from_millis(ide.access_delay_ms),
            enable_dev1_zeros: ide.enable_dev1_zeros,
            atapi_intrq: ide.atapi_intrq,
            reinsert_media_after_eject: device.reinsert_media_after_eject,
            reinsert_media_on_inquiry: device.reinsert_media_on_inquiry,
        }
    }
}

/// State shared by every packet device
#[derive(Debug)]
pub struct AtapiCore {
    pub devinfo: DeviceInfo,
    pub xfer: AtapiTransfer,
    pub sense_key: u8,
    pub sense_asc: u16,
    pub unit_attention: bool,

    /// Host locked the medium with PREVENT ALLOW MEDIUM REMOVAL
    pub prevent_removal: bool,

    /// Medium ejected by the host, the image stays bound for a reload
    pub ejected: bool,

    pub image: Option<Box<dyn Image>>,
    pub dev_index: usize,
    pub settings: AtapiSettings,

    /// Medium type restored when an ejected image is reloaded
    loaded_medium_type: u8,
}

impl AtapiCore {
    /// Create the shared state for device `dev_index`
    ///
    /// Identity overrides from `device` are applied on top of `devinfo`.
    pub fn new(
        mut devinfo: DeviceInfo,
        dev_index: usize,
        ide: &IdeConfig,
        device: &DeviceConfig,
    ) -> Self {
        devinfo.apply_overrides(device);
        Self {
            devinfo,
            xfer: AtapiTransfer::new(
                Duration::from_millis(ide.transfer_timeout_ms),
                !ide.ignore_command_interrupt,
            ),
            sense_key: sense_key::NO_SENSE,
            sense_asc: asc::NO_ADDITIONAL_SENSE,
            unit_attention: false,
            prevent_removal: false,
            ejected: false,
            image: None,
            dev_index,
            settings: AtapiSettings::from_config(ide, device),
            loaded_medium_type: medium_type::NONE,
        }
    }

    pub fn medium_present(&self) -> bool {
        self.image.is_some() && !self.ejected
    }

    /// Size of the present medium in bytes, 0 when none
    pub fn image_capacity(&self) -> u64 {
        match &self.image {
            Some(image) if !self.ejected => image.capacity(),
            _ => 0,
        }
    }

    /// Image of the present medium
    pub fn image_mut(&mut self) -> Result<&mut (dyn Image + 'static), AtapiError> {
        if self.ejected {
            return Err(AtapiError::not_ready());
        }
        self.image.as_deref_mut().ok_or_else(AtapiError::not_ready)
    }

    /// Bind a new image, or none, and tell the host the medium changed
    pub fn load_image(&mut self, image: Option<Box<dyn Image>>, loaded_medium: u8) {
        self.ejected = false;
        self.unit_attention = true;
        match &image {
            Some(img) => {
                log::info!(
                    "Device {}: loaded {} ({} bytes)",
                    self.dev_index,
                    img.filename(),
                    img.capacity()
                );
                self.devinfo.media_status_events = media_event::NEW_MEDIA;
                self.devinfo.medium_type = loaded_medium;
            }
            None => {
                log::info!("Device {}: no medium", self.dev_index);
                self.devinfo.media_status_events = media_event::EJECT_REQUEST;
                self.devinfo.medium_type = medium_type::NONE;
            }
        }
        self.loaded_medium_type = loaded_medium;
        self.image = image;
    }

    /// Replace the medium type once the loaded contents are known
    pub fn set_loaded_medium_type(&mut self, medium: u8) {
        self.loaded_medium_type = medium;
        if self.medium_present() {
            self.devinfo.medium_type = medium;
        }
    }

    /// Eject the medium on host request
    pub fn eject(&mut self) -> Result<(), AtapiError> {
        if self.prevent_removal {
            let key = if self.medium_present() {
                sense_key::ILLEGAL_REQUEST
            } else {
                sense_key::NOT_READY
            };
            return Err(AtapiError::sense(key, asc::MEDIUM_REMOVAL_PREVENTED));
        }

        match &self.image {
            Some(image) if !self.ejected => {
                log::info!("Device {}: ejecting {}", self.dev_index, image.filename())
            }
            _ => log::info!("Device {}: eject requested, no medium", self.dev_index),
        }
        self.ejected = true;
        self.devinfo.media_status_events = media_event::MEDIA_REMOVAL;
        self.devinfo.medium_type = medium_type::NONE;
        Ok(())
    }

    /// Bring back an ejected image
    ///
    /// # Returns
    ///
    /// `true` if a medium was reinserted
    pub fn reinsert(&mut self) -> bool {
        if !self.ejected || self.image.is_none() {
            return false;
        }
        log::info!("Device {}: reinserting medium", self.dev_index);
        self.ejected = false;
        self.unit_attention = true;
        self.devinfo.media_status_events = media_event::NEW_MEDIA;
        self.devinfo.medium_type = self.loaded_medium_type;
        true
    }

    /// Sleep before a media access when configured to emulate seek time
    pub fn access_delay(&self) {
        if !self.settings.access_delay.is_zero() {
            std::thread::sleep(self.settings.access_delay);
        }
    }

    /// Forget transfer and sense state after a bus reset
    pub fn reset(&mut self, hard: bool) {
        self.xfer.reset(hard);
        self.sense_key = sense_key::NO_SENSE;
        self.sense_asc = asc::NO_ADDITIONAL_SENSE;
    }

    /// Load the packet device signature into the task file
    ///
    /// See ATA/ATAPI-6 section 9.12, "Signature and persistence".
    pub fn set_signature(&self, phy: &mut dyn Phy, error: u8, status: Status) {
        let mut regs = phy.get_regs();
        regs.device = if self.dev_index == 1 { device_reg::DEV } else { 0 };
        regs.error = error;
        regs.status = status.bits();
        regs.lba_low = 0x01;
        regs.lba_mid = 0x14;
        regs.lba_high = 0xEB;
        regs.sector_count = 0x01;
        phy.set_regs(&regs);
    }

    /// Complete a command successfully
    pub fn cmd_ok(&mut self, phy: &mut dyn Phy) {
        self.sense_key = sense_key::NO_SENSE;
        self.sense_asc = asc::NO_ADDITIONAL_SENSE;
        self.complete(phy, 0, Status::DEVRDY);
    }

    /// Complete a command with a sense error
    pub fn cmd_error(&mut self, phy: &mut dyn Phy, key: u8, sense_asc: u16) {
        log::debug!(
            "Device {}: reporting sense key {:#04x} ASC {:#06x}",
            self.dev_index,
            key,
            sense_asc
        );
        self.sense_key = key;
        self.sense_asc = sense_asc;
        self.complete(phy, AtaError::ABORT.bits() | (key << 4), Status::DEVRDY | Status::ERR);
    }

    fn complete(&mut self, phy: &mut dyn Phy, error: u8, status: Status) {
        let mut regs = phy.get_regs();
        regs.error = error;
        regs.status = status.bits();
        regs.sector_count = (InterruptReason::IS_CMD | InterruptReason::TO_HOST).bits();
        phy.set_regs(&regs);
        phy.assert_irq(status);
    }

    /// Report the outcome of a packet command to the host
    ///
    /// Waits for outstanding data to drain before reporting success. With
    /// `keep_sense` a successful completion leaves the sense data in place.
    pub fn finish(&mut self, phy: &mut dyn Phy, result: CmdResult, keep_sense: bool) {
        let result = result.and_then(|()| self.xfer.send_wait_finish(phy).map_err(Into::into));
        match result {
            Ok(()) if keep_sense => self.complete(phy, 0, Status::DEVRDY),
            Ok(()) => self.cmd_ok(phy),
            Err(AtapiError::Sense { key, asc }) => {
                if self.xfer.state != DataState::Idle {
                    self.xfer.abort(phy);
                }
                self.cmd_error(phy, key, asc);
            }
            Err(AtapiError::Interrupted) => {
                log::debug!("Device {}: command interrupted, no status", self.dev_index);
                self.xfer.abort(phy);
            }
        }
    }

    /// Send a response of at most `alloc_len` bytes as one block
    pub fn send_response(
        &mut self,
        phy: &mut dyn Phy,
        data: &[u8],
        alloc_len: usize,
    ) -> CmdResult {
        let len = data.len().min(alloc_len);
        if len == 0 {
            return Ok(());
        }
        log::trace!("ATAPI send {} bytes: {}", len, HexBytes(&data[..len]));
        self.xfer.send_data(phy, &data[..len], len, 1)?;
        Ok(())
    }

    /// Receive a parameter list of `len` bytes from the host
    pub fn recv_parameters(&mut self, phy: &mut dyn Phy, len: usize) -> Result<Vec<u8>, AtapiError> {
        let mut buf = vec![0u8; len];
        if len > 0 {
            self.xfer.recv_data(phy, &mut buf, len, 1)?;
        }
        Ok(buf)
    }

    /// IDENTIFY PACKET DEVICE data before the checksum is applied
    pub fn identify_packet_words(&self) -> [u16; 256] {
        let caps: &PhyCapabilities = self.xfer.capabilities();
        let info = &self.devinfo;
        let mut idf = [0u16; 256];

        idf[identify::GENERAL_CONFIGURATION] = 0x8000
            | ((info.devtype as u16) << 8)
            | (if info.removable { 0x80 } else { 0 })
            | (if self.settings.atapi_intrq { 0x20 } else { 0 });
        copy_id_string(
            &mut idf[identify::SERIAL_NUMBER..identify::SERIAL_NUMBER + identify::SERIAL_NUMBER_WORDS],
            &info.ata_serial,
        );
        copy_id_string(
            &mut idf[identify::FIRMWARE_REV..identify::FIRMWARE_REV + identify::FIRMWARE_REV_WORDS],
            &info.ata_revision,
        );
        copy_id_string(
            &mut idf[identify::MODEL_NUMBER..identify::MODEL_NUMBER + identify::MODEL_NUMBER_WORDS],
            &info.ata_model,
        );

        idf[identify::CAPABILITIES_1] = (if caps.supports_iordy { 1 << 11 } else { 0 })
            | (1 << 9)
            | (if caps.max_udma_mode.is_some() { 1 << 8 } else { 0 });
        idf[identify::PIO_MODE_ATA1] = (caps.max_pio_mode as u16) << 8;
        idf[identify::MODE_INFO_VALID] = 0x0006;
        idf[identify::MODEINFO_PIO] = match caps.max_pio_mode {
            0..=2 => 0,
            3 => 0x01,
            _ => 0x03,
        };
        idf[identify::PIO_CYCLETIME_MIN] = caps.min_pio_cycletime_no_iordy;
        idf[identify::PIO_CYCLETIME_IORDY] = caps.min_pio_cycletime_with_iordy;

        idf[identify::STANDARD_VERSION_MAJOR] = 0x0078;
        idf[identify::STANDARD_VERSION_MINOR] = 0x0019;
        idf[identify::COMMAND_SET_SUPPORT_1] = 0x0014;
        idf[identify::COMMAND_SET_SUPPORT_2] = 0x4000;
        idf[identify::COMMAND_SET_SUPPORT_3] = 0x4000;
        idf[identify::COMMAND_SET_ENABLED_1] = 0x0014;

        if let Some(max) = caps.max_udma_mode {
            idf[identify::MODEINFO_ULTRADMA] = (1u16 << (max + 1)) - 1;
            if let Some(mode) = self.xfer.udma_mode {
                idf[identify::MODEINFO_ULTRADMA] |= 1 << (mode + 8);
            }
        }

        idf[identify::HARDWARE_RESET_RESULT] = reset_result_word(
            self.dev_index,
            self.settings.enable_dev1_zeros,
        );
        idf
    }

    /// SET FEATURES for packet devices, same negotiation as rigid disks
    pub fn cmd_set_features(&mut self, phy: &mut dyn Phy, regs: &Registers) -> bool {
        let caps = *self.xfer.capabilities();
        let ok = apply_set_features(&caps, regs, &mut self.xfer.udma_mode);
        let mut out = phy.get_regs();
        if ok {
            out.error = 0;
            phy.set_regs(&out);
            phy.assert_irq(Status::DEVRDY | Status::DSC);
        } else {
            out.error = AtaError::ABORT.bits();
            phy.set_regs(&out);
            phy.assert_irq(Status::DEVRDY | Status::ERR);
        }
        true
    }
}

/// IDENTIFY word 93, hardware reset result
pub fn reset_result_word(dev_index: usize, enable_dev1_zeros: bool) -> u16 {
    if dev_index == 0 {
        // Device 0 passed diagnostics, plus either "responds for device 1"
        // or "device 1 detected"
        0x4009 | (if enable_dev1_zeros { 1 << 6 } else { 0x30 })
    } else {
        0x4900
    }
}

/// Behaviour of one packet device kind
///
/// Implementors provide access to their [`AtapiCore`] and override the hooks
/// where they deviate from the shared command set. The provided methods form
/// the engine and are not meant to be overridden.
pub trait AtapiDevice {
    fn core(&self) -> &AtapiCore;

    fn core_mut(&mut self) -> &mut AtapiCore;

    /// Device specific ATA (non-packet) command
    ///
    /// `None` falls through to the shared handling.
    fn ata_command(&mut self, _phy: &mut dyn Phy, _regs: &Registers) -> Option<bool> {
        None
    }

    /// Device specific packet command
    ///
    /// `None` falls through to the shared command set.
    fn packet_command(&mut self, _phy: &mut dyn Phy, _cmd: &[u8; 12]) -> Option<CmdResult> {
        None
    }

    /// Append mode page `page` to `out`
    ///
    /// `page_ctrl == 1` requests the changeable-values view.
    ///
    /// # Returns
    ///
    /// `true` if the page exists on this device
    fn mode_page(&self, _page_ctrl: u8, _page: u8, _out: &mut Vec<u8>) -> bool {
        false
    }

    /// Standard INQUIRY data
    fn inquiry_data(&self) -> Vec<u8> {
        commands::standard_inquiry(self.core())
    }

    /// IDENTIFY PACKET DEVICE words, the checksum is added by the engine
    fn identify_packet_words(&self) -> [u16; 256] {
        self.core().identify_packet_words()
    }

    /// Number of addressable sectors on the present medium
    fn capacity_lba(&self) -> u64 {
        let core = self.core();
        core.image_capacity() / core.devinfo.bytes_per_sector as u64
    }

    /// Medium type reported while an image is loaded
    fn loaded_medium_type(&self) -> u8 {
        medium_type::UNKNOWN
    }

    /// Called after a new image, or none, was bound
    fn image_changed(&mut self) {}

    /// Transfer `count` sectors starting at `lba` to the host
    ///
    /// The range is already validated against [`AtapiDevice::capacity_lba`].
    fn read_blocks(&mut self, phy: &mut dyn Phy, lba: u64, count: u32) -> CmdResult {
        commands::stream_read(self.core_mut(), phy, lba, count)
    }

    /// Receive `count` sectors from the host and store them at `lba`
    fn write_blocks(&mut self, phy: &mut dyn Phy, lba: u64, count: u32) -> CmdResult {
        commands::stream_write(self.core_mut(), phy, lba, count)
    }

    /// Size of the present medium in bytes as seen by the host
    fn capacity(&self) -> u64 {
        self.capacity_lba() * self.core().devinfo.bytes_per_sector as u64
    }

    /// Bind an image, `None` removes the medium
    fn set_image(&mut self, image: Option<Box<dyn Image>>) {
        let loaded = self.loaded_medium_type();
        self.core_mut().load_image(image, loaded);
        self.image_changed();
    }

    /// Apply PHY capabilities after they were clamped by the configuration
    fn set_capabilities(&mut self, caps: PhyCapabilities, auto_receive: bool) {
        let xfer = &mut self.core_mut().xfer;
        xfer.set_capabilities(caps);
        xfer.auto_receive = auto_receive;
    }

    /// Execute an ATA command addressed to this device
    ///
    /// # Returns
    ///
    /// `false` if the command is not implemented and must be aborted
    fn handle_command(&mut self, phy: &mut dyn Phy, regs: &Registers) -> bool {
        if let Some(handled) = self.ata_command(phy, regs) {
            return handled;
        }

        match regs.command {
            // Superseded by the packet interface; answer with the signature
            // so the host driver detects a packet device
            ide_cmd::IDENTIFY_DEVICE
            | ide_cmd::READ_SECTORS
            | ide_cmd::READ_SECTORS_EXT
            | ide_cmd::EXECUTE_DEVICE_DIAGNOSTIC => {
                let status = Status::DEVRDY | Status::ERR;
                self.core().set_signature(phy, AtaError::ABORT.bits(), status);
                phy.assert_irq(status);
                true
            }
            ide_cmd::DEVICE_RESET => {
                let core = self.core_mut();
                core.reset(false);
                core.set_signature(phy, diag::DEV0_PASS, Status::empty());
                true
            }
            ide_cmd::IDENTIFY_PACKET_DEVICE => {
                self.cmd_identify_packet_device(phy);
                true
            }
            ide_cmd::PACKET => {
                self.cmd_packet(phy, regs);
                true
            }
            ide_cmd::SET_FEATURES => self.core_mut().cmd_set_features(phy, regs),
            _ => false,
        }
    }

    /// React to a bus reset
    fn handle_event(&mut self, phy: &mut dyn Phy, event: PhyEvent) {
        if matches!(event, PhyEvent::HwRst | PhyEvent::SwRst) {
            let core = self.core_mut();
            core.reset(event == PhyEvent::HwRst);
            core.set_signature(phy, diag::DEV0_PASS, Status::empty());
        }
    }

    /// Send the 512-byte identity block
    fn cmd_identify_packet_device(&mut self, phy: &mut dyn Phy) {
        let mut words = self.identify_packet_words();
        finalize_identify(&mut words);
        let bytes = identify_to_bytes(&words);

        let core = self.core_mut();
        core.xfer.bytes_req = 0;
        core.xfer.dma_requested = false;
        let result = core
            .xfer
            .send_data(phy, &bytes, bytes.len(), 1)
            .and_then(|()| core.xfer.send_wait_finish(phy));

        let mut regs = phy.get_regs();
        match result {
            Ok(()) => {
                regs.error = 0;
                regs.status = (Status::DEVRDY | Status::DSC).bits();
                phy.set_regs(&regs);
                phy.assert_irq(Status::DEVRDY | Status::DSC);
            }
            Err(TransferError::Interrupted) => {
                log::debug!("IDENTIFY PACKET DEVICE interrupted");
            }
            Err(err) => {
                log::warn!("IDENTIFY PACKET DEVICE failed: {}", err);
                regs.error = AtaError::ABORT.bits();
                phy.set_regs(&regs);
                phy.assert_irq(Status::DEVRDY | Status::ERR);
            }
        }
    }

    /// PACKET: receive the CDB, execute it and report completion
    fn cmd_packet(&mut self, phy: &mut dyn Phy, regs: &Registers) {
        let core = self.core_mut();
        core.xfer.bytes_req = regs.byte_count();
        core.xfer.dma_requested = regs.feature & 1 != 0;

        let cmd = match core.xfer.receive_command(phy) {
            Ok(cmd) => cmd,
            Err(err) => {
                core.finish(phy, Err(err.into()), false);
                return;
            }
        };

        log::debug!(
            "Device {}: ATAPI {} [{}]",
            core.dev_index,
            atapi_command_name(cmd[0]),
            HexBytes(&cmd)
        );

        let result = self.handle_packet(phy, &cmd);
        let keep_sense = cmd[0] == atapi_cmd::REQUEST_SENSE;
        self.core_mut().finish(phy, result, keep_sense);
    }

    /// Decode and execute one CDB without completing it
    fn handle_packet(&mut self, phy: &mut dyn Phy, cmd: &[u8; 12]) -> CmdResult {
        let core = self.core_mut();
        if core.unit_attention
            && !matches!(
                cmd[0],
                atapi_cmd::INQUIRY
                    | atapi_cmd::REQUEST_SENSE
                    | atapi_cmd::GET_EVENT_STATUS_NOTIFICATION
            )
        {
            core.unit_attention = false;
            return Err(AtapiError::sense(
                sense_key::UNIT_ATTENTION,
                asc::MEDIUM_MAY_HAVE_CHANGED,
            ));
        }

        if let Some(result) = self.packet_command(phy, cmd) {
            return result;
        }
        commands::dispatch(self, phy, cmd)
    }
}
