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

//! ATA rigid disk
//!
//! A plain ATA hard disk without the packet layer: the starting address
//! and sector count sit directly in the task file, as an LBA or as a CHS
//! triple depending on the LBA bit of the device register.
//!
//! | Command                      | Notes                                    |
//! |------------------------------|------------------------------------------|
//! | IDENTIFY DEVICE              | 512-byte identity, native and working CHS |
//! | SET FEATURES                 | transfer mode negotiation                |
//! | READ/WRITE SECTORS           | PIO, sector count 0 means 256            |
//! | READ/WRITE DMA               | only when the PHY offers UDMA            |
//! | READ/WRITE BUFFER            | 512-byte scratch loopback                |
//! | INIT DEVICE PARAMETERS       | selects the working CHS geometry         |
//! | RECALIBRATE                  | resets the address registers             |
//! | GET MEDIA STATUS             | never reports a change                   |
//!
//! 48-bit commands are aborted; the task file model carries no HOB bytes.

use std::time::Duration;

use crate::core::config::{DeviceConfig, IdeConfig};
use crate::core::constants::{device_reg, diag, ide_cmd, ide_command_name, AtaError, Status};
use crate::core::error::{AtaCommandError, IdeError};
use crate::core::image::Image;
use crate::core::phy::{apply_set_features, Phy, PhyCapabilities, PhyEvent, Registers};
use crate::core::utils::format_drive_info_field;

mod geometry;
mod identify;
mod transfer;
#[cfg(test)]
mod tests;

pub use geometry::{Geometry, TaskAddress, MAX_LBA28, SECTOR_SIZE};
pub use transfer::{AtaDataState, AtaTransfer, SectorReceiver, SectorSender};

/// Result of one ATA command
pub type AtaResult = std::result::Result<(), AtaCommandError>;

/// Largest sector count of a 28-bit command
const MAX_SECTOR_COUNT: u32 = 256;

/// Identity strings reported by IDENTIFY DEVICE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RigidInfo {
    pub model: String,
    pub serial: String,
    pub firmware: String,
}

impl RigidInfo {
    fn from_config(device: &DeviceConfig) -> Self {
        let model = device.model.as_deref().unwrap_or("ZuluIDE Hard Drive");
        let serial = device.serial.as_deref().unwrap_or("123456789");
        let firmware = device.firmware.as_deref().unwrap_or("1.0");
        Self {
            model: format_drive_info_field(model, 40),
            serial: format_drive_info_field(serial, 20),
            firmware: format_drive_info_field(firmware, 8),
        }
    }
}

/// ATA hard disk backed by an image file
#[derive(Debug)]
pub struct RigidDevice {
    info: RigidInfo,
    xfer: AtaTransfer,
    image: Option<Box<dyn Image>>,
    dev_index: usize,

    /// Geometry derived from the image, or the configured override
    native: Geometry,

    /// Geometry used for CHS translation, set by INIT DEVICE PARAMETERS
    current: Geometry,

    chs_override: Option<Geometry>,

    /// READ/WRITE BUFFER scratch
    buffer: Box<[u8; 512]>,

    enable_dev1_zeros: bool,
    access_delay: Duration,
}

impl RigidDevice {
    pub fn new(dev_index: usize, ide: &IdeConfig, device: &DeviceConfig) -> Self {
        let chs_override = (device.cylinders > 0 && device.heads > 0 && device.sectors > 0)
            .then(|| Geometry::new(device.cylinders, device.heads, device.sectors));

        Self {
            info: RigidInfo::from_config(device),
            xfer: AtaTransfer::new(
                Duration::from_millis(ide.transfer_timeout_ms),
                !ide.ignore_command_interrupt,
            ),
            image: None,
            dev_index,
            native: Geometry::default(),
            current: Geometry::default(),
            chs_override,
            buffer: Box::new([0u8; 512]),
            enable_dev1_zeros: ide.enable_dev1_zeros,
            access_delay: Duration::from_millis(ide.access_delay_ms),
        }
    }

    pub fn info(&self) -> &RigidInfo {
        &self.info
    }

    pub fn image(&self) -> Option<&dyn Image> {
        self.image.as_deref()
    }

    /// Native geometry of the bound image
    pub fn geometry(&self) -> Geometry {
        self.native
    }

    /// Geometry currently used for CHS addressing
    pub fn current_geometry(&self) -> Geometry {
        self.current
    }

    pub fn transfer(&self) -> &AtaTransfer {
        &self.xfer
    }

    /// Number of 512-byte sectors on the disk
    pub fn capacity_lba(&self) -> u64 {
        self.image
            .as_ref()
            .map_or(0, |image| image.capacity() / SECTOR_SIZE)
    }

    /// Disk size in bytes
    pub fn capacity(&self) -> u64 {
        self.capacity_lba() * SECTOR_SIZE
    }

    /// Bind an image and derive the native geometry from its size
    pub fn set_image(&mut self, image: Option<Box<dyn Image>>) {
        self.image = image;
        let sectors = self.capacity_lba();
        self.native = self.chs_override.unwrap_or_else(|| Geometry::derive(sectors));
        self.current = self.native;

        match &self.image {
            Some(image) => {
                if image.capacity() % SECTOR_SIZE != 0 {
                    log::warn!(
                        "Image {} is not a multiple of {} bytes, ignoring the last partial sector",
                        image.filename(),
                        SECTOR_SIZE
                    );
                }
                log::info!(
                    "Device {}: rigid disk {} with {} sectors, CHS {}",
                    self.dev_index,
                    image.filename(),
                    sectors,
                    self.native
                );
            }
            None => log::info!("Device {}: rigid disk has no image", self.dev_index),
        }
    }

    /// Apply PHY capabilities after they were clamped by the configuration
    pub fn set_capabilities(&mut self, caps: PhyCapabilities) {
        self.xfer.set_capabilities(caps);
    }

    /// Forget command state after a bus reset
    pub fn reset(&mut self, hard: bool) {
        self.xfer.reset(hard);
        if hard {
            self.current = self.native;
        }
    }

    /// React to a bus reset
    pub fn handle_event(&mut self, phy: &mut dyn Phy, event: PhyEvent) {
        if matches!(event, PhyEvent::HwRst | PhyEvent::SwRst) {
            self.reset(event == PhyEvent::HwRst);
            self.set_signature(phy, diag::DEV0_PASS, Status::empty());
        }
    }

    /// Load the ATA device signature into the task file
    pub fn set_signature(&self, phy: &mut dyn Phy, error: u8, status: Status) {
        let mut regs = phy.get_regs();
        regs.device = if self.dev_index == 1 { device_reg::DEV } else { 0 };
        regs.error = error;
        regs.status = status.bits();
        regs.sector_count = 0x01;
        regs.lba_low = 0x01;
        regs.lba_mid = 0x00;
        regs.lba_high = 0x00;
        phy.set_regs(&regs);
    }

    /// Execute an ATA command addressed to this device
    ///
    /// # Returns
    ///
    /// `false` if the command is not implemented and must be aborted
    pub fn handle_command(&mut self, phy: &mut dyn Phy, regs: &Registers) -> bool {
        log::debug!(
            "Device {}: ATA {} [fe {:02X} sc {:02X} lba {:02X}{:02X}{:02X} dev {:02X}]",
            self.dev_index,
            ide_command_name(regs.command),
            regs.feature,
            regs.sector_count,
            regs.lba_high,
            regs.lba_mid,
            regs.lba_low,
            regs.device
        );

        let dma_available = self.xfer.capabilities().max_udma_mode.is_some();
        let result = match regs.command {
            ide_cmd::IDENTIFY_DEVICE => self.cmd_identify_device(phy),
            ide_cmd::SET_FEATURES => self.cmd_set_features(regs),
            ide_cmd::READ_SECTORS => self.cmd_read(phy, regs, false),
            ide_cmd::WRITE_SECTORS => self.cmd_write(phy, regs, false),
            ide_cmd::READ_DMA | ide_cmd::WRITE_DMA if !dma_available => {
                log::debug!("DMA command without UDMA support");
                return false;
            }
            ide_cmd::READ_DMA => self.cmd_read(phy, regs, true),
            ide_cmd::WRITE_DMA => self.cmd_write(phy, regs, true),
            ide_cmd::READ_SECTORS_EXT | ide_cmd::WRITE_SECTORS_EXT => {
                log::debug!("48-bit addressing is not supported");
                Err(AtaCommandError::abort())
            }
            ide_cmd::READ_BUFFER => self.cmd_read_buffer(phy),
            ide_cmd::WRITE_BUFFER => self.cmd_write_buffer(phy),
            ide_cmd::INIT_DEV_PARAMS => self.cmd_init_dev_params(regs),
            ide_cmd::RECALIBRATE => {
                self.cmd_recalibrate(phy, regs);
                Ok(())
            }
            ide_cmd::DEVICE_RESET => {
                // Packet devices only
                let status = Status::DEVRDY | Status::ERR;
                self.set_signature(phy, AtaError::ABORT.bits(), status);
                phy.assert_irq(status);
                return true;
            }
            ide_cmd::NOP => Err(AtaCommandError::abort()),
            ide_cmd::GET_MEDIA_STATUS => Ok(()),
            _ => return false,
        };

        self.finish(phy, result);
        true
    }

    /// Report the outcome of a command to the host
    fn finish(&mut self, phy: &mut dyn Phy, result: AtaResult) {
        match result {
            Ok(()) => {
                let mut regs = phy.get_regs();
                regs.error = 0;
                regs.status = (Status::DEVRDY | Status::DSC).bits();
                phy.set_regs(&regs);
                phy.assert_irq(Status::DEVRDY | Status::DSC);
            }
            Err(AtaCommandError::Aborted(error)) => {
                if self.xfer.state != AtaDataState::Idle {
                    self.xfer.abort(phy);
                }
                log::debug!("Device {}: command failed, error {:?}", self.dev_index, error);
                let status = Status::DEVRDY | Status::ERR;
                let mut regs = phy.get_regs();
                regs.error = error.bits();
                regs.status = status.bits();
                phy.set_regs(&regs);
                phy.assert_irq(status);
            }
            Err(AtaCommandError::Interrupted) => {
                log::debug!("Device {}: command interrupted, no status", self.dev_index);
                self.xfer.abort(phy);
            }
        }
    }

    fn cmd_identify_device(&mut self, phy: &mut dyn Phy) -> AtaResult {
        let bytes = self.identify_bytes();
        self.xfer.begin(false);
        self.xfer.send_all(phy, &bytes)?;
        Ok(())
    }

    fn cmd_set_features(&mut self, regs: &Registers) -> AtaResult {
        let caps = *self.xfer.capabilities();
        if apply_set_features(&caps, regs, &mut self.xfer.udma_mode) {
            Ok(())
        } else {
            Err(AtaCommandError::abort())
        }
    }

    /// Starting LBA and sector count of a sector command
    fn decode_range(&self, regs: &Registers) -> Result<(TaskAddress, u64, u32), AtaCommandError> {
        let count = match regs.sector_count {
            0 => MAX_SECTOR_COUNT,
            n => n as u32,
        };
        let address = TaskAddress::from_registers(regs);
        let idnf = AtaCommandError::Aborted(AtaError::ABORT | AtaError::IDNF);

        let Some(lba) = address.resolve(&self.current) else {
            log::debug!("{:?} outside geometry {}", address, self.current);
            return Err(idnf);
        };
        if self.image.is_none() {
            return Err(IdeError::NoImage.into());
        }
        let capacity = self.capacity_lba();
        if lba + count as u64 > capacity {
            log::debug!(
                "Access of {} sectors at LBA {} past capacity {}",
                count,
                lba,
                capacity
            );
            return Err(idnf);
        }
        Ok((address, lba, count))
    }

    /// Put the last sector transferred back into the address registers
    fn write_back_address(&self, phy: &mut dyn Phy, address: &TaskAddress, last_lba: u64) {
        let mut regs = phy.get_regs();
        address.write_back(&mut regs, last_lba, &self.current);
        phy.set_regs(&regs);
    }

    fn cmd_read(&mut self, phy: &mut dyn Phy, regs: &Registers, dma: bool) -> AtaResult {
        let (address, lba, count) = self.decode_range(regs)?;
        self.xfer.begin(dma);
        if !self.access_delay.is_zero() {
            std::thread::sleep(self.access_delay);
        }

        let RigidDevice { image, xfer, .. } = self;
        let image = image
            .as_deref_mut()
            .ok_or(AtaCommandError::Aborted(AtaError::ABORT | AtaError::NOMEDIA))?;
        let mut sender = SectorSender { xfer, phy: &mut *phy };
        image.read(
            lba * SECTOR_SIZE,
            SECTOR_SIZE as usize,
            count as usize,
            &mut sender,
        )?;
        self.xfer.send_wait_finish(phy)?;

        self.write_back_address(phy, &address, lba + count as u64 - 1);
        Ok(())
    }

    fn cmd_write(&mut self, phy: &mut dyn Phy, regs: &Registers, dma: bool) -> AtaResult {
        let (address, lba, count) = self.decode_range(regs)?;
        self.xfer.begin(dma);
        if !self.access_delay.is_zero() {
            std::thread::sleep(self.access_delay);
        }

        let RigidDevice { image, xfer, .. } = self;
        let image = image
            .as_deref_mut()
            .ok_or(AtaCommandError::Aborted(AtaError::ABORT | AtaError::NOMEDIA))?;
        if !image.writable() {
            log::warn!("Write to read-only image {}", image.filename());
            return Err(AtaCommandError::abort());
        }
        let mut receiver = SectorReceiver { xfer, phy: &mut *phy };
        image.write(
            lba * SECTOR_SIZE,
            SECTOR_SIZE as usize,
            count as usize,
            &mut receiver,
        )?;

        self.write_back_address(phy, &address, lba + count as u64 - 1);
        Ok(())
    }

    fn cmd_read_buffer(&mut self, phy: &mut dyn Phy) -> AtaResult {
        self.xfer.begin(false);
        self.xfer.send_all(phy, &self.buffer[..])?;
        Ok(())
    }

    fn cmd_write_buffer(&mut self, phy: &mut dyn Phy) -> AtaResult {
        self.xfer.begin(false);
        self.xfer.recv_data(phy, &mut self.buffer[..], 512, 1)?;
        Ok(())
    }

    fn cmd_init_dev_params(&mut self, regs: &Registers) -> AtaResult {
        let heads = (regs.device & device_reg::HEAD_MASK) + 1;
        let spt = regs.sector_count;
        let geometry =
            Geometry::working(self.capacity_lba(), heads, spt).ok_or_else(AtaCommandError::abort)?;
        log::debug!(
            "Working geometry {} (native {})",
            geometry,
            self.native
        );
        self.current = geometry;
        Ok(())
    }

    fn cmd_recalibrate(&mut self, phy: &mut dyn Phy, regs: &Registers) {
        let mut out = *regs;
        out.lba_low = if regs.device & device_reg::LBA != 0 { 0 } else { 1 };
        out.lba_mid = 0;
        out.lba_high = 0;
        out.device &= !device_reg::HEAD_MASK;
        phy.set_regs(&out);
    }
}
