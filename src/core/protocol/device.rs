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

use crate::core::atapi::AtapiDevice;
use crate::core::cdrom::CdromDevice;
use crate::core::config::{DeviceConfig, DeviceKind, IdeConfig};
use crate::core::constants::Status;
use crate::core::image::Image;
use crate::core::phy::{Phy, PhyCapabilities, PhyEvent, Registers};
use crate::core::removable::RemovableDevice;
use crate::core::rigid::RigidDevice;
use crate::core::zip::ZipDrive;

/// One emulated device on the bus
pub enum Device {
    Cdrom(CdromDevice),
    Removable(RemovableDevice),
    Zip(ZipDrive),
    Rigid(RigidDevice),
}

impl Device {
    pub fn new(dev_index: usize, ide: &IdeConfig, config: &DeviceConfig) -> Self {
        match config.kind {
            DeviceKind::Cdrom => Device::Cdrom(CdromDevice::new(dev_index, ide, config)),
            DeviceKind::Removable => Device::Removable(RemovableDevice::new(dev_index, ide, config)),
            DeviceKind::Zip100 | DeviceKind::Zip250 => Device::Zip(ZipDrive::new(dev_index, ide, config)),
            DeviceKind::Rigid => Device::Rigid(RigidDevice::new(dev_index, ide, config)),
        }
    }

    pub fn kind(&self) -> DeviceKind {
        match self {
            Device::Cdrom(_) => DeviceKind::Cdrom,
            Device::Removable(_) => DeviceKind::Removable,
            Device::Zip(zip) => zip.model().kind(),
            Device::Rigid(_) => DeviceKind::Rigid,
        }
    }

    /// Device speaks the packet protocol
    pub fn is_packet_device(&self) -> bool {
        !matches!(self, Device::Rigid(_))
    }

    /// Device needs IORDY flow control turned off on the PHY
    pub fn disables_iordy(&self) -> bool {
        matches!(self, Device::Zip(_) | Device::Rigid(_))
    }

    /// Execute an ATA command
    ///
    /// # Returns
    ///
    /// `false` if the command is not implemented and must be aborted
    pub fn handle_command(&mut self, phy: &mut dyn Phy, regs: &Registers) -> bool {
        match self {
            Device::Cdrom(dev) => dev.handle_command(phy, regs),
            Device::Removable(dev) => dev.handle_command(phy, regs),
            Device::Zip(dev) => dev.handle_command(phy, regs),
            Device::Rigid(dev) => dev.handle_command(phy, regs),
        }
    }

    pub fn handle_event(&mut self, phy: &mut dyn Phy, event: PhyEvent) {
        match self {
            Device::Cdrom(dev) => dev.handle_event(phy, event),
            Device::Removable(dev) => dev.handle_event(phy, event),
            Device::Zip(dev) => dev.handle_event(phy, event),
            Device::Rigid(dev) => dev.handle_event(phy, event),
        }
    }

    /// Load the device signature into the task file
    pub fn set_signature(&self, phy: &mut dyn Phy, error: u8, status: Status) {
        match self {
            Device::Cdrom(dev) => dev.core().set_signature(phy, error, status),
            Device::Removable(dev) => dev.core().set_signature(phy, error, status),
            Device::Zip(dev) => dev.core().set_signature(phy, error, status),
            Device::Rigid(dev) => dev.set_signature(phy, error, status),
        }
    }

    /// Medium size in bytes, 0 without a medium
    pub fn capacity(&self) -> u64 {
        match self {
            Device::Cdrom(dev) => dev.capacity(),
            Device::Removable(dev) => dev.capacity(),
            Device::Zip(dev) => dev.capacity(),
            Device::Rigid(dev) => dev.capacity(),
        }
    }

    /// Bind an image, `None` removes the medium
    pub fn set_image(&mut self, image: Option<Box<dyn Image>>) {
        match self {
            Device::Cdrom(dev) => dev.set_image(image),
            Device::Removable(dev) => dev.set_image(image),
            Device::Zip(dev) => dev.set_image(image),
            Device::Rigid(dev) => dev.set_image(image),
        }
    }

    /// Forget command state, `hard` for a hardware reset
    pub fn reset(&mut self, hard: bool) {
        match self {
            Device::Cdrom(dev) => dev.core_mut().reset(hard),
            Device::Removable(dev) => dev.core_mut().reset(hard),
            Device::Zip(dev) => dev.core_mut().reset(hard),
            Device::Rigid(dev) => dev.reset(hard),
        }
    }

    /// Apply clamped PHY capabilities
    ///
    /// `auto_receive` tells packet devices that the PHY fetches the CDB
    /// after PACKET on its own.
    pub fn set_capabilities(&mut self, caps: PhyCapabilities, auto_receive: bool) {
        match self {
            Device::Cdrom(dev) => dev.set_capabilities(caps, auto_receive),
            Device::Removable(dev) => dev.set_capabilities(caps, auto_receive),
            Device::Zip(dev) => dev.set_capabilities(caps, auto_receive),
            Device::Rigid(dev) => dev.set_capabilities(caps),
        }
    }

    pub fn image(&self) -> Option<&dyn Image> {
        match self {
            Device::Cdrom(dev) => dev.core().image.as_deref(),
            Device::Removable(dev) => dev.core().image.as_deref(),
            Device::Zip(dev) => dev.core().image.as_deref(),
            Device::Rigid(dev) => dev.image(),
        }
    }

    pub fn as_cdrom(&self) -> Option<&CdromDevice> {
        match self {
            Device::Cdrom(dev) => Some(dev),
            _ => None,
        }
    }

    pub fn as_rigid(&self) -> Option<&RigidDevice> {
        match self {
            Device::Rigid(dev) => Some(dev),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("kind", &self.kind())
            .field("capacity", &self.capacity())
            .finish()
    }
}
