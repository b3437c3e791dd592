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

//! Bus-level command dispatch
//!
//! [`IdeProtocol`] owns the PHY and up to two emulated devices. Each call to
//! [`IdeProtocol::poll`] takes one event from the PHY and routes it:
//!
//! - `Cmd` goes to the device selected by the DEV bit, except EXECUTE DEVICE
//!   DIAGNOSTIC which involves both devices and is answered here
//! - `HwRst` / `SwRst` reset every device, which then load their signatures
//! - `DataTransferDone` and `None` need no action
//!
//! The first poll after [`IdeProtocol::init`] behaves as a hardware reset so
//! the task file holds valid signatures before the host looks at it.

use std::path::Path;

mod device;
#[cfg(test)]
mod tests;

pub use device::Device;

use crate::core::cdrom::resolve_image_path;
use crate::core::config::{Config, DeviceConfig, DeviceKind};
use crate::core::constants::{device_reg, diag, ide_cmd, ide_command_name, AtaError, Status};
use crate::core::error::Result;
use crate::core::image::{Image, ImageFile};
use crate::core::phy::{Phy, PhyCapabilities, PhyConfig, PhyEvent, Registers, Signals};

/// Status reported while no command is executing
const IDLE_STATUS: Status = Status::DEVRDY.union(Status::DSC);

/// IDE bus protocol handler
pub struct IdeProtocol<P: Phy> {
    phy: P,
    config: Config,
    devices: [Option<Device>; 2],
    caps: PhyCapabilities,
    phy_config: PhyConfig,

    /// Next poll must behave as a hardware reset
    reset_pending: bool,

    /// Device 1 was configured but could not be brought up
    dev1_failed: bool,

    /// DASP/PDIAG driven between commands
    signals: Signals,
}

impl<P: Phy> IdeProtocol<P> {
    pub fn new(phy: P, config: Config) -> Self {
        Self {
            phy,
            config,
            devices: [None, None],
            caps: PhyCapabilities::default(),
            phy_config: PhyConfig::default(),
            reset_pending: true,
            dev1_failed: false,
            signals: Signals::empty(),
        }
    }

    /// Create the configured devices, bind their images and reset the PHY
    ///
    /// A device whose image cannot be opened stays on the bus without a
    /// medium.
    pub fn init(&mut self) -> Result<()> {
        self.config.validate()?;
        self.caps = self.config.clamp_capabilities(self.phy.capabilities());

        let ide = self.config.ide.clone();
        let mut devices: [Option<Device>; 2] = [None, None];
        self.dev1_failed = false;
        for (index, dev_config) in self.config.devices.iter().enumerate() {
            let mut device = Device::new(index, &ide, dev_config);
            if let Some(path) = &dev_config.image {
                match open_image(dev_config, path, ide.buffer_size) {
                    Ok(image) => device.set_image(Some(image)),
                    Err(err) => {
                        log::error!(
                            "Device {}: cannot open image {}: {}",
                            index,
                            path.display(),
                            err
                        );
                        if index == 1 {
                            self.dev1_failed = true;
                        }
                    }
                }
            }
            log::info!("Device {}: {}", index, device.kind().name());
            devices[index] = Some(device);
        }
        self.devices = devices;

        self.reset_phy();
        self.reset_pending = true;
        Ok(())
    }

    /// Reset the PHY with a bus configuration matching the attached devices
    fn reset_phy(&mut self) {
        let [dev0, dev1] = &self.devices;
        let is_packet = |d: &Option<Device>| d.as_ref().is_some_and(Device::is_packet_device);

        self.phy_config = PhyConfig {
            enable_dev0: dev0.is_some(),
            enable_dev1: dev1.is_some(),
            enable_dev1_zeros: self.config.ide.enable_dev1_zeros && is_packet(dev0) && dev1.is_none(),
            atapi_dev0: is_packet(dev0),
            atapi_dev1: is_packet(dev1),
            disable_iordy: self
                .devices
                .iter()
                .flatten()
                .any(Device::disables_iordy),
            enable_packet_intrq: self.config.ide.atapi_intrq,
        };

        match (dev0.is_some(), dev1.is_some()) {
            (true, false) => log::info!("Operating as primary drive"),
            (false, true) => log::info!("Operating as secondary drive"),
            (true, true) => log::info!("Operating as two drives"),
            (false, false) => log::warn!("No devices configured"),
        }

        self.phy.reset(&self.phy_config);
        for (index, device) in self.devices.iter_mut().enumerate() {
            if let Some(device) = device {
                let auto_receive = if index == 0 {
                    self.phy_config.atapi_dev0
                } else {
                    self.phy_config.atapi_dev1
                };
                device.set_capabilities(self.caps, auto_receive);
            }
        }
    }

    /// Handle at most one PHY event
    ///
    /// # Returns
    ///
    /// The event that was processed
    pub fn poll(&mut self) -> PhyEvent {
        let event = if self.reset_pending {
            self.reset_pending = false;
            PhyEvent::HwRst
        } else {
            self.phy.get_events()
        };

        match event {
            PhyEvent::Cmd => {
                let regs = self.phy.get_regs();
                if regs.command == ide_cmd::EXECUTE_DEVICE_DIAGNOSTIC {
                    self.execute_device_diagnostic(regs);
                } else {
                    self.dispatch_command(regs);
                }
            }
            PhyEvent::ExeDevDiag => {
                let regs = self.phy.get_regs();
                self.execute_device_diagnostic(regs);
            }
            PhyEvent::HwRst | PhyEvent::SwRst => self.bus_reset(event),
            PhyEvent::DataTransferDone => log::trace!("Data transfer done"),
            PhyEvent::None => self.clear_stale_busy(),
        }
        event
    }

    fn dispatch_command(&mut self, regs: Registers) {
        let selected = regs.selected_device();
        log::debug!(
            "IDE command for DEV{}: {:02X} {} (device {:02X}, dev_ctrl {:02X}, feature {:02X}, \
             sector_count {:02X}, lba {:02X} {:02X} {:02X})",
            selected,
            regs.command,
            ide_command_name(regs.command),
            regs.device,
            regs.device_control,
            regs.feature,
            regs.sector_count,
            regs.lba_high,
            regs.lba_mid,
            regs.lba_low
        );

        let Some(device) = self.devices[selected].as_mut() else {
            log::debug!("Command for a device that is not present, reporting failure");
            abort_command(&mut self.phy, regs);
            return;
        };

        // DASP from the reset handshake is released by the first command
        self.signals.remove(Signals::DASP);

        self.phy.set_signals(self.signals | Signals::DASP);
        let handled = device.handle_command(&mut self.phy, &regs);
        self.phy.set_signals(self.signals);

        if !handled {
            log::info!(
                "Command {} not handled by device {}",
                ide_command_name(regs.command),
                selected
            );
            abort_command(&mut self.phy, regs);
        } else {
            let error = self.phy.get_regs().error;
            if error != 0 {
                log::debug!("{} completed with error {:02X}", ide_command_name(regs.command), error);
            } else {
                log::debug!("{} complete", ide_command_name(regs.command));
            }
        }
    }

    /// Reset every device and load its signature
    fn bus_reset(&mut self, event: PhyEvent) {
        log::debug!("Bus reset: {:?}", event);

        // Device 0 goes last so its signature is the one left in the task file
        for device in self.devices.iter_mut().rev().flatten() {
            device.handle_event(&mut self.phy, event);
        }

        // Device 1 announces its presence and passed diagnostics to device 0
        self.signals = if self.devices[1].is_some() && !self.dev1_failed {
            Signals::DASP | Signals::PDIAG
        } else {
            Signals::empty()
        };
        self.phy.set_signals(self.signals);
    }

    /// EXECUTE DEVICE DIAGNOSTIC, answered by device 0 for both devices
    fn execute_device_diagnostic(&mut self, regs: Registers) {
        log::debug!("EXECUTE DEVICE DIAGNOSTIC");

        let mut error = diag::DEV0_PASS;
        if self.dev1_failed {
            error |= diag::DEV1_FAIL;
        }

        for device in self.devices.iter_mut().flatten() {
            device.reset(false);
        }
        if let Some(device) = self.devices[1].as_ref() {
            device.set_signature(&mut self.phy, diag::DEV0_PASS, Status::empty());
        }
        let Some(device) = self.devices[0].as_ref() else {
            // Device 1 alone does not answer for the bus
            abort_command(&mut self.phy, regs);
            return;
        };
        device.set_signature(&mut self.phy, error, Status::empty());

        let mut out = self.phy.get_regs();
        out.device &= !device_reg::DEV;
        self.phy.set_regs(&out);
        self.phy.assert_irq(IDLE_STATUS);
    }

    /// Drop BSY left behind by an unexpected data register access
    fn clear_stale_busy(&mut self) {
        let mut regs = self.phy.get_regs();
        if regs.status & Status::BSY.bits() != 0 {
            log::debug!("Clearing stale busy status");
            regs.status = IDLE_STATUS.bits();
            self.phy.set_regs(&regs);
        }
    }

    /// Bind a new image to a device, `None` ejects the medium
    pub fn set_image(&mut self, dev_index: usize, image: Option<Box<dyn Image>>) -> bool {
        match self.devices.get_mut(dev_index).and_then(Option::as_mut) {
            Some(device) => {
                device.set_image(image);
                true
            }
            None => false,
        }
    }

    pub fn device(&self, dev_index: usize) -> Option<&Device> {
        self.devices.get(dev_index).and_then(Option::as_ref)
    }

    pub fn device_mut(&mut self, dev_index: usize) -> Option<&mut Device> {
        self.devices.get_mut(dev_index).and_then(Option::as_mut)
    }

    pub fn phy(&self) -> &P {
        &self.phy
    }

    pub fn phy_mut(&mut self) -> &mut P {
        &mut self.phy
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bus configuration applied at the last PHY reset
    pub fn phy_config(&self) -> &PhyConfig {
        &self.phy_config
    }

    /// Capabilities after clamping by the configuration
    pub fn capabilities(&self) -> &PhyCapabilities {
        &self.caps
    }

    /// Give back the PHY, dropping the devices
    pub fn into_phy(self) -> P {
        self.phy
    }
}

/// Complete a command nobody could execute
fn abort_command(phy: &mut dyn Phy, mut regs: Registers) {
    regs.error = AtaError::ABORT.bits();
    phy.set_regs(&regs);
    phy.assert_irq(IDLE_STATUS | Status::ERR);
}

/// Open the image configured for a device
fn open_image(device: &DeviceConfig, path: &Path, buffer_size: usize) -> Result<Box<dyn Image>> {
    let path = match device.kind {
        DeviceKind::Cdrom => resolve_image_path(path)?,
        _ => path.to_path_buf(),
    };
    let image = ImageFile::open_with_buffer(&path, device.read_only, buffer_size)?;
    Ok(Box::new(image))
}
