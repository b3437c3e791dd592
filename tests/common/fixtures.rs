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

//! Test fixtures: pattern images and scripted bus sessions

use std::path::PathBuf;

use tempfile::TempDir;
use zuluide_core::core::config::{Config, DeviceConfig};
use zuluide_core::core::constants::Status;
use zuluide_core::core::phy::{MockPhy, PhyEvent, Registers};
use zuluide_core::core::protocol::IdeProtocol;

/// Byte stored at `offset` of every fixture image
#[allow(dead_code)]
pub fn pattern_byte(offset: usize) -> u8 {
    ((offset / 512) as u8).wrapping_mul(13) ^ (offset % 241) as u8
}

/// Expected fixture bytes in `range`
#[allow(dead_code)]
pub fn pattern(range: std::ops::Range<usize>) -> Vec<u8> {
    range.map(pattern_byte).collect()
}

/// Write a pattern image of `size` bytes into `dir`
#[allow(dead_code)]
pub fn write_image(dir: &TempDir, name: &str, size: usize) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, pattern(0..size)).expect("Failed to write image");
    path
}

/// A bus on a mock PHY with the reset after init already processed
pub struct Session {
    pub bus: IdeProtocol<MockPhy>,
}

#[allow(dead_code)]
impl Session {
    pub fn new(devices: Vec<DeviceConfig>) -> Self {
        let config = Config {
            devices,
            ..Config::default()
        };
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Self {
        let mut bus = IdeProtocol::new(MockPhy::new(), config);
        bus.init().expect("Failed to initialize bus");
        assert_eq!(bus.poll(), PhyEvent::HwRst);
        Self { bus }
    }

    /// Run a non-packet command, returning the data sent to the host
    pub fn ata(&mut self, regs: Registers) -> Vec<u8> {
        self.bus.phy_mut().clear_irqs();
        self.bus.phy_mut().issue_command(regs);
        self.run();
        self.bus.phy_mut().take_sent()
    }

    /// Run a non-packet command that writes `data` to the device
    pub fn ata_out(&mut self, regs: Registers, data: &[u8]) {
        self.bus.phy_mut().queue_host_data(data);
        self.ata(regs);
    }

    /// Run a packet command on device `dev`, returning the data sent
    pub fn packet(&mut self, dev: usize, cdb: &[u8]) -> Vec<u8> {
        let mut block = [0u8; 12];
        block[..cdb.len()].copy_from_slice(cdb);
        let device = if dev == 1 { 0x10 } else { 0 };
        self.bus.phy_mut().clear_irqs();
        self.bus.phy_mut().issue_packet(device, &block, 0xFFFE);
        self.run();
        self.bus.phy_mut().take_sent()
    }

    /// Run a packet command that transfers `data` from the host
    pub fn packet_out(&mut self, dev: usize, cdb: &[u8], data: &[u8]) {
        let mut block = [0u8; 12];
        block[..cdb.len()].copy_from_slice(cdb);
        let device = if dev == 1 { 0x10 } else { 0 };
        self.bus.phy_mut().clear_irqs();
        self.bus.phy_mut().issue_packet(device, &block, 0xFFFE);
        self.bus.phy_mut().queue_host_data(data);
        self.run();
    }

    /// Poll until the PHY has no more events
    pub fn run(&mut self) {
        while self.bus.poll() != PhyEvent::None {}
    }

    /// Status of the single interrupt raised by the last command
    pub fn status(&self) -> Status {
        let irqs = self.bus.phy().irqs();
        assert_eq!(irqs.len(), 1, "expected exactly one interrupt, got {:?}", irqs);
        irqs[0]
    }

    pub fn regs(&self) -> Registers {
        *self.bus.phy().regs()
    }
}
