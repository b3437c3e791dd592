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

//! IDE physical layer boundary
//!
//! The PHY owns the electrical side of the bus: register file, DRQ block
//! handshakes, PIO/UDMA timing and interrupts. The command engines only see
//! the message-style interface defined by [`Phy`].
//!
//! # Data transfers
//!
//! Data moves in DRQ blocks whose size is chosen per transfer:
//!
//! | Direction      | Setup            | Per block                              |
//! |----------------|------------------|----------------------------------------|
//! | device -> host | `start_write`    | wait `can_write_block`, `write_block`  |
//! | host -> device | `start_read`     | wait `can_read_block`, `read_block`    |
//!
//! `is_write_finished` reports when the host has drained every written
//! block. `stop_transfers` cancels whatever is in flight.

use bitflags::bitflags;

use super::constants::{set_feature, Status};

mod mock;
#[cfg(test)]
mod tests;

pub use mock::MockPhy;

/// Events reported by [`Phy::get_events`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhyEvent {
    #[default]
    None,
    /// Hardware reset (RESET- line)
    HwRst,
    /// Software reset (SRST bit in device control)
    SwRst,
    /// Host wrote the command register
    Cmd,
    /// A DRQ block was transferred
    DataTransferDone,
    /// EXECUTE DEVICE DIAGNOSTIC was written
    ExeDevDiag,
}

/// Snapshot of the task file registers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub status: u8,
    pub command: u8,
    pub device: u8,
    pub device_control: u8,
    pub error: u8,
    pub feature: u8,
    pub sector_count: u8,
    pub lba_low: u8,
    pub lba_mid: u8,
    pub lba_high: u8,
}

impl Registers {
    /// Index (0 or 1) of the device selected by the DEV bit
    pub fn selected_device(&self) -> usize {
        ((self.device >> 4) & 1) as usize
    }

    /// ATAPI byte count limit (cylinder registers)
    pub fn byte_count(&self) -> u16 {
        u16::from_le_bytes([self.lba_mid, self.lba_high])
    }

    pub fn set_byte_count(&mut self, count: u16) {
        let [low, high] = count.to_le_bytes();
        self.lba_mid = low;
        self.lba_high = high;
    }
}

/// Bus-level behaviour requested from the PHY at reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhyConfig {
    /// Answer register reads for device 0
    pub enable_dev0: bool,
    /// Answer register reads for device 1
    pub enable_dev1: bool,
    /// Answer register reads for an absent device 1 with zeros
    pub enable_dev1_zeros: bool,
    /// Automatically receive the CDB after PACKET on device 0
    pub atapi_dev0: bool,
    /// Automatically receive the CDB after PACKET on device 1
    pub atapi_dev1: bool,
    pub disable_iordy: bool,
    /// Assert INTRQ between PACKET and the command transfer
    pub enable_packet_intrq: bool,
}

/// What the PHY implementation can do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhyCapabilities {
    /// Largest DRQ block in bytes
    pub max_blocksize: usize,
    pub supports_iordy: bool,
    pub max_pio_mode: u8,
    /// Minimum PIO cycle time in ns without IORDY
    pub min_pio_cycletime_no_iordy: u16,
    /// Minimum PIO cycle time in ns with IORDY
    pub min_pio_cycletime_with_iordy: u16,
    /// Highest UDMA mode, `None` if UDMA is not supported
    pub max_udma_mode: Option<u8>,
}

impl Default for PhyCapabilities {
    fn default() -> Self {
        Self {
            max_blocksize: 4096,
            supports_iordy: true,
            max_pio_mode: 3,
            min_pio_cycletime_no_iordy: 240,
            min_pio_cycletime_with_iordy: 180,
            max_udma_mode: None,
        }
    }
}

/// Transfer mode requested through SET FEATURES 0x03
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    PioDefault,
    Pio(u8),
    Udma(u8),
}

impl TransferMode {
    /// Decode the sector count value of SET FEATURES 0x03
    ///
    /// The upper five bits select the mode family, the lower three the mode.
    /// Returns `None` for families the engine does not implement.
    pub fn from_register(value: u8) -> Option<Self> {
        let (major, minor) = (value >> 3, value & 7);
        match major {
            0 => Some(TransferMode::PioDefault),
            1 => Some(TransferMode::Pio(minor)),
            8 => Some(TransferMode::Udma(minor)),
            _ => None,
        }
    }

    /// UDMA mode to record after switching to this mode
    pub fn udma(self) -> Option<u8> {
        match self {
            TransferMode::Udma(mode) => Some(mode),
            _ => None,
        }
    }
}

impl PhyCapabilities {
    /// True when the PHY can run `mode`
    pub fn supports(&self, mode: TransferMode) -> bool {
        match mode {
            TransferMode::PioDefault => true,
            TransferMode::Pio(n) => n <= self.max_pio_mode,
            TransferMode::Udma(n) => self.max_udma_mode.is_some_and(|max| n <= max),
        }
    }
}

/// Execute SET FEATURES for either device family
///
/// Updates `udma_mode` on a successful transfer mode change.
///
/// # Returns
///
/// `true` when the feature was accepted, `false` when it must be aborted
pub fn apply_set_features(
    caps: &PhyCapabilities,
    regs: &Registers,
    udma_mode: &mut Option<u8>,
) -> bool {
    match regs.feature {
        set_feature::TRANSFER_MODE => match TransferMode::from_register(regs.sector_count) {
            Some(mode) if caps.supports(mode) => {
                log::debug!("Set transfer mode {:?}", mode);
                *udma_mode = mode.udma();
                true
            }
            _ => {
                log::debug!("Unsupported transfer mode {:#04x}", regs.sector_count);
                false
            }
        },
        set_feature::DISABLE_REVERT_TO_POWERON => {
            log::debug!("Disable revert to power-on defaults");
            true
        }
        set_feature::ENABLE_REVERT_TO_POWERON => {
            log::debug!("Enable revert to power-on defaults");
            true
        }
        other => {
            log::debug!("Unknown SET FEATURES subcommand {:#04x}", other);
            false
        }
    }
}

bitflags! {
    /// Diagnostic signals driven by the device
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Signals: u8 {
        const DASP = 0x01;
        const PDIAG = 0x02;
    }
}

/// Platform-independent IDE physical layer
///
/// Every method is non-blocking. Waiting is done by the caller through
/// [`crate::core::timing::wait_for`], which calls [`Phy::platform_poll`]
/// between checks so the rest of the firmware keeps running.
pub trait Phy {
    /// Reset the PHY and apply bus configuration
    fn reset(&mut self, config: &PhyConfig);

    /// Poll for the next event, [`PhyEvent::None`] if nothing happened
    fn get_events(&mut self) -> PhyEvent;

    /// True when the host issued a reset or new command that should abort
    /// the command currently executing
    fn is_command_interrupted(&mut self) -> bool;

    fn get_regs(&self) -> Registers;

    fn set_regs(&mut self, regs: &Registers);

    /// Prepare a device to host transfer of `blocksize` byte blocks
    fn start_write(&mut self, blocksize: usize, udma_mode: Option<u8>);

    fn can_write_block(&mut self) -> bool;

    /// Queue one block; sets DEVRDY|DATAREQ and asserts the interrupt
    fn write_block(&mut self, data: &[u8]);

    fn is_write_finished(&mut self) -> bool;

    /// Prepare a host to device transfer of `blocksize` byte blocks
    fn start_read(&mut self, blocksize: usize, udma_mode: Option<u8>);

    fn can_read_block(&mut self) -> bool;

    /// Fetch one received block. With `continue_transfer` the PHY
    /// immediately requests the next block from the host.
    fn read_block(&mut self, buf: &mut [u8], continue_transfer: bool);

    /// Stop running transfers, returning UDMA CRC errors seen since start
    fn stop_transfers(&mut self) -> u32;

    /// Set the status register and assert INTRQ
    fn assert_irq(&mut self, status: Status);

    fn set_signals(&mut self, signals: Signals);

    fn capabilities(&self) -> PhyCapabilities;

    /// Re-entrant hook run while waiting, lets timers and queues progress
    fn platform_poll(&mut self) {}
}
