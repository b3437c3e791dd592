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

//! Scripted in-memory PHY
//!
//! `MockPhy` plays the host side of the bus without hardware. Commands and
//! outgoing data are queued up front; everything the device sends back
//! (data blocks, interrupts, register updates) is recorded for inspection.
//! The simulator in the `zuluide` binary and the test suites both drive the
//! engine through it.

use std::collections::VecDeque;

use super::{Phy, PhyCapabilities, PhyConfig, PhyEvent, Registers, Signals};
use crate::core::constants::{ide_cmd, Status};

/// In-memory PHY driven by a scripted host
#[derive(Debug, Default)]
pub struct MockPhy {
    regs: Registers,
    caps: PhyCapabilities,
    config: PhyConfig,
    events: VecDeque<PhyEvent>,

    /// Bytes the host will write to the data register
    host_data: VecDeque<u8>,

    /// Active device to host transfer block size
    write_blocksize: Option<usize>,

    /// Active host to device transfer block size
    read_blocksize: Option<usize>,

    sent_blocks: Vec<Vec<u8>>,
    write_starts: Vec<(usize, Option<u8>)>,
    read_starts: Vec<(usize, Option<u8>)>,
    irqs: Vec<Status>,
    signals: Signals,

    interrupted: bool,
    stall_writes: bool,
    pending_crc_errors: u32,
    resets: usize,
    polls: usize,
}

impl MockPhy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock PHY advertising the given capabilities
    pub fn with_capabilities(caps: PhyCapabilities) -> Self {
        Self {
            caps,
            ..Self::default()
        }
    }

    pub fn set_capabilities(&mut self, caps: PhyCapabilities) {
        self.caps = caps;
    }

    /// Queue a raw event
    pub fn push_event(&mut self, event: PhyEvent) {
        self.events.push_back(event);
    }

    /// Load the task file and raise a command event
    pub fn issue_command(&mut self, regs: Registers) {
        self.regs = regs;
        self.regs.status = Status::BSY.bits();
        self.events.push_back(PhyEvent::Cmd);
    }

    /// Issue PACKET to `device` and queue the 12-byte CDB
    ///
    /// # Arguments
    ///
    /// * `device` - Device register value (DEV bit selects drive 1)
    /// * `cdb` - Packet command descriptor block
    /// * `byte_limit` - Byte count limit placed in the cylinder registers
    pub fn issue_packet(&mut self, device: u8, cdb: &[u8; 12], byte_limit: u16) {
        let mut regs = Registers {
            command: ide_cmd::PACKET,
            device,
            ..Registers::default()
        };
        regs.set_byte_count(byte_limit);
        self.issue_command(regs);
        self.host_data.extend(cdb.iter().copied());

        let auto_receive = if regs.selected_device() == 0 {
            self.config.atapi_dev0
        } else {
            self.config.atapi_dev1
        };
        if auto_receive {
            self.read_blocksize = Some(12);
        }
    }

    /// Queue data the host writes during a later data-out phase
    pub fn queue_host_data(&mut self, data: &[u8]) {
        self.host_data.extend(data.iter().copied());
    }

    /// Current register file
    pub fn regs(&self) -> &Registers {
        &self.regs
    }

    pub fn regs_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    /// All blocks written by the device, in order
    pub fn sent_blocks(&self) -> &[Vec<u8>] {
        &self.sent_blocks
    }

    /// Drain everything the device sent as one byte vector
    pub fn take_sent(&mut self) -> Vec<u8> {
        self.sent_blocks.drain(..).flatten().collect()
    }

    pub fn write_starts(&self) -> &[(usize, Option<u8>)] {
        &self.write_starts
    }

    pub fn read_starts(&self) -> &[(usize, Option<u8>)] {
        &self.read_starts
    }

    pub fn irqs(&self) -> &[Status] {
        &self.irqs
    }

    pub fn last_irq(&self) -> Option<Status> {
        self.irqs.last().copied()
    }

    pub fn clear_irqs(&mut self) {
        self.irqs.clear();
    }

    pub fn signals(&self) -> Signals {
        self.signals
    }

    pub fn config(&self) -> &PhyConfig {
        &self.config
    }

    pub fn reset_count(&self) -> usize {
        self.resets
    }

    pub fn poll_count(&self) -> usize {
        self.polls
    }

    pub fn pending_host_bytes(&self) -> usize {
        self.host_data.len()
    }

    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Make the host look like it abandoned the current command
    pub fn set_interrupted(&mut self, interrupted: bool) {
        self.interrupted = interrupted;
    }

    /// Stop the host from draining written blocks
    pub fn set_stall_writes(&mut self, stall: bool) {
        self.stall_writes = stall;
    }

    /// Report UDMA CRC errors on the next `stop_transfers`
    pub fn inject_crc_errors(&mut self, count: u32) {
        self.pending_crc_errors = count;
    }
}

impl Phy for MockPhy {
    fn reset(&mut self, config: &PhyConfig) {
        self.config = *config;
        self.write_blocksize = None;
        self.read_blocksize = None;
        self.resets += 1;
    }

    fn get_events(&mut self) -> PhyEvent {
        self.events.pop_front().unwrap_or_default()
    }

    fn is_command_interrupted(&mut self) -> bool {
        self.interrupted
            || self
                .events
                .iter()
                .any(|e| matches!(e, PhyEvent::HwRst | PhyEvent::SwRst))
    }

    fn get_regs(&self) -> Registers {
        self.regs
    }

    fn set_regs(&mut self, regs: &Registers) {
        self.regs = *regs;
    }

    fn start_write(&mut self, blocksize: usize, udma_mode: Option<u8>) {
        self.write_blocksize = Some(blocksize);
        self.write_starts.push((blocksize, udma_mode));
    }

    fn can_write_block(&mut self) -> bool {
        self.write_blocksize.is_some() && !self.stall_writes
    }

    fn write_block(&mut self, data: &[u8]) {
        log::trace!("MockPhy: device sent {} bytes", data.len());
        self.sent_blocks.push(data.to_vec());
        self.regs.status = (Status::DEVRDY | Status::DATAREQ).bits();
    }

    fn is_write_finished(&mut self) -> bool {
        !self.stall_writes
    }

    fn start_read(&mut self, blocksize: usize, udma_mode: Option<u8>) {
        self.read_blocksize = Some(blocksize);
        self.read_starts.push((blocksize, udma_mode));
    }

    fn can_read_block(&mut self) -> bool {
        match self.read_blocksize {
            Some(size) => self.host_data.len() >= size,
            None => false,
        }
    }

    fn read_block(&mut self, buf: &mut [u8], continue_transfer: bool) {
        for byte in buf.iter_mut() {
            *byte = self.host_data.pop_front().unwrap_or(0);
        }
        if !continue_transfer {
            self.read_blocksize = None;
        }
    }

    fn stop_transfers(&mut self) -> u32 {
        self.write_blocksize = None;
        self.read_blocksize = None;
        std::mem::take(&mut self.pending_crc_errors)
    }

    fn assert_irq(&mut self, status: Status) {
        self.regs.status = status.bits();
        self.irqs.push(status);
    }

    fn set_signals(&mut self, signals: Signals) {
        self.signals = signals;
    }

    fn capabilities(&self) -> PhyCapabilities {
        self.caps
    }

    fn platform_poll(&mut self) {
        self.polls += 1;
    }
}
