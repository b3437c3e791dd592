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

//! Packet device data phases
//!
//! ATAPI moves data in DRQ blocks whose size is announced in the cylinder
//! (byte count) registers. A block may not exceed either the PHY block size
//! or the byte count limit the host placed in the cylinder registers when it
//! issued PACKET, so large sectors are split into equal sub-blocks.
//!
//! The PHY is reconfigured only when direction or block size changes; a run
//! of equal blocks (e.g. consecutive 2048-byte sectors) streams without
//! re-announcing the byte count.

use std::time::Duration;

use crate::core::constants::{InterruptReason, Status};
use crate::core::error::TransferError;
use crate::core::phy::{Phy, PhyCapabilities};
use crate::core::timing::wait_for;

/// Data phase of the command currently executing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataState {
    #[default]
    Idle,
    /// Waiting for the 12-byte command packet
    ReadingCommand,
    /// Host to device transfer in progress
    Reading { blocksize: usize },
    /// Device to host transfer in progress
    Writing { blocksize: usize },
}

/// Largest byte count the cylinder registers can carry, kept even
const MAX_BYTE_COUNT: usize = 0xFFFE;

/// Split `blocksize` into the fewest equal sub-blocks no larger than `limit`
///
/// Sub-blocks are kept even so every DRQ block is whole 16-bit words.
///
/// # Returns
///
/// `(sub_blocksize, parts)`
pub fn split_block(blocksize: usize, limit: usize) -> Result<(usize, usize), TransferError> {
    if blocksize <= limit {
        return Ok((blocksize, 1));
    }

    let mut parts = blocksize.div_ceil(limit.max(1)).max(2);
    while parts <= blocksize / 2 {
        if blocksize % parts == 0 {
            let sub = blocksize / parts;
            if sub <= limit && sub % 2 == 0 {
                return Ok((sub, parts));
            }
        }
        parts += 1;
    }

    Err(TransferError::BlockSplit { blocksize, limit })
}

/// Transfer bookkeeping of one packet device
#[derive(Debug, Clone)]
pub struct AtapiTransfer {
    pub state: DataState,

    /// Host byte count limit from PACKET, 0 when the host set none
    pub bytes_req: u16,

    /// Negotiated UDMA mode, `None` while in PIO
    pub udma_mode: Option<u8>,

    /// PACKET feature register asked for DMA
    pub dma_requested: bool,

    /// UDMA CRC errors accumulated from `stop_transfers`
    pub crc_errors: u32,

    /// PHY receives the command packet without being asked
    pub auto_receive: bool,

    caps: PhyCapabilities,
    timeout: Duration,
    check_interrupt: bool,
}

impl AtapiTransfer {
    pub fn new(timeout: Duration, check_interrupt: bool) -> Self {
        Self {
            state: DataState::Idle,
            bytes_req: 0,
            udma_mode: None,
            dma_requested: false,
            crc_errors: 0,
            auto_receive: false,
            caps: PhyCapabilities::default(),
            timeout,
            check_interrupt,
        }
    }

    pub fn set_capabilities(&mut self, caps: PhyCapabilities) {
        self.caps = caps;
    }

    pub fn capabilities(&self) -> &PhyCapabilities {
        &self.caps
    }

    /// Forget transfer state after a bus reset
    ///
    /// A hardware reset also returns the device to PIO.
    pub fn reset(&mut self, hard: bool) {
        self.state = DataState::Idle;
        self.bytes_req = 0;
        self.dma_requested = false;
        if hard {
            self.udma_mode = None;
        }
    }

    /// Mode passed to the PHY for the current command
    pub fn transfer_mode(&self) -> Option<u8> {
        if self.dma_requested {
            self.udma_mode
        } else {
            None
        }
    }

    /// Largest DRQ block allowed for the current command
    pub fn block_limit(&self) -> usize {
        let mut limit = self.caps.max_blocksize.min(MAX_BYTE_COUNT);
        if self.bytes_req > 1 && !self.dma_requested {
            limit = limit.min((self.bytes_req & !1) as usize);
        }
        limit
    }

    fn wait(
        &self,
        phy: &mut dyn Phy,
        operation: &'static str,
        ready: impl FnMut(&mut dyn Phy) -> bool,
    ) -> Result<(), TransferError> {
        wait_for(phy, self.timeout, self.check_interrupt, operation, ready)
    }

    /// Receive the 12-byte command packet after PACKET
    pub fn receive_command(&mut self, phy: &mut dyn Phy) -> Result<[u8; 12], TransferError> {
        self.state = DataState::ReadingCommand;

        if !self.auto_receive && !phy.can_read_block() {
            let mut regs = phy.get_regs();
            regs.status = Status::DEVRDY.bits();
            regs.sector_count = InterruptReason::IS_CMD.bits();
            phy.set_regs(&regs);
            phy.start_read(12, None);
        }

        let mut cmd = [0u8; 12];
        let result = self.wait(phy, "waiting for command packet", |p| p.can_read_block());
        if let Err(err) = result {
            self.abort(phy);
            return Err(err);
        }
        phy.read_block(&mut cmd, false);
        self.state = DataState::Idle;
        Ok(cmd)
    }

    /// Send `num_blocks` blocks of `blocksize` bytes to the host
    ///
    /// Returns once every block is queued in the PHY; call
    /// [`AtapiTransfer::send_wait_finish`] before reporting completion.
    pub fn send_data(
        &mut self,
        phy: &mut dyn Phy,
        data: &[u8],
        blocksize: usize,
        num_blocks: usize,
    ) -> Result<(), TransferError> {
        let (blocksize, num_blocks) = {
            let (sub, parts) = split_block(blocksize, self.block_limit())?;
            (sub, num_blocks * parts)
        };

        let result = self.send_blocks(phy, data, blocksize, num_blocks);
        if result.is_err() {
            self.abort(phy);
        }
        result
    }

    fn send_blocks(
        &mut self,
        phy: &mut dyn Phy,
        data: &[u8],
        blocksize: usize,
        num_blocks: usize,
    ) -> Result<(), TransferError> {
        for block in data.chunks(blocksize).take(num_blocks) {
            if self.state != (DataState::Writing { blocksize }) {
                if matches!(self.state, DataState::Writing { .. }) {
                    self.send_wait_finish(phy)?;
                }

                let mut regs = phy.get_regs();
                regs.status = Status::BSY.bits();
                regs.sector_count = InterruptReason::TO_HOST.bits();
                regs.set_byte_count(blocksize as u16);
                phy.set_regs(&regs);
                phy.start_write(blocksize, self.transfer_mode());
                self.state = DataState::Writing { blocksize };
            }

            self.wait(phy, "waiting for PHY write buffer", |p| p.can_write_block())?;
            phy.write_block(block);
        }
        Ok(())
    }

    /// Wait until the host has drained every block sent
    pub fn send_wait_finish(&mut self, phy: &mut dyn Phy) -> Result<(), TransferError> {
        if !matches!(self.state, DataState::Writing { .. }) {
            return Ok(());
        }

        let result = self.wait(phy, "waiting for host to read data", |p| {
            p.is_write_finished()
        });
        match result {
            Ok(()) => {
                self.state = DataState::Idle;
                Ok(())
            }
            Err(err) => {
                self.abort(phy);
                Err(err)
            }
        }
    }

    /// Receive one block from the host
    ///
    /// # Arguments
    ///
    /// * `buf` - Destination, exactly one block
    /// * `last` - No further block follows in this command
    pub fn recv_block(
        &mut self,
        phy: &mut dyn Phy,
        buf: &mut [u8],
        last: bool,
    ) -> Result<(), TransferError> {
        let blocksize = buf.len();
        if self.state != (DataState::Reading { blocksize }) {
            let mut regs = phy.get_regs();
            regs.status = Status::BSY.bits();
            regs.sector_count = 0;
            regs.set_byte_count(blocksize as u16);
            phy.set_regs(&regs);
            phy.start_read(blocksize, self.transfer_mode());
            self.state = DataState::Reading { blocksize };
        }

        if let Err(err) = self.wait(phy, "waiting for host data", |p| p.can_read_block()) {
            self.abort(phy);
            return Err(err);
        }
        phy.read_block(buf, !last);
        Ok(())
    }

    /// End a host to device transfer
    pub fn recv_finish(&mut self, phy: &mut dyn Phy) {
        if matches!(self.state, DataState::Reading { .. }) {
            self.abort(phy);
        }
    }

    /// Receive `num_blocks` blocks of `blocksize` bytes into `buf`
    pub fn recv_data(
        &mut self,
        phy: &mut dyn Phy,
        buf: &mut [u8],
        blocksize: usize,
        num_blocks: usize,
    ) -> Result<(), TransferError> {
        let (sub, parts) = split_block(blocksize, self.block_limit())?;
        let total = num_blocks * parts;

        for (i, block) in buf.chunks_mut(sub).take(total).enumerate() {
            self.recv_block(phy, block, i + 1 == total)?;
        }
        self.recv_finish(phy);
        Ok(())
    }

    /// Stop whatever transfer is in flight
    pub fn abort(&mut self, phy: &mut dyn Phy) {
        let crc = phy.stop_transfers();
        if crc > 0 {
            log::warn!("UDMA transfer reported {} CRC errors", crc);
            self.crc_errors += crc;
        }
        self.state = DataState::Idle;
    }
}
