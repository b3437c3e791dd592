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

//! ATA data phases for rigid disks
//!
//! Unlike the packet interface there is no byte count to announce: the
//! host reads sector sized DRQ blocks until the command's sector count is
//! exhausted. Blocks larger than the PHY maximum are sent in pieces.
//!
//! Reads from the image use a fast path once a transfer is running:
//! blocks are queued for as long as the PHY has room and control returns
//! to the image streamer, which keeps filling its ring buffer meanwhile.

use std::time::Duration;

use crate::core::constants::Status;
use crate::core::error::{IdeError, Result, TransferError};
use crate::core::image::ImageCallback;
use crate::core::phy::{Phy, PhyCapabilities};
use crate::core::timing::{wait_for, Deadline};
use crate::core::utils::HexBytes;

/// Data phase of the command currently executing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AtaDataState {
    #[default]
    Idle,
    /// Host to device transfer in progress
    Reading { blocksize: usize },
    /// Device to host transfer in progress
    Writing { blocksize: usize },
}

/// Transfer bookkeeping of a rigid disk
#[derive(Debug, Clone)]
pub struct AtaTransfer {
    pub state: AtaDataState,

    /// Negotiated UDMA mode, `None` while in PIO
    pub udma_mode: Option<u8>,

    /// Current command is READ/WRITE DMA
    pub dma_requested: bool,

    /// UDMA CRC errors seen during the current command
    pub crc_errors: u32,

    caps: PhyCapabilities,
    timeout: Duration,
    check_interrupt: bool,

    /// Set while the fast path finds the PHY full
    stalled_since: Option<Deadline>,
}

impl AtaTransfer {
    pub fn new(timeout: Duration, check_interrupt: bool) -> Self {
        Self {
            state: AtaDataState::Idle,
            udma_mode: None,
            dma_requested: false,
            crc_errors: 0,
            caps: PhyCapabilities::default(),
            timeout,
            check_interrupt,
            stalled_since: None,
        }
    }

    pub fn set_capabilities(&mut self, caps: PhyCapabilities) {
        self.caps = caps;
    }

    pub fn capabilities(&self) -> &PhyCapabilities {
        &self.caps
    }

    /// Prepare for a new sector command
    pub fn begin(&mut self, dma: bool) {
        self.state = AtaDataState::Idle;
        self.dma_requested = dma;
        self.crc_errors = 0;
        self.stalled_since = None;
    }

    /// Forget transfer state after a bus reset
    pub fn reset(&mut self, hard: bool) {
        self.state = AtaDataState::Idle;
        self.dma_requested = false;
        self.stalled_since = None;
        if hard {
            self.udma_mode = None;
        }
    }

    fn transfer_mode(&self) -> Option<u8> {
        if self.dma_requested {
            self.udma_mode
        } else {
            None
        }
    }

    fn wait(
        &self,
        phy: &mut dyn Phy,
        operation: &'static str,
        ready: impl FnMut(&mut dyn Phy) -> bool,
    ) -> std::result::Result<(), TransferError> {
        wait_for(phy, self.timeout, self.check_interrupt, operation, ready)
    }

    /// Offer `num_blocks` blocks to the host
    ///
    /// # Returns
    ///
    /// Number of blocks queued in the PHY. May be less than offered (even
    /// zero) on the fast path; the caller offers the rest again.
    pub fn send_data(
        &mut self,
        phy: &mut dyn Phy,
        data: &[u8],
        blocksize: usize,
        num_blocks: usize,
    ) -> std::result::Result<usize, TransferError> {
        if self.state == (AtaDataState::Writing { blocksize }) {
            return self.send_queued(phy, data, blocksize, num_blocks);
        }

        if blocksize > self.caps.max_blocksize {
            log::debug!(
                "Block size {} exceeds PHY limit {}, sending in pieces",
                blocksize,
                self.caps.max_blocksize
            );
            self.send_chunked(phy, data, blocksize, num_blocks)?;
            return Ok(num_blocks);
        }

        self.send_block(phy, &data[..blocksize])?;
        Ok(1)
    }

    /// Queue blocks of an already running transfer while the PHY has room
    fn send_queued(
        &mut self,
        phy: &mut dyn Phy,
        data: &[u8],
        blocksize: usize,
        num_blocks: usize,
    ) -> std::result::Result<usize, TransferError> {
        let mut sent = 0;
        for block in data.chunks(blocksize).take(num_blocks) {
            if !phy.can_write_block() {
                break;
            }
            phy.write_block(block);
            sent += 1;
        }

        if sent > 0 {
            self.stalled_since = None;
            return Ok(sent);
        }

        if self.check_interrupt && phy.is_command_interrupted() {
            log::debug!("Read interrupted by host");
            return Err(TransferError::Interrupted);
        }
        let stalled = *self
            .stalled_since
            .get_or_insert_with(|| Deadline::new(self.timeout));
        if stalled.expired() {
            log::warn!("Timeout waiting for PHY write buffer ({} ms)", stalled.elapsed_ms());
            return Err(TransferError::Timeout {
                operation: "waiting for PHY write buffer",
                elapsed_ms: stalled.elapsed_ms(),
            });
        }
        Ok(0)
    }

    /// Send whole blocks split into PHY sized pieces, then wait for the host
    fn send_chunked(
        &mut self,
        phy: &mut dyn Phy,
        data: &[u8],
        blocksize: usize,
        num_blocks: usize,
    ) -> std::result::Result<(), TransferError> {
        let (piece_size, _) = equal_parts(blocksize, self.caps.max_blocksize)?;
        for block in data.chunks(blocksize).take(num_blocks) {
            for piece in block.chunks(piece_size) {
                self.send_block(phy, piece)?;
            }
        }
        self.send_wait_finish(phy)
    }

    /// Send one block, (re)starting the PHY transfer when its size changes
    fn send_block(&mut self, phy: &mut dyn Phy, block: &[u8]) -> std::result::Result<(), TransferError> {
        let blocksize = block.len();
        if self.state != (AtaDataState::Writing { blocksize }) {
            self.send_wait_finish(phy)?;
            let mut regs = phy.get_regs();
            regs.status = Status::BSY.bits();
            phy.set_regs(&regs);
            phy.start_write(blocksize, self.transfer_mode());
            self.state = AtaDataState::Writing { blocksize };
        } else {
            self.wait(phy, "waiting for PHY write buffer", |p| p.can_write_block())?;
        }
        phy.write_block(block);
        Ok(())
    }

    /// Send a complete response such as IDENTIFY data and wait for the host
    pub fn send_all(
        &mut self,
        phy: &mut dyn Phy,
        data: &[u8],
    ) -> std::result::Result<(), TransferError> {
        log::trace!("ATA send {} bytes: {}", data.len(), HexBytes(data));
        let result = self.send_chunked(phy, data, data.len(), 1);
        if result.is_err() {
            self.abort(phy);
        }
        result
    }

    /// Wait until the host has drained every block sent
    pub fn send_wait_finish(&mut self, phy: &mut dyn Phy) -> std::result::Result<(), TransferError> {
        if !matches!(self.state, AtaDataState::Writing { .. }) {
            return Ok(());
        }
        self.wait(phy, "waiting for host to read data", |p| p.is_write_finished())?;
        self.state = AtaDataState::Idle;
        Ok(())
    }

    /// Receive `num_blocks` blocks of `blocksize` bytes into `buf`
    ///
    /// Blocks larger than the PHY maximum are split into equal parts.
    pub fn recv_data(
        &mut self,
        phy: &mut dyn Phy,
        buf: &mut [u8],
        blocksize: usize,
        num_blocks: usize,
    ) -> std::result::Result<(), TransferError> {
        let (blocksize, num_blocks) = match equal_parts(blocksize, self.caps.max_blocksize) {
            Ok((piece_size, parts)) => (piece_size, num_blocks * parts),
            Err(err) => {
                self.abort(phy);
                return Err(err);
            }
        };

        let mut regs = phy.get_regs();
        regs.status = Status::BSY.bits();
        phy.set_regs(&regs);
        phy.start_read(blocksize, self.transfer_mode());
        self.state = AtaDataState::Reading { blocksize };

        for (i, block) in buf.chunks_mut(blocksize).take(num_blocks).enumerate() {
            if let Err(err) = self.wait(phy, "waiting for host data", |p| p.can_read_block()) {
                log::debug!("Receive stopped at block {}/{}", i + 1, num_blocks);
                self.abort(phy);
                return Err(err);
            }
            phy.read_block(block, i + 1 < num_blocks);
        }

        self.abort(phy);
        Ok(())
    }

    /// Stop whatever transfer is in flight
    pub fn abort(&mut self, phy: &mut dyn Phy) {
        let crc = phy.stop_transfers();
        if crc > 0 {
            log::warn!("UDMA transfer reported {} CRC errors", crc);
            self.crc_errors += crc;
        }
        self.state = AtaDataState::Idle;
    }
}

/// Split `blocksize` into the fewest equal pieces no larger than `max`
///
/// Returns the piece size and the number of pieces per block.
pub fn equal_parts(blocksize: usize, max: usize) -> std::result::Result<(usize, usize), TransferError> {
    let max = max.max(1);
    if blocksize <= max {
        return Ok((blocksize, 1));
    }
    (blocksize.div_ceil(max)..=blocksize)
        .find(|parts| blocksize % parts == 0)
        .map(|parts| (blocksize / parts, parts))
        .ok_or(TransferError::BlockSplit {
            blocksize,
            limit: max,
        })
}

/// Streams image sectors to the host
pub struct SectorSender<'a> {
    pub xfer: &'a mut AtaTransfer,
    pub phy: &'a mut dyn Phy,
}

impl ImageCallback for SectorSender<'_> {
    fn read_callback(&mut self, data: &[u8], blocksize: usize, num_blocks: usize) -> Result<usize> {
        self.phy.platform_poll();
        Ok(self.xfer.send_data(self.phy, data, blocksize, num_blocks)?)
    }

    fn write_callback(&mut self, _data: &mut [u8], _blocksize: usize, _num_blocks: usize) -> Result<usize> {
        Err(IdeError::ReadOnly("send callback cannot receive".to_string()))
    }

    fn poll(&mut self) {
        self.phy.platform_poll();
    }
}

/// Receives sectors from the host for the image
pub struct SectorReceiver<'a> {
    pub xfer: &'a mut AtaTransfer,
    pub phy: &'a mut dyn Phy,
}

impl ImageCallback for SectorReceiver<'_> {
    fn read_callback(&mut self, _data: &[u8], _blocksize: usize, _num_blocks: usize) -> Result<usize> {
        Err(IdeError::ReadOnly("receive callback cannot send".to_string()))
    }

    fn write_callback(&mut self, data: &mut [u8], blocksize: usize, num_blocks: usize) -> Result<usize> {
        let len = blocksize * num_blocks;
        if let Err(err) = self.xfer.recv_data(self.phy, &mut data[..len], blocksize, num_blocks) {
            log::warn!("Receiving {}x{} bytes failed: {}", num_blocks, blocksize, err);
            return Err(err.into());
        }
        Ok(num_blocks)
    }

    fn poll(&mut self) {
        self.phy.platform_poll();
    }
}
