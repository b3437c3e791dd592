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

//! File-backed streaming engine
//!
//! Storage reads and bus transfers overlap through a ring buffer of
//! `bufsize_blocks` slots. Two monotonic counters track progress:
//!
//! | Counter            | Read direction                | Write direction                  |
//! |--------------------|-------------------------------|----------------------------------|
//! | `blocks_available` | blocks read from the file     | blocks received from callback    |
//! | `blocks_done`      | blocks consumed by callback   | blocks flushed to the file       |
//!
//! Slot index is `counter % bufsize_blocks`. A slot is refilled only after
//! the block in it has been consumed, i.e. `blocks_available` never runs
//! more than `bufsize_blocks` ahead of `blocks_done`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{DriveType, Image, ImageCallback};
use crate::core::config::DEFAULT_BUFFER_SIZE;
use crate::core::error::{IdeError, Result};

/// Image stored in a regular file
#[derive(Debug)]
pub struct ImageFile {
    file: File,
    path: PathBuf,
    filename: String,
    capacity: u64,
    read_only: bool,
    drive_type: DriveType,
    buffer: Vec<u8>,
}

impl ImageFile {
    /// Open an image file
    ///
    /// Files without write permission are opened read-only regardless of
    /// `read_only`.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the image
    /// * `read_only` - Refuse writes even if the file is writable
    pub fn open(path: impl AsRef<Path>, read_only: bool) -> Result<Self> {
        Self::open_with_buffer(path, read_only, DEFAULT_BUFFER_SIZE)
    }

    /// Open an image file with a specific streaming buffer size
    pub fn open_with_buffer(
        path: impl AsRef<Path>,
        read_only: bool,
        buffer_size: usize,
    ) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        let read_only = read_only || metadata.permissions().readonly();

        let file = if read_only {
            File::open(path)?
        } else {
            OpenOptions::new().read(true).write(true).open(path)?
        };

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let drive_type = DriveType::from_filename(&filename);

        log::info!(
            "Opened image {} ({} bytes{}, type {:?})",
            path.display(),
            metadata.len(),
            if read_only { ", read-only" } else { "" },
            drive_type
        );

        Ok(Self {
            file,
            path: path.to_path_buf(),
            filename,
            capacity: metadata.len(),
            read_only,
            drive_type,
            buffer: vec![0; buffer_size.max(1)],
        })
    }

    /// Override the drive type guessed from the file name
    pub fn with_drive_type(mut self, drive_type: DriveType) -> Self {
        self.drive_type = drive_type;
        self
    }

    /// Number of ring slots for `blocksize`, growing the buffer to hold at
    /// least one block
    fn ring_slots(&mut self, blocksize: usize) -> usize {
        if self.buffer.len() < blocksize {
            log::debug!(
                "Growing stream buffer from {} to {} bytes",
                self.buffer.len(),
                blocksize
            );
            self.buffer.resize(blocksize, 0);
        }
        self.buffer.len() / blocksize
    }

    fn check_range(&self, startpos: u64, blocksize: usize, num_blocks: usize) -> Result<()> {
        let len = (blocksize as u64) * (num_blocks as u64);
        if startpos.saturating_add(len) > self.capacity {
            return Err(IdeError::PastEnd {
                offset: startpos,
                len,
                size: self.capacity,
            });
        }
        Ok(())
    }
}

impl Image for ImageFile {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn writable(&self) -> bool {
        !self.read_only
    }

    fn drive_type(&self) -> DriveType {
        self.drive_type
    }

    fn read(
        &mut self,
        startpos: u64,
        blocksize: usize,
        num_blocks: usize,
        callback: &mut dyn ImageCallback,
    ) -> Result<()> {
        if num_blocks == 0 || blocksize == 0 {
            return Ok(());
        }
        self.check_range(startpos, blocksize, num_blocks)?;
        let slots = self.ring_slots(blocksize);
        self.file.seek(SeekFrom::Start(startpos))?;

        log::trace!(
            "Image read {} x {} bytes at {} ({} slots)",
            num_blocks,
            blocksize,
            startpos,
            slots
        );

        let mut blocks_available = 0usize;
        let mut blocks_done = 0usize;

        while blocks_done < num_blocks {
            callback.poll();

            // Fill free slots up to the wrap point
            if blocks_available < num_blocks && blocks_available < blocks_done + slots {
                let start_idx = blocks_available % slots;
                let count = (num_blocks - blocks_available)
                    .min(blocks_done + slots - blocks_available)
                    .min(slots - start_idx);
                let range = start_idx * blocksize..(start_idx + count) * blocksize;
                let offset = startpos + (blocks_available * blocksize) as u64;

                if let Err(e) = self.file.read_exact(&mut self.buffer[range]) {
                    log::warn!("Image read failed at byte {}: {}", offset, e);
                    return Err(e.into());
                }
                blocks_available += count;
            }

            // Offer the contiguous run of unconsumed blocks
            if blocks_available > blocks_done {
                let start_idx = blocks_done % slots;
                let count = (blocks_available - blocks_done).min(slots - start_idx);
                let range = start_idx * blocksize..(start_idx + count) * blocksize;

                let consumed = callback.read_callback(&self.buffer[range], blocksize, count)?;
                if consumed > count {
                    return Err(IdeError::CallbackOverrun {
                        offered: count,
                        handled: consumed,
                    });
                }
                blocks_done += consumed;
            }
        }

        Ok(())
    }

    fn write(
        &mut self,
        startpos: u64,
        blocksize: usize,
        num_blocks: usize,
        callback: &mut dyn ImageCallback,
    ) -> Result<()> {
        if self.read_only {
            return Err(IdeError::ReadOnly(self.filename.clone()));
        }
        if num_blocks == 0 || blocksize == 0 {
            return Ok(());
        }
        self.check_range(startpos, blocksize, num_blocks)?;
        let slots = self.ring_slots(blocksize);
        self.file.seek(SeekFrom::Start(startpos))?;

        log::trace!(
            "Image write {} x {} bytes at {} ({} slots)",
            num_blocks,
            blocksize,
            startpos,
            slots
        );

        let mut blocks_available = 0usize;
        let mut blocks_done = 0usize;

        while blocks_done < num_blocks {
            callback.poll();

            // Let the callback fill free slots
            if blocks_available < num_blocks && blocks_available < blocks_done + slots {
                let start_idx = blocks_available % slots;
                let count = (num_blocks - blocks_available)
                    .min(blocks_done + slots - blocks_available)
                    .min(slots - start_idx);
                let range = start_idx * blocksize..(start_idx + count) * blocksize;

                let received = callback.write_callback(&mut self.buffer[range], blocksize, count)?;
                if received > count {
                    return Err(IdeError::CallbackOverrun {
                        offered: count,
                        handled: received,
                    });
                }
                blocks_available += received;
            }

            // Flush received blocks up to the wrap point
            if blocks_available > blocks_done {
                let start_idx = blocks_done % slots;
                let count = (blocks_available - blocks_done).min(slots - start_idx);
                let range = start_idx * blocksize..(start_idx + count) * blocksize;
                let offset = startpos + (blocks_done * blocksize) as u64;

                if let Err(e) = self.file.write_all(&self.buffer[range]) {
                    log::warn!("Image write failed at byte {}: {}", offset, e);
                    return Err(e.into());
                }
                blocks_done += count;
            }
        }

        self.file.flush()?;
        Ok(())
    }
}
