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

//! Image abstraction
//!
//! An image is the storage behind an emulated device: a disk image file, a
//! CD-ROM track file or a cartridge dump. Data moves through a push-style
//! callback so the image implementation controls buffering while the device
//! controls the bus:
//!
//! - [`Image::read`] hands blocks to [`ImageCallback::read_callback`] as they
//!   arrive from storage. The callback reports how many it consumed.
//! - [`Image::write`] asks [`ImageCallback::write_callback`] to fill buffer
//!   space with blocks received from the host, then flushes them.

use std::path::Path;

use crate::core::error::Result;

mod create;
mod file;

pub use create::{create_image, parse_size};
pub use file::ImageFile;

/// Drive type associated with an image file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriveType {
    #[default]
    Unknown,
    Cdrom,
    Zip100,
    Zip250,
    Removable,
    Rigid,
}

impl DriveType {
    /// Guess the drive type from a file name
    ///
    /// Recognized prefixes are `cdrm`, `zipd`/`zip1`, `zip2`, `remv` and
    /// `hddr`; otherwise CD image extensions (`.iso`, `.bin`, `.cue`) select
    /// CD-ROM.
    pub fn from_filename(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.starts_with("cdrm") {
            DriveType::Cdrom
        } else if lower.starts_with("zip2") {
            DriveType::Zip250
        } else if lower.starts_with("zipd") || lower.starts_with("zip1") {
            DriveType::Zip100
        } else if lower.starts_with("remv") {
            DriveType::Removable
        } else if lower.starts_with("hddr") {
            DriveType::Rigid
        } else if lower.ends_with(".iso") || lower.ends_with(".bin") || lower.ends_with(".cue") {
            DriveType::Cdrom
        } else {
            DriveType::Unknown
        }
    }
}

/// Receiver of streamed image data
pub trait ImageCallback {
    /// Blocks read from storage are ready
    ///
    /// # Arguments
    ///
    /// * `data` - `num_blocks * blocksize` contiguous bytes
    /// * `blocksize` - Size of one block
    /// * `num_blocks` - Blocks offered
    ///
    /// # Returns
    ///
    /// Number of blocks consumed, `0..=num_blocks`. Unconsumed blocks are
    /// offered again on the next call.
    fn read_callback(&mut self, data: &[u8], blocksize: usize, num_blocks: usize)
        -> Result<usize>;

    /// Buffer space is available for blocks to be written to storage
    ///
    /// # Returns
    ///
    /// Number of blocks placed into `data`, `0..=num_blocks`
    fn write_callback(
        &mut self,
        data: &mut [u8],
        blocksize: usize,
        num_blocks: usize,
    ) -> Result<usize>;

    /// Re-entrant platform hook, run once per streaming iteration
    fn poll(&mut self) {}
}

/// Block storage bound to an emulated device
pub trait Image {
    /// File name (without directory) for logging and serial numbers
    fn filename(&self) -> &str;

    /// Full path of the backing file
    fn path(&self) -> &Path;

    /// Size in bytes
    fn capacity(&self) -> u64;

    fn writable(&self) -> bool;

    fn drive_type(&self) -> DriveType;

    /// Stream `num_blocks` blocks starting at byte `startpos` to `callback`
    fn read(
        &mut self,
        startpos: u64,
        blocksize: usize,
        num_blocks: usize,
        callback: &mut dyn ImageCallback,
    ) -> Result<()>;

    /// Stream `num_blocks` blocks from `callback` to byte `startpos`
    fn write(
        &mut self,
        startpos: u64,
        blocksize: usize,
        num_blocks: usize,
        callback: &mut dyn ImageCallback,
    ) -> Result<()>;
}

impl std::fmt::Debug for dyn Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("filename", &self.filename())
            .field("capacity", &self.capacity())
            .field("writable", &self.writable())
            .finish()
    }
}
