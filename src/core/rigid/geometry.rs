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

//! Cylinder/head/sector geometry
//!
//! Hosts from before LBA addressing see a disk as cylinders x heads x
//! sectors per track. The native geometry is derived once from the image
//! size; INIT DEVICE PARAMETERS may later select a different working
//! geometry used for CHS translation.
//!
//! | Capacity               | Heads   | Cylinders |
//! |------------------------|---------|-----------|
//! | up to 528 MB           | 16 .. 1 | <= 1024   |
//! | up to 8 GB, with gap   | 16 .. 9 | <= 16383  |
//! | up to 8 GB             | 16 .. 5 | <= 16383  |
//! | larger                 | 16      | 16383     |

use crate::core::constants::{chs, device_reg};
use crate::core::phy::Registers;

/// Sector size of rigid disks
pub const SECTOR_SIZE: u64 = 512;

/// Largest LBA reachable through 28-bit task file addressing
pub const MAX_LBA28: u64 = 0x0FFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub cylinders: u16,
    pub heads: u8,
    pub sectors_per_track: u8,
}

impl Geometry {
    pub const fn new(cylinders: u16, heads: u8, sectors_per_track: u8) -> Self {
        Self {
            cylinders,
            heads,
            sectors_per_track,
        }
    }

    /// Sectors addressable through this geometry
    pub fn total_sectors(&self) -> u64 {
        self.cylinders as u64 * self.heads as u64 * self.sectors_per_track as u64
    }

    /// Native geometry of a disk with `total_sectors` sectors
    pub fn derive(total_sectors: u64) -> Self {
        let bytes = total_sectors * SECTOR_SIZE;
        let (min_heads, max_cylinders) = if bytes <= chs::LIMIT_528MB_BYTES {
            (1, 1024)
        } else if bytes <= chs::LIMIT_8GB_WITH_GAP_BYTES {
            (9, chs::MAX_CYLINDERS as u64)
        } else if bytes <= chs::LIMIT_8GB_BYTES {
            (5, chs::MAX_CYLINDERS as u64)
        } else {
            return Self::new(chs::MAX_CYLINDERS, chs::MAX_HEADS, chs::MAX_SECTORS_PER_TRACK);
        };

        for heads in (min_heads..=chs::MAX_HEADS as u64).rev() {
            for spt in (1..=chs::MAX_SECTORS_PER_TRACK as u64).rev() {
                let per_cylinder = heads * spt;
                if total_sectors % per_cylinder != 0 {
                    continue;
                }
                let cylinders = total_sectors / per_cylinder;
                if cylinders > 0 && cylinders <= max_cylinders {
                    return Self::new(cylinders as u16, heads as u8, spt as u8);
                }
            }
        }

        // Nothing divides evenly, round down to whole cylinders
        let per_cylinder = chs::MAX_HEADS as u64 * chs::MAX_SECTORS_PER_TRACK as u64;
        let cylinders = (total_sectors / per_cylinder).min(chs::MAX_CYLINDERS as u64);
        Self::new(cylinders as u16, chs::MAX_HEADS, chs::MAX_SECTORS_PER_TRACK)
    }

    /// Working geometry requested by INIT DEVICE PARAMETERS
    ///
    /// Returns `None` for zero sectors per track.
    pub fn working(total_sectors: u64, heads: u8, sectors_per_track: u8) -> Option<Self> {
        if heads == 0 || sectors_per_track == 0 {
            return None;
        }
        let reachable = total_sectors.min(chs::LEGACY_MAX_SECTORS);
        let cylinders = reachable / (heads as u64 * sectors_per_track as u64);
        Some(Self::new(
            cylinders.min(u16::MAX as u64) as u16,
            heads,
            sectors_per_track,
        ))
    }

    /// Linear address of a CHS triple, `None` if it lies outside the geometry
    pub fn chs_to_lba(&self, cylinder: u16, head: u8, sector: u8) -> Option<u64> {
        if sector == 0 || sector > self.sectors_per_track || head >= self.heads {
            return None;
        }
        let lba = (cylinder as u64 * self.heads as u64 + head as u64)
            * self.sectors_per_track as u64
            + (sector as u64 - 1);
        Some(lba)
    }

    /// CHS triple of a linear address
    pub fn lba_to_chs(&self, lba: u64) -> (u16, u8, u8) {
        let spt = self.sectors_per_track.max(1) as u64;
        let heads = self.heads.max(1) as u64;
        let sector = (lba % spt) + 1;
        let track = lba / spt;
        let cylinder = (track / heads).min(u16::MAX as u64);
        (cylinder as u16, (track % heads) as u8, sector as u8)
    }
}

impl std::fmt::Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.cylinders, self.heads, self.sectors_per_track
        )
    }
}

/// Starting address of a sector command, as written by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAddress {
    Lba(u32),
    Chs { cylinder: u16, head: u8, sector: u8 },
}

impl TaskAddress {
    /// Decode the address registers, the LBA bit selects the mode
    pub fn from_registers(regs: &Registers) -> Self {
        if regs.device & device_reg::LBA != 0 {
            let lba = ((regs.device & device_reg::HEAD_MASK) as u32) << 24
                | (regs.lba_high as u32) << 16
                | (regs.lba_mid as u32) << 8
                | regs.lba_low as u32;
            TaskAddress::Lba(lba)
        } else {
            TaskAddress::Chs {
                cylinder: u16::from_be_bytes([regs.lba_high, regs.lba_mid]),
                head: regs.device & device_reg::HEAD_MASK,
                sector: regs.lba_low,
            }
        }
    }

    pub fn is_lba(&self) -> bool {
        matches!(self, TaskAddress::Lba(_))
    }

    /// Linear address, translating CHS through `geometry`
    pub fn resolve(&self, geometry: &Geometry) -> Option<u64> {
        match *self {
            TaskAddress::Lba(lba) => Some(lba as u64),
            TaskAddress::Chs {
                cylinder,
                head,
                sector,
            } => geometry.chs_to_lba(cylinder, head, sector),
        }
    }

    /// Store `lba` in the address registers using the same mode as `self`
    ///
    /// The upper nibble of the device register is preserved.
    pub fn write_back(&self, regs: &mut Registers, lba: u64, geometry: &Geometry) {
        regs.device &= !device_reg::HEAD_MASK;
        if self.is_lba() {
            let [_, high, mid, low] = ((lba.min(MAX_LBA28)) as u32).to_be_bytes();
            regs.device |= ((lba >> 24) as u8) & device_reg::HEAD_MASK;
            regs.lba_high = high;
            regs.lba_mid = mid;
            regs.lba_low = low;
        } else {
            let (cylinder, head, sector) = geometry.lba_to_chs(lba);
            let [cyl_high, cyl_low] = cylinder.to_be_bytes();
            regs.device |= head & device_reg::HEAD_MASK;
            regs.lba_high = cyl_high;
            regs.lba_mid = cyl_low;
            regs.lba_low = sector;
        }
    }
}
