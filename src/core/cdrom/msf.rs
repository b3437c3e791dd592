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

//! Minute/second/frame addressing

use std::fmt;
use std::str::FromStr;

use crate::core::error::CueError;

/// Frames per second of CD audio time
pub const FRAMES_PER_SECOND: u32 = 75;

/// Frames in the two second pregap before LBA 0
pub const PREGAP_FRAMES: u32 = 150;

/// Position on a CD expressed in minutes, seconds and frames
///
/// Absolute disc time includes the 2 second pregap: LBA 0 is 00:02:00.
/// CUE sheet times are relative to the start of the image file and carry
/// no pregap, use [`Msf::from_frames`] / [`Msf::frames`] for those.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Msf {
    pub minute: u8,
    pub second: u8,
    pub frame: u8,
}

impl Msf {
    pub fn new(minute: u8, second: u8, frame: u8) -> Self {
        Self {
            minute,
            second,
            frame,
        }
    }

    /// Split a frame count into minutes, seconds and frames
    pub fn from_frames(frames: u32) -> Self {
        let minute = (frames / FRAMES_PER_SECOND / 60).min(u8::MAX as u32) as u8;
        let second = ((frames / FRAMES_PER_SECOND) % 60) as u8;
        let frame = (frames % FRAMES_PER_SECOND) as u8;
        Self::new(minute, second, frame)
    }

    pub fn frames(&self) -> u32 {
        (self.minute as u32 * 60 + self.second as u32) * FRAMES_PER_SECOND + self.frame as u32
    }

    /// Absolute disc time of `lba`
    pub fn from_lba(lba: u32) -> Self {
        Self::from_frames(lba + PREGAP_FRAMES)
    }

    /// LBA of an absolute disc time, `None` inside the lead-in pregap
    pub fn to_lba(&self) -> Option<u32> {
        self.frames().checked_sub(PREGAP_FRAMES)
    }

    /// Read three binary bytes `[M, S, F]`
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2])
    }

    pub fn to_bytes(&self) -> [u8; 3] {
        [self.minute, self.second, self.frame]
    }

    pub fn to_bcd(&self) -> [u8; 3] {
        [
            dec_to_bcd(self.minute),
            dec_to_bcd(self.second),
            dec_to_bcd(self.frame),
        ]
    }
}

impl fmt::Display for Msf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.minute, self.second, self.frame)
    }
}

impl FromStr for Msf {
    type Err = CueError;

    /// Parse `MM:SS:FF` as written in CUE sheets
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CueError::InvalidMsf(s.to_string());
        let mut parts = s.split(':');
        let mut field = |max: u8| -> Result<u8, CueError> {
            let value: u8 = parts
                .next()
                .and_then(|p| p.trim().parse().ok())
                .ok_or_else(invalid)?;
            if value > max {
                return Err(invalid());
            }
            Ok(value)
        };

        let minute = field(99)?;
        let second = field(59)?;
        let frame = field(74)?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self::new(minute, second, frame))
    }
}

/// Convert BCD to decimal
pub fn bcd_to_dec(bcd: u8) -> u8 {
    (bcd >> 4) * 10 + (bcd & 0x0F)
}

/// Convert decimal (0-99) to BCD
pub fn dec_to_bcd(dec: u8) -> u8 {
    ((dec / 10) << 4) | (dec % 10)
}
