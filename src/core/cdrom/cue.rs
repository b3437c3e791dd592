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

//! CUE sheet parsing and disc track layout
//!
//! A CD image is a single binary file, optionally described by a CUE sheet
//! with the same stem (`game.bin` + `game.cue`). Only single-file sheets are
//! supported:
//!
//! ```text
//! FILE "game.bin" BINARY
//!   TRACK 01 MODE1/2352
//!     INDEX 01 00:00:00
//!   TRACK 02 AUDIO
//!     INDEX 00 10:30:00
//!     INDEX 01 10:32:00
//! ```
//!
//! INDEX times are positions inside the file. Without a usable sheet the
//! whole file is one MODE1/2048 data track.

use std::path::{Path, PathBuf};

use crate::core::constants::medium_type;
use crate::core::error::{CueError, Result};

use super::msf::Msf;

/// Sector layout of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackMode {
    /// CD-DA, 2352 bytes of samples per sector
    Audio,
    /// Cooked data sectors, user data only
    Mode1_2048,
    /// Raw Mode 1 sectors with sync, header and ECC
    Mode1_2352,
    /// Raw Mode 2 (XA) sectors
    Mode2_2352,
}

impl TrackMode {
    /// Bytes per sector in the image file
    pub fn sector_length(self) -> usize {
        match self {
            TrackMode::Mode1_2048 => 2048,
            _ => 2352,
        }
    }

    pub fn is_audio(self) -> bool {
        self == TrackMode::Audio
    }

    /// Q sub-channel CONTROL nibble
    pub fn control(self) -> u8 {
        if self.is_audio() {
            0x00
        } else {
            0x04
        }
    }

    fn parse(s: &str) -> std::result::Result<Self, CueError> {
        match s.to_ascii_uppercase().as_str() {
            "AUDIO" => Ok(TrackMode::Audio),
            "MODE1/2048" => Ok(TrackMode::Mode1_2048),
            "MODE1/2352" => Ok(TrackMode::Mode1_2352),
            "MODE2/2352" => Ok(TrackMode::Mode2_2352),
            _ => Err(CueError::UnsupportedTrackType(s.to_string())),
        }
    }
}

/// One track of the loaded disc
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackDescriptor {
    /// Track number (1-99)
    pub number: u8,
    pub mode: TrackMode,

    /// LBA of INDEX 01
    pub start_lba: u32,

    /// LBA of INDEX 00 when the track has a pregap in the file
    pub pregap_lba: Option<u32>,

    /// Byte offset of INDEX 01 in the image file
    pub file_offset: u64,

    /// Bytes per sector in the image file
    pub sector_length: usize,
}

impl TrackDescriptor {
    fn new(number: u8, mode: TrackMode, start_lba: u32) -> Self {
        Self {
            number,
            mode,
            start_lba,
            pregap_lba: None,
            file_offset: 0,
            sector_length: mode.sector_length(),
        }
    }

    /// First LBA stored in the file for this track
    pub fn data_start_lba(&self) -> u32 {
        self.pregap_lba.unwrap_or(self.start_lba)
    }

    pub fn is_audio(&self) -> bool {
        self.mode.is_audio()
    }

    /// ADR/CONTROL byte of TOC entries, ADR 1 (current position)
    pub fn adr_control(&self) -> u8 {
        0x10 | self.mode.control()
    }
}

/// Tracks parsed from a CUE sheet together with the file they describe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueSheet {
    /// File name referenced by the FILE directive
    pub file: String,
    pub tracks: Vec<TrackDescriptor>,
}

/// Parse CUE sheet text
///
/// File offsets are computed from the INDEX positions and the sector size
/// of each track, so tracks of different modes may share the file.
pub fn parse_cue(text: &str) -> std::result::Result<CueSheet, CueError> {
    let mut file: Option<String> = None;
    let mut tracks: Vec<TrackDescriptor> = Vec::new();
    let mut current: Option<(TrackDescriptor, bool)> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        let parse_err = |reason: &str| CueError::Parse {
            line: line_no,
            reason: reason.to_string(),
        };
        let (keyword, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        match keyword.to_ascii_uppercase().as_str() {
            "" | "REM" | "TITLE" | "PERFORMER" | "SONGWRITER" | "CATALOG" | "CDTEXTFILE"
            | "FLAGS" | "ISRC" | "PREGAP" | "POSTGAP" => {}
            "FILE" => {
                if file.is_some() {
                    return Err(parse_err("multiple FILE entries are not supported"));
                }
                let (name, kind) = split_file_directive(rest)
                    .ok_or_else(|| parse_err("malformed FILE directive"))?;
                if !kind.eq_ignore_ascii_case("BINARY") {
                    return Err(parse_err("only BINARY files are supported"));
                }
                file = Some(name.to_string());
            }
            "TRACK" => {
                if file.is_none() {
                    return Err(parse_err("TRACK before FILE"));
                }
                let mut fields = rest.split_whitespace();
                let number: u8 = fields
                    .next()
                    .and_then(|n| n.parse().ok())
                    .filter(|n| (1..=99).contains(n))
                    .ok_or_else(|| parse_err("invalid track number"))?;
                let mode = TrackMode::parse(fields.next().unwrap_or(""))?;

                if let Some(track) = finish_track(current.take(), line_no)? {
                    if number <= track.number {
                        return Err(parse_err("track numbers must ascend"));
                    }
                    tracks.push(track);
                }
                current = Some((TrackDescriptor::new(number, mode, 0), false));
            }
            "INDEX" => {
                let (track, has_start) = current
                    .as_mut()
                    .ok_or_else(|| parse_err("INDEX outside of a track"))?;
                let mut fields = rest.split_whitespace();
                let index: u8 = fields
                    .next()
                    .and_then(|n| n.parse().ok())
                    .ok_or_else(|| parse_err("invalid index number"))?;
                let time: Msf = fields.next().unwrap_or("").parse()?;
                match index {
                    0 => track.pregap_lba = Some(time.frames()),
                    1 => {
                        track.start_lba = time.frames();
                        *has_start = true;
                    }
                    _ => log::trace!("CUE line {}: ignoring INDEX {:02}", line_no, index),
                }
            }
            other => log::debug!("CUE line {}: ignoring {}", line_no, other),
        }
    }

    let line_count = text.lines().count();
    if let Some(track) = finish_track(current, line_count)? {
        tracks.push(track);
    }
    if tracks.is_empty() {
        return Err(CueError::NoTracks);
    }

    assign_file_offsets(&mut tracks, line_count)?;
    Ok(CueSheet {
        file: file.unwrap_or_default(),
        tracks,
    })
}

/// Split `"name with spaces.bin" BINARY` into name and file type
fn split_file_directive(rest: &str) -> Option<(&str, &str)> {
    if let Some(quoted) = rest.strip_prefix('"') {
        let end = quoted.find('"')?;
        Some((&quoted[..end], quoted[end + 1..].trim()))
    } else {
        let (name, kind) = rest.rsplit_once(char::is_whitespace)?;
        Some((name.trim(), kind.trim()))
    }
}

fn finish_track(
    current: Option<(TrackDescriptor, bool)>,
    line: usize,
) -> std::result::Result<Option<TrackDescriptor>, CueError> {
    match current {
        None => Ok(None),
        Some((track, false)) => Err(CueError::Parse {
            line,
            reason: format!("track {} has no INDEX 01", track.number),
        }),
        Some((track, true)) => {
            if track.pregap_lba.is_some_and(|pregap| pregap > track.start_lba) {
                return Err(CueError::Parse {
                    line,
                    reason: format!("track {} INDEX 00 follows INDEX 01", track.number),
                });
            }
            Ok(Some(track))
        }
    }
}

/// Walk the tracks in file order and turn INDEX positions into byte offsets
fn assign_file_offsets(
    tracks: &mut [TrackDescriptor],
    line: usize,
) -> std::result::Result<(), CueError> {
    let mut prev: Option<(u32, u64, usize)> = None;
    for track in tracks.iter_mut() {
        let data_start = track.data_start_lba();
        let data_offset = match prev {
            None => data_start as u64 * track.sector_length as u64,
            Some((prev_start, prev_offset, prev_len)) => {
                if data_start < prev_start {
                    return Err(CueError::Parse {
                        line,
                        reason: format!("track {} starts before the previous track", track.number),
                    });
                }
                prev_offset + (data_start - prev_start) as u64 * prev_len as u64
            }
        };
        track.file_offset =
            data_offset + (track.start_lba - data_start) as u64 * track.sector_length as u64;
        prev = Some((data_start, data_offset, track.sector_length));
    }
    Ok(())
}

/// Companion CUE sheet path of an image file
pub fn cue_path_for(image: &Path) -> PathBuf {
    image.with_extension("cue")
}

/// Image file to open for `path`
///
/// A `.cue` path is resolved to the binary file named by its FILE
/// directive, relative to the sheet; other paths are returned unchanged.
pub fn resolve_image_path(path: &Path) -> Result<PathBuf> {
    let is_cue = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("cue"));
    if !is_cue {
        return Ok(path.to_path_buf());
    }

    let sheet = parse_cue(&std::fs::read_to_string(path)?)?;
    let bin = match path.parent() {
        Some(parent) => parent.join(&sheet.file),
        None => PathBuf::from(&sheet.file),
    };
    log::debug!("CUE sheet {} refers to {}", path.display(), bin.display());
    Ok(bin)
}

/// Track layout of the loaded disc
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackLayout {
    tracks: Vec<TrackDescriptor>,
    file_size: u64,
}

impl TrackLayout {
    /// One MODE1/2048 track spanning the whole file
    pub fn synthetic(file_size: u64) -> Self {
        Self {
            tracks: vec![TrackDescriptor::new(1, TrackMode::Mode1_2048, 0)],
            file_size,
        }
    }

    /// Layout from CUE sheet text describing `file_name` of `file_size` bytes
    pub fn from_cue(
        text: &str,
        file_name: &str,
        file_size: u64,
    ) -> std::result::Result<Self, CueError> {
        let sheet = parse_cue(text)?;

        let referenced = Path::new(&sheet.file)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !referenced.eq_ignore_ascii_case(file_name) {
            return Err(CueError::FileMismatch {
                referenced,
                expected: file_name.to_string(),
            });
        }

        if let Some(track) = sheet.tracks.iter().find(|t| t.file_offset >= file_size) {
            return Err(CueError::TrackBeyondImage {
                track: track.number,
            });
        }

        Ok(Self {
            tracks: sheet.tracks,
            file_size,
        })
    }

    /// Build the layout of `image`, falling back to a single data track
    ///
    /// Problems with the companion CUE sheet are logged, never fatal.
    pub fn load(image: &Path, file_size: u64) -> Self {
        let cue_path = cue_path_for(image);
        let file_name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let text = match std::fs::read_to_string(&cue_path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No CUE sheet for {}, using a single data track", file_name);
                return Self::synthetic(file_size);
            }
            Err(err) => {
                log::warn!("Cannot read {}: {}", cue_path.display(), err);
                return Self::synthetic(file_size);
            }
        };

        match Self::from_cue(&text, &file_name, file_size) {
            Ok(layout) => {
                log::info!(
                    "Loaded {}: {} tracks, lead-out at LBA {}",
                    cue_path.display(),
                    layout.tracks.len(),
                    layout.lead_out_lba()
                );
                layout
            }
            Err(err) => {
                log::warn!(
                    "Ignoring invalid CUE sheet {}: {}",
                    cue_path.display(),
                    err
                );
                Self::synthetic(file_size)
            }
        }
    }

    pub fn tracks(&self) -> &[TrackDescriptor] {
        &self.tracks
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn first_track(&self) -> Option<&TrackDescriptor> {
        self.tracks.first()
    }

    pub fn last_track(&self) -> Option<&TrackDescriptor> {
        self.tracks.last()
    }

    pub fn track(&self, number: u8) -> Option<&TrackDescriptor> {
        self.tracks.iter().find(|t| t.number == number)
    }

    /// Track whose file data contains `lba`, `None` at or past the lead-out
    pub fn track_for_lba(&self, lba: u32) -> Option<&TrackDescriptor> {
        if lba >= self.lead_out_lba() {
            return None;
        }
        self.tracks
            .iter()
            .rev()
            .find(|t| t.data_start_lba() <= lba)
            .or(self.tracks.first())
    }

    /// Lead-out LBA: start of the last track plus the whole sectors left
    /// in the file after its INDEX 01
    pub fn lead_out_lba(&self) -> u32 {
        match self.tracks.last() {
            Some(last) => {
                let remaining = self.file_size.saturating_sub(last.file_offset);
                last.start_lba + (remaining / last.sector_length as u64) as u32
            }
            None => 0,
        }
    }

    /// First LBA after the data of `track`
    pub fn track_end_lba(&self, track: &TrackDescriptor) -> u32 {
        self.tracks
            .iter()
            .find(|t| t.number > track.number)
            .map(|next| next.data_start_lba())
            .unwrap_or_else(|| self.lead_out_lba())
    }

    /// Sectors from INDEX 01 of `track` to the start of the next track
    pub fn track_length(&self, track: &TrackDescriptor) -> u32 {
        self.track_end_lba(track).saturating_sub(track.start_lba)
    }

    /// Byte offset of sector `lba` of `track` in the image file
    pub fn file_offset(&self, track: &TrackDescriptor, lba: u32) -> u64 {
        let len = track.sector_length as u64;
        if lba >= track.start_lba {
            track.file_offset + (lba - track.start_lba) as u64 * len
        } else {
            track.file_offset - (track.start_lba - lba) as u64 * len
        }
    }

    /// Medium type for the mode parameter header
    pub fn medium_type(&self) -> u8 {
        let audio = self.tracks.iter().filter(|t| t.is_audio()).count();
        match audio {
            0 => medium_type::CDROM,
            n if n == self.tracks.len() => medium_type::CDDA,
            _ => medium_type::CDMIXED,
        }
    }

    /// Disc type of READ DISC INFORMATION and the full TOC (0x20 = CD-ROM XA)
    pub fn disc_type(&self) -> u8 {
        if self.tracks.iter().any(|t| t.mode == TrackMode::Mode2_2352) {
            0x20
        } else {
            0x00
        }
    }
}
