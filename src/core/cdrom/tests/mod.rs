// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! Tests for the CD-ROM drive emulation

mod cue_sheet;

use std::path::PathBuf;

use tempfile::TempDir;

use super::*;
use crate::core::atapi::tests::helpers::{pattern_byte, Harness};
use crate::core::config::DeviceKind;
use crate::core::image::ImageFile;

/// Raw data track of 4 sectors, then an audio track with a 2 sector pregap
/// and 3 sectors of audio
pub const MIXED_CUE: &str = r#"
REM test disc
FILE "mixed.bin" BINARY
  TRACK 01 MODE1/2352
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    PREGAP 00:00:00
    INDEX 00 00:00:04
    INDEX 01 00:00:06
"#;

pub const MIXED_SIZE: usize = 9 * 2352;

pub fn mixed_layout() -> TrackLayout {
    TrackLayout::from_cue(MIXED_CUE, "mixed.bin", MIXED_SIZE as u64).unwrap()
}

/// Expected bytes of `len` bytes at file offset `offset`
pub fn file_bytes(offset: usize, len: usize) -> Vec<u8> {
    (offset..offset + len).map(pattern_byte).collect()
}

/// Write `name` (and an optional CUE sheet next to it) into a new directory
pub fn write_disc(name: &str, size: usize, cue: Option<&str>) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let bin = dir.path().join(name);
    std::fs::write(&bin, file_bytes(0, size)).unwrap();
    if let Some(cue) = cue {
        std::fs::write(cue::cue_path_for(&bin), cue).unwrap();
    }
    (dir, bin)
}

pub fn drive() -> Harness<CdromDevice> {
    let device = DeviceConfig::new(DeviceKind::Cdrom);
    Harness::new(CdromDevice::new(0, &IdeConfig::default(), &device))
}

/// Drive with a disc loaded and the media change acknowledged
pub fn drive_with_disc(name: &str, size: usize, cue: Option<&str>) -> (TempDir, Harness<CdromDevice>) {
    let (dir, bin) = write_disc(name, size, cue);
    let mut h = drive();
    let image = ImageFile::open(&bin, true).unwrap();
    h.dev.set_image(Some(Box::new(image)));
    h.clear_attention();
    (dir, h)
}
