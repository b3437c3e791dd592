// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! CUE parsing and track layout tests

use super::super::cue::*;
use super::*;
use crate::core::constants::medium_type;
use crate::core::error::CueError;

#[test]
fn test_cue_parsing() {
    let sheet = parse_cue(
        r#"
FILE "game.bin" BINARY
  TRACK 01 MODE2/2352
    INDEX 01 00:00:00
"#,
    )
    .unwrap();

    assert_eq!(sheet.file, "game.bin");
    assert_eq!(sheet.tracks.len(), 1);
    let track = &sheet.tracks[0];
    assert_eq!(track.number, 1);
    assert_eq!(track.mode, TrackMode::Mode2_2352);
    assert_eq!(track.start_lba, 0);
    assert_eq!(track.pregap_lba, None);
    assert_eq!(track.file_offset, 0);
    assert_eq!(track.sector_length, 2352);
}

#[test]
fn test_file_offsets_follow_sector_sizes() {
    let sheet = parse_cue(
        r#"
FILE "mixed size.bin" BINARY
  TRACK 01 MODE1/2048
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    INDEX 00 00:00:10
    INDEX 01 00:00:12
  TRACK 03 AUDIO
    INDEX 01 00:01:00
"#,
    )
    .unwrap();

    assert_eq!(sheet.file, "mixed size.bin");
    let t2 = sheet.tracks[1];
    assert_eq!(t2.pregap_lba, Some(10));
    assert_eq!(t2.start_lba, 12);
    assert_eq!(t2.data_start_lba(), 10);
    // 10 cooked sectors, then 2 raw pregap sectors
    assert_eq!(t2.file_offset, 10 * 2048 + 2 * 2352);

    let t3 = sheet.tracks[2];
    assert_eq!(t3.start_lba, 75);
    assert_eq!(t3.file_offset, 10 * 2048 + 65 * 2352);
}

#[test]
fn test_cue_parse_errors() {
    assert_eq!(parse_cue("REM nothing here\n"), Err(CueError::NoTracks));

    let err = parse_cue("TRACK 01 MODE1/2048\n  INDEX 01 00:00:00\n").unwrap_err();
    assert!(matches!(err, CueError::Parse { line: 1, .. }));

    let err = parse_cue("FILE \"a.bin\" BINARY\nTRACK 01 MODE2/2336\n").unwrap_err();
    assert_eq!(err, CueError::UnsupportedTrackType("MODE2/2336".to_string()));

    let err = parse_cue("FILE \"a.bin\" BINARY\nTRACK 01 AUDIO\nINDEX 00 00:00:00\n").unwrap_err();
    assert!(matches!(err, CueError::Parse { .. }));

    let err = parse_cue("FILE \"a.bin\" BINARY\nFILE \"b.bin\" BINARY\n").unwrap_err();
    assert!(matches!(err, CueError::Parse { line: 2, .. }));

    let err = parse_cue("FILE \"a.bin\" BINARY\nTRACK 01 AUDIO\nINDEX 01 00:61:00\n").unwrap_err();
    assert_eq!(err, CueError::InvalidMsf("00:61:00".to_string()));

    let err = parse_cue("FILE \"a.wav\" WAVE\n").unwrap_err();
    assert!(matches!(err, CueError::Parse { line: 1, .. }));
}

#[test]
fn test_unquoted_file_name() {
    let sheet = parse_cue("FILE disc.bin BINARY\nTRACK 1 MODE1/2048\nINDEX 1 00:00:00\n").unwrap();
    assert_eq!(sheet.file, "disc.bin");
    assert_eq!(sheet.tracks[0].number, 1);
}

#[test]
fn test_mixed_layout() {
    let layout = mixed_layout();
    assert_eq!(layout.tracks().len(), 2);
    assert_eq!(layout.lead_out_lba(), 9);

    let t1 = *layout.track(1).unwrap();
    let t2 = *layout.track(2).unwrap();
    assert_eq!(layout.track_end_lba(&t1), 4);
    assert_eq!(layout.track_length(&t1), 4);
    assert_eq!(layout.track_length(&t2), 3);

    assert_eq!(layout.track_for_lba(3).unwrap().number, 1);
    assert_eq!(layout.track_for_lba(4).unwrap().number, 2);
    assert_eq!(layout.track_for_lba(8).unwrap().number, 2);
    assert!(layout.track_for_lba(9).is_none());

    assert_eq!(layout.file_offset(&t2, 4), 4 * 2352);
    assert_eq!(layout.file_offset(&t2, 7), 7 * 2352);
    assert_eq!(layout.medium_type(), medium_type::CDMIXED);
    assert_eq!(layout.disc_type(), 0x00);
}

#[test]
fn test_lead_out_uses_whole_sectors() {
    // A partial trailing sector is not addressable
    let layout =
        TrackLayout::from_cue(MIXED_CUE, "mixed.bin", MIXED_SIZE as u64 + 1000).unwrap();
    assert_eq!(layout.lead_out_lba(), 9);
}

#[test]
fn test_synthetic_layout() {
    let layout = TrackLayout::synthetic(4096);
    let track = layout.first_track().unwrap();
    assert_eq!(track.mode, TrackMode::Mode1_2048);
    assert_eq!(track.start_lba, 0);
    assert_eq!(layout.lead_out_lba(), 2);
    assert_eq!(layout.medium_type(), medium_type::CDROM);

    assert_eq!(TrackLayout::default().lead_out_lba(), 0);
}

#[test]
fn test_cue_must_describe_the_image() {
    let err = TrackLayout::from_cue(MIXED_CUE, "other.bin", MIXED_SIZE as u64).unwrap_err();
    assert!(matches!(err, CueError::FileMismatch { .. }));

    // Name comparison ignores case
    assert!(TrackLayout::from_cue(MIXED_CUE, "MIXED.BIN", MIXED_SIZE as u64).is_ok());

    let err = TrackLayout::from_cue(MIXED_CUE, "mixed.bin", 4 * 2352).unwrap_err();
    assert_eq!(err, CueError::TrackBeyondImage { track: 2 });
}

#[test]
fn test_load_prefers_companion_cue() {
    let (_dir, bin) = write_disc("mixed.bin", MIXED_SIZE, Some(MIXED_CUE));
    let layout = TrackLayout::load(&bin, MIXED_SIZE as u64);
    assert_eq!(layout, mixed_layout());
}

#[test]
fn test_load_falls_back_to_single_track() {
    let (_dir, bin) = write_disc("plain.iso", 8192, None);
    assert_eq!(TrackLayout::load(&bin, 8192), TrackLayout::synthetic(8192));

    let (_dir, bin) = write_disc("broken.bin", 8192, Some("FILE \"broken.bin\" BINARY\n"));
    assert_eq!(TrackLayout::load(&bin, 8192), TrackLayout::synthetic(8192));
}

#[test]
fn test_resolve_image_path() {
    let (dir, bin) = write_disc("mixed.bin", MIXED_SIZE, Some(MIXED_CUE));
    let cue_path = dir.path().join("mixed.cue");
    assert_eq!(resolve_image_path(&cue_path).unwrap(), bin);
    assert_eq!(resolve_image_path(&bin).unwrap(), bin);
}
