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

//! Error types for the IDE device emulation engine
use thiserror::Error;

use crate::core::constants::{asc, sense_key, AtaError};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, IdeError>;

/// Main error type for the engine
///
/// Command handlers never surface these to the host directly. They are
/// mapped onto ATA error registers or ATAPI sense data by the device that
/// owns the failing operation.
#[derive(Error, Debug)]
pub enum IdeError {
    #[error("No image bound to device")]
    NoImage,

    #[error("Image is read-only: {0}")]
    ReadOnly(String),

    #[error("Access out of range: LBA {lba} + {count} exceeds {capacity} sectors")]
    OutOfRange { lba: u64, count: u64, capacity: u64 },

    #[error("Short read at byte {offset}: expected {expected} bytes, got {got}")]
    ShortRead {
        offset: u64,
        expected: usize,
        got: usize,
    },

    #[error("Access past end of image: {len} bytes at {offset}, image is {size} bytes")]
    PastEnd { offset: u64, len: u64, size: u64 },

    #[error("Callback handled {handled} blocks, only {offered} offered")]
    CallbackOverrun { offered: usize, handled: usize },

    #[error("Invalid image size: {0}")]
    InvalidSize(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("CUE sheet error: {0}")]
    Cue(#[from] CueError),
}

/// Bus transfer error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Timeout after {elapsed_ms} ms while {operation}")]
    Timeout {
        operation: &'static str,
        elapsed_ms: u64,
    },

    #[error("Command interrupted by host")]
    Interrupted,

    #[error("Block size {blocksize} cannot be split to fit limit {limit}")]
    BlockSplit { blocksize: usize, limit: usize },

    #[error("Host aborted data phase")]
    Aborted,
}

/// CUE sheet parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CueError {
    #[error("Line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Unsupported track type: {0}")]
    UnsupportedTrackType(String),

    #[error("Invalid MSF time: {0}")]
    InvalidMsf(String),

    #[error("CUE sheet contains no tracks")]
    NoTracks,

    #[error("CUE sheet references {referenced}, expected {expected}")]
    FileMismatch { referenced: String, expected: String },

    #[error("Track {track} starts beyond end of image")]
    TrackBeyondImage { track: u8 },
}

impl IdeError {
    /// True when the error came from the host side of the bus rather than
    /// from storage
    pub fn is_interrupted(&self) -> bool {
        matches!(self, IdeError::Transfer(TransferError::Interrupted))
    }
}

/// Failed packet command, reported to the host through sense data
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtapiError {
    #[error("Sense key {key:#04x}, ASC/ASCQ {asc:#06x}")]
    Sense { key: u8, asc: u16 },

    /// The host moved on; no completion is reported
    #[error("Command interrupted by host")]
    Interrupted,
}

impl AtapiError {
    pub fn sense(key: u8, asc: u16) -> Self {
        AtapiError::Sense { key, asc }
    }

    pub fn illegal_request(asc: u16) -> Self {
        Self::sense(sense_key::ILLEGAL_REQUEST, asc)
    }

    pub fn invalid_field() -> Self {
        Self::illegal_request(asc::INVALID_FIELD_IN_CDB)
    }

    pub fn not_ready() -> Self {
        Self::sense(sense_key::NOT_READY, asc::MEDIUM_NOT_PRESENT)
    }
}

impl From<TransferError> for AtapiError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::Interrupted => AtapiError::Interrupted,
            TransferError::Timeout { .. } | TransferError::Aborted => {
                AtapiError::sense(sense_key::ABORTED_COMMAND, asc::NO_ADDITIONAL_SENSE)
            }
            TransferError::BlockSplit { .. } => {
                AtapiError::sense(sense_key::ILLEGAL_REQUEST, asc::INVALID_FIELD_IN_CDB)
            }
        }
    }
}

impl From<IdeError> for AtapiError {
    fn from(err: IdeError) -> Self {
        match err {
            IdeError::Transfer(transfer) => transfer.into(),
            IdeError::NoImage => AtapiError::not_ready(),
            IdeError::OutOfRange { .. } | IdeError::PastEnd { .. } => {
                AtapiError::illegal_request(asc::LBA_OUT_OF_RANGE)
            }
            IdeError::ReadOnly(_) => AtapiError::sense(sense_key::ABORTED_COMMAND, asc::WRITE_PROTECTED),
            IdeError::Io(_) | IdeError::ShortRead { .. } => {
                AtapiError::sense(sense_key::MEDIUM_ERROR, asc::CIRC_UNRECOVERED_ERROR)
            }
            _ => AtapiError::sense(sense_key::HARDWARE_ERROR, asc::NO_ADDITIONAL_SENSE),
        }
    }
}

/// Failed ATA command on a rigid disk
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtaCommandError {
    /// Completed with ERR, carrying the error register value
    #[error("Command aborted, error register {0:?}")]
    Aborted(AtaError),

    #[error("Command interrupted by host")]
    Interrupted,
}

impl AtaCommandError {
    pub fn abort() -> Self {
        AtaCommandError::Aborted(AtaError::ABORT)
    }
}

impl From<TransferError> for AtaCommandError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::Interrupted => AtaCommandError::Interrupted,
            _ => AtaCommandError::abort(),
        }
    }
}

impl From<IdeError> for AtaCommandError {
    fn from(err: IdeError) -> Self {
        match err {
            IdeError::Transfer(transfer) => transfer.into(),
            IdeError::OutOfRange { .. } | IdeError::PastEnd { .. } => {
                AtaCommandError::Aborted(AtaError::ABORT | AtaError::IDNF)
            }
            IdeError::Io(_) | IdeError::ShortRead { .. } => {
                AtaCommandError::Aborted(AtaError::ABORT | AtaError::UNC)
            }
            IdeError::NoImage => AtaCommandError::Aborted(AtaError::ABORT | AtaError::NOMEDIA),
            _ => AtaCommandError::abort(),
        }
    }
}
