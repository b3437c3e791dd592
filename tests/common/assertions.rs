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

//! Custom assertions for bus sessions

use zuluide_core::core::constants::Status;

use super::fixtures::Session;

/// Assert the last command completed without ERR
#[allow(dead_code)]
pub fn assert_ok(session: &Session) {
    let status = session.status();
    assert!(
        !status.contains(Status::ERR),
        "Command failed: status {:?}, error 0x{:02X}",
        status,
        session.regs().error
    );
}

/// Assert the last command failed with `error` in the error register
#[allow(dead_code)]
pub fn assert_ata_error(session: &Session, error: u8) {
    let status = session.status();
    assert!(status.contains(Status::ERR), "Command succeeded: {:?}", status);
    assert_eq!(
        session.regs().error,
        error,
        "Error register mismatch: expected 0x{:02X}, got 0x{:02X}",
        error,
        session.regs().error
    );
}

/// Assert REQUEST SENSE on `dev` reports `key` and `asc`
#[allow(dead_code)]
pub fn assert_sense(session: &mut Session, dev: usize, key: u8, asc: u16) {
    let sense = session.packet(dev, &[0x03, 0, 0, 0, 18]);
    assert_eq!(sense.len(), 18, "REQUEST SENSE returned {} bytes", sense.len());
    let actual_asc = u16::from_be_bytes([sense[12], sense[13]]);
    assert_eq!(
        (sense[2] & 0x0F, actual_asc),
        (key, asc),
        "Sense mismatch: expected {:X}/{:04X}, got {:X}/{:04X}",
        key,
        asc,
        sense[2] & 0x0F,
        actual_asc
    );
}
