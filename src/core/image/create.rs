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

//! Blank image creation

use std::fs::OpenOptions;
use std::path::Path;

use crate::core::error::{IdeError, Result};

/// Parse a human readable image size
///
/// Accepts a decimal number followed by an optional `k`, `M` or `G` unit,
/// optionally suffixed with `i` and/or `B` (`512k`, `100M`, `2GiB`). A bare
/// number is taken as megabytes.
pub fn parse_size(text: &str) -> Result<u64> {
    let text = text.trim();
    let digits_end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (digits, unit) = text.split_at(digits_end);

    let value: u64 = digits
        .parse()
        .map_err(|_| IdeError::InvalidSize(format!("no size in '{}'", text)))?;
    if value == 0 {
        return Err(IdeError::InvalidSize(format!("zero size in '{}'", text)));
    }

    let unit = unit.trim().to_ascii_lowercase();
    let (multiplier, rest) = match unit.chars().next() {
        Some('k') => (1u64 << 10, &unit[1..]),
        Some('m') => (1 << 20, &unit[1..]),
        Some('g') => (1 << 30, &unit[1..]),
        _ => (1 << 20, unit.as_str()),
    };
    let rest = rest.strip_prefix('i').unwrap_or(rest);
    let rest = rest.strip_prefix('b').unwrap_or(rest);
    if !rest.is_empty() {
        return Err(IdeError::InvalidSize(format!("unknown unit in '{}'", text)));
    }

    value
        .checked_mul(multiplier)
        .ok_or_else(|| IdeError::InvalidSize(format!("'{}' is too large", text)))
}

/// Create a zero-filled image of `size` bytes
///
/// Refuses to overwrite an existing file.
pub fn create_image(path: impl AsRef<Path>, size: u64) -> Result<()> {
    let path = path.as_ref();
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.set_len(size)?;
    log::info!("Created image {} ({} bytes)", path.display(), size);
    Ok(())
}
