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

//! Byte-level helpers shared by the command engines
//!
//! Command descriptor blocks and most response structures are big-endian,
//! while IDENTIFY blocks are little-endian words whose ASCII fields are
//! stored with the two bytes of each word swapped.

use std::fmt;

/// Read a big-endian 16-bit field
#[inline]
pub fn parse_be16(src: &[u8]) -> u16 {
    u16::from_be_bytes([src[0], src[1]])
}

/// Read a big-endian 24-bit field
#[inline]
pub fn parse_be24(src: &[u8]) -> u32 {
    u32::from_be_bytes([0, src[0], src[1], src[2]])
}

/// Read a big-endian 32-bit field
#[inline]
pub fn parse_be32(src: &[u8]) -> u32 {
    u32::from_be_bytes([src[0], src[1], src[2], src[3]])
}

#[inline]
pub fn write_be16(dst: &mut [u8], value: u16) {
    dst[..2].copy_from_slice(&value.to_be_bytes());
}

#[inline]
pub fn write_be24(dst: &mut [u8], value: u32) {
    dst[..3].copy_from_slice(&value.to_be_bytes()[1..]);
}

#[inline]
pub fn write_be32(dst: &mut [u8], value: u32) {
    dst[..4].copy_from_slice(&value.to_be_bytes());
}

/// Copy an ASCII identity string into IDENTIFY words
///
/// ATA stores the first character of each pair in the high byte of the
/// word. The field is padded with spaces.
///
/// # Arguments
///
/// * `dst` - Destination words (field length is `dst.len() * 2` bytes)
/// * `src` - Source string, truncated if longer than the field
pub fn copy_id_string(dst: &mut [u16], src: &str) {
    let mut chars = src.bytes();
    for word in dst.iter_mut() {
        let b0 = chars.next().unwrap_or(b' ');
        let b1 = chars.next().unwrap_or(b' ');
        *word = u16::from_be_bytes([b0, b1]);
    }
}

/// Copy an ASCII string into a space padded SCSI field
pub fn write_scsi_ascii(dst: &mut [u8], src: &str) {
    dst.fill(b' ');
    let len = src.len().min(dst.len());
    dst[..len].copy_from_slice(&src.as_bytes()[..len]);
}

/// Normalize a user supplied identity string
///
/// Non-printable characters are replaced with spaces and the result is
/// limited to `max_len` bytes.
pub fn format_drive_info_field(src: &str, max_len: usize) -> String {
    src.chars()
        .take(max_len)
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { ' ' })
        .collect()
}

/// Compute and store the IDENTIFY integrity word (word 255)
///
/// The checksum byte is the two's complement of the sum of bytes 0..=510
/// with 0xA5 as the signature byte.
pub fn finalize_identify(words: &mut [u16; 256]) {
    let mut checksum: u8 = 0xA5;
    for word in &words[..255] {
        checksum = checksum
            .wrapping_add((*word & 0xFF) as u8)
            .wrapping_add((*word >> 8) as u8);
    }
    let checksum = checksum.wrapping_neg();
    words[255] = ((checksum as u16) << 8) | 0xA5;
}

/// Serialize IDENTIFY words in bus (little-endian) order
pub fn identify_to_bytes(words: &[u16; 256]) -> [u8; 512] {
    let mut out = [0u8; 512];
    for (chunk, word) in out.chunks_exact_mut(2).zip(words.iter()) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    out
}

/// Hex dump wrapper for `log` output
///
/// Long buffers are abbreviated so per-block trace logging stays readable.
pub struct HexBytes<'a>(pub &'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MAX_SHOWN: usize = 64;
        for (i, byte) in self.0.iter().take(MAX_SHOWN).enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        if self.0.len() > MAX_SHOWN {
            write!(f, " ... ({} bytes)", self.0.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_be_fields() {
        let mut buf = [0u8; 9];
        write_be16(&mut buf[0..], 0x1234);
        write_be24(&mut buf[2..], 0x56789A);
        write_be32(&mut buf[5..], 0xDEADBEEF);
        assert_eq!(buf, [0x12, 0x34, 0x56, 0x78, 0x9A, 0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(parse_be16(&buf[0..]), 0x1234);
        assert_eq!(parse_be24(&buf[2..]), 0x56789A);
        assert_eq!(parse_be32(&buf[5..]), 0xDEADBEEF);
    }

    #[test]
    fn test_id_string_is_byte_swapped_and_padded() {
        let mut words = [0u16; 4];
        copy_id_string(&mut words, "ABC");
        assert_eq!(words, [0x4142, 0x4320, 0x2020, 0x2020]);
    }

    #[test]
    fn test_identify_checksum_sums_to_zero() {
        let mut words = [0u16; 256];
        words[0] = 0x85C0;
        words[49] = 0x0F00;
        finalize_identify(&mut words);
        let bytes = identify_to_bytes(&words);
        let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        assert_eq!(sum, 0);
        assert_eq!(bytes[510], 0xA5);
    }

    #[test]
    fn test_drive_info_field_sanitized() {
        assert_eq!(format_drive_info_field("AB\tC\u{7f}D", 4), "AB C");
    }

    #[test]
    fn test_hex_bytes_display() {
        assert_eq!(HexBytes(&[0x01, 0xAB]).to_string(), "01 AB");
    }
}
