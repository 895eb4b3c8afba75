// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::io::{Read, Seek};

use super::cursor::{ByteCursor, CursorError};

#[derive(Debug, thiserror::Error)]
pub enum VlqError {
    #[error("variable-length quantity truncated at byte {position}")]
    Truncated { position: u64 },

    #[error("variable-length quantity at byte {position} does not fit in 64 bits")]
    Overflow { position: u64 },

    #[error(transparent)]
    Io(std::io::Error),
}

/// Decodes a MIDI variable-length quantity: big-endian base 128, where every byte
/// but the last has its top bit set.
pub fn decode<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> Result<u64, VlqError> {
    let start = cursor.position();
    let mut value: u64 = 0;
    loop {
        let byte = cursor.read_u8().map_err(|e| match e {
            CursorError::EndOfData { position } => VlqError::Truncated { position },
            CursorError::Io(e) => VlqError::Io(e),
        })?;

        value = value
            .checked_mul(128)
            .map(|v| v | u64::from(byte & 0x7F))
            .ok_or(VlqError::Overflow { position: start })?;

        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
}

/// Encodes a value as a variable-length quantity.
pub fn encode(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(4);
    encode_into(value, &mut out);
    out
}

/// Appends the variable-length encoding of `value` to `out`.
pub fn encode_into(value: u64, out: &mut Vec<u8>) {
    let start = out.len();
    out.push((value & 0x7F) as u8);
    let mut rest = value >> 7;
    while rest > 0 {
        out.push((rest & 0x7F) as u8 | 0x80);
        rest >>= 7;
    }
    out[start..].reverse();
}
