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
use std::io::{self, Cursor, ErrorKind, Read, Seek, SeekFrom};

/// Errors produced while reading from a [`ByteCursor`].
#[derive(Debug, thiserror::Error)]
pub enum CursorError {
    #[error("unexpected end of data at byte {position}")]
    EndOfData { position: u64 },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A sequential, seekable reader that keeps track of its absolute position in the
/// underlying source. The cursor does not know about chunk boundaries: callers
/// store the limit they care about and compare it against [`ByteCursor::position`].
pub struct ByteCursor<R> {
    inner: R,
    position: u64,
}

impl<'a> ByteCursor<Cursor<&'a [u8]>> {
    /// Creates a cursor over an in-memory buffer.
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        ByteCursor {
            inner: Cursor::new(bytes),
            position: 0,
        }
    }
}

impl<R: Read + Seek> ByteCursor<R> {
    /// Wraps a seekable source, starting at its current position.
    pub fn new(mut inner: R) -> Result<Self, CursorError> {
        let position = inner.stream_position()?;
        Ok(ByteCursor { inner, position })
    }

    /// The absolute position of the next byte to be read.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Reads exactly `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, CursorError> {
        let mut buf = vec![0; n];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Fills the buffer completely. On a short read the position reflects the
    /// bytes that were actually consumed.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), CursorError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(CursorError::EndOfData {
                        position: self.position,
                    })
                }
                Ok(n) => {
                    filled += n;
                    self.position += n as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CursorError> {
        let mut buf = [0; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8, CursorError> {
        let [byte] = self.read_array::<1>()?;
        Ok(byte)
    }

    pub fn read_u16_be(&mut self) -> Result<u16, CursorError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32_be(&mut self) -> Result<u32, CursorError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    /// Reads a four byte chunk tag such as `MThd`.
    pub fn read_tag(&mut self) -> Result<[u8; 4], CursorError> {
        self.read_array()
    }

    /// Moves the cursor. Seeking past the end of the source is allowed; the next
    /// read will report [`CursorError::EndOfData`].
    pub fn seek(&mut self, to: SeekFrom) -> Result<u64, CursorError> {
        self.position = self.inner.seek(to)?;
        Ok(self.position)
    }

    /// Skips `n` bytes forward without reading them.
    pub fn skip(&mut self, n: u64) -> Result<(), CursorError> {
        let offset = i64::try_from(n)
            .map_err(|_| io::Error::new(ErrorKind::InvalidInput, "skip length too large"))?;
        self.seek(SeekFrom::Current(offset))?;
        Ok(())
    }

    /// Steps back over the byte that was just read.
    pub fn unread_byte(&mut self) -> Result<(), CursorError> {
        self.seek(SeekFrom::Current(-1))?;
        Ok(())
    }
}

/// Decodes up to eight bytes as a big-endian unsigned integer.
pub fn bytes_to_int(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |value, byte| (value << 8) | u64::from(*byte))
}
