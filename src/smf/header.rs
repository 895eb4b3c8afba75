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
use std::{
    fmt,
    io::{Read, Seek},
};

use super::cursor::{ByteCursor, CursorError};
use super::ParseError;

const HEADER_TAG: &[u8; 4] = b"MThd";
const MIN_HEADER_LENGTH: u32 = 6;

/// The layout of the tracks in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Format 0, a single multi-channel track.
    SingleTrack,
    /// Format 1, simultaneous tracks.
    Parallel,
    /// Format 2, independent sequential patterns.
    Sequential,
    /// Anything else. The tracks are still parsed the same way.
    Unknown(u16),
}

impl From<u16> for Format {
    fn from(value: u16) -> Self {
        match value {
            0 => Format::SingleTrack,
            1 => Format::Parallel,
            2 => Format::Sequential,
            other => Format::Unknown(other),
        }
    }
}

/// How ticks relate to time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Division {
    /// Ticks per quarter note. Wall clock time depends on the active tempo.
    TicksPerQuarterNote(u16),
    /// SMPTE timecode. Ticks have a fixed duration and tempo events do not apply.
    Smpte {
        frames_per_second: u8,
        ticks_per_frame: u8,
    },
}

impl Division {
    fn decode(raw: u16) -> Division {
        if raw & 0x8000 == 0 {
            return Division::TicksPerQuarterNote(raw);
        }
        let [fps, ticks_per_frame] = raw.to_be_bytes();
        Division::Smpte {
            // The high byte holds the negated frame rate in two's complement.
            frames_per_second: (fps as i8).unsigned_abs(),
            ticks_per_frame,
        }
    }
}

impl fmt::Display for Division {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Division::TicksPerQuarterNote(tpqn) => write!(f, "{} ticks/quarter note", tpqn),
            Division::Smpte {
                frames_per_second,
                ticks_per_frame,
            } => write!(
                f,
                "SMPTE {} fps, {} ticks/frame",
                frames_per_second, ticks_per_frame
            ),
        }
    }
}

/// The contents of the `MThd` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderInfo {
    pub format: Format,
    pub track_count: u16,
    pub division: Division,
}

impl HeaderInfo {
    /// SMPTE timing ignores tempo events, so playback is only as accurate as the
    /// frame grid.
    pub fn reduced_accuracy(&self) -> bool {
        matches!(self.division, Division::Smpte { .. })
    }
}

/// Parses the header chunk. Declared lengths above six are tolerated: the extra
/// bytes are skipped so the cursor ends up at the first track chunk.
pub fn parse<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> Result<HeaderInfo, ParseError> {
    let tag = cursor.read_tag().map_err(truncated)?;
    if &tag != HEADER_TAG {
        return Err(ParseError::InvalidHeader(format!(
            "expected chunk id MThd, found {:02X?}",
            tag
        )));
    }

    let length = cursor.read_u32_be().map_err(truncated)?;
    if length < MIN_HEADER_LENGTH {
        return Err(ParseError::InvalidHeader(format!(
            "header chunk length {} is shorter than {}",
            length, MIN_HEADER_LENGTH
        )));
    }
    let body_start = cursor.position();

    let format = Format::from(cursor.read_u16_be().map_err(truncated)?);
    let track_count = cursor.read_u16_be().map_err(truncated)?;
    let division = Division::decode(cursor.read_u16_be().map_err(truncated)?);

    let body_end = body_start + u64::from(length);
    if cursor.position() < body_end {
        cursor
            .skip(body_end - cursor.position())
            .map_err(truncated)?;
    }

    Ok(HeaderInfo {
        format,
        track_count,
        division,
    })
}

fn truncated(e: CursorError) -> ParseError {
    match e {
        CursorError::EndOfData { position } => {
            ParseError::InvalidHeader(format!("file ends at byte {} inside the header", position))
        }
        CursorError::Io(e) => ParseError::Io(e),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn header_bytes(length: u32, format: u16, tracks: u16, division: u16) -> Vec<u8> {
        let mut bytes = b"MThd".to_vec();
        bytes.extend_from_slice(&length.to_be_bytes());
        bytes.extend_from_slice(&format.to_be_bytes());
        bytes.extend_from_slice(&tracks.to_be_bytes());
        bytes.extend_from_slice(&division.to_be_bytes());
        bytes
    }

    #[test]
    fn test_ticks_per_quarter_note() {
        let bytes = header_bytes(6, 1, 3, 480);
        let mut cursor = ByteCursor::from_bytes(&bytes);
        let header = parse(&mut cursor).unwrap();

        assert_eq!(Format::Parallel, header.format);
        assert_eq!(3, header.track_count);
        assert_eq!(Division::TicksPerQuarterNote(480), header.division);
        assert!(!header.reduced_accuracy());
        assert_eq!(14, cursor.position());
    }

    #[test]
    fn test_smpte() {
        // -25 fps, 40 ticks per frame.
        let bytes = header_bytes(6, 0, 1, 0xE728);
        let header = parse(&mut ByteCursor::from_bytes(&bytes)).unwrap();

        assert_eq!(
            Division::Smpte {
                frames_per_second: 25,
                ticks_per_frame: 40
            },
            header.division
        );
        assert!(header.reduced_accuracy());
    }

    #[test]
    fn test_longer_header_is_skipped() {
        let mut bytes = header_bytes(10, 0, 1, 96);
        bytes.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);
        bytes.extend_from_slice(b"MTrk");
        let mut cursor = ByteCursor::from_bytes(&bytes);

        let header = parse(&mut cursor).unwrap();
        assert_eq!(Division::TicksPerQuarterNote(96), header.division);
        assert_eq!(b"MTrk", &cursor.read_tag().unwrap());
    }

    #[test]
    fn test_unknown_format_is_kept() {
        let bytes = header_bytes(6, 7, 1, 96);
        let header = parse(&mut ByteCursor::from_bytes(&bytes)).unwrap();
        assert_eq!(Format::Unknown(7), header.format);
    }

    #[test]
    fn test_invalid_headers() {
        let mut wrong_tag = header_bytes(6, 0, 1, 96);
        wrong_tag[..4].copy_from_slice(b"RIFF");
        let short_length = header_bytes(4, 0, 1, 96);
        let truncated = header_bytes(6, 0, 1, 96)[..11].to_vec();

        for bytes in [wrong_tag, short_length, truncated, Vec::new()] {
            assert!(matches!(
                parse(&mut ByteCursor::from_bytes(&bytes)),
                Err(ParseError::InvalidHeader(_))
            ));
        }
    }
}
