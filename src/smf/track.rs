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
use std::io::{self, Read, Seek, SeekFrom};

use tracing::trace;

use super::cursor::{bytes_to_int, ByteCursor, CursorError};
use super::vlq::{self, VlqError};
use crate::pitch::PitchMapper;

const TRACK_TAG: &[u8; 4] = b"MTrk";

const META_END_OF_TRACK: u8 = 0x2F;
const META_SET_TEMPO: u8 = 0x51;

/// A note or tempo event read from a single track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    /// Ticks since the start of the track.
    pub ticks: u64,
    /// The track the event came from.
    pub track: usize,
    pub kind: RawEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    Tempo { microseconds_per_quarter_note: u32 },
    NoteOn { pitch: u8, velocity: u8 },
    NoteOff { pitch: u8, velocity: u8 },
}

/// Failures that stop the multi-track parse: later tracks are not attempted.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("track {index}: expected chunk id MTrk, found {tag:?}")]
    UnexpectedChunk { index: usize, tag: String },

    #[error("track {index}: file ends at byte {position} inside the chunk header")]
    Truncated { index: usize, position: u64 },

    #[error("track {index}: IO error: {source}")]
    Io { index: usize, source: io::Error },
}

/// Failures that stop a single track. Events collected before the failure are kept.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("data ends at byte {position} in the middle of an event")]
    Truncated { position: u64 },

    #[error("variable-length quantity at byte {position} is too large")]
    Overflow { position: u64 },

    #[error("data byte {byte:#04X} at byte {position} with no running status")]
    Desynchronized { byte: u8, position: u64 },

    #[error("note event {status:#04X} at byte {position} is missing data bytes")]
    ShortNote { status: u8, position: u64 },

    #[error("event at byte {position} runs past the chunk end at byte {chunk_end}")]
    PastChunkEnd { position: u64, chunk_end: u64 },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<CursorError> for TrackError {
    fn from(e: CursorError) -> Self {
        match e {
            CursorError::EndOfData { position } => TrackError::Truncated { position },
            CursorError::Io(e) => TrackError::Io(e),
        }
    }
}

impl From<VlqError> for TrackError {
    fn from(e: VlqError) -> Self {
        match e {
            VlqError::Truncated { position } => TrackError::Truncated { position },
            VlqError::Overflow { position } => TrackError::Overflow { position },
            VlqError::Io(e) => TrackError::Io(e),
        }
    }
}

/// Why a track stopped.
#[derive(Debug)]
pub enum TrackEnd {
    /// An End-of-Track meta event was reached.
    EndOfTrack,
    /// The declared chunk length was consumed without an End-of-Track event.
    ChunkEnd,
    /// The track could not be read to the end.
    Failed(TrackError),
}

/// The result of parsing one `MTrk` chunk.
#[derive(Debug)]
pub struct ParsedTrack {
    pub index: usize,
    pub events: Vec<RawEvent>,
    /// Notes the pitch mapper discarded.
    pub dropped_notes: usize,
    pub end: TrackEnd,
}

enum Step {
    Continue,
    EndOfTrack,
}

/// Parses the track chunk at the cursor. Whatever happens inside the chunk, the
/// cursor is left at the chunk's declared end so the next track starts in sync.
pub(super) fn parse<R: Read + Seek>(
    cursor: &mut ByteCursor<R>,
    index: usize,
    mapper: &PitchMapper,
) -> Result<ParsedTrack, ChunkError> {
    let chunk_error = |e: CursorError| match e {
        CursorError::EndOfData { position } => ChunkError::Truncated { index, position },
        CursorError::Io(source) => ChunkError::Io { index, source },
    };

    let tag = cursor.read_tag().map_err(chunk_error)?;
    if &tag != TRACK_TAG {
        return Err(ChunkError::UnexpectedChunk {
            index,
            tag: String::from_utf8_lossy(&tag).into_owned(),
        });
    }
    let length = cursor.read_u32_be().map_err(chunk_error)?;
    let chunk_end = cursor.position() + u64::from(length);

    let mut parser = TrackParser {
        index,
        mapper,
        chunk_end,
        ticks: 0,
        running_status: None,
        events: Vec::new(),
        dropped_notes: 0,
    };
    let end = parser.run(cursor);

    cursor
        .seek(SeekFrom::Start(chunk_end))
        .map_err(chunk_error)?;

    Ok(ParsedTrack {
        index,
        events: parser.events,
        dropped_notes: parser.dropped_notes,
        end,
    })
}

struct TrackParser<'a> {
    index: usize,
    mapper: &'a PitchMapper,
    chunk_end: u64,
    ticks: u64,
    running_status: Option<u8>,
    events: Vec<RawEvent>,
    dropped_notes: usize,
}

impl TrackParser<'_> {
    fn run<R: Read + Seek>(&mut self, cursor: &mut ByteCursor<R>) -> TrackEnd {
        loop {
            if cursor.position() >= self.chunk_end {
                return TrackEnd::ChunkEnd;
            }
            match self.next_event(cursor) {
                Ok(Step::Continue) => {}
                Ok(Step::EndOfTrack) => return TrackEnd::EndOfTrack,
                Err(e) => return TrackEnd::Failed(e),
            }
        }
    }

    /// Reads one event. An event that ends beyond the chunk borrowed bytes from
    /// whatever follows, so it is discarded and the track fails.
    fn next_event<R: Read + Seek>(&mut self, cursor: &mut ByteCursor<R>) -> Result<Step, TrackError> {
        let position = cursor.position();
        let (events, dropped_notes) = (self.events.len(), self.dropped_notes);

        let delta = vlq::decode(cursor)?;
        self.ticks = self.ticks.saturating_add(delta);
        let status = self.read_status(cursor)?;
        let step = self.dispatch(cursor, status)?;

        if cursor.position() > self.chunk_end {
            self.events.truncate(events);
            self.dropped_notes = dropped_notes;
            return Err(TrackError::PastChunkEnd {
                position,
                chunk_end: self.chunk_end,
            });
        }
        Ok(step)
    }

    /// Reads a status byte. A data byte in this position means running status:
    /// it is pushed back and the previous channel status is reused.
    fn read_status<R: Read + Seek>(&mut self, cursor: &mut ByteCursor<R>) -> Result<u8, TrackError> {
        let position = cursor.position();
        let byte = cursor.read_u8()?;

        if byte & 0x80 != 0 {
            match byte {
                0x80..=0xEF => self.running_status = Some(byte),
                // SysEx and system common cancel running status, as midly does. A data
                // byte after them is a desync rather than a SysEx continuation.
                0xF0..=0xF7 => self.running_status = None,
                // Realtime and meta events leave it alone.
                _ => {}
            }
            return Ok(byte);
        }

        match self.running_status {
            Some(status) => {
                cursor.unread_byte()?;
                Ok(status)
            }
            None => Err(TrackError::Desynchronized { byte, position }),
        }
    }

    fn dispatch<R: Read + Seek>(
        &mut self,
        cursor: &mut ByteCursor<R>,
        status: u8,
    ) -> Result<Step, TrackError> {
        match status {
            0x00..=0x7F => {
                return Err(TrackError::Desynchronized {
                    byte: status,
                    position: cursor.position(),
                })
            }
            0x80..=0x9F => {
                let position = cursor.position();
                let [pitch, velocity] = cursor
                    .read_array::<2>()
                    .map_err(|_| TrackError::ShortNote { status, position })?;
                self.note(status >= 0x90 && velocity > 0, pitch, velocity);
            }
            // Program change and channel aftertouch carry one data byte.
            0xC0..=0xDF => {
                cursor.read_u8()?;
            }
            0xA0..=0xBF | 0xE0..=0xEF => {
                cursor.read_array::<2>()?;
            }
            0xF0 | 0xF7 => {
                let length = vlq::decode(cursor)?;
                cursor.skip(length)?;
            }
            0xF1 | 0xF3 => {
                cursor.read_u8()?;
            }
            0xF2 => {
                cursor.read_array::<2>()?;
            }
            0xF4..=0xF6 | 0xF8..=0xFE => {}
            0xFF => return self.meta(cursor),
        }
        Ok(Step::Continue)
    }

    fn meta<R: Read + Seek>(&mut self, cursor: &mut ByteCursor<R>) -> Result<Step, TrackError> {
        let kind = cursor.read_u8()?;
        let length = vlq::decode(cursor)?;

        match (kind, length) {
            (META_SET_TEMPO, 3) => {
                let bytes = cursor.read_array::<3>()?;
                // Three bytes always fit.
                let microseconds_per_quarter_note = bytes_to_int(&bytes) as u32;
                self.push(RawEventKind::Tempo {
                    microseconds_per_quarter_note,
                });
            }
            (META_END_OF_TRACK, 0) => return Ok(Step::EndOfTrack),
            _ => cursor.skip(length)?,
        }
        Ok(Step::Continue)
    }

    fn note(&mut self, on: bool, pitch: u8, velocity: u8) {
        if !self.mapper.accepts(pitch) {
            trace!(track = self.index, pitch, "Dropping note outside the pitch range.");
            self.dropped_notes += 1;
            return;
        }
        self.push(if on {
            RawEventKind::NoteOn { pitch, velocity }
        } else {
            RawEventKind::NoteOff { pitch, velocity }
        });
    }

    fn push(&mut self, kind: RawEventKind) {
        self.events.push(RawEvent {
            ticks: self.ticks,
            track: self.index,
            kind,
        });
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pitch::{PitchRange, Policy};
    use crate::testutil::TrackBuilder;

    fn full_range() -> PitchMapper {
        PitchMapper::new(PitchRange::new(0, 127).unwrap(), Policy::Filter)
    }

    fn parse_one(chunk: &[u8], mapper: &PitchMapper) -> ParsedTrack {
        let mut cursor = ByteCursor::from_bytes(chunk);
        let track = parse(&mut cursor, 0, mapper).unwrap();
        assert_eq!(chunk.len() as u64, cursor.position());
        track
    }

    fn kinds(track: &ParsedTrack) -> Vec<(u64, RawEventKind)> {
        track.events.iter().map(|e| (e.ticks, e.kind)).collect()
    }

    #[test]
    fn test_running_status() {
        let chunk = TrackBuilder::new()
            .raw(&[0x00, 0x90, 60, 64])
            .raw(&[0x0A, 64, 64])
            .end_of_track()
            .build();
        let track = parse_one(&chunk, &full_range());

        assert_eq!(
            vec![
                (0, RawEventKind::NoteOn { pitch: 60, velocity: 64 }),
                (10, RawEventKind::NoteOn { pitch: 64, velocity: 64 }),
            ],
            kinds(&track)
        );
        assert!(matches!(track.end, TrackEnd::EndOfTrack));
    }

    #[test]
    fn test_zero_velocity_note_on_is_note_off() {
        let chunk = TrackBuilder::new()
            .raw(&[0x00, 0x91, 60, 100])
            .raw(&[0x60, 60, 0])
            .raw(&[0x00, 0x81, 62, 40])
            .end_of_track()
            .build();
        let track = parse_one(&chunk, &full_range());

        assert_eq!(
            vec![
                (0, RawEventKind::NoteOn { pitch: 60, velocity: 100 }),
                (0x60, RawEventKind::NoteOff { pitch: 60, velocity: 0 }),
                (0x60, RawEventKind::NoteOff { pitch: 62, velocity: 40 }),
            ],
            kinds(&track)
        );
    }

    #[test]
    fn test_tempo_and_skipped_events() {
        let chunk = TrackBuilder::new()
            // Track name meta event.
            .raw(&[0x00, 0xFF, 0x03, 0x04, b'l', b'e', b'a', b'd'])
            // Set tempo to 600000.
            .raw(&[0x00, 0xFF, 0x51, 0x03, 0x09, 0x27, 0xC0])
            // Malformed tempo with the wrong length is skipped.
            .raw(&[0x00, 0xFF, 0x51, 0x02, 0x01, 0x02])
            // Control change, program change, channel aftertouch, pitch bend.
            .raw(&[0x00, 0xB0, 0x07, 0x64])
            .raw(&[0x00, 0xC0, 0x05])
            .raw(&[0x00, 0xD0, 0x20])
            .raw(&[0x00, 0xE0, 0x00, 0x40])
            // SysEx with a two byte VLQ length.
            .raw(&[0x00, 0xF0, 0x81, 0x00])
            .raw(&[0x00; 128])
            // System common and realtime.
            .raw(&[0x00, 0xF2, 0x01, 0x02, 0x00, 0xF3, 0x01, 0x00, 0xF8])
            .raw(&[0x81, 0x00, 0x90, 72, 1])
            .end_of_track()
            .build();
        let track = parse_one(&chunk, &full_range());

        assert_eq!(
            vec![
                (
                    0,
                    RawEventKind::Tempo {
                        microseconds_per_quarter_note: 600_000
                    }
                ),
                (128, RawEventKind::NoteOn { pitch: 72, velocity: 1 }),
            ],
            kinds(&track)
        );
        assert!(matches!(track.end, TrackEnd::EndOfTrack));
    }

    #[test]
    fn test_running_status_survives_meta_events() {
        let chunk = TrackBuilder::new()
            .raw(&[0x00, 0x90, 60, 64])
            .raw(&[0x00, 0xFF, 0x01, 0x01, b'x'])
            .raw(&[0x05, 61, 64])
            .end_of_track()
            .build();
        let track = parse_one(&chunk, &full_range());
        assert_eq!(2, track.events.len());
        assert_eq!(5, track.events[1].ticks);
    }

    #[test]
    fn test_chunk_end_without_end_of_track() {
        let chunk = TrackBuilder::new().raw(&[0x00, 0x90, 60, 64]).build();
        let track = parse_one(&chunk, &full_range());
        assert_eq!(1, track.events.len());
        assert!(matches!(track.end, TrackEnd::ChunkEnd));
    }

    #[test]
    fn test_end_of_track_stops_before_chunk_end() {
        let chunk = TrackBuilder::new()
            .end_of_track()
            .raw(&[0x00, 0x90, 60, 64])
            .build();
        let track = parse_one(&chunk, &full_range());
        assert!(track.events.is_empty());
        assert!(matches!(track.end, TrackEnd::EndOfTrack));
    }

    #[test]
    fn test_desynchronized_without_running_status() {
        let chunk = TrackBuilder::new()
            .raw(&[0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20])
            .raw(&[0x00, 0x3C, 0x40])
            .end_of_track()
            .build();
        let track = parse_one(&chunk, &full_range());

        assert_eq!(1, track.events.len());
        assert!(matches!(
            track.end,
            TrackEnd::Failed(TrackError::Desynchronized { byte: 0x3C, .. })
        ));
    }

    #[test]
    fn test_short_note() {
        // The chunk claims more bytes than the file holds.
        let mut chunk = TrackBuilder::new().raw(&[0x00, 0x90, 60, 64]).build();
        chunk[7] += 2;
        chunk.extend_from_slice(&[0x00, 0x90]);
        let mut cursor = ByteCursor::from_bytes(&chunk);
        let track = parse(&mut cursor, 3, &full_range()).unwrap();

        assert_eq!(3, track.index);
        assert_eq!(1, track.events.len());
        assert!(matches!(
            track.end,
            TrackEnd::Failed(TrackError::ShortNote { status: 0x90, .. })
        ));
    }

    #[test]
    fn test_filtered_notes_keep_cursor_in_sync() {
        let mapper = PitchMapper::new(PitchRange::new(48, 83).unwrap(), Policy::Filter);
        let chunk = TrackBuilder::new()
            .raw(&[0x00, 0x90, 30, 64])
            .raw(&[0x00, 48, 64])
            .raw(&[0x10, 0x80, 30, 0])
            .raw(&[0x00, 0x80, 83, 0])
            .end_of_track()
            .build();
        let track = parse_one(&chunk, &mapper);

        assert_eq!(
            vec![
                (0, RawEventKind::NoteOn { pitch: 48, velocity: 64 }),
                (16, RawEventKind::NoteOff { pitch: 83, velocity: 0 }),
            ],
            kinds(&track)
        );
        assert_eq!(2, track.dropped_notes);
    }

    #[test]
    fn test_unexpected_chunk() {
        let mut chunk = TrackBuilder::new().end_of_track().build();
        chunk[..4].copy_from_slice(b"XFIH");
        let result = parse(&mut ByteCursor::from_bytes(&chunk), 1, &full_range());
        assert!(matches!(
            result,
            Err(ChunkError::UnexpectedChunk { index: 1, ref tag }) if tag == "XFIH"
        ));

        let result = parse(&mut ByteCursor::from_bytes(b"MTr"), 2, &full_range());
        assert!(matches!(result, Err(ChunkError::Truncated { index: 2, .. })));
    }

    #[test]
    fn test_event_past_chunk_end() {
        // The SysEx claims 16 bytes but the chunk ends after 4 of them.
        let mut chunk = TrackBuilder::new()
            .raw(&[0x00, 0x90, 60, 64])
            .raw(&[0x00, 0xF0, 0x10, 1, 2, 3, 4])
            .build();
        let declared = chunk.len();
        chunk.extend_from_slice(&[0x00; 12]);

        let mut cursor = ByteCursor::from_bytes(&chunk);
        let track = parse(&mut cursor, 0, &full_range()).unwrap();

        assert_eq!(declared as u64, cursor.position());
        assert_eq!(
            vec![(0, RawEventKind::NoteOn { pitch: 60, velocity: 64 })],
            kinds(&track)
        );
        assert!(matches!(
            track.end,
            TrackEnd::Failed(TrackError::PastChunkEnd {
                position: 12,
                chunk_end: 19
            })
        ));
    }

    #[test]
    fn test_meta_and_realtime_keep_running_status() {
        let chunk = TrackBuilder::new()
            .raw(&[0x00, 0x90, 60, 64])
            .raw(&[0x00, 0xFF, 0x01, 0x02, b'h', b'i'])
            .raw(&[0x00, 62, 64])
            .raw(&[0x00, 0xF8])
            .raw(&[0x00, 64, 64])
            .end_of_track()
            .build();
        let track = parse_one(&chunk, &full_range());

        assert_eq!(3, track.events.len());
        assert!(matches!(track.end, TrackEnd::EndOfTrack));
    }

    #[test]
    fn test_sysex_cancels_running_status() {
        let chunk = TrackBuilder::new()
            .raw(&[0x00, 0x90, 60, 64])
            .raw(&[0x00, 0xF0, 0x01, 0xF7])
            .raw(&[0x00, 62, 64])
            .end_of_track()
            .build();
        let track = parse_one(&chunk, &full_range());

        assert_eq!(1, track.events.len());
        assert!(matches!(
            track.end,
            TrackEnd::Failed(TrackError::Desynchronized { byte: 62, .. })
        ));
    }
}
