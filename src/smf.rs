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
    fs::File,
    io::{self, BufReader, Cursor, Read, Seek},
    path::Path,
};

use tracing::{debug, info, span, warn, Level};

use crate::pitch::PitchMapper;

pub mod cursor;
pub mod header;
mod track;
pub mod vlq;

pub use self::cursor::ByteCursor;
pub use self::header::{Division, Format, HeaderInfo};
pub use self::track::{ChunkError, ParsedTrack, RawEvent, RawEventKind, TrackEnd, TrackError};

/// Errors that prevent a file from being parsed at all.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A parsed Standard MIDI File. Tracks that failed part way keep the events
/// read before the failure.
#[derive(Debug)]
pub struct ParsedFile {
    pub header: HeaderInfo,
    pub tracks: Vec<ParsedTrack>,
    /// Set when a track chunk header could not be read. Tracks after it were
    /// not attempted.
    pub stopped: Option<ChunkError>,
}

impl ParsedFile {
    /// The number of note and tempo events across all tracks.
    pub fn event_count(&self) -> usize {
        self.tracks.iter().map(|track| track.events.len()).sum()
    }

    pub fn dropped_notes(&self) -> usize {
        self.tracks.iter().map(|track| track.dropped_notes).sum()
    }

    pub fn failed_tracks(&self) -> impl Iterator<Item = &ParsedTrack> {
        self.tracks
            .iter()
            .filter(|track| matches!(track.end, TrackEnd::Failed(_)))
    }
}

/// Parses a Standard MIDI File from a seekable source.
pub fn parse<R: Read + Seek>(source: R, mapper: &PitchMapper) -> Result<ParsedFile, ParseError> {
    let span = span!(Level::DEBUG, "parse midi");
    let _enter = span.enter();

    let mut cursor = ByteCursor::new(source).map_err(|e| match e {
        cursor::CursorError::Io(e) => ParseError::Io(e),
        e => ParseError::InvalidHeader(e.to_string()),
    })?;
    let header = header::parse(&mut cursor)?;
    debug!(
        format = ?header.format,
        tracks = header.track_count,
        division = %header.division,
        "Parsed header."
    );
    if header.reduced_accuracy() {
        warn!(
            division = %header.division,
            "File uses SMPTE timing, tempo events will not affect playback."
        );
    }

    let mut tracks = Vec::with_capacity(usize::from(header.track_count));
    let mut stopped = None;
    for index in 0..usize::from(header.track_count) {
        match track::parse(&mut cursor, index, mapper) {
            Ok(track) => {
                match &track.end {
                    TrackEnd::Failed(e) => warn!(
                        track = index,
                        events = track.events.len(),
                        err = %e,
                        "Track stopped early, keeping the events read so far."
                    ),
                    end => debug!(
                        track = index,
                        events = track.events.len(),
                        dropped = track.dropped_notes,
                        end = ?end,
                        "Parsed track."
                    ),
                }
                tracks.push(track);
            }
            Err(e) => {
                warn!(err = %e, "Unable to read track chunk, skipping the remaining tracks.");
                stopped = Some(e);
                break;
            }
        }
    }

    let parsed = ParsedFile {
        header,
        tracks,
        stopped,
    };
    info!(
        tracks = parsed.tracks.len(),
        events = parsed.event_count(),
        dropped = parsed.dropped_notes(),
        "Parsed MIDI file."
    );
    Ok(parsed)
}

/// Parses an in-memory Standard MIDI File.
pub fn parse_bytes(bytes: &[u8], mapper: &PitchMapper) -> Result<ParsedFile, ParseError> {
    parse(Cursor::new(bytes), mapper)
}

/// Parses a Standard MIDI File from disk.
pub fn parse_file(path: &Path, mapper: &PitchMapper) -> Result<ParsedFile, ParseError> {
    parse(BufReader::new(File::open(path)?), mapper)
}
