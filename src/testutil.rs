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
//! Builders for hand-assembled MIDI files used throughout the tests.

/// Assembles the body of an `MTrk` chunk from raw event bytes.
#[derive(Default, Clone)]
pub struct TrackBuilder {
    data: Vec<u8>,
}

impl TrackBuilder {
    pub fn new() -> TrackBuilder {
        TrackBuilder::default()
    }

    /// Appends bytes verbatim, delta times included.
    pub fn raw(mut self, bytes: &[u8]) -> TrackBuilder {
        self.data.extend_from_slice(bytes);
        self
    }

    /// Appends an event with the given delta time.
    pub fn event(self, delta: u64, bytes: &[u8]) -> TrackBuilder {
        self.raw(&crate::smf::vlq::encode(delta)).raw(bytes)
    }

    pub fn tempo(self, delta: u64, microseconds_per_quarter_note: u32) -> TrackBuilder {
        let [_, a, b, c] = microseconds_per_quarter_note.to_be_bytes();
        self.event(delta, &[0xFF, 0x51, 0x03, a, b, c])
    }

    pub fn end_of_track(self) -> TrackBuilder {
        self.raw(&[0x00, 0xFF, 0x2F, 0x00])
    }

    /// Produces the full chunk, id and length included.
    pub fn build(&self) -> Vec<u8> {
        let mut chunk = b"MTrk".to_vec();
        chunk.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        chunk.extend_from_slice(&self.data);
        chunk
    }
}

/// Assembles a complete Standard MIDI File.
pub struct SmfBuilder {
    format: u16,
    division: u16,
    tracks: Vec<TrackBuilder>,
}

impl SmfBuilder {
    pub fn new(format: u16, division: u16) -> SmfBuilder {
        SmfBuilder {
            format,
            division,
            tracks: Vec::new(),
        }
    }

    pub fn track(mut self, track: TrackBuilder) -> SmfBuilder {
        self.tracks.push(track);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut bytes = b"MThd".to_vec();
        bytes.extend_from_slice(&6u32.to_be_bytes());
        bytes.extend_from_slice(&self.format.to_be_bytes());
        bytes.extend_from_slice(&(self.tracks.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&self.division.to_be_bytes());
        for track in &self.tracks {
            bytes.extend_from_slice(&track.build());
        }
        bytes
    }
}

/// One note on at tick 0 and its note off ten ticks later, 480 ticks per quarter
/// note and no tempo events.
pub fn single_note_file(pitch: u8) -> Vec<u8> {
    SmfBuilder::new(0, 480)
        .track(
            TrackBuilder::new()
                .event(0, &[0x90, pitch, 100])
                .event(10, &[0x80, pitch, 0])
                .end_of_track(),
        )
        .build()
}
