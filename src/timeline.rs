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
use tracing::debug;

use crate::pitch::{Mapping, PitchMapper};
use crate::smf::{Division, ParsedFile, RawEvent, RawEventKind};

/// 120 BPM, the tempo every file starts at until it says otherwise.
pub const DEFAULT_MICROSECONDS_PER_QUARTER_NOTE: u32 = 500_000;

/// A note that survived pitch mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedNote {
    pub velocity: u8,
    pub mapping: Mapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Tempo { microseconds_per_quarter_note: u32 },
    NoteOff(MappedNote),
    NoteOn(MappedNote),
}

impl EventKind {
    /// Ordering among events on the same tick: tempo changes first so the notes
    /// they time see them, and note offs before note ons so a retriggered
    /// actuator is released before it is engaged again.
    fn rank(&self) -> u8 {
        match self {
            EventKind::Tempo { .. } => 0,
            EventKind::NoteOff(_) => 1,
            EventKind::NoteOn(_) => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineEvent {
    pub ticks: u64,
    pub kind: EventKind,
}

impl TimelineEvent {
    fn default_tempo() -> TimelineEvent {
        TimelineEvent {
            ticks: 0,
            kind: EventKind::Tempo {
                microseconds_per_quarter_note: DEFAULT_MICROSECONDS_PER_QUARTER_NOTE,
            },
        }
    }

    fn sort_key(&self) -> (u64, u8) {
        (self.ticks, self.kind.rank())
    }

    fn from_raw(raw: &RawEvent, mapper: &PitchMapper) -> Option<TimelineEvent> {
        let kind = match raw.kind {
            RawEventKind::Tempo {
                microseconds_per_quarter_note,
            } => EventKind::Tempo {
                microseconds_per_quarter_note,
            },
            RawEventKind::NoteOn { pitch, velocity } => EventKind::NoteOn(MappedNote {
                velocity,
                mapping: mapper.map(pitch)?,
            }),
            RawEventKind::NoteOff { pitch, velocity } => EventKind::NoteOff(MappedNote {
                velocity,
                mapping: mapper.map(pitch)?,
            }),
        };
        Some(TimelineEvent {
            ticks: raw.ticks,
            kind,
        })
    }
}

/// Every track's events merged into one ordered sequence. Ticks never decrease,
/// and events sharing a tick are ordered tempo, note off, note on. The timeline is
/// immutable once built and can be shared freely between threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    division: Division,
    events: Vec<TimelineEvent>,
}

impl Timeline {
    /// Merges the tracks of a parsed file, inserting the default tempo at tick 0.
    pub fn merge(parsed: &ParsedFile, mapper: &PitchMapper) -> Timeline {
        let events = parsed
            .tracks
            .iter()
            .flat_map(|track| track.events.iter())
            .filter_map(|raw| TimelineEvent::from_raw(raw, mapper));
        let timeline = Timeline::new(parsed.header.division, events);
        debug!(
            events = timeline.len(),
            last_tick = timeline.last_tick(),
            "Merged timeline."
        );
        timeline
    }

    /// Builds a timeline from arbitrary events. The default tempo is placed ahead
    /// of everything else at tick 0.
    pub fn new<I>(division: Division, events: I) -> Timeline
    where
        I: IntoIterator<Item = TimelineEvent>,
    {
        let mut all = vec![TimelineEvent::default_tempo()];
        all.extend(events);
        let mut timeline = Timeline {
            division,
            events: all,
        };
        timeline.sort();
        timeline
    }

    /// A stable sort by tick then rank. Sorting an ordered timeline is a no-op.
    fn sort(&mut self) {
        self.events.sort_by_key(TimelineEvent::sort_key);
    }

    pub fn is_ordered(&self) -> bool {
        self.events
            .windows(2)
            .all(|pair| pair[0].sort_key() <= pair[1].sort_key())
    }

    pub fn division(&self) -> Division {
        self.division
    }

    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn note_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| !matches!(event.kind, EventKind::Tempo { .. }))
            .count()
    }

    pub fn last_tick(&self) -> u64 {
        self.events.last().map_or(0, |event| event.ticks)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pitch::{PitchRange, Policy};
    use crate::smf;
    use crate::testutil::{SmfBuilder, TrackBuilder};

    const DIVISION: Division = Division::TicksPerQuarterNote(480);

    fn note(pitch: u8) -> MappedNote {
        MappedNote {
            velocity: 64,
            mapping: Mapping {
                channel_index: u32::from(pitch),
                pitch,
                mapped_pitch: None,
            },
        }
    }

    fn tempo(ticks: u64, microseconds_per_quarter_note: u32) -> TimelineEvent {
        TimelineEvent {
            ticks,
            kind: EventKind::Tempo {
                microseconds_per_quarter_note,
            },
        }
    }

    #[test]
    fn test_tie_break() {
        let timeline = Timeline::new(
            DIVISION,
            [
                TimelineEvent {
                    ticks: 100,
                    kind: EventKind::NoteOn(note(60)),
                },
                TimelineEvent {
                    ticks: 100,
                    kind: EventKind::NoteOff(note(60)),
                },
                tempo(100, 400_000),
            ],
        );

        let kinds: Vec<u8> = timeline.events()[1..]
            .iter()
            .map(|event| event.kind.rank())
            .collect();
        assert_eq!(vec![0, 1, 2], kinds);
        assert_eq!(tempo(100, 400_000), timeline.events()[1]);
        assert!(timeline.is_ordered());
    }

    #[test]
    fn test_default_tempo_comes_first() {
        let timeline = Timeline::new(DIVISION, [tempo(0, 600_000)]);

        assert_eq!(
            vec![tempo(0, DEFAULT_MICROSECONDS_PER_QUARTER_NOTE), tempo(0, 600_000)],
            timeline.events().to_vec()
        );

        let empty = Timeline::new(DIVISION, []);
        assert_eq!(1, empty.len());
        assert_eq!(0, empty.note_count());
    }

    #[test]
    fn test_sort_is_stable_and_idempotent() {
        let mut timeline = Timeline::new(
            DIVISION,
            [
                TimelineEvent {
                    ticks: 20,
                    kind: EventKind::NoteOn(note(61)),
                },
                TimelineEvent {
                    ticks: 10,
                    kind: EventKind::NoteOn(note(62)),
                },
                TimelineEvent {
                    ticks: 20,
                    kind: EventKind::NoteOn(note(60)),
                },
            ],
        );
        let pitches: Vec<u8> = timeline.events()[1..]
            .iter()
            .filter_map(|event| match event.kind {
                EventKind::NoteOn(note) => Some(note.mapping.pitch),
                _ => None,
            })
            .collect();
        assert_eq!(vec![62, 61, 60], pitches);

        let before = timeline.clone();
        timeline.sort();
        assert_eq!(before, timeline);
    }

    #[test]
    fn test_merge_tracks() {
        let bytes = SmfBuilder::new(1, 480)
            .track(TrackBuilder::new().tempo(100, 400_000).end_of_track())
            .track(
                TrackBuilder::new()
                    .event(100, &[0x90, 84, 64])
                    .event(0, &[0x80, 30, 0])
                    .end_of_track(),
            )
            .track(
                TrackBuilder::new()
                    .event(50, &[0x90, 48, 64])
                    .event(50, &[0x80, 48, 0])
                    .end_of_track(),
            )
            .build();
        let mapper = PitchMapper::new(PitchRange::new(48, 83).unwrap(), Policy::Wrap);
        let parsed = smf::parse_bytes(&bytes, &mapper).unwrap();
        let timeline = Timeline::merge(&parsed, &mapper);

        assert!(timeline.is_ordered());
        assert_eq!(DIVISION, timeline.division());
        assert_eq!(6, timeline.len());
        assert_eq!(4, timeline.note_count());
        assert_eq!(100, timeline.last_tick());

        let summary: Vec<(u64, u8, Option<u32>)> = timeline
            .events()
            .iter()
            .map(|event| match event.kind {
                EventKind::Tempo { .. } => (event.ticks, 0, None),
                EventKind::NoteOff(note) => (event.ticks, 1, Some(note.mapping.channel_index)),
                EventKind::NoteOn(note) => (event.ticks, 2, Some(note.mapping.channel_index)),
            })
            .collect();
        assert_eq!(
            vec![
                (0, 0, None),
                (50, 2, Some(1)),
                (100, 0, None),
                (100, 1, Some(19)),
                (100, 1, Some(1)),
                (100, 2, Some(1)),
            ],
            summary
        );
    }

    #[test]
    fn test_merge_applies_filter() {
        let mapper = PitchMapper::new(PitchRange::new(48, 83).unwrap(), Policy::Filter);
        let bytes = SmfBuilder::new(0, 480)
            .track(
                TrackBuilder::new()
                    .event(0, &[0x90, 30, 64])
                    .event(0, &[0x90, 60, 64])
                    .end_of_track(),
            )
            .build();
        let parsed = smf::parse_bytes(&bytes, &mapper).unwrap();
        let timeline = Timeline::merge(&parsed, &mapper);

        assert_eq!(1, timeline.note_count());
        assert_eq!(1, parsed.dropped_notes());
    }
}
