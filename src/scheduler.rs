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
    sync::Arc,
    time::{Duration, Instant},
};

use serde::Serialize;
use tracing::{debug, info, span, warn, Level};

use crate::actuator::ActuatorSink;
use crate::playsync::CancelHandle;
use crate::smf::Division;
use crate::timeline::{EventKind, MappedNote, Timeline, DEFAULT_MICROSECONDS_PER_QUARTER_NOTE};

/// Waits shorter than this are finished with a spin sleep rather than a condvar
/// wait, which can oversleep by a scheduler quantum.
const SPIN_THRESHOLD: Duration = Duration::from_millis(2);

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PlaybackError {
    #[error("cannot schedule a file with {0}")]
    InvalidDivision(Division),

    #[error("event at tick {0} is too far in the future to schedule")]
    TimeOverflow(u64),
}

/// Seconds per tick for a metrical division.
pub fn seconds_per_tick(microseconds_per_quarter_note: u32, ticks_per_quarter_note: u16) -> f64 {
    f64::from(microseconds_per_quarter_note) / 1_000_000.0 / f64::from(ticks_per_quarter_note)
}

/// Scratch state for a single playback pass.
struct TempoState {
    current_microseconds_per_quarter_note: u32,
    seconds_per_tick: f64,
    last_event_ticks: u64,
    /// Ticks per quarter note, or None when ticks have a fixed SMPTE duration.
    ticks_per_quarter_note: Option<u16>,
}

impl TempoState {
    fn new(division: Division) -> Result<TempoState, PlaybackError> {
        let (ticks_per_quarter_note, seconds_per_tick) = match division {
            Division::TicksPerQuarterNote(0)
            | Division::Smpte {
                frames_per_second: 0,
                ..
            }
            | Division::Smpte {
                ticks_per_frame: 0, ..
            } => return Err(PlaybackError::InvalidDivision(division)),
            Division::TicksPerQuarterNote(tpqn) => (
                Some(tpqn),
                seconds_per_tick(DEFAULT_MICROSECONDS_PER_QUARTER_NOTE, tpqn),
            ),
            Division::Smpte {
                frames_per_second,
                ticks_per_frame,
            } => {
                // 29 stands for 29.97 drop frame.
                let fps = if frames_per_second == 29 {
                    29.97
                } else {
                    f64::from(frames_per_second)
                };
                (None, 1.0 / (fps * f64::from(ticks_per_frame)))
            }
        };

        Ok(TempoState {
            current_microseconds_per_quarter_note: DEFAULT_MICROSECONDS_PER_QUARTER_NOTE,
            seconds_per_tick,
            last_event_ticks: 0,
            ticks_per_quarter_note,
        })
    }

    /// Applies a tempo event. Returns true if the tempo actually changed.
    fn set_tempo(&mut self, microseconds_per_quarter_note: u32) -> bool {
        if microseconds_per_quarter_note == self.current_microseconds_per_quarter_note {
            return false;
        }
        self.current_microseconds_per_quarter_note = microseconds_per_quarter_note;
        if let Some(tpqn) = self.ticks_per_quarter_note {
            self.seconds_per_tick = seconds_per_tick(microseconds_per_quarter_note, tpqn);
        }
        true
    }

    /// Moves to the given tick and returns the seconds that pass on the way.
    fn advance(&mut self, ticks: u64) -> f64 {
        let delta = ticks.saturating_sub(self.last_event_ticks);
        self.last_event_ticks = self.last_event_ticks.max(ticks);
        delta as f64 * self.seconds_per_tick
    }
}

/// Suspends playback until a point measured from the start of playback.
pub trait Timer {
    /// Marks the start of playback.
    fn start(&mut self);

    /// Waits until `offset` has passed since [`Timer::start`]. Returns false if
    /// the wait was cut short by cancellation.
    fn wait_until(&mut self, offset: Duration, cancel: &CancelHandle) -> bool;
}

/// A wall clock timer. Every wait targets an absolute offset from the start
/// instant, so time spent actuating does not accumulate as drift.
#[derive(Default)]
pub struct AccurateTimer {
    start: Option<Instant>,
}

impl AccurateTimer {
    pub fn new() -> AccurateTimer {
        AccurateTimer::default()
    }
}

impl Timer for AccurateTimer {
    fn start(&mut self) {
        self.start = Some(Instant::now());
    }

    fn wait_until(&mut self, offset: Duration, cancel: &CancelHandle) -> bool {
        let deadline = *self.start.get_or_insert_with(Instant::now) + offset;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return !cancel.is_cancelled();
            }

            let remaining = deadline - now;
            if remaining <= SPIN_THRESHOLD {
                spin_sleep::sleep(remaining);
                return !cancel.is_cancelled();
            }
            if cancel.wait_timeout(remaining - SPIN_THRESHOLD) {
                return false;
            }
        }
    }
}

/// A timer that never sleeps. Used for dry runs and tests.
#[derive(Default)]
pub struct VirtualTimer {
    now: Duration,
}

impl VirtualTimer {
    pub fn new() -> VirtualTimer {
        VirtualTimer::default()
    }

    /// The furthest point waited for.
    pub fn now(&self) -> Duration {
        self.now
    }
}

impl Timer for VirtualTimer {
    fn start(&mut self) {
        self.now = Duration::ZERO;
    }

    fn wait_until(&mut self, offset: Duration, cancel: &CancelHandle) -> bool {
        self.now = self.now.max(offset);
        !cancel.is_cancelled()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Tempo,
    NoteOn,
    NoteOff,
}

/// What happened for one timeline event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    /// Scheduled time since the start of playback.
    pub wall_clock_seconds: f64,
    pub ticks: u64,
    pub event_type: EventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_pitch_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped_pitch_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub microseconds_per_quarter_note: Option<u32>,
    /// For notes, whether an actuator was found for the channel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actuated: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackSummary {
    /// Timeline events processed, tempo events included.
    pub events: usize,
    pub actuated: usize,
    /// Notes with no actuator behind their channel.
    pub skipped: usize,
    pub tempo_changes: usize,
    pub cancelled: bool,
    /// Scheduled time of the last processed event.
    pub elapsed: Duration,
}

/// Walks a timeline in order, waiting out the gaps between events and switching
/// actuators on and off.
pub struct Scheduler<T: Timer> {
    timer: T,
    sink: Arc<dyn ActuatorSink>,
    channel_index_base: u32,
    cancel_handle: CancelHandle,
}

impl<T: Timer> Scheduler<T> {
    pub fn new(
        timer: T,
        sink: Arc<dyn ActuatorSink>,
        channel_index_base: u32,
        cancel_handle: CancelHandle,
    ) -> Scheduler<T> {
        Scheduler {
            timer,
            sink,
            channel_index_base,
            cancel_handle,
        }
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn play(&mut self, timeline: &Timeline) -> Result<PlaybackSummary, PlaybackError> {
        self.play_observed(timeline, |_| {})
    }

    /// Plays the timeline, handing a record of every processed event to `observer`.
    pub fn play_observed<F>(
        &mut self,
        timeline: &Timeline,
        mut observer: F,
    ) -> Result<PlaybackSummary, PlaybackError>
    where
        F: FnMut(&EventRecord),
    {
        let span = span!(Level::INFO, "play timeline");
        let _enter = span.enter();

        let mut state = TempoState::new(timeline.division())?;
        let mut summary = PlaybackSummary::default();
        let mut elapsed_seconds = 0.0;

        info!(
            sink = %self.sink,
            events = timeline.len(),
            notes = timeline.note_count(),
            "Starting playback."
        );
        self.timer.start();

        for event in timeline.events() {
            if self.cancel_handle.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            // The gap before an event runs at the tempo in effect before it.
            let delay = state.advance(event.ticks);
            if delay > 0.0 {
                elapsed_seconds += delay;
                let offset = Duration::try_from_secs_f64(elapsed_seconds)
                    .map_err(|_| PlaybackError::TimeOverflow(event.ticks))?;
                if !self.timer.wait_until(offset, &self.cancel_handle) {
                    summary.cancelled = true;
                    break;
                }
                summary.elapsed = offset;
            }

            let record = match event.kind {
                EventKind::Tempo {
                    microseconds_per_quarter_note,
                } => {
                    if state.set_tempo(microseconds_per_quarter_note) {
                        summary.tempo_changes += 1;
                        info!(
                            ticks = event.ticks,
                            seconds = elapsed_seconds,
                            bpm = 60_000_000.0 / f64::from(microseconds_per_quarter_note.max(1)),
                            "Tempo change."
                        );
                    }
                    EventRecord {
                        wall_clock_seconds: elapsed_seconds,
                        ticks: event.ticks,
                        event_type: EventType::Tempo,
                        original_pitch_name: None,
                        mapped_pitch_name: None,
                        channel_id: None,
                        microseconds_per_quarter_note: Some(microseconds_per_quarter_note),
                        actuated: None,
                    }
                }
                EventKind::NoteOn(note) => {
                    self.note_record(&note, true, event.ticks, elapsed_seconds, &mut summary)
                }
                EventKind::NoteOff(note) => {
                    self.note_record(&note, false, event.ticks, elapsed_seconds, &mut summary)
                }
            };
            summary.events += 1;
            observer(&record);
        }

        if summary.cancelled {
            info!(events = summary.events, "Playback has been cancelled.");
        } else {
            info!(
                actuated = summary.actuated,
                skipped = summary.skipped,
                elapsed = ?summary.elapsed,
                "Playback finished."
            );
        }
        Ok(summary)
    }

    fn note_record(
        &self,
        note: &MappedNote,
        on: bool,
        ticks: u64,
        elapsed_seconds: f64,
        summary: &mut PlaybackSummary,
    ) -> EventRecord {
        let channel_id = self
            .channel_index_base
            .saturating_add(note.mapping.channel_index);
        let actuated = match self.sink.resolve(channel_id) {
            Some(actuator) => {
                debug!(channel = channel_id, on, actuator = %actuator, "Setting actuator.");
                actuator.set_state(on);
                summary.actuated += 1;
                true
            }
            None => {
                warn!(
                    channel = channel_id,
                    pitch = note.mapping.original_name(),
                    "No actuator found for channel, skipping note."
                );
                summary.skipped += 1;
                false
            }
        };

        EventRecord {
            wall_clock_seconds: elapsed_seconds,
            ticks,
            event_type: if on {
                EventType::NoteOn
            } else {
                EventType::NoteOff
            },
            original_pitch_name: Some(note.mapping.original_name()),
            mapped_pitch_name: note.mapping.mapped_name(),
            channel_id: Some(channel_id),
            microseconds_per_quarter_note: None,
            actuated: Some(actuated),
        }
    }
}
