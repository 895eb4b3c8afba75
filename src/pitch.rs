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
use std::fmt;

use serde::Deserialize;

const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// The highest valid MIDI pitch.
const MAX_PITCH: u8 = 127;

/// Formats a MIDI pitch using the convention where middle C (60) is C4.
pub fn pitch_name(pitch: u8) -> String {
    let octave = i32::from(pitch / 12) - 1;
    format!("{}{}", PITCH_CLASSES[usize::from(pitch % 12)], octave)
}

/// What happens to pitches that fall outside the actuator range.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Out of range pitches are dropped.
    #[default]
    Filter,
    /// Out of range pitches are folded into the range.
    Wrap,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Filter => write!(f, "filter"),
            Policy::Wrap => write!(f, "wrap"),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PitchRangeError {
    #[error("lowest pitch {lowest} is above highest pitch {highest}")]
    Inverted { lowest: u8, highest: u8 },

    #[error("pitch {0} is outside the MIDI range 0-127")]
    OutOfRange(u8),
}

/// An inclusive range of pitches, one actuator per pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchRange {
    lowest: u8,
    highest: u8,
}

impl PitchRange {
    pub fn new(lowest: u8, highest: u8) -> Result<PitchRange, PitchRangeError> {
        for pitch in [lowest, highest] {
            if pitch > MAX_PITCH {
                return Err(PitchRangeError::OutOfRange(pitch));
            }
        }
        if lowest > highest {
            return Err(PitchRangeError::Inverted { lowest, highest });
        }
        Ok(PitchRange { lowest, highest })
    }

    pub fn lowest(&self) -> u8 {
        self.lowest
    }

    pub fn highest(&self) -> u8 {
        self.highest
    }

    /// The number of actuators covered by the range.
    pub fn len(&self) -> u32 {
        u32::from(self.highest - self.lowest) + 1
    }

    pub fn contains(&self, pitch: u8) -> bool {
        (self.lowest..=self.highest).contains(&pitch)
    }
}

impl fmt::Display for PitchRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{} ({} channels)",
            pitch_name(self.lowest),
            pitch_name(self.highest),
            self.len()
        )
    }
}

/// The actuator-facing view of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    /// 1-based index into the pitch range.
    pub channel_index: u32,
    /// The pitch found in the file.
    pub pitch: u8,
    /// The pitch the actuator stands for. Always set under the wrap policy, even
    /// for pitches already inside the range.
    pub mapped_pitch: Option<u8>,
}

impl Mapping {
    pub fn original_name(&self) -> String {
        pitch_name(self.pitch)
    }

    pub fn mapped_name(&self) -> Option<String> {
        self.mapped_pitch.map(pitch_name)
    }
}

/// Converts pitches into channel indices under the configured policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchMapper {
    range: PitchRange,
    policy: Policy,
}

impl PitchMapper {
    pub fn new(range: PitchRange, policy: Policy) -> PitchMapper {
        PitchMapper { range, policy }
    }

    pub fn range(&self) -> PitchRange {
        self.range
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Whether a note with this pitch produces an event at all.
    pub fn accepts(&self, pitch: u8) -> bool {
        match self.policy {
            Policy::Filter => self.range.contains(pitch),
            Policy::Wrap => true,
        }
    }

    /// Maps a pitch to its channel, or None if the policy discards it.
    pub fn map(&self, pitch: u8) -> Option<Mapping> {
        match self.policy {
            Policy::Filter => self.range.contains(pitch).then(|| Mapping {
                channel_index: u32::from(pitch - self.range.lowest) + 1,
                pitch,
                mapped_pitch: None,
            }),
            Policy::Wrap => {
                let offset = i64::from(pitch) - i64::from(self.range.lowest);
                let wrapped = offset.rem_euclid(i64::from(self.range.len()));
                // The range never exceeds 128 pitches, so these conversions are exact.
                let wrapped = u8::try_from(wrapped).ok()?;
                Some(Mapping {
                    channel_index: u32::from(wrapped) + 1,
                    pitch,
                    mapped_pitch: Some(self.range.lowest + wrapped),
                })
            }
        }
    }
}
