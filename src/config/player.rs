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
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use super::actuators::Actuators;
use super::error::ConfigError;
use crate::pitch::{PitchMapper, PitchRange, Policy};

pub const DEFAULT_LOWEST_PITCH: u8 = 48;
pub const DEFAULT_HIGHEST_PITCH: u8 = 83;
const DEFAULT_PLAYBACK_DELAY: Duration = Duration::ZERO;

/// The configuration for the player.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Player {
    /// The pitch driving the first actuator.
    lowest_pitch: Option<u8>,
    /// The pitch driving the last actuator.
    highest_pitch: Option<u8>,
    /// Added to the 1-based channel index to form the actuator's channel id.
    channel_index_base: Option<u32>,
    /// What to do with pitches outside the range.
    policy: Option<Policy>,
    /// Controls how long to wait before playback starts.
    playback_delay: Option<String>,
    /// The actuator backend.
    actuators: Option<Actuators>,
}

/// Values given on the command line, which take precedence over the file.
#[derive(Default, Debug)]
pub struct Overrides {
    pub lowest_pitch: Option<u8>,
    pub highest_pitch: Option<u8>,
    pub channel_index_base: Option<u32>,
    pub policy: Option<Policy>,
}

impl Player {
    /// Applies command line overrides.
    pub fn with_overrides(mut self, overrides: Overrides) -> Player {
        self.lowest_pitch = overrides.lowest_pitch.or(self.lowest_pitch);
        self.highest_pitch = overrides.highest_pitch.or(self.highest_pitch);
        self.channel_index_base = overrides.channel_index_base.or(self.channel_index_base);
        self.policy = overrides.policy.or(self.policy);
        self
    }

    /// The pitch mapper described by the range and policy.
    pub fn mapper(&self) -> Result<PitchMapper, ConfigError> {
        let range = PitchRange::new(
            self.lowest_pitch.unwrap_or(DEFAULT_LOWEST_PITCH),
            self.highest_pitch.unwrap_or(DEFAULT_HIGHEST_PITCH),
        )?;
        Ok(PitchMapper::new(range, self.policy.unwrap_or_default()))
    }

    pub fn channel_index_base(&self) -> u32 {
        self.channel_index_base.unwrap_or(0)
    }

    pub fn playback_delay(&self) -> Result<Duration, ConfigError> {
        match &self.playback_delay {
            Some(playback_delay) => Ok(DurationString::from_string(playback_delay.clone())?.into()),
            None => Ok(DEFAULT_PLAYBACK_DELAY),
        }
    }

    pub fn actuators(&self) -> Actuators {
        self.actuators.clone().unwrap_or_default()
    }
}
