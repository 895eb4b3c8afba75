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
use std::{fmt, sync::Arc};

use tracing::info;

/// A sink with no hardware behind it. Every channel resolves and state changes
/// are only logged, which is handy for rehearsing a file.
#[derive(Default)]
pub struct Sink {}

impl Sink {
    pub fn new() -> Sink {
        Sink {}
    }
}

impl super::ActuatorSink for Sink {
    fn resolve(&self, channel_id: u32) -> Option<Arc<dyn super::Actuator>> {
        Some(Arc::new(Actuator { channel_id }))
    }

    fn list(&self) -> Result<Option<Vec<u32>>, super::ActuatorError> {
        Ok(None)
    }
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "log")
    }
}

struct Actuator {
    channel_id: u32,
}

impl super::Actuator for Actuator {
    fn set_state(&self, on: bool) {
        info!(
            channel = self.channel_id,
            state = if on { "on" } else { "off" },
            "Actuator."
        );
    }
}

impl fmt::Display for Actuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "log {}", self.channel_id)
    }
}
