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
use std::{collections::HashSet, fmt, sync::Arc};

use parking_lot::Mutex;
use tracing::debug;

/// A mock sink. Records every state change instead of driving hardware.
#[derive(Clone)]
pub struct Sink {
    name: String,
    missing: HashSet<u32>,
    recording: bool,
    calls: Arc<Mutex<Vec<(u32, bool)>>>,
}

impl Sink {
    pub fn new(name: &str) -> Sink {
        Sink {
            name: name.to_string(),
            missing: HashSet::new(),
            recording: true,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Channel ids that will not resolve.
    pub fn with_missing(mut self, missing: &[u32]) -> Sink {
        self.missing.extend(missing);
        self
    }

    /// Accepts state changes without keeping them.
    pub fn without_recording(mut self) -> Sink {
        self.recording = false;
        self
    }

    /// The (channel id, state) pairs set so far, in order.
    #[cfg(test)]
    pub fn calls(&self) -> Vec<(u32, bool)> {
        self.calls.lock().clone()
    }
}

impl super::ActuatorSink for Sink {
    fn resolve(&self, channel_id: u32) -> Option<Arc<dyn super::Actuator>> {
        if self.missing.contains(&channel_id) {
            return None;
        }
        Some(Arc::new(Actuator {
            channel_id,
            calls: self.recording.then(|| self.calls.clone()),
        }))
    }

    fn list(&self) -> Result<Option<Vec<u32>>, super::ActuatorError> {
        Ok(None)
    }
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

struct Actuator {
    channel_id: u32,
    calls: Option<Arc<Mutex<Vec<(u32, bool)>>>>,
}

impl super::Actuator for Actuator {
    fn set_state(&self, on: bool) {
        debug!(channel = self.channel_id, on, "Mock actuator state.");
        if let Some(calls) = &self.calls {
            calls.lock().push((self.channel_id, on));
        }
    }
}

impl fmt::Display for Actuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mock {}", self.channel_id)
    }
}
