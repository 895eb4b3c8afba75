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
    fmt, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{debug, error};

use super::ActuatorError;

/// Drives actuators exposed as directories under a common root, each holding a
/// `value` file that accepts `1` and `0`, as with Linux sysfs GPIO lines. The
/// directory for channel id N is named `<prefix>N`.
pub struct Sink {
    root: PathBuf,
    prefix: String,
    active_low: bool,
}

impl Sink {
    pub fn open(root: PathBuf, prefix: &str, active_low: bool) -> Result<Sink, ActuatorError> {
        if !root.is_dir() {
            return Err(ActuatorError::MissingRoot(root));
        }
        debug!(root = %root.display(), prefix, active_low, "Opened sysfs actuators.");
        Ok(Sink {
            root,
            prefix: prefix.to_string(),
            active_low,
        })
    }

    fn value_path(&self, channel_id: u32) -> PathBuf {
        self.root
            .join(format!("{}{}", self.prefix, channel_id))
            .join("value")
    }

    /// The channel id encoded in a directory name, if it is one of ours.
    fn channel_id(&self, name: &str) -> Option<u32> {
        name.strip_prefix(&self.prefix)?.parse().ok()
    }
}

impl super::ActuatorSink for Sink {
    fn resolve(&self, channel_id: u32) -> Option<Arc<dyn super::Actuator>> {
        let path = self.value_path(channel_id);
        if !path.is_file() {
            return None;
        }
        Some(Arc::new(Actuator {
            channel_id,
            path,
            active_low: self.active_low,
        }))
    }

    fn list(&self) -> Result<Option<Vec<u32>>, ActuatorError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(channel_id) = name.to_str().and_then(|name| self.channel_id(name)) else {
                continue;
            };
            if entry.path().join("value").is_file() {
                ids.push(channel_id);
            }
        }
        ids.sort_unstable();
        Ok(Some(ids))
    }
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}* (sysfs)", self.root.display(), self.prefix)
    }
}

struct Actuator {
    channel_id: u32,
    path: PathBuf,
    active_low: bool,
}

impl Actuator {
    fn write(path: &Path, level: bool) -> std::io::Result<()> {
        fs::write(path, if level { "1" } else { "0" })
    }
}

impl super::Actuator for Actuator {
    fn set_state(&self, on: bool) {
        if let Err(e) = Actuator::write(&self.path, on != self.active_low) {
            error!(
                channel = self.channel_id,
                path = %self.path.display(),
                err = %e,
                "Unable to set actuator state."
            );
        }
    }
}

impl fmt::Display for Actuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}
