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
use std::{fmt, io, path::PathBuf, sync::Arc};

use crate::config::Actuators;

mod logging;
mod mock;
mod sysfs;

#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[error("actuator directory {0} does not exist")]
    MissingRoot(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A single binary output.
pub trait Actuator: fmt::Display + Send + Sync {
    /// Switches the output on or off. Failures are reported by the implementation
    /// and never interrupt playback.
    fn set_state(&self, on: bool);
}

/// Resolves channel ids to actuators. Lookups may fail at any time, for example
/// when a device disappears mid-song.
pub trait ActuatorSink: fmt::Display + Send + Sync {
    /// Returns the actuator for the channel id, if one is present.
    fn resolve(&self, channel_id: u32) -> Option<Arc<dyn Actuator>>;

    /// Lists the channel ids the sink currently knows about, if it can enumerate them.
    fn list(&self) -> Result<Option<Vec<u32>>, ActuatorError>;
}

/// Creates the actuator sink described by the configuration.
pub fn get_sink(config: &Actuators) -> Result<Arc<dyn ActuatorSink>, ActuatorError> {
    Ok(match config {
        Actuators::Mock { name, missing } => {
            Arc::new(mock::Sink::new(name).with_missing(missing))
        }
        Actuators::Log => Arc::new(logging::Sink::new()),
        Actuators::Sysfs(sysfs) => Arc::new(sysfs::Sink::open(
            PathBuf::from(sysfs.root()),
            sysfs.prefix(),
            sysfs.active_low(),
        )?),
    })
}

/// A sink that accepts every channel and keeps nothing, for dry runs.
pub fn dry_run_sink() -> Arc<dyn ActuatorSink> {
    Arc::new(mock::Sink::new("dry-run").without_recording())
}
