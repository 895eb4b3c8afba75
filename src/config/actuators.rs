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
use serde::Deserialize;

const DEFAULT_SYSFS_PREFIX: &str = "gpio";

/// A YAML representation of the actuator backend.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Actuators {
    /// Records state changes in memory.
    Mock {
        #[serde(default = "default_mock_name")]
        name: String,
        /// Channel ids that should fail to resolve.
        #[serde(default)]
        missing: Vec<u32>,
    },
    /// Logs state changes only.
    #[default]
    Log,
    /// Writes state changes to sysfs style value files.
    Sysfs(Sysfs),
}

fn default_mock_name() -> String {
    "mock-actuators".to_string()
}

/// A YAML representation of a sysfs actuator directory.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Sysfs {
    /// The directory holding one entry per actuator.
    root: String,

    /// The entry name prefix. The channel id follows it.
    prefix: Option<String>,

    /// Write 0 for on and 1 for off.
    active_low: Option<bool>,
}

impl Sysfs {
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or(DEFAULT_SYSFS_PREFIX)
    }

    pub fn active_low(&self) -> bool {
        self.active_low.unwrap_or(false)
    }
}
