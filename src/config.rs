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
use std::path::Path;

use config::{Config, Environment, File};
use tracing::debug;

mod actuators;
mod error;
mod player;

pub use self::actuators::{Actuators, Sysfs};
pub use self::error::ConfigError;
pub use self::player::{Overrides, Player};

/// Loads the player configuration. Values from the file can be overridden with
/// `KEYSTRIKE_` environment variables, e.g. `KEYSTRIKE_POLICY=wrap`.
pub fn load_player(path: Option<&Path>) -> Result<Player, ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        debug!(path = %path.display(), "Loading player configuration.");
        builder = builder.add_source(File::from(path));
    }
    Ok(builder
        .add_source(Environment::with_prefix("KEYSTRIKE"))
        .build()?
        .try_deserialize::<Player>()?)
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs};

    use super::*;
    use crate::pitch::Policy;

    #[test]
    fn test_load_player() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("player.yaml");
        fs::write(
            &path,
            "lowest_pitch: 50\nhighest_pitch: 52\npolicy: wrap\nactuators:\n  type: log\n",
        )?;

        let player = load_player(Some(&path))?;
        let mapper = player.mapper()?;
        assert_eq!(3, mapper.range().len());
        assert_eq!(Policy::Wrap, mapper.policy());
        assert_eq!(Actuators::Log, player.actuators());
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let result = load_player(Some(Path::new("/does/not/exist/player.yaml")));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
