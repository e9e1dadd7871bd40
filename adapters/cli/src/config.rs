//! TOML configuration of the world and history tunables.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use cellshift_system_history::HistoryConfig;
use cellshift_world::WorldConfig;
use serde::Deserialize;

/// Settings read from the `--config` file. Missing tables keep their defaults.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct CliConfig {
    pub(crate) world: WorldConfig,
    pub(crate) history: HistoryConfig,
}

impl CliConfig {
    pub(crate) fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid configuration")
    }

    /// Reads the file when given, otherwise returns the defaults.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("could not read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_keeps_every_default() {
        assert_eq!(CliConfig::parse("").expect("parse"), CliConfig::default());
    }

    #[test]
    fn partial_tables_override_only_their_keys() {
        let config = CliConfig::parse(
            "[world]\nticks_per_cell = 3\n\n[history]\nrequire_time_ability = false\n\n[history.repeat]\nmin_interval = 1\n",
        )
        .expect("parse");

        assert_eq!(config.world.ticks_per_cell, 3);
        assert_eq!(
            config.world.max_cascade_rounds,
            WorldConfig::default().max_cascade_rounds
        );
        assert!(!config.history.require_time_ability);
        assert_eq!(config.history.repeat.min_interval, 1);
        assert_eq!(
            config.history.repeat.initial_interval,
            HistoryConfig::default().repeat.initial_interval
        );
    }

    #[test]
    fn misspelled_keys_are_rejected() {
        assert!(CliConfig::parse("[world]\nticks_per_cel = 3\n").is_err());
    }
}
