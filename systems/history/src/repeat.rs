//! Accelerating repeat for held inputs such as continuous undo.

use serde::Deserialize;

/// Repeat pacing measured in ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepeatConfig {
    /// Ticks between the first and the second firing.
    pub initial_interval: u32,
    /// Shortest interval the repeat accelerates to.
    pub min_interval: u32,
    /// Percentage of the previous interval kept after each repeat.
    pub shrink_percent: u32,
}

impl Default for RepeatConfig {
    fn default() -> Self {
        Self {
            initial_interval: 12,
            min_interval: 2,
            shrink_percent: 75,
        }
    }
}

/// Tracks a held input and reports the ticks on which it fires.
#[derive(Clone, Copy, Debug)]
pub struct HeldRepeat {
    config: RepeatConfig,
    held: bool,
    interval: u32,
    cooldown: u32,
}

impl HeldRepeat {
    /// Creates a released repeat with the supplied pacing.
    #[must_use]
    pub const fn new(config: RepeatConfig) -> Self {
        Self {
            config,
            held: false,
            interval: config.initial_interval,
            cooldown: 0,
        }
    }

    /// Advances one tick with the input's current state. Returns whether the
    /// action should fire on this tick.
    ///
    /// The first tick of a press fires at once; holding on fires again after
    /// `initial_interval` ticks and then ever faster down to `min_interval`.
    pub fn update(&mut self, held: bool) -> bool {
        if !held {
            self.held = false;
            return false;
        }
        if !self.held {
            self.held = true;
            self.interval = self.config.initial_interval.max(1);
            self.cooldown = self.interval;
            return true;
        }

        self.cooldown = self.cooldown.saturating_sub(1);
        if self.cooldown > 0 {
            return false;
        }
        let shrunk = self.interval.saturating_mul(self.config.shrink_percent) / 100;
        self.interval = shrunk.max(self.config.min_interval).max(1);
        self.cooldown = self.interval;
        true
    }

    /// Whether the input is currently held.
    #[must_use]
    pub const fn is_held(&self) -> bool {
        self.held
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn firing_ticks(config: RepeatConfig, ticks: u32) -> Vec<u32> {
        let mut repeat = HeldRepeat::new(config);
        (0..ticks).filter(|_| repeat.update(true)).collect()
    }

    #[test]
    fn holding_fires_ever_faster_down_to_the_floor() {
        let config = RepeatConfig {
            initial_interval: 8,
            min_interval: 3,
            shrink_percent: 50,
        };
        // Fires at 0, then after 8, 4, 3, 3 ticks.
        assert_eq!(firing_ticks(config, 22), vec![0, 8, 12, 15, 18, 21]);
    }

    #[test]
    fn releasing_restarts_the_pacing() {
        let mut repeat = HeldRepeat::new(RepeatConfig::default());
        assert!(repeat.update(true));
        assert!(!repeat.update(true));
        assert!(!repeat.update(false));
        assert!(!repeat.is_held());
        assert!(repeat.update(true));
    }
}
