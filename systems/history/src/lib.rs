#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Undo and reset history built from world snapshots.
//!
//! The history never touches the world itself. Callers record the live
//! snapshot before every discrete action and hand the snapshots returned by
//! [`History::undo`] and [`History::reset`] back to the world through
//! `Command::RestoreSnapshot`.

mod repeat;

use cellshift_core::{Ability, Event, Snapshot};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

pub use repeat::{HeldRepeat, RepeatConfig};

/// Tunables of the history system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    /// Whether undo stays locked until the player unlocks the time ability.
    pub require_time_ability: bool,
    /// Pacing of repeated undo while the input is held.
    pub repeat: RepeatConfig,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            require_time_ability: true,
            repeat: RepeatConfig::default(),
        }
    }
}

/// Reasons the history refuses to hand out a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// No room has been entered yet.
    #[error("no room has been entered")]
    NotEntered,
    /// Undo needs the time ability, which the player does not have yet.
    #[error("undo is locked until the time ability is unlocked")]
    Locked,
}

/// Undo stack with a room-entry floor and a fixed reset baseline.
#[derive(Clone, Debug, Default)]
pub struct History {
    config: HistoryConfig,
    /// Oldest first; the first entry is the room-entry floor.
    stack: Vec<Snapshot>,
    baseline: Option<Snapshot>,
}

impl History {
    /// Creates an empty history.
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            config,
            stack: Vec::new(),
            baseline: None,
        }
    }

    /// Configuration the history was created with.
    #[must_use]
    pub const fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Starts a fresh history for a newly entered room. The snapshot becomes
    /// both the undo floor and the reset baseline.
    pub fn enter_room(&mut self, snapshot: Snapshot) {
        self.stack.clear();
        self.stack.push(snapshot.clone());
        self.baseline = Some(snapshot);
        debug!("history floor recorded");
    }

    /// Records the live state ahead of a discrete action.
    pub fn record(&mut self, snapshot: Snapshot) -> Result<(), HistoryError> {
        if self.baseline.is_none() {
            return Err(HistoryError::NotEntered);
        }
        self.stack.push(snapshot);
        Ok(())
    }

    /// Drops the most recent recording, e.g. when the action it preceded was
    /// refused. The floor is never dropped.
    pub fn discard_latest(&mut self) -> Option<Snapshot> {
        if self.stack.len() > 1 {
            self.stack.pop()
        } else {
            None
        }
    }

    /// Picks the snapshot to restore for one undo step.
    ///
    /// Recordings identical to `live` belong to actions that changed
    /// nothing and are discarded on the way down. The floor is returned
    /// without being removed, so undo never empties the history.
    pub fn undo(&mut self, live: &Snapshot) -> Result<Snapshot, HistoryError> {
        if self.baseline.is_none() {
            return Err(HistoryError::NotEntered);
        }
        if self.config.require_time_ability && !live.player().unlocked.contains(Ability::Time) {
            return Err(HistoryError::Locked);
        }

        let mut skipped = 0usize;
        while self.stack.len() > 1 {
            let Some(snapshot) = self.stack.pop() else {
                break;
            };
            if snapshot != *live {
                info!(skipped, depth = self.stack.len(), "undo");
                return Ok(snapshot);
            }
            skipped += 1;
        }
        info!(skipped, "undo reached the room floor");
        self.stack
            .first()
            .cloned()
            .ok_or(HistoryError::NotEntered)
    }

    /// Returns the room-entry baseline. The live state is recorded first so
    /// that the reset itself can be undone.
    pub fn reset(&mut self, live: &Snapshot) -> Result<Snapshot, HistoryError> {
        let baseline = self.baseline.clone().ok_or(HistoryError::NotEntered)?;
        self.stack.push(live.clone());
        info!(depth = self.stack.len(), "reset to room entry");
        Ok(baseline)
    }

    /// Consumes world events. Unlocked abilities are patched into every
    /// recorded snapshot and the baseline so that no restore can lock them
    /// again.
    pub fn handle(&mut self, events: &[Event]) {
        for event in events {
            if let Event::AbilityUnlocked { ability } = event {
                self.mark_unlocked(*ability);
            }
        }
    }

    fn mark_unlocked(&mut self, ability: Ability) {
        let mut patched = 0usize;
        for snapshot in self.stack.iter_mut().chain(self.baseline.as_mut()) {
            if snapshot.mark_unlocked(ability) {
                patched += 1;
            }
        }
        debug!(?ability, patched, "unlock patched into history");
    }

    /// Number of recorded snapshots, the floor included.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Whether a room has been entered.
    #[must_use]
    pub const fn is_entered(&self) -> bool {
        self.baseline.is_some()
    }
}
