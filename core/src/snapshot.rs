//! World snapshots recorded by the history and restored by the world.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::block::{Ability, AbilitySet, BlockDiff, ColorSet, PuzzleCategory};
use crate::geometry::Direction;

/// Value copy of the player's non-positional state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerDiff {
    /// Number of body segments.
    pub length: u8,
    /// Unlocked abilities.
    pub unlocked: AbilitySet,
    /// Absorbed colours.
    pub colors: ColorSet,
    /// Whether the player is currently hovering.
    pub hovering: bool,
}

/// One diff per puzzle entity, grouped by category, plus the player diff.
///
/// Diffs inside a category are index-aligned with the world's live list for
/// that category; the player category is ordered head first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    categories: BTreeMap<PuzzleCategory, Vec<BlockDiff>>,
    player: PlayerDiff,
    force: Option<Direction>,
}

impl Snapshot {
    /// Assembles a snapshot from captured parts.
    #[must_use]
    pub fn new(
        categories: BTreeMap<PuzzleCategory, Vec<BlockDiff>>,
        player: PlayerDiff,
        force: Option<Direction>,
    ) -> Self {
        Self {
            categories,
            player,
            force,
        }
    }

    /// Diffs recorded for a category, empty when none were captured.
    #[must_use]
    pub fn category(&self, category: PuzzleCategory) -> &[BlockDiff] {
        self.categories
            .get(&category)
            .map_or(&[], |diffs| diffs.as_slice())
    }

    /// Player state recorded alongside the entity diffs.
    #[must_use]
    pub const fn player(&self) -> &PlayerDiff {
        &self.player
    }

    /// Global force direction at capture time.
    #[must_use]
    pub const fn force(&self) -> Option<Direction> {
        self.force
    }

    /// Marks an ability unlocked in the recorded player state.
    ///
    /// Returns whether the snapshot changed.
    pub fn mark_unlocked(&mut self, ability: Ability) -> bool {
        self.player.unlocked.insert(ability)
    }

    /// Total number of entity diffs across every category.
    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    /// Reports whether the snapshot holds no entity diffs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
