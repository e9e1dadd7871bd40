//! Reasons level loads and snapshot restores are rejected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::block::{Layer, PuzzleCategory};
use crate::geometry::Coord;

/// Reasons a room could not be built from its level data.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum LevelError {
    /// The level declares a zero-sized grid.
    #[error("level has empty dimensions {width}x{height}")]
    EmptyGrid {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
    },
    /// A placement lies outside the grid.
    #[error("cell ({}, {}) lies outside the grid", .coord.x(), .coord.y())]
    OutOfBounds {
        /// Offending cell.
        coord: Coord,
    },
    /// Two placements claim the same (cell, layer) slot.
    #[error("cell ({}, {}) is already occupied on layer {layer:?}", .coord.x(), .coord.y())]
    Occupied {
        /// Contested cell.
        coord: Coord,
        /// Contested layer.
        layer: Layer,
    },
    /// The level places no player body.
    #[error("level has no player body")]
    MissingPlayer,
    /// Consecutive player segments are not orthogonal neighbours.
    #[error("player segment {index} is not adjacent to the previous segment")]
    DisconnectedPlayer {
        /// Index of the offending segment.
        index: usize,
    },
    /// A group label mixes block kinds.
    #[error("group {label} mixes block kinds")]
    MixedGroup {
        /// Offending label.
        label: u32,
    },
    /// A stored room save does not line up with the level's entities.
    #[error("room save record {index} does not match the level")]
    SaveMismatch {
        /// Index of the first mismatching record.
        index: usize,
    },
}

/// Reasons a snapshot could not be applied to the live world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SnapshotError {
    /// The snapshot and the live world disagree on a category's size.
    #[error("category {category:?} holds {found} diffs but the room has {expected} entities")]
    ShapeMismatch {
        /// Category with the mismatch.
        category: PuzzleCategory,
        /// Live entity count.
        expected: usize,
        /// Diff count in the snapshot.
        found: usize,
    },
    /// A diff was recorded for a different block kind.
    #[error("diff {index} of category {category:?} was recorded for another kind")]
    KindMismatch {
        /// Category with the mismatch.
        category: PuzzleCategory,
        /// Index of the offending diff.
        index: usize,
    },
    /// A diff places an entity outside the room.
    #[error("diff places an entity outside the room at ({}, {})", .coord.x(), .coord.y())]
    OutOfBounds {
        /// Offending cell.
        coord: Coord,
    },
    /// Restored entities overlap on a layer.
    #[error("restored entities overlap at ({}, {})", .coord.x(), .coord.y())]
    Overlap {
        /// Contested cell.
        coord: Coord,
    },
}
