//! Level layouts and the logical schema of persisted room and player saves.

use serde::{Deserialize, Serialize};

use crate::block::{AbilitySet, Activation, BlockKind, ColorSet};
use crate::geometry::{Coord, Direction};

/// Placement of a single block inside a level layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedBlock {
    /// Kind of the block.
    pub kind: BlockKind,
    /// Cell the block starts on.
    pub coord: Coord,
    /// Initial facing.
    pub facing: Direction,
    /// Blocks sharing a label form one rigid connected group.
    pub group: Option<u32>,
}

/// Static description of a room as authored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelData {
    name: String,
    width: u32,
    height: u32,
    gravity: Direction,
    blocks: Vec<PlacedBlock>,
    player: Vec<Coord>,
}

impl LevelData {
    /// Creates an empty level with downward gravity.
    #[must_use]
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            gravity: Direction::Down,
            blocks: Vec::new(),
            player: Vec::new(),
        }
    }

    /// Overrides the gravity direction.
    #[must_use]
    pub fn with_gravity(mut self, gravity: Direction) -> Self {
        self.gravity = gravity;
        self
    }

    /// Places a single-cell block facing up.
    #[must_use]
    pub fn with(self, kind: BlockKind, coord: Coord) -> Self {
        self.with_facing(kind, coord, Direction::Up)
    }

    /// Places a single-cell block with an explicit facing.
    #[must_use]
    pub fn with_facing(mut self, kind: BlockKind, coord: Coord, facing: Direction) -> Self {
        self.blocks.push(PlacedBlock {
            kind,
            coord,
            facing,
            group: None,
        });
        self
    }

    /// Places a rigid multi-cell group of one kind under a shared label.
    #[must_use]
    pub fn with_group(mut self, kind: BlockKind, label: u32, cells: &[Coord]) -> Self {
        self.blocks.extend(cells.iter().map(|coord| PlacedBlock {
            kind,
            coord: *coord,
            facing: Direction::Up,
            group: Some(label),
        }));
        self
    }

    /// Places a row of ground tiles from `from` through `to` inclusive.
    #[must_use]
    pub fn with_floor(mut self, y: i32, from: i32, to: i32) -> Self {
        for x in from..=to {
            self = self.with(BlockKind::Ground, Coord::new(x, y));
        }
        self
    }

    /// Sets the player's body, head first.
    #[must_use]
    pub fn with_player(mut self, segments: &[Coord]) -> Self {
        self.player = segments.to_vec();
        self
    }

    /// Appends an already-built placement.
    pub fn push(&mut self, block: PlacedBlock) {
        self.blocks.push(block);
    }

    /// Room name used as the persistence key.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Width of the room in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the room in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Direction in which unsupported groups fall.
    #[must_use]
    pub const fn gravity(&self) -> Direction {
        self.gravity
    }

    /// Authored block placements in load order.
    #[must_use]
    pub fn blocks(&self) -> &[PlacedBlock] {
        &self.blocks
    }

    /// Player body cells, head first.
    #[must_use]
    pub fn player(&self) -> &[Coord] {
        &self.player
    }
}

/// Persisted state of one placed entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Kind of the entity.
    pub kind: BlockKind,
    /// Cell the entity was authored on.
    pub origin: Coord,
    /// Cell the entity occupies.
    pub coord: Coord,
    /// Facing direction.
    pub facing: Direction,
    /// Activation state.
    pub activation: Activation,
    /// External power (buttons only).
    pub powered: bool,
    /// Whether the entity was destroyed.
    pub destroyed: bool,
}

/// Persisted state of a room, one record per placed entity in load order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSave {
    /// Name of the saved room.
    pub room: String,
    /// Entity records excluding the player's body.
    pub records: Vec<EntityRecord>,
}

/// Persisted state of the player carried between rooms.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Body length when the record was written.
    pub length: u8,
    /// Unlocked abilities.
    pub abilities: AbilitySet,
    /// Absorbed colours.
    pub colors: ColorSet,
    /// Room the player was in.
    pub room: String,
    /// Tunnels opened by remote gates.
    pub unlocked_tunnels: Vec<bool>,
}
