//! Block kinds, capability tags and the persisted block record.

use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::geometry::{Coord, Direction};

/// Exclusive occupation plane of the grid. At most one entity lives in each
/// (position, layer) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Layer {
    /// Segments of the player's body.
    Player,
    /// Solid and pushable blocks, gates and piston bases.
    Block,
    /// Buttons, panels and gate slots.
    Misc,
    /// Static supports drawn behind the board.
    Support,
    /// Piston arms.
    Piston,
    /// Tunnel mouths.
    Tunnel,
    /// Collectables that the player eats.
    Collect,
    /// Foreground tiles revealed while the player overlaps them.
    Fg,
    /// Soil that the player can dig through.
    Dig,
}

impl Layer {
    /// Every layer in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Player,
        Self::Block,
        Self::Misc,
        Self::Support,
        Self::Piston,
        Self::Tunnel,
        Self::Collect,
        Self::Fg,
        Self::Dig,
    ];

    /// Layers inspected by the movement resolver, in check order.
    pub const MOVEMENT_ORDER: [Self; 6] = [
        Self::Block,
        Self::Tunnel,
        Self::Player,
        Self::Piston,
        Self::Dig,
        Self::Collect,
    ];
}

/// Orthogonal capability flags composed onto an entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tags(u8);

impl Tags {
    /// No capabilities.
    pub const NONE: Self = Self(0);
    /// Can be pushed along a movement chain.
    pub const PUSH: Self = Self(1 << 0);
    /// Blocks every movement chain that reaches it.
    pub const STOP: Self = Self(1 << 1);
    /// Member of a multi-cell rigid group.
    pub const CONNECT: Self = Self(1 << 2);
    /// Ignores gravity and cannot be pushed by falling groups.
    pub const FLOAT: Self = Self(1 << 3);
    /// Segment of the player's body.
    pub const PLAYER_BODY: Self = Self(1 << 4);
    /// Static terrain tile participating in auto-tiling.
    pub const TILE: Self = Self(1 << 5);
    /// Driven by the global force direction instead of gravity.
    pub const FORCE: Self = Self(1 << 6);

    /// Checks whether every flag in `other` is present.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of both flag sets.
    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for Tags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.with(rhs)
    }
}

/// Colours carried by crystals and buttons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Color {
    /// Red.
    Red,
    /// Green.
    Green,
    /// Blue.
    Blue,
}

impl Color {
    /// Number of distinct colours.
    pub const COUNT: usize = 3;

    /// Every colour in tally order.
    pub const ALL: [Self; Self::COUNT] = [Self::Red, Self::Green, Self::Blue];

    /// Index of the colour inside tally arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Red => 0,
            Self::Green => 1,
            Self::Blue => 2,
        }
    }

    const fn bit(self) -> u8 {
        1 << self.index()
    }
}

/// Set of colours absorbed by the player.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorSet(u8);

impl ColorSet {
    /// Reports whether the colour is part of the set.
    #[must_use]
    pub const fn contains(self, color: Color) -> bool {
        self.0 & color.bit() != 0
    }

    /// Adds a colour, returning whether it was newly inserted.
    pub fn insert(&mut self, color: Color) -> bool {
        let added = !self.contains(color);
        self.0 |= color.bit();
        added
    }
}

/// Number of active buttons per colour required to light a panel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorPattern([u8; Color::COUNT]);

impl ColorPattern {
    /// Creates a pattern from per-colour requirements in tally order.
    #[must_use]
    pub const fn new(required: [u8; Color::COUNT]) -> Self {
        Self(required)
    }

    /// Requirement for a single colour.
    #[must_use]
    pub const fn required(&self, color: Color) -> u8 {
        self.0[color.index()]
    }

    /// Reports whether the tally meets every per-colour requirement.
    #[must_use]
    pub fn satisfied_by(&self, tally: &[u32; Color::COUNT]) -> bool {
        Color::ALL
            .iter()
            .all(|color| tally[color.index()] >= u32::from(self.required(*color)))
    }
}

/// Abilities the player may unlock during play.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Ability {
    /// Rewind actions through the undo history.
    Time,
    /// Dig through soil tiles.
    Dig,
    /// Suspend gravity for the player's body.
    Hover,
}

impl Ability {
    /// Every ability in declaration order.
    pub const ALL: [Self; 3] = [Self::Time, Self::Dig, Self::Hover];

    const fn bit(self) -> u8 {
        match self {
            Self::Time => 1 << 0,
            Self::Dig => 1 << 1,
            Self::Hover => 1 << 2,
        }
    }
}

/// Set of unlocked abilities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbilitySet(u8);

impl AbilitySet {
    /// Reports whether the ability is unlocked.
    #[must_use]
    pub const fn contains(self, ability: Ability) -> bool {
        self.0 & ability.bit() != 0
    }

    /// Unlocks an ability, returning whether it was newly unlocked.
    pub fn insert(&mut self, ability: Ability) -> bool {
        let added = !self.contains(ability);
        self.0 |= ability.bit();
        added
    }

    /// Iterates the unlocked abilities in declaration order.
    pub fn iter(self) -> impl Iterator<Item = Ability> {
        Ability::ALL
            .into_iter()
            .filter(move |ability| self.contains(*ability))
    }
}

/// Reward handed out when the player eats a collectable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grant {
    /// Grows the player's body by one segment.
    Segment,
    /// Unlocks an ability.
    Ability(Ability),
    /// Absorbs a colour.
    Color(Color),
}

/// Wiring channel shared by a panel and the gates and pistons it drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Channel(u8);

impl Channel {
    /// Creates a new channel identifier.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Retrieves the numeric channel.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }
}

/// Tri-state activation shared by buttons, panels, gates and pistons.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activation {
    /// Inactive.
    #[default]
    Off,
    /// Active.
    On,
    /// Temporarily powered by an external, revocable source.
    Alt,
}

impl Activation {
    /// Reports whether the state counts as active.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Off)
    }
}

/// Closed set of puzzle objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    /// Immovable terrain.
    Ground,
    /// Pushable block that falls under gravity.
    Rock,
    /// Pushable block moved by the global force direction.
    Drift,
    /// Floating pushable crystal that presses buttons of its colour.
    Crystal {
        /// Colour of the crystal.
        color: Color,
    },
    /// Floor button pressed by a crystal of matching colour.
    Button {
        /// Colour that presses the button.
        color: Color,
    },
    /// Indicator panel lit by the colour tally.
    Panel {
        /// Channel powered while the panel is lit.
        channel: Channel,
        /// Per-colour button counts required to light the panel.
        pattern: ColorPattern,
    },
    /// Door that lets the player through while open.
    Gate {
        /// Channel opening the gate, if wired.
        channel: Option<Channel>,
        /// Long-lived tunnel flag unlocked when the gate opens.
        tunnel: Option<u8>,
    },
    /// Frame marker mirroring its channel's power.
    GateSlot {
        /// Channel mirrored by the slot.
        channel: Channel,
    },
    /// Piston base extending an arm in its facing direction.
    Piston {
        /// Channel extending the piston, if wired.
        channel: Option<Channel>,
    },
    /// Arm cell of a piston; blocks movement while extended.
    PistonArm,
    /// Item eaten by the player.
    Collectable {
        /// Reward handed out on eating.
        grant: Grant,
    },
    /// Soil the player digs through.
    Dig,
    /// Foreground decoration.
    Fg,
    /// Tunnel mouth.
    Tunnel,
    /// Segment of the player's body.
    PlayerSegment,
}

impl BlockKind {
    /// Layer occupied by every block of this kind.
    #[must_use]
    pub const fn layer(self) -> Layer {
        match self {
            Self::Ground
            | Self::Rock
            | Self::Drift
            | Self::Crystal { .. }
            | Self::Gate { .. }
            | Self::Piston { .. } => Layer::Block,
            Self::Button { .. } | Self::Panel { .. } | Self::GateSlot { .. } => Layer::Misc,
            Self::PistonArm => Layer::Piston,
            Self::Collectable { .. } => Layer::Collect,
            Self::Dig => Layer::Dig,
            Self::Fg => Layer::Fg,
            Self::Tunnel => Layer::Tunnel,
            Self::PlayerSegment => Layer::Player,
        }
    }

    /// Capabilities granted to blocks of this kind.
    #[must_use]
    pub const fn tags(self) -> Tags {
        match self {
            Self::Ground => Tags::STOP.with(Tags::TILE),
            Self::Rock => Tags::PUSH,
            Self::Drift => Tags::PUSH.with(Tags::FORCE),
            Self::Crystal { .. } => Tags::PUSH.with(Tags::FLOAT),
            Self::Gate { .. } | Self::Piston { .. } => Tags::STOP,
            Self::Dig => Tags::STOP.with(Tags::TILE),
            Self::PlayerSegment => Tags::PLAYER_BODY,
            Self::Button { .. }
            | Self::Panel { .. }
            | Self::GateSlot { .. }
            | Self::PistonArm
            | Self::Collectable { .. }
            | Self::Fg
            | Self::Tunnel => Tags::NONE,
        }
    }

    /// Bulk snapshot partition the kind belongs to, if any.
    #[must_use]
    pub const fn category(self) -> Option<PuzzleCategory> {
        match self {
            Self::Ground | Self::Tunnel => None,
            Self::Rock | Self::Drift => Some(PuzzleCategory::Rock),
            Self::Crystal { .. } => Some(PuzzleCategory::Crystal),
            Self::Button { .. } => Some(PuzzleCategory::Button),
            Self::Piston { .. } | Self::PistonArm => Some(PuzzleCategory::Piston),
            Self::Panel { .. } => Some(PuzzleCategory::Panel),
            Self::Dig => Some(PuzzleCategory::Dig),
            Self::Fg => Some(PuzzleCategory::Fg),
            Self::GateSlot { .. } => Some(PuzzleCategory::GateSlot),
            Self::Gate { .. } => Some(PuzzleCategory::Gate),
            Self::Collectable { .. } => Some(PuzzleCategory::Collectable),
            Self::PlayerSegment => Some(PuzzleCategory::Player),
        }
    }
}

/// Partition of entities used for bulk snapshot and update passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PuzzleCategory {
    /// Rocks and drift blocks.
    Rock,
    /// Crystals.
    Crystal,
    /// Buttons.
    Button,
    /// Piston bases and arms.
    Piston,
    /// Panels.
    Panel,
    /// Soil tiles.
    Dig,
    /// Foreground tiles.
    Fg,
    /// Gate slots.
    GateSlot,
    /// Gates.
    Gate,
    /// Collectables.
    Collectable,
    /// Player segments.
    Player,
}

impl PuzzleCategory {
    /// Every category in snapshot order.
    pub const ALL: [Self; 11] = [
        Self::Rock,
        Self::Crystal,
        Self::Button,
        Self::Piston,
        Self::Panel,
        Self::Dig,
        Self::Fg,
        Self::GateSlot,
        Self::Gate,
        Self::Collectable,
        Self::Player,
    ];
}

/// Unique identifier assigned to an entity for the lifetime of a room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a new entity identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identity of a rigid connected group.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GroupId(u32);

impl GroupId {
    /// Creates a new group identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Persisted state of a single placed block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    kind: BlockKind,
    origin: Coord,
    coord: Coord,
    group: GroupId,
    facing: Direction,
    activation: Activation,
    powered: bool,
    destroyed: bool,
    tiling: u8,
}

impl BlockRecord {
    /// Creates a record at its level origin.
    #[must_use]
    pub const fn new(kind: BlockKind, coord: Coord, group: GroupId, facing: Direction) -> Self {
        Self {
            kind,
            origin: coord,
            coord,
            group,
            facing,
            activation: Activation::Off,
            powered: false,
            destroyed: false,
            tiling: 0,
        }
    }

    /// Kind of the block.
    #[must_use]
    pub const fn kind(&self) -> BlockKind {
        self.kind
    }

    /// Cell the block occupied when the level was loaded.
    #[must_use]
    pub const fn origin(&self) -> Coord {
        self.origin
    }

    /// Cell the block currently occupies.
    #[must_use]
    pub const fn coord(&self) -> Coord {
        self.coord
    }

    /// Connected group the block belongs to.
    #[must_use]
    pub const fn group(&self) -> GroupId {
        self.group
    }

    /// Facing direction.
    #[must_use]
    pub const fn facing(&self) -> Direction {
        self.facing
    }

    /// Current activation state.
    #[must_use]
    pub const fn activation(&self) -> Activation {
        self.activation
    }

    /// Whether an external, revocable source powers the block. Only buttons
    /// act on it.
    #[must_use]
    pub const fn powered(&self) -> bool {
        self.powered
    }

    /// Reports whether the block was logically destroyed.
    #[must_use]
    pub const fn destroyed(&self) -> bool {
        self.destroyed
    }

    /// Auto-tiling mask: one bit per same-group neighbour in facing order.
    #[must_use]
    pub const fn tiling(&self) -> u8 {
        self.tiling
    }

    /// Shifts the block one step in the provided direction.
    pub fn translate(&mut self, direction: Direction) {
        self.coord = self.coord.step(direction);
    }

    /// Places the block on an explicit cell.
    pub fn set_coord(&mut self, coord: Coord) {
        self.coord = coord;
    }

    /// Turns the block to face a new direction.
    pub fn set_facing(&mut self, facing: Direction) {
        self.facing = facing;
    }

    /// Updates the activation state.
    pub fn set_activation(&mut self, activation: Activation) {
        self.activation = activation;
    }

    /// Connects or disconnects the external power source.
    pub fn set_powered(&mut self, powered: bool) {
        self.powered = powered;
    }

    /// Marks the block destroyed or restores it.
    pub fn set_destroyed(&mut self, destroyed: bool) {
        self.destroyed = destroyed;
    }

    /// Stores the auto-tiling mask.
    pub fn set_tiling(&mut self, tiling: u8) {
        self.tiling = tiling;
    }

    /// Captures the mutable state of the block.
    #[must_use]
    pub const fn diff(&self) -> BlockDiff {
        BlockDiff {
            kind: self.kind,
            coord: self.coord,
            facing: self.facing,
            activation: self.activation,
            powered: self.powered,
            destroyed: self.destroyed,
        }
    }

    /// Reports whether the record's mutable state equals the diff.
    #[must_use]
    pub fn matches(&self, diff: &BlockDiff) -> bool {
        self.diff() == *diff
    }

    /// Restores every mutable field captured by the diff.
    pub fn apply_diff(&mut self, diff: &BlockDiff) {
        self.coord = diff.coord;
        self.facing = diff.facing;
        self.activation = diff.activation;
        self.powered = diff.powered;
        self.destroyed = diff.destroyed;
    }
}

/// Immutable value copy of a block's mutable state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockDiff {
    /// Kind of the captured block, used to validate restores.
    pub kind: BlockKind,
    /// Captured cell.
    pub coord: Coord,
    /// Captured facing.
    pub facing: Direction,
    /// Captured activation.
    pub activation: Activation,
    /// Captured external power.
    pub powered: bool,
    /// Captured destroyed flag.
    pub destroyed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_requires_every_colour() {
        let pattern = ColorPattern::new([1, 0, 2]);
        assert!(!pattern.satisfied_by(&[1, 0, 1]));
        assert!(pattern.satisfied_by(&[1, 0, 2]));
        assert!(pattern.satisfied_by(&[3, 4, 5]));
    }

    #[test]
    fn diff_restores_mutable_fields() {
        let mut record = BlockRecord::new(
            BlockKind::Rock,
            Coord::new(2, 2),
            GroupId::new(4),
            Direction::Right,
        );
        let diff = record.diff();

        record.translate(Direction::Right);
        record.set_activation(Activation::On);
        record.set_powered(true);
        record.set_destroyed(true);
        assert!(!record.matches(&diff));

        record.apply_diff(&diff);
        assert!(record.matches(&diff));
        assert!(!record.powered());
        assert_eq!(record.coord(), Coord::new(2, 2));
        assert_eq!(record.origin(), Coord::new(2, 2));
    }

    #[test]
    fn tiling_is_not_part_of_the_diff() {
        let mut record = BlockRecord::new(
            BlockKind::Ground,
            Coord::new(0, 0),
            GroupId::new(0),
            Direction::Up,
        );
        let diff = record.diff();
        record.set_tiling(0b1010);
        assert!(record.matches(&diff));
    }

    #[test]
    fn ability_set_inserts_once() {
        let mut set = AbilitySet::default();
        assert!(set.insert(Ability::Dig));
        assert!(!set.insert(Ability::Dig));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Ability::Dig]);
    }

    #[test]
    fn every_categorised_kind_has_a_single_layer() {
        let kinds = [
            BlockKind::Rock,
            BlockKind::Crystal { color: Color::Red },
            BlockKind::Button { color: Color::Blue },
            BlockKind::PistonArm,
            BlockKind::PlayerSegment,
        ];
        let layers: Vec<Layer> = kinds.iter().map(|kind| kind.layer()).collect();
        assert_eq!(
            layers,
            vec![
                Layer::Block,
                Layer::Block,
                Layer::Misc,
                Layer::Piston,
                Layer::Player
            ]
        );
    }
}
