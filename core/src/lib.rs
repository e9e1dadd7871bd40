#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Cellshift puzzle engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and the history system. Adapters submit [`Command`]
//! values describing desired mutations, the world executes those commands via
//! its `apply` entry point, and then broadcasts [`Event`] values describing
//! what changed. Every type here is plain data: the world owns behaviour.

pub mod block;
pub mod error;
pub mod geometry;
pub mod level;
pub mod snapshot;

pub use block::{
    Ability, AbilitySet, Activation, BlockDiff, BlockKind, BlockRecord, Channel, Color, ColorPattern,
    ColorSet, EntityId, Grant, GroupId, Layer, PuzzleCategory, Tags,
};
pub use error::{LevelError, SnapshotError};
pub use geometry::{Coord, Direction};
pub use level::{EntityRecord, LevelData, PlacedBlock, PlayerRecord, RoomSave};
pub use snapshot::{PlayerDiff, Snapshot};

/// Origin of a movement request, which decides what a chain may push.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MoverKind {
    /// The player stepped or pushed deliberately.
    PlayerInitiated,
    /// A group fell under gravity.
    GravityInduced,
    /// A force field, piston or external agent moved the group.
    OtherBlockInduced,
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Replaces the current room with a freshly built one.
    LoadRoom {
        /// Authored layout of the room.
        level: LevelData,
        /// Stored state of the room from an earlier visit.
        save: Option<RoomSave>,
        /// Stored player progress carried into the room.
        player: Option<PlayerRecord>,
    },
    /// Steps the player's head one cell, pushing whatever lies ahead.
    MovePlayer {
        /// Direction of the step.
        direction: Direction,
    },
    /// Moves a connected group on behalf of an agent other than the player.
    MoveGroup {
        /// Group to move.
        group: GroupId,
        /// Direction of the move.
        direction: Direction,
    },
    /// Changes the global force direction applied to force-bound groups.
    SetForceDirection {
        /// New direction, or `None` to switch the force off.
        direction: Option<Direction>,
    },
    /// Powers or releases a button from an external source.
    PowerButton {
        /// Button being powered.
        entity: EntityId,
        /// Whether the external source is present.
        powered: bool,
    },
    /// Sets an activation state directly through the category wrappers.
    SetActivation {
        /// Entity to update.
        entity: EntityId,
        /// Requested state.
        state: Activation,
        /// Forces a resync event even when the state is unchanged.
        instant: bool,
    },
    /// Toggles the player's hover mode.
    SetHover {
        /// Whether hovering should be enabled.
        enabled: bool,
    },
    /// Shatters a crystal group.
    BreakCrystal {
        /// Crystal group to shatter.
        group: GroupId,
    },
    /// Unlocks an ability outside of collectable pickups.
    UnlockAbility {
        /// Ability to unlock.
        ability: Ability,
    },
    /// Advances the simulation by one tick.
    Tick,
    /// Restores the world to a recorded snapshot.
    RestoreSnapshot {
        /// Snapshot to restore.
        snapshot: Snapshot,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Confirms that a room was built.
    RoomLoaded {
        /// Name of the room.
        room: String,
        /// Number of entities placed.
        entities: usize,
    },
    /// Reports that a room could not be built.
    RoomLoadRejected {
        /// Reason the load failed.
        reason: LevelError,
    },
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Index of the tick that elapsed.
        tick: u64,
    },
    /// An entity's coordinate was committed and its transit began.
    MoveStarted {
        /// Entity that moved.
        entity: EntityId,
        /// Cell before the move.
        from: Coord,
        /// Cell after the move.
        to: Coord,
        /// Direction of travel.
        direction: Direction,
    },
    /// An entity finished its transit across a cell.
    MoveCommitted {
        /// Entity whose transit ended.
        entity: EntityId,
    },
    /// A resolved chain moved together.
    ChainMoved {
        /// Origin of the move.
        mover: MoverKind,
        /// Direction of the move.
        direction: Direction,
        /// Number of groups in the chain.
        groups: usize,
        /// Whether a floating group was part of the chain.
        floated: bool,
        /// Whether a rock slid horizontally.
        scraped: bool,
    },
    /// A requested move was obstructed; nothing changed.
    MoveBlocked {
        /// Origin of the move.
        mover: MoverKind,
        /// Direction that was blocked.
        direction: Direction,
    },
    /// A falling group came to rest on stationary support.
    GroupLanded {
        /// Group that landed.
        group: GroupId,
        /// Consecutive cells fallen before landing.
        fall_count: u32,
    },
    /// An entity's activation state changed or was resynchronised.
    ActivationChanged {
        /// Entity whose state changed.
        entity: EntityId,
        /// New state.
        state: Activation,
    },
    /// The number of active buttons of a colour changed.
    ColorTallyChanged {
        /// Colour whose tally changed.
        color: Color,
        /// New tally.
        count: u32,
    },
    /// A remote gate opened its tunnel for good.
    TunnelUnlocked {
        /// Index of the tunnel flag.
        tunnel: u8,
    },
    /// The player ate a collectable.
    CollectableEaten {
        /// Collectable that was eaten.
        entity: EntityId,
        /// Reward handed out.
        grant: Grant,
    },
    /// The player dug through a soil tile.
    TileDug {
        /// Soil tile that was removed.
        entity: EntityId,
    },
    /// A crystal group shattered.
    CrystalBroken {
        /// Group that shattered.
        group: GroupId,
    },
    /// The player's body grew.
    PlayerGrew {
        /// New body length.
        length: u8,
    },
    /// An ability was unlocked for the first time.
    AbilityUnlocked {
        /// Ability that was unlocked.
        ability: Ability,
    },
    /// A command needed an ability the player has not unlocked.
    AbilityMissing {
        /// Missing ability.
        ability: Ability,
    },
    /// The player's hover mode changed.
    HoverChanged {
        /// Whether hovering is now enabled.
        enabled: bool,
    },
    /// The global force direction changed.
    ForceDirectionChanged {
        /// New direction.
        direction: Option<Direction>,
    },
    /// A command referenced an entity or group that does not exist or does not
    /// support the request.
    TargetInvalid,
    /// A player action was refused because a cascade is still in progress.
    ActionRefused {
        /// Depth of the in-progress counter.
        in_progress: u32,
    },
    /// The cascade triggered by an action reached its fixed point.
    CascadeSettled,
    /// The cascade exceeded its round limit and was stopped.
    CascadeAborted {
        /// Rounds executed before stopping.
        rounds: u32,
    },
    /// A snapshot was applied to the world.
    SnapshotRestored,
    /// A snapshot could not be applied.
    SnapshotRejected {
        /// Reason the restore failed.
        reason: SnapshotError,
    },
}
