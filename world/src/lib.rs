#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state for the Cellshift puzzle engine.
//!
//! The world owns the room grid, every entity placed in it, the player's body
//! and the cascade that settles the room after each action. Adapters and
//! systems mutate it exclusively through [`apply`] and observe it through the
//! functions in [`query`].

mod activation;
mod cascade;
mod entity;
mod grid;
mod level;
mod player;
mod resolver;
mod snapshot;

use cellshift_core::{Color, Command, Coord, Direction, Event};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    cascade::{Cascade, FallRegistry},
    entity::Entities,
    grid::Grid,
    player::PlayerBody,
};

const DEFAULT_MAX_CASCADE_ROUNDS: u32 = 64;

/// Tunables governing how the world paces and bounds its cascades.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Ticks a moving entity spends crossing one cell. Zero settles every
    /// cascade within the command that triggered it.
    pub ticks_per_cell: u32,
    /// Upper bound on force/gravity/activation rounds per cascade.
    pub max_cascade_rounds: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            ticks_per_cell: 0,
            max_cascade_rounds: DEFAULT_MAX_CASCADE_ROUNDS,
        }
    }
}

/// Errors surfaced by checked world lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum WorldError {
    /// The requested cell lies outside the room.
    #[error("cell ({}, {}) lies outside the room", .coord.x(), .coord.y())]
    OutOfBounds {
        /// Offending cell.
        coord: Coord,
    },
}

/// Represents the authoritative Cellshift world state.
#[derive(Clone, Debug)]
pub struct World {
    config: WorldConfig,
    room: String,
    gravity: Direction,
    grid: Grid,
    entities: Entities,
    player: PlayerBody,
    force: Option<Direction>,
    tally: [u32; Color::COUNT],
    unlocked_tunnels: Vec<bool>,
    falls: FallRegistry,
    cascade: Cascade,
    tick_index: u64,
}

impl World {
    /// Creates an empty world that awaits its first room.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Creates an empty world using the provided tunables.
    #[must_use]
    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            config,
            room: String::new(),
            gravity: Direction::Down,
            grid: Grid::default(),
            entities: Entities::default(),
            player: PlayerBody::default(),
            force: None,
            tally: [0; Color::COUNT],
            unlocked_tunnels: Vec::new(),
            falls: FallRegistry::default(),
            cascade: Cascade::default(),
            tick_index: 0,
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::LoadRoom {
            level,
            save,
            player,
        } => level::load_room(world, &level, save.as_ref(), player.as_ref(), out_events),
        Command::Tick => {
            world.tick_index = world.tick_index.saturating_add(1);
            out_events.push(Event::TimeAdvanced {
                tick: world.tick_index,
            });
            cascade::tick(world, out_events);
        }
        Command::RestoreSnapshot { snapshot } => match snapshot::restore(world, &snapshot) {
            Ok(()) => out_events.push(Event::SnapshotRestored),
            Err(reason) => {
                warn!(%reason, "snapshot rejected");
                out_events.push(Event::SnapshotRejected { reason });
            }
        },
        Command::UnlockAbility { ability } => run_action(world, out_events, |world, events| {
            player::unlock(world, ability, events)
        }),
        Command::MovePlayer { direction } => run_action(world, out_events, |world, events| {
            player::advance(world, direction, events)
        }),
        Command::MoveGroup { group, direction } => {
            run_action(world, out_events, |world, events| {
                resolver::move_group(world, group, direction, events)
            });
        }
        Command::SetForceDirection { direction } => {
            run_action(world, out_events, |world, events| {
                cascade::set_force_direction(world, direction, events)
            });
        }
        Command::PowerButton { entity, powered } => {
            run_action(world, out_events, |world, events| {
                activation::power_button(world, entity, powered, events)
            });
        }
        Command::SetActivation {
            entity,
            state,
            instant,
        } => run_action(world, out_events, |world, events| {
            activation::set_by_kind(world, entity, state, instant, events)
        }),
        Command::SetHover { enabled } => run_action(world, out_events, |world, events| {
            player::set_hover(world, enabled, events)
        }),
        Command::BreakCrystal { group } => run_action(world, out_events, |world, events| {
            player::break_crystal(world, group, events)
        }),
    }
}

/// Runs a player action unless a cascade is still settling, then starts the
/// cascade when the action changed anything.
fn run_action<F>(world: &mut World, out_events: &mut Vec<Event>, action: F)
where
    F: FnOnce(&mut World, &mut Vec<Event>) -> bool,
{
    if world.cascade.is_busy() {
        let in_progress = world.cascade.in_progress();
        debug!(in_progress, "action refused while the room settles");
        out_events.push(Event::ActionRefused { in_progress });
        return;
    }
    if action(world, out_events) {
        cascade::begin(world, out_events);
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use cellshift_core::{
        Ability, AbilitySet, Activation, BlockRecord, Color, ColorSet, Coord, Direction,
        EntityId, GroupId, Layer, PlayerRecord, PuzzleCategory, RoomSave, Snapshot, Tags,
    };

    use super::{snapshot, World, WorldError};

    /// Name of the room currently loaded.
    #[must_use]
    pub fn room_name(world: &World) -> &str {
        &world.room
    }

    /// Width and height of the room in cells.
    #[must_use]
    pub fn dimensions(world: &World) -> (i32, i32) {
        world.grid.dimensions()
    }

    /// Direction in which unsupported groups fall.
    #[must_use]
    pub fn gravity(world: &World) -> Direction {
        world.gravity
    }

    /// Direction currently applied to force-bound groups, if any.
    #[must_use]
    pub fn force_direction(world: &World) -> Option<Direction> {
        world.force
    }

    /// Index of the most recent tick.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Number of outstanding cascade requests; player actions are refused
    /// while it is non-zero.
    #[must_use]
    pub fn in_progress(world: &World) -> u32 {
        world.cascade.in_progress()
    }

    /// Reports whether the room has settled and accepts player actions.
    #[must_use]
    pub fn is_idle(world: &World) -> bool {
        !world.cascade.is_busy()
    }

    /// Occupant of a cell on one layer, failing for cells outside the room.
    pub fn occupant(
        world: &World,
        coord: Coord,
        layer: Layer,
    ) -> Result<Option<EntityId>, WorldError> {
        world.grid.checked_get(coord, layer)
    }

    /// Occupants of a cell across several layers, in the order requested.
    /// Cells outside the room report no occupants.
    #[must_use]
    pub fn occupants(world: &World, coord: Coord, layers: &[Layer]) -> Vec<Option<EntityId>> {
        world.grid.get_any(coord, layers)
    }

    /// Read-only view of a single entity.
    #[must_use]
    pub fn entity(world: &World, id: EntityId) -> Option<EntityView<'_>> {
        world.entities.get(id).map(|entity| EntityView {
            id,
            record: &entity.record,
            layer: entity.layer,
            tags: entity.tags,
            moving: entity.moving,
        })
    }

    /// Entities of a category in their stable enumeration order. The player
    /// category enumerates the body head first.
    #[must_use]
    pub fn entities_in(world: &World, category: PuzzleCategory) -> Vec<EntityId> {
        snapshot::category_members(world, category)
    }

    /// Every member of a group, destroyed ones included.
    #[must_use]
    pub fn group_members(world: &World, group: GroupId) -> &[EntityId] {
        world.entities.members(group)
    }

    /// Destroyed members of a group.
    #[must_use]
    pub fn destroyed_members(world: &World, group: GroupId) -> Vec<EntityId> {
        world.entities.destroyed_members(group)
    }

    /// Falling state of a gravity- or force-bound group.
    #[must_use]
    pub fn fall_state(world: &World, group: GroupId) -> Option<FallState> {
        world.falls.get(group).map(|entry| FallState {
            falling: entry.falling,
            fall_count: entry.fall_count,
        })
    }

    /// Read-only view of the player's body and progress.
    #[must_use]
    pub fn player(world: &World) -> PlayerView<'_> {
        PlayerView {
            group: world.player.group,
            segments: &world.player.segments,
            unlocked: world.player.unlocked,
            colors: world.player.colors,
            hovering: world.player.hovering,
        }
    }

    /// Number of active buttons of a colour.
    #[must_use]
    pub fn color_tally(world: &World, color: Color) -> u32 {
        world.tally[color.index()]
    }

    /// Tunnels opened by remote gates; flags only ever become `true`.
    #[must_use]
    pub fn unlocked_tunnels(world: &World) -> &[bool] {
        &world.unlocked_tunnels
    }

    /// Captures the restorable state of the room.
    #[must_use]
    pub fn snapshot(world: &World) -> Snapshot {
        snapshot::capture(world)
    }

    /// Persistable state of every non-player entity in load order.
    #[must_use]
    pub fn room_save(world: &World) -> RoomSave {
        snapshot::room_save(world)
    }

    /// Persistable state of the player's progress.
    #[must_use]
    pub fn player_record(world: &World) -> PlayerRecord {
        PlayerRecord {
            length: u8::try_from(world.player.segments.len()).unwrap_or(u8::MAX),
            abilities: world.player.unlocked,
            colors: world.player.colors,
            room: world.room.clone(),
            unlocked_tunnels: world.unlocked_tunnels.clone(),
        }
    }

    /// Read-only view of an entity.
    #[derive(Clone, Copy, Debug)]
    pub struct EntityView<'a> {
        id: EntityId,
        record: &'a BlockRecord,
        layer: Layer,
        tags: Tags,
        moving: Option<Direction>,
    }

    impl<'a> EntityView<'a> {
        /// Identifier of the entity.
        #[must_use]
        pub const fn id(&self) -> EntityId {
            self.id
        }

        /// Persisted record of the entity.
        #[must_use]
        pub const fn record(&self) -> &'a BlockRecord {
            self.record
        }

        /// Layer the entity occupies.
        #[must_use]
        pub const fn layer(&self) -> Layer {
            self.layer
        }

        /// Behaviour tags of the entity.
        #[must_use]
        pub const fn tags(&self) -> Tags {
            self.tags
        }

        /// Direction of the transit in progress, if any.
        #[must_use]
        pub const fn moving(&self) -> Option<Direction> {
            self.moving
        }

        /// Cell the entity occupies.
        #[must_use]
        pub const fn coord(&self) -> Coord {
            self.record.coord()
        }

        /// Current activation state.
        #[must_use]
        pub const fn activation(&self) -> Activation {
            self.record.activation()
        }

        /// Group the entity belongs to.
        #[must_use]
        pub const fn group(&self) -> GroupId {
            self.record.group()
        }
    }

    /// Falling state of a group.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct FallState {
        /// Whether the group fell during the current cascade.
        pub falling: bool,
        /// Consecutive cells fallen since it last landed.
        pub fall_count: u32,
    }

    /// Read-only view of the player.
    #[derive(Clone, Copy, Debug)]
    pub struct PlayerView<'a> {
        group: GroupId,
        segments: &'a [EntityId],
        unlocked: AbilitySet,
        colors: ColorSet,
        hovering: bool,
    }

    impl<'a> PlayerView<'a> {
        /// Group shared by every body segment.
        #[must_use]
        pub const fn group(&self) -> GroupId {
            self.group
        }

        /// Body segments, head first.
        #[must_use]
        pub const fn segments(&self) -> &'a [EntityId] {
            self.segments
        }

        /// Head segment, if a body has been placed.
        #[must_use]
        pub fn head(&self) -> Option<EntityId> {
            self.segments.first().copied()
        }

        /// Number of body segments.
        #[must_use]
        pub const fn length(&self) -> usize {
            self.segments.len()
        }

        /// Reports whether an ability has been unlocked.
        #[must_use]
        pub const fn has(&self, ability: Ability) -> bool {
            self.unlocked.contains(ability)
        }

        /// Every unlocked ability.
        #[must_use]
        pub const fn unlocked(&self) -> AbilitySet {
            self.unlocked
        }

        /// Colours absorbed so far.
        #[must_use]
        pub const fn colors(&self) -> ColorSet {
            self.colors
        }

        /// Whether hover mode is on.
        #[must_use]
        pub const fn hovering(&self) -> bool {
            self.hovering
        }
    }
}
