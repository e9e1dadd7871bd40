//! The player's segmented body.

use cellshift_core::{
    Ability, AbilitySet, Activation, BlockKind, BlockRecord, ColorSet, Coord, Direction,
    EntityId, Event, Grant, GroupId, Layer, MoverKind,
};
use tracing::{debug, info, warn};

use crate::{
    entity::Entity,
    grid::Relocation,
    resolver::{self, Pusher, Resolver},
    World,
};

/// Layers that keep a new body segment out of a cell.
const SOLID_LAYERS: [Layer; 4] = [Layer::Block, Layer::Player, Layer::Tunnel, Layer::Dig];

/// Body segments and the progress carried with them.
#[derive(Clone, Debug, Default)]
pub(crate) struct PlayerBody {
    pub(crate) group: GroupId,
    /// Head first.
    pub(crate) segments: Vec<EntityId>,
    /// Detached segments kept for reuse when the body grows again.
    spare: Vec<EntityId>,
    pub(crate) unlocked: AbilitySet,
    pub(crate) colors: ColorSet,
    pub(crate) hovering: bool,
}

impl PlayerBody {
    pub(crate) fn new(group: GroupId) -> Self {
        Self {
            group,
            ..Self::default()
        }
    }

    fn head(&self) -> Option<EntityId> {
        self.segments.first().copied()
    }
}

/// Steps the head one cell, pushing anything ahead of it. The body follows
/// the head cell by cell.
pub(crate) fn advance(world: &mut World, direction: Direction, out_events: &mut Vec<Event>) -> bool {
    let Some(from) = world
        .player
        .head()
        .and_then(|head| world.entities.get(head))
        .map(Entity::coord)
    else {
        out_events.push(Event::TargetInvalid);
        return false;
    };
    let destination = from.step(direction);
    let dig = world
        .grid
        .get(destination, Layer::Dig)
        .filter(|_| world.player.unlocked.contains(Ability::Dig));

    let mut planner = Resolver::new(world);
    if let Some(tile) = dig {
        planner = planner.ignoring(tile);
    }
    let pusher = Pusher {
        from,
        player_body: true,
    };
    let Some(plan) = planner.plan_push(pusher, direction, MoverKind::PlayerInitiated) else {
        debug!(?direction, "player blocked");
        out_events.push(Event::MoveBlocked {
            mover: MoverKind::PlayerInitiated,
            direction,
        });
        return false;
    };

    if !plan.groups.is_empty()
        && !resolver::commit(world, &plan, direction, MoverKind::PlayerInitiated, out_events)
    {
        return false;
    }
    if let Some(tile) = dig {
        destroy(world, tile);
        world.entities.retile();
        out_events.push(Event::TileDug { entity: tile });
    }
    if let Some(vacated) = slither(world, destination, direction, out_events) {
        let _ = eat(world, Some(vacated), out_events);
    }
    true
}

/// Moves the head into `destination` and every other segment into the cell
/// of the segment ahead of it. Returns the cell the tail vacated, or `None`
/// when the grid refused the body's new cells and nothing moved.
fn slither(
    world: &mut World,
    destination: Coord,
    direction: Direction,
    out_events: &mut Vec<Event>,
) -> Option<Coord> {
    let (ids, cells): (Vec<EntityId>, Vec<Coord>) = world
        .player
        .segments
        .iter()
        .filter_map(|id| world.entities.get(*id).map(|entity| (*id, entity.coord())))
        .unzip();
    let targets = std::iter::once(destination).chain(cells.iter().copied());
    let relocations: Vec<Relocation> = ids
        .iter()
        .zip(cells.iter().copied())
        .zip(targets)
        .map(|((id, from), to)| Relocation {
            entity: *id,
            layer: Layer::Player,
            from,
            to,
        })
        .collect();
    if let Err(relocation) = world.grid.relocate_all(&relocations) {
        warn!(?relocation, "player body overlapped an occupant");
        return None;
    }

    for relocation in &relocations {
        let heading = relocation
            .from
            .direction_to(relocation.to)
            .unwrap_or(direction);
        if let Some(entity) = world.entities.get_mut(relocation.entity) {
            entity.record.set_coord(relocation.to);
            entity.record.set_facing(heading);
            entity.moving = Some(heading);
        }
        out_events.push(Event::MoveStarted {
            entity: relocation.entity,
            from: relocation.from,
            to: relocation.to,
            direction: heading,
        });
    }
    world.cascade.hold(world.config.ticks_per_cell);
    Some(cells.last().copied().unwrap_or(destination))
}

/// Eats the collectable under the head, if any.
pub(crate) fn eat(world: &mut World, vacated: Option<Coord>, out_events: &mut Vec<Event>) -> bool {
    let Some(head) = world
        .player
        .head()
        .and_then(|head| world.entities.get(head))
        .map(Entity::coord)
    else {
        return false;
    };
    let Some(item) = world.grid.get(head, Layer::Collect) else {
        return false;
    };
    let grant = match world.entities.get(item).map(Entity::kind) {
        Some(BlockKind::Collectable { grant }) => grant,
        _ => return false,
    };
    destroy(world, item);
    out_events.push(Event::CollectableEaten {
        entity: item,
        grant,
    });
    match grant {
        Grant::Segment => {
            let _ = grow(world, vacated, out_events);
        }
        Grant::Ability(ability) => {
            let _ = unlock(world, ability, out_events);
        }
        Grant::Color(color) => {
            if world.player.colors.insert(color) {
                debug!(?color, "colour absorbed");
            }
        }
    }
    true
}

/// Appends a segment behind the tail, preferring the cell the tail just left.
/// Returns whether a free cell was found.
pub(crate) fn grow(world: &mut World, vacated: Option<Coord>, out_events: &mut Vec<Event>) -> bool {
    let Some(tail) = world
        .player
        .segments
        .last()
        .and_then(|id| world.entities.get(*id))
        .map(|entity| (entity.coord(), entity.record.facing()))
    else {
        return false;
    };
    let (tail_cell, tail_facing) = tail;
    let cell = vacated
        .into_iter()
        .chain(Direction::ALL.iter().map(|direction| tail_cell.step(*direction)))
        .find(|cell| tail_cell.manhattan_distance(*cell) == 1 && is_free(world, *cell));
    let Some(cell) = cell else {
        warn!("no free cell behind the tail, growth skipped");
        return false;
    };

    let group = world.player.group;
    let id = match world.player.spare.pop() {
        Some(id) => {
            if let Some(entity) = world.entities.get_mut(id) {
                entity.record.set_coord(cell);
                entity.record.set_facing(tail_facing);
                entity.record.set_destroyed(false);
                entity.moving = None;
            }
            world.entities.join_group(id, group);
            id
        }
        None => world.entities.push(Entity::new(BlockRecord::new(
            BlockKind::PlayerSegment,
            cell,
            group,
            tail_facing,
        ))),
    };
    if let Err(occupant) = world.grid.insert(cell, Layer::Player, id) {
        warn!(occupant = occupant.get(), "grown segment overlapped an occupant");
    }
    world.player.segments.push(id);
    let length = u8::try_from(world.player.segments.len()).unwrap_or(u8::MAX);
    info!(length, "player grew");
    out_events.push(Event::PlayerGrew { length });
    true
}

fn is_free(world: &World, cell: Coord) -> bool {
    world.grid.within_bounds(cell)
        && world
            .grid
            .get_any(cell, &SOLID_LAYERS)
            .iter()
            .all(Option::is_none)
        && world
            .grid
            .get(cell, Layer::Piston)
            .and_then(|id| world.entities.get(id))
            .map_or(true, |arm| arm.record.activation() == Activation::Off)
}

/// Resizes the body to `length` segments ahead of a restore. Removed
/// segments are detached and kept for reuse; added segments are placed by
/// the caller.
pub(crate) fn resize(world: &mut World, length: usize) {
    let group = world.player.group;
    while world.player.segments.len() > length {
        let Some(id) = world.player.segments.pop() else {
            break;
        };
        if let Some(entity) = world.entities.get_mut(id) {
            let coord = entity.coord();
            entity.record.set_destroyed(true);
            entity.moving = None;
            let _ = world.grid.remove(coord, Layer::Player, id);
        }
        world.entities.leave_group(id, group);
        world.player.spare.push(id);
    }
    while world.player.segments.len() < length {
        let id = match world.player.spare.pop() {
            Some(id) => id,
            None => world.entities.push(Entity::new(BlockRecord::new(
                BlockKind::PlayerSegment,
                Coord::ZERO,
                group,
                Direction::Right,
            ))),
        };
        world.entities.join_group(id, group);
        world.player.segments.push(id);
    }
}

/// Unlocks an ability, returning whether it was newly unlocked.
pub(crate) fn unlock(world: &mut World, ability: Ability, out_events: &mut Vec<Event>) -> bool {
    if !world.player.unlocked.insert(ability) {
        return false;
    }
    info!(?ability, "ability unlocked");
    out_events.push(Event::AbilityUnlocked { ability });
    true
}

pub(crate) fn set_hover(world: &mut World, enabled: bool, out_events: &mut Vec<Event>) -> bool {
    if enabled && !world.player.unlocked.contains(Ability::Hover) {
        out_events.push(Event::AbilityMissing {
            ability: Ability::Hover,
        });
        return false;
    }
    if world.player.hovering == enabled {
        return false;
    }
    world.player.hovering = enabled;
    out_events.push(Event::HoverChanged { enabled });
    true
}

/// Shatters every live member of a crystal group.
pub(crate) fn break_crystal(world: &mut World, group: GroupId, out_events: &mut Vec<Event>) -> bool {
    let members = world.entities.live_members(group);
    let all_crystal = members.iter().all(|id| {
        world
            .entities
            .get(*id)
            .is_some_and(|entity| matches!(entity.kind(), BlockKind::Crystal { .. }))
    });
    if members.is_empty() || !all_crystal {
        out_events.push(Event::TargetInvalid);
        return false;
    }
    for id in members {
        destroy(world, id);
    }
    world.entities.retile();
    info!(group = group.get(), "crystal broken");
    out_events.push(Event::CrystalBroken { group });
    true
}

/// Removes an entity from the grid and marks it destroyed. The entity stays
/// in its group so restores can bring it back.
fn destroy(world: &mut World, id: EntityId) {
    let Some(entity) = world.entities.get_mut(id) else {
        return;
    };
    let coord = entity.coord();
    let layer = entity.layer;
    entity.record.set_destroyed(true);
    entity.moving = None;
    let _ = world.grid.remove(coord, layer, id);
}
