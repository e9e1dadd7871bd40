//! Building a room from its level data and optional saves.

use std::collections::{BTreeMap, HashSet};

use cellshift_core::{
    BlockKind, BlockRecord, Direction, EntityId, Event, GroupId, LevelData, LevelError,
    PlayerRecord, RoomSave, Tags,
};
use tracing::{info, warn};

use crate::{
    activation,
    cascade::{self, FallRegistry},
    entity::{Entities, Entity},
    grid::Grid,
    player::{self, PlayerBody},
    snapshot, World,
};

/// Replaces the world's room. A rejected level leaves the previous room in
/// place.
pub(crate) fn load_room(
    world: &mut World,
    level: &LevelData,
    save: Option<&RoomSave>,
    record: Option<&PlayerRecord>,
    out_events: &mut Vec<Event>,
) {
    match build(world, level, save, record) {
        Ok(room) => {
            *world = room;
            let entities = world.entities.len();
            info!(room = %world.room, entities, "room loaded");
            out_events.push(Event::RoomLoaded {
                room: world.room.clone(),
                entities,
            });
        }
        Err(reason) => {
            warn!(room = level.name(), %reason, "room rejected");
            out_events.push(Event::RoomLoadRejected { reason });
        }
    }
}

fn build(
    current: &World,
    level: &LevelData,
    save: Option<&RoomSave>,
    record: Option<&PlayerRecord>,
) -> Result<World, LevelError> {
    if level.width() == 0 || level.height() == 0 {
        return Err(LevelError::EmptyGrid {
            width: level.width(),
            height: level.height(),
        });
    }

    let mut world = World::with_config(current.config);
    world.room = level.name().to_owned();
    world.gravity = level.gravity();
    world.grid = Grid::new(level.width(), level.height());
    world.tick_index = current.tick_index;

    let mut labels: BTreeMap<u32, (GroupId, BlockKind)> = BTreeMap::new();
    for placed in level.blocks() {
        let group = match placed.group {
            Some(label) => match labels.get(&label) {
                Some((group, kind)) if *kind == placed.kind => *group,
                Some(_) => return Err(LevelError::MixedGroup { label }),
                None => {
                    let group = world.entities.allocate_group();
                    let _ = labels.insert(label, (group, placed.kind));
                    group
                }
            },
            None => world.entities.allocate_group(),
        };
        let record = BlockRecord::new(placed.kind, placed.coord, group, placed.facing);
        let _ = place(&mut world.grid, &mut world.entities, record)?;

        if matches!(placed.kind, BlockKind::Piston { .. }) {
            let arm_group = world.entities.allocate_group();
            let arm = BlockRecord::new(
                BlockKind::PistonArm,
                placed.coord.step(placed.facing),
                arm_group,
                placed.facing,
            );
            let _ = place(&mut world.grid, &mut world.entities, arm)?;
        }
    }
    connect_groups(&mut world.entities);

    place_player(&mut world, level)?;

    if let Some(save) = save {
        apply_room_save(&mut world, save)?;
    }
    if let Some(record) = record {
        world.player.unlocked = record.abilities;
        world.player.colors = record.colors;
        world.unlocked_tunnels = record.unlocked_tunnels.clone();
        regrow(&mut world, usize::from(record.length));
    }
    reserve_tunnels(&mut world);

    world.entities.retile();
    world.falls = FallRegistry::build(&world);
    activation::sync_derived(&mut world);
    let mut settling = Vec::new();
    cascade::settle_now(&mut world, &mut settling);
    Ok(world)
}

fn place(
    grid: &mut Grid,
    entities: &mut Entities,
    record: BlockRecord,
) -> Result<EntityId, LevelError> {
    let coord = record.coord();
    if !grid.within_bounds(coord) {
        return Err(LevelError::OutOfBounds { coord });
    }
    let entity = Entity::new(record);
    let layer = entity.layer;
    let id = entities.push(entity);
    grid.insert(coord, layer, id)
        .map_err(|_| LevelError::Occupied { coord, layer })?;
    Ok(id)
}

/// Members of multi-cell groups move as one rigid body.
fn connect_groups(entities: &mut Entities) {
    let connected: Vec<GroupId> = entities
        .group_ids()
        .filter(|group| entities.members(*group).len() > 1)
        .collect();
    for group in connected {
        for id in entities.members(group).to_vec() {
            if let Some(entity) = entities.get_mut(id) {
                entity.tags = entity.tags | Tags::CONNECT;
            }
        }
    }
}

fn place_player(world: &mut World, level: &LevelData) -> Result<(), LevelError> {
    let cells = level.player();
    if cells.is_empty() {
        return Err(LevelError::MissingPlayer);
    }
    if let Some(index) = cells
        .windows(2)
        .position(|pair| pair[0].manhattan_distance(pair[1]) != 1)
    {
        return Err(LevelError::DisconnectedPlayer { index: index + 1 });
    }

    let group = world.entities.allocate_group();
    world.player = PlayerBody::new(group);
    for (index, coord) in cells.iter().enumerate() {
        let ahead = index.checked_sub(1).and_then(|previous| cells.get(previous));
        let facing = match (ahead, cells.get(index + 1)) {
            (Some(ahead), _) => coord.direction_to(*ahead),
            (None, Some(behind)) => behind.direction_to(*coord),
            (None, None) => None,
        }
        .unwrap_or(Direction::Right);
        let record = BlockRecord::new(BlockKind::PlayerSegment, *coord, group, facing);
        let id = place(&mut world.grid, &mut world.entities, record)?;
        world.player.segments.push(id);
    }
    Ok(())
}

/// Overlays a stored visit onto the freshly built room. Records line up
/// with the room's non-player entities in load order.
fn apply_room_save(world: &mut World, save: &RoomSave) -> Result<(), LevelError> {
    let targets: Vec<_> = world
        .entities
        .iter()
        .filter(|(_, entity)| entity.kind() != BlockKind::PlayerSegment)
        .map(|(id, _)| id)
        .collect();
    if targets.len() != save.records.len() {
        return Err(LevelError::SaveMismatch {
            index: targets.len().min(save.records.len()),
        });
    }
    for (index, (id, saved)) in targets.into_iter().zip(&save.records).enumerate() {
        let Some(entity) = world.entities.get_mut(id) else {
            return Err(LevelError::SaveMismatch { index });
        };
        if entity.kind() != saved.kind || entity.record.origin() != saved.origin {
            return Err(LevelError::SaveMismatch { index });
        }
        entity.record.set_coord(saved.coord);
        entity.record.set_facing(saved.facing);
        entity.record.set_activation(saved.activation);
        entity.record.set_powered(saved.powered);
        entity.record.set_destroyed(saved.destroyed);
    }

    let mut claimed = HashSet::new();
    for (_, entity) in world.entities.iter().filter(|(_, entity)| entity.is_live()) {
        let coord = entity.coord();
        if !world.grid.within_bounds(coord) {
            return Err(LevelError::OutOfBounds { coord });
        }
        if !claimed.insert((coord, entity.layer)) {
            return Err(LevelError::Occupied {
                coord,
                layer: entity.layer,
            });
        }
    }
    snapshot::rebuild_grid(world);
    Ok(())
}

/// Grows the drawn body to the length carried over from earlier rooms. A body
/// drawn longer than the record is kept as drawn.
fn regrow(world: &mut World, length: usize) {
    let mut growth = Vec::new();
    while world.player.segments.len() < length {
        if !player::grow(world, None, &mut growth) {
            warn!(
                length,
                placed = world.player.segments.len(),
                "no room to regrow the stored body"
            );
            break;
        }
    }
}

/// Sizes the tunnel flags to cover every gate in the room.
fn reserve_tunnels(world: &mut World) {
    let needed = world
        .entities
        .iter()
        .filter_map(|(_, entity)| match entity.kind() {
            BlockKind::Gate {
                tunnel: Some(tunnel),
                ..
            } => Some(usize::from(tunnel) + 1),
            _ => None,
        })
        .max()
        .unwrap_or(0);
    if world.unlocked_tunnels.len() < needed {
        world.unlocked_tunnels.resize(needed, false);
    }
}

#[cfg(test)]
mod tests {
    use cellshift_core::{Command, Coord, Layer};

    use super::*;
    use crate::apply;

    fn load(world: &mut World, level: LevelData) -> Vec<Event> {
        let mut events = Vec::new();
        apply(
            world,
            Command::LoadRoom {
                level,
                save: None,
                player: None,
            },
            &mut events,
        );
        events
    }

    #[test]
    fn rejects_overlapping_placements() {
        let mut world = World::new();
        let events = load(
            &mut world,
            LevelData::new("clash", 4, 4)
                .with(BlockKind::Rock, Coord::new(1, 1))
                .with(BlockKind::Ground, Coord::new(1, 1))
                .with_player(&[Coord::new(3, 0)]),
        );
        assert_eq!(
            events,
            vec![Event::RoomLoadRejected {
                reason: LevelError::Occupied {
                    coord: Coord::new(1, 1),
                    layer: Layer::Block,
                },
            }]
        );
    }

    #[test]
    fn rejects_a_scattered_body() {
        let mut world = World::new();
        let events = load(
            &mut world,
            LevelData::new("scatter", 5, 5).with_player(&[Coord::new(0, 0), Coord::new(2, 0)]),
        );
        assert_eq!(
            events,
            vec![Event::RoomLoadRejected {
                reason: LevelError::DisconnectedPlayer { index: 1 },
            }]
        );
    }

    #[test]
    fn pistons_bring_their_arm() {
        let mut world = World::new();
        let events = load(
            &mut world,
            LevelData::new("press", 5, 3)
                .with_floor(0, 0, 4)
                .with_facing(
                    BlockKind::Piston { channel: None },
                    Coord::new(1, 1),
                    Direction::Right,
                )
                .with_player(&[Coord::new(4, 1)]),
        );
        assert!(matches!(events.as_slice(), [Event::RoomLoaded { .. }]));
        let arm = world
            .grid
            .get(Coord::new(2, 1), Layer::Piston)
            .and_then(|id| world.entities.get(id))
            .map(Entity::kind);
        assert_eq!(arm, Some(BlockKind::PistonArm));
    }

    #[test]
    fn unsupported_rocks_settle_during_load() {
        let mut world = World::new();
        let _ = load(
            &mut world,
            LevelData::new("drop", 3, 6)
                .with_floor(0, 0, 2)
                .with(BlockKind::Rock, Coord::new(1, 5))
                .with_player(&[Coord::new(0, 1)]),
        );
        assert!(world.grid.get(Coord::new(1, 1), Layer::Block).is_some());
        assert!(!world.cascade.is_busy());
    }
}
