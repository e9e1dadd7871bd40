//! Capturing and restoring the restorable state of a room.

use std::collections::{BTreeMap, HashSet};

use cellshift_core::{
    BlockDiff, BlockKind, Coord, EntityId, EntityRecord, Layer, PlayerDiff, PuzzleCategory,
    RoomSave, Snapshot, SnapshotError,
};
use tracing::{debug, warn};

use crate::{activation, player, World};

/// Entities of a category in snapshot order. The player's body is ordered
/// head first; every other category follows arena order.
pub(crate) fn category_members(world: &World, category: PuzzleCategory) -> Vec<EntityId> {
    if category == PuzzleCategory::Player {
        world.player.segments.clone()
    } else {
        world.entities.in_category(category)
    }
}

pub(crate) fn capture(world: &World) -> Snapshot {
    let categories: BTreeMap<PuzzleCategory, Vec<BlockDiff>> = PuzzleCategory::ALL
        .iter()
        .map(|category| {
            let diffs = category_members(world, *category)
                .into_iter()
                .filter_map(|id| world.entities.get(id))
                .map(|entity| entity.record.diff())
                .collect();
            (*category, diffs)
        })
        .collect();
    let player = PlayerDiff {
        length: u8::try_from(world.player.segments.len()).unwrap_or(u8::MAX),
        unlocked: world.player.unlocked,
        colors: world.player.colors,
        hovering: world.player.hovering,
    };
    Snapshot::new(categories, player, world.force)
}

/// Every placed entity except the player's body, in load order.
pub(crate) fn room_save(world: &World) -> RoomSave {
    let records = world
        .entities
        .iter()
        .filter(|(_, entity)| entity.kind() != BlockKind::PlayerSegment)
        .map(|(_, entity)| EntityRecord {
            kind: entity.kind(),
            origin: entity.record.origin(),
            coord: entity.coord(),
            facing: entity.record.facing(),
            activation: entity.record.activation(),
            powered: entity.record.powered(),
            destroyed: entity.record.destroyed(),
        })
        .collect();
    RoomSave {
        room: world.room.clone(),
        records,
    }
}

/// Applies a snapshot to the live world. The snapshot is validated in full
/// before anything is mutated; a rejected snapshot leaves the world as it was.
pub(crate) fn restore(world: &mut World, snapshot: &Snapshot) -> Result<(), SnapshotError> {
    validate_shape(world, snapshot)?;
    validate_layout(world, snapshot)?;

    for category in PuzzleCategory::ALL {
        if category == PuzzleCategory::Player {
            continue;
        }
        let members = world.entities.in_category(category);
        for (id, diff) in members.into_iter().zip(snapshot.category(category)) {
            if let Some(entity) = world.entities.get_mut(id) {
                entity.record.apply_diff(diff);
            }
        }
    }

    let body = snapshot.category(PuzzleCategory::Player);
    player::resize(world, body.len());
    for (id, diff) in world.player.segments.clone().into_iter().zip(body) {
        if let Some(entity) = world.entities.get_mut(id) {
            entity.record.apply_diff(diff);
        }
    }
    world.player.unlocked = snapshot.player().unlocked;
    world.player.colors = snapshot.player().colors;
    world.player.hovering = snapshot.player().hovering;
    world.force = snapshot.force();

    rebuild_grid(world);
    activation::sync_derived(world);
    world.entities.retile();
    world.falls.reset();
    world.cascade.cancel();
    debug!(entities = world.entities.len(), "snapshot restored");
    Ok(())
}

fn validate_shape(world: &World, snapshot: &Snapshot) -> Result<(), SnapshotError> {
    for category in PuzzleCategory::ALL {
        let diffs = snapshot.category(category);
        if category == PuzzleCategory::Player {
            if diffs.is_empty() {
                return Err(SnapshotError::ShapeMismatch {
                    category,
                    expected: world.player.segments.len(),
                    found: 0,
                });
            }
            if let Some(index) = diffs
                .iter()
                .position(|diff| diff.kind != BlockKind::PlayerSegment)
            {
                return Err(SnapshotError::KindMismatch { category, index });
            }
            continue;
        }

        let members = world.entities.in_category(category);
        if members.len() != diffs.len() {
            return Err(SnapshotError::ShapeMismatch {
                category,
                expected: members.len(),
                found: diffs.len(),
            });
        }
        let mismatch = members.iter().zip(diffs).position(|(id, diff)| {
            world
                .entities
                .get(*id)
                .map_or(true, |entity| entity.kind() != diff.kind)
        });
        if let Some(index) = mismatch {
            return Err(SnapshotError::KindMismatch { category, index });
        }
    }
    Ok(())
}

/// Checks that the restored positions fit the room without overlaps.
fn validate_layout(world: &World, snapshot: &Snapshot) -> Result<(), SnapshotError> {
    let mut restored: BTreeMap<EntityId, &BlockDiff> = BTreeMap::new();
    for category in PuzzleCategory::ALL {
        if category == PuzzleCategory::Player {
            continue;
        }
        for (id, diff) in world
            .entities
            .in_category(category)
            .into_iter()
            .zip(snapshot.category(category))
        {
            let _ = restored.insert(id, diff);
        }
    }

    let mut claimed: HashSet<(Coord, Layer)> = HashSet::new();
    let mut claim = |coord: Coord, layer: Layer| {
        if !world.grid.within_bounds(coord) {
            return Err(SnapshotError::OutOfBounds { coord });
        }
        if !claimed.insert((coord, layer)) {
            return Err(SnapshotError::Overlap { coord });
        }
        Ok(())
    };

    for (id, entity) in world.entities.iter() {
        if entity.kind() == BlockKind::PlayerSegment {
            continue;
        }
        let (coord, destroyed) = match restored.get(&id) {
            Some(diff) => (diff.coord, diff.destroyed),
            None => (entity.coord(), entity.record.destroyed()),
        };
        if !destroyed {
            claim(coord, entity.layer)?;
        }
    }
    for diff in snapshot.category(PuzzleCategory::Player) {
        if !diff.destroyed {
            claim(diff.coord, Layer::Player)?;
        }
    }
    Ok(())
}

/// Re-indexes every live entity after their records were rewritten.
pub(crate) fn rebuild_grid(world: &mut World) {
    world.grid.clear();
    for (id, entity) in world.entities.iter_mut() {
        entity.moving = None;
        if !entity.is_live() {
            continue;
        }
        if let Err(occupant) = world.grid.insert(entity.coord(), entity.layer, id) {
            warn!(
                entity = id.get(),
                occupant = occupant.get(),
                "entities overlap after rebuild"
            );
        }
    }
}
