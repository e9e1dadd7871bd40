//! Runtime entity wrappers and the arena that owns them.

use std::collections::BTreeMap;

use cellshift_core::{
    BlockKind, BlockRecord, Coord, Direction, EntityId, GroupId, Layer, PuzzleCategory, Tags,
};

/// Runtime wrapper around a persisted block record.
#[derive(Clone, Debug)]
pub(crate) struct Entity {
    pub(crate) record: BlockRecord,
    pub(crate) layer: Layer,
    pub(crate) tags: Tags,
    /// Advisory lock held while the entity is in transit across a cell.
    pub(crate) moving: Option<Direction>,
}

impl Entity {
    pub(crate) fn new(record: BlockRecord) -> Self {
        let kind = record.kind();
        Self {
            record,
            layer: kind.layer(),
            tags: kind.tags(),
            moving: None,
        }
    }

    pub(crate) fn kind(&self) -> BlockKind {
        self.record.kind()
    }

    pub(crate) fn coord(&self) -> Coord {
        self.record.coord()
    }

    pub(crate) fn group(&self) -> GroupId {
        self.record.group()
    }

    pub(crate) fn is_live(&self) -> bool {
        !self.record.destroyed()
    }
}

/// Arena of every entity in the room plus the group membership index.
///
/// Entities are never removed: destroyed entities stay in the arena with
/// their `destroyed` flag set so they remain retrievable by group.
#[derive(Clone, Debug, Default)]
pub(crate) struct Entities {
    list: Vec<Entity>,
    groups: BTreeMap<GroupId, Vec<EntityId>>,
    next_group: u32,
}

impl Entities {
    pub(crate) fn allocate_group(&mut self) -> GroupId {
        let group = GroupId::new(self.next_group);
        self.next_group = self.next_group.saturating_add(1);
        group
    }

    pub(crate) fn push(&mut self, entity: Entity) -> EntityId {
        let id = id_at(self.list.len());
        self.groups.entry(entity.group()).or_default().push(id);
        self.list.push(entity);
        id
    }

    pub(crate) fn get(&self, id: EntityId) -> Option<&Entity> {
        self.list.get(index_of(id))
    }

    pub(crate) fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.list.get_mut(index_of(id))
    }

    pub(crate) fn len(&self) -> usize {
        self.list.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.list
            .iter()
            .enumerate()
            .map(|(index, entity)| (id_at(index), entity))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut Entity)> {
        self.list
            .iter_mut()
            .enumerate()
            .map(|(index, entity)| (id_at(index), entity))
    }

    /// Members of a group in insertion order, destroyed members included.
    pub(crate) fn members(&self, group: GroupId) -> &[EntityId] {
        self.groups.get(&group).map_or(&[], Vec::as_slice)
    }

    /// Live members of a group.
    pub(crate) fn live_members(&self, group: GroupId) -> Vec<EntityId> {
        self.members(group)
            .iter()
            .copied()
            .filter(|id| self.get(*id).is_some_and(Entity::is_live))
            .collect()
    }

    /// Destroyed members of a group, kept for reloads and restores.
    pub(crate) fn destroyed_members(&self, group: GroupId) -> Vec<EntityId> {
        self.members(group)
            .iter()
            .copied()
            .filter(|id| self.get(*id).is_some_and(|entity| !entity.is_live()))
            .collect()
    }

    pub(crate) fn group_ids(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.groups.keys().copied()
    }

    /// Entities of a category in arena order, excluding the player's body,
    /// whose order is owned by the player state.
    pub(crate) fn in_category(&self, category: PuzzleCategory) -> Vec<EntityId> {
        self.iter()
            .filter(|(_, entity)| entity.kind().category() == Some(category))
            .map(|(id, _)| id)
            .collect()
    }

    /// Detaches an entity from its group's member list.
    pub(crate) fn leave_group(&mut self, id: EntityId, group: GroupId) {
        if let Some(members) = self.groups.get_mut(&group) {
            members.retain(|member| *member != id);
        }
    }

    /// Re-attaches an entity to its group's member list.
    pub(crate) fn join_group(&mut self, id: EntityId, group: GroupId) {
        let members = self.groups.entry(group).or_default();
        if !members.contains(&id) {
            members.push(id);
        }
    }

    pub(crate) fn group_is_moving(&self, group: GroupId) -> bool {
        self.members(group)
            .iter()
            .filter_map(|id| self.get(*id))
            .any(|entity| entity.moving.is_some())
    }

    /// Recomputes every live entity's auto-tiling mask from its group.
    pub(crate) fn retile(&mut self) {
        let masks: Vec<u8> = self
            .list
            .iter()
            .map(|entity| {
                Direction::ALL
                    .iter()
                    .filter(|direction| {
                        let neighbour = entity.coord().step(**direction);
                        self.members(entity.group()).iter().any(|id| {
                            self.get(*id).is_some_and(|other| {
                                other.is_live() && other.coord() == neighbour
                            })
                        })
                    })
                    .fold(0u8, |mask, direction| mask | (1 << direction.facing()))
            })
            .collect();
        for (entity, mask) in self.list.iter_mut().zip(masks) {
            entity.record.set_tiling(mask);
        }
    }
}

fn index_of(id: EntityId) -> usize {
    usize::try_from(id.get()).unwrap_or(usize::MAX)
}

/// Arena slots past `u32::MAX` saturate instead of wrapping onto low ids.
fn id_at(index: usize) -> EntityId {
    EntityId::new(u32::try_from(index).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rock(entities: &mut Entities, group: GroupId, x: i32) -> EntityId {
        entities.push(Entity::new(BlockRecord::new(
            BlockKind::Rock,
            Coord::new(x, 0),
            group,
            Direction::Up,
        )))
    }

    #[test]
    fn members_follow_group_identity() {
        let mut entities = Entities::default();
        let pair = entities.allocate_group();
        let single = entities.allocate_group();
        let first = rock(&mut entities, pair, 1);
        let second = rock(&mut entities, pair, 2);
        let third = rock(&mut entities, single, 5);

        assert_eq!(entities.members(pair), &[first, second]);
        assert_eq!(entities.members(single), &[third]);
        assert_eq!(entities.in_category(PuzzleCategory::Rock).len(), 3);
    }

    #[test]
    fn enumeration_ids_match_pushed_ids() {
        let mut entities = Entities::default();
        let group = entities.allocate_group();
        let pushed = vec![rock(&mut entities, group, 1), rock(&mut entities, group, 2)];

        let listed: Vec<EntityId> = entities.iter().map(|(id, _)| id).collect();
        assert_eq!(listed, pushed);
        let listed_mut: Vec<EntityId> = entities.iter_mut().map(|(id, _)| id).collect();
        assert_eq!(listed_mut, pushed);
        assert_eq!(id_at(usize::MAX), EntityId::new(u32::MAX));
    }

    #[test]
    fn destroyed_members_stay_retrievable() {
        let mut entities = Entities::default();
        let group = entities.allocate_group();
        let first = rock(&mut entities, group, 1);
        let second = rock(&mut entities, group, 2);
        entities
            .get_mut(second)
            .expect("second rock")
            .record
            .set_destroyed(true);

        assert_eq!(entities.live_members(group), vec![first]);
        assert_eq!(entities.destroyed_members(group), vec![second]);
    }

    #[test]
    fn retile_marks_same_group_neighbours() {
        let mut entities = Entities::default();
        let pair = entities.allocate_group();
        let left = rock(&mut entities, pair, 1);
        let right = rock(&mut entities, pair, 2);
        let other = entities.allocate_group();
        let lone = rock(&mut entities, other, 3);
        entities.retile();

        let mask = |id| entities.get(id).expect("entity").record.tiling();
        assert_eq!(mask(left), 1 << Direction::Right.facing());
        assert_eq!(mask(right), 1 << Direction::Left.facing());
        assert_eq!(mask(lone), 0);
    }
}
