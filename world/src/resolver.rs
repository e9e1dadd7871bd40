//! Push-chain resolution.
//!
//! A move is planned against the current occupancy without touching it. The
//! plan is the closure of every group that has to shift along with the
//! initiating group; it either succeeds as a whole and is committed with a
//! single grid relocation, or fails and leaves the world untouched.

use cellshift_core::{
    Activation, BlockKind, Coord, Direction, EntityId, Event, GroupId, Layer, MoverKind, Tags,
};
use tracing::{debug, error};

use crate::{
    entity::{Entities, Entity},
    grid::{Grid, Relocation},
    World,
};

/// Cell from which a virtual mover pushes into the next cell, such as the
/// player's head or a piston base.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Pusher {
    pub(crate) from: Coord,
    pub(crate) player_body: bool,
}

/// Groups that move together when the plan is committed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct MovePlan {
    pub(crate) groups: Vec<GroupId>,
    floated: bool,
    scraped: bool,
}

impl MovePlan {
    fn note(&mut self, entity: &Entity, direction: Direction) {
        self.floated |= entity.tags.contains(Tags::FLOAT);
        self.scraped |= direction.is_horizontal()
            && matches!(entity.kind(), BlockKind::Rock | BlockKind::Drift);
    }
}

enum Admission {
    Pass,
    Block,
    Join(GroupId),
}

/// Read-only planner over the grid and entity arena.
pub(crate) struct Resolver<'a> {
    grid: &'a Grid,
    entities: &'a Entities,
    hovering: bool,
    /// Force points against gravity and holds force-bound groups up.
    force_lifts: bool,
    transparent: Option<EntityId>,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(world: &'a World) -> Self {
        Self {
            grid: &world.grid,
            entities: &world.entities,
            hovering: world.player.hovering,
            force_lifts: world.force == Some(world.gravity.opposite()),
            transparent: None,
        }
    }

    /// Treats an entity as absent, e.g. a soil tile about to be dug.
    pub(crate) fn ignoring(mut self, entity: EntityId) -> Self {
        self.transparent = Some(entity);
        self
    }

    /// Plans moving `root` one cell in `direction`.
    pub(crate) fn plan_group(
        &self,
        root: GroupId,
        direction: Direction,
        mover: MoverKind,
    ) -> Option<MovePlan> {
        let mut plan = MovePlan::default();
        plan.groups.push(root);
        for id in self.entities.live_members(root) {
            if let Some(entity) = self.entities.get(id) {
                plan.note(entity, direction);
            }
        }
        let mut pending = vec![root];
        self.close(&mut plan, &mut pending, direction, mover)?;
        Some(plan)
    }

    /// Plans a virtual mover entering the cell in front of `pusher`.
    pub(crate) fn plan_push(
        &self,
        pusher: Pusher,
        direction: Direction,
        mover: MoverKind,
    ) -> Option<MovePlan> {
        let mut plan = MovePlan::default();
        let mut pending = Vec::new();
        self.inspect(pusher, None, direction, mover, &mut plan, &mut pending)?;
        self.close(&mut plan, &mut pending, direction, mover)?;
        Some(plan)
    }

    fn close(
        &self,
        plan: &mut MovePlan,
        pending: &mut Vec<GroupId>,
        direction: Direction,
        mover: MoverKind,
    ) -> Option<()> {
        while let Some(group) = pending.pop() {
            for id in self.entities.live_members(group) {
                let Some(entity) = self.entities.get(id) else {
                    continue;
                };
                let pusher = Pusher {
                    from: entity.coord(),
                    player_body: entity.tags.contains(Tags::PLAYER_BODY),
                };
                self.inspect(pusher, Some(group), direction, mover, plan, pending)?;
            }
        }
        Some(())
    }

    fn inspect(
        &self,
        pusher: Pusher,
        own: Option<GroupId>,
        direction: Direction,
        mover: MoverKind,
        plan: &mut MovePlan,
        pending: &mut Vec<GroupId>,
    ) -> Option<()> {
        let destination = pusher.from.step(direction);
        if !self.grid.within_bounds(destination) {
            return None;
        }
        let occupants = self.grid.get_any(destination, &Layer::MOVEMENT_ORDER);
        for (layer, occupant) in Layer::MOVEMENT_ORDER.iter().zip(occupants) {
            let Some(id) = occupant else {
                continue;
            };
            if Some(id) == self.transparent {
                continue;
            }
            let Some(entity) = self.entities.get(id) else {
                continue;
            };
            let group = entity.group();
            if Some(group) == own || plan.groups.contains(&group) {
                continue;
            }
            match self.admit(entity, *layer, mover, pusher.player_body) {
                Admission::Pass => {}
                Admission::Block => return None,
                Admission::Join(group) => {
                    plan.note(entity, direction);
                    plan.groups.push(group);
                    pending.push(group);
                }
            }
        }
        Some(())
    }

    fn admit(
        &self,
        entity: &Entity,
        layer: Layer,
        mover: MoverKind,
        player_body: bool,
    ) -> Admission {
        if entity.moving.is_some() {
            return Admission::Block;
        }
        match layer {
            Layer::Tunnel => Admission::Block,
            Layer::Piston => {
                if entity.record.activation() == Activation::Off {
                    Admission::Pass
                } else {
                    Admission::Block
                }
            }
            Layer::Player => {
                if mover == MoverKind::PlayerInitiated || self.hovering {
                    Admission::Block
                } else {
                    Admission::Join(entity.group())
                }
            }
            Layer::Collect => {
                if player_body {
                    Admission::Pass
                } else {
                    Admission::Block
                }
            }
            _ => {
                if entity.tags.contains(Tags::PUSH) {
                    let held = entity.tags.contains(Tags::FLOAT)
                        || (self.force_lifts && entity.tags.contains(Tags::FORCE));
                    if mover == MoverKind::GravityInduced && held {
                        Admission::Block
                    } else {
                        Admission::Join(entity.group())
                    }
                } else if entity.tags.contains(Tags::STOP) {
                    if mover == MoverKind::PlayerInitiated && player_body && is_open_gate(entity) {
                        Admission::Pass
                    } else {
                        Admission::Block
                    }
                } else {
                    Admission::Pass
                }
            }
        }
    }
}

fn is_open_gate(entity: &Entity) -> bool {
    matches!(entity.kind(), BlockKind::Gate { .. }) && entity.record.activation() == Activation::On
}

/// Applies a successful plan: every live member of every planned group is
/// translated one cell and marked as in transit. The grid is updated first;
/// if it refuses the batch nothing moves and `false` is returned.
pub(crate) fn commit(
    world: &mut World,
    plan: &MovePlan,
    direction: Direction,
    mover: MoverKind,
    out_events: &mut Vec<Event>,
) -> bool {
    let relocations: Vec<Relocation> = plan
        .groups
        .iter()
        .flat_map(|group| world.entities.live_members(*group))
        .filter_map(|id| {
            let entity = world.entities.get(id)?;
            Some(Relocation {
                entity: id,
                layer: entity.layer,
                from: entity.coord(),
                to: entity.coord().step(direction),
            })
        })
        .collect();
    if let Err(relocation) = world.grid.relocate_all(&relocations) {
        error!(?relocation, "planned move collided with an occupant");
        return false;
    }
    for relocation in &relocations {
        if let Some(entity) = world.entities.get_mut(relocation.entity) {
            entity.record.set_coord(relocation.to);
            entity.moving = Some(direction);
        }
    }
    for relocation in &relocations {
        out_events.push(Event::MoveStarted {
            entity: relocation.entity,
            from: relocation.from,
            to: relocation.to,
            direction,
        });
    }
    out_events.push(Event::ChainMoved {
        mover,
        direction,
        groups: plan.groups.len(),
        floated: plan.floated,
        scraped: plan.scraped,
    });
    world.cascade.hold(world.config.ticks_per_cell);
    true
}

/// Attempts to move a group one cell, committing only when the whole chain
/// can move.
pub(crate) fn try_move(
    world: &mut World,
    group: GroupId,
    direction: Direction,
    mover: MoverKind,
    out_events: &mut Vec<Event>,
) -> bool {
    match Resolver::new(world).plan_group(group, direction, mover) {
        Some(plan) => commit(world, &plan, direction, mover, out_events),
        None => {
            debug!(group = group.get(), ?direction, ?mover, "move blocked");
            out_events.push(Event::MoveBlocked { mover, direction });
            false
        }
    }
}

/// Moves a group on behalf of an external agent.
pub(crate) fn move_group(
    world: &mut World,
    group: GroupId,
    direction: Direction,
    out_events: &mut Vec<Event>,
) -> bool {
    if world.entities.live_members(group).is_empty() || group == world.player.group {
        out_events.push(Event::TargetInvalid);
        return false;
    }
    try_move(world, group, direction, MoverKind::OtherBlockInduced, out_events)
}
