//! Post-action cascade: force, gravity and activation passes repeated until
//! the room stops changing.

use cellshift_core::{Direction, Event, GroupId, Layer, MoverKind, Tags};
use tracing::{debug, warn};

use crate::{activation, player, resolver, World};

/// Falling state tracked per gravity- or force-bound group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FallEntry {
    pub(crate) group: GroupId,
    pub(crate) falling: bool,
    pub(crate) fall_count: u32,
    force_bound: bool,
}

/// Groups that take part in the force and gravity passes, player first.
#[derive(Clone, Debug, Default)]
pub(crate) struct FallRegistry {
    entries: Vec<FallEntry>,
}

impl FallRegistry {
    /// Classifies every group of the room. A group falls when all of its
    /// members are pushable and none of them float. Groups following the
    /// force are marked so the force pass can find them.
    pub(crate) fn build(world: &World) -> Self {
        let mut entries = vec![FallEntry {
            group: world.player.group,
            falling: false,
            fall_count: 0,
            force_bound: false,
        }];
        for group in world.entities.group_ids() {
            if group == world.player.group {
                continue;
            }
            let tags: Vec<Tags> = world
                .entities
                .members(group)
                .iter()
                .filter_map(|id| world.entities.get(*id))
                .map(|entity| entity.tags)
                .collect();
            if tags.is_empty() || !tags.iter().all(|tag| tag.contains(Tags::PUSH)) {
                continue;
            }
            if tags.iter().any(|tag| tag.contains(Tags::FLOAT)) {
                continue;
            }
            entries.push(FallEntry {
                group,
                falling: false,
                fall_count: 0,
                force_bound: tags.iter().any(|tag| tag.contains(Tags::FORCE)),
            });
        }
        Self { entries }
    }

    pub(crate) fn get(&self, group: GroupId) -> Option<&FallEntry> {
        self.entries.iter().find(|entry| entry.group == group)
    }

    fn get_mut(&mut self, group: GroupId) -> Option<&mut FallEntry> {
        self.entries.iter_mut().find(|entry| entry.group == group)
    }

    /// Forgets every fall in progress.
    pub(crate) fn reset(&mut self) {
        for entry in &mut self.entries {
            entry.falling = false;
            entry.fall_count = 0;
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Phase {
    #[default]
    Force,
    Gravity,
    Activation,
}

/// Progress of the cascade following the most recent action.
#[derive(Clone, Debug, Default)]
pub(crate) struct Cascade {
    pending: bool,
    phase: Phase,
    in_progress: u32,
    /// Ticks left before entities in transit arrive.
    transit: u32,
    rounds: u32,
    round_changed: bool,
}

impl Cascade {
    pub(crate) fn is_busy(&self) -> bool {
        self.in_progress > 0 || self.transit > 0
    }

    pub(crate) fn in_progress(&self) -> u32 {
        self.in_progress
    }

    /// Keeps the cascade waiting while committed moves are in transit.
    pub(crate) fn hold(&mut self, ticks: u32) {
        self.transit = self.transit.max(ticks);
    }

    /// Drops any cascade in flight.
    pub(crate) fn cancel(&mut self) {
        *self = Self::default();
    }
}

/// Starts (or extends) the cascade after an action changed the room.
pub(crate) fn begin(world: &mut World, out_events: &mut Vec<Event>) {
    world.cascade.in_progress = world.cascade.in_progress.saturating_add(1);
    if !world.cascade.pending {
        world.cascade.pending = true;
        world.cascade.phase = Phase::Force;
        world.cascade.rounds = 0;
        world.cascade.round_changed = false;
    }
    advance(world, out_events);
}

/// Advances a paced cascade by one tick.
pub(crate) fn tick(world: &mut World, out_events: &mut Vec<Event>) {
    world.cascade.transit = world.cascade.transit.saturating_sub(1);
    advance(world, out_events);
}

/// Runs a cascade to completion within the current call regardless of the
/// configured pacing.
pub(crate) fn settle_now(world: &mut World, out_events: &mut Vec<Event>) {
    let pacing = world.config.ticks_per_cell;
    world.config.ticks_per_cell = 0;
    world.cascade.cancel();
    begin(world, out_events);
    world.config.ticks_per_cell = pacing;
}

pub(crate) fn set_force_direction(
    world: &mut World,
    direction: Option<Direction>,
    out_events: &mut Vec<Event>,
) -> bool {
    if world.force == direction {
        return false;
    }
    world.force = direction;
    out_events.push(Event::ForceDirectionChanged { direction });
    true
}

fn advance(world: &mut World, out_events: &mut Vec<Event>) {
    loop {
        if world.cascade.transit > 0 {
            return;
        }
        finish_transit(world, out_events);
        if !world.cascade.pending {
            return;
        }
        step(world, out_events);
    }
}

fn finish_transit(world: &mut World, out_events: &mut Vec<Event>) {
    for (id, entity) in world.entities.iter_mut() {
        if entity.moving.take().is_some() {
            out_events.push(Event::MoveCommitted { entity: id });
        }
    }
}

fn step(world: &mut World, out_events: &mut Vec<Event>) {
    match world.cascade.phase {
        Phase::Force => {
            if force_pass(world, out_events) {
                world.cascade.round_changed = true;
            } else {
                world.cascade.phase = Phase::Gravity;
            }
        }
        Phase::Gravity => match gravity_pass(world, out_events) {
            GravityPass::Moved => world.cascade.round_changed = true,
            GravityPass::Collided => {}
            GravityPass::Settled => world.cascade.phase = Phase::Activation,
        },
        Phase::Activation => {
            let switched = activation::recheck(world, out_events);
            let ate = player::eat(world, None, out_events);
            if switched || ate || world.cascade.round_changed {
                world.cascade.rounds = world.cascade.rounds.saturating_add(1);
                if world.cascade.rounds > world.config.max_cascade_rounds {
                    let rounds = world.cascade.rounds;
                    warn!(rounds, "cascade exceeded its round limit");
                    world.cascade.pending = false;
                    world.cascade.in_progress = 0;
                    out_events.push(Event::CascadeAborted { rounds });
                    return;
                }
                world.cascade.phase = Phase::Force;
                world.cascade.round_changed = false;
            } else {
                activation::unlock_open_tunnels(world, out_events);
                debug!(rounds = world.cascade.rounds, "cascade settled");
                world.cascade.pending = false;
                world.cascade.in_progress = 0;
                out_events.push(Event::CascadeSettled);
            }
        }
    }
}

/// Pushes force-bound groups one cell along the force direction. Skipped
/// when the force points along gravity, in which case those groups fall with
/// the gravity pass instead.
fn force_pass(world: &mut World, out_events: &mut Vec<Event>) -> bool {
    let Some(direction) = world.force else {
        return false;
    };
    if direction == world.gravity {
        return false;
    }
    let groups: Vec<GroupId> = world
        .falls
        .entries
        .iter()
        .filter(|entry| entry.force_bound)
        .map(|entry| entry.group)
        .collect();
    let mut moved = false;
    for group in groups {
        if world.entities.live_members(group).is_empty() || world.entities.group_is_moving(group) {
            continue;
        }
        let plan = resolver::Resolver::new(world).plan_group(
            group,
            direction,
            MoverKind::OtherBlockInduced,
        );
        if let Some(plan) = plan {
            moved |=
                resolver::commit(world, &plan, direction, MoverKind::OtherBlockInduced, out_events);
        }
    }
    moved
}

/// Outcome of one gravity pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GravityPass {
    Moved,
    /// Nothing moved, but a group stopped on one that was still falling and
    /// waits for the next pass to land.
    Collided,
    Settled,
}

/// Drops every unsupported group one cell along gravity. Force-bound groups
/// fall too, unless the force holds them up against gravity.
fn gravity_pass(world: &mut World, out_events: &mut Vec<Event>) -> GravityPass {
    let gravity = world.gravity;
    let include_force_bound = world.force != Some(gravity.opposite());
    let mut moved = false;
    let mut collided = false;
    for index in 0..world.falls.entries.len() {
        let Some(entry) = world.falls.entries.get(index).copied() else {
            continue;
        };
        if entry.force_bound && !include_force_bound {
            continue;
        }
        if entry.group == world.player.group && world.player.hovering {
            continue;
        }
        if world.entities.live_members(entry.group).is_empty()
            || world.entities.group_is_moving(entry.group)
        {
            continue;
        }
        let plan = resolver::Resolver::new(world).plan_group(
            entry.group,
            gravity,
            MoverKind::GravityInduced,
        );
        if let Some(plan) = plan {
            if resolver::commit(world, &plan, gravity, MoverKind::GravityInduced, out_events) {
                for group in &plan.groups {
                    if let Some(fallen) = world.falls.get_mut(*group) {
                        fallen.falling = true;
                        fallen.fall_count = fallen.fall_count.saturating_add(1);
                    }
                }
                moved = true;
                continue;
            }
        }

        let Some(current) = world.falls.get(entry.group).copied() else {
            continue;
        };
        if !current.falling && current.fall_count == 0 {
            continue;
        }
        let on_falling = resting_on_falling(world, entry.group);
        let Some(fallen) = world.falls.get_mut(entry.group) else {
            continue;
        };
        fallen.falling = false;
        if on_falling {
            collided = true;
            debug!(group = entry.group.get(), "group collided mid-fall");
        } else {
            let fall_count = fallen.fall_count;
            fallen.fall_count = 0;
            debug!(group = entry.group.get(), fall_count, "group landed");
            out_events.push(Event::GroupLanded {
                group: entry.group,
                fall_count,
            });
        }
    }
    if moved {
        GravityPass::Moved
    } else if collided {
        GravityPass::Collided
    } else {
        GravityPass::Settled
    }
}

/// Reports whether a blocked group rests on a group still marked falling,
/// i.e. it collided mid-air rather than landed.
fn resting_on_falling(world: &World, group: GroupId) -> bool {
    world.entities.live_members(group).iter().any(|id| {
        let Some(entity) = world.entities.get(*id) else {
            return false;
        };
        let below = entity.coord().step(world.gravity);
        world
            .grid
            .get_any(below, &[Layer::Block, Layer::Player])
            .into_iter()
            .flatten()
            .filter_map(|other| world.entities.get(other))
            .map(|other| other.group())
            .filter(|other| *other != group)
            .any(|other| world.falls.get(other).is_some_and(|entry| entry.falling))
    })
}

