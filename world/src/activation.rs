//! Activation propagation for buttons, panels, gates, gate slots, pistons
//! and foreground tiles.

use std::collections::BTreeSet;

use cellshift_core::{
    Activation, BlockKind, Channel, Color, EntityId, Event, Layer, MoverKind, PuzzleCategory,
};
use tracing::{debug, info};

use crate::{
    resolver::{self, Pusher, Resolver},
    World,
};

/// Sets an entity's activation state. Returns whether anything changed; an
/// `instant` request always reports the state, even when it was already set.
/// Button transitions across the active boundary update the colour tally.
pub(crate) fn set_puzzle_activation(
    world: &mut World,
    id: EntityId,
    state: Activation,
    instant: bool,
    out_events: &mut Vec<Event>,
) -> bool {
    let Some(entity) = world.entities.get_mut(id) else {
        return false;
    };
    let previous = entity.record.activation();
    if previous == state {
        if instant {
            out_events.push(Event::ActivationChanged { entity: id, state });
        }
        return instant;
    }
    entity.record.set_activation(state);
    let kind = entity.kind();
    out_events.push(Event::ActivationChanged { entity: id, state });

    if let BlockKind::Button { color } = kind {
        let slot = &mut world.tally[color.index()];
        let updated = match (previous.is_active(), state.is_active()) {
            (false, true) => Some(slot.saturating_add(1)),
            (true, false) => Some(slot.saturating_sub(1)),
            _ => None,
        };
        if let Some(count) = updated {
            *slot = count;
            out_events.push(Event::ColorTallyChanged { color, count });
        }
    }
    true
}

fn kind_of(world: &World, id: EntityId) -> Option<BlockKind> {
    world.entities.get(id).map(|entity| entity.kind())
}

pub(crate) fn set_button(
    world: &mut World,
    id: EntityId,
    state: Activation,
    instant: bool,
    out_events: &mut Vec<Event>,
) -> bool {
    if !matches!(kind_of(world, id), Some(BlockKind::Button { .. })) {
        return false;
    }
    set_puzzle_activation(world, id, state, instant, out_events)
}

pub(crate) fn set_panel(
    world: &mut World,
    id: EntityId,
    state: Activation,
    instant: bool,
    out_events: &mut Vec<Event>,
) -> bool {
    if !matches!(kind_of(world, id), Some(BlockKind::Panel { .. })) {
        return false;
    }
    set_puzzle_activation(world, id, state, instant, out_events)
}

/// Opens or closes a gate. Tunnels are unlocked once the cascade settles,
/// see [`unlock_open_tunnels`].
pub(crate) fn set_gate(
    world: &mut World,
    id: EntityId,
    state: Activation,
    instant: bool,
    out_events: &mut Vec<Event>,
) -> bool {
    if !matches!(kind_of(world, id), Some(BlockKind::Gate { .. })) {
        return false;
    }
    set_puzzle_activation(world, id, state, instant, out_events)
}

/// Unlocks, for good, the tunnel of every gate left open by a settled
/// cascade. Gates opened only for a moment never reach this point.
pub(crate) fn unlock_open_tunnels(world: &mut World, out_events: &mut Vec<Event>) {
    let open: Vec<u8> = world
        .entities
        .in_category(PuzzleCategory::Gate)
        .into_iter()
        .filter_map(|id| world.entities.get(id))
        .filter(|gate| gate.is_live() && gate.record.activation().is_active())
        .filter_map(|gate| match gate.kind() {
            BlockKind::Gate { tunnel, .. } => tunnel,
            _ => None,
        })
        .collect();
    for tunnel in open {
        unlock_tunnel(world, tunnel, out_events);
    }
}

fn unlock_tunnel(world: &mut World, tunnel: u8, out_events: &mut Vec<Event>) {
    let index = usize::from(tunnel);
    if world.unlocked_tunnels.len() <= index {
        world.unlocked_tunnels.resize(index + 1, false);
    }
    if let Some(flag) = world.unlocked_tunnels.get_mut(index) {
        if !*flag {
            *flag = true;
            info!(tunnel, "tunnel unlocked");
            out_events.push(Event::TunnelUnlocked { tunnel });
        }
    }
}

/// Extends or retracts a piston. Extension pushes whatever sits in front of
/// the arm and fails without changes when that push is blocked; retraction
/// always succeeds.
pub(crate) fn set_piston(
    world: &mut World,
    id: EntityId,
    state: Activation,
    instant: bool,
    out_events: &mut Vec<Event>,
) -> bool {
    let Some(base) = world.entities.get(id) else {
        return false;
    };
    if !matches!(base.kind(), BlockKind::Piston { .. }) {
        return false;
    }
    let origin = base.coord();
    let facing = base.record.facing();
    let extending = state.is_active() && !base.record.activation().is_active();
    let arm = world.grid.get(origin.step(facing), Layer::Piston);

    if extending {
        let mut planner = Resolver::new(world);
        if let Some(arm) = arm {
            planner = planner.ignoring(arm);
        }
        let pusher = Pusher {
            from: origin,
            player_body: false,
        };
        let Some(plan) = planner.plan_push(pusher, facing, MoverKind::OtherBlockInduced) else {
            debug!(piston = id.get(), "piston extension blocked");
            out_events.push(Event::MoveBlocked {
                mover: MoverKind::OtherBlockInduced,
                direction: facing,
            });
            return false;
        };
        if !plan.groups.is_empty()
            && !resolver::commit(world, &plan, facing, MoverKind::OtherBlockInduced, out_events)
        {
            return false;
        }
    }

    let changed = set_puzzle_activation(world, id, state, instant, out_events);
    if let Some(arm) = arm {
        let _ = set_puzzle_activation(world, arm, state, instant, out_events);
    }
    changed
}

/// Dispatches a direct activation request to the wrapper for the entity's
/// kind.
pub(crate) fn set_by_kind(
    world: &mut World,
    id: EntityId,
    state: Activation,
    instant: bool,
    out_events: &mut Vec<Event>,
) -> bool {
    match kind_of(world, id) {
        Some(BlockKind::Button { .. }) => set_button(world, id, state, instant, out_events),
        Some(BlockKind::Panel { .. }) => set_panel(world, id, state, instant, out_events),
        Some(BlockKind::Gate { .. }) => set_gate(world, id, state, instant, out_events),
        Some(BlockKind::Piston { .. }) => set_piston(world, id, state, instant, out_events),
        Some(BlockKind::GateSlot { .. } | BlockKind::Fg) => {
            set_puzzle_activation(world, id, state, instant, out_events)
        }
        _ => {
            out_events.push(Event::TargetInvalid);
            false
        }
    }
}

/// Connects or disconnects a button's external power source.
pub(crate) fn power_button(
    world: &mut World,
    id: EntityId,
    powered: bool,
    out_events: &mut Vec<Event>,
) -> bool {
    let Some(entity) = world.entities.get_mut(id) else {
        out_events.push(Event::TargetInvalid);
        return false;
    };
    if !matches!(entity.kind(), BlockKind::Button { .. }) {
        out_events.push(Event::TargetInvalid);
        return false;
    }
    if entity.record.powered() == powered {
        return false;
    }
    entity.record.set_powered(powered);
    true
}

/// Re-derives every activation state from the room's occupancy, propagating
/// buttons to panels and panels to channels. Returns whether anything
/// changed.
pub(crate) fn recheck(world: &mut World, out_events: &mut Vec<Event>) -> bool {
    let mut changed = false;

    for id in world.entities.in_category(PuzzleCategory::Button) {
        let Some(desired) = button_state(world, id) else {
            continue;
        };
        changed |= set_button(world, id, desired, false, out_events);
    }

    let mut powered = BTreeSet::new();
    for id in world.entities.in_category(PuzzleCategory::Panel) {
        let Some(BlockKind::Panel { channel, pattern }) = kind_of(world, id) else {
            continue;
        };
        let lit = pattern.satisfied_by(&world.tally);
        if lit {
            let _ = powered.insert(channel);
        }
        changed |= set_panel(world, id, to_state(lit), false, out_events);
    }

    for id in world.entities.in_category(PuzzleCategory::Gate) {
        if let Some(BlockKind::Gate {
            channel: Some(channel),
            ..
        }) = kind_of(world, id)
        {
            let state = to_state(powered.contains(&channel));
            changed |= set_gate(world, id, state, false, out_events);
        }
    }

    for id in world.entities.in_category(PuzzleCategory::GateSlot) {
        if let Some(BlockKind::GateSlot { channel }) = kind_of(world, id) {
            let state = to_state(powered.contains(&channel));
            changed |= set_puzzle_activation(world, id, state, false, out_events);
        }
    }

    for id in world.entities.in_category(PuzzleCategory::Piston) {
        if let Some(BlockKind::Piston {
            channel: Some(channel),
        }) = kind_of(world, id)
        {
            changed |= drive_piston(world, id, channel, &powered, out_events);
        }
    }

    for id in world.entities.in_category(PuzzleCategory::Fg) {
        let Some(entity) = world.entities.get(id) else {
            continue;
        };
        let covered = entity.is_live() && world.grid.get(entity.coord(), Layer::Player).is_some();
        changed |= set_puzzle_activation(world, id, to_state(covered), false, out_events);
    }

    changed
}

fn drive_piston(
    world: &mut World,
    id: EntityId,
    channel: Channel,
    powered: &BTreeSet<Channel>,
    out_events: &mut Vec<Event>,
) -> bool {
    let state = to_state(powered.contains(&channel));
    let current = world.entities.get(id).map(|entity| entity.record.activation());
    if current == Some(state) {
        return false;
    }
    set_piston(world, id, state, false, out_events)
}

/// A button is on while a crystal of its colour rests on it, alternate while
/// externally powered, and off otherwise.
fn button_state(world: &World, id: EntityId) -> Option<Activation> {
    let button = world.entities.get(id)?;
    let BlockKind::Button { color } = button.kind() else {
        return None;
    };
    let pressed = world
        .grid
        .get(button.coord(), Layer::Block)
        .and_then(|occupant| world.entities.get(occupant))
        .is_some_and(|occupant| {
            occupant.is_live() && occupant.kind() == BlockKind::Crystal { color }
        });
    Some(if pressed {
        Activation::On
    } else if button.record.powered() {
        Activation::Alt
    } else {
        Activation::Off
    })
}

fn to_state(active: bool) -> Activation {
    if active {
        Activation::On
    } else {
        Activation::Off
    }
}

/// Recounts the colour tally from the button states.
pub(crate) fn recount_tally(world: &mut World) {
    let mut tally = [0u32; Color::COUNT];
    for id in world.entities.in_category(PuzzleCategory::Button) {
        if let Some(entity) = world.entities.get(id) {
            if let BlockKind::Button { color } = entity.kind() {
                if entity.record.activation().is_active() {
                    tally[color.index()] = tally[color.index()].saturating_add(1);
                }
            }
        }
    }
    world.tally = tally;
}

/// Re-derives arm states and the colour tally from restored activations.
pub(crate) fn sync_derived(world: &mut World) {
    let arms: Vec<_> = world
        .entities
        .iter()
        .filter(|(_, entity)| matches!(entity.kind(), BlockKind::Piston { .. }))
        .map(|(_, entity)| {
            (
                entity.coord().step(entity.record.facing()),
                entity.record.activation(),
            )
        })
        .collect();
    for (cell, state) in arms {
        if let Some(arm) = world
            .grid
            .get(cell, Layer::Piston)
            .and_then(|arm| world.entities.get_mut(arm))
        {
            arm.record.set_activation(state);
        }
    }
    recount_tally(world);
}
