//! ASCII rendering of the live room.
//!
//! Symbols follow the level file legend. Pieces that only exist in tables
//! are drawn as `P` (piston), `-` (extended arm), `|` or `/` (closed or open
//! gate), `L` or `l` (lit or dark panel) and `:` (gate slot).

use cellshift_core::{Ability, Activation, BlockKind, Color, Coord, EntityId, Grant, Layer};
use cellshift_world::{query, World};

/// Layers drawn in priority order, the first occupied one wins.
const DRAW_ORDER: [Layer; 8] = [
    Layer::Player,
    Layer::Block,
    Layer::Piston,
    Layer::Misc,
    Layer::Collect,
    Layer::Dig,
    Layer::Tunnel,
    Layer::Fg,
];

/// Draws the room, top row first.
pub(crate) fn board(world: &World) -> String {
    let (width, height) = query::dimensions(world);
    let head = query::player(world).head();
    let mut out = String::new();
    for y in (0..height).rev() {
        for x in 0..width {
            out.push(cell(world, Coord::new(x, y), head));
        }
        out.push('\n');
    }
    out
}

fn cell(world: &World, coord: Coord, head: Option<EntityId>) -> char {
    let occupants = query::occupants(world, coord, &DRAW_ORDER);
    let mut views = occupants
        .iter()
        .flatten()
        .filter_map(|id| query::entity(world, *id).map(|view| (*id, view)))
        .filter(|(_, view)| {
            let record = view.record();
            let retracted =
                record.kind() == BlockKind::PistonArm && record.activation() == Activation::Off;
            !record.destroyed() && !retracted
        });
    let Some((id, view)) = views.next() else {
        return '.';
    };
    let record = view.record();
    let active = record.activation().is_active();
    match record.kind() {
        BlockKind::PlayerSegment if Some(id) == head => '@',
        BlockKind::PlayerSegment => 's',
        BlockKind::Crystal { color } => {
            let pressed = occupants
                .iter()
                .flatten()
                .filter_map(|other| query::entity(world, *other))
                .any(|other| other.record().kind() == BlockKind::Button { color });
            if pressed {
                match color {
                    Color::Red => '1',
                    Color::Green => '2',
                    Color::Blue => '3',
                }
            } else {
                color_symbol(color, false)
            }
        }
        BlockKind::Button { color } => color_symbol(color, true),
        BlockKind::Ground => '#',
        BlockKind::Rock => 'o',
        BlockKind::Drift => 'd',
        BlockKind::Gate { .. } if active => '/',
        BlockKind::Gate { .. } => '|',
        BlockKind::Piston { .. } => 'P',
        BlockKind::PistonArm => '-',
        BlockKind::Panel { .. } if active => 'L',
        BlockKind::Panel { .. } => 'l',
        BlockKind::GateSlot { .. } => ':',
        BlockKind::Collectable { grant } => match grant {
            Grant::Segment => '+',
            Grant::Ability(Ability::Time) => 'Z',
            Grant::Ability(Ability::Dig) => 'D',
            Grant::Ability(Ability::Hover) => 'H',
        },
        BlockKind::Dig => '=',
        BlockKind::Tunnel => 'T',
        BlockKind::Fg => '~',
    }
}

const fn color_symbol(color: Color, button: bool) -> char {
    match (color, button) {
        (Color::Red, false) => 'r',
        (Color::Green, false) => 'g',
        (Color::Blue, false) => 'b',
        (Color::Red, true) => 'R',
        (Color::Green, true) => 'G',
        (Color::Blue, true) => 'B',
    }
}

#[cfg(test)]
mod tests {
    use cellshift_core::Command;
    use cellshift_world as world;

    use super::*;
    use crate::level_file;

    #[test]
    fn board_redraws_the_level_it_was_loaded_from() {
        let rows = ["..=~Z.", "s@.o2+", "######"];
        let text = format!(
            "name = \"redraw\"\nrows = [{}]\n",
            rows.map(|row| format!("\"{row}\"")).join(", ")
        );
        let level = level_file::parse(&text).expect("parse");
        let mut world = World::new();
        let mut events = Vec::new();
        world::apply(
            &mut world,
            Command::LoadRoom {
                level,
                save: None,
                player: None,
            },
            &mut events,
        );

        assert_eq!(board(&world), format!("{}\n", rows.join("\n")));
    }
}
