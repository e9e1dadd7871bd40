//! TOML level files.
//!
//! A level is drawn as rows of characters, top row first, so the last row
//! is `y = 0`. Wired pieces and multi-cell groups are listed in tables:
//!
//! ```toml
//! name = "lift"
//! gravity = "Down"
//! rows = [
//!     "#....#",
//!     "#@s.o#",
//!     "######",
//! ]
//!
//! [[gate]]
//! at = [4, 2]
//! channel = 1
//!
//! [[group]]
//! cells = [[3, 1], [4, 1]]
//! ```
//!
//! | char | block |
//! |------|-------|
//! | `.` or space | empty |
//! | `#` | ground |
//! | `o` | rock |
//! | `d` | drift |
//! | `r` `g` `b` | crystal |
//! | `R` `G` `B` | button |
//! | `1` `2` `3` | red, green or blue crystal resting on its button |
//! | `=` | soil |
//! | `~` | foreground |
//! | `T` | tunnel mouth |
//! | `+` | segment collectable |
//! | `Z` `D` `H` | time, dig or hover collectable |
//! | `@` | player head |
//! | `s` | player body |

use std::{fs, path::Path};

use anyhow::{anyhow, bail, ensure, Context, Result};
use cellshift_core::{
    Ability, BlockKind, Channel, Color, ColorPattern, Coord, Direction, Grant, Layer, LevelData,
    PlacedBlock,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LevelFile {
    name: String,
    #[serde(default)]
    gravity: Option<Direction>,
    rows: Vec<String>,
    #[serde(default)]
    panel: Vec<PanelEntry>,
    #[serde(default)]
    gate: Vec<GateEntry>,
    #[serde(default)]
    piston: Vec<PistonEntry>,
    #[serde(default)]
    slot: Vec<SlotEntry>,
    #[serde(default)]
    group: Vec<GroupEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PanelEntry {
    at: [i32; 2],
    channel: u8,
    /// Required active buttons per colour: red, green, blue.
    pattern: [u8; Color::COUNT],
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GateEntry {
    at: [i32; 2],
    #[serde(default)]
    channel: Option<u8>,
    #[serde(default)]
    tunnel: Option<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PistonEntry {
    at: [i32; 2],
    facing: Direction,
    #[serde(default)]
    channel: Option<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SlotEntry {
    at: [i32; 2],
    channel: u8,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupEntry {
    cells: Vec<[i32; 2]>,
}

/// Reads and parses a level file.
pub(crate) fn read(path: &Path) -> Result<LevelData> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("could not read level {}", path.display()))?;
    parse(&text).with_context(|| format!("in level {}", path.display()))
}

/// Parses the text of a level file.
pub(crate) fn parse(text: &str) -> Result<LevelData> {
    let file: LevelFile = toml::from_str(text).context("invalid level file")?;
    ensure!(!file.rows.is_empty(), "level `{}` has no rows", file.name);

    let width = file.rows[0].chars().count();
    let height = file.rows.len();
    ensure!(width > 0, "level `{}` has empty rows", file.name);
    for (index, row) in file.rows.iter().enumerate() {
        ensure!(
            row.chars().count() == width,
            "row {index} is {} cells wide, expected {width}",
            row.chars().count()
        );
    }

    let mut blocks = Vec::new();
    let mut head = None;
    let mut body = Vec::new();
    for (row_index, row) in file.rows.iter().enumerate() {
        let y = i32::try_from(height - 1 - row_index)?;
        for (x, symbol) in row.chars().enumerate() {
            let coord = Coord::new(i32::try_from(x)?, y);
            match symbol {
                '@' => {
                    ensure!(head.is_none(), "level has more than one player head");
                    head = Some(coord);
                }
                's' => body.push(coord),
                _ => {
                    for kind in legend(symbol).ok_or_else(|| {
                        anyhow!("unknown symbol `{symbol}` at ({}, {})", coord.x(), y)
                    })? {
                        blocks.push(single(*kind, coord, Direction::Up));
                    }
                }
            }
        }
    }

    for panel in &file.panel {
        let kind = BlockKind::Panel {
            channel: Channel::new(panel.channel),
            pattern: ColorPattern::new(panel.pattern),
        };
        blocks.push(single(kind, at(panel.at), Direction::Up));
    }
    for gate in &file.gate {
        let kind = BlockKind::Gate {
            channel: gate.channel.map(Channel::new),
            tunnel: gate.tunnel,
        };
        blocks.push(single(kind, at(gate.at), Direction::Up));
    }
    for piston in &file.piston {
        let kind = BlockKind::Piston {
            channel: piston.channel.map(Channel::new),
        };
        blocks.push(single(kind, at(piston.at), piston.facing));
    }
    for slot in &file.slot {
        let kind = BlockKind::GateSlot {
            channel: Channel::new(slot.channel),
        };
        blocks.push(single(kind, at(slot.at), Direction::Up));
    }
    for (label, group) in (1u32..).zip(&file.group) {
        for cell in &group.cells {
            let coord = at(*cell);
            let block = blocks
                .iter_mut()
                .find(|block| block.coord == coord && block.kind.layer() == Layer::Block)
                .ok_or_else(|| {
                    anyhow!("group {label} lists ({}, {}) which holds no block", cell[0], cell[1])
                })?;
            ensure!(
                block.group.is_none(),
                "cell ({}, {}) is listed in two groups",
                cell[0],
                cell[1]
            );
            block.group = Some(label);
        }
    }

    let Some(head) = head else {
        bail!("level `{}` has no player head `@`", file.name);
    };
    let player = chain_body(head, body)?;

    let mut level = LevelData::new(file.name, u32::try_from(width)?, u32::try_from(height)?)
        .with_player(&player);
    if let Some(gravity) = file.gravity {
        level = level.with_gravity(gravity);
    }
    for block in blocks {
        level.push(block);
    }
    Ok(level)
}

fn at(cell: [i32; 2]) -> Coord {
    Coord::new(cell[0], cell[1])
}

const fn single(kind: BlockKind, coord: Coord, facing: Direction) -> PlacedBlock {
    PlacedBlock {
        kind,
        coord,
        facing,
        group: None,
    }
}

fn legend(symbol: char) -> Option<&'static [BlockKind]> {
    use BlockKind::{Button, Collectable, Crystal};

    let kinds: &'static [BlockKind] = match symbol {
        '.' | ' ' => &[],
        '#' => &[BlockKind::Ground],
        'o' => &[BlockKind::Rock],
        'd' => &[BlockKind::Drift],
        'r' => &[Crystal { color: Color::Red }],
        'g' => &[Crystal { color: Color::Green }],
        'b' => &[Crystal { color: Color::Blue }],
        'R' => &[Button { color: Color::Red }],
        'G' => &[Button { color: Color::Green }],
        'B' => &[Button { color: Color::Blue }],
        '1' => &[Button { color: Color::Red }, Crystal { color: Color::Red }],
        '2' => &[Button { color: Color::Green }, Crystal { color: Color::Green }],
        '3' => &[Button { color: Color::Blue }, Crystal { color: Color::Blue }],
        '=' => &[BlockKind::Dig],
        '~' => &[BlockKind::Fg],
        'T' => &[BlockKind::Tunnel],
        '+' => &[Collectable {
            grant: Grant::Segment,
        }],
        'Z' => &[Collectable {
            grant: Grant::Ability(Ability::Time),
        }],
        'D' => &[Collectable {
            grant: Grant::Ability(Ability::Dig),
        }],
        'H' => &[Collectable {
            grant: Grant::Ability(Ability::Hover),
        }],
        _ => return None,
    };
    Some(kinds)
}

/// Orders the body cells into a chain starting at the head. Each link must
/// be unambiguous.
fn chain_body(head: Coord, mut rest: Vec<Coord>) -> Result<Vec<Coord>> {
    let mut chain = vec![head];
    let mut tail = head;
    while !rest.is_empty() {
        let mut next = rest
            .iter()
            .enumerate()
            .filter(|(_, cell)| tail.manhattan_distance(**cell) == 1)
            .map(|(index, _)| index);
        let Some(index) = next.next() else {
            bail!(
                "body cell ({}, {}) is not connected to the player",
                rest[0].x(),
                rest[0].y()
            );
        };
        ensure!(
            next.next().is_none(),
            "player body forks at ({}, {})",
            tail.x(),
            tail.y()
        );
        tail = rest.swap_remove(index);
        chain.push(tail);
    }
    Ok(chain)
}
