use cellshift_core::{
    Ability, BlockKind, Color, Command, Coord, Direction, Event, Grant, LevelData, PlayerRecord,
    Snapshot,
};
use cellshift_world::{self as world, query, World, WorldConfig};

#[test]
fn deterministic_replay_produces_identical_runs() {
    let first = replay(WorldConfig::default());
    let second = replay(WorldConfig::default());

    assert_eq!(first, second, "replay diverged between runs");
    assert!(first.events.iter().any(|event| matches!(event, Event::GroupLanded { .. })));
}

#[test]
fn paced_replay_reaches_the_same_room() {
    let instant = replay(WorldConfig::default());
    let paced = replay(WorldConfig {
        ticks_per_cell: 2,
        ..WorldConfig::default()
    });

    assert_eq!(instant.snapshot, paced.snapshot);
    assert_eq!(instant.record, paced.record);
}

#[derive(Debug, PartialEq)]
struct ReplayOutcome {
    snapshot: Snapshot,
    record: PlayerRecord,
    events: Vec<Event>,
}

fn replay(config: WorldConfig) -> ReplayOutcome {
    let mut world = World::with_config(config);
    let mut log = Vec::new();

    for command in scripted_commands() {
        world::apply(&mut world, command, &mut log);
        while !query::is_idle(&world) {
            world::apply(&mut world, Command::Tick, &mut log);
        }
    }
    log.retain(|event| !matches!(event, Event::TimeAdvanced { .. }));

    ReplayOutcome {
        snapshot: query::snapshot(&world),
        record: query::player_record(&world),
        events: log,
    }
}

fn level() -> LevelData {
    LevelData::new("replay", 9, 7)
        .with_floor(0, 0, 8)
        .with(BlockKind::Ground, Coord::new(0, 3))
        .with(BlockKind::Ground, Coord::new(1, 3))
        .with(BlockKind::Ground, Coord::new(2, 3))
        .with(BlockKind::Rock, Coord::new(3, 4))
        .with(BlockKind::Drift, Coord::new(6, 1))
        .with(BlockKind::Crystal { color: Color::Blue }, Coord::new(4, 5))
        .with(
            BlockKind::Collectable {
                grant: Grant::Ability(Ability::Hover),
            },
            Coord::new(3, 1),
        )
        .with_player(&[Coord::new(2, 4), Coord::new(1, 4)])
}

fn scripted_commands() -> Vec<Command> {
    let step = |direction| Command::MovePlayer { direction };
    vec![
        Command::LoadRoom {
            level: level(),
            save: None,
            player: None,
        },
        step(Direction::Right),
        step(Direction::Right),
        step(Direction::Down),
        Command::SetForceDirection {
            direction: Some(Direction::Left),
        },
        step(Direction::Right),
        Command::SetHover { enabled: true },
        step(Direction::Up),
        Command::SetForceDirection { direction: None },
        Command::SetHover { enabled: false },
        step(Direction::Left),
    ]
}
