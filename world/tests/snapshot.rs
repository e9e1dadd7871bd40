use cellshift_core::{
    BlockKind, Channel, Color, ColorPattern, Command, Coord, Direction, Event, Grant, Layer,
    LevelData, LevelError, PlayerRecord, PuzzleCategory, RoomSave, Snapshot, SnapshotError,
};
use cellshift_world::{self as world, query, World, WorldConfig};

fn load_room(
    world: &mut World,
    level: LevelData,
    save: Option<RoomSave>,
    player: Option<PlayerRecord>,
) -> Vec<Event> {
    apply(
        world,
        Command::LoadRoom {
            level,
            save,
            player,
        },
    )
}

fn load(level: LevelData) -> World {
    let mut world = World::new();
    let events = load_room(&mut world, level, None, None);
    assert!(
        matches!(events.as_slice(), [Event::RoomLoaded { .. }]),
        "unexpected load events: {events:?}"
    );
    world
}

fn apply(world: &mut World, command: Command) -> Vec<Event> {
    let mut events = Vec::new();
    world::apply(world, command, &mut events);
    events
}

fn restore(world: &mut World, snapshot: &Snapshot) -> Vec<Event> {
    apply(
        world,
        Command::RestoreSnapshot {
            snapshot: snapshot.clone(),
        },
    )
}

fn step(world: &mut World, direction: Direction) -> Vec<Event> {
    apply(world, Command::MovePlayer { direction })
}

fn block_at(world: &World, coord: Coord) -> Option<BlockKind> {
    query::occupant(world, coord, Layer::Block)
        .expect("cell within bounds")
        .and_then(|id| query::entity(world, id))
        .map(|entity| entity.record().kind())
}

fn body(world: &World) -> Vec<Coord> {
    query::player(world)
        .segments()
        .iter()
        .map(|id| query::entity(world, *id).expect("segment").coord())
        .collect()
}

/// Copies a snapshot, moving one rock diff to another cell.
fn with_rock_moved(snapshot: &Snapshot, index: usize, coord: Coord) -> Snapshot {
    let categories = PuzzleCategory::ALL
        .iter()
        .map(|category| {
            let mut diffs = snapshot.category(*category).to_vec();
            if *category == PuzzleCategory::Rock {
                diffs[index].coord = coord;
            }
            (*category, diffs)
        })
        .collect();
    Snapshot::new(categories, *snapshot.player(), snapshot.force())
}

fn shelf() -> LevelData {
    LevelData::new("shelf", 7, 4)
        .with_floor(1, 0, 6)
        .with_player(&[Coord::new(1, 2), Coord::new(0, 2)])
}

#[test]
fn restoring_a_capture_puts_every_block_back() {
    let mut world = load(shelf().with(BlockKind::Rock, Coord::new(2, 2)));
    let before = query::snapshot(&world);

    let _ = step(&mut world, Direction::Right);
    assert_eq!(block_at(&world, Coord::new(3, 2)), Some(BlockKind::Rock));

    let events = restore(&mut world, &before);

    assert_eq!(events, vec![Event::SnapshotRestored]);
    assert_eq!(query::snapshot(&world), before);
    assert_eq!(block_at(&world, Coord::new(2, 2)), Some(BlockKind::Rock));
    assert_eq!(block_at(&world, Coord::new(3, 2)), None);
    assert_eq!(body(&world), vec![Coord::new(1, 2), Coord::new(0, 2)]);
}

#[test]
fn snapshot_from_another_room_is_rejected_without_changes() {
    let foreign = query::snapshot(&load(
        shelf()
            .with(BlockKind::Rock, Coord::new(2, 2))
            .with(BlockKind::Rock, Coord::new(4, 2)),
    ));
    let mut world = load(shelf().with(BlockKind::Rock, Coord::new(2, 2)));
    let before = query::snapshot(&world);

    let events = restore(&mut world, &foreign);

    assert_eq!(
        events,
        vec![Event::SnapshotRejected {
            reason: SnapshotError::ShapeMismatch {
                category: PuzzleCategory::Rock,
                expected: 1,
                found: 2,
            },
        }]
    );
    assert_eq!(query::snapshot(&world), before);
}

#[test]
fn restores_that_leave_the_room_or_overlap_are_rejected() {
    let mut world = load(
        shelf()
            .with(BlockKind::Rock, Coord::new(2, 2))
            .with(BlockKind::Rock, Coord::new(4, 2)),
    );
    let before = query::snapshot(&world);

    let outside = with_rock_moved(&before, 0, Coord::new(40, 2));
    assert_eq!(
        restore(&mut world, &outside),
        vec![Event::SnapshotRejected {
            reason: SnapshotError::OutOfBounds {
                coord: Coord::new(40, 2),
            },
        }]
    );

    let stacked = with_rock_moved(&before, 0, Coord::new(4, 2));
    assert_eq!(
        restore(&mut world, &stacked),
        vec![Event::SnapshotRejected {
            reason: SnapshotError::Overlap {
                coord: Coord::new(4, 2),
            },
        }]
    );
    assert_eq!(query::snapshot(&world), before);
}

#[test]
fn body_length_follows_the_restored_snapshot() {
    let mut world = load(shelf().with(
        BlockKind::Collectable {
            grant: Grant::Segment,
        },
        Coord::new(2, 2),
    ));
    let short = query::snapshot(&world);

    let _ = step(&mut world, Direction::Right);
    assert_eq!(query::player(&world).length(), 3);
    let long = query::snapshot(&world);

    let _ = restore(&mut world, &short);
    assert_eq!(query::snapshot(&world), short);
    assert_eq!(body(&world), vec![Coord::new(1, 2), Coord::new(0, 2)]);
    let group = query::player(&world).group();
    assert_eq!(query::group_members(&world, group).len(), 2);
    assert_eq!(
        query::occupant(&world, Coord::new(0, 2), Layer::Player),
        Ok(Some(query::player(&world).segments()[1]))
    );

    let _ = restore(&mut world, &long);
    assert_eq!(query::snapshot(&world), long);
    assert_eq!(
        body(&world),
        vec![Coord::new(2, 2), Coord::new(1, 2), Coord::new(0, 2)]
    );

    let _ = restore(&mut world, &short);
    let events = step(&mut world, Direction::Right);
    assert!(events.contains(&Event::PlayerGrew { length: 3 }));
}

#[test]
fn grown_body_survives_a_save_and_reload() {
    let level = shelf().with(
        BlockKind::Collectable {
            grant: Grant::Segment,
        },
        Coord::new(2, 2),
    );
    let mut world = load(level.clone());
    let _ = step(&mut world, Direction::Right);
    let save = query::room_save(&world);
    let record = query::player_record(&world);
    assert_eq!(record.length, 3);

    let mut revisit = World::new();
    let events = load_room(&mut revisit, level, Some(save), Some(record));

    assert!(matches!(events.as_slice(), [Event::RoomLoaded { .. }]));
    assert_eq!(query::player(&revisit).length(), 3);
    assert_eq!(
        body(&revisit),
        vec![Coord::new(1, 2), Coord::new(0, 2), Coord::new(0, 3)]
    );
    assert_eq!(query::player_record(&revisit).length, 3);
    let group = query::player(&revisit).group();
    assert_eq!(query::group_members(&revisit, group).len(), 3);
}

#[test]
fn restoring_mid_cascade_cancels_it() {
    let config = WorldConfig {
        ticks_per_cell: 4,
        ..WorldConfig::default()
    };
    let mut world = World::with_config(config);
    let _ = load_room(
        &mut world,
        LevelData::new("pit", 6, 6)
            .with_floor(0, 0, 5)
            .with(BlockKind::Ground, Coord::new(0, 3))
            .with(BlockKind::Ground, Coord::new(1, 3))
            .with(BlockKind::Ground, Coord::new(4, 3))
            .with(BlockKind::Rock, Coord::new(2, 4))
            .with(BlockKind::Ground, Coord::new(2, 3))
            .with_player(&[Coord::new(1, 4), Coord::new(0, 4)]),
        None,
        None,
    );
    let before = query::snapshot(&world);

    let _ = step(&mut world, Direction::Right);
    assert!(!query::is_idle(&world));

    let events = restore(&mut world, &before);

    assert_eq!(events, vec![Event::SnapshotRestored]);
    assert!(query::is_idle(&world));
    assert_eq!(block_at(&world, Coord::new(2, 4)), Some(BlockKind::Rock));
    assert!(query::entity(
        &world,
        query::player(&world).head().expect("head")
    )
    .is_some_and(|head| head.moving().is_none()));
}

fn circuit() -> LevelData {
    LevelData::new("circuit", 8, 4)
        .with_floor(0, 0, 7)
        .with_player(&[Coord::new(1, 1), Coord::new(0, 1)])
        .with(BlockKind::Crystal { color: Color::Red }, Coord::new(2, 1))
        .with(BlockKind::Button { color: Color::Red }, Coord::new(3, 1))
        .with(
            BlockKind::Panel {
                channel: Channel::new(0),
                pattern: ColorPattern::new([1, 0, 0]),
            },
            Coord::new(7, 3),
        )
        .with(
            BlockKind::Gate {
                channel: Some(Channel::new(0)),
                tunnel: Some(2),
            },
            Coord::new(6, 1),
        )
}

#[test]
fn unlocked_tunnels_survive_restores_and_reloads() {
    let mut world = load(circuit());
    let fresh = query::snapshot(&world);

    let _ = step(&mut world, Direction::Right);
    assert_eq!(query::unlocked_tunnels(&world), &[false, false, true]);

    let _ = restore(&mut world, &fresh);
    assert_eq!(query::unlocked_tunnels(&world), &[false, false, true]);

    let record = query::player_record(&world);
    assert_eq!(record.unlocked_tunnels, vec![false, false, true]);
    let events = load_room(&mut world, circuit(), None, Some(record));
    assert!(matches!(events.as_slice(), [Event::RoomLoaded { .. }]));
    assert_eq!(query::unlocked_tunnels(&world), &[false, false, true]);
}

#[test]
fn room_save_overlays_a_later_visit() {
    let level = shelf().with(BlockKind::Rock, Coord::new(2, 2));
    let mut world = load(level.clone());
    let _ = step(&mut world, Direction::Right);
    let save = query::room_save(&world);
    assert_eq!(save.room, "shelf");

    let mut revisit = World::new();
    let events = load_room(&mut revisit, level, Some(save.clone()), None);

    assert!(matches!(events.as_slice(), [Event::RoomLoaded { .. }]));
    assert_eq!(block_at(&revisit, Coord::new(3, 2)), Some(BlockKind::Rock));
    assert_eq!(block_at(&revisit, Coord::new(2, 2)), None);
    assert_eq!(body(&revisit), vec![Coord::new(1, 2), Coord::new(0, 2)]);

    let events = load_room(&mut revisit, shelf(), Some(save), None);
    assert_eq!(
        events,
        vec![Event::RoomLoadRejected {
            reason: LevelError::SaveMismatch { index: 7 },
        }]
    );
    assert_eq!(block_at(&revisit, Coord::new(3, 2)), Some(BlockKind::Rock));
}
