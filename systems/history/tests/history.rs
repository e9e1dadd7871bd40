use cellshift_core::{
    Ability, Activation, BlockKind, Color, Command, Coord, Direction, EntityId, Event, Grant,
    Layer, LevelData, PlayerRecord,
};
use cellshift_system_history::{History, HistoryConfig, HistoryError};
use cellshift_world::{self as world, query, World};

/// World and history driven together the way an adapter does.
struct Session {
    world: World,
    history: History,
}

impl Session {
    fn enter(level: LevelData, record: Option<PlayerRecord>) -> Self {
        let mut world = World::new();
        let mut events = Vec::new();
        world::apply(
            &mut world,
            Command::LoadRoom {
                level,
                save: None,
                player: record,
            },
            &mut events,
        );
        assert!(
            matches!(events.as_slice(), [Event::RoomLoaded { .. }]),
            "unexpected load events: {events:?}"
        );
        let mut history = History::new(HistoryConfig::default());
        history.enter_room(query::snapshot(&world));
        Self { world, history }
    }

    fn act(&mut self, command: Command) -> Vec<Event> {
        self.history
            .record(query::snapshot(&self.world))
            .expect("room entered");
        let mut events = Vec::new();
        world::apply(&mut self.world, command, &mut events);
        self.history.handle(&events);
        events
    }

    fn undo(&mut self) -> Result<Vec<Event>, HistoryError> {
        let snapshot = self.history.undo(&query::snapshot(&self.world))?;
        Ok(self.restore(snapshot))
    }

    fn reset(&mut self) -> Vec<Event> {
        let snapshot = self
            .history
            .reset(&query::snapshot(&self.world))
            .expect("room entered");
        self.restore(snapshot)
    }

    fn restore(&mut self, snapshot: cellshift_core::Snapshot) -> Vec<Event> {
        let mut events = Vec::new();
        world::apply(
            &mut self.world,
            Command::RestoreSnapshot { snapshot },
            &mut events,
        );
        events
    }

    fn head(&self) -> Coord {
        let head = query::player(&self.world).head().expect("head");
        query::entity(&self.world, head).expect("segment").coord()
    }

    fn state(&self, id: EntityId) -> Activation {
        query::entity(&self.world, id).expect("entity").activation()
    }
}

fn timekeeper() -> Option<PlayerRecord> {
    let mut record = PlayerRecord::default();
    let _ = record.abilities.insert(Ability::Time);
    Some(record)
}

fn step(direction: Direction) -> Command {
    Command::MovePlayer { direction }
}

fn corridor() -> LevelData {
    LevelData::new("corridor", 6, 3)
        .with_floor(0, 0, 5)
        .with(BlockKind::Rock, Coord::new(3, 1))
        .with_player(&[Coord::new(1, 1), Coord::new(0, 1)])
}

#[test]
fn undo_returns_to_the_state_recorded_before_the_action() {
    let mut session = Session::enter(corridor(), timekeeper());
    let _ = session.act(step(Direction::Right));
    let before = query::snapshot(&session.world);

    let _ = session.act(step(Direction::Right));
    assert_ne!(query::snapshot(&session.world), before);

    let events = session.undo().expect("undo");
    assert_eq!(events, vec![Event::SnapshotRestored]);
    assert_eq!(query::snapshot(&session.world), before);
}

#[test]
fn bumping_walls_twice_undoes_in_one_step() {
    let mut session = Session::enter(corridor(), timekeeper());
    let entry = query::snapshot(&session.world);
    let _ = session.act(step(Direction::Right));
    let moved = query::snapshot(&session.world);

    let first = session.act(step(Direction::Down));
    let second = session.act(step(Direction::Down));
    assert!(matches!(first.as_slice(), [Event::MoveBlocked { .. }]));
    assert!(matches!(second.as_slice(), [Event::MoveBlocked { .. }]));
    assert_eq!(query::snapshot(&session.world), moved);

    let _ = session.undo().expect("undo");
    assert_eq!(query::snapshot(&session.world), entry);
    assert_eq!(session.history.depth(), 1);
}

#[test]
fn undo_stops_at_the_room_floor() {
    let mut session = Session::enter(corridor(), timekeeper());
    let entry = query::snapshot(&session.world);
    let _ = session.act(step(Direction::Right));

    for _ in 0..4 {
        let _ = session.undo().expect("undo");
        assert_eq!(query::snapshot(&session.world), entry);
    }
    assert_eq!(session.history.depth(), 1);
}

#[test]
fn undo_is_locked_without_the_time_ability() {
    let mut session = Session::enter(corridor(), None);
    let _ = session.act(step(Direction::Right));

    assert_eq!(session.undo(), Err(HistoryError::Locked));
    let _ = session.reset();
    assert_eq!(session.head(), Coord::new(1, 1));
}

#[test]
fn unlocked_abilities_survive_undo() {
    let mut session = Session::enter(
        LevelData::new("shrine", 6, 3)
            .with_floor(0, 0, 5)
            .with(
                BlockKind::Collectable {
                    grant: Grant::Ability(Ability::Time),
                },
                Coord::new(2, 1),
            )
            .with_player(&[Coord::new(1, 1), Coord::new(0, 1)]),
        None,
    );
    let events = session.act(step(Direction::Right));
    assert!(events.contains(&Event::AbilityUnlocked {
        ability: Ability::Time
    }));
    let _ = session.act(step(Direction::Right));

    for _ in 0..3 {
        let _ = session.undo().expect("time ability unlocked");
        assert!(query::player(&session.world).has(Ability::Time));
    }
    assert_eq!(session.head(), Coord::new(1, 1));

    let _ = session.reset();
    assert!(query::player(&session.world).has(Ability::Time));
}

#[test]
fn reset_restores_the_buttons_seen_on_entry() {
    let mut session = Session::enter(
        LevelData::new("switchboard", 8, 3)
            .with_floor(0, 0, 7)
            .with(BlockKind::Button { color: Color::Red }, Coord::new(5, 1))
            .with(
                BlockKind::Button {
                    color: Color::Green,
                },
                Coord::new(3, 1),
            )
            .with(
                BlockKind::Crystal {
                    color: Color::Green,
                },
                Coord::new(3, 1),
            )
            .with(BlockKind::Button { color: Color::Blue }, Coord::new(7, 1))
            .with_player(&[Coord::new(1, 1), Coord::new(0, 1)]),
        timekeeper(),
    );
    let red = query::occupant(&session.world, Coord::new(5, 1), Layer::Misc)
        .expect("in bounds")
        .expect("red button");
    let green = query::occupant(&session.world, Coord::new(3, 1), Layer::Misc)
        .expect("in bounds")
        .expect("green button");
    let blue = query::occupant(&session.world, Coord::new(7, 1), Layer::Misc)
        .expect("in bounds")
        .expect("blue button");
    let entry = query::snapshot(&session.world);
    assert_eq!(session.state(green), Activation::On);

    let _ = session.act(Command::PowerButton {
        entity: red,
        powered: true,
    });
    let _ = session.act(Command::PowerButton {
        entity: blue,
        powered: true,
    });
    let _ = session.act(step(Direction::Right));
    let _ = session.act(step(Direction::Right));
    assert_eq!(session.state(red), Activation::Alt);
    assert_eq!(session.state(green), Activation::Off);
    assert_eq!(session.state(blue), Activation::Alt);

    let events = session.reset();

    assert_eq!(events, vec![Event::SnapshotRestored]);
    assert_eq!(query::snapshot(&session.world), entry);
    assert_eq!(session.state(red), Activation::Off);
    assert_eq!(session.state(green), Activation::On);
    assert_eq!(session.state(blue), Activation::Off);
    assert_eq!(query::color_tally(&session.world, Color::Green), 1);
    assert_eq!(query::color_tally(&session.world, Color::Red), 0);

    let _ = session.act(Command::PowerButton {
        entity: red,
        powered: true,
    });
    assert_eq!(session.state(red), Activation::Alt);
}
