//! Keyboard-driven play session over one room.
//!
//! Every key is one frame: its action runs first and a tick follows, so
//! paced cascades advance while keys keep coming in.
//!
//! | key | action |
//! |-----|--------|
//! | `w` `a` `s` `d` | step up, left, down, right |
//! | `h` | toggle hover |
//! | `z` | undo one step |
//! | `u` | hold undo; consecutive `u` keys repeat ever faster |
//! | `r` | reset the room |
//! | `.` | wait one frame |

use anyhow::{bail, Result};
use cellshift_core::{Command, Direction, Event, LevelData, PlayerRecord, RoomSave, Snapshot};
use cellshift_system_history::{HeldRepeat, History, HistoryError};
use cellshift_world::{self as world, query, World};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::CliConfig;

/// Frames [`Session::finish`] waits for the room to settle.
const SETTLE_LIMIT: u64 = 100_000;

/// Summary of a session, printed with `--json`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub(crate) struct Report {
    pub(crate) room: String,
    pub(crate) frames: u64,
    pub(crate) actions: u32,
    pub(crate) blocked: u32,
    pub(crate) refused: u32,
    pub(crate) undos: u32,
    pub(crate) locked_undos: u32,
    pub(crate) resets: u32,
    pub(crate) landings: u32,
    pub(crate) unlocked: Vec<String>,
    pub(crate) tunnels: Vec<u8>,
    pub(crate) body_length: usize,
}

/// World and history of the room being played.
#[derive(Debug)]
pub(crate) struct Session {
    world: World,
    history: History,
    undo_repeat: HeldRepeat,
    report: Report,
}

impl Session {
    /// Loads the room, overlaying the stored saves, and records its entry.
    pub(crate) fn enter(
        config: &CliConfig,
        level: LevelData,
        save: Option<RoomSave>,
        player: Option<PlayerRecord>,
    ) -> Result<Self> {
        let mut world = World::with_config(config.world);
        let mut events = Vec::new();
        world::apply(
            &mut world,
            Command::LoadRoom {
                level,
                save,
                player,
            },
            &mut events,
        );
        if let Some(Event::RoomLoadRejected { reason }) = events.first() {
            bail!("room could not be loaded: {reason}");
        }

        let mut history = History::new(config.history);
        history.enter_room(query::snapshot(&world));
        let report = Report {
            room: query::room_name(&world).to_owned(),
            ..Report::default()
        };
        info!(room = %report.room, "session started");
        Ok(Self {
            world,
            history,
            undo_repeat: HeldRepeat::new(config.history.repeat),
            report,
        })
    }

    pub(crate) fn world(&self) -> &World {
        &self.world
    }

    /// Plays every key of a script, skipping whitespace.
    pub(crate) fn run_script(&mut self, script: &str) -> Result<()> {
        for key in script.chars().filter(|key| !key.is_whitespace()) {
            self.press(key)?;
        }
        Ok(())
    }

    /// Plays one frame driven by `key`.
    pub(crate) fn press(&mut self, key: char) -> Result<()> {
        if !"wasdhzur.".contains(key) {
            bail!("unknown key `{key}`");
        }
        debug!(%key, "key");

        if self.undo_repeat.update(key == 'u') {
            self.undo()?;
        }
        match key {
            'w' => self.step(Direction::Up),
            'a' => self.step(Direction::Left),
            's' => self.step(Direction::Down),
            'd' => self.step(Direction::Right),
            'h' => {
                let enabled = !query::player(&self.world).hovering();
                self.act(Command::SetHover { enabled });
            }
            'z' => self.undo()?,
            'r' => self.reset()?,
            _ => {}
        }
        self.frame();
        Ok(())
    }

    /// Waits for the room to settle and returns the summary.
    pub(crate) fn finish(&mut self) -> Result<&Report> {
        let mut waited = 0;
        while !query::is_idle(&self.world) {
            if waited >= SETTLE_LIMIT {
                bail!("room did not settle within {SETTLE_LIMIT} frames");
            }
            self.frame();
            waited += 1;
        }
        let player = query::player(&self.world);
        self.report.body_length = player.length();
        self.report.unlocked = player
            .unlocked()
            .iter()
            .map(|ability| format!("{ability:?}"))
            .collect();
        Ok(&self.report)
    }

    fn step(&mut self, direction: Direction) {
        self.act(Command::MovePlayer { direction });
    }

    /// Records the live state, then applies a player action. Refused
    /// actions drop their recording again.
    fn act(&mut self, command: Command) {
        if let Err(error) = self.history.record(query::snapshot(&self.world)) {
            warn!(%error, "action not recorded");
        }
        let events = self.apply(command);
        if events
            .iter()
            .any(|event| matches!(event, Event::ActionRefused { .. }))
        {
            let _ = self.history.discard_latest();
            self.report.refused += 1;
            return;
        }
        self.report.actions += 1;
        if events
            .iter()
            .any(|event| matches!(event, Event::MoveBlocked { .. }))
        {
            self.report.blocked += 1;
        }
        self.history.handle(&events);
    }

    fn undo(&mut self) -> Result<()> {
        match self.history.undo(&query::snapshot(&self.world)) {
            Ok(snapshot) => {
                self.restore(snapshot)?;
                self.report.undos += 1;
            }
            Err(HistoryError::Locked) => {
                warn!("undo is locked");
                self.report.locked_undos += 1;
            }
            Err(error) => return Err(error.into()),
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        let baseline = self.history.reset(&query::snapshot(&self.world))?;
        self.restore(baseline)?;
        self.report.resets += 1;
        Ok(())
    }

    fn restore(&mut self, snapshot: Snapshot) -> Result<()> {
        let events = self.apply(Command::RestoreSnapshot { snapshot });
        if let Some(Event::SnapshotRejected { reason }) = events.first() {
            bail!("history snapshot was rejected: {reason}");
        }
        Ok(())
    }

    fn frame(&mut self) {
        let events = self.apply(Command::Tick);
        self.history.handle(&events);
        self.report.frames += 1;
    }

    fn apply(&mut self, command: Command) -> Vec<Event> {
        let mut events = Vec::new();
        world::apply(&mut self.world, command, &mut events);
        for event in &events {
            match event {
                Event::GroupLanded { .. } => self.report.landings += 1,
                Event::TunnelUnlocked { tunnel } => self.report.tunnels.push(*tunnel),
                _ => {}
            }
        }
        events
    }
}
