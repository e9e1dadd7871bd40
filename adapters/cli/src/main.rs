#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter for playing and checking Cellshift rooms.

mod config;
mod level_file;
mod render;
mod session;

use std::{
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{bail, Context, Result};
use cellshift_core::{Command as WorldCommand, Event};
use cellshift_storage::{transfer, DirectoryStore, SaveStore, Slot, StorageError};
use cellshift_world::{self as world, query, World};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::{config::CliConfig, session::Session};

#[derive(Debug, Parser)]
#[command(name = "cellshift", about = "Grid puzzle rooms in the terminal", version)]
struct Cli {
    /// TOML file with world and history settings.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Play a room from keys given as a script or read line by line from stdin.
    Play {
        /// Level file to play.
        level: PathBuf,
        /// Keys to play instead of reading stdin.
        #[arg(short, long)]
        script: Option<String>,
        /// Directory holding save slots. Without it nothing is loaded or saved.
        #[arg(long)]
        saves: Option<PathBuf>,
        /// Save slot to use.
        #[arg(long, default_value_t = 0)]
        slot: Slot,
        /// Print the session summary as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Validate level files and print their boards.
    Check {
        /// Level files to validate.
        #[arg(required = true)]
        levels: Vec<PathBuf>,
    },
    /// Print a stored room save, or the player record, as one line of text.
    Export {
        /// Directory holding save slots.
        #[arg(long)]
        saves: PathBuf,
        /// Save slot to read.
        #[arg(long, default_value_t = 0)]
        slot: Slot,
        /// Room to export; the player record when omitted.
        #[arg(long)]
        room: Option<String>,
    },
    /// Store a text export in a save slot.
    Import {
        /// Directory holding save slots.
        #[arg(long)]
        saves: PathBuf,
        /// Save slot to write.
        #[arg(long, default_value_t = 0)]
        slot: Slot,
        /// Text produced by `export`.
        text: String,
    },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "command failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = CliConfig::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Play {
            level,
            script,
            saves,
            slot,
            json,
        } => play(&config, &level, script.as_deref(), saves, slot, json),
        Commands::Check { levels } => check(&config, &levels),
        Commands::Export { saves, slot, room } => export(saves, slot, room.as_deref()),
        Commands::Import { saves, slot, text } => import(saves, slot, &text),
    }
}

fn play(
    config: &CliConfig,
    level: &Path,
    script: Option<&str>,
    saves: Option<PathBuf>,
    slot: Slot,
    json: bool,
) -> Result<()> {
    let level = level_file::read(level)?;
    let mut store = saves.map(DirectoryStore::new);
    let (save, player) = match &store {
        Some(store) => (
            store
                .load_room(slot, level.name())
                .context("could not load the room save")?,
            store
                .load_player(slot)
                .context("could not load the player record")?,
        ),
        None => (None, None),
    };
    let mut session = Session::enter(config, level, save, player)?;

    match script {
        Some(script) => session.run_script(script)?,
        None => {
            let stdout = io::stdout();
            print!("{}", render::board(session.world()));
            stdout.lock().flush()?;
            for line in io::stdin().lock().lines() {
                session.run_script(&line?)?;
                print!("{}", render::board(session.world()));
                stdout.lock().flush()?;
            }
        }
    }
    let report = session.finish()?.clone();

    if let Some(store) = store.as_mut() {
        store.save_room(slot, &query::room_save(session.world()))?;
        store.save_player(slot, &query::player_record(session.world()))?;
        info!(slot, root = %store.root().display(), "progress saved");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render::board(session.world()));
    }
    Ok(())
}

fn check(config: &CliConfig, levels: &[PathBuf]) -> Result<()> {
    let mut failures = 0usize;
    for path in levels {
        match load_for_check(config, path) {
            Ok(world) => {
                let (width, height) = query::dimensions(&world);
                println!("ok {} ({width}x{height})", path.display());
                print!("{}", render::board(&world));
            }
            Err(err) => {
                failures += 1;
                println!("FAIL {}: {err:#}", path.display());
            }
        }
    }
    if failures > 0 {
        bail!("{failures} of {} levels failed", levels.len());
    }
    Ok(())
}

fn load_for_check(config: &CliConfig, path: &Path) -> Result<World> {
    let level = level_file::read(path)?;
    let mut world = World::with_config(config.world);
    let mut events = Vec::new();
    world::apply(
        &mut world,
        WorldCommand::LoadRoom {
            level,
            save: None,
            player: None,
        },
        &mut events,
    );
    if let Some(Event::RoomLoadRejected { reason }) = events.first() {
        bail!("{reason}");
    }
    Ok(world)
}

fn export(saves: PathBuf, slot: Slot, room: Option<&str>) -> Result<()> {
    let store = DirectoryStore::new(saves);
    let text = match room {
        Some(room) => {
            let Some(save) = store.load_room(slot, room)? else {
                bail!("slot {slot} has no save for room `{room}`");
            };
            transfer::export_room(&save)?
        }
        None => {
            let Some(record) = store.load_player(slot)? else {
                bail!("slot {slot} has no player record");
            };
            transfer::export_player(&record)?
        }
    };
    println!("{text}");
    Ok(())
}

fn import(saves: PathBuf, slot: Slot, text: &str) -> Result<()> {
    let mut store = DirectoryStore::new(saves);
    match transfer::import_room(text) {
        Ok(save) => {
            store.save_room(slot, &save)?;
            println!("imported room `{}` into slot {slot}", save.room);
        }
        Err(StorageError::WrongKind { .. }) => {
            let record = transfer::import_player(text)?;
            store.save_player(slot, &record)?;
            println!("imported player record into slot {slot}");
        }
        Err(err) => return Err(err).context("could not import text"),
    }
    Ok(())
}
