use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use cellshift_core::{PlayerRecord, RoomSave};
use tracing::debug;

use crate::{codec, StorageError};

/// Index of a save slot.
pub type Slot = u8;

const EXTENSION: &str = "csav";

/// Keeps room saves and player records per save slot.
pub trait SaveStore {
    /// Loads the stored state of `room`, if it was ever saved in `slot`.
    fn load_room(&self, slot: Slot, room: &str) -> Result<Option<RoomSave>, StorageError>;

    /// Stores the state of the room named by `save.room`.
    fn save_room(&mut self, slot: Slot, save: &RoomSave) -> Result<(), StorageError>;

    /// Loads the player record of `slot`.
    fn load_player(&self, slot: Slot) -> Result<Option<PlayerRecord>, StorageError>;

    /// Stores the player record of `slot`.
    fn save_player(&mut self, slot: Slot, record: &PlayerRecord) -> Result<(), StorageError>;

    /// Removes everything stored in `slot`.
    fn clear_slot(&mut self, slot: Slot) -> Result<(), StorageError>;
}

/// Store keeping encoded saves in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    rooms: BTreeMap<(Slot, String), Vec<u8>>,
    players: BTreeMap<Slot, Vec<u8>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SaveStore for MemoryStore {
    fn load_room(&self, slot: Slot, room: &str) -> Result<Option<RoomSave>, StorageError> {
        self.rooms
            .get(&(slot, room.to_owned()))
            .map(|bytes| codec::decode_room(bytes))
            .transpose()
    }

    fn save_room(&mut self, slot: Slot, save: &RoomSave) -> Result<(), StorageError> {
        let bytes = codec::encode_room(save)?;
        let _ = self.rooms.insert((slot, save.room.clone()), bytes);
        Ok(())
    }

    fn load_player(&self, slot: Slot) -> Result<Option<PlayerRecord>, StorageError> {
        self.players
            .get(&slot)
            .map(|bytes| codec::decode_player(bytes))
            .transpose()
    }

    fn save_player(&mut self, slot: Slot, record: &PlayerRecord) -> Result<(), StorageError> {
        let bytes = codec::encode_player(record)?;
        let _ = self.players.insert(slot, bytes);
        Ok(())
    }

    fn clear_slot(&mut self, slot: Slot) -> Result<(), StorageError> {
        self.rooms.retain(|(stored, _), _| *stored != slot);
        let _ = self.players.remove(&slot);
        Ok(())
    }
}

/// Store writing one file per save below a root directory.
///
/// Slot `n` lives in `slot-n/`, holding `player.csav` and one
/// `rooms/<room>.csav` per saved room. Files are replaced atomically by
/// writing a sibling temporary file first.
#[derive(Clone, Debug)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Creates a store rooted at `root`. Directories are created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory the store writes below.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn slot_dir(&self, slot: Slot) -> PathBuf {
        self.root.join(format!("slot-{slot}"))
    }

    fn room_path(&self, slot: Slot, room: &str) -> Result<PathBuf, StorageError> {
        validate_room_name(room)?;
        Ok(self
            .slot_dir(slot)
            .join("rooms")
            .join(format!("{room}.{EXTENSION}")))
    }

    fn player_path(&self, slot: Slot) -> PathBuf {
        self.slot_dir(slot).join(format!("player.{EXTENSION}"))
    }
}

impl SaveStore for DirectoryStore {
    fn load_room(&self, slot: Slot, room: &str) -> Result<Option<RoomSave>, StorageError> {
        let path = self.room_path(slot, room)?;
        read_optional(&path)?
            .map(|bytes| codec::decode_room(&bytes))
            .transpose()
    }

    fn save_room(&mut self, slot: Slot, save: &RoomSave) -> Result<(), StorageError> {
        let path = self.room_path(slot, &save.room)?;
        write_atomic(&path, &codec::encode_room(save)?)
    }

    fn load_player(&self, slot: Slot) -> Result<Option<PlayerRecord>, StorageError> {
        read_optional(&self.player_path(slot))?
            .map(|bytes| codec::decode_player(&bytes))
            .transpose()
    }

    fn save_player(&mut self, slot: Slot, record: &PlayerRecord) -> Result<(), StorageError> {
        write_atomic(&self.player_path(slot), &codec::encode_player(record)?)
    }

    fn clear_slot(&mut self, slot: Slot) -> Result<(), StorageError> {
        let dir = self.slot_dir(slot);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                debug!(path = %dir.display(), "slot cleared");
                Ok(())
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path: dir, source }),
        }
    }
}

fn validate_room_name(room: &str) -> Result<(), StorageError> {
    let valid = !room.is_empty()
        && room
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidRoomName {
            name: room.to_owned(),
        })
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
    match fs::read(path) {
        Ok(bytes) => {
            debug!(path = %path.display(), len = bytes.len(), "save read");
            Ok(Some(bytes))
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StorageError::Io {
            path: path.to_owned(),
            source,
        }),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let io_error = |path: &Path| {
        let path = path.to_owned();
        move |source| StorageError::Io { path, source }
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let staging = path.with_extension("tmp");
    fs::write(&staging, bytes).map_err(io_error(&staging))?;
    fs::rename(&staging, path).map_err(io_error(path))?;
    debug!(path = %path.display(), len = bytes.len(), "save written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_names_must_be_plain_file_names() {
        assert!(validate_room_name("east-wing_2").is_ok());
        for name in ["", "../escape", "a/b", "spa ce", "dot.ted"] {
            assert!(
                matches!(
                    validate_room_name(name),
                    Err(StorageError::InvalidRoomName { .. })
                ),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn memory_slots_are_independent() {
        let mut store = MemoryStore::new();
        let record = PlayerRecord {
            length: 4,
            ..PlayerRecord::default()
        };
        store.save_player(1, &record).expect("save");
        store
            .save_room(
                1,
                &RoomSave {
                    room: "hall".to_owned(),
                    records: Vec::new(),
                },
            )
            .expect("save");

        assert_eq!(store.load_player(1).expect("load"), Some(record));
        assert_eq!(store.load_player(2).expect("load"), None);
        store.clear_slot(1).expect("clear");
        assert_eq!(store.load_player(1).expect("load"), None);
        assert_eq!(store.load_room(1, "hall").expect("load"), None);
    }
}
