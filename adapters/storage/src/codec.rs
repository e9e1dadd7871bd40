//! Versioned binary envelope around bincode payloads.
//!
//! | bytes    | content                                        |
//! |----------|------------------------------------------------|
//! | `0..4`   | magic `CSAV`                                   |
//! | `4..6`   | schema version, little endian                  |
//! | `6`      | payload kind                                   |
//! | `7..15`  | first eight bytes of the payload's SHA-256     |
//! | `15..`   | bincode payload                                |

use cellshift_core::{PlayerRecord, RoomSave};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};

use crate::StorageError;

/// Magic bytes opening every save.
pub const MAGIC: [u8; 4] = *b"CSAV";
/// Schema version written by this build.
pub const SCHEMA_VERSION: u16 = 2;

const CHECKSUM_LEN: usize = 8;
const HEADER_LEN: usize = MAGIC.len() + 2 + 1 + CHECKSUM_LEN;

/// Kind of value stored in a save.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadKind {
    /// A [`RoomSave`].
    Room,
    /// A [`PlayerRecord`].
    Player,
}

impl PayloadKind {
    const fn tag(self) -> u8 {
        match self {
            Self::Room => 1,
            Self::Player => 2,
        }
    }
}

/// Wraps a serialised value in the save envelope.
pub fn encode<T: Serialize>(kind: PayloadKind, value: &T) -> Result<Vec<u8>, StorageError> {
    let payload = bincode::serialize(value)?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());
    bytes.push(kind.tag());
    bytes.extend_from_slice(&checksum(&payload));
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Validates the envelope and deserialises its payload.
pub fn decode<T: DeserializeOwned>(kind: PayloadKind, bytes: &[u8]) -> Result<T, StorageError> {
    if bytes.get(..MAGIC.len()) != Some(&MAGIC[..]) {
        return Err(StorageError::BadMagic);
    }
    if bytes.len() < HEADER_LEN {
        return Err(StorageError::Truncated);
    }
    let (header, payload) = bytes.split_at(HEADER_LEN);

    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != SCHEMA_VERSION {
        return Err(StorageError::UnsupportedVersion { found: version });
    }
    if header[6] != kind.tag() {
        return Err(StorageError::WrongKind {
            expected: kind,
            found: header[6],
        });
    }
    if header[7..] != checksum(payload) {
        return Err(StorageError::ChecksumMismatch);
    }
    Ok(bincode::deserialize(payload)?)
}

fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = Sha256::digest(payload);
    let mut prefix = [0u8; CHECKSUM_LEN];
    prefix.copy_from_slice(&digest[..CHECKSUM_LEN]);
    prefix
}

/// Encodes a room save.
pub fn encode_room(save: &RoomSave) -> Result<Vec<u8>, StorageError> {
    encode(PayloadKind::Room, save)
}

/// Decodes a room save.
pub fn decode_room(bytes: &[u8]) -> Result<RoomSave, StorageError> {
    decode(PayloadKind::Room, bytes)
}

/// Encodes a player record.
pub fn encode_player(record: &PlayerRecord) -> Result<Vec<u8>, StorageError> {
    encode(PayloadKind::Player, record)
}

/// Decodes a player record.
pub fn decode_player(bytes: &[u8]) -> Result<PlayerRecord, StorageError> {
    decode(PayloadKind::Player, bytes)
}

#[cfg(test)]
mod tests {
    use cellshift_core::{Ability, Activation, BlockKind, Coord, Direction, EntityRecord};

    use super::*;

    fn room() -> RoomSave {
        RoomSave {
            room: "quarry".to_owned(),
            records: vec![EntityRecord {
                kind: BlockKind::Rock,
                origin: Coord::new(2, 3),
                coord: Coord::new(4, 1),
                facing: Direction::Up,
                activation: Activation::Off,
                powered: false,
                destroyed: false,
            }],
        }
    }

    #[test]
    fn envelope_carries_header_and_payload() {
        let bytes = encode_room(&room()).expect("encode");
        assert_eq!(&bytes[..4], b"CSAV");
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), SCHEMA_VERSION);
        assert_eq!(decode_room(&bytes).expect("decode"), room());
    }

    #[test]
    fn flipped_payload_byte_fails_the_checksum() {
        let mut bytes = encode_room(&room()).expect("encode");
        let last = bytes.len() - 1;
        bytes[last] ^= 0x40;
        assert!(matches!(
            decode_room(&bytes),
            Err(StorageError::ChecksumMismatch)
        ));
    }

    #[test]
    fn player_record_is_not_a_room() {
        let mut record = PlayerRecord::default();
        let _ = record.abilities.insert(Ability::Dig);
        let bytes = encode_player(&record).expect("encode");
        assert_eq!(decode_player(&bytes).expect("decode"), record);
        assert!(matches!(
            decode_room(&bytes),
            Err(StorageError::WrongKind {
                expected: PayloadKind::Room,
                found: 2,
            })
        ));
    }

    #[test]
    fn foreign_and_short_data_is_rejected() {
        assert!(matches!(decode_room(b"PNG\x89"), Err(StorageError::BadMagic)));
        assert!(matches!(decode_room(b"CS"), Err(StorageError::BadMagic)));
        assert!(matches!(
            decode_room(b"CSAV\x01\x00"),
            Err(StorageError::Truncated)
        ));

        let mut future = encode_room(&room()).expect("encode");
        future[4] = 9;
        assert!(matches!(
            decode_room(&future),
            Err(StorageError::UnsupportedVersion { found: 9 })
        ));
    }
}
