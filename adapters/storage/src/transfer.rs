//! Single-line text form of a save for clipboard transfer.
//!
//! An export is the prefix `cellshift:v1:` followed by the binary envelope
//! from [`crate::codec`] in unpadded standard base64.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use cellshift_core::{PlayerRecord, RoomSave};

use crate::{codec, StorageError};

/// Prefix every text export starts with.
pub const PREFIX: &str = "cellshift:v1:";

fn wrap(bytes: &[u8]) -> String {
    format!("{PREFIX}{}", STANDARD_NO_PAD.encode(bytes))
}

fn unwrap_text(text: &str) -> Result<Vec<u8>, StorageError> {
    let body = text
        .trim()
        .strip_prefix(PREFIX)
        .ok_or(StorageError::InvalidPrefix { expected: PREFIX })?;
    Ok(STANDARD_NO_PAD.decode(body.as_bytes())?)
}

/// Exports a room save as a single line of text.
pub fn export_room(save: &RoomSave) -> Result<String, StorageError> {
    Ok(wrap(&codec::encode_room(save)?))
}

/// Imports a room save from its text export.
pub fn import_room(text: &str) -> Result<RoomSave, StorageError> {
    codec::decode_room(&unwrap_text(text)?)
}

/// Exports a player record as a single line of text.
pub fn export_player(record: &PlayerRecord) -> Result<String, StorageError> {
    Ok(wrap(&codec::encode_player(record)?))
}

/// Imports a player record from its text export.
pub fn import_player(text: &str) -> Result<PlayerRecord, StorageError> {
    codec::decode_player(&unwrap_text(text)?)
}

#[cfg(test)]
mod tests {
    use cellshift_core::{Ability, Color};

    use super::*;

    fn record() -> PlayerRecord {
        let mut record = PlayerRecord {
            length: 3,
            room: "atrium".to_owned(),
            unlocked_tunnels: vec![false, true],
            ..PlayerRecord::default()
        };
        let _ = record.abilities.insert(Ability::Hover);
        let _ = record.colors.insert(Color::Blue);
        record
    }

    #[test]
    fn export_is_one_prefixed_line() {
        let text = export_player(&record()).expect("export");
        assert!(text.starts_with("cellshift:v1:"));
        assert!(!text.contains('\n'));
        assert!(!text.ends_with('='));
    }

    #[test]
    fn surrounding_whitespace_is_ignored_on_import() {
        let text = export_player(&record()).expect("export");
        let pasted = format!("  {text}\n");
        assert_eq!(import_player(&pasted).expect("import"), record());
    }

    #[test]
    fn foreign_text_is_rejected() {
        assert!(matches!(
            import_player("puzzle:v1:AAAA"),
            Err(StorageError::InvalidPrefix { .. })
        ));
        assert!(matches!(
            import_player("cellshift:v1:***"),
            Err(StorageError::InvalidBase64(_))
        ));
    }

    #[test]
    fn player_export_does_not_import_as_a_room() {
        let text = export_player(&record()).expect("export");
        assert!(matches!(
            import_room(&text),
            Err(StorageError::WrongKind { .. })
        ));
    }
}
