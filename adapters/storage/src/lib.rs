#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Persistence of room saves and player records.
//!
//! Saves are written in a small versioned binary envelope (see [`codec`]),
//! kept per slot by a [`SaveStore`], and can be moved between machines as a
//! single line of text (see [`transfer`]).

pub mod codec;
mod store;
pub mod transfer;

use std::{io, path::PathBuf};

use thiserror::Error;

pub use codec::PayloadKind;
pub use store::{DirectoryStore, MemoryStore, SaveStore, Slot};

/// Errors raised while encoding, decoding or storing saves.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing a save file failed.
    #[error("could not access {}", .path.display())]
    Io {
        /// File that could not be accessed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The data does not start with the save magic.
    #[error("data is not a cellshift save")]
    BadMagic,
    /// The data is shorter than its header.
    #[error("save data is truncated")]
    Truncated,
    /// The save was written by an unknown schema version.
    #[error("save schema version {found} is not supported")]
    UnsupportedVersion {
        /// Version found in the header.
        found: u16,
    },
    /// The save holds another kind of payload.
    #[error("expected a {expected:?} save but found {found}")]
    WrongKind {
        /// Kind the caller asked for.
        expected: PayloadKind,
        /// Raw kind byte found in the header.
        found: u8,
    },
    /// The payload does not match its checksum.
    #[error("save payload is corrupt")]
    ChecksumMismatch,
    /// The payload could not be serialised or deserialised.
    #[error("save payload could not be encoded")]
    Encoding(#[from] bincode::Error),
    /// The text export lacks the expected prefix.
    #[error("text export must start with `{expected}`")]
    InvalidPrefix {
        /// Prefix every export starts with.
        expected: &'static str,
    },
    /// The text export's base64 body is malformed.
    #[error("text export is not valid base64")]
    InvalidBase64(#[from] base64::DecodeError),
    /// A room name cannot be used as a file name.
    #[error("room name `{name}` cannot be stored")]
    InvalidRoomName {
        /// Offending name.
        name: String,
    },
}
