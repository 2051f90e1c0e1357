//! Content hashing for schema text and joint database states

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::StateError;

/// Hex-encoded SHA-256 digest of some text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash arbitrary text.
    pub fn of(text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// The reserved hash of the empty string. Stands for "table does not exist".
    pub fn empty() -> Self {
        Self::of("")
    }

    /// Parse a stored hash, rejecting anything that isn't 64 lowercase hex chars.
    pub fn parse(s: &str) -> Result<Self, StateError> {
        let valid = s.len() == 64
            && s
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(StateError::InvalidHash(s.to_string()))
        }
    }

    pub fn is_empty_schema(&self) -> bool {
        *self == Self::empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, for display.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = StateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

/// Per-table hashes of one database state, keyed by table name.
pub type TableHashes = BTreeMap<String, ContentHash>;

/// Digest identifying the whole database state.
///
/// Tables mapped to the empty hash are skipped, so an absent table and one
/// recorded as empty produce the same joint hash.
pub fn joint_hash(hashes: &TableHashes) -> ContentHash {
    let empty = ContentHash::empty();
    let parts: Vec<String> = hashes
        .iter()
        .filter(|(_, hash)| **hash != empty)
        .map(|(table, hash)| format!("{}={}", table, hash))
        .collect();
    ContentHash::of(&parts.join("&"))
}
