//! Key-addressed blob storage the engine publishes archives into.

use std::fmt;
use std::io::Write;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod local;
pub mod locks;
pub mod memory;

pub use local::LocalBlobStore;
pub use locks::KeyLocks;
pub use memory::MemoryBlobStore;

/// Version token of a stored blob: hex BLAKE3 of its bytes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(String);

impl Generation {
    pub fn of(data: &[u8]) -> Self {
        Self::from_digest(blake3::hash(data).as_bytes())
    }

    pub fn from_digest(digest: &[u8; 32]) -> Self {
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Generation {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Precondition on a write.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PutCondition {
    #[default]
    Any,
    /// Fail if the key already holds a blob.
    IfAbsent,
    /// Fail unless the key currently holds this generation.
    IfMatch(Generation),
}

impl PutCondition {
    /// Check against the generation currently stored (None when absent).
    pub fn admits(&self, current: Option<&Generation>) -> bool {
        match self {
            PutCondition::Any => true,
            PutCondition::IfAbsent => current.is_none(),
            PutCondition::IfMatch(expected) => current == Some(expected),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no blob under key {0}")]
    NotFound(String),

    #[error("precondition failed for key {0}")]
    PreconditionFailed(String),

    #[error("unsafe storage key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub trait BlobStore: Send + Sync {
    /// Stream the blob under `key` into `sink`, returning its generation.
    fn get_to(&self, key: &str, sink: &mut dyn Write) -> StoreResult<Generation>;

    /// Store `data` under `key` (overwrite semantics, subject to `cond`).
    fn put(&self, key: &str, data: &[u8], cond: PutCondition) -> StoreResult<Generation>;

    /// Remove `key`. Removing an absent key succeeds.
    fn remove(&self, key: &str) -> StoreResult<()>;

    fn exists(&self, key: &str) -> StoreResult<bool>;

    fn get(&self, key: &str) -> StoreResult<(Vec<u8>, Generation)> {
        let mut buf = Vec::new();
        let generation = self.get_to(key, &mut buf)?;
        Ok((buf, generation))
    }
}
