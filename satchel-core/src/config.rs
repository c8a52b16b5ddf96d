//! Runtime configuration, loaded from JSON. Every field has a default, so
//! `{}` is a valid configuration (memory store, stock engine settings).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::archive::{EncodeOptions, EntryMeta};
use crate::codec::CodecId;
use crate::error::{Result, SatchelError};
use crate::policy::Policy;
use crate::store::{BlobStore, LocalBlobStore, MemoryBlobStore};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| SatchelError::Config(e.to_string()))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SatchelError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    Local {
        root: PathBuf,
    },
    #[default]
    Memory,
}

/// How the engine publishes an edited archive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Unconditional put; concurrent edits on one key may lose updates.
    #[default]
    Overwrite,
    /// Put only if the blob still has the generation that was fetched.
    IfUnchanged,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fetched blobs larger than this spill from memory to a temp file.
    pub spool_threshold: usize,
    pub zstd_level: i32,
    pub default_codec: CodecId,
    pub default_mode: u32,
    pub write_mode: WriteMode,
    /// Serialize same-key edits within this process.
    pub lock_keys: bool,
    pub policy: Policy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            spool_threshold: 8 << 20,
            zstd_level: 3,
            default_codec: CodecId::Zstd,
            default_mode: 0o100644,
            write_mode: WriteMode::Overwrite,
            lock_keys: false,
            policy: Policy::default(),
        }
    }
}

impl EngineConfig {
    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            zstd_level: self.zstd_level,
            policy: self.policy.clone(),
        }
    }

    /// Metadata for entries that did not exist before, stamped with `mtime`.
    pub fn default_meta(&self, mtime: i64) -> EntryMeta {
        EntryMeta {
            codec: self.default_codec,
            mode: self.default_mode,
            mtime,
        }
    }
}

/// Build the store a configuration names.
pub fn open_store(cfg: &StoreConfig) -> Result<Arc<dyn BlobStore>> {
    match cfg {
        StoreConfig::Local { root } => {
            let store = LocalBlobStore::open(root).map_err(|e| {
                SatchelError::Config(format!("store root {}: {e}", root.display()))
            })?;
            tracing::debug!(root = %store.root().display(), "opened local store");
            Ok(Arc::new(store))
        }
        StoreConfig::Memory => Ok(Arc::new(MemoryBlobStore::new())),
    }
}
