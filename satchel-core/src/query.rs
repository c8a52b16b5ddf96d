//! Read-only views of stored archives.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::codec::CodecId;
use crate::error::{Result, SatchelError};
use crate::fetch::{Fetched, fetch_snapshot};
use crate::stats::ArchiveStats;
use crate::store::BlobStore;
use crate::util::sanitize::{check_store_key, safe_join};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInfo {
    pub path: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    pub mode: u32,
    pub mtime: i64,
    pub codec: CodecId,
}

pub struct QueryFacade {
    store: Arc<dyn BlobStore>,
    spool_threshold: usize,
}

impl QueryFacade {
    pub fn new(store: Arc<dyn BlobStore>, spool_threshold: usize) -> Self {
        Self {
            store,
            spool_threshold,
        }
    }

    fn fetch(&self, key: &str) -> Result<Fetched> {
        check_store_key(key).map_err(SatchelError::InvalidKey)?;
        fetch_snapshot(self.store.as_ref(), key, self.spool_threshold)
    }

    /// Entry paths starting with `prefix`, in archive order.
    pub fn list_entries(&self, key: &str, prefix: &str) -> Result<Vec<String>> {
        let fetched = self.fetch(key)?;
        Ok(fetched
            .snapshot
            .paths()
            .filter(|p| p.starts_with(prefix))
            .map(str::to_string)
            .collect())
    }

    pub fn list_detailed(&self, key: &str, prefix: &str) -> Result<Vec<EntryInfo>> {
        let fetched = self.fetch(key)?;
        Ok(fetched
            .snapshot
            .entries()
            .iter()
            .filter(|e| e.path.starts_with(prefix))
            .map(|e| EntryInfo {
                path: e.path.clone(),
                size: e.content.len() as u64,
                mode: e.meta.mode,
                mtime: e.meta.mtime,
                codec: e.meta.codec,
            })
            .collect())
    }

    /// Content of one entry. An existing empty entry yields an empty vector.
    pub fn read_entry(&self, key: &str, path: &str) -> Result<Vec<u8>> {
        let fetched = self.fetch(key)?;
        fetched
            .snapshot
            .into_entries()
            .into_iter()
            .find(|e| e.path == path)
            .map(|e| e.content)
            .ok_or_else(|| SatchelError::EntryNotFound {
                path: path.to_string(),
            })
    }

    pub fn stat(&self, key: &str) -> Result<ArchiveStats> {
        Ok(ArchiveStats::of(&self.fetch(key)?))
    }

    /// Write every entry below `dest`, restoring permission bits on Unix.
    /// Returns the number of entries written.
    pub fn extract_to(&self, key: &str, dest: &Path) -> Result<usize> {
        let fetched = self.fetch(key)?;
        fs::create_dir_all(dest)?;

        let mut written = 0;
        for e in fetched.snapshot.entries() {
            let out = safe_join(dest, &e.path).map_err(|reason| SatchelError::UnsupportedEntry {
                path: e.path.clone(),
                reason,
            })?;
            if e.path.ends_with('/') {
                fs::create_dir_all(&out)?;
                continue;
            }
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&out, &e.content)?;
            set_mode(&out, e.meta.mode)?;
            written += 1;
        }
        tracing::info!(key, dest = %dest.display(), written, "extracted archive");
        Ok(written)
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let bits = mode & 0o7777;
    if bits != 0 {
        fs::set_permissions(path, fs::Permissions::from_mode(bits))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
