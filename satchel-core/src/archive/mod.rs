//! In-memory view of one archive and the codec that moves it to and from bytes.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::codec::CodecId;
use crate::error::{Result, SatchelError};

pub mod codec;

pub use codec::{EncodeOptions, decode, decode_from, encode, encode_to};

/// Per-entry metadata. Carried through edits untouched unless the entry is
/// replaced by a brand-new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    pub codec: CodecId,
    pub mode: u32,
    /// Seconds since the Unix epoch.
    pub mtime: i64,
}

impl Default for EntryMeta {
    fn default() -> Self {
        Self {
            codec: CodecId::Zstd,
            mode: 0o100644,
            mtime: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub path: String,
    pub content: Vec<u8>,
    pub meta: EntryMeta,
}

impl Entry {
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>, meta: EntryMeta) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            meta,
        }
    }
}

/// Fully decoded, immutable state of one archive.
///
/// Paths are unique; construction rejects duplicates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArchiveSnapshot {
    entries: Vec<Entry>,
    created: i64,
}

impl ArchiveSnapshot {
    pub fn new(entries: Vec<Entry>, created: i64) -> Result<Self> {
        if let Some(dup) = first_duplicate(&entries) {
            return Err(SatchelError::CorruptArchive(format!(
                "duplicate entry path: {dup}"
            )));
        }
        Ok(Self { entries, created })
    }

    /// For callers that already guarantee unique paths.
    pub(crate) fn from_unique(entries: Vec<Entry>, created: i64) -> Self {
        debug_assert!(first_duplicate(&entries).is_none());
        Self { entries, created }
    }

    pub fn empty(created: i64) -> Self {
        Self {
            entries: Vec::new(),
            created,
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }

    pub fn created(&self) -> i64 {
        self.created
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|e| e.path.as_str())
    }

    pub fn logical_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.content.len() as u64).sum()
    }
}

fn first_duplicate(entries: &[Entry]) -> Option<&str> {
    let mut seen = HashSet::with_capacity(entries.len());
    entries
        .iter()
        .map(|e| e.path.as_str())
        .find(|p| !seen.insert(*p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_paths_are_rejected() {
        let meta = EntryMeta::default();
        let err = ArchiveSnapshot::new(
            vec![
                Entry::new("a.txt", "1", meta),
                Entry::new("b.txt", "2", meta),
                Entry::new("a.txt", "3", meta),
            ],
            0,
        )
        .unwrap_err();
        assert!(matches!(err, SatchelError::CorruptArchive(_)));
    }

    #[test]
    fn lookup_and_order() {
        let meta = EntryMeta::default();
        let snap = ArchiveSnapshot::new(
            vec![Entry::new("z", "last", meta), Entry::new("a", "first", meta)],
            7,
        )
        .unwrap();
        assert_eq!(snap.paths().collect::<Vec<_>>(), vec!["z", "a"]);
        assert_eq!(snap.get("a").unwrap().content, b"first");
        assert!(snap.get("missing").is_none());
        assert_eq!(snap.logical_bytes(), 9);
        assert_eq!(snap.created(), 7);
    }
}
