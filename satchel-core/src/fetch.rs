//! Fetch-and-decode of one archive through a scoped spool.

use std::io::{Seek, SeekFrom};

use tempfile::SpooledTempFile;

use crate::archive::{ArchiveSnapshot, decode_from};
use crate::error::{Result, SatchelError};
use crate::store::{BlobStore, Generation, StoreError};

/// A decoded archive along with what the store said about its blob.
#[derive(Debug)]
pub struct Fetched {
    pub snapshot: ArchiveSnapshot,
    pub generation: Generation,
    pub blob_len: u64,
}

/// Map a store failure for `key` during `op` into the crate error.
pub(crate) fn store_error(op: &'static str, key: &str, err: StoreError) -> SatchelError {
    match err {
        StoreError::NotFound(_) => SatchelError::ArchiveNotFound(key.to_string()),
        StoreError::PreconditionFailed(_) => SatchelError::ConcurrentModification(key.to_string()),
        StoreError::InvalidKey(reason) => SatchelError::InvalidKey(reason),
        StoreError::Io(source) => SatchelError::StoreUnavailable {
            op,
            key: key.to_string(),
            source,
        },
    }
}

/// Stream the blob under `key` into a spool that stays in memory up to
/// `spool_threshold` bytes, then decode it. The spool is dropped on return.
pub fn fetch_snapshot(store: &dyn BlobStore, key: &str, spool_threshold: usize) -> Result<Fetched> {
    let mut spool = SpooledTempFile::new(spool_threshold);
    let generation = store
        .get_to(key, &mut spool)
        .map_err(|e| store_error("fetch", key, e))?;
    let blob_len = spool.seek(SeekFrom::End(0))?;
    spool.seek(SeekFrom::Start(0))?;
    tracing::debug!(key, blob_len, spilled = spool.is_rolled(), "fetched archive");

    let snapshot = decode_from(&mut spool)?;
    Ok(Fetched {
        snapshot,
        generation,
        blob_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{EncodeOptions, Entry, EntryMeta, encode};
    use crate::store::{MemoryBlobStore, PutCondition};

    fn sample() -> ArchiveSnapshot {
        ArchiveSnapshot::new(
            vec![
                Entry::new("a.txt", "alpha", EntryMeta::default()),
                Entry::new("b/c.txt", "gamma", EntryMeta::default()),
            ],
            1_700_000_000,
        )
        .unwrap()
    }

    #[test]
    fn spills_past_threshold_and_still_decodes() {
        let store = MemoryBlobStore::new();
        let blob = encode(&sample(), &EncodeOptions::default()).unwrap();
        let generation = store.put("x.sat", &blob, PutCondition::Any).unwrap();

        for threshold in [0, 1 << 20] {
            let got = fetch_snapshot(&store, "x.sat", threshold).unwrap();
            assert_eq!(got.snapshot, sample());
            assert_eq!(got.generation, generation);
            assert_eq!(got.blob_len, blob.len() as u64);
        }
    }

    #[test]
    fn missing_blob_is_archive_not_found() {
        let store = MemoryBlobStore::new();
        let err = fetch_snapshot(&store, "gone.sat", 1024).unwrap_err();
        assert!(matches!(err, SatchelError::ArchiveNotFound(k) if k == "gone.sat"));
    }

    #[test]
    fn garbage_blob_is_corrupt() {
        let store = MemoryBlobStore::new();
        store.put("junk.sat", b"PK\x03\x04 not ours", PutCondition::Any).unwrap();
        let err = fetch_snapshot(&store, "junk.sat", 1024).unwrap_err();
        assert_eq!(err.kind(), "corrupt_archive");
    }
}
