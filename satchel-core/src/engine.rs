//! Fetch → decode → plan → encode → publish, for one archive key per call.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::archive::{ArchiveSnapshot, decode, encode};
use crate::config::{EngineConfig, WriteMode};
use crate::edit::{MutationBatch, MutationInstruction, PlanSummary, plan};
use crate::error::{Result, SatchelError};
use crate::fetch::{Fetched, fetch_snapshot, store_error};
use crate::key::ArchiveKey;
use crate::query::QueryFacade;
use crate::store::{BlobStore, Generation, KeyLocks, PutCondition, StoreError};
use crate::util::sanitize::check_store_key;

pub(crate) fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

fn check_key(key: &str) -> Result<()> {
    check_store_key(key).map_err(SatchelError::InvalidKey)
}

/// Applies mutation batches to archives held in a [`BlobStore`].
///
/// Each call is one synchronous unit of work. The stored blob under a key is
/// replaced by a single full-blob put after everything else has succeeded,
/// so a failing call leaves it as it was.
pub struct ArchiveMutationEngine {
    store: Arc<dyn BlobStore>,
    config: EngineConfig,
    locks: KeyLocks,
}

impl ArchiveMutationEngine {
    pub fn new(store: Arc<dyn BlobStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            locks: KeyLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read-only view over the same store.
    pub fn query(&self) -> QueryFacade {
        QueryFacade::new(self.store.clone(), self.config.spool_threshold)
    }

    /// Apply `batch` to the archive under `key` and republish it there.
    pub fn apply_batch(&self, key: &str, batch: &MutationBatch) -> Result<PlanSummary> {
        self.run(key, batch, None)
    }

    /// Like [`apply_batch`](Self::apply_batch), but only if the archive is
    /// still at `expected` when fetched and when published.
    pub fn apply_batch_expecting(
        &self,
        key: &str,
        batch: &MutationBatch,
        expected: &Generation,
    ) -> Result<PlanSummary> {
        self.run(key, batch, Some(expected))
    }

    pub fn create_entry(&self, key: &str, path: &str, content: impl Into<Vec<u8>>) -> Result<PlanSummary> {
        self.apply_batch(key, &MutationBatch::single(MutationInstruction::create(path, content)))
    }

    pub fn replace_entry(&self, key: &str, path: &str, content: impl Into<Vec<u8>>) -> Result<PlanSummary> {
        self.apply_batch(key, &MutationBatch::single(MutationInstruction::replace(path, content)))
    }

    pub fn append_entry(&self, key: &str, path: &str, extra: impl Into<Vec<u8>>) -> Result<PlanSummary> {
        self.apply_batch(key, &MutationBatch::single(MutationInstruction::append(path, extra)))
    }

    pub fn delete_entry(&self, key: &str, path: &str) -> Result<PlanSummary> {
        self.apply_batch(key, &MutationBatch::single(MutationInstruction::delete(path)))
    }

    fn run(&self, key: &str, batch: &MutationBatch, expected: Option<&Generation>) -> Result<PlanSummary> {
        check_key(key)?;
        batch.check_paths()?;
        if self.config.lock_keys {
            self.locks.with_key(key, || self.apply_unlocked(key, batch, expected))
        } else {
            self.apply_unlocked(key, batch, expected)
        }
    }

    fn apply_unlocked(
        &self,
        key: &str,
        batch: &MutationBatch,
        expected: Option<&Generation>,
    ) -> Result<PlanSummary> {
        let Fetched {
            snapshot,
            generation,
            blob_len,
        } = fetch_snapshot(self.store.as_ref(), key, self.config.spool_threshold)?;

        if let Some(expected) = expected {
            if *expected != generation {
                warn!(key, %expected, found = %generation, "archive changed before edit");
                return Err(SatchelError::ConcurrentModification(key.to_string()));
            }
        }

        let defaults = self.config.default_meta(now_unix());
        let (next, summary) = plan(snapshot, batch, &defaults);
        if !summary.changed() {
            debug!(key, instructions = batch.len(), "batch changes nothing; not publishing");
            return Ok(summary);
        }

        let blob = encode(&next, &self.config.encode_options())?;
        let cond = if expected.is_some() || self.config.write_mode == WriteMode::IfUnchanged {
            PutCondition::IfMatch(generation)
        } else {
            PutCondition::Any
        };
        let published = self.store.put(key, &blob, cond).map_err(|e| {
            if matches!(e, StoreError::PreconditionFailed(_)) {
                warn!(key, "archive changed while editing; publish refused");
            }
            store_error("publish", key, e)
        })?;

        info!(
            key,
            entries = next.len(),
            before = blob_len,
            after = blob.len(),
            generation = %published,
            created = summary.created,
            replaced = summary.replaced,
            appended = summary.appended,
            deleted = summary.deleted,
            "published archive"
        );
        Ok(summary)
    }

    /// Store an already-encoded archive under a freshly minted key. The bytes
    /// must decode.
    pub fn publish_new_archive(&self, blob: &[u8]) -> Result<ArchiveKey> {
        let snapshot = decode(blob)?;
        self.put_new(blob, snapshot.len())
    }

    /// Encode `snapshot` and store it under a freshly minted key.
    pub fn publish_snapshot(&self, snapshot: &ArchiveSnapshot) -> Result<ArchiveKey> {
        let blob = encode(snapshot, &self.config.encode_options())?;
        self.put_new(&blob, snapshot.len())
    }

    fn put_new(&self, blob: &[u8], entries: usize) -> Result<ArchiveKey> {
        let key = ArchiveKey::mint();
        let generation = self
            .store
            .put(key.as_str(), blob, PutCondition::IfAbsent)
            .map_err(|e| store_error("publish", key.as_str(), e))?;
        info!(key = %key, entries, bytes = blob.len(), %generation, "new archive");
        Ok(key)
    }

    /// Delete the archive under `key`.
    pub fn remove_archive(&self, key: &str) -> Result<()> {
        check_key(key)?;
        let present = self
            .store
            .exists(key)
            .map_err(|e| store_error("remove", key, e))?;
        if !present {
            return Err(SatchelError::ArchiveNotFound(key.to_string()));
        }
        self.store
            .remove(key)
            .map_err(|e| store_error("remove", key, e))?;
        info!(key, "removed archive");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{EncodeOptions, Entry, EntryMeta};
    use crate::codec::CodecId;
    use crate::store::MemoryBlobStore;

    const KEEP: EntryMeta = EntryMeta {
        codec: CodecId::Store,
        mode: 0o100755,
        mtime: 1_600_000_000,
    };

    fn engine_with(config: EngineConfig) -> (Arc<MemoryBlobStore>, ArchiveMutationEngine) {
        let store = Arc::new(MemoryBlobStore::new());
        let engine = ArchiveMutationEngine::new(store.clone(), config);
        (store, engine)
    }

    fn seeded(engine: &ArchiveMutationEngine) -> ArchiveKey {
        let snap = ArchiveSnapshot::new(
            vec![
                Entry::new("main.py", "print('hi')\n", KEEP),
                Entry::new("README.md", "# Demo\n", EntryMeta::default()),
            ],
            1_650_000_000,
        )
        .unwrap();
        engine.publish_snapshot(&snap).unwrap()
    }

    fn read(store: &MemoryBlobStore, key: &ArchiveKey) -> ArchiveSnapshot {
        decode(&store.get(key.as_str()).unwrap().0).unwrap()
    }

    #[test]
    fn noop_batch_does_not_touch_blob() {
        let (store, engine) = engine_with(EngineConfig::default());
        let key = seeded(&engine);
        let (_, before) = store.get(key.as_str()).unwrap();

        let summary = engine
            .apply_batch(
                key.as_str(),
                &MutationBatch::new()
                    .push(MutationInstruction::create("main.py", "clobber"))
                    .push(MutationInstruction::delete("absent.txt")),
            )
            .unwrap();
        assert!(!summary.changed());
        assert_eq!(summary.noops, 2);
        assert_eq!(store.get(key.as_str()).unwrap().1, before);
    }

    #[test]
    fn new_entries_get_configured_defaults() {
        let config = EngineConfig {
            default_codec: CodecId::Store,
            default_mode: 0o100600,
            ..EngineConfig::default()
        };
        let (store, engine) = engine_with(config);
        let key = seeded(&engine);
        engine.create_entry(key.as_str(), "notes/todo.txt", "x").unwrap();

        let snap = read(&store, &key);
        let added = snap.get("notes/todo.txt").unwrap();
        assert_eq!(added.meta.codec, CodecId::Store);
        assert_eq!(added.meta.mode, 0o100600);
        assert!(added.meta.mtime > 0);
        assert_eq!(snap.get("main.py").unwrap().meta, KEEP);
    }

    #[test]
    fn stale_expectation_is_refused_before_publishing() {
        let (store, engine) = engine_with(EngineConfig::default());
        let key = seeded(&engine);
        let stale = store.get(key.as_str()).unwrap().1;
        engine.append_entry(key.as_str(), "README.md", "more\n").unwrap();
        let (_, current) = store.get(key.as_str()).unwrap();

        let err = engine
            .apply_batch_expecting(
                key.as_str(),
                &MutationBatch::single(MutationInstruction::delete("main.py")),
                &stale,
            )
            .unwrap_err();
        assert!(matches!(err, SatchelError::ConcurrentModification(_)));
        assert_eq!(store.get(key.as_str()).unwrap().1, current);

        engine
            .apply_batch_expecting(
                key.as_str(),
                &MutationBatch::single(MutationInstruction::delete("main.py")),
                &current,
            )
            .unwrap();
        assert!(read(&store, &key).get("main.py").is_none());
    }

    #[test]
    fn invalid_keys_and_paths_are_rejected_up_front() {
        let (_, engine) = engine_with(EngineConfig::default());
        let key = seeded(&engine);
        assert_eq!(
            engine.delete_entry("../x.sat", "a").unwrap_err().kind(),
            "invalid_key"
        );
        assert_eq!(
            engine.create_entry(key.as_str(), "a/../../b", "").unwrap_err().kind(),
            "invalid_instruction"
        );
    }

    #[test]
    fn publish_new_archive_requires_decodable_bytes() {
        let (store, engine) = engine_with(EngineConfig::default());
        let err = engine.publish_new_archive(b"definitely not an archive").unwrap_err();
        assert_eq!(err.kind(), "corrupt_archive");
        assert!(store.is_empty());

        let blob = encode(&ArchiveSnapshot::empty(0), &EncodeOptions::default()).unwrap();
        let key = engine.publish_new_archive(&blob).unwrap();
        assert_eq!(store.get(key.as_str()).unwrap().0, blob);
    }

    #[test]
    fn traversing_entry_blocks_publication() {
        let (store, engine) = engine_with(EngineConfig::default());
        let key = seeded(&engine);
        let blob = store.get(key.as_str()).unwrap().0;
        let tampered = crate::archive::codec::reseal(&blob, |m| m.entries[0].path = "../escape".into());

        let err = engine.publish_new_archive(&tampered).unwrap_err();
        assert_eq!(err.kind(), "unsupported_entry");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_archive_reports_missing() {
        let (store, engine) = engine_with(EngineConfig::default());
        let key = seeded(&engine);
        engine.remove_archive(key.as_str()).unwrap();
        assert!(store.is_empty());
        assert!(matches!(
            engine.remove_archive(key.as_str()).unwrap_err(),
            SatchelError::ArchiveNotFound(_)
        ));
    }

    #[test]
    fn policy_violation_leaves_blob_unchanged() {
        let mut config = EngineConfig::default();
        config.policy.max_entry_size = 16;
        let (store, engine) = engine_with(config);
        let key = seeded(&engine);
        let before = store.get(key.as_str()).unwrap();

        let err = engine
            .append_entry(key.as_str(), "README.md", "this pushes it past sixteen bytes")
            .unwrap_err();
        assert_eq!(err.kind(), "encoding_error");
        assert_eq!(store.get(key.as_str()).unwrap(), before);
    }
}
