//! Shared helpers for the integration tests.
//!
//! Each test file compiles as its own crate and uses a subset of these.

#![allow(dead_code)]

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use satchel_core::store::{StoreError, StoreResult};
use satchel_core::{
    ArchiveKey, ArchiveMutationEngine, ArchiveSnapshot, BlobStore, CodecId, EngineConfig, Entry,
    EntryMeta, Generation, MemoryBlobStore, PutCondition, decode,
};

/// Metadata distinct from the engine defaults, so preservation is visible.
pub const SEEDED: EntryMeta = EntryMeta {
    codec: CodecId::Store,
    mode: 0o100755,
    mtime: 1_600_000_000,
};

pub fn engine_with(config: EngineConfig) -> (Arc<MemoryBlobStore>, ArchiveMutationEngine) {
    let store = Arc::new(MemoryBlobStore::new());
    let engine = ArchiveMutationEngine::new(store.clone(), config);
    (store, engine)
}

pub fn seed(engine: &ArchiveMutationEngine, entries: &[(&str, &str)]) -> ArchiveKey {
    let snapshot = ArchiveSnapshot::new(
        entries
            .iter()
            .map(|(p, c)| Entry::new(*p, c.as_bytes(), SEEDED))
            .collect(),
        1_650_000_000,
    )
    .unwrap();
    engine.publish_snapshot(&snapshot).unwrap()
}

pub fn snapshot_of(store: &dyn BlobStore, key: &ArchiveKey) -> ArchiveSnapshot {
    decode(&store.get(key.as_str()).unwrap().0).unwrap()
}

/// `(path, utf8 content)` pairs in archive order.
pub fn contents(store: &dyn BlobStore, key: &ArchiveKey) -> Vec<(String, String)> {
    snapshot_of(store, key)
        .entries()
        .iter()
        .map(|e| (e.path.clone(), String::from_utf8(e.content.clone()).unwrap()))
        .collect()
}

/// Store whose first `gated` reads each wait for one another, so that
/// concurrent edits are guaranteed to fetch the same state.
pub struct GatedStore {
    inner: MemoryBlobStore,
    gated: AtomicUsize,
    barrier: Barrier,
}

impl GatedStore {
    pub fn new(gated: usize) -> Self {
        Self {
            inner: MemoryBlobStore::new(),
            gated: AtomicUsize::new(gated),
            barrier: Barrier::new(gated.max(1)),
        }
    }
}

impl BlobStore for GatedStore {
    fn get_to(&self, key: &str, sink: &mut dyn Write) -> StoreResult<Generation> {
        let generation = self.inner.get_to(key, sink)?;
        let gate = self
            .gated
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if gate {
            self.barrier.wait();
        }
        Ok(generation)
    }

    fn put(&self, key: &str, data: &[u8], cond: PutCondition) -> StoreResult<Generation> {
        self.inner.put(key, data, cond)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.inner.remove(key)
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        self.inner.exists(key)
    }
}

/// Store that serves reads but refuses every write after the first
/// `allowed_puts`.
pub struct FailingPuts {
    pub inner: MemoryBlobStore,
    allowed_puts: AtomicUsize,
}

impl FailingPuts {
    pub fn new(allowed_puts: usize) -> Self {
        Self {
            inner: MemoryBlobStore::new(),
            allowed_puts: AtomicUsize::new(allowed_puts),
        }
    }
}

impl BlobStore for FailingPuts {
    fn get_to(&self, key: &str, sink: &mut dyn Write) -> StoreResult<Generation> {
        self.inner.get_to(key, sink)
    }

    fn put(&self, key: &str, data: &[u8], cond: PutCondition) -> StoreResult<Generation> {
        let allowed = self
            .allowed_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }
        self.inner.put(key, data, cond)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.inner.remove(key)
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        self.inner.exists(key)
    }
}
