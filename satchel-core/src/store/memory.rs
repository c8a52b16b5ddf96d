use std::io::Write;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{BlobStore, Generation, PutCondition, StoreError, StoreResult};

struct Stored {
    data: Arc<Vec<u8>>,
    generation: Generation,
}

/// Process-local store backed by a concurrent map. Blobs are shared
/// immutably, so readers copy out without holding a shard lock.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, Stored>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.iter().map(|r| r.key().clone()).collect();
        keys.sort();
        keys
    }
}

impl BlobStore for MemoryBlobStore {
    fn get_to(&self, key: &str, sink: &mut dyn Write) -> StoreResult<Generation> {
        let (data, generation) = {
            let stored = self
                .blobs
                .get(key)
                .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
            (stored.data.clone(), stored.generation.clone())
        };
        sink.write_all(&data)?;
        Ok(generation)
    }

    fn put(&self, key: &str, data: &[u8], cond: PutCondition) -> StoreResult<Generation> {
        let generation = Generation::of(data);
        let stored = Stored {
            data: Arc::new(data.to_vec()),
            generation: generation.clone(),
        };
        // The entry guard makes check-and-set atomic for this key.
        match self.blobs.entry(key.to_string()) {
            Entry::Occupied(mut occ) => {
                if !cond.admits(Some(&occ.get().generation)) {
                    return Err(StoreError::PreconditionFailed(key.to_string()));
                }
                occ.insert(stored);
            }
            Entry::Vacant(vac) => {
                if !cond.admits(None) {
                    return Err(StoreError::PreconditionFailed(key.to_string()));
                }
                vac.insert(stored);
            }
        }
        Ok(generation)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.blobs.remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.blobs.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_remove() {
        let store = MemoryBlobStore::new();
        let g = store.put("a.sat", b"hello", PutCondition::Any).unwrap();
        let (data, got) = store.get("a.sat").unwrap();
        assert_eq!(data, b"hello");
        assert_eq!(got, g);
        assert!(store.exists("a.sat").unwrap());

        store.remove("a.sat").unwrap();
        store.remove("a.sat").unwrap();
        assert!(matches!(store.get("a.sat"), Err(StoreError::NotFound(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn conditional_puts() {
        let store = MemoryBlobStore::new();
        let g1 = store.put("k", b"v1", PutCondition::IfAbsent).unwrap();
        assert!(matches!(
            store.put("k", b"other", PutCondition::IfAbsent),
            Err(StoreError::PreconditionFailed(_))
        ));
        let g2 = store.put("k", b"v2", PutCondition::IfMatch(g1.clone())).unwrap();
        assert!(matches!(
            store.put("k", b"v3", PutCondition::IfMatch(g1)),
            Err(StoreError::PreconditionFailed(_))
        ));
        assert_eq!(store.get("k").unwrap(), (b"v2".to_vec(), g2));
        assert_eq!(store.keys(), vec!["k".to_string()]);
    }
}
