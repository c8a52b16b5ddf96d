use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{BlobStore, Generation, KeyLocks, PutCondition, StoreError, StoreResult};
use crate::util::hash_forward::HashingForward;
use crate::util::sanitize::check_store_key;

/// Blob store rooted at a local directory. Keys map to relative file paths.
pub struct LocalBlobStore {
    root: PathBuf,
    // Conditional puts read-then-rename; serialize them per key in-process.
    locks: KeyLocks,
}

impl LocalBlobStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        Ok(Self {
            root: fs::canonicalize(root)?,
            locks: KeyLocks::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> StoreResult<PathBuf> {
        check_store_key(key).map_err(StoreError::InvalidKey)?;
        Ok(self.root.join(key))
    }

    fn current_generation(path: &Path) -> StoreResult<Option<Generation>> {
        match fs::read(path) {
            Ok(data) => Ok(Some(Generation::of(&data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to a temp file in the target directory, then rename into place
    /// so readers never observe a partial blob.
    fn atomic_write(&self, path: &Path, data: &[u8]) -> StoreResult<()> {
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl BlobStore for LocalBlobStore {
    fn get_to(&self, key: &str, sink: &mut dyn Write) -> StoreResult<Generation> {
        let path = self.resolve(key)?;
        let mut file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        // A key that names a directory holds no blob.
        if !file.metadata()?.is_file() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        let mut hw = HashingForward::new(sink);
        std::io::copy(&mut file, &mut hw)?;
        let (_, digest) = hw.finish();
        Ok(Generation::from_digest(&digest))
    }

    fn put(&self, key: &str, data: &[u8], cond: PutCondition) -> StoreResult<Generation> {
        let path = self.resolve(key)?;
        self.locks.with_key(key, || {
            if cond != PutCondition::Any {
                let current = Self::current_generation(&path)?;
                if !cond.admits(current.as_ref()) {
                    return Err(StoreError::PreconditionFailed(key.to_string()));
                }
            }
            self.atomic_write(&path, data)?;
            Ok(Generation::of(data))
        })
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        let path = self.resolve(key)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
