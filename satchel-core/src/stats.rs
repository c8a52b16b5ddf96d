use serde::{Deserialize, Serialize};

use crate::fetch::Fetched;
use crate::store::Generation;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArchiveStats {
    pub entries: u64,
    /// Sum of uncompressed entry sizes.
    pub logical_bytes: u64,
    /// Size of the stored blob, container overhead included.
    pub packed_bytes: u64,
    /// `logical_bytes / packed_bytes`.
    pub compression_ratio: f32,
    pub generation: Generation,
}

impl ArchiveStats {
    pub(crate) fn of(fetched: &Fetched) -> Self {
        let logical_bytes = fetched.snapshot.logical_bytes();
        let packed_bytes = fetched.blob_len;
        let compression_ratio = if packed_bytes == 0 {
            0.0
        } else {
            (logical_bytes as f64 / packed_bytes as f64) as f32
        };
        Self {
            entries: fetched.snapshot.len() as u64,
            logical_bytes,
            packed_bytes,
            compression_ratio,
            generation: fetched.generation.clone(),
        }
    }
}
