use serde::{Deserialize, Serialize};

/// Limits enforced when an archive is encoded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub max_entries: u64,
    /// Uncompressed size limit for a single entry, in bytes.
    pub max_entry_size: u64,
    /// Byte length limit for an entry path.
    pub max_path_len: usize,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_entries: 1 << 20,
            max_entry_size: u32::MAX as u64,
            max_path_len: 4096,
        }
    }
}
