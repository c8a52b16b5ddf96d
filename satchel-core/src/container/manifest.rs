use serde::{Deserialize, Serialize};

/// One stored entry. `codec` stays a raw byte so that archives written by a
/// newer codec set still parse and can be reported as unsupported.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    pub path: String,
    pub codec: u8,
    pub mode: u32,
    pub mtime: i64,
    pub u_size: u64,
    pub c_size: u64,
    /// Offset of the frame, relative to the start of the data section
    pub data_off: u64,
    /// BLAKE3 of the uncompressed content
    pub blake3: [u8; 32],
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Meta {
    pub created: i64,
    pub tool: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub entries: Vec<EntryRecord>,
    pub meta: Meta,
}
