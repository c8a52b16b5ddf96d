#![forbid(unsafe_code)]

pub mod error;
pub mod policy;

pub mod util {
    pub mod hash_forward;
    pub mod sanitize;
}

pub mod codec;

pub mod container {
    pub mod manifest;
    pub mod superblock;
    pub mod tail;
}

pub mod archive;
pub mod config;
pub mod edit;
pub mod engine;
pub mod fetch;
pub mod key;
pub mod pack;
pub mod query;
pub mod stats;
pub mod store;
pub mod tools;

// Re-exports: stable API surface
pub use archive::{ArchiveSnapshot, EncodeOptions, Entry, EntryMeta, decode, encode};
pub use codec::CodecId;
pub use config::{Config, EngineConfig, StoreConfig, WriteMode, open_store};
pub use edit::{Action, MutationBatch, MutationInstruction, PlanSummary, WireInstruction, plan};
pub use engine::ArchiveMutationEngine;
pub use error::{Result, SatchelError};
pub use key::ArchiveKey;
pub use pack::{PackOptions, pack_dir};
pub use policy::Policy;
pub use query::{EntryInfo, QueryFacade};
pub use stats::ArchiveStats;
pub use store::{BlobStore, Generation, LocalBlobStore, MemoryBlobStore, PutCondition, StoreError};
pub use tools::{ToolBox, ToolCall, ToolOutput};
