use thiserror::Error;

#[derive(Error, Debug)]
pub enum SatchelError {
    #[error("archive not found: {0}")]
    ArchiveNotFound(String),

    #[error("entry not found: {path}")]
    EntryNotFound { path: String },

    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    #[error("unsupported entry {path}: {reason}")]
    UnsupportedEntry { path: String, reason: String },

    #[error("entry {path} is not valid UTF-8 text")]
    NotText { path: String },

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("store unavailable during {op} of {key}: {source}")]
    StoreUnavailable {
        op: &'static str,
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid instruction #{index}: {reason}")]
    InvalidInstruction { index: usize, reason: String },

    #[error("archive {0} was modified concurrently")]
    ConcurrentModification(String),

    #[error("invalid archive key: {0}")]
    InvalidKey(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SatchelError {
    /// Stable snake_case name of the failure, for callers that branch on it.
    pub fn kind(&self) -> &'static str {
        match self {
            SatchelError::ArchiveNotFound(_) => "archive_not_found",
            SatchelError::EntryNotFound { .. } => "entry_not_found",
            SatchelError::CorruptArchive(_) => "corrupt_archive",
            SatchelError::UnsupportedEntry { .. } => "unsupported_entry",
            SatchelError::NotText { .. } => "not_text",
            SatchelError::Encoding(_) => "encoding_error",
            SatchelError::StoreUnavailable { .. } => "store_unavailable",
            SatchelError::InvalidInstruction { .. } => "invalid_instruction",
            SatchelError::ConcurrentModification(_) => "concurrent_modification",
            SatchelError::InvalidKey(_) => "invalid_key",
            SatchelError::Config(_) => "config_error",
            SatchelError::Io(_) => "io_error",
        }
    }

    /// True for the not-found family, which API layers surface as 404.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SatchelError::ArchiveNotFound(_) | SatchelError::EntryNotFound { .. }
        )
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, SatchelError>;
