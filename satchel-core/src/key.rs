use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SatchelError};
use crate::util::sanitize::check_store_key;

/// Extension of minted archive keys.
pub const KEY_SUFFIX: &str = ".sat";

/// Identifier of one archive blob in the store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchiveKey(String);

impl ArchiveKey {
    /// Mint a fresh `<uuid-v4>.sat` key.
    pub fn mint() -> Self {
        Self(format!("{}{KEY_SUFFIX}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn validate(&self) -> Result<()> {
        check_store_key(&self.0).map_err(SatchelError::InvalidKey)
    }
}

impl From<String> for ArchiveKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ArchiveKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ArchiveKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchiveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_keys_are_unique_and_valid() {
        let a = ArchiveKey::mint();
        let b = ArchiveKey::mint();
        assert_ne!(a, b);
        assert!(a.as_str().ends_with(KEY_SUFFIX));
        a.validate().unwrap();
    }

    #[test]
    fn traversal_is_invalid() {
        let err = ArchiveKey::from("../escape.sat").validate().unwrap_err();
        assert_eq!(err.kind(), "invalid_key");
    }
}
