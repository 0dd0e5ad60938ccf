//! Durable key-value storage.
//!
//! The cart and the auth session survive restarts by writing opaque byte
//! blobs under well-known keys. Everything behind [`KeyValueStore`] is
//! whole-value overwrite: no partial updates, no versioning.
//!
//! Two implementations are provided:
//! - [`FileStore`] - one file per key in a data directory
//! - [`MemoryStore`] - process-local map, for tests and throwaway sessions

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;

/// Maximum key length accepted by every store.
pub const MAX_KEY_LENGTH: usize = 128;

/// Errors that can occur when reading or writing the durable store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Key contains characters outside `[A-Za-z0-9._-]` or has a bad length.
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    /// Underlying I/O failed.
    #[error("storage I/O error for key {key:?}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Store refused the operation (used by test doubles and read-only stores).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Asynchronous byte-blob store keyed by short identifiers.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, or `None` if there is none.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Delete `key`. Deleting a missing key succeeds.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Check that `key` is safe to use as a file name on every platform.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] for empty keys, keys longer than
/// [`MAX_KEY_LENGTH`], keys starting with `.`, or keys containing anything
/// other than ASCII letters, digits, `.`, `_` and `-`.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LENGTH
        && !key.starts_with('.')
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("cart").is_ok());
        assert!(validate_key("cart.5b0d7f7e-6d0c-4a52-9a55-2f4f2d7f1c11").is_ok());
        assert!(validate_key("auth.session").is_ok());

        assert!(validate_key("").is_err());
        assert!(validate_key(".hidden").is_err());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("with space").is_err());
        assert!(validate_key(&"k".repeat(MAX_KEY_LENGTH + 1)).is_err());
    }
}
