//! Cache errors

use thiserror::Error;

/// Cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to persist cache file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

pub type Result<T> = std::result::Result<T, CacheError>;

impl From<CacheError> for autobind_core::Error {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Io(e) => autobind_core::Error::Io(e),
            CacheError::Serialize(e) => autobind_core::Error::Serialization(e),
            CacheError::Persist(e) => autobind_core::Error::Io(e.error),
        }
    }
}
