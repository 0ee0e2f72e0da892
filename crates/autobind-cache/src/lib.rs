//! autobind binding cache
//!
//! Persists everything discovered for a module alias so later loads of the
//! same library and headers skip header parsing. One file per cache key; the
//! file name is the SHA-256 of the serialized key.

pub mod error;
pub mod fingerprint;
pub mod key;
pub mod snapshot;
pub mod store;

pub use error::{CacheError, Result};
pub use fingerprint::{fingerprint_file, include_order, scan_includes};
pub use key::{CacheKey, CacheTarget, HeaderFingerprint, FORMAT_VERSION};
pub use snapshot::CachedSnapshot;
pub use store::{CacheStats, CacheStore, LoadOutcome};
