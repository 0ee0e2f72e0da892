//! Cache key derivation
//!
//! Two keys are equal iff every field matches; equality is the only hit
//! criterion.

use std::path::{Path, PathBuf};

use autobind_core::config::FingerprintMode;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::Result;
use crate::fingerprint::{fingerprint_file, scan_includes};

/// Snapshot format version; bump when the serialized layout changes
pub const FORMAT_VERSION: &str = concat!("autobind-", env!("CARGO_PKG_VERSION"), "/snapshot-2");

/// Path and fingerprint of one header that fed a parse
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HeaderFingerprint {
    pub path: PathBuf,
    pub fingerprint: String,
}

/// Target the headers were interpreted for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheTarget {
    pub os: String,
    pub arch: String,
    pub pointer_width: u32,
}

impl CacheTarget {
    pub fn new(os: impl Into<String>, arch: impl Into<String>, pointer_width: u32) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
            pointer_width,
        }
    }

    /// The running process
    pub fn host() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH, usize::BITS)
    }
}

/// Structural cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Target operating system
    pub os: String,
    /// Target architecture
    pub arch: String,
    /// Pointer width in bits
    pub pointer_width: u32,
    /// Module alias the snapshot belongs to
    pub alias: String,
    /// Library path as requested
    pub library_path: PathBuf,
    /// Library fingerprint
    pub library_fingerprint: String,
    /// Every header reachable from the requested ones, sorted by path
    pub headers: Vec<HeaderFingerprint>,
    /// Snapshot format version
    pub version: String,
}

impl CacheKey {
    /// Compute the key for loading `library` as `alias` from `headers` for `target`
    pub fn compute(
        target: &CacheTarget,
        alias: &str,
        library: &Path,
        headers: &[PathBuf],
        mode: FingerprintMode,
    ) -> Self {
        let all_headers = scan_includes(headers);
        debug!("Fingerprinting {} headers for {}", all_headers.len(), alias);

        let mut fingerprints: Vec<HeaderFingerprint> = all_headers
            .par_iter()
            .map(|path| HeaderFingerprint {
                path: path.clone(),
                fingerprint: fingerprint_file(path, mode),
            })
            .collect();
        fingerprints.sort();

        Self {
            os: target.os.clone(),
            arch: target.arch.clone(),
            pointer_width: target.pointer_width,
            alias: alias.to_string(),
            library_path: library.to_path_buf(),
            library_fingerprint: fingerprint_file(library, mode),
            headers: fingerprints,
            version: FORMAT_VERSION.to_string(),
        }
    }

    /// Lowercase hex SHA-256 of the JSON-encoded key
    pub fn digest(&self) -> Result<String> {
        let encoded = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&encoded);
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Name of the cache file holding this key's snapshot
    pub fn file_name(&self) -> Result<String> {
        Ok(format!("{}.cache", self.digest()?))
    }
}
