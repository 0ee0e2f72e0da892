//! Configuration types
//!
//! Every knob can be driven from the environment. They are debugging aids,
//! not a stable interface.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Disables cache load and save
pub const ENV_NOCACHE: &str = "AUTOBIND_NOCACHE";
/// Overrides the cache directory
pub const ENV_CACHE_DIR: &str = "AUTOBIND_CACHE_DIR";
/// Switches file fingerprints to SHA-256 content hashes
pub const ENV_CACHE_CONTENT_HASH: &str = "AUTOBIND_CACHE_CONTENT_HASH";
/// Verbose per-directive and per-declaration tracing
pub const ENV_TRACE_PARSE: &str = "AUTOBIND_TRACE_PARSE";
/// Report skipped declarations at warn level
pub const ENV_WARN_PARSE: &str = "AUTOBIND_WARN_PARSE";

/// autobind configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Binding cache configuration
    pub cache: CacheConfig,

    /// Header parsing configuration
    pub parse: ParseConfig,
}

impl Config {
    /// Build a configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_set = |key: &str| lookup(key).map(|v| !v.is_empty()).unwrap_or(false);

        let mut config = Self::default();
        if is_set(ENV_NOCACHE) {
            config.cache.enabled = false;
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR).filter(|v| !v.is_empty()) {
            config.cache.directory = PathBuf::from(dir);
        } else {
            config.cache.directory = default_cache_dir(&lookup);
        }
        if is_set(ENV_CACHE_CONTENT_HASH) {
            config.cache.fingerprint = FingerprintMode::Content;
        }
        config.parse.trace = is_set(ENV_TRACE_PARSE);
        config.parse.warnings = is_set(ENV_WARN_PARSE);
        config
    }
}

/// How files are fingerprinted for the cache key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintMode {
    /// Modification time (nanoseconds) and size
    #[default]
    Metadata,
    /// SHA-256 of the file bytes
    Content,
}

/// Binding cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether snapshots are loaded and saved
    pub enabled: bool,

    /// Directory holding one file per cache key
    pub directory: PathBuf,

    /// Fingerprint strategy for libraries and headers
    pub fingerprint: FingerprintMode,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: default_cache_dir(&|key: &str| std::env::var(key).ok()),
            fingerprint: FingerprintMode::default(),
        }
    }
}

/// Header parsing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseConfig {
    /// Trace every directive and declaration decision
    pub trace: bool,

    /// Log skipped declarations at warn instead of debug
    pub warnings: bool,

    /// Ceiling for typedef chain resolution
    pub max_typedef_depth: usize,

    /// Maximum passes over `#define`s to resolve forward references
    pub max_define_passes: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            trace: false,
            warnings: false,
            max_typedef_depth: 10,
            max_define_passes: 10,
        }
    }
}

fn default_cache_dir<F>(lookup: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(xdg) = lookup("XDG_CACHE_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg).join("autobind").join("ffi");
    }
    if let Some(home) = lookup("HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(home).join(".cache").join("autobind").join("ffi");
    }
    std::env::temp_dir().join("autobind").join("ffi")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("HOME", "/home/u")]));
        assert!(config.cache.enabled);
        assert_eq!(config.cache.directory, PathBuf::from("/home/u/.cache/autobind/ffi"));
        assert_eq!(config.cache.fingerprint, FingerprintMode::Metadata);
        assert!(!config.parse.trace);
        assert_eq!(config.parse.max_typedef_depth, 10);
    }

    #[test]
    fn test_xdg_cache_home_wins() {
        let config = Config::from_lookup(lookup(&[("HOME", "/home/u"), ("XDG_CACHE_HOME", "/xdg")]));
        assert_eq!(config.cache.directory, PathBuf::from("/xdg/autobind/ffi"));
    }

    #[test]
    fn test_env_toggles() {
        let config = Config::from_lookup(lookup(&[
            (ENV_NOCACHE, "1"),
            (ENV_CACHE_DIR, "/tmp/x"),
            (ENV_CACHE_CONTENT_HASH, "yes"),
            (ENV_TRACE_PARSE, "1"),
            (ENV_WARN_PARSE, "1"),
        ]));
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.directory, PathBuf::from("/tmp/x"));
        assert_eq!(config.cache.fingerprint, FingerprintMode::Content);
        assert!(config.parse.trace);
        assert!(config.parse.warnings);
    }

    #[test]
    fn test_empty_variable_is_unset() {
        let config = Config::from_lookup(lookup(&[(ENV_NOCACHE, ""), ("HOME", "/h")]));
        assert!(config.cache.enabled);
    }
}
