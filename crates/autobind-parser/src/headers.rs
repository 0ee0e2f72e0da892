//! Header discovery
//!
//! Guesses the header of a shared library from its file name when the caller
//! names no headers explicitly: `libpng16.so.16` is looked up as `png16.h`
//! under each include root.

use std::path::{Path, PathBuf};
use tracing::debug;

use autobind_core::{Error, Result};

use crate::preprocessor::Architecture;

const LIBRARY_SUFFIXES: &[&str] = &[".so", ".dylib", ".dll", ".a"];

/// Include roots searched for a library's main header
#[derive(Debug, Clone)]
pub struct HeaderDiscovery {
    roots: Vec<PathBuf>,
    multiarch_dir: String,
}

impl Default for HeaderDiscovery {
    fn default() -> Self {
        Self::system(Architecture::host())
    }
}

impl HeaderDiscovery {
    /// The usual system include roots
    pub fn system(arch: Architecture) -> Self {
        Self {
            roots: vec![PathBuf::from("/usr/include"), PathBuf::from("/usr/local/include")],
            multiarch_dir: arch.multiarch_dir().to_string(),
        }
    }

    /// Custom include roots, searched in order
    pub fn with_roots(roots: Vec<PathBuf>, arch: Architecture) -> Self {
        Self {
            roots,
            multiarch_dir: arch.multiarch_dir().to_string(),
        }
    }

    pub fn add_root(&mut self, path: PathBuf) {
        if !self.roots.contains(&path) {
            self.roots.push(path);
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// `libz.so.1` -> `z`
    pub fn header_stem(library: &Path) -> Option<String> {
        let file_name = library.file_name()?.to_str()?;
        let name = file_name.strip_prefix("lib").unwrap_or(file_name);
        let end = LIBRARY_SUFFIXES
            .iter()
            .filter_map(|suffix| name.find(suffix))
            .min()
            .unwrap_or(name.len());
        let stem = &name[..end];
        if stem.is_empty() {
            None
        } else {
            Some(stem.to_string())
        }
    }

    /// Every path tried for `stem`, in search order
    pub fn candidates(&self, stem: &str) -> Vec<PathBuf> {
        let file = format!("{}.h", stem);
        let mut paths: Vec<PathBuf> = self.roots.iter().map(|r| r.join(&file)).collect();
        paths.extend(self.roots.iter().map(|r| r.join(stem).join(&file)));
        paths.extend(self.roots.iter().map(|r| r.join(&self.multiarch_dir).join(&file)));
        paths
    }

    /// Find the header for `library`, or fail listing every path tried
    pub fn discover(&self, alias: &str, library: &Path) -> Result<Vec<PathBuf>> {
        let searched = match Self::header_stem(library) {
            Some(stem) => self.candidates(&stem),
            None => Vec::new(),
        };

        for path in &searched {
            if path.is_file() {
                debug!("Discovered header {} for {}", path.display(), library.display());
                return Ok(vec![path.clone()]);
            }
        }

        Err(Error::NoHeaders {
            alias: alias.to_string(),
            searched,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_header_stem() {
        assert_eq!(HeaderDiscovery::header_stem(Path::new("/usr/lib/libz.so.1")), Some("z".into()));
        assert_eq!(HeaderDiscovery::header_stem(Path::new("libpng16.so")), Some("png16".into()));
        assert_eq!(HeaderDiscovery::header_stem(Path::new("libfoo.dylib")), Some("foo".into()));
        assert_eq!(HeaderDiscovery::header_stem(Path::new("sqlite3.dll")), Some("sqlite3".into()));
        assert_eq!(HeaderDiscovery::header_stem(Path::new("lib.so")), None);
    }

    #[test]
    fn test_discover_order() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        fs::create_dir_all(second.path().join("curl")).unwrap();
        fs::write(second.path().join("curl/curl.h"), "int x;").unwrap();

        let discovery = HeaderDiscovery::with_roots(
            vec![first.path().to_path_buf(), second.path().to_path_buf()],
            Architecture::X86_64,
        );
        let found = discovery.discover("curl", Path::new("libcurl.so.4")).unwrap();
        assert_eq!(found, vec![second.path().join("curl/curl.h")]);

        fs::write(first.path().join("curl.h"), "int y;").unwrap();
        let found = discovery.discover("curl", Path::new("libcurl.so.4")).unwrap();
        assert_eq!(found, vec![first.path().join("curl.h")]);
    }

    #[test]
    fn test_multiarch_fallback() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("aarch64-linux-gnu")).unwrap();
        fs::write(root.path().join("aarch64-linux-gnu/ssl.h"), "").unwrap();
        let discovery = HeaderDiscovery::with_roots(vec![root.path().to_path_buf()], Architecture::Arm64);
        let found = discovery.discover("ssl", Path::new("libssl.so.3")).unwrap();
        assert_eq!(found, vec![root.path().join("aarch64-linux-gnu/ssl.h")]);
    }

    #[test]
    fn test_missing_header_lists_candidates() {
        let root = TempDir::new().unwrap();
        let discovery = HeaderDiscovery::with_roots(vec![root.path().to_path_buf()], Architecture::X86_64);
        match discovery.discover("nothing", Path::new("libnothing.so")) {
            Err(Error::NoHeaders { alias, searched }) => {
                assert_eq!(alias, "nothing");
                assert_eq!(searched.len(), 3);
                assert_eq!(searched[0], root.path().join("nothing.h"));
            }
            other => panic!("expected NoHeaders, got {:?}", other),
        }
    }
}
